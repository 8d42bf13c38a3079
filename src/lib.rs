//! Spotify catalogue explorer - load, clean and query the artists / tracks / top-200 dumps.

pub mod error;
pub mod loader;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod query;
pub mod reference;
