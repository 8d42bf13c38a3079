//! Core data models for the catalogue explorer.
//!
//! This module contains the raw CSV row shapes, the cleaned in-memory tables,
//! the projected result rows returned by the query layer, and load statistics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Raw CSV Rows
// ============================================================================

/// Raw artist row from artists.csv (before cleaning).
/// `followers` is stored as a float in the public dumps ("44.0") and may be empty.
#[derive(Clone, Debug, Deserialize)]
pub struct ArtistRow {
    pub id: String,
    pub name: Option<String>,
    pub followers: Option<f64>,
    pub genres: Option<String>,
}

/// Raw track row from tracks.csv, decoded after the list-artifact strip.
#[derive(Clone, Debug, Deserialize)]
pub struct TrackRow {
    pub id: String,
    pub name: String,
    pub popularity: u32,
    pub artists: String,
    pub id_artists: String,
    pub release_date: String,
}

/// Raw chart row from the top-200 dump. Only Artist and Title are kept.
#[derive(Clone, Debug, Deserialize)]
pub struct ChartRow {
    #[serde(rename = "Artist")]
    pub artist: String,
    #[serde(rename = "Title")]
    pub title: String,
}

// ============================================================================
// Cleaned Tables
// ============================================================================

/// Cleaned artist. `name` is the lowercase lookup key, published as `artists`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Artist {
    pub id: String,
    #[serde(rename = "artists")]
    pub name: String,
    pub followers: u64,
    pub genres: String, // never absent, "" when the source was empty
}

/// Cleaned track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: String,    // free text, substring-matched
    pub id_artists: String, // raw id text, joined against Artist.id
    pub popularity: u32,
    pub release_date: Option<NaiveDate>,
    pub release_year: Option<i32>, // None iff release_date is None
}

/// One row of the regional top-chart table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChartEntry {
    #[serde(rename = "Artist")]
    pub artist: String,
    #[serde(rename = "Title")]
    pub title: String,
}

/// Number of distinct chart titles per chart artist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArtistSingleCount {
    #[serde(rename = "Artist")]
    pub artist: String,
    pub singles: usize,
}

// ============================================================================
// Query Results
// ============================================================================

/// (name, popularity) projection used by the artist top-3 ranking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PopularTrack {
    pub name: String,
    pub popularity: u32,
}

/// (name, release_year) projection used by the artist recency ranking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecentTrack {
    pub name: String,
    pub release_year: Option<i32>,
}

/// Everything the artist search reports for a matched artist.
///
/// `top_popular` and `top_recent` are `None` (not an empty table) when no
/// track credits mention the artist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArtistProfile {
    pub followers: u64,
    pub top_popular: Option<Vec<PopularTrack>>,
    pub top_recent: Option<Vec<RecentTrack>>,
    pub chart_singles: usize,
    pub reference_link: Option<String>,
}

/// (name, artists, popularity) projection returned by title search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TitleMatch {
    pub name: String,
    pub artists: String,
    pub popularity: u32,
}

/// (name, popularity, artists) projection returned by the year+genre filter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct YearGenreMatch {
    pub name: String,
    pub popularity: u32,
    pub artists: String,
}

// ============================================================================
// Statistics
// ============================================================================

/// Row counts and timing for one dataset load.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct LoadStats {
    pub artists: usize,
    pub artists_without_genres: usize,
    pub tracks: usize,
    pub tracks_without_release_year: usize,
    pub chart_entries: usize,
    pub chart_artists: usize,
    pub elapsed_seconds: f64,
}

impl LoadStats {
    /// Share of tracks with a usable release year, as a percentage
    pub fn dated_rate(&self) -> f64 {
        if self.tracks == 0 {
            0.0
        } else {
            100.0 * (self.tracks - self.tracks_without_release_year) as f64 / self.tracks as f64
        }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
