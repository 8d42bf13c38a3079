//! Cleaning pipeline applied once while the catalogue is loaded.
//!
//! Steps, in order:
//! 1. artist names become the lowercase `artists` lookup key
//! 2. missing artist genres become ""
//! 3. list-encoding artifacts (`[`, `]`, `'`) are stripped from every track field
//! 4. release dates are parsed, unparsable ones become `None`
//! 5. release years are derived from release dates
//! 6. chart rows are aggregated into distinct-title counts per artist
//!
//! CRITICAL: step 3 is deliberately table-wide. Track names with apostrophes
//! lose them ("Don't Stop" -> "Dont Stop"), and title search sees the stripped text.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

use crate::models::{Artist, ArtistRow, ArtistSingleCount, ChartEntry, ChartRow, Track, TrackRow};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Brackets left by list-encoded columns: "['Uli', 'Hans']"
pub static LIST_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[|\]").unwrap());

/// Quote characters from the same encoding
pub static LIST_QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"'").unwrap());

/// Month-precision dates: "1971-07"
static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").unwrap());

/// Year-precision dates: "1922"
static YEAR_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})$").unwrap());

// ============================================================================
// ARTISTS
// ============================================================================

/// Case-normalized artist key. Applied to the table once at load and to
/// query input, never to stored keys at query time.
pub fn normalize_artist_key(name: &str) -> String {
    name.to_lowercase()
}

/// Clean one artist row (steps 1 and 2).
pub fn clean_artist(row: ArtistRow) -> Artist {
    let followers = row
        .followers
        .filter(|f| f.is_finite() && *f > 0.0)
        .map(|f| f as u64)
        .unwrap_or(0);

    Artist {
        id: row.id,
        name: row.name.as_deref().map(normalize_artist_key).unwrap_or_default(),
        followers,
        genres: row.genres.unwrap_or_default(),
    }
}

// ============================================================================
// TRACKS
// ============================================================================

/// Remove list-encoding artifacts from a single field.
pub fn strip_list_artifacts(value: &str) -> String {
    let without_brackets = LIST_BRACKETS.replace_all(value, "");
    LIST_QUOTES.replace_all(&without_brackets, "").into_owned()
}

/// Strip every field of a raw track record (step 3), before any typing.
pub fn strip_record(record: &StringRecord) -> StringRecord {
    record.iter().map(strip_list_artifacts).collect()
}

/// Parse a release date (step 4).
///
/// Accepts "YYYY-MM-DD", "YYYY-MM-DD HH:MM:SS", "YYYY-MM" and "YYYY".
/// Partial dates resolve to the first day of the month/year. Anything else,
/// including out-of-range components, is `None`.
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let date = if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Some(date)
    } else if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        Some(datetime.date())
    } else if let Some(caps) = YEAR_MONTH.captures(raw) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, 1)
    } else if let Some(caps) = YEAR_ONLY.captures(raw) {
        let year: i32 = caps[1].parse().ok()?;
        NaiveDate::from_ymd_opt(year, 1, 1)
    } else {
        None
    };

    // Year 0000 shows up in the dumps as a placeholder, not a real date
    date.filter(|d| d.year() >= 1)
}

/// Derive the release year (step 5). `None` in, `None` out.
pub fn release_year(date: Option<NaiveDate>) -> Option<i32> {
    date.map(|d| d.year())
}

/// Clean one decoded track row (steps 4 and 5; step 3 ran on the raw record).
pub fn clean_track(row: TrackRow) -> Track {
    let release_date = parse_release_date(&row.release_date);
    Track {
        id: row.id,
        name: row.name,
        artists: row.artists,
        id_artists: row.id_artists,
        popularity: row.popularity,
        release_date,
        release_year: release_year(release_date),
    }
}

/// Strip, decode and clean one raw track record.
pub fn clean_track_record(record: &StringRecord, headers: &StringRecord) -> csv::Result<Track> {
    let stripped = strip_record(record);
    let row: TrackRow = stripped.deserialize(Some(headers))?;
    Ok(clean_track(row))
}

// ============================================================================
// CHART
// ============================================================================

pub fn clean_chart_entry(row: ChartRow) -> ChartEntry {
    ChartEntry {
        artist: row.artist,
        title: row.title,
    }
}

/// Count distinct chart titles per artist (step 6).
///
/// Rows with an empty artist are not grouped; empty titles are not counted.
/// Output is ordered by artist.
pub fn count_singles(entries: &[ChartEntry]) -> Vec<ArtistSingleCount> {
    let mut titles_by_artist: BTreeMap<&str, FxHashSet<&str>> = BTreeMap::new();

    for entry in entries {
        if entry.artist.is_empty() {
            continue;
        }
        let titles = titles_by_artist.entry(entry.artist.as_str()).or_default();
        if !entry.title.is_empty() {
            titles.insert(entry.title.as_str());
        }
    }

    titles_by_artist
        .into_iter()
        .map(|(artist, titles)| ArtistSingleCount {
            artist: artist.to_string(),
            singles: titles.len(),
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
