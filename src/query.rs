//! Read-only queries over the loaded catalogue.
//!
//! Three independent operations: artist lookup, title search, and the
//! year+genre filter. "Nothing matched" is always `None`, never an error;
//! only the year+genre filter can reject its input.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::{Ordering, Reverse};

use crate::error::QueryError;
use crate::loader::Dataset;
use crate::models::{Artist, ArtistProfile, PopularTrack, RecentTrack, TitleMatch, Track, YearGenreMatch};
use crate::normalize::normalize_artist_key;
use crate::reference::{resolve_reference_link, ReferenceLookup};

/// Rows kept by each artist ranking
pub const TOP_TRACKS: usize = 3;

/// Rows kept by title search
pub const TITLE_RESULTS: usize = 20;

/// Minimum Jaro-Winkler similarity for an artist suggestion
pub const SUGGESTION_THRESHOLD: f64 = 0.85;

// ============================================================================
// Match Functions
// ============================================================================

/// Exact artist match. Both sides are already lowercase keys.
pub fn artist_name_equals(artist_key: &str, query_key: &str) -> bool {
    artist_key == query_key
}

/// Loose credit match: the query appears anywhere in a track's artist text,
/// so collaborations count.
pub fn credits_contain(credits: &str, query_key: &str) -> bool {
    credits.to_lowercase().contains(query_key)
}

/// Case-insensitive substring match used for titles and genres.
fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

// ============================================================================
// Rankings
// ============================================================================

/// Highest popularity first; equal popularity keeps catalogue order.
pub fn top_by_popularity(tracks: &[&Track], n: usize) -> Vec<PopularTrack> {
    let mut ranked = tracks.to_vec();
    ranked.sort_by_key(|t| Reverse(t.popularity));
    ranked
        .into_iter()
        .take(n)
        .map(|t| PopularTrack {
            name: t.name.clone(),
            popularity: t.popularity,
        })
        .collect()
}

/// Most recent release year first; unknown years sort after every known year.
pub fn top_by_recency(tracks: &[&Track], n: usize) -> Vec<RecentTrack> {
    let mut ranked = tracks.to_vec();
    // None < Some(_), so reversing puts unknown years last
    ranked.sort_by_key(|t| Reverse(t.release_year));
    ranked
        .into_iter()
        .take(n)
        .map(|t| RecentTrack {
            name: t.name.clone(),
            release_year: t.release_year,
        })
        .collect()
}

/// Popularity descending, then credited artists ascending (as stored).
fn compare_year_genre(a: &YearGenreMatch, b: &YearGenreMatch) -> Ordering {
    b.popularity
        .cmp(&a.popularity)
        .then_with(|| a.artists.cmp(&b.artists))
}

// ============================================================================
// Join
// ============================================================================

/// One row of the artist-driven left join. `track` is `None` for artists
/// without any track whose `id_artists` equals their id.
#[derive(Debug, Clone, Copy)]
pub struct JoinedRow<'a> {
    pub artist: &'a Artist,
    pub track: Option<&'a Track>,
}

impl Dataset {
    /// Left join artists to tracks on `Artist.id == Track.id_artists`.
    ///
    /// Artist order is kept, and within an artist the catalogue order of its
    /// tracks. Tracks that match no artist id are dropped.
    pub fn join_artist_tracks(&self) -> Vec<JoinedRow<'_>> {
        let mut tracks_by_artist_id: FxHashMap<&str, Vec<&Track>> = FxHashMap::default();
        for track in self.tracks() {
            tracks_by_artist_id
                .entry(track.id_artists.as_str())
                .or_default()
                .push(track);
        }

        let mut joined = Vec::with_capacity(self.artists().len());
        for artist in self.artists() {
            match tracks_by_artist_id.get(artist.id.as_str()) {
                Some(tracks) => joined.extend(tracks.iter().map(|&track| JoinedRow {
                    artist,
                    track: Some(track),
                })),
                None => joined.push(JoinedRow { artist, track: None }),
            }
        }
        joined
    }

    // ========================================================================
    // Artist Lookup
    // ========================================================================

    /// Profile of the artist whose name equals `name` (case-insensitive).
    ///
    /// Returns `None` when no artist matches exactly, including for blank
    /// input. Track rankings use the looser credit match.
    pub fn lookup_artist(&self, name: &str, reference: &dyn ReferenceLookup) -> Option<ArtistProfile> {
        if name.trim().is_empty() {
            return None;
        }
        let key = normalize_artist_key(name);

        let artist = self
            .artists()
            .iter()
            .find(|a| artist_name_equals(&a.name, &key))?;

        let credited: Vec<&Track> = self
            .tracks()
            .iter()
            .filter(|t| credits_contain(&t.artists, &key))
            .collect();

        let (top_popular, top_recent) = if credited.is_empty() {
            (None, None)
        } else {
            (
                Some(top_by_popularity(&credited, TOP_TRACKS)),
                Some(top_by_recency(&credited, TOP_TRACKS)),
            )
        };

        Some(ArtistProfile {
            followers: artist.followers,
            top_popular,
            top_recent,
            chart_singles: self.chart_singles(&key),
            reference_link: resolve_reference_link(reference, name),
        })
    }

    /// Distinct chart titles for an artist key, 0 when the artist never charted.
    pub fn chart_singles(&self, key: &str) -> usize {
        self.single_counts()
            .iter()
            .find(|count| artist_name_equals(&normalize_artist_key(&count.artist), key))
            .map(|count| count.singles)
            .unwrap_or(0)
    }

    /// Close artist names for a lookup that found nothing, best first.
    pub fn suggest_artists(&self, name: &str, limit: usize) -> Vec<String> {
        let key = normalize_artist_key(name.trim());
        if key.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut scored: Vec<(f64, &str)> = self
            .artists()
            .iter()
            .map(|a| a.name.as_str())
            .filter(|candidate| !candidate.is_empty() && seen.insert(*candidate))
            .map(|candidate| (strsim::jaro_winkler(&key, candidate), candidate))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, candidate)| candidate.to_string())
            .collect()
    }

    // ========================================================================
    // Title Search
    // ========================================================================

    /// Tracks whose name contains `title` (case-insensitive), most popular
    /// first, at most `TITLE_RESULTS` rows. `None` when nothing matches.
    pub fn search_title(&self, title: &str) -> Option<Vec<TitleMatch>> {
        let needle = title.to_lowercase();
        let mut matches: Vec<&Track> = self
            .tracks()
            .iter()
            .filter(|t| contains_ignore_case(&t.name, &needle))
            .collect();

        if matches.is_empty() {
            return None;
        }

        matches.sort_by_key(|t| Reverse(t.popularity));
        Some(
            matches
                .into_iter()
                .take(TITLE_RESULTS)
                .map(|t| TitleMatch {
                    name: t.name.clone(),
                    artists: t.artists.clone(),
                    popularity: t.popularity,
                })
                .collect(),
        )
    }

    // ========================================================================
    // Year + Genre Filter
    // ========================================================================

    /// Tracks released in `year` by artists whose genres mention `genre`.
    ///
    /// `year` is compared as text against the release year; `genre` is a
    /// case-insensitive substring of the artist's genres. Blank input is a
    /// `QueryError::Validation`; an empty result is `Ok(None)`.
    pub fn filter_year_genre(&self, year: &str, genre: &str) -> Result<Option<Vec<YearGenreMatch>>, QueryError> {
        if year.trim().is_empty() || genre.trim().is_empty() {
            return Err(QueryError::Validation);
        }
        let genre_key = genre.to_lowercase();

        let mut rows: Vec<YearGenreMatch> = self
            .join_artist_tracks()
            .into_iter()
            .filter_map(|row| {
                let track = row.track?;
                let year_matches = track
                    .release_year
                    .is_some_and(|release_year| release_year.to_string() == year);
                if !year_matches || !contains_ignore_case(&row.artist.genres, &genre_key) {
                    return None;
                }
                Some(YearGenreMatch {
                    name: track.name.clone(),
                    popularity: track.popularity,
                    artists: track.artists.clone(),
                })
            })
            .collect();

        if rows.is_empty() {
            return Ok(None);
        }

        rows.sort_by(compare_year_genre);
        Ok(Some(rows))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReferenceError;
    use crate::loader::tests::fixture;
    use crate::models::ChartEntry;
    use crate::reference::{NoReference, PageResolution};
    use chrono::NaiveDate;

    struct FoundLookup;

    impl ReferenceLookup for FoundLookup {
        fn resolve(&self, artist: &str) -> Result<PageResolution, ReferenceError> {
            Ok(PageResolution::Found(format!("https://example.org/{}", artist)))
        }
    }

    fn artist(id: &str, name: &str, followers: u64, genres: &str) -> Artist {
        Artist {
            id: id.to_string(),
            name: normalize_artist_key(name),
            followers,
            genres: genres.to_string(),
        }
    }

    fn track(name: &str, artists: &str, id_artists: &str, popularity: u32, year: Option<i32>) -> Track {
        let release_date = year.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1));
        Track {
            id: format!("t-{}", name),
            name: name.to_string(),
            artists: artists.to_string(),
            id_artists: id_artists.to_string(),
            popularity,
            release_date,
            release_year: year,
        }
    }

    fn chart(artist: &str, title: &str) -> ChartEntry {
        ChartEntry {
            artist: artist.to_string(),
            title: title.to_string(),
        }
    }

    fn queen_dataset() -> Dataset {
        Dataset::from_tables(
            vec![
                artist("A1", "Queen", 1200, "rock, glam rock"),
                artist("A2", "Queens of the Stone Age", 300, "stoner rock"),
                artist("A3", "Loner", 5, "folk"),
            ],
            vec![
                track("Bohemian Rhapsody", "Queen", "A1", 90, Some(1975)),
                track("Under Pressure", "Queen, David Bowie", "A1, B1", 80, Some(1981)),
                track("Lost Demo", "Queen", "A1", 80, None),
                track("Innuendo", "Queen", "A1", 60, Some(1991)),
                track("No One Knows", "Queens of the Stone Age", "A2", 85, Some(2002)),
            ],
            vec![
                chart("Queen", "Bohemian Rhapsody"),
                chart("Queen", "Bohemian Rhapsody"),
                chart("Queen", "Under Pressure"),
            ],
        )
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let dataset = queen_dataset();
        let lower = dataset.lookup_artist("queen", &NoReference);
        assert!(lower.is_some());
        assert_eq!(dataset.lookup_artist("Queen", &NoReference), lower);
        assert_eq!(dataset.lookup_artist("QUEEN", &NoReference), lower);
    }

    #[test]
    fn test_lookup_requires_exact_name() {
        let dataset = queen_dataset();
        // Substring of a real artist and of track credits, still not found
        assert_eq!(dataset.lookup_artist("quee", &NoReference), None);
        assert_eq!(dataset.lookup_artist("", &NoReference), None);
        assert_eq!(dataset.lookup_artist("   ", &NoReference), None);
    }

    #[test]
    fn test_lookup_profile() {
        let dataset = queen_dataset();
        let profile = dataset.lookup_artist("Queen", &FoundLookup).unwrap();

        assert_eq!(profile.followers, 1200);
        assert_eq!(profile.chart_singles, 2);
        assert_eq!(profile.reference_link.as_deref(), Some("https://example.org/Queen"));

        // Credit match is loose: Queens of the Stone Age and the Bowie duet count
        let popular = profile.top_popular.unwrap();
        assert_eq!(popular.len(), 3);
        assert_eq!(
            popular,
            vec![
                PopularTrack { name: "Bohemian Rhapsody".to_string(), popularity: 90 },
                PopularTrack { name: "No One Knows".to_string(), popularity: 85 },
                PopularTrack { name: "Under Pressure".to_string(), popularity: 80 },
            ]
        );
        assert!(popular.windows(2).all(|w| w[0].popularity >= w[1].popularity));

        let recent = profile.top_recent.unwrap();
        let years: Vec<Option<i32>> = recent.iter().map(|r| r.release_year).collect();
        assert_eq!(years, vec![Some(2002), Some(1991), Some(1981)]);
    }

    #[test]
    fn test_lookup_without_tracks_or_chart() {
        let dataset = queen_dataset();
        let profile = dataset.lookup_artist("loner", &NoReference).unwrap();
        assert_eq!(profile.followers, 5);
        assert_eq!(profile.top_popular, None);
        assert_eq!(profile.top_recent, None);
        assert_eq!(profile.chart_singles, 0);
        assert_eq!(profile.reference_link, None);
    }

    #[test]
    fn test_unknown_year_never_outranks_known_year() {
        let a = track("Undated", "X", "A", 10, None);
        let b = track("Old", "X", "A", 10, Some(1950));
        let c = track("Also Undated", "X", "A", 10, None);
        let ranked = top_by_recency(&[&a, &b, &c], 3);
        assert_eq!(ranked[0].name, "Old");
        assert_eq!(ranked[1].name, "Undated");
        assert_eq!(ranked[2].name, "Also Undated");
    }

    #[test]
    fn test_popularity_ties_keep_catalogue_order() {
        let a = track("First", "X", "A", 50, None);
        let b = track("Second", "X", "A", 50, None);
        let c = track("Third", "X", "A", 70, None);
        let d = track("Fourth", "X", "A", 50, None);
        let ranked = top_by_popularity(&[&a, &b, &c, &d], TOP_TRACKS);
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Third", "First", "Second"]);
    }

    #[test]
    fn test_chart_singles_case_insensitive() {
        let dataset = queen_dataset();
        assert_eq!(dataset.chart_singles("queen"), 2);
        assert_eq!(dataset.chart_singles("abba"), 0);
    }

    #[test]
    fn test_search_title() {
        let dataset = queen_dataset();
        let results = dataset.search_title("PRESSURE").unwrap();
        assert_eq!(
            results,
            vec![TitleMatch {
                name: "Under Pressure".to_string(),
                artists: "Queen, David Bowie".to_string(),
                popularity: 80,
            }]
        );
        assert_eq!(dataset.search_title("no such song"), None);
    }

    #[test]
    fn test_search_title_truncates_to_most_popular() {
        let tracks: Vec<Track> = (0..25)
            .map(|i| track(&format!("Love Song {}", i), "Someone", "S1", i, Some(2000)))
            .collect();
        let dataset = Dataset::from_tables(vec![], tracks, vec![]);

        let results = dataset.search_title("love").unwrap();
        assert_eq!(results.len(), TITLE_RESULTS);
        assert_eq!(results[0].popularity, 24);
        assert_eq!(results[19].popularity, 5);
        assert!(results.windows(2).all(|w| w[0].popularity >= w[1].popularity));
    }

    #[test]
    fn test_search_title_on_fixture_sees_stripped_names() {
        let dataset = fixture();
        assert!(dataset.search_title("Don't").is_none());
        let results = dataset.search_title("dont stop").unwrap();
        assert_eq!(results[0].name, "Dont Stop Me Now");
    }

    #[test]
    fn test_filter_validation_vs_no_results() {
        let dataset = queen_dataset();
        assert_eq!(dataset.filter_year_genre("", "rock"), Err(QueryError::Validation));
        assert_eq!(dataset.filter_year_genre("1975", "  "), Err(QueryError::Validation));
        assert_eq!(dataset.filter_year_genre("1999", "zz留no-such-genre"), Ok(None));
    }

    #[test]
    fn test_filter_join_correctness() {
        let dataset = Dataset::from_tables(
            vec![artist("A1", "A1 Name", 0, "pop, rock")],
            vec![track("X", "A1 Name", "A1", 50, Some(2001))],
            vec![],
        );
        let rows = dataset.filter_year_genre("2001", "pop").unwrap().unwrap();
        assert_eq!(
            rows,
            vec![YearGenreMatch {
                name: "X".to_string(),
                popularity: 50,
                artists: "A1 Name".to_string(),
            }]
        );
    }

    #[test]
    fn test_filter_sort_tie_break() {
        let dataset = Dataset::from_tables(
            vec![artist("A1", "one", 0, "Pop"), artist("A2", "two", 0, "synthpop")],
            vec![
                track("Low", "beta", "A1", 10, Some(1999)),
                track("Tie b", "beta", "A1", 40, Some(1999)),
                track("Tie B", "Beta", "A2", 40, Some(1999)),
                track("Tie a", "alpha", "A2", 40, Some(1999)),
                track("Wrong Year", "alpha", "A2", 99, Some(2000)),
            ],
            vec![],
        );
        let rows = dataset.filter_year_genre("1999", "POP").unwrap().unwrap();
        let order: Vec<(&str, u32)> = rows.iter().map(|r| (r.artists.as_str(), r.popularity)).collect();
        // Case-sensitive: "Beta" < "alpha" < "beta"
        assert_eq!(order, vec![("Beta", 40), ("alpha", 40), ("beta", 40), ("beta", 10)]);
    }

    #[test]
    fn test_filter_year_is_textual() {
        let dataset = queen_dataset();
        assert!(dataset.filter_year_genre("1975", "rock").unwrap().is_some());
        assert_eq!(dataset.filter_year_genre("1975.0", "rock"), Ok(None));
        assert_eq!(dataset.filter_year_genre("197", "rock"), Ok(None));
    }

    #[test]
    fn test_join_is_artist_driven() {
        let dataset = queen_dataset();
        let joined = dataset.join_artist_tracks();

        // Multi-id credit "A1, B1" joins nothing; "Loner" is kept without a track
        let loner: Vec<_> = joined.iter().filter(|row| row.artist.id == "A3").collect();
        assert_eq!(loner.len(), 1);
        assert!(loner[0].track.is_none());
        assert!(joined
            .iter()
            .filter_map(|row| row.track)
            .all(|t| t.name != "Under Pressure"));
        assert_eq!(joined.len(), 3 + 1 + 1);
    }

    #[test]
    fn test_suggest_artists() {
        let dataset = queen_dataset();
        assert_eq!(dataset.suggest_artists("Quen", 3), vec!["queen".to_string()]);
        assert!(dataset.suggest_artists("zzzz", 3).is_empty());
        assert!(dataset.suggest_artists("", 3).is_empty());
    }
}
