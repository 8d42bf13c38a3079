//! Dataset loader and the process-wide catalogue cache.
//!
//! The three CSV inputs are read, cleaned (see `normalize`) and held in memory
//! for the lifetime of the process. `load_shared` is the memoized entry point:
//! the first successful load wins and every later call gets the same instance.

use csv::{Reader, ReaderBuilder, StringRecord};
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{LoadError, LoadResult};
use crate::models::{Artist, ArtistRow, ArtistSingleCount, ChartEntry, ChartRow, LoadStats, Track};
use crate::normalize::{clean_artist, clean_chart_entry, clean_track_record, count_singles};
use crate::progress::{create_progress_bar, create_spinner, finish, format_duration, log_phase};

pub const DEFAULT_DATA_DIR: &str = "data";
pub const ARTISTS_FILE: &str = "artists.csv";
pub const TRACKS_FILE: &str = "tracks.csv";
pub const CHART_FILE: &str = "spotify_top200_global.csv";

const ARTIST_COLUMNS: &[&str] = &["id", "name", "followers", "genres"];
const TRACK_COLUMNS: &[&str] = &["id", "name", "popularity", "artists", "id_artists", "release_date"];
const CHART_COLUMNS: &[&str] = &["Artist", "Title"];

static DATASET: OnceCell<Dataset> = OnceCell::new();

/// Locations of the three input tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataPaths {
    pub artists: PathBuf,
    pub tracks: PathBuf,
    pub chart: PathBuf,
}

impl DataPaths {
    /// Standard file names under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            artists: dir.join(ARTISTS_FILE),
            tracks: dir.join(TRACKS_FILE),
            chart: dir.join(CHART_FILE),
        }
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::in_dir(DEFAULT_DATA_DIR)
    }
}

/// The cleaned, read-only catalogue.
#[derive(Clone, Debug)]
pub struct Dataset {
    artists: Vec<Artist>,
    tracks: Vec<Track>,
    chart: Vec<ChartEntry>,
    single_counts: Vec<ArtistSingleCount>,
    stats: LoadStats,
}

impl Dataset {
    /// Read and clean the catalogue from disk, bypassing the shared cache.
    pub fn load(paths: &DataPaths) -> LoadResult<Self> {
        log_phase("LOAD", &format!("Opening catalogue: {:?}", paths));

        // Every input must be readable before any parsing starts
        let artists = open(&paths.artists)?;
        let tracks = open(&paths.tracks)?;
        let chart = open(&paths.chart)?;

        Self::from_readers(artists, tracks, chart)
    }

    /// Read and clean the catalogue from arbitrary CSV sources.
    pub fn from_readers<A: Read, T: Read, C: Read>(artists: A, tracks: T, chart: C) -> LoadResult<Self> {
        let start = Instant::now();

        let artists = read_artists(artists)?;
        let tracks = read_tracks(tracks)?;
        let chart = read_chart(chart)?;

        let mut dataset = Self::from_tables(artists, tracks, chart);
        dataset.stats.elapsed_seconds = start.elapsed().as_secs_f64();
        log_phase(
            "LOAD",
            &format!("Catalogue ready in {}", format_duration(start.elapsed())),
        );
        Ok(dataset)
    }

    /// Assemble a dataset from already-cleaned tables and derive the chart counts.
    pub fn from_tables(artists: Vec<Artist>, tracks: Vec<Track>, chart: Vec<ChartEntry>) -> Self {
        let single_counts = count_singles(&chart);
        let stats = LoadStats {
            artists: artists.len(),
            artists_without_genres: artists.iter().filter(|a| a.genres.is_empty()).count(),
            tracks: tracks.len(),
            tracks_without_release_year: tracks.iter().filter(|t| t.release_year.is_none()).count(),
            chart_entries: chart.len(),
            chart_artists: single_counts.len(),
            elapsed_seconds: 0.0,
        };

        Self {
            artists,
            tracks,
            chart,
            single_counts,
            stats,
        }
    }

    pub fn artists(&self) -> &[Artist] {
        &self.artists
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn chart(&self) -> &[ChartEntry] {
        &self.chart
    }

    pub fn single_counts(&self) -> &[ArtistSingleCount] {
        &self.single_counts
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }
}

/// Load the catalogue once per process and hand out the shared instance.
///
/// Concurrent first callers block until one initialization finishes. A failed
/// load leaves the cache empty. Once populated, `paths` is ignored.
pub fn load_shared(paths: &DataPaths) -> LoadResult<&'static Dataset> {
    if let Some(dataset) = DATASET.get() {
        log_phase("CACHE", "Reusing loaded catalogue");
        return Ok(dataset);
    }
    DATASET.get_or_try_init(|| Dataset::load(paths))
}

/// The shared catalogue, if it has been loaded.
pub fn shared() -> Option<&'static Dataset> {
    DATASET.get()
}

// ============================================================================
// Table Readers
// ============================================================================

fn open(path: &Path) -> LoadResult<File> {
    File::open(path).map_err(|source| LoadError::FileAccess {
        path: path.to_path_buf(),
        source,
    })
}

fn csv_reader<R: Read>(source: R) -> Reader<R> {
    ReaderBuilder::new().has_headers(true).from_reader(source)
}

fn require_columns<R: Read>(
    reader: &mut Reader<R>,
    table: &'static str,
    required: &[&'static str],
) -> LoadResult<StringRecord> {
    let headers = reader
        .headers()
        .map_err(|source| LoadError::Parse { table, source })?
        .clone();

    for &column in required {
        if !headers.iter().any(|h| h == column) {
            return Err(LoadError::MissingColumn { table, column });
        }
    }
    Ok(headers)
}

fn read_artists<R: Read>(source: R) -> LoadResult<Vec<Artist>> {
    let spinner = create_spinner("Reading artists");
    let mut reader = csv_reader(source);
    require_columns(&mut reader, "artists", ARTIST_COLUMNS)?;

    let artists = reader
        .deserialize::<ArtistRow>()
        .map(|row| row.map(clean_artist))
        .collect::<csv::Result<Vec<_>>>()
        .map_err(|source| LoadError::Parse {
            table: "artists",
            source,
        })?;

    finish(&spinner, "ARTISTS", format!("Read {} artists", artists.len()));
    Ok(artists)
}

fn read_tracks<R: Read>(source: R) -> LoadResult<Vec<Track>> {
    let spinner = create_spinner("Reading tracks");
    let mut reader = csv_reader(source);
    let headers = require_columns(&mut reader, "tracks", TRACK_COLUMNS)?;

    let records = reader
        .records()
        .collect::<csv::Result<Vec<StringRecord>>>()
        .map_err(|source| LoadError::Parse {
            table: "tracks",
            source,
        })?;
    finish(&spinner, "TRACKS", format!("Read {} raw tracks", records.len()));

    // Cleaning is per-row and order-preserving, so it parallelizes freely
    let pb = create_progress_bar(records.len() as u64, "Cleaning tracks");
    let tracks = records
        .par_iter()
        .map(|record| {
            let track = clean_track_record(record, &headers);
            pb.inc(1);
            track
        })
        .collect::<csv::Result<Vec<Track>>>()
        .map_err(|source| LoadError::Parse {
            table: "tracks",
            source,
        })?;

    finish(&pb, "TRACKS", format!("Cleaned {} tracks", tracks.len()));
    Ok(tracks)
}

fn read_chart<R: Read>(source: R) -> LoadResult<Vec<ChartEntry>> {
    let spinner = create_spinner("Reading chart");
    let mut reader = csv_reader(source);
    require_columns(&mut reader, "chart", CHART_COLUMNS)?;

    let chart = reader
        .deserialize::<ChartRow>()
        .map(|row| row.map(clean_chart_entry))
        .collect::<csv::Result<Vec<_>>>()
        .map_err(|source| LoadError::Parse {
            table: "chart",
            source,
        })?;

    finish(&spinner, "CHART", format!("Read {} chart entries", chart.len()));
    Ok(chart)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const ARTISTS_CSV: &str = "\
id,followers,genres,name,popularity
A1,1200.0,\"['rock', 'glam rock']\",Queen,80
A2,50.0,,Queenie,10
A3,,\"['pop']\",ABBA,75
";

    pub(crate) const TRACKS_CSV: &str = "\
id,name,popularity,duration_ms,explicit,artists,id_artists,release_date
t1,Bohemian Rhapsody,90,354000,0,['Queen'],['A1'],1975-10-31
t2,Don't Stop Me Now,85,209000,0,['Queen'],['A1'],1978
t3,Under Pressure,80,248000,0,\"['Queen', 'David Bowie']\",\"['A1', 'B1']\",1981-10
t4,Waterloo,70,166000,0,['ABBA'],['A3'],garbage
";

    pub(crate) const CHART_CSV: &str = "\
Rank,Title,Artist,Date
1,Bohemian Rhapsody,Queen,2020-01-01
2,Bohemian Rhapsody,Queen,2020-01-02
3,Radio Ga Ga,Queen,2020-01-02
4,Waterloo,ABBA,2020-01-03
";

    pub(crate) fn fixture() -> Dataset {
        Dataset::from_readers(
            ARTISTS_CSV.as_bytes(),
            TRACKS_CSV.as_bytes(),
            CHART_CSV.as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_from_readers_cleans_tables() {
        let dataset = fixture();

        let names: Vec<&str> = dataset.artists().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["queen", "queenie", "abba"]);
        assert_eq!(dataset.artists()[1].genres, "");
        assert_eq!(dataset.artists()[2].followers, 0);

        let tracks = dataset.tracks();
        assert_eq!(tracks.len(), 4);
        assert_eq!(tracks[1].name, "Dont Stop Me Now");
        assert_eq!(tracks[2].artists, "Queen, David Bowie");
        assert_eq!(tracks[2].id_artists, "A1, B1");
        assert_eq!(tracks[2].release_year, Some(1981));
        assert_eq!(tracks[3].release_date, None);
        assert_eq!(tracks[3].release_year, None);
        for track in tracks {
            assert!(!track.artists.contains(&['[', ']', '\''][..]));
            assert!(!track.id_artists.contains(&['[', ']', '\''][..]));
        }

        assert_eq!(dataset.single_counts().len(), 2);
        assert_eq!(dataset.single_counts()[1].artist, "Queen");
        assert_eq!(dataset.single_counts()[1].singles, 2);

        let stats = dataset.stats();
        assert_eq!(stats.tracks, 4);
        assert_eq!(stats.tracks_without_release_year, 1);
        assert_eq!(stats.chart_entries, 4);
        assert_eq!(stats.chart_artists, 2);
        assert_eq!(stats.artists_without_genres, 1);
    }

    #[test]
    fn test_load_is_idempotent() {
        let first = fixture();
        let second = fixture();
        assert_eq!(first.artists(), second.artists());
        assert_eq!(first.tracks(), second.tracks());
        assert_eq!(first.chart(), second.chart());
        assert_eq!(first.single_counts(), second.single_counts());
    }

    #[test]
    fn test_missing_column_is_parse_error() {
        let result = Dataset::from_readers(
            "id,name,followers\nA1,Queen,1\n".as_bytes(),
            TRACKS_CSV.as_bytes(),
            CHART_CSV.as_bytes(),
        );
        match result {
            Err(LoadError::MissingColumn { table, column }) => {
                assert_eq!(table, "artists");
                assert_eq!(column, "genres");
            }
            other => panic!("expected missing column, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_malformed_row_is_parse_error() {
        let tracks = "id,name,popularity,artists,id_artists,release_date\nt1,X,loud,['Q'],['A1'],1999\n";
        let result = Dataset::from_readers(ARTISTS_CSV.as_bytes(), tracks.as_bytes(), CHART_CSV.as_bytes());
        let err = result.err().unwrap();
        assert!(matches!(err, LoadError::Parse { table: "tracks", .. }));
        assert!(!err.is_file_access());
    }

    #[test]
    fn test_unreadable_file_is_file_access_error() {
        let paths = DataPaths::in_dir("/nonexistent/spotify-explorer");
        let err = Dataset::load(&paths).err().unwrap();
        assert!(err.is_file_access());
        assert!(err.to_string().contains("artists.csv"));
    }

    #[test]
    fn test_default_paths() {
        let paths = DataPaths::default();
        assert_eq!(paths.artists, PathBuf::from("data/artists.csv"));
        assert_eq!(paths.tracks, PathBuf::from("data/tracks.csv"));
        assert_eq!(paths.chart, PathBuf::from("data/spotify_top200_global.csv"));
    }

    #[test]
    fn test_load_shared_memoizes() {
        let dir = std::env::temp_dir().join(format!("spotify-explorer-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let paths = DataPaths::in_dir(&dir);
        std::fs::write(&paths.artists, ARTISTS_CSV).unwrap();
        std::fs::write(&paths.tracks, TRACKS_CSV).unwrap();
        std::fs::write(&paths.chart, CHART_CSV).unwrap();

        let first = load_shared(&paths).unwrap();
        // Removing the inputs proves the second call never touches storage
        std::fs::remove_dir_all(&dir).unwrap();
        let second = load_shared(&paths).unwrap();

        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(first, shared().unwrap()));
        assert_eq!(first.tracks().len(), 4);
    }
}
