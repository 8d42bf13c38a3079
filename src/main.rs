use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use spotify_explorer::error::QueryError;
use spotify_explorer::loader::{load_shared, DataPaths, Dataset, DEFAULT_DATA_DIR};
use spotify_explorer::models::ArtistProfile;
use spotify_explorer::progress::{format_duration, set_log_only};
use spotify_explorer::reference::{NoReference, ReferenceLookup, WikipediaLookup};

#[derive(Parser)]
#[command(name = "spotify-explorer")]
#[command(about = "Search the Spotify artists / tracks / top-200 catalogue")]
struct Args {
    /// Directory holding artists.csv, tracks.csv and spotify_top200_global.csv
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Override the artists table location
    #[arg(long, global = true)]
    artists: Option<PathBuf>,

    /// Override the tracks table location
    #[arg(long, global = true)]
    tracks: Option<PathBuf>,

    /// Override the top-200 chart table location
    #[arg(long, global = true)]
    chart: Option<PathBuf>,

    #[arg(long, global = true, default_value = "0")]
    workers: usize,

    /// Hide progress bars and log plain phase lines instead
    #[arg(long, global = true)]
    log_only: bool,

    /// Skip the Wikipedia lookup for artist links
    #[arg(long, global = true)]
    offline: bool,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Write load statistics to this JSON file
    #[arg(long, global = true)]
    stats_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look up an artist by exact (case-insensitive) name
    Artist {
        #[arg(required = true)]
        name: Vec<String>,
    },
    /// Search tracks whose title contains the given text
    Title {
        #[arg(required = true)]
        title: Vec<String>,
    },
    /// List tracks from one release year by artists of a genre
    Filter {
        #[arg(long)]
        year: String,
        #[arg(long)]
        genre: String,
    },
    /// Print load statistics
    Stats,
    /// Interactive mode: one query per line
    Shell,
}

enum Query {
    Artist(String),
    Title(String),
    Filter { year: String, genre: String },
}

/// How a query ended, for rendering and exit codes.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Shown,
    Empty,
    Invalid,
}

const SUGGESTION_LIMIT: usize = 5;

impl Args {
    fn data_paths(&self) -> DataPaths {
        let defaults = DataPaths::in_dir(&self.data_dir);
        DataPaths {
            artists: self.artists.clone().unwrap_or(defaults.artists),
            tracks: self.tracks.clone().unwrap_or(defaults.tracks),
            chart: self.chart.clone().unwrap_or(defaults.chart),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_profile(name: &str, profile: &ArtistProfile) {
    println!("\nArtist: {}", name);
    println!("{:-<80}", "");
    println!("  Followers:       {}", profile.followers);
    println!("  Top-200 singles: {}", profile.chart_singles);
    match &profile.reference_link {
        Some(link) => println!("  Wikipedia:       {}", link),
        None => println!("  Wikipedia:       no link available"),
    }

    if let Some(popular) = &profile.top_popular {
        println!("\nMost popular tracks:");
        for track in popular {
            println!("  {:>4}  {}", track.popularity, track.name);
        }
    }
    if let Some(recent) = &profile.top_recent {
        println!("\nMost recent tracks:");
        for track in recent {
            let year = track
                .release_year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!("  {:>4}  {}", year, track.name);
        }
    }
}

fn run_query(dataset: &Dataset, lookup: &dyn ReferenceLookup, query: &Query, json: bool) -> Result<Outcome> {
    match query {
        Query::Artist(name) => match dataset.lookup_artist(name, lookup) {
            Some(profile) => {
                if json {
                    print_json(&serde_json::json!({ "artist": name, "profile": profile }))?;
                } else {
                    render_profile(name, &profile);
                }
                Ok(Outcome::Shown)
            }
            None => {
                eprintln!("Warning: artist '{}' not found.", name);
                let suggestions = dataset.suggest_artists(name, SUGGESTION_LIMIT);
                if !suggestions.is_empty() {
                    eprintln!("Did you mean: {}?", suggestions.join(", "));
                }
                Ok(Outcome::Empty)
            }
        },
        Query::Title(title) => match dataset.search_title(title) {
            Some(results) => {
                if json {
                    print_json(&results)?;
                } else {
                    println!("\nResults for '{}':", title);
                    println!("{:-<80}", "");
                    for row in &results {
                        println!("  {:>4}  {} - {}", row.popularity, row.artists, row.name);
                    }
                }
                Ok(Outcome::Shown)
            }
            None => {
                eprintln!("Warning: no results found.");
                Ok(Outcome::Empty)
            }
        },
        Query::Filter { year, genre } => match dataset.filter_year_genre(year, genre) {
            Ok(Some(rows)) => {
                if json {
                    print_json(&rows)?;
                } else {
                    println!("\n{} tracks from {} in genre '{}':", rows.len(), year, genre);
                    println!("{:-<80}", "");
                    for row in &rows {
                        println!("  {:>4}  {} - {}", row.popularity, row.artists, row.name);
                    }
                }
                Ok(Outcome::Shown)
            }
            Ok(None) => {
                eprintln!("Warning: no results for {} in genre '{}'.", year, genre);
                Ok(Outcome::Empty)
            }
            Err(QueryError::Validation) => {
                eprintln!("Error: {}", QueryError::Validation);
                Ok(Outcome::Invalid)
            }
        },
    }
}

// ============================================================================
// Interactive Shell
// ============================================================================

fn parse_shell_line(line: &str) -> Option<Result<Query, &'static str>> {
    let line = line.trim();
    let (mode, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let query = match mode.to_lowercase().as_str() {
        "" => return None,
        "artist" if rest.is_empty() => Err("Please enter an artist name"),
        "artist" => Ok(Query::Artist(rest.to_string())),
        "title" if rest.is_empty() => Err("Please enter a track title"),
        "title" => Ok(Query::Title(rest.to_string())),
        "filter" => {
            let (year, genre) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Ok(Query::Filter {
                year: year.to_string(),
                genre: genre.trim().to_string(),
            })
        }
        _ => Err("Modes: artist <name> | title <text> | filter <year> <genre> | quit"),
    };
    Some(query)
}

fn run_shell(dataset: &Dataset, lookup: &dyn ReferenceLookup, json: bool) -> Result<()> {
    println!("Modes: artist <name> | title <text> | filter <year> <genre> | quit");
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if matches!(line.trim(), "quit" | "exit") {
            break;
        }

        match parse_shell_line(&line) {
            None => continue,
            Some(Err(hint)) => eprintln!("{}", hint),
            Some(Ok(query)) => {
                run_query(dataset, lookup, &query, json)?;
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let start = Instant::now();
    let paths = args.data_paths();
    let dataset = load_shared(&paths).context("Failed to load catalogue")?;
    if args.log_only {
        eprintln!("[LOAD] Ready in {}", format_duration(start.elapsed()));
    }

    if let Some(path) = &args.stats_out {
        dataset
            .stats()
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {:?}", path))?;
    }

    let lookup: Box<dyn ReferenceLookup> = if args.offline {
        Box::new(NoReference)
    } else {
        Box::new(WikipediaLookup::new())
    };

    let query = match args.command {
        Command::Artist { name } => Query::Artist(name.join(" ")),
        Command::Title { title } => Query::Title(title.join(" ")),
        Command::Filter { year, genre } => Query::Filter { year, genre },
        Command::Stats => {
            let stats = dataset.stats();
            if args.json {
                print_json(stats)?;
            } else {
                stats.log_phase("load");
                println!("Dated tracks: {:.1}%", stats.dated_rate());
            }
            return Ok(());
        }
        Command::Shell => return run_shell(dataset, lookup.as_ref(), args.json),
    };

    if run_query(dataset, lookup.as_ref(), &query, args.json)? == Outcome::Invalid {
        std::process::exit(2);
    }
    Ok(())
}
