//! coursekit CLI
//!
//! Headless access to the coursekit core: caption lookup against a
//! transcript, transcript conversion, and paged course search.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use coursekit_core::captions::{
    convert, CaptionTracker, PlaybackClip, TranscriptFormat, TranscriptPayload,
};
use coursekit_core::search::{
    HttpSearchFetcher, PagedSearchController, SearchEvent, SearchFilters,
};
use coursekit_core::settings::{CoursekitSettings, SettingsManager};

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "coursekit", version, about, long_about = None)]
struct Cli {
    /// Directory holding coursekit.json (defaults are used when omitted)
    #[arg(long, global = true, value_name = "DIR")]
    config: Option<PathBuf>,

    /// Also write daily-rotated logs to this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the caption active at a playback time
    CaptionAt {
        /// sjson transcript file
        transcript: PathBuf,
        /// Player time in seconds
        #[arg(long)]
        time: f64,
        /// Playback speed the time was measured at
        #[arg(long)]
        speed: Option<f64>,
        /// Clip start in seconds
        #[arg(long)]
        clip_start: Option<f64>,
        /// Clip end in seconds
        #[arg(long)]
        clip_end: Option<f64>,
    },

    /// Print the captions starting within a range, as JSON
    Filter {
        /// sjson transcript file
        transcript: PathBuf,
        /// Range start in milliseconds
        #[arg(long)]
        start: f64,
        /// Range end in milliseconds (defaults to the last caption)
        #[arg(long)]
        end: Option<f64>,
    },

    /// Convert a transcript between sjson, srt and txt
    Convert {
        input: PathBuf,
        #[arg(long, default_value = "sjson")]
        from: String,
        #[arg(long)]
        to: String,
        /// Rescale sjson timings to this playback speed first
        #[arg(long)]
        speed: Option<f64>,
    },

    /// Search course content and print matching records as JSON lines
    Search {
        query: String,
        /// Facet filter, e.g. --filter modes=honor (repeatable)
        #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
        /// Restrict the search to one course
        #[arg(long)]
        course_id: Option<String>,
    },

    /// Inspect or reset the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Delete the settings file
    Reset,
}

fn parse_filter(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", value)),
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Installs the global subscriber; the returned guard must outlive logging.
fn init_logging(log_dir: Option<&Path>, verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let default_directive = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let _ = std::fs::create_dir_all(dir);
            let file_appender = tracing_appender::rolling::daily(dir, "coursekit.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
    guard
}

// =============================================================================
// Commands
// =============================================================================

fn load_settings(config: Option<&Path>) -> CoursekitSettings {
    match config {
        Some(dir) => SettingsManager::new(dir.to_path_buf()).load(),
        None => CoursekitSettings::default(),
    }
}

fn read_transcript(path: &Path) -> Result<TranscriptPayload> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript {}", path.display()))?;
    TranscriptPayload::from_json(&content)
        .with_context(|| format!("Failed to parse transcript {}", path.display()))
}

fn caption_at(
    settings: &CoursekitSettings,
    transcript: &Path,
    time: f64,
    speed: Option<f64>,
    clip_start: Option<f64>,
    clip_end: Option<f64>,
) -> Result<()> {
    let index = read_transcript(transcript)?.into_index();
    let clip = match (clip_start, clip_end) {
        (None, None) => None,
        (start, end) => Some(PlaybackClip::new(start.unwrap_or(0.0), end)),
    };

    let mut tracker = CaptionTracker::new(index, clip, settings.captions.lookahead_ms);
    let speed = speed.unwrap_or(settings.captions.default_speed);
    tracker.update(time, speed);

    let output = json!({
        "index": tracker.current_index(),
        "text": tracker.current_caption(),
    });
    println!("{}", output);
    Ok(())
}

fn filter(transcript: &Path, start: f64, end: Option<f64>) -> Result<()> {
    let index = read_transcript(transcript)?.into_index();
    let filtered = index.filter(start, end);
    println!("{}", serde_json::to_string_pretty(&filtered)?);
    Ok(())
}

fn convert_file(input: &Path, from: &str, to: &str, speed: Option<f64>) -> Result<()> {
    let from: TranscriptFormat = from.parse()?;
    let to: TranscriptFormat = to.parse()?;

    let mut content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    if let Some(speed) = speed {
        if from != TranscriptFormat::Sjson {
            bail!("--speed is only supported for sjson input");
        }
        content = TranscriptPayload::from_json(&content)?
            .rescale(speed, 1.0)?
            .to_json()?;
    }

    let output = convert(&content, from, to)?;
    print!("{}", output);
    Ok(())
}

async fn search(
    mut settings: CoursekitSettings,
    query: &str,
    filters: Vec<(String, String)>,
    pages: usize,
    course_id: Option<String>,
) -> Result<()> {
    if course_id.is_some() {
        settings.search.course_id = course_id;
    }

    let fetcher = HttpSearchFetcher::new(&settings.search)?;
    debug!("Searching {}", fetcher.url());

    let mut controller = PagedSearchController::new(Arc::new(fetcher), settings.search.page_size);
    let mut events = controller
        .take_event_receiver()
        .context("Search event receiver already taken")?;

    let filters: SearchFilters = filters.into_iter().collect();
    controller.perform_search(query, filters).await?;

    match events.recv().await {
        Some(SearchEvent::Search { query, total }) => {
            info!("{} result(s) for '{}'", total, query);
        }
        Some(SearchEvent::Error(e)) => return Err(e.into()),
        _ => bail!("Search finished without a result"),
    }

    if controller.snapshot().last_search_was_empty {
        warn!("Nothing matched the filters; showing unfiltered results");
    }

    for _ in 1..pages {
        if !controller.has_next_page() {
            break;
        }
        controller.load_next_page().await?;
        match events.recv().await {
            Some(SearchEvent::Next) => {}
            Some(SearchEvent::Error(e)) => return Err(e.into()),
            _ => bail!("Page load finished without a result"),
        }
    }

    for record in controller.snapshot().results {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

fn config(config_dir: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let settings = load_settings(config_dir);
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ConfigAction::Reset => {
            let Some(dir) = config_dir else {
                bail!("--config <DIR> is required to reset settings");
            };
            let manager = SettingsManager::new(dir.to_path_buf());
            manager.reset()?;
            info!("Removed {}", manager.settings_path().display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_dir.as_deref(), cli.verbose);
    let settings = load_settings(cli.config.as_deref());

    match cli.command {
        Command::CaptionAt {
            transcript,
            time,
            speed,
            clip_start,
            clip_end,
        } => caption_at(&settings, &transcript, time, speed, clip_start, clip_end),
        Command::Filter {
            transcript,
            start,
            end,
        } => filter(&transcript, start, end),
        Command::Convert {
            input,
            from,
            to,
            speed,
        } => convert_file(&input, &from, &to, speed),
        Command::Search {
            query,
            filters,
            pages,
            course_id,
        } => search(settings, &query, filters, pages, course_id).await,
        Command::Config { action } => config(cli.config.as_deref(), action),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(
            parse_filter("modes=honor"),
            Ok(("modes".to_string(), "honor".to_string()))
        );
        assert_eq!(
            parse_filter("org = edX"),
            Ok(("org".to_string(), "edX".to_string()))
        );
        assert!(parse_filter("modes").is_err());
        assert!(parse_filter("=honor").is_err());
    }

    #[test]
    fn test_parse_search_command() {
        let cli = Cli::try_parse_from([
            "coursekit",
            "search",
            "loops",
            "--filter",
            "modes=honor",
            "--filter",
            "org=edX",
            "--pages",
            "3",
        ])
        .unwrap();

        match cli.command {
            Command::Search {
                query,
                filters,
                pages,
                course_id,
            } => {
                assert_eq!(query, "loops");
                assert_eq!(filters.len(), 2);
                assert_eq!(pages, 3);
                assert!(course_id.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "coursekit",
            "caption-at",
            "t.sjson",
            "--time",
            "12.5",
            "--config",
            "/tmp/ck",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/ck")));
        assert!(matches!(cli.command, Command::CaptionAt { time, .. } if time == 12.5));
    }

    #[test]
    fn test_load_settings_without_config_uses_defaults() {
        assert_eq!(load_settings(None), CoursekitSettings::default());
    }
}
