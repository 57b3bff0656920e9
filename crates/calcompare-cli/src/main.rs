//! `calcompare` CLI: group availability and meeting suggestions from the
//! command line.
//!
//! ## Usage
//!
//! ```sh
//! # Normalize every participant's events into merged UTC busy intervals
//! calcompare normalize -i query.json
//!
//! # Windows where at least 2 participants are free for 30+ minutes
//! calcompare availability -i query.json --quorum 2 --min-duration 30
//!
//! # Top 3 one-hour meeting suggestions, labelled in Berlin time
//! calcompare suggest -i query.json --duration 60 --max 3 --time-zone Europe/Berlin
//!
//! # Ranking and normalization knobs from a config file, with debug logs
//! calcompare -vv --config calcompare.json suggest -i query.json --duration 45
//! ```
//!
//! The input document looks like:
//!
//! ```json
//! {
//!   "window": { "start": "2026-03-16T09:00:00Z", "end": "2026-03-16T17:00:00Z",
//!               "min_duration_minutes": 30, "quorum": 2 },
//!   "participants": {
//!     "alice": [{ "start": { "dateTime": "2026-03-16T10:00:00Z" },
//!                 "end":   { "dateTime": "2026-03-16T11:00:00Z" } }]
//!   }
//! }
//! ```

mod config;
mod dto;

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use calcompare_engine::{
    compute_availability_with, normalize_events, suggest_meetings, SuggestionRequest,
};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::dto::{
    minutes, parse_datetime, AvailabilityOutput, NormalizeOutput, ParticipantBusy, QueryDocument,
    SuggestOutput, WindowEcho, WindowOverrides,
};

#[derive(Parser)]
#[command(
    name = "calcompare",
    version,
    about = "Compare calendars: shared availability and ranked meeting slots"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file with ranking weights and normalization options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); logs go to stderr
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args)]
struct IoArgs {
    /// Input query document (reads from stdin if omitted)
    #[arg(short, long)]
    input: Option<String>,
    /// Output file (writes to stdout if omitted)
    #[arg(short, long)]
    output: Option<String>,
}

#[derive(Args)]
struct WindowArgs {
    /// Minimum number of participants that must be free (default: everyone)
    #[arg(long)]
    quorum: Option<usize>,
    /// Drop free windows shorter than this many minutes
    #[arg(long = "min-duration")]
    min_duration: Option<i64>,
}

impl WindowArgs {
    fn overrides(&self) -> WindowOverrides {
        WindowOverrides {
            quorum: self.quorum,
            min_duration_minutes: self.min_duration,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize each participant's events into merged UTC busy intervals
    Normalize {
        #[command(flatten)]
        io: IoArgs,
    },
    /// List windows in which a quorum of participants is free
    Availability {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Propose and rank meeting slots of a fixed duration
    Suggest {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        window: WindowArgs,
        /// Meeting length in minutes
        #[arg(long)]
        duration: i64,
        /// Maximum number of suggestions
        #[arg(long, default_value_t = 5)]
        max: usize,
        /// Minutes between candidate start times (default 30, or the config's step_minutes)
        #[arg(long)]
        step: Option<i64>,
        /// Reference instant for proximity scoring; earlier candidates are dropped
        #[arg(long)]
        now: Option<String>,
        /// IANA zone for weekday and time-of-day scoring (default UTC)
        #[arg(long = "time-zone")]
        time_zone: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = EngineConfig::load(cli.config.as_deref())?;
    let options = config.normalize_options()?;

    match cli.command {
        Commands::Normalize { io } => {
            let doc = read_document(io.input.as_deref())?;
            let horizon = doc.horizon()?;

            let mut participants = BTreeMap::new();
            for (id, events) in &doc.participants {
                let normalized = normalize_events(events, &horizon, &options);
                info!(
                    participant = %id,
                    busy = normalized.busy.len(),
                    skipped = normalized.report.skipped_events,
                    "normalized"
                );
                participants.insert(
                    id.clone(),
                    ParticipantBusy {
                        busy: normalized.busy,
                        report: normalized.report,
                    },
                );
            }

            write_json(io.output.as_deref(), &NormalizeOutput { participants })?;
        }
        Commands::Availability { io, window } => {
            let doc = read_document(io.input.as_deref())?;
            let query = doc.query_window(window.overrides())?;

            let availability = compute_availability_with(&doc.participants, &query, &options)
                .context("Failed to compute availability")?;
            info!(
                slots = availability.slots.len(),
                skipped = availability.skipped_events(),
                "availability computed"
            );

            let total_available_minutes = availability
                .slots
                .iter()
                .map(|slot| slot.duration_minutes)
                .sum();
            let output = AvailabilityOutput {
                window: WindowEcho::new(&query, doc.participants.len()),
                total_slots_found: availability.slots.len(),
                total_available_minutes,
                slots: availability.slots,
                diagnostics: availability.diagnostics,
            };
            write_json(io.output.as_deref(), &output)?;
        }
        Commands::Suggest {
            io,
            window,
            duration,
            max,
            step,
            now,
            time_zone,
        } => {
            let doc = read_document(io.input.as_deref())?;
            let query = doc.query_window(window.overrides())?;

            let step_minutes = step.or(config.step_minutes).unwrap_or(30);
            if step_minutes <= 0 {
                bail!("--step must be a positive number of minutes (got {})", step_minutes);
            }
            if duration <= 0 {
                bail!("--duration must be a positive number of minutes (got {})", duration);
            }

            let mut request = SuggestionRequest::new(minutes("--duration", duration)?, max)
                .with_step(minutes("--step", step_minutes)?)
                .with_weights(config.weights)
                .with_weekday_scores(config.weekday_scores)
                .with_time_zone(config.ranking_time_zone(time_zone.as_deref())?);
            if let Some(now) = now.as_deref() {
                request = request.with_now(parse_datetime(now)?);
            }

            let availability = compute_availability_with(&doc.participants, &query, &options)
                .context("Failed to compute availability")?;
            let suggestions = suggest_meetings(&availability.slots, &request)
                .context("Failed to rank meeting suggestions")?;
            info!(
                slots = availability.slots.len(),
                suggestions = suggestions.len(),
                "suggestions ranked"
            );

            let output = SuggestOutput {
                window: WindowEcho::new(&query, doc.participants.len()),
                meeting_duration_minutes: duration,
                suggestions,
                diagnostics: availability.diagnostics,
            };
            write_json(io.output.as_deref(), &output)?;
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays pure JSON. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_document(path: Option<&str>) -> Result<QueryDocument> {
    let text = read_input(path)?;
    serde_json::from_str(&text).context("Failed to parse query document")
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_json<T: serde::Serialize>(path: Option<&str>, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    content.push('\n');
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
