mod commands;
mod logging;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use routine_core::DateRange;

use commands::Overrides;

#[derive(Parser)]
#[command(name = "routine-sync")]
#[command(about = "Keep a calendar in sync with a plain-text daily routine")]
#[command(version)]
struct Cli {
    /// Log debug detail, including batch payloads
    #[arg(long, global = true, conflicts_with = "quiet")]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RangeArgs {
    /// First date (YYYY-MM-DD)
    #[arg(short, long)]
    start: String,

    /// Last date, inclusive (YYYY-MM-DD)
    #[arg(short, long, conflicts_with = "days")]
    end: Option<String>,

    /// Number of days starting at --start
    #[arg(short, long)]
    days: Option<u32>,
}

impl RangeArgs {
    fn resolve(&self) -> Result<DateRange> {
        Ok(DateRange::from_args(&self.start, self.end.as_deref(), self.days)?)
    }
}

#[derive(Args)]
struct CalendarArgs {
    /// IANA timezone for the routine (e.g. "Europe/London")
    #[arg(short, long)]
    timezone: Option<String>,

    /// Calendar to write to (defaults to "primary")
    #[arg(short, long)]
    calendar: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the routine into the calendar for a range of dates
    Sync {
        /// Routine file (defaults to `source` from config.toml)
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        calendar: CalendarArgs,

        /// Operations per batch request
        #[arg(long)]
        batch_size: Option<usize>,

        /// Retries of a rate-limited batch
        #[arg(long)]
        max_retries: Option<u32>,

        /// Keep running and re-sync whenever the routine file changes
        #[arg(short, long)]
        watch: bool,
    },
    /// Show what a sync would change, without changing anything
    Status {
        /// Routine file (defaults to `source` from config.toml)
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        calendar: CalendarArgs,
    },
    /// Delete every event in a range of dates
    Clear {
        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        calendar: CalendarArgs,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.debug, cli.quiet)?;

    match cli.command {
        Commands::Sync {
            file,
            range,
            calendar,
            batch_size,
            max_retries,
            watch,
        } => {
            let overrides = Overrides {
                file,
                timezone: calendar.timezone,
                calendar_id: calendar.calendar,
                batch_size,
                max_retries,
            };
            commands::sync::run(overrides, range.resolve()?, watch).await
        }
        Commands::Status { file, range, calendar } => {
            let overrides = Overrides {
                file,
                timezone: calendar.timezone,
                calendar_id: calendar.calendar,
                ..Overrides::default()
            };
            commands::status::run(overrides, range.resolve()?).await
        }
        Commands::Clear { range, calendar, yes } => {
            let overrides = Overrides {
                timezone: calendar.timezone,
                calendar_id: calendar.calendar,
                ..Overrides::default()
            };
            commands::clear::run(overrides, range.resolve()?, yes).await
        }
    }
}
