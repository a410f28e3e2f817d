use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use pals_core::Rating;

#[derive(Parser)]
#[command(name = "pals")]
#[command(about = "Track visits offline and sync them when the remote is reachable")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to sync configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log a new visit
    #[command(alias = "add")]
    Log {
        /// Duration in seconds
        #[arg(short, long)]
        duration: u32,
        /// How it went
        #[arg(short, long, value_enum)]
        rating: RatingArg,
        /// Consistency on a 1-7 scale
        #[arg(short, long, default_value = "4")]
        consistency: u8,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recent visits
    Logs {
        /// Number of visits to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Only visits logged today (local time)
        #[arg(long)]
        today: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing visit
    EditLog {
        /// Visit ID or unique ID prefix
        id: String,
        #[arg(short, long)]
        duration: Option<u32>,
        #[arg(short, long, value_enum)]
        rating: Option<RatingArg>,
        #[arg(short, long)]
        consistency: Option<u8>,
        /// Replace notes (empty text clears them)
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a visit
    DeleteLog {
        /// Visit ID or unique ID prefix
        id: String,
    },
    /// List unlocked achievements
    Achievements {
        /// Also list catalog achievements not yet unlocked
        #[arg(long)]
        locked: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Unlock a catalog achievement by key
    Unlock {
        /// Catalog key, e.g. `streak_7`
        key: String,
    },
    /// Mark an achievement as viewed
    ViewAchievement {
        /// Achievement ID or unique ID prefix
        id: String,
    },
    /// Show device statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show pending mutations waiting for upload
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one sync cycle, or keep syncing in the background
    Sync {
        #[command(subcommand)]
        action: Option<SyncAction>,
    },
    /// Show sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum SyncAction {
    /// Sync periodically until interrupted with Ctrl-C
    Watch {
        /// Seconds between cycles (defaults to the configured interval)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum RatingArg {
    Great,
    Good,
    Okay,
    Bad,
    Terrible,
}

impl From<RatingArg> for Rating {
    fn from(value: RatingArg) -> Self {
        match value {
            RatingArg::Great => Self::Great,
            RatingArg::Good => Self::Good,
            RatingArg::Okay => Self::Okay,
            RatingArg::Bad => Self::Bad,
            RatingArg::Terrible => Self::Terrible,
        }
    }
}
