use std::path::PathBuf;

use clap::{Parser, Subcommand};
use recent_visits::ManagerConfig;

#[derive(Parser, Debug)]
#[command(name = "recent-visits", about = "Inspect and edit a recent-visits snapshot file")]
pub struct Cli {
    /// Snapshot file
    #[arg(long, global = true, default_value = "rv.dat")]
    pub file: PathBuf,
    /// Maximum visits kept per user
    #[arg(long, global = true, default_value_t = 10)]
    pub max_visits: usize,
    /// fsync every snapshot write
    #[arg(long, global = true)]
    pub sync: bool,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Manager config for the selected file. Persistence errors are fatal here.
    pub fn manager_config(&self) -> ManagerConfig {
        let mut config = ManagerConfig::new(&self.file, self.max_visits);
        config.sync_writes = self.sync;
        config.strict_persistence = true;
        config
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a visit
    Add {
        user_id: u32,
        visit_id: u32,
        url: String,
        text: String,
    },
    /// Show a user's visits, newest first
    Recent {
        user_id: u32,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete visits by id
    Delete {
        user_id: u32,
        #[arg(required = true)]
        visit_ids: Vec<u32>,
    },
    /// Remove all visits for a user
    Clear { user_id: u32 },
    /// List known users and their visit counts
    Users,
    /// Record a few sample visits and print one user's history
    ///
    /// Only runs when `--file` does not exist yet. The file is deleted
    /// afterwards unless `--keep` is given.
    Demo {
        /// Keep the snapshot file afterwards
        #[arg(long)]
        keep: bool,
    },
}
