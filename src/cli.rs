use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tidylinux",
    about = "A Linux disk cleanup tool: find and reclaim space from caches, logs and old kernels",
    version
)]
pub struct Cli {
    /// Config file (default: <config dir>/tidylinux/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List cleanup targets grouped by category
    Targets {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Estimate reclaimable space (nothing is deleted)
    Scan {
        /// Only show a specific category (e.g. "logs", "package-cache")
        #[arg(long)]
        category: Option<String>,

        /// Print the scan report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clean selected targets (requires --confirm to actually delete)
    Clean {
        /// Target ids to clean. Defaults to every safe target with space found.
        #[arg(long = "target", value_name = "ID")]
        targets: Vec<String>,

        /// Only clean targets in a specific category
        #[arg(long)]
        category: Option<String>,

        /// Allow targets flagged dangerous (e.g. old kernels)
        #[arg(long)]
        include_dangerous: bool,

        /// Actually delete. Without this flag, behaves like scan.
        #[arg(long)]
        confirm: bool,

        /// Print the cleanup report as JSON
        #[arg(long)]
        json: bool,
    },
}
