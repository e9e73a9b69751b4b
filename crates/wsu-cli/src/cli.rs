use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "wsu", version, about = "JS monorepo task orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Force plain-text (`OK`/`FAIL`) symbols instead of Unicode glyphs.
    #[arg(long, global = true)]
    pub ascii: bool,

    /// Increase log verbosity (`-v`, `-vv`); overrides `RUST_LOG`.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run an arbitrary package script across the workspace.
    Run {
        script: String,
        #[arg(long)]
        filter: Option<String>,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
        #[arg(long)]
        sequential: bool,
    },
    /// Run the `build` script, respecting dependency order and the cache.
    Build {
        #[arg(long)]
        filter: Option<String>,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
        #[arg(long)]
        no_skip_unchanged: bool,
    },
    /// Run the `dev` script in parallel across the workspace until interrupted.
    Dev {
        #[arg(long)]
        filter: Option<String>,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Delete `node_modules` (and build output directories) for selected packages.
    Clean {
        #[arg(long)]
        filter: Option<String>,
    },
    /// Inspect or clear the on-disk build cache.
    Cache {
        #[command(subcommand)]
        action: Option<CacheAction>,
    },
}

#[derive(Debug, Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Report package count, valid/stale split, and on-disk size (default).
    Status,
    /// Remove every cached entry.
    Clear,
}
