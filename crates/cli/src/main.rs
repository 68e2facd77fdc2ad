//! inwatch CLI - print filesystem events as they happen

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod logging;
mod output;
mod util;
mod watch;

/// inwatch - Watch files and directories for changes
#[derive(Parser, Debug)]
#[command(name = "inwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Files or directories to watch
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Event kinds to watch, comma separated (default: all)
    ///
    /// Kinds: open, attrib, close, close_write, close_nowrite, create,
    /// delete, delete_self, modify, move, moved_from, moved_to, move_self
    #[arg(short, long, value_delimiter = ',', value_name = "KINDS")]
    pub events: Vec<String>,

    /// Watcher configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Exit after this many events
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,

    /// Print one JSON object per event
    #[arg(long)]
    pub json: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    watch::run(cli).await
}
