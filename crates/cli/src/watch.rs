//! The watch loop: register paths, print events until told to stop

use crate::output::Printer;
use crate::util::{load_config, parse_event_flags};
use crate::Cli;
use anyhow::{Context, Result};
use inwatch_watcher::{Error, Watcher};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let flags = parse_event_flags(&cli.events)?;

    let watcher = Arc::new(Watcher::with_config(config).context("Failed to create watcher")?);
    for path in &cli.paths {
        watcher
            .add_watch(path, flags)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
    }
    info!("Watching {} path(s) for {:?}", cli.paths.len(), flags);

    // Ctrl-C closes the watcher; the blocked wait then returns Closed
    let signal_watcher = Arc::clone(&watcher);
    let signal_task = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, closing watcher");
                signal_watcher.close();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let printer = Printer::new(cli.json);
    let count = cli.count;
    let loop_watcher = Arc::clone(&watcher);
    let result = tokio::task::spawn_blocking(move || print_events(&loop_watcher, &printer, count))
        .await
        .context("Event loop panicked")?;

    signal_task.abort();
    debug!("Stats: {:?}", watcher.stats());
    result
}

/// Block on the watcher and print each event
///
/// Returns once `count` events were printed or the watcher closed.
fn print_events(watcher: &Watcher, printer: &Printer, count: Option<u64>) -> Result<()> {
    let mut printed = 0u64;

    loop {
        match watcher.wait_event() {
            Ok(event) => {
                printer.print(&event)?;
                printed += 1;

                if count.is_some_and(|count| printed >= count) {
                    watcher.close();
                    return Ok(());
                }
            }
            Err(e) if e.is_closed() => return Ok(()),
            // The buffer was discarded; later events are still good
            Err(e @ (Error::Inconsistent { .. } | Error::BufferUnderrun { .. })) => {
                warn!("{}", e);
            }
            Err(e) => return Err(e).context("Waiting for events failed"),
        }
    }
}
