//! One-off scrape from the terminal.

use std::path::Path;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::browser::ChromeSession;
use crate::config::Settings;
use crate::error::ScrapeError;
use crate::export::to_csv;
use crate::models::{parse_exclusions, ProgressSnapshot, RunConfig, RunPhase};
use crate::scrape::{self, RunOptions};

/// Run a scrape with a progress bar.
///
/// The first Ctrl+C stops after the current parcel; a second aborts at once.
pub async fn cmd_scrape(
    mut settings: Settings,
    url: &str,
    exclude: &str,
    output: &Path,
    headed: bool,
) -> anyhow::Result<()> {
    if headed {
        settings.browser.headless = false;
    }
    let excluded = parse_exclusions(exclude);

    println!("{} Launching browser...", style("→").cyan());
    let session = ChromeSession::launch(&settings.browser, &settings.timing)
        .await
        .map_err(ScrapeError::SessionInitialization)?;

    let mut progress = scrape::start(
        session,
        RunConfig::new(url, excluded),
        RunOptions::from_settings(&settings),
    );

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Loading listing...");

    let (abort_tx, mut abort_rx) = oneshot::channel::<()>();
    let interrupts = tokio::spawn(watch_interrupts(
        progress.cancellation_token(),
        pb.clone(),
        abort_tx,
    ));

    let mut last: Option<ProgressSnapshot> = None;
    let mut listening = true;
    loop {
        tokio::select! {
            snapshot = progress.recv() => {
                let Some(snapshot) = snapshot else { break };
                pb.set_length(snapshot.total as u64);
                pb.set_position(snapshot.processed as u64);
                pb.set_message(snapshot.status.clone());
                last = Some(snapshot);
            }
            aborted = &mut abort_rx, if listening => {
                listening = false;
                if aborted.is_ok() {
                    pb.abandon();
                    // Dropping the stream tears the run down with the runtime.
                    anyhow::bail!("Scrape aborted");
                }
            }
        }
    }
    interrupts.abort();
    pb.finish_and_clear();

    let summary = progress.finish().await;

    let Some(last) = last else {
        summary?;
        return Ok(());
    };

    match last.phase {
        RunPhase::Done | RunPhase::Cancelled => {
            let records = last.records.unwrap_or_default();
            if last.phase == RunPhase::Cancelled {
                println!("{} {}", style("!").yellow(), last.status);
                if records.is_empty() {
                    return Ok(());
                }
            }
            tokio::fs::write(output, to_csv(&records)).await?;
            println!(
                "{} Wrote {} of {} parcels to {}",
                style("✓").green(),
                records.len(),
                last.total,
                output.display()
            );
            Ok(())
        }
        RunPhase::Aborted => {
            println!("{} {}", style("!").yellow(), last.status);
            Ok(())
        }
        _ => {
            eprintln!("{} {}", style("✗").red(), last.status);
            summary?;
            anyhow::bail!("{}", last.status)
        }
    }
}

/// First interrupt cancels the run; a second one signals `abort`.
async fn watch_interrupts(cancel: CancellationToken, pb: ProgressBar, abort: oneshot::Sender<()>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    pb.println(format!(
        "{} Cancelling after the current parcel (Ctrl+C again to abort)...",
        style("!").yellow()
    ));
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        abort.send(()).ok();
    }
}
