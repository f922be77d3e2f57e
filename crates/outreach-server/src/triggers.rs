//! Trigger directory monitor
//!
//! `campaign_*.json` files hold a `CampaignTrigger` and start a run;
//! `stop_*.json` files hold a `StopRequest`. Each file is moved to
//! `processed/` once accepted or to `failed/` if it cannot be read.

use anyhow::Context;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use outreach_core::{paths, CampaignRunner};
use outreach_types::{CampaignTrigger, StopRequest};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, PartialEq, Eq)]
enum TriggerKind {
    Campaign,
    Stop,
}

fn classify(path: &Path) -> Option<TriggerKind> {
    let name = path.file_name()?.to_str()?;
    if !name.ends_with(".json") {
        return None;
    }
    if name.starts_with("campaign_") {
        Some(TriggerKind::Campaign)
    } else if name.starts_with("stop_") {
        Some(TriggerKind::Stop)
    } else {
        None
    }
}

pub async fn monitor(runner: Arc<CampaignRunner>) -> anyhow::Result<()> {
    let triggers_path = paths::triggers_dir();
    let processed_path = paths::triggers_processed_dir();
    let failed_path = paths::triggers_failed_dir();

    std::fs::create_dir_all(&triggers_path)?;
    std::fs::create_dir_all(&processed_path)?;
    std::fs::create_dir_all(&failed_path)?;

    log::info!("Monitoring campaign triggers in {}/", triggers_path.display());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| match result {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => log::error!("Watcher error: {}", e),
        },
        notify::Config::default(),
    )?;
    watcher.watch(&triggers_path, RecursiveMode::NonRecursive)?;

    // Files dropped while the server was down
    let mut existing: Vec<PathBuf> = std::fs::read_dir(&triggers_path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    existing.sort();
    for path in existing {
        handle_file(&runner, &path).await;
    }

    while let Some(event) = rx.recv().await {
        log::debug!("File system event: {:?}", event);
        if let EventKind::Create(_) | EventKind::Modify(_) = event.kind {
            for path in event.paths {
                if path.is_file() {
                    handle_file(&runner, &path).await;
                }
            }
        }
    }

    anyhow::bail!("Trigger watcher channel closed")
}

async fn handle_file(runner: &Arc<CampaignRunner>, path: &Path) {
    let Some(kind) = classify(path) else {
        return;
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        // Already moved by an earlier event for the same file
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(e) => {
            log::error!("Failed to read trigger file {}: {}", path.display(), e);
            move_to(path, &paths::triggers_failed_dir());
            return;
        }
    };

    // Still being written; a later modify event will bring the content
    if content.trim().is_empty() {
        return;
    }

    let accepted = match kind {
        TriggerKind::Campaign => start_run(runner, &content),
        TriggerKind::Stop => stop_run(runner, &content),
    };

    match accepted {
        Ok(()) => move_to(path, &paths::triggers_processed_dir()),
        Err(e) => {
            log::error!("Rejected trigger file {}: {:#}", path.display(), e);
            move_to(path, &paths::triggers_failed_dir());
        }
    }
}

fn start_run(runner: &Arc<CampaignRunner>, content: &str) -> anyhow::Result<()> {
    let trigger: CampaignTrigger = serde_json::from_str(content)
        .context("Failed to parse CampaignTrigger JSON")?;

    log::info!(
        "Accepted campaign trigger {} for region '{}'",
        trigger.trigger_id, trigger.market_region
    );

    let runner = runner.clone();
    tokio::spawn(async move {
        let trigger_id = trigger.trigger_id.clone();
        match runner.run(trigger).await {
            Ok(summary) => log::info!(
                "Trigger {} finished run {} ({:?})",
                trigger_id, summary.run_id, summary.end
            ),
            Err(e) => log::error!("Trigger {} failed: {}", trigger_id, e),
        }
    });

    Ok(())
}

fn stop_run(runner: &CampaignRunner, content: &str) -> anyhow::Result<()> {
    let request: StopRequest = serde_json::from_str(content)
        .context("Failed to parse StopRequest JSON")?;

    let stopped = runner.stop(&request.target);
    log::info!("Stop request for '{}' matched {} run(s)", request.target, stopped);
    Ok(())
}

fn move_to(path: &Path, destination_dir: &Path) {
    let Some(file_name) = path.file_name() else {
        return;
    };
    let destination = destination_dir.join(file_name);
    if let Err(e) = std::fs::rename(path, &destination) {
        log::error!("Failed to move {} to {}: {}", path.display(), destination.display(), e);
    } else {
        log::debug!("Moved trigger file to {}", destination.display());
    }
}
