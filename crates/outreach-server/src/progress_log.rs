//! Mirrors the progress feed to a JSON-lines file

use outreach_types::ProgressEvent;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

pub fn spawn(mut events: broadcast::Receiver<ProgressEvent>, path: PathBuf) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                log::error!("Cannot create progress log directory {}: {}", parent.display(), e);
                return;
            }
        }

        let mut file = match tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await {
            Ok(file) => file,
            Err(e) => {
                log::error!("Cannot open progress log {}: {}", path.display(), e);
                return;
            }
        };

        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = append(&mut file, &event).await {
                        log::warn!("Failed to write progress event: {}", e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Progress log fell behind; {} event(s) dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }

        let _ = file.flush().await;
    })
}

async fn append(file: &mut tokio::fs::File, event: &ProgressEvent) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    file.write_all(&line).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_types::{EventLevel, RunTally};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_events_are_appended_as_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("progress.jsonl");
        let (tx, rx) = broadcast::channel(16);

        let handle = spawn(rx, path.clone());
        tx.send(ProgressEvent::Tally { run_id: "r1".into(), tally: RunTally::default() }).unwrap();
        tx.send(ProgressEvent::Log {
            run_id: None,
            level: EventLevel::Info,
            message: "hello".into(),
            at: chrono::Utc::now(),
        }).unwrap();
        drop(tx);
        handle.await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"type\":\"tally\""));
        assert!(lines[1].contains("\"message\":\"hello\""));
    }
}
