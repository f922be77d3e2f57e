//! Fire-and-forget progress feed

use chrono::Utc;
use outreach_types::{EventLevel, ProgressEvent};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

const DEFAULT_CAPACITY: usize = 256;

/// Broadcasts progress events to any number of observers and mirrors them to the log
#[derive(Clone)]
pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn stream(&self) -> BroadcastStream<ProgressEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    pub fn emit(&self, event: ProgressEvent) {
        mirror_to_log(&event);
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn log(&self, run_id: Option<&str>, level: EventLevel, message: impl Into<String>) {
        self.emit(ProgressEvent::Log {
            run_id: run_id.map(str::to_string),
            level,
            message: message.into(),
            at: Utc::now(),
        });
    }

    pub fn info(&self, run_id: &str, message: impl Into<String>) {
        self.log(Some(run_id), EventLevel::Info, message);
    }

    pub fn warn(&self, run_id: &str, message: impl Into<String>) {
        self.log(Some(run_id), EventLevel::Warn, message);
    }

    pub fn error(&self, run_id: &str, message: impl Into<String>) {
        self.log(Some(run_id), EventLevel::Error, message);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn mirror_to_log(event: &ProgressEvent) {
    match event {
        ProgressEvent::Log { run_id, level, message, .. } => {
            let run = run_id.as_deref().unwrap_or("-");
            match level {
                EventLevel::Info => log::info!("[{}] {}", run, message),
                EventLevel::Warn => log::warn!("[{}] {}", run, message),
                EventLevel::Error => log::error!("[{}] {}", run, message),
            }
        }
        ProgressEvent::LeadFinished { run_id, lead_id, result, error } => match error {
            Some(error) => log::warn!("[{}] Lead {} {:?}: {}", run_id, lead_id, result, error),
            None => log::info!("[{}] Lead {} {:?}", run_id, lead_id, result),
        },
        ProgressEvent::Tally { run_id, tally } => log::debug!(
            "[{}] attempted={} succeeded={} failed={} skipped={}",
            run_id, tally.attempted, tally.succeeded, tally.failed, tally.skipped
        ),
        ProgressEvent::ReconciliationRequired { run_id, lead_id, detail } => {
            log::error!("[{}] Lead {} needs reconciliation: {}", run_id, lead_id, detail)
        }
        ProgressEvent::RunCompleted { summary } => log::info!(
            "[{}] Run finished ({:?}): {} attempted, {} sent, {} failed, {} skipped",
            summary.run_id,
            summary.end,
            summary.tally.attempted,
            summary.tally.succeeded,
            summary.tally.failed,
            summary.tally.skipped
        ),
        ProgressEvent::RunFailed { run_id, error } => {
            log::error!("[{}] Run failed: {}", run_id, error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_types::RunTally;
    use tokio_stream::StreamExt;

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let reporter = ProgressReporter::new();
        reporter.info("r1", "nobody is listening");
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();

        reporter.info("r1", "starting");
        reporter.emit(ProgressEvent::Tally { run_id: "r1".into(), tally: RunTally::default() });

        match rx.recv().await.unwrap() {
            ProgressEvent::Log { message, level, .. } => {
                assert_eq!(message, "starting");
                assert_eq!(level, EventLevel::Info);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(rx.recv().await.unwrap(), ProgressEvent::Tally { .. }));
    }

    #[tokio::test]
    async fn test_stream_yields_events() {
        let reporter = ProgressReporter::new();
        let mut stream = reporter.stream();
        reporter.warn("r2", "careful");

        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.run_id(), Some("r2"));
    }
}
