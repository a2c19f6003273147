use std::sync::Arc;

use tokio::sync::mpsc;

use crate::models::telemetry::CostEvent;

/// Where cost events end up. Implementations belong to the host application
/// (DB writer, metrics exporter, ...); the pipeline only ever talks to the
/// channel in front of them.
pub trait CostSink: Send + Sync + 'static {
    fn consume(&self, event: CostEvent);
}

/// Default sink: structured log lines.
pub struct LogSink;

impl CostSink for LogSink {
    fn consume(&self, event: CostEvent) {
        log::info!(
            "cost event: source={} duration_ms={} success={} tokens={}",
            event.source,
            event.duration_ms,
            event.success,
            event.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0)
        );
    }
}

/// Cheap clonable handle the pipeline components use to report usage.
/// Recording never blocks and never fails the caller; if the drain task is
/// gone the event is silently dropped.
#[derive(Clone)]
pub struct CostRecorder {
    tx: mpsc::UnboundedSender<CostEvent>,
}

impl CostRecorder {
    pub fn record(&self, event: CostEvent) {
        let _ = self.tx.send(event);
    }

    /// Recorder with no sink behind it. Events go nowhere.
    pub fn disabled() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        Self { tx }
    }
}

/// Spawns the background drain task and hands back the recorder. The task
/// lives until every recorder clone is dropped.
pub fn spawn_tracker(sink: Arc<dyn CostSink>) -> CostRecorder {
    let (tx, mut rx) = mpsc::unbounded_channel::<CostEvent>();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            sink.consume(event);
        }
    });
    CostRecorder { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CollectSink(Mutex<Vec<CostEvent>>);

    impl CostSink for CollectSink {
        fn consume(&self, event: CostEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn test_events_reach_sink() {
        let sink = Arc::new(CollectSink(Mutex::new(Vec::new())));
        let recorder = spawn_tracker(sink.clone());
        recorder.record(CostEvent::new("scorer", 120, true, None));
        recorder.record(CostEvent::new("market_data", 40, false, None));
        drop(recorder);

        // drain task exits once the channel closes
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].source, "scorer");
    }

    #[tokio::test]
    async fn test_disabled_recorder_never_panics() {
        let recorder = CostRecorder::disabled();
        recorder.record(CostEvent::new("scorer", 1, true, None));
    }
}
