/// Pipeline Module
///
/// Orchestrates ingestion one poll cycle at a time: Poll → Transform → Acknowledge → Emit.
/// Every message is fully handled before the next one is looked at.
use crate::etl::extract::{MessageSource, SourceError};
use crate::etl::load::RecordSink;
use crate::etl::transform::transform;
use crate::models::{AckMode, NormalizedRecord, RawMessage, Transformed};
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Counters for a single poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub messages_received: usize,
    pub records_written: usize,
    pub write_failures: usize,
    pub no_body: usize,
    pub invalid_bodies: usize,
    pub ack_failures: usize,
    /// Polls whose response was missing a required key
    pub malformed: usize,
}

/// Running totals across cycles
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub cycles: u64,
    pub messages_received: usize,
    pub records_written: usize,
    pub write_failures: usize,
    pub skipped: usize,
    pub elapsed_time: Duration,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cycle: &CycleStats) {
        self.cycles += 1;
        self.messages_received += cycle.messages_received;
        self.records_written += cycle.records_written;
        self.write_failures += cycle.write_failures;
        self.skipped += cycle.no_body + cycle.invalid_bodies;
    }

    pub fn success_rate(&self) -> f64 {
        let attempted = self.records_written + self.write_failures;
        if attempted == 0 {
            0.0
        } else {
            (self.records_written as f64 / attempted as f64) * 100.0
        }
    }
}

/// Configuration for pipeline execution
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub ack_mode: AckMode,
}

/// Login ingestion pipeline
pub struct Pipeline<S> {
    source: S,
    config: PipelineConfig,
}

impl<S: MessageSource> Pipeline<S> {
    /// Create a new pipeline instance
    pub fn new(source: S, config: PipelineConfig) -> Self {
        Self { source, config }
    }

    /// Poll forever, handing every record to `sink`
    ///
    /// Only returns when the source fails to poll.
    pub async fn run(&self, sink: &dyn RecordSink) -> Result<(), SourceError> {
        let start_time = Instant::now();
        let mut stats = PipelineStats::new();

        tracing::info!("Starting pipeline (ack {})", self.config.ack_mode.as_str());

        loop {
            let span = tracing::info_span!("cycle", n = stats.cycles + 1);
            let cycle = self.run_cycle(sink).instrument(span).await?;

            stats.add(&cycle);
            stats.elapsed_time = start_time.elapsed();

            if cycle.ack_failures > 0 || cycle.malformed > 0 {
                tracing::warn!(
                    "Cycle {} had {} ack failures, {} malformed polls",
                    stats.cycles,
                    cycle.ack_failures,
                    cycle.malformed
                );
            }

            if cycle.messages_received > 0 {
                tracing::info!(
                    "{} cycles in {:.0}s: {} messages | {} written, {} failed, {} skipped ({:.1}% success)",
                    stats.cycles,
                    stats.elapsed_time.as_secs_f64(),
                    stats.messages_received,
                    stats.records_written,
                    stats.write_failures,
                    stats.skipped,
                    stats.success_rate()
                );
            }
        }
    }

    /// Run a single poll cycle
    ///
    /// Errors from the queue service are returned. A response missing a required
    /// key is logged and yields an empty cycle.
    pub async fn run_cycle(&self, sink: &dyn RecordSink) -> Result<CycleStats, SourceError> {
        let mut stats = CycleStats::default();

        let messages = match self.source.poll().await {
            Ok(messages) => messages,
            Err(SourceError::Malformed { key }) => {
                tracing::error!("The key {} is not present in the received message", key);
                stats.malformed += 1;
                return Ok(stats);
            }
            Err(e) => return Err(e),
        };

        for message in &messages {
            self.process_message(message, sink, &mut stats).await;
        }

        Ok(stats)
    }

    async fn process_message(&self, message: &RawMessage, sink: &dyn RecordSink, stats: &mut CycleStats) {
        stats.messages_received += 1;

        let record = match transform(message) {
            Ok(Transformed::Record(record)) => record,
            Ok(Transformed::NoBody) => {
                tracing::info!("Body not present in message with ID: {}", message.message_id);
                stats.no_body += 1;
                self.acknowledge(message, stats).await;
                return;
            }
            Err(e) => {
                tracing::error!(message_id = %message.message_id, "Skipping message: {}", e);
                stats.invalid_bodies += 1;
                // After-write leaves bad bodies to the queue's dead-letter policy
                if self.config.ack_mode == AckMode::BeforeWrite {
                    self.acknowledge(message, stats).await;
                }
                return;
            }
        };

        match self.config.ack_mode {
            AckMode::BeforeWrite => {
                self.acknowledge(message, stats).await;
                if !self.emit(&record, sink, stats).await {
                    tracing::warn!("Message {} was already deleted from the queue; record lost", record.message_id);
                }
            }
            AckMode::AfterWrite => {
                if self.emit(&record, sink, stats).await {
                    self.acknowledge(message, stats).await;
                } else {
                    tracing::warn!("Message {} left on the queue for redelivery", record.message_id);
                }
            }
        }
    }

    async fn acknowledge(&self, message: &RawMessage, stats: &mut CycleStats) {
        match self.source.acknowledge(&message.receipt_handle).await {
            Ok(()) => tracing::info!(
                "Received message with MessageId: {} and ReceiptHandle: {}",
                message.message_id,
                message.receipt_handle
            ),
            Err(e) => {
                tracing::warn!(message_id = %message.message_id, "Failed to acknowledge message: {}", e);
                stats.ack_failures += 1;
            }
        }
    }

    async fn emit(&self, record: &NormalizedRecord, sink: &dyn RecordSink, stats: &mut CycleStats) -> bool {
        let written = sink.write(record).await;
        if written {
            stats.records_written += 1;
        } else {
            stats.write_failures += 1;
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture::capture;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    type Events = Arc<Mutex<Vec<String>>>;

    struct FakeSource {
        polls: Mutex<VecDeque<Result<Vec<RawMessage>, SourceError>>>,
        fail_ack: bool,
        events: Events,
    }

    impl FakeSource {
        fn new(polls: Vec<Result<Vec<RawMessage>, SourceError>>, events: Events) -> Self {
            Self { polls: Mutex::new(polls.into()), fail_ack: false, events }
        }
    }

    #[async_trait]
    impl MessageSource for FakeSource {
        async fn poll(&self) -> Result<Vec<RawMessage>, SourceError> {
            self.polls.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn acknowledge(&self, receipt_handle: &str) -> Result<(), SourceError> {
            if self.fail_ack {
                return Err(SourceError::Delete {
                    receipt_handle: receipt_handle.to_string(),
                    message: "access denied".to_string(),
                });
            }
            self.events.lock().unwrap().push(format!("ack:{}", receipt_handle));
            Ok(())
        }
    }

    struct RecordingSink {
        succeed: bool,
        records: Mutex<Vec<NormalizedRecord>>,
        events: Events,
    }

    impl RecordingSink {
        fn new(succeed: bool, events: Events) -> Self {
            Self { succeed, records: Mutex::new(Vec::new()), events }
        }
    }

    #[async_trait]
    impl RecordSink for RecordingSink {
        async fn write(&self, record: &NormalizedRecord) -> bool {
            self.events.lock().unwrap().push(format!("write:{}", record.message_id));
            self.records.lock().unwrap().push(record.clone());
            self.succeed
        }
    }

    fn message(id: &str, body: Option<serde_json::Value>) -> RawMessage {
        RawMessage {
            message_id: id.to_string(),
            receipt_handle: format!("rh-{}", id),
            body: body.map(|b| b.to_string()),
        }
    }

    fn pipeline(source: FakeSource, ack_mode: AckMode) -> Pipeline<FakeSource> {
        Pipeline::new(source, PipelineConfig { ack_mode })
    }

    #[tokio::test]
    async fn test_empty_poll() {
        let events = Events::default();
        let p = pipeline(FakeSource::new(vec![Ok(vec![])], events.clone()), AckMode::BeforeWrite);
        let sink = RecordingSink::new(true, events.clone());

        let stats = p.run_cycle(&sink).await.unwrap();
        assert_eq!(stats, CycleStats::default());
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_event_is_acked_then_written() {
        let events = Events::default();
        let body = json!({"ip": "1.2.3.4", "device_id": "d1", "app_version": "3.4.1", "user_id": "u1"});
        let source = FakeSource::new(vec![Ok(vec![message("m1", Some(body))])], events.clone());
        let p = pipeline(source, AckMode::BeforeWrite);
        let sink = RecordingSink::new(true, events.clone());

        let before = chrono::Local::now().date_naive();
        let stats = p.run_cycle(&sink).await.unwrap();
        let after = chrono::Local::now().date_naive();
        assert_eq!(stats.messages_received, 1);
        assert_eq!(stats.records_written, 1);
        assert_eq!(*events.lock().unwrap(), vec!["ack:rh-m1", "write:m1"]);

        let records = sink.records.lock().unwrap();
        assert_eq!(records[0].user_id.as_deref(), Some("u1"));
        assert_eq!(records[0].app_version, Some(3));
        assert!(records[0].create_date == before || records[0].create_date == after);
    }

    #[tokio::test]
    async fn test_no_body_is_acked_not_written() {
        let (logs, _guard) = capture();
        let events = Events::default();
        let p = pipeline(FakeSource::new(vec![Ok(vec![message("m2", None)])], events.clone()), AckMode::BeforeWrite);
        let sink = RecordingSink::new(true, events.clone());

        let stats = p.run_cycle(&sink).await.unwrap();
        assert_eq!(stats.no_body, 1);
        assert_eq!(stats.records_written, 0);
        assert_eq!(*events.lock().unwrap(), vec!["ack:rh-m2"]);

        let lines = logs.lines_with("Body not present");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].contains("Body not present in message with ID: m2"));
    }

    #[tokio::test]
    async fn test_failed_write_after_ack_continues() {
        let events = Events::default();
        let source = FakeSource::new(
            vec![Ok(vec![message("m3", Some(json!({"user_id": "u3"})))]), Ok(vec![message("m4", Some(json!({})))])],
            events.clone(),
        );
        let p = pipeline(source, AckMode::BeforeWrite);
        let sink = RecordingSink::new(false, events.clone());

        let first = p.run_cycle(&sink).await.unwrap();
        assert_eq!(first.write_failures, 1);
        let second = p.run_cycle(&sink).await.unwrap();
        assert_eq!(second.messages_received, 1);

        assert_eq!(*events.lock().unwrap(), vec!["ack:rh-m3", "write:m3", "ack:rh-m4", "write:m4"]);
    }

    #[tokio::test]
    async fn test_ack_after_write_keeps_failed_messages() {
        let events = Events::default();
        let p = pipeline(
            FakeSource::new(vec![Ok(vec![message("m5", Some(json!({})))])], events.clone()),
            AckMode::AfterWrite,
        );
        let sink = RecordingSink::new(false, events.clone());

        let stats = p.run_cycle(&sink).await.unwrap();
        assert_eq!(stats.write_failures, 1);
        assert_eq!(*events.lock().unwrap(), vec!["write:m5"]);
    }

    #[tokio::test]
    async fn test_ack_after_write_success() {
        let events = Events::default();
        let p = pipeline(
            FakeSource::new(vec![Ok(vec![message("m6", Some(json!({})))])], events.clone()),
            AckMode::AfterWrite,
        );
        let sink = RecordingSink::new(true, events.clone());

        p.run_cycle(&sink).await.unwrap();
        assert_eq!(*events.lock().unwrap(), vec!["write:m6", "ack:rh-m6"]);
    }

    #[tokio::test]
    async fn test_malformed_poll_yields_nothing() {
        let events = Events::default();
        let source = FakeSource::new(vec![Err(SourceError::Malformed { key: "ReceiptHandle" })], events.clone());
        let p = pipeline(source, AckMode::BeforeWrite);
        let sink = RecordingSink::new(true, events.clone());

        let stats = p.run_cycle(&sink).await.unwrap();
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.messages_received, 0);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_receive_error_is_propagated() {
        let events = Events::default();
        let source = FakeSource::new(
            vec![Err(SourceError::Receive { queue_url: "http://q".to_string(), message: "bad queue".to_string() })],
            events.clone(),
        );
        let p = pipeline(source, AckMode::BeforeWrite);
        let sink = RecordingSink::new(true, events.clone());

        assert!(matches!(p.run_cycle(&sink).await, Err(SourceError::Receive { .. })));
    }

    #[tokio::test]
    async fn test_invalid_body_is_acked_before_write() {
        let events = Events::default();
        let mut bad = message("m7", None);
        bad.body = Some("{not json".to_string());
        let p = pipeline(FakeSource::new(vec![Ok(vec![bad])], events.clone()), AckMode::BeforeWrite);
        let sink = RecordingSink::new(true, events.clone());

        let stats = p.run_cycle(&sink).await.unwrap();
        assert_eq!(stats.invalid_bodies, 1);
        assert_eq!(stats.records_written, 0);
        assert_eq!(*events.lock().unwrap(), vec!["ack:rh-m7"]);
    }

    #[tokio::test]
    async fn test_invalid_body_is_kept_after_write() {
        let events = Events::default();
        let mut bad = message("m10", None);
        bad.body = Some("[1, 2]".to_string());
        let p = pipeline(FakeSource::new(vec![Ok(vec![bad])], events.clone()), AckMode::AfterWrite);
        let sink = RecordingSink::new(true, events.clone());

        let stats = p.run_cycle(&sink).await.unwrap();
        assert_eq!(stats.invalid_bodies, 1);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ack_failure_does_not_stop_write() {
        let events = Events::default();
        let mut source = FakeSource::new(vec![Ok(vec![message("m8", Some(json!({})))])], events.clone());
        source.fail_ack = true;
        let p = pipeline(source, AckMode::BeforeWrite);
        let sink = RecordingSink::new(true, events.clone());

        let stats = p.run_cycle(&sink).await.unwrap();
        assert_eq!(stats.ack_failures, 1);
        assert_eq!(stats.records_written, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_receive_error() {
        let events = Events::default();
        let source = FakeSource::new(
            vec![
                Ok(vec![message("m9", Some(json!({"locale": "en"})))]),
                Err(SourceError::Receive { queue_url: "http://q".to_string(), message: "auth".to_string() }),
            ],
            events.clone(),
        );
        let p = pipeline(source, AckMode::BeforeWrite);
        let sink = RecordingSink::new(true, events.clone());

        assert!(matches!(p.run(&sink).await, Err(SourceError::Receive { .. })));
        assert_eq!(sink.records.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_stats_success_rate() {
        let mut stats = PipelineStats::new();
        assert_eq!(stats.success_rate(), 0.0);

        stats.add(&CycleStats { messages_received: 4, records_written: 3, write_failures: 1, ..Default::default() });
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.success_rate(), 75.0);
    }
}
