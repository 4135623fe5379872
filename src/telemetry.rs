// Progress reporting for running motions
//
// Controllers report key/value pairs every cycle and flush once per cycle.
// Nothing in the controllers depends on a sink doing anything.

use serde_json::{Map, Value};
use tracing::debug;

/// Receives progress from the motion controllers
pub trait ProgressSink {
    fn report(&mut self, key: &str, value: Value);

    fn flush(&mut self);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn report(&mut self, _key: &str, _value: Value) {}

    fn flush(&mut self) {}
}

/// Collects a cycle's reports into a frame; `flush` seals the frame
#[derive(Debug, Default)]
pub struct FrameSink {
    pending: Map<String, Value>,
    frame: Option<Map<String, Value>>,
}

impl FrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently flushed frame, if not already taken
    pub fn take_frame(&mut self) -> Option<Map<String, Value>> {
        self.frame.take()
    }
}

impl ProgressSink for FrameSink {
    fn report(&mut self, key: &str, value: Value) {
        self.pending.insert(key.to_owned(), value);
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.frame = Some(std::mem::take(&mut self.pending));
        }
    }
}

/// Emits each flushed frame as a debug event
#[derive(Debug, Default)]
pub struct TracingSink {
    frame: FrameSink,
}

impl ProgressSink for TracingSink {
    fn report(&mut self, key: &str, value: Value) {
        self.frame.report(key, value);
    }

    fn flush(&mut self) {
        self.frame.flush();
        if let Some(frame) = self.frame.take_frame() {
            let frame = Value::Object(frame);
            debug!(telemetry = %frame, "motion progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_sink_seals_on_flush() {
        let mut sink = FrameSink::new();
        sink.report("heading", json!(12.5));
        sink.report("path", json!("Driving"));
        assert!(sink.take_frame().is_none());

        sink.flush();
        let frame = sink.take_frame().expect("frame after flush");
        assert_eq!(frame["heading"], json!(12.5));
        assert_eq!(frame.len(), 2);
        assert!(sink.take_frame().is_none());
    }

    #[test]
    fn test_empty_flush_keeps_previous_frame() {
        let mut sink = FrameSink::new();
        sink.report("path", json!("Complete"));
        sink.flush();
        sink.flush();
        assert!(sink.take_frame().is_some());
    }

    #[test]
    fn test_tracing_sink_consumes_frames() {
        let mut sink = TracingSink::default();
        sink.report("heading", json!(-3.0));
        sink.flush();
        assert!(sink.frame.take_frame().is_none());
    }

    #[test]
    fn test_later_report_overwrites_key() {
        let mut sink = FrameSink::new();
        sink.report("heading", json!(1.0));
        sink.report("heading", json!(2.0));
        sink.flush();
        assert_eq!(sink.take_frame().unwrap()["heading"], json!(2.0));
    }
}
