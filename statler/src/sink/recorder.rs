use metrics::{counter, gauge};

use super::ReportSink;
use crate::error::SinkError;

/// A sink that forwards reports to the [`metrics`] facade.
///
/// Counts become counter increments and values become absolute gauge updates, against whichever
/// recorder is installed at the time of the report. This allows any `metrics` exporter to act as
/// the backend for a collector.
///
/// `metrics` counters are monotonic, so negative counts are rejected rather than silently wrapped.
#[derive(Clone, Debug, Default)]
pub struct RecorderSink {
    prefix: Option<String>,
}

impl RecorderSink {
    /// Creates a new `RecorderSink`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a prefix that is prepended, with a `.` separator, to every key.
    #[must_use]
    pub fn with_prefix<P: Into<String>>(mut self, prefix: P) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn name(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.to_owned(),
        }
    }
}

impl ReportSink for RecorderSink {
    fn report_value(&self, key: &str, value: f64) -> Result<(), SinkError> {
        gauge!(self.name(key)).set(value);
        Ok(())
    }

    fn report_count(&self, key: &str, count: i32) -> Result<(), SinkError> {
        let delta = u64::try_from(count).map_err(|_| SinkError::Rejected {
            reason: format!("negative count {} for monotonic counter '{}'", count, key),
        })?;

        counter!(self.name(key)).increment(delta);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use metrics_util::{
        debugging::{DebugValue, DebuggingRecorder},
        MetricKind,
    };

    use super::RecorderSink;
    use crate::{error::SinkError, sink::ReportSink};

    #[test]
    fn forwards_counts_and_values() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let sink = RecorderSink::new();

        metrics::with_local_recorder(&recorder, || {
            sink.report_count("requests", 3).unwrap();
            sink.report_count("requests", 4).unwrap();
            sink.report_value("queue_depth", 12.5).unwrap();
        });

        let mut counters = 0;
        let mut gauges = 0;
        for (key, _, _, value) in snapshotter.snapshot().into_vec() {
            match (key.kind(), key.key().name(), value) {
                (MetricKind::Counter, "requests", DebugValue::Counter(v)) => {
                    assert_eq!(v, 7);
                    counters += 1;
                }
                (MetricKind::Gauge, "queue_depth", DebugValue::Gauge(v)) => {
                    assert_eq!(v.into_inner(), 12.5);
                    gauges += 1;
                }
                (kind, name, _) => panic!("unexpected metric {:?} {}", kind, name),
            }
        }
        assert_eq!((counters, gauges), (1, 1));
    }

    #[test]
    fn applies_prefix() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let sink = RecorderSink::new().with_prefix("relay");

        metrics::with_local_recorder(&recorder, || sink.report_count("hits", 1).unwrap());

        let names = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(key, _, _, _)| key.key().name().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["relay.hits".to_owned()]);
    }

    #[test]
    fn rejects_negative_counts() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let sink = RecorderSink::new();

        let result = metrics::with_local_recorder(&recorder, || sink.report_count("hits", -1));
        assert!(matches!(result, Err(SinkError::Rejected { .. })));
        assert!(snapshotter.snapshot().into_vec().is_empty());
    }
}
