use tracing::info;

use super::ReportSink;
use crate::error::SinkError;

/// A sink that emits every report as a log event.
///
/// Reports are logged at the `INFO` level under the `statler::report` target, with the key and the
/// count or value as structured fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn report_value(&self, key: &str, value: f64) -> Result<(), SinkError> {
        info!(target: "statler::report", key, value, "Reported value.");
        Ok(())
    }

    fn report_count(&self, key: &str, count: i32) -> Result<(), SinkError> {
        info!(target: "statler::report", key, count, "Reported count.");
        Ok(())
    }
}
