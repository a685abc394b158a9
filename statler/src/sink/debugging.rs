use parking_lot::Mutex;

use super::ReportSink;
use crate::{error::SinkError, stat::Stat};

/// A simplistic sink that can be used for debugging or testing.
///
/// Every report is appended, in arrival order, to an in-memory list that can be inspected later.
/// Nothing is ever dropped, so this should not be used for long-running collectors.
#[derive(Debug, Default)]
pub struct DebuggingSink {
    reports: Mutex<Vec<Stat>>,
}

impl DebuggingSink {
    /// Creates a new, empty `DebuggingSink`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every report received so far.
    pub fn reports(&self) -> Vec<Stat> {
        self.reports.lock().clone()
    }

    /// Returns the number of reports received so far.
    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    /// Returns `true` if no reports have been received.
    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }

    /// Removes and returns every report received so far.
    pub fn drain(&self) -> Vec<Stat> {
        std::mem::take(&mut *self.reports.lock())
    }
}

impl ReportSink for DebuggingSink {
    fn report_value(&self, key: &str, value: f64) -> Result<(), SinkError> {
        self.reports.lock().push(Stat::value(key, value));
        Ok(())
    }

    fn report_count(&self, key: &str, count: i32) -> Result<(), SinkError> {
        self.reports.lock().push(Stat::count(key, count));
        Ok(())
    }
}
