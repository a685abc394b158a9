//! Report sinks.
//!
//! A [`ReportSink`] is the boundary between the collector and whatever backend ends up recording
//! the measurements. The collector calls into the sink from every reader concurrently, and treats
//! any returned error as final for that datagram: it is logged and the datagram is dropped. Retry,
//! backoff, and connection pooling toward the backend are the sink's business.
use std::sync::Arc;

use crate::error::SinkError;

mod debugging;
pub use self::debugging::DebuggingSink;

mod log;
pub use self::log::LogSink;

#[cfg(feature = "recorder")]
mod recorder;
#[cfg(feature = "recorder")]
#[cfg_attr(docsrs, doc(cfg(feature = "recorder")))]
pub use self::recorder::RecorderSink;

#[cfg(feature = "stathat")]
mod stathat;
#[cfg(feature = "stathat")]
#[cfg_attr(docsrs, doc(cfg(feature = "stathat")))]
pub use self::stathat::{StatHatBuilder, StatHatSink, DEFAULT_STATHAT_ENDPOINT};

/// A backend that records counters and gauges.
///
/// Implementations must be safe to call from many threads at once.
pub trait ReportSink: Send + Sync {
    /// Reports an absolute gauge reading for `key`.
    ///
    /// # Errors
    ///
    /// If the backend fails to record the value, an error is returned.
    fn report_value(&self, key: &str, value: f64) -> Result<(), SinkError>;

    /// Reports a delta to add to the counter `key`.
    ///
    /// # Errors
    ///
    /// If the backend fails to record the count, an error is returned.
    fn report_count(&self, key: &str, count: i32) -> Result<(), SinkError>;
}

impl<T> ReportSink for Arc<T>
where
    T: ReportSink + ?Sized,
{
    fn report_value(&self, key: &str, value: f64) -> Result<(), SinkError> {
        (**self).report_value(key, value)
    }

    fn report_count(&self, key: &str, count: i32) -> Result<(), SinkError> {
        (**self).report_count(key, count)
    }
}

impl<T> ReportSink for Box<T>
where
    T: ReportSink + ?Sized,
{
    fn report_value(&self, key: &str, value: f64) -> Result<(), SinkError> {
        (**self).report_value(key, value)
    }

    fn report_count(&self, key: &str, count: i32) -> Result<(), SinkError> {
        (**self).report_count(key, count)
    }
}
