use std::sync::atomic::{AtomicU64, Ordering};

/// Internal counters shared by every reader of a collector.
#[derive(Debug, Default)]
pub(crate) struct Telemetry {
    received: AtomicU64,
    reported: AtomicU64,
    read_failures: AtomicU64,
    decode_failures: AtomicU64,
    unknown_kinds: AtomicU64,
    sink_failures: AtomicU64,
}

impl Telemetry {
    pub fn track_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_reported(&self) {
        self.reported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_unknown_kind(&self) {
        self.unknown_kinds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            received: self.received.load(Ordering::Relaxed),
            reported: self.reported.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            unknown_kinds: self.unknown_kinds.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a collector's internal counters.
///
/// Counters only ever increase over the life of a collector. Every received datagram ends up
/// counted exactly once in either `reported` or one of the failure counters, once its reader is
/// done with it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Datagrams read off the socket.
    pub received: u64,

    /// Records successfully handed to the sink.
    pub reported: u64,

    /// Socket reads that failed, excluding poll timeouts.
    pub read_failures: u64,

    /// Datagrams that did not decode.
    pub decode_failures: u64,

    /// Records that decoded but carried an unknown kind.
    pub unknown_kinds: u64,

    /// Reports the sink returned an error for.
    pub sink_failures: u64,
}

impl TelemetrySnapshot {
    /// Returns the number of received datagrams that were dropped.
    pub fn dropped(&self) -> u64 {
        self.decode_failures + self.unknown_kinds + self.sink_failures
    }
}
