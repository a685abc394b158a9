//! Collector ingestion loop.
//!
//! A collector binds a single UDP socket and runs a fixed pool of reader threads against it. There
//! is no queue in between: every reader blocks on the same socket, and the operating system hands
//! each datagram to exactly one of them. Each datagram is decoded and dispatched on its own, and
//! any failure along the way only costs that one datagram.
use std::{
    io,
    net::{SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use tracing::{debug, error, trace, warn};

use crate::{
    codec::{self, WireStat},
    error::DispatchError,
    sink::ReportSink,
    stat::Stat,
};

mod builder;
pub use self::builder::{CollectorBuilder, DEFAULT_BIND_ADDRESS};

mod telemetry;
use self::telemetry::Telemetry;
pub use self::telemetry::TelemetrySnapshot;

/// Forwards a decoded record to the matching sink operation.
///
/// # Errors
///
/// If the record has an unknown kind, an error is returned without calling the sink. Otherwise,
/// any error returned by the sink is passed through.
pub fn dispatch(wire: WireStat, sink: &dyn ReportSink) -> Result<(), DispatchError> {
    match Stat::try_from(wire)? {
        Stat::Value { key, value } => sink.report_value(&key, value)?,
        Stat::Count { key, count } => sink.report_count(&key, count)?,
    }

    Ok(())
}

/// Handle to a running collector.
///
/// Dropping the handle shuts the collector down.
pub struct CollectorHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    telemetry: Arc<Telemetry>,
    readers: Vec<JoinHandle<()>>,
}

impl CollectorHandle {
    /// Returns the address the collector socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the number of reader threads.
    pub fn readers(&self) -> usize {
        self.readers.len()
    }

    /// Returns a snapshot of the collector's internal counters.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    /// Stops the collector, waiting for every reader to exit.
    ///
    /// Readers finish the datagram they are processing, if any, and exit the next time they
    /// return from the socket. Idle readers take at most one poll interval to notice.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.readers.is_empty() {
            return;
        }

        self.shutdown.store(true, Ordering::Release);
        for reader in self.readers.drain(..) {
            if reader.join().is_err() {
                error!("Collector reader panicked.");
            }
        }

        debug!(local_addr = %self.local_addr, "Collector stopped.");
    }
}

impl Drop for CollectorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(crate) struct Reader {
    id: usize,
    socket: Arc<UdpSocket>,
    sink: Arc<dyn ReportSink>,
    shutdown: Arc<AtomicBool>,
    telemetry: Arc<Telemetry>,
    buffer_size: usize,
}

impl Reader {
    fn run(self) {
        let mut buf = vec![0u8; self.buffer_size];

        while !self.shutdown.load(Ordering::Acquire) {
            let (len, peer) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(ref e) if timed_out(e) || interrupted(e) => continue,
                Err(e) => {
                    error!(reader = self.id, error = %e, "Failed to read datagram.");
                    self.telemetry.track_read_failure();
                    continue;
                }
            };

            self.telemetry.track_received();
            self.process(&buf[..len], peer);
        }

        trace!(reader = self.id, "Reader exiting.");
    }

    fn process(&self, payload: &[u8], peer: SocketAddr) {
        let wire = match codec::decode(payload) {
            Ok(wire) => wire,
            Err(e) => {
                let len = payload.len();
                warn!(reader = self.id, %peer, len, error = %e, "Dropping undecodable datagram.");
                self.telemetry.track_decode_failure();
                return;
            }
        };

        trace!(reader = self.id, %peer, key = %wire.key, kind = wire.kind, "Dispatching stat.");
        match dispatch(wire, self.sink.as_ref()) {
            Ok(()) => self.telemetry.track_reported(),
            Err(DispatchError::UnknownKind(e)) => {
                warn!(reader = self.id, %peer, error = %e, "Dropping stat of unknown kind.");
                self.telemetry.track_unknown_kind();
            }
            Err(DispatchError::Sink(e)) => {
                error!(reader = self.id, error = %e, "Failed to report stat.");
                self.telemetry.track_sink_failure();
            }
        }
    }
}

fn timed_out(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn interrupted(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Interrupted
}
