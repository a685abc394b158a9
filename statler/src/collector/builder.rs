use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs as _, UdpSocket},
    num::NonZeroUsize,
    sync::{atomic::AtomicBool, Arc},
    thread,
    time::Duration,
};

use tracing::{debug, info};

use super::{telemetry::Telemetry, CollectorHandle, Reader};
use crate::{codec::MAX_DATAGRAM_LEN, error::CollectorError, sink::ReportSink};

/// Address the collector binds to by default.
pub const DEFAULT_BIND_ADDRESS: &str = ":5354";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

enum Listener {
    Address(String),
    Socket(UdpSocket),
}

/// Builder for creating and spawning a collector.
pub struct CollectorBuilder {
    listener: Listener,
    readers: Option<NonZeroUsize>,
    buffer_size: usize,
    poll_interval: Duration,
}

impl CollectorBuilder {
    /// Creates a new `CollectorBuilder`.
    pub fn new() -> CollectorBuilder {
        CollectorBuilder {
            listener: Listener::Address(DEFAULT_BIND_ADDRESS.to_owned()),
            readers: None,
            buffer_size: MAX_DATAGRAM_LEN,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the address to bind the collector socket to.
    ///
    /// The address needs to be in the format of `<host>:<port>`. A bare `:<port>` binds to all
    /// interfaces, over both IPv6 and IPv4 where the host allows it, and to all IPv4 interfaces
    /// otherwise. The address is resolved and bound when the collector is spawned.
    ///
    /// Defaults to `:5354`.
    #[must_use]
    pub fn with_bind_address<A>(mut self, addr: A) -> CollectorBuilder
    where
        A: AsRef<str>,
    {
        self.listener = Listener::Address(addr.as_ref().to_owned());
        self
    }

    /// Uses an already-bound socket instead of binding one.
    ///
    /// The socket is switched to blocking mode, and any read timeout set on it is replaced by the
    /// poll interval.
    #[must_use]
    pub fn with_socket(mut self, socket: UdpSocket) -> CollectorBuilder {
        self.listener = Listener::Socket(socket);
        self
    }

    /// Sets the number of reader threads draining the socket.
    ///
    /// All readers share the same socket, and the operating system hands each datagram to exactly
    /// one of them. A value of zero is treated as one.
    ///
    /// Defaults to the available parallelism of the machine.
    #[must_use]
    pub fn with_readers(mut self, readers: usize) -> CollectorBuilder {
        self.readers = Some(NonZeroUsize::new(readers).unwrap_or(NonZeroUsize::MIN));
        self
    }

    /// Sets the size of each reader's receive buffer.
    ///
    /// Datagrams longer than the buffer are truncated by the transport and will fail to decode.
    /// Sizes below [`MAX_DATAGRAM_LEN`] are raised to it.
    ///
    /// Defaults to [`MAX_DATAGRAM_LEN`].
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> CollectorBuilder {
        self.buffer_size = buffer_size.max(MAX_DATAGRAM_LEN);
        self
    }

    /// Sets how long a reader blocks on the socket before checking for shutdown.
    ///
    /// This bounds how long [`CollectorHandle::shutdown`] waits for idle readers to exit.
    ///
    /// Defaults to 250 milliseconds.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> CollectorBuilder {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Binds the socket and spawns the reader threads.
    ///
    /// Every report is forwarded to `sink`, which is shared by all readers.
    ///
    /// # Errors
    ///
    /// If the bind address cannot be resolved, the socket cannot be bound or configured, or a
    /// reader thread cannot be spawned, an error is returned and no readers are left running.
    pub fn spawn<S>(self, sink: S) -> Result<CollectorHandle, CollectorError>
    where
        S: ReportSink + 'static,
    {
        let socket = match self.listener {
            Listener::Socket(socket) => socket,
            Listener::Address(address) => bind(&address)?,
        };
        socket.set_nonblocking(false).map_err(CollectorError::Configure)?;
        socket.set_read_timeout(Some(self.poll_interval)).map_err(CollectorError::Configure)?;
        let local_addr = socket.local_addr().map_err(CollectorError::Configure)?;

        let readers = self.readers.unwrap_or_else(default_readers).get();
        let socket = Arc::new(socket);
        let sink: Arc<dyn ReportSink> = Arc::new(sink);
        let shutdown = Arc::new(AtomicBool::new(false));
        let telemetry = Arc::new(Telemetry::default());

        let mut handle = CollectorHandle {
            local_addr,
            shutdown: Arc::clone(&shutdown),
            telemetry: Arc::clone(&telemetry),
            readers: Vec::with_capacity(readers),
        };

        for id in 0..readers {
            let reader = Reader {
                id,
                socket: Arc::clone(&socket),
                sink: Arc::clone(&sink),
                shutdown: Arc::clone(&shutdown),
                telemetry: Arc::clone(&telemetry),
                buffer_size: self.buffer_size,
            };

            // Dropping the handle on failure stops and joins any readers already spawned.
            let thread = thread::Builder::new()
                .name(format!("statler-reader-{}", id))
                .spawn(move || reader.run())
                .map_err(CollectorError::Spawn)?;
            handle.readers.push(thread);
        }

        info!(%local_addr, readers, "Collector listening.");
        Ok(handle)
    }
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        CollectorBuilder::new()
    }
}

fn bind(address: &str) -> Result<UdpSocket, CollectorError> {
    let addrs = resolve(address)
        .map_err(|source| CollectorError::Resolve { address: address.to_owned(), source })?;

    debug!(?addrs, "Binding collector socket.");
    UdpSocket::bind(&addrs[..]).map_err(CollectorError::Bind)
}

/// Resolves a bind address into the candidates to try, in order.
///
/// A bare `:<port>` prefers the IPv6 wildcard, which also accepts IPv4 traffic on dual-stack
/// hosts, and falls back to the IPv4 wildcard where IPv6 is unavailable.
fn resolve(address: &str) -> io::Result<Vec<SocketAddr>> {
    let addrs = match address.strip_prefix(':') {
        Some(port) => {
            let port = port.parse::<u16>().map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidInput, format!("invalid port: {}", e))
            })?;
            vec![
                SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)),
                SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            ]
        }
        None => address.to_socket_addrs()?.collect(),
    };

    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "address resolved to no socket addresses",
        ));
    }

    Ok(addrs)
}

fn default_readers() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}
