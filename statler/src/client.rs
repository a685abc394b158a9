use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs as _, UdpSocket},
};

use tracing::trace;

use crate::{codec, error::ClientError, stat::Stat};

/// Sends statistics to a collector.
///
/// A client holds one UDP socket, connected to the collector address that was resolved when the
/// client was created. Every call sends exactly one datagram, synchronously, with no buffering,
/// batching, or retries. A successful return means the datagram was handed to the local network
/// stack, not that the collector received it.
///
/// Clients can be shared between threads.
#[derive(Debug)]
pub struct Client {
    socket: UdpSocket,
}

impl Client {
    /// Creates a new `Client` that sends to the collector at `address`.
    ///
    /// The address must be in the format of `<host>:<port>`.
    ///
    /// # Errors
    ///
    /// If the address cannot be resolved, or the local socket cannot be created and connected to
    /// it, an error is returned.
    pub fn new<A>(address: A) -> Result<Self, ClientError>
    where
        A: AsRef<str>,
    {
        let address = address.as_ref();
        let addrs = resolve(address)
            .map_err(|source| ClientError::Resolve { address: address.to_owned(), source })?;

        // Bind in the family of the first candidate so that connecting to it can succeed.
        let local: SocketAddr = if addrs[0].is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local).map_err(ClientError::Socket)?;
        socket.connect(&addrs[..]).map_err(ClientError::Socket)?;

        Ok(Client { socket })
    }

    /// Sends an absolute gauge reading for `key`.
    ///
    /// # Errors
    ///
    /// If the statistic cannot be encoded or the datagram cannot be written, an error is returned.
    pub fn send_value<K: Into<String>>(&self, key: K, value: f64) -> Result<(), ClientError> {
        self.send(&Stat::value(key, value))
    }

    /// Sends a delta to add to the counter `key`.
    ///
    /// # Errors
    ///
    /// If the statistic cannot be encoded or the datagram cannot be written, an error is returned.
    pub fn send_count<K: Into<String>>(&self, key: K, count: i32) -> Result<(), ClientError> {
        self.send(&Stat::count(key, count))
    }

    /// Increments the counter `key` by one.
    ///
    /// # Errors
    ///
    /// If the statistic cannot be encoded or the datagram cannot be written, an error is returned.
    pub fn increment<K: Into<String>>(&self, key: K) -> Result<(), ClientError> {
        self.send_count(key, 1)
    }

    /// Sends a statistic.
    ///
    /// # Errors
    ///
    /// If the statistic cannot be encoded or the datagram cannot be written, an error is returned.
    /// Statistics that encode to more than [`MAX_DATAGRAM_LEN`](crate::MAX_DATAGRAM_LEN) bytes are
    /// rejected without sending anything.
    pub fn send(&self, stat: &Stat) -> Result<(), ClientError> {
        let payload = codec::encode(stat)?;

        let written = self.socket.send(&payload).map_err(ClientError::Socket)?;
        if written != payload.len() {
            return Err(ClientError::Socket(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram write: {} of {} bytes", written, payload.len()),
            )));
        }

        trace!(key = stat.key(), kind = %stat.kind(), len = written, "Sent stat.");
        Ok(())
    }

    /// Returns the local address of the client socket.
    ///
    /// # Errors
    ///
    /// If the address cannot be queried from the operating system, an error is returned.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Returns the collector address the client socket is connected to.
    ///
    /// # Errors
    ///
    /// If the address cannot be queried from the operating system, an error is returned.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }
}

fn resolve(address: &str) -> io::Result<Vec<SocketAddr>> {
    let addrs = address.to_socket_addrs()?.collect::<Vec<_>>();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "address resolved to no socket addresses",
        ));
    }

    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use std::{net::UdpSocket, time::Duration};

    use super::Client;
    use crate::{
        codec::{decode, MAX_DATAGRAM_LEN},
        error::{ClientError, EncodeError},
        stat::Stat,
    };

    fn receiver() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        socket
    }

    fn recv_stat(socket: &UdpSocket) -> Stat {
        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        let n = socket.recv(&mut buf).unwrap();
        Stat::try_from(decode(&buf[..n]).unwrap()).unwrap()
    }

    #[test]
    fn one_datagram_per_call() {
        let socket = receiver();
        let client = Client::new(socket.local_addr().unwrap().to_string()).unwrap();
        assert_eq!(client.peer_addr().unwrap(), socket.local_addr().unwrap());

        client.send_value("temperature", 21.5).unwrap();
        client.send_count("errors", -2).unwrap();
        client.increment("requests").unwrap();

        assert_eq!(recv_stat(&socket), Stat::value("temperature", 21.5));
        assert_eq!(recv_stat(&socket), Stat::count("errors", -2));
        assert_eq!(recv_stat(&socket), Stat::count("requests", 1));
    }

    #[test]
    fn oversized_stat_is_not_sent() {
        let socket = receiver();
        socket.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
        let client = Client::new(socket.local_addr().unwrap().to_string()).unwrap();

        let result = client.send_count("k".repeat(2 * MAX_DATAGRAM_LEN), 1);
        assert!(matches!(result, Err(ClientError::Encode(EncodeError::PayloadTooLarge { .. }))));

        let mut buf = [0u8; 4 * MAX_DATAGRAM_LEN];
        assert!(socket.recv(&mut buf).is_err());
    }

    #[test]
    fn unresolvable_address() {
        let result = Client::new("not an address");
        assert!(matches!(result, Err(ClientError::Resolve { .. })));
    }
}
