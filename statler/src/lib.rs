//! A minimal metrics relay over UDP.
//!
//! Applications emit counters and gauges with a [`Client`], which sends each measurement to a
//! collector as a single UDP datagram. The collector, spawned from a [`CollectorBuilder`], decodes
//! each datagram and forwards the measurement to a [`ReportSink`].
//!
//! # Encoding
//!
//! Each datagram carries exactly one [`Stat`], encoded as a Protocol Buffers message. Field tags
//! travel with the data, so new optional fields can be added without breaking older decoders. The
//! schema is, in `.proto` terms:
//!
//! ```protobuf
//! message Stat {
//!   Kind kind = 1;
//!   sint32 count = 2;
//!   double value = 3;
//!   string key = 4;
//! }
//!
//! enum Kind {
//!   COUNT = 0;
//!   VALUE = 1;
//! }
//! ```
//!
//! A single encoded record must fit in [`MAX_DATAGRAM_LEN`] bytes. Larger records are rejected
//! before anything is written to the socket.
//!
//! # Delivery
//!
//! There are no delivery guarantees. Datagrams can be dropped or reordered, nothing is ever
//! acknowledged or retried, and a successful send only means the datagram was handed to the local
//! network stack.
//!
//! # Usage
//!
//! ```no_run
//! use statler::{Client, CollectorBuilder, LogSink};
//!
//! // Spawn a collector that logs everything it receives.
//! let collector = CollectorBuilder::default()
//!     .with_bind_address("127.0.0.1:5354")
//!     .spawn(LogSink::default())
//!     .expect("failed to spawn collector");
//!
//! // Emit some measurements to it.
//! let client = Client::new("127.0.0.1:5354").expect("failed to create client");
//! client.increment("requests").expect("failed to send");
//! client.send_value("queue_depth", 42.0).expect("failed to send");
//!
//! collector.shutdown();
//! ```
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod client;
pub use self::client::Client;

pub mod codec;
pub use self::codec::{decode, encode, WireStat, MAX_DATAGRAM_LEN};

mod collector;
pub use self::collector::{
    dispatch, CollectorBuilder, CollectorHandle, TelemetrySnapshot, DEFAULT_BIND_ADDRESS,
};

mod error;
pub use self::error::{
    ClientError, CollectorError, DecodeError, DispatchError, EncodeError, SinkError,
    UnknownKindError,
};

pub mod sink;
pub use self::sink::{DebuggingSink, LogSink, ReportSink};

#[cfg(feature = "recorder")]
pub use self::sink::RecorderSink;

#[cfg(feature = "stathat")]
pub use self::sink::{StatHatBuilder, StatHatSink};

mod stat;
pub use self::stat::{Kind, Stat};
