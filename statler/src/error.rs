use std::io;

use thiserror::Error;

/// Errors that could occur while encoding a statistic.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The statistic has an empty key.
    #[error("statistic key must not be empty")]
    EmptyKey,

    /// The encoded statistic does not fit in a single datagram.
    #[error("encoded statistic is {len} bytes, exceeding the {max} byte datagram limit")]
    PayloadTooLarge {
        /// Encoded length of the statistic.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// The underlying Protocol Buffers encoder failed.
    #[error("failed to encode statistic: {0}")]
    Protobuf(#[from] prost::EncodeError),
}

/// Errors that could occur while decoding a datagram.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The datagram is not a well-formed statistic record.
    #[error("malformed datagram: {0}")]
    Malformed(#[from] prost::DecodeError),

    /// The record decoded, but has no key.
    #[error("decoded statistic has an empty key")]
    EmptyKey,
}

/// A record carried a kind that is not understood by this version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("unknown stat kind {kind}")]
pub struct UnknownKindError {
    /// The raw kind tag from the wire.
    pub kind: i32,
}

/// Errors returned by a [`ReportSink`](crate::ReportSink).
#[derive(Debug, Error)]
pub enum SinkError {
    /// The backend could not be reached, or the transport failed mid-request.
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The backend received the report but refused it.
    #[error("report rejected: {reason}")]
    Rejected {
        /// Details about the rejection.
        reason: String,
    },

    /// Any other failure.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors that could occur while dispatching a decoded record to a sink.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The record carried an unknown kind, so no sink operation applies to it.
    #[error(transparent)]
    UnknownKind(#[from] UnknownKindError),

    /// The sink failed to process the report.
    #[error("sink failed: {0}")]
    Sink(#[from] SinkError),
}

/// Errors that could occur while sending a statistic with a [`Client`](crate::Client).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The collector address could not be resolved.
    #[error("failed to resolve collector address '{address}': {source}")]
    Resolve {
        /// The address as given.
        address: String,
        /// The underlying resolution error.
        #[source]
        source: io::Error,
    },

    /// Creating, connecting, or writing to the socket failed.
    #[error("socket error: {0}")]
    Socket(#[source] io::Error),

    /// The statistic could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Errors that could occur while starting a collector.
///
/// All of these are fatal: the collector never begins serving.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The bind address could not be resolved.
    #[error("failed to resolve bind address '{address}': {source}")]
    Resolve {
        /// The address as given.
        address: String,
        /// The underlying resolution error.
        #[source]
        source: io::Error,
    },

    /// Binding the socket failed.
    #[error("failed to bind collector socket: {0}")]
    Bind(#[source] io::Error),

    /// Configuring the bound socket failed.
    #[error("failed to configure collector socket: {0}")]
    Configure(#[source] io::Error),

    /// Spawning a reader thread failed.
    #[error("failed to spawn reader thread: {0}")]
    Spawn(#[source] io::Error),
}
