//! Wire codec for statistic records.
//!
//! One record is encoded per datagram as a Protocol Buffers message. Decoding and interpretation
//! are separate steps: [`decode`] only checks that the bytes form a well-formed record, while
//! unknown kinds are reported when the record is converted into a [`Stat`].
use bytes::{Bytes, BytesMut};
use prost::Message;

use crate::{
    error::{DecodeError, EncodeError, UnknownKindError},
    stat::{Kind, Stat},
};

/// Maximum length, in bytes, of a single encoded record.
///
/// Every record travels in exactly one UDP datagram, and collectors read into buffers of this
/// size, so anything longer would be truncated in transit.
pub const MAX_DATAGRAM_LEN: usize = 1024;

/// A statistic record as it appears on the wire.
///
/// The kind is kept as its raw tag so that records with kinds unknown to this version still
/// decode.
///
/// .proto:
/// ```protobuf
/// message Stat {
///   Kind kind = 1;
///   sint32 count = 2;
///   double value = 3;
///   string key = 4;
/// }
/// ```
#[derive(Clone, PartialEq, prost::Message)]
pub struct WireStat {
    /// Raw kind tag.
    #[prost(enumeration = "Kind", tag = "1")]
    pub kind: i32,

    /// Counter delta, relevant for [`Kind::Count`].
    #[prost(sint32, tag = "2")]
    pub count: i32,

    /// Gauge reading, relevant for [`Kind::Value`].
    #[prost(double, tag = "3")]
    pub value: f64,

    /// Metric key.
    #[prost(string, tag = "4")]
    pub key: String,
}

impl WireStat {
    /// Returns the kind of this record, if it is one this version understands.
    ///
    /// # Errors
    ///
    /// If the kind tag does not map to a known [`Kind`], an error is returned.
    pub fn known_kind(&self) -> Result<Kind, UnknownKindError> {
        Kind::try_from(self.kind).map_err(|_| UnknownKindError { kind: self.kind })
    }
}

/// Encodes a statistic into a single datagram payload.
///
/// # Errors
///
/// If the key is empty, or the encoded record would be longer than [`MAX_DATAGRAM_LEN`], an error
/// is returned and nothing is produced.
pub fn encode(stat: &Stat) -> Result<Bytes, EncodeError> {
    if stat.key().is_empty() {
        return Err(EncodeError::EmptyKey);
    }

    let wire = WireStat::from(stat);
    let len = wire.encoded_len();
    if len > MAX_DATAGRAM_LEN {
        return Err(EncodeError::PayloadTooLarge { len, max: MAX_DATAGRAM_LEN });
    }

    let mut buf = BytesMut::with_capacity(len);
    wire.encode(&mut buf)?;
    Ok(buf.freeze())
}

/// Decodes a single datagram payload into a wire record.
///
/// # Errors
///
/// If the payload is malformed, truncated, or carries an empty key, an error is returned.
pub fn decode(buf: &[u8]) -> Result<WireStat, DecodeError> {
    let wire = WireStat::decode(buf)?;
    if wire.key.is_empty() {
        return Err(DecodeError::EmptyKey);
    }

    Ok(wire)
}
