use std::fmt;

use crate::{codec::WireStat, error::UnknownKindError};

/// Kind of a statistic.
///
/// The discriminant values are the tags used on the wire and must never be reassigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Kind {
    /// The statistic adds a delta to a counter.
    Count = 0,

    /// The statistic sets an absolute gauge value.
    Value = 1,
}

impl Kind {
    /// Returns a short, lowercase name for the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Kind::Count => "count",
            Kind::Value => "value",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single measurement to be forwarded to the collector.
///
/// Only the payload relevant to the kind is carried, so a `Stat` can never hold a count and a value
/// at the same time.
#[derive(Clone, Debug, PartialEq)]
pub enum Stat {
    /// Adds `count` to the counter named `key`.
    Count {
        /// Metric key.
        key: String,
        /// Delta to add to the counter.
        count: i32,
    },

    /// Sets the gauge named `key` to `value`.
    Value {
        /// Metric key.
        key: String,
        /// Absolute gauge reading.
        value: f64,
    },
}

impl Stat {
    /// Creates a counter statistic.
    pub fn count<K: Into<String>>(key: K, count: i32) -> Self {
        Stat::Count { key: key.into(), count }
    }

    /// Creates a gauge statistic.
    pub fn value<K: Into<String>>(key: K, value: f64) -> Self {
        Stat::Value { key: key.into(), value }
    }

    /// Returns the kind of this statistic.
    pub fn kind(&self) -> Kind {
        match self {
            Stat::Count { .. } => Kind::Count,
            Stat::Value { .. } => Kind::Value,
        }
    }

    /// Returns the metric key.
    pub fn key(&self) -> &str {
        match self {
            Stat::Count { key, .. } | Stat::Value { key, .. } => key,
        }
    }
}

impl From<&Stat> for WireStat {
    fn from(stat: &Stat) -> Self {
        match stat {
            Stat::Count { key, count } => WireStat {
                kind: Kind::Count as i32,
                count: *count,
                value: 0.0,
                key: key.clone(),
            },
            Stat::Value { key, value } => WireStat {
                kind: Kind::Value as i32,
                count: 0,
                value: *value,
                key: key.clone(),
            },
        }
    }
}

impl TryFrom<WireStat> for Stat {
    type Error = UnknownKindError;

    /// Interprets a decoded record.
    ///
    /// Only the field selected by the kind is read; the other one is ignored even when set.
    fn try_from(wire: WireStat) -> Result<Self, Self::Error> {
        match wire.known_kind()? {
            Kind::Count => Ok(Stat::Count { key: wire.key, count: wire.count }),
            Kind::Value => Ok(Stat::Value { key: wire.key, value: wire.value }),
        }
    }
}
