//! Time-ordered shard id layouts.
//!
//! The long layout packs `{timestamp:41, shard:13, sequence:10}` into a
//! 64-bit word, high to low, with the timestamp in milliseconds since
//! [`EPOCH_MILLIS`]. The short layout is decimal: `ticks * 1000 + shard`
//! where a tick is 100µs since the same epoch; it has no sequence field.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ShardError;

/// 2020-01-01T00:00:00Z in milliseconds since the Unix epoch.
pub const EPOCH_MILLIS: i64 = 1_577_836_800_000;

pub const TIMESTAMP_BITS: u32 = 41;
pub const SHARD_BITS: u32 = 13;
pub const SEQUENCE_BITS: u32 = 10;

const SHARD_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SHARD_BITS + SEQUENCE_BITS;
const TIMESTAMP_MASK: u64 = (1 << TIMESTAMP_BITS) - 1;
const SHARD_MASK: u64 = (1 << SHARD_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Number of distinct shards the long layout can address.
pub const MAX_SHARDS: u32 = 1 << SHARD_BITS;

/// Shards of the short layout must stay below this bound.
pub const SHORT_SHARD_LIMIT: u32 = 1000;

const NANOS_PER_TICK: i64 = 100_000;
const MICROS_PER_TICK: i64 = NANOS_PER_TICK / 1_000;
const EPOCH_TICKS: i64 = EPOCH_MILLIS * 10;

/// Common view over the time-ordered id layouts.
pub trait ShardIdentifier {
    /// The raw 64-bit value.
    fn value(&self) -> i64;
    fn shard(&self) -> u32;
    /// Elapsed time since the shard epoch, in the layout's own unit.
    fn timestamp(&self) -> i64;
    fn sequence(&self) -> u32;
    /// Creation instant recovered from the id.
    fn created_at(&self) -> DateTime<Utc>;
}

/// Milliseconds elapsed between the shard epoch and `now`, clamped at 0.
pub(crate) fn millis_since_epoch(now: DateTime<Utc>) -> i64 {
    let elapsed = now.timestamp_millis() - EPOCH_MILLIS;
    if elapsed < 0 {
        warn!(%now, "clock is before the shard epoch; using timestamp 0");
        return 0;
    }
    elapsed
}

/// 100µs ticks elapsed between the shard epoch and `now`, clamped at 0.
pub(crate) fn ticks_since_epoch(now: DateTime<Utc>) -> i64 {
    let elapsed = now.timestamp_micros().div_euclid(MICROS_PER_TICK) - EPOCH_TICKS;
    if elapsed < 0 {
        warn!(%now, "clock is before the shard epoch; using timestamp 0");
        return 0;
    }
    elapsed
}

fn epoch_offset(delta: TimeDelta) -> DateTime<Utc> {
    // `DateTime::<Utc>::default()` is the Unix epoch.
    DateTime::<Utc>::default() + TimeDelta::milliseconds(EPOCH_MILLIS) + delta
}

/// Long-form shard id: `{timestamp:41, shard:13, sequence:10}`.
///
/// # Examples
///
/// ```
/// use dvc_core::{ShardId, ShardIdentifier};
///
/// let id = ShardId::from_raw(361_468_114_661_024_787);
/// assert_eq!(id.shard(), 9);
/// assert_eq!(id.sequence(), 19);
/// assert_eq!(id.timestamp(), 43_090_357_144);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(i64);

impl ShardId {
    /// Wraps a raw value. Every 64-bit value decodes under this layout.
    pub const fn from_raw(value: i64) -> Self {
        Self(value)
    }

    /// Builds an id from its fields.
    ///
    /// The timestamp keeps its low 41 bits and the sequence wraps modulo
    /// 1024.
    ///
    /// # Errors
    ///
    /// [`ShardError::FieldOutOfRange`] when `shard` needs more than 13 bits
    /// or `timestamp_ms` is negative.
    pub fn from_parts(timestamp_ms: i64, shard: u32, sequence: u64) -> Result<Self, ShardError> {
        if shard >= MAX_SHARDS {
            return Err(ShardError::FieldOutOfRange {
                field: "shard",
                value: u64::from(shard),
                limit: u64::from(MAX_SHARDS),
            });
        }
        let Ok(timestamp) = u64::try_from(timestamp_ms) else {
            return Err(ShardError::NegativeTimestamp(timestamp_ms));
        };
        Ok(Self::pack(timestamp, shard, sequence))
    }

    /// Builds an id for `shard` at the instant `now`.
    pub(crate) fn generate(now: DateTime<Utc>, shard: u32, sequence: u64) -> Self {
        Self::pack(millis_since_epoch(now) as u64, shard, sequence)
    }

    fn pack(timestamp: u64, shard: u32, sequence: u64) -> Self {
        let raw = ((timestamp & TIMESTAMP_MASK) << TIMESTAMP_SHIFT)
            | ((u64::from(shard) & SHARD_MASK) << SHARD_SHIFT)
            | (sequence & SEQUENCE_MASK);
        Self(raw as i64)
    }

    fn bits(self) -> u64 {
        self.0 as u64
    }
}

impl ShardIdentifier for ShardId {
    fn value(&self) -> i64 {
        self.0
    }

    fn shard(&self) -> u32 {
        ((self.bits() >> SHARD_SHIFT) & SHARD_MASK) as u32
    }

    fn timestamp(&self) -> i64 {
        (self.bits() >> TIMESTAMP_SHIFT) as i64
    }

    fn sequence(&self) -> u32 {
        (self.bits() & SEQUENCE_MASK) as u32
    }

    fn created_at(&self) -> DateTime<Utc> {
        epoch_offset(TimeDelta::milliseconds(self.timestamp()))
    }
}

impl From<ShardId> for i64 {
    fn from(id: ShardId) -> Self {
        id.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short-form shard id: `ticks * 1000 + shard`.
///
/// Values stay below 2^53 for roughly 28 years after the epoch, so they
/// survive JSON number round-trips in consumers that use doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ShortShardId(i64);

impl ShortShardId {
    /// Wraps a raw value.
    ///
    /// # Errors
    ///
    /// [`ShardError::InvalidId`] for negative values.
    pub fn from_raw(value: i64) -> Result<Self, ShardError> {
        if value < 0 {
            return Err(ShardError::InvalidId(value));
        }
        Ok(Self(value))
    }

    /// Builds an id from a tick count and shard.
    ///
    /// # Errors
    ///
    /// [`ShardError::FieldOutOfRange`] when `shard >= 1000`,
    /// [`ShardError::NegativeTimestamp`] for negative `ticks`, and
    /// [`ShardError::InvalidId`] when the result does not fit in 64 bits.
    pub fn from_parts(ticks: i64, shard: u32) -> Result<Self, ShardError> {
        check_short_shard(shard)?;
        if ticks < 0 {
            return Err(ShardError::NegativeTimestamp(ticks));
        }
        ticks
            .checked_mul(i64::from(SHORT_SHARD_LIMIT))
            .and_then(|scaled| scaled.checked_add(i64::from(shard)))
            .map(Self)
            .ok_or(ShardError::InvalidId(ticks))
    }

    /// Builds an id for `shard` at the instant `now`.
    ///
    /// # Errors
    ///
    /// [`ShardError::FieldOutOfRange`] when `shard >= 1000`.
    pub fn generate(now: DateTime<Utc>, shard: u32) -> Result<Self, ShardError> {
        Self::from_parts(ticks_since_epoch(now), shard)
    }
}

fn check_short_shard(shard: u32) -> Result<(), ShardError> {
    if shard >= SHORT_SHARD_LIMIT {
        return Err(ShardError::FieldOutOfRange {
            field: "shard",
            value: u64::from(shard),
            limit: u64::from(SHORT_SHARD_LIMIT),
        });
    }
    Ok(())
}

impl ShardIdentifier for ShortShardId {
    fn value(&self) -> i64 {
        self.0
    }

    fn shard(&self) -> u32 {
        (self.0 % i64::from(SHORT_SHARD_LIMIT)) as u32
    }

    fn timestamp(&self) -> i64 {
        self.0 / i64::from(SHORT_SHARD_LIMIT)
    }

    /// The short layout has no sequence field.
    fn sequence(&self) -> u32 {
        0
    }

    fn created_at(&self) -> DateTime<Utc> {
        epoch_offset(TimeDelta::microseconds(self.timestamp() * MICROS_PER_TICK))
    }
}

impl TryFrom<i64> for ShortShardId {
    type Error = ShardError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_raw(value)
    }
}

impl From<ShortShardId> for i64 {
    fn from(id: ShortShardId) -> Self {
        id.0
    }
}

impl fmt::Display for ShortShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
