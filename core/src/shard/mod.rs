//! Shard-aware identifier generation.
//!
//! A [`Sharder`] distributes entities over a fixed number of shards and
//! emits [`ShardId`]s that carry their shard and creation time, so both can
//! be recovered from the id alone. Shards are chosen round-robin, from a
//! numeric sub-id, or from a hash of a string key.
//!
//! The sharder owns a monotonically increasing sequence. Methods that emit
//! ids take `&mut self`; share a sharder across threads only behind a lock,
//! or give each writer its own sharder over a disjoint shard space.
//!
//! # Examples
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use dvc_core::{FixedClock, ShardIdentifier, Sharder};
//!
//! let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());
//! let mut sharder = Sharder::with_clock(4, clock).unwrap();
//!
//! let first = sharder.new_round_robin();
//! let second = sharder.new_round_robin();
//! assert_eq!((first.shard(), first.sequence()), (0, 0));
//! assert_eq!((second.shard(), second.sequence()), (1, 1));
//!
//! let keyed = sharder.new_from_string("customer-17").unwrap();
//! assert_eq!(keyed.shard(), sharder.shard_for_key("customer-17").unwrap());
//! ```

mod clock;
mod hash;
mod id;
mod int_id;

use thiserror::Error;
use tracing::debug;

pub use clock::{Clock, FixedClock, SystemClock};
pub use hash::{SHARD_KEY_PREFIX_LEN, fnv1a_32, shard_key_hash};
pub use id::{
    EPOCH_MILLIS, MAX_SHARDS, SEQUENCE_BITS, SHARD_BITS, SHORT_SHARD_LIMIT, ShardId,
    ShardIdentifier, ShortShardId, TIMESTAMP_BITS,
};
pub use int_id::{INT_LOCAL_BITS, INT_SHARD_BITS, INT_TYPE_BITS, IntShardId};

/// Errors raised while building or decoding shard ids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardError {
    /// `new_from_string` was called with an empty key.
    #[error("Shard string cannot be empty")]
    EmptyShardKey,
    /// Shard count is zero or exceeds what the id layout can address.
    #[error("number of shards must be between 1 and 8192, got {0}")]
    InvalidShardCount(u32),
    /// A field does not fit its bit (or decimal) width.
    #[error("{field} {value} out of range (must be below {limit})")]
    FieldOutOfRange {
        field: &'static str,
        value: u64,
        limit: u64,
    },
    /// Timestamps are measured forward from the shard epoch.
    #[error("timestamp {0} is before the shard epoch")]
    NegativeTimestamp(i64),
    /// The raw value is not a valid id for the layout.
    #[error("invalid shard id: {0}")]
    InvalidId(i64),
}

/// Generator of shard ids over `number_of_shards` shards.
#[derive(Debug, Clone)]
pub struct Sharder<C = SystemClock> {
    number_of_shards: u32,
    sequence: u64,
    clock: C,
}

impl Sharder<SystemClock> {
    /// Creates a sharder reading wall-clock time.
    ///
    /// # Errors
    ///
    /// [`ShardError::InvalidShardCount`] unless `1 <= number_of_shards <= 8192`.
    pub fn new(number_of_shards: u32) -> Result<Self, ShardError> {
        Self::with_clock(number_of_shards, SystemClock)
    }
}

impl<C: Clock> Sharder<C> {
    /// Creates a sharder with an injected clock.
    ///
    /// # Errors
    ///
    /// [`ShardError::InvalidShardCount`] unless `1 <= number_of_shards <= 8192`.
    pub fn with_clock(number_of_shards: u32, clock: C) -> Result<Self, ShardError> {
        if number_of_shards == 0 || number_of_shards > MAX_SHARDS {
            return Err(ShardError::InvalidShardCount(number_of_shards));
        }
        Ok(Self {
            number_of_shards,
            sequence: 0,
            clock,
        })
    }

    pub fn number_of_shards(&self) -> u32 {
        self.number_of_shards
    }

    /// Number of ids emitted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Emits an id on shard `sequence % number_of_shards`.
    pub fn new_round_robin(&mut self) -> ShardId {
        let shard = self.round_robin_shard();
        self.emit(shard)
    }

    /// Emits an id on shard `sub_id % number_of_shards`.
    pub fn new_from_sub_id(&mut self, sub_id: u64) -> ShardId {
        let shard = self.shard_for_sub_id(sub_id);
        self.emit(shard)
    }

    /// Emits an id on the shard selected by hashing the first three bytes
    /// of `key`.
    ///
    /// # Errors
    ///
    /// [`ShardError::EmptyShardKey`] for an empty key; the sequence is not
    /// advanced.
    pub fn new_from_string(&mut self, key: &str) -> Result<ShardId, ShardError> {
        let shard = self.shard_for_key(key)?;
        Ok(self.emit(shard))
    }

    /// Shard that `sub_id` maps to. Does not advance the sequence.
    pub fn shard_for_sub_id(&self, sub_id: u64) -> u32 {
        (sub_id % u64::from(self.number_of_shards)) as u32
    }

    /// Shard that `key` maps to. Does not advance the sequence.
    ///
    /// # Errors
    ///
    /// [`ShardError::EmptyShardKey`] for an empty key.
    pub fn shard_for_key(&self, key: &str) -> Result<u32, ShardError> {
        if key.is_empty() {
            return Err(ShardError::EmptyShardKey);
        }
        let hash = shard_key_hash(key);
        let shard = hash % self.number_of_shards;
        debug!(hash, shard, "selected shard from key");
        Ok(shard)
    }

    /// Short-layout counterpart of [`new_round_robin`](Self::new_round_robin).
    ///
    /// # Errors
    ///
    /// [`ShardError::FieldOutOfRange`] when the selected shard is 1000 or
    /// above; the sequence is not advanced.
    pub fn new_short_round_robin(&mut self) -> Result<ShortShardId, ShardError> {
        let shard = self.round_robin_shard();
        self.emit_short(shard)
    }

    /// Short-layout counterpart of [`new_from_sub_id`](Self::new_from_sub_id).
    ///
    /// # Errors
    ///
    /// [`ShardError::FieldOutOfRange`] when the selected shard is 1000 or
    /// above; the sequence is not advanced.
    pub fn new_short_from_sub_id(&mut self, sub_id: u64) -> Result<ShortShardId, ShardError> {
        let shard = self.shard_for_sub_id(sub_id);
        self.emit_short(shard)
    }

    /// Short-layout counterpart of [`new_from_string`](Self::new_from_string).
    ///
    /// # Errors
    ///
    /// [`ShardError::EmptyShardKey`] for an empty key and
    /// [`ShardError::FieldOutOfRange`] when the selected shard is 1000 or
    /// above; the sequence is not advanced in either case.
    pub fn new_short_from_string(&mut self, key: &str) -> Result<ShortShardId, ShardError> {
        let shard = self.shard_for_key(key)?;
        self.emit_short(shard)
    }

    fn round_robin_shard(&self) -> u32 {
        (self.sequence % u64::from(self.number_of_shards)) as u32
    }

    fn emit(&mut self, shard: u32) -> ShardId {
        let id = ShardId::generate(self.clock.now(), shard, self.sequence);
        self.sequence = self.sequence.wrapping_add(1);
        id
    }

    fn emit_short(&mut self, shard: u32) -> Result<ShortShardId, ShardError> {
        let id = ShortShardId::generate(self.clock.now(), shard)?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(id)
    }
}
