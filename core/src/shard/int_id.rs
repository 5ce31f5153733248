//! Non-time shard id layout: `{unused:2, shard:16, type:10, local:36}`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ShardError;

pub const INT_SHARD_BITS: u32 = 16;
pub const INT_TYPE_BITS: u32 = 10;
pub const INT_LOCAL_BITS: u32 = 36;

// The two high bits stay clear, so fields are placed from bit 62 down.
const SHARD_SPACER: u32 = 62 - INT_SHARD_BITS;
const TYPE_SPACER: u32 = SHARD_SPACER - INT_TYPE_BITS;
const LOCAL_SPACER: u32 = TYPE_SPACER - INT_LOCAL_BITS;

const SHARD_MASK: u64 = 0xFFFF;
const TYPE_MASK: u64 = 0x3FF;
const LOCAL_MASK: u64 = 0xF_FFFF_FFFF;

/// Identifier addressing an entity of a given type inside a shard.
///
/// # Examples
///
/// ```
/// use dvc_core::IntShardId;
///
/// let id = IntShardId::from_raw(241_294_492_511_762_325);
/// assert_eq!(id.shard(), 3429);
/// assert_eq!(id.entity_type(), 1);
/// assert_eq!(id.local_id(), 7_075_733);
///
/// let rebuilt = IntShardId::new(3429, 1, 7_075_733).unwrap();
/// assert_eq!(rebuilt, id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntShardId(i64);

impl IntShardId {
    /// Packs `(shard, entity_type, local_id)`.
    ///
    /// # Errors
    ///
    /// [`ShardError::FieldOutOfRange`] when `entity_type` needs more than
    /// 10 bits or `local_id` more than 36.
    pub fn new(shard: u16, entity_type: u16, local_id: u64) -> Result<Self, ShardError> {
        if u64::from(entity_type) > TYPE_MASK {
            return Err(ShardError::FieldOutOfRange {
                field: "type",
                value: u64::from(entity_type),
                limit: TYPE_MASK + 1,
            });
        }
        if local_id > LOCAL_MASK {
            return Err(ShardError::FieldOutOfRange {
                field: "local_id",
                value: local_id,
                limit: LOCAL_MASK + 1,
            });
        }
        let raw = (u64::from(shard) << SHARD_SPACER)
            | (u64::from(entity_type) << TYPE_SPACER)
            | (local_id << LOCAL_SPACER);
        Ok(Self(raw as i64))
    }

    /// Wraps a raw value; bits outside the layout are ignored on decode.
    pub const fn from_raw(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn shard(self) -> u16 {
        ((self.0 as u64 >> SHARD_SPACER) & SHARD_MASK) as u16
    }

    pub fn entity_type(self) -> u16 {
        ((self.0 as u64 >> TYPE_SPACER) & TYPE_MASK) as u16
    }

    pub fn local_id(self) -> u64 {
        (self.0 as u64 >> LOCAL_SPACER) & LOCAL_MASK
    }
}

impl From<IntShardId> for i64 {
    fn from(id: IntShardId) -> Self {
        id.0
    }
}

impl fmt::Display for IntShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
