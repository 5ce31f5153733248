//! Core algorithms behind the `dvc` tool.
//!
//! Three independent, synchronous components:
//!
//! - **Versioning** — [`next_version`] computes the next release tag for a
//!   requested [`Bump`] (`major`, `minor`, `patch`, `alpha`, `beta`, `rc`,
//!   `release`), rejecting regressive pre-release moves.
//! - **Sharding** — [`Sharder`] spreads entities across shards and emits
//!   [`ShardId`]s from which shard and creation time can be recovered;
//!   [`ShortShardId`] and [`IntShardId`] are the alternative layouts.
//! - **Permissions** — [`Permission`] encodes `(section, group, perm)` as a
//!   decimal code and [`UserPermissions`] stores a granted set as bitmaps.
//!
//! None of them perform I/O or share state.
//!
//! # Example
//!
//! ```
//! use dvc_core::*;
//!
//! assert_eq!(next_version("v1.8.58-5-g98e9b2b", "").unwrap(), "v1.8.59");
//!
//! let mut sharder = Sharder::new(16).unwrap();
//! let id = sharder.new_from_sub_id(42);
//! assert_eq!(id.shard(), 42 % 16);
//!
//! let perms = UserPermissions::from_codes([1_090_710]).unwrap();
//! assert!(perms.has(Permission::new(10, 7, 9).unwrap()));
//! ```

mod permissions;
mod shard;
mod version;

pub use permissions::{
    MAX_BIT_INDEX, PERMISSION_PREFIX, Permission, PermissionError, UserPermissions, build_perm,
    fetch_base_perm, fetch_group, fetch_section, to_bit_position,
};
pub use shard::*;
pub use version::{
    Bump, PreRelease, PreReleaseKind, Version, VersionError, next_version, parse_pre_release,
};
