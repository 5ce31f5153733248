//! Property tests for id layouts, shard distribution, versions and
//! permission bitmaps.

use chrono::{TimeZone, Utc};
use dvc_core::*;
use proptest::prelude::*;

fn fixed_clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap())
}

fn arbitrary_permission() -> impl Strategy<Value = Permission> {
    (0u32..64, 0u32..64, 0u32..64)
        .prop_map(|(section, group, perm)| Permission::new(section, group, perm).unwrap())
}

// =============================================================================
// Shard ids
// =============================================================================

proptest! {
    #[test]
    fn long_id_round_trips(timestamp in 0i64..(1 << 41), shard in 0u32..MAX_SHARDS, sequence in any::<u64>()) {
        let id = ShardId::from_parts(timestamp, shard, sequence).unwrap();
        let parsed = ShardId::from_raw(id.value());
        prop_assert_eq!(parsed.timestamp(), timestamp);
        prop_assert_eq!(parsed.shard(), shard);
        prop_assert_eq!(u64::from(parsed.sequence()), sequence % 1024);
    }

    #[test]
    fn int_id_round_trips(shard in any::<u16>(), entity_type in 0u16..1024, local_id in 0u64..(1 << 36)) {
        let id = IntShardId::new(shard, entity_type, local_id).unwrap();
        let parsed = IntShardId::from_raw(id.value());
        prop_assert_eq!(parsed.shard(), shard);
        prop_assert_eq!(parsed.entity_type(), entity_type);
        prop_assert_eq!(parsed.local_id(), local_id);
        prop_assert!(id.value() >= 0);
    }

    #[test]
    fn short_id_round_trips(ticks in 0i64..(1 << 42), shard in 0u32..1000) {
        let id = ShortShardId::from_parts(ticks, shard).unwrap();
        prop_assert_eq!(id.timestamp(), ticks);
        prop_assert_eq!(id.shard(), shard);
        prop_assert_eq!(id.sequence(), 0);
    }

    #[test]
    fn round_robin_walks_shards_in_order(shards in 1u32..64) {
        let mut sharder = Sharder::with_clock(shards, fixed_clock()).unwrap();
        for k in 0..(2 * u64::from(shards)) {
            let id = sharder.new_round_robin();
            prop_assert_eq!(u64::from(id.shard()), k % u64::from(shards));
            prop_assert_eq!(u64::from(id.sequence()), k % 1024);
        }
        prop_assert_eq!(sharder.sequence(), 2 * u64::from(shards));
    }

    #[test]
    fn sub_id_selects_modulo_shard(shards in 1u32..=MAX_SHARDS, sub_id in any::<u64>()) {
        let mut sharder = Sharder::with_clock(shards, fixed_clock()).unwrap();
        let expected = (sub_id % u64::from(shards)) as u32;
        prop_assert_eq!(sharder.shard_for_sub_id(sub_id), expected);
        prop_assert_eq!(sharder.new_from_sub_id(sub_id).shard(), expected);
    }

    #[test]
    fn string_key_selects_hashed_prefix(shards in 1u32..512, key in "[a-z0-9-]{1,12}") {
        let mut sharder = Sharder::with_clock(shards, fixed_clock()).unwrap();
        let prefix = &key.as_bytes()[..key.len().min(3)];
        let expected = fnv1a_32(prefix) % shards;
        prop_assert_eq!(sharder.new_from_string(&key).unwrap().shard(), expected);
    }
}

// =============================================================================
// Versions
// =============================================================================

proptest! {
    #[test]
    fn release_keeps_numbers(major in 0u64..1000, minor in 0u64..1000, patch in 0u64..1000,
                             kind in prop::sample::select(vec!["", "-alpha.3", "-beta.1", "-rc.7", "-4-gabc123"])) {
        let input = format!("{major}.{minor}.{patch}{kind}");
        prop_assert_eq!(next_version(&input, "release").unwrap(), format!("{major}.{minor}.{patch}"));
    }

    #[test]
    fn next_version_is_deterministic(major in 0u64..50, minor in 0u64..50, patch in 0u64..50,
                                     bump in prop::sample::select(vec!["", "major", "minor", "patch", "alpha", "beta", "rc", "release"])) {
        let input = format!("v{major}.{minor}.{patch}");
        prop_assert_eq!(next_version(&input, bump), next_version(&input, bump));
    }

    #[test]
    fn bumps_never_go_backwards(major in 0u64..50, minor in 0u64..50, patch in 0u64..50,
                                bump in prop::sample::select(vec!["major", "minor", "patch", "alpha", "beta", "rc"])) {
        let current: Version = format!("{major}.{minor}.{patch}-alpha.1").parse().unwrap();
        let next: Version = next_version(&current.to_string(), bump).unwrap().parse().unwrap();
        prop_assert!(next > current);
    }
}

// =============================================================================
// Permissions
// =============================================================================

proptest! {
    #[test]
    fn code_round_trips(permission in arbitrary_permission()) {
        let code = permission.code();
        prop_assert_eq!(fetch_section(code), u32::from(permission.section()));
        prop_assert_eq!(fetch_group(code), u32::from(permission.group()));
        prop_assert_eq!(fetch_base_perm(code), u32::from(permission.perm()));
        prop_assert_eq!(Permission::from_code(code).unwrap(), permission);
    }

    #[test]
    fn add_then_has_then_remove(permission in arbitrary_permission()) {
        let mut perms = UserPermissions::from_iter([permission]);
        prop_assert!(perms.has(permission));
        perms.remove(permission);
        prop_assert!(!perms.has(permission));
        prop_assert!(perms.is_empty());
    }

    #[test]
    fn add_is_idempotent(permission in arbitrary_permission()) {
        let once = UserPermissions::from_iter([permission]);
        let twice = UserPermissions::from_iter([permission, permission]);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sections_match_groups_after_mixed_edits(
        granted in prop::collection::vec(arbitrary_permission(), 0..20),
        revoked in prop::collection::vec(any::<prop::sample::Index>(), 0..20),
    ) {
        let mut perms = UserPermissions::from_iter(granted.iter().copied());
        for index in revoked {
            if !granted.is_empty() {
                perms.remove(*index.get(&granted));
            }
        }
        let expected_sections = perms.per_group().keys().fold(0u64, |acc, bit| acc | bit);
        prop_assert_eq!(perms.sections(), expected_sections);
        prop_assert!(perms.per_group().values().all(|groups| !groups.is_empty()));
        for permission in perms.iter() {
            prop_assert!(perms.has(permission));
        }
        let json = serde_json::to_string(&perms).unwrap();
        let restored: UserPermissions = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(restored, perms);
    }
}
