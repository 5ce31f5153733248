//! FNV-1a hashing of shard keys.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Number of leading key bytes that take part in shard selection.
pub const SHARD_KEY_PREFIX_LEN: usize = 3;

/// 32-bit FNV-1a over `bytes`.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Hash of the first [`SHARD_KEY_PREFIX_LEN`] bytes of `key` (or all of
/// it when shorter).
pub fn shard_key_hash(key: &str) -> u32 {
    let bytes = key.as_bytes();
    fnv1a_32(&bytes[..bytes.len().min(SHARD_KEY_PREFIX_LEN)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_key_hash_uses_prefix_only() {
        assert_eq!(shard_key_hash("abcdef"), fnv1a_32(b"abc"));
        assert_eq!(shard_key_hash("abc"), 0x1a47_e90b);
        assert_eq!(shard_key_hash("ab"), fnv1a_32(b"ab"));
    }

    #[test]
    fn test_prefix_counts_bytes_not_chars() {
        // "é" is two bytes, so the prefix is "éx".
        assert_eq!(shard_key_hash("éxyz"), fnv1a_32(&"éxyz".as_bytes()[..3]));
    }
}
