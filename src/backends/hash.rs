//! Affinity key hashing
//!
//! Every balancer instance must map a key to the same index, so the hash is
//! SipHash-2-4 with fixed zero keys rather than std's `DefaultHasher`, whose
//! algorithm is not guaranteed across builds.

use std::hash::Hasher;

use siphasher::sip::SipHasher24;

/// Stable 64-bit hash of an affinity key
pub fn affinity_hash(key: &str) -> u64 {
    let mut hasher = SipHasher24::new();
    hasher.write(key.as_bytes());
    hasher.finish()
}

/// Primary snapshot index for `key` among `len` nodes, `None` when empty
pub fn primary_index(key: &str, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some((affinity_hash(key) % len as u64) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(affinity_hash(""), 0x1e92_4b9d_7377_00d7);
        assert_eq!(affinity_hash("a"), 0x96c2_0860_cd93_a249);
        assert_eq!(affinity_hash("Call-ID"), 0x6935_e45c_87ae_2ae3);
    }

    #[test]
    fn test_primary_index_in_range() {
        for len in 1..20 {
            for i in 0..100 {
                let key = format!("call-{}@example.com", i);
                assert!(primary_index(&key, len).unwrap() < len);
            }
        }
        assert_eq!(primary_index("anything", 0), None);
    }

    #[test]
    fn test_spread_over_buckets() {
        let mut buckets = [0usize; 4];
        for i in 0..4000 {
            buckets[primary_index(&format!("{}-a84b4c76e66710", i), 4).unwrap()] += 1;
        }
        for count in buckets {
            assert!(count > 900, "uneven distribution: {:?}", buckets);
        }
    }
}
