//! Property-Based Tests for the Cache Building Blocks
//!
//! # Test Properties
//!
//! 1. **Codec Roundtrip**: unpack(pack(v)) = v for any threshold
//! 2. **Compression Gate**: only payloads above the threshold are compressed
//! 3. **Namespacing**: the prefix can always be stripped back off
//! 4. **L1 Bound**: the local tier never holds more than its size limit
//! 5. **Size Accounting**: total size equals the sum of last written sizes

#![cfg(test)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use super::codec::{Codec, CompressionAlgorithm};
use super::entry::Expiration;
use super::key::{list_key, KeyNamespace};
use super::l1::{L1Cache, L1Config, LocalStore};
use super::metrics::CacheMetrics;

// =============================================================================
// Property Strategies
// =============================================================================

/// Repetitive strings compress well; random ones do not. Mix both.
fn payload_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop_oneof![
            "[a-z]{0,8}".prop_map(|s| s.repeat(20)),
            any::<String>(),
        ],
        0..50,
    )
}

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9:_*]{0,24}"
}

// =============================================================================
// Codec Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: packing then unpacking returns the original value.
    #[test]
    fn prop_codec_roundtrip(
        payload in payload_strategy(),
        enabled in any::<bool>(),
        threshold in 0usize..4096,
    ) {
        let codec = Codec::new(enabled, threshold);
        let packed = codec.pack(&payload)?;
        let restored: Vec<String> = codec.unpack(&packed.bytes)?;

        prop_assert_eq!(restored, payload);
    }

    /// Property: compression only applies above the threshold and only when it saves space.
    #[test]
    fn prop_compression_gate(
        payload in payload_strategy(),
        threshold in 0usize..4096,
    ) {
        let codec = Codec::new(true, threshold);
        let packed = codec.pack(&payload)?;

        match packed.algorithm {
            CompressionAlgorithm::Lz4 => {
                prop_assert!(packed.raw_len > threshold);
                prop_assert!(packed.len() < packed.raw_len);
                prop_assert!(Codec::is_compressed(&packed.bytes));
            }
            CompressionAlgorithm::None => {
                prop_assert_eq!(packed.len(), packed.raw_len);
                prop_assert!(!Codec::is_compressed(&packed.bytes));
            }
        }
    }
}

// =============================================================================
// Key Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: logical_key(full_key(k)) = k.
    #[test]
    fn prop_namespace_inverse(prefix in key_strategy(), key in key_strategy()) {
        let ns = KeyNamespace::new(prefix.clone());
        let full = ns.full_key(&key);

        prop_assert!(full.starts_with(&prefix));
        prop_assert_eq!(ns.logical_key(&full), Some(key.as_str()));
    }

    /// Property: list keys ignore the case of the search term.
    #[test]
    fn prop_list_key_case_insensitive(
        term in "[a-zA-Z0-9]{1,16}",
        page in 1u32..100,
        size in 1u32..100,
    ) {
        prop_assert_eq!(
            list_key("users", page, size, Some(&term.to_uppercase())),
            list_key("users", page, size, Some(&term.to_lowercase()))
        );
    }
}

// =============================================================================
// Accounting Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: L1 size stays within its limit after every write.
    #[test]
    fn prop_l1_respects_size_limit(
        writes in prop::collection::vec((0usize..40, 1u64..400), 1..200),
    ) {
        let limit = 1000;
        let cache = L1Cache::with_config(L1Config {
            size_limit: limit,
            compaction_percentage: 0.25,
            expiration_scan_frequency: Duration::from_secs(300),
        });

        for (key, size) in writes {
            cache.set(format!("k{}", key), Arc::new(size), &Expiration::Never, size);
            prop_assert!(cache.size() <= limit);
        }
    }

    /// Property: total size is the sum of the last size written per live key.
    #[test]
    fn prop_metrics_size_accounting(
        ops in prop::collection::vec((0usize..10, 0u64..10_000, any::<bool>()), 1..100),
    ) {
        let metrics = CacheMetrics::new();
        let mut expected: HashMap<String, u64> = HashMap::new();

        for (key, size, remove) in ops {
            let key = format!("k{}", key);
            if remove {
                metrics.record_remove(&key);
                expected.remove(&key);
            } else {
                metrics.record_set(&key, size);
                expected.insert(key, size);
            }
        }

        let stats = metrics.snapshot();
        prop_assert_eq!(stats.total_size_bytes, expected.values().sum::<u64>() as i64);
    }
}
