// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Witness Admission Cache (component F, §4.4): bounds the per-block
//! witness bytes this node accepts and derives a deterministic
//! `delta_root` for downstream binding. Grounded on the teacher's use of
//! the `lru` crate for bounded, `O(1)`-eviction caches; the dual
//! (entries, bytes) bound is enforced by hand since `lru::LruCache` only
//! natively bounds entry count.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use consensus_config::{Parameters, WitnessMode};
use consensus_types::{BlockId, ConsensusError, ConsensusResult};
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest as _, Sha256};

use crate::constants::{WITNESS_MAX_SPLIT_SOURCE_BYTES, WITNESS_NODE_SPLIT_BYTES};
use crate::metrics::Metrics;

/// `(stem, index)` key for one synthetic node entry carved out of a
/// block's witness payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub stem: [u8; 32],
    pub index: u16,
}

pub struct WitnessCache {
    entries: Mutex<LruCache<NodeKey, Vec<u8>>>,
    total_bytes: Mutex<usize>,
    budget_bytes: usize,
    committed_roots: Mutex<HashMap<BlockId, [u8; 32]>>,
    metrics: Arc<Metrics>,
}

impl WitnessCache {
    pub fn new(params: &Parameters, metrics: Arc<Metrics>) -> Self {
        let capacity = NonZeroUsize::new(params.witness_node_entries.max(1)).unwrap();
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            total_bytes: Mutex::new(0),
            budget_bytes: params.witness_node_budget_bytes,
            committed_roots: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    fn admitted(mode: WitnessMode, len: usize, parent_root: Option<[u8; 32]>, params: &Parameters) -> ConsensusResult<()> {
        if len == 0 {
            return Err(ConsensusError::WitnessTooLarge(len));
        }
        match mode {
            WitnessMode::Soft => Ok(()),
            WitnessMode::RequireFull => {
                if len <= params.witness_max_bytes {
                    Ok(())
                } else {
                    Err(ConsensusError::WitnessTooLarge(len))
                }
            }
            WitnessMode::DeltaOnly => {
                if parent_root.is_none() {
                    Err(ConsensusError::WitnessDeltaMissingParent)
                } else if len <= params.witness_max_delta {
                    Ok(())
                } else {
                    Err(ConsensusError::WitnessTooLarge(len))
                }
            }
        }
    }

    /// Admits `witness_bytes` for `block_id` under `mode`, deriving and
    /// returning its `delta_root`. Splits the payload into bounded node
    /// entries and evicts least-recently-used entries until both the
    /// entry-count and byte-budget bounds hold.
    pub fn put(
        &self,
        block_id: BlockId,
        parent_committed_root: Option<[u8; 32]>,
        witness_bytes: &[u8],
        mode: WitnessMode,
        params: &Parameters,
    ) -> ConsensusResult<[u8; 32]> {
        Self::admitted(mode, witness_bytes.len(), parent_committed_root, params)?;

        let mut hasher = Sha256::new();
        hasher.update(parent_committed_root.unwrap_or([0u8; 32]));
        hasher.update(witness_bytes);
        let delta_root: [u8; 32] = hasher.finalize().into();

        let splittable = &witness_bytes[..witness_bytes.len().min(WITNESS_MAX_SPLIT_SOURCE_BYTES)];
        let stem = *block_id.as_bytes();
        for (index, chunk) in splittable.chunks(WITNESS_NODE_SPLIT_BYTES).enumerate() {
            let key = NodeKey {
                stem,
                index: index as u16,
            };
            self.insert_bounded(key, chunk.to_vec());
        }

        self.committed_roots.lock().entry(block_id).or_insert(delta_root);
        self.metrics.witness_cache_entries.set(self.entries.lock().len() as i64);
        self.metrics.witness_cache_bytes.set(*self.total_bytes.lock() as i64);
        Ok(delta_root)
    }

    fn insert_bounded(&self, key: NodeKey, value: Vec<u8>) {
        let value_len = value.len();
        let mut entries = self.entries.lock();
        let mut total_bytes = self.total_bytes.lock();

        if let Some(old) = entries.put(key, value) {
            *total_bytes = total_bytes.saturating_sub(old.len());
        }
        *total_bytes += value_len;

        while *total_bytes > self.budget_bytes {
            match entries.pop_lru() {
                Some((_, evicted)) => *total_bytes = total_bytes.saturating_sub(evicted.len()),
                None => break,
            }
        }
    }

    pub fn get(&self, stem: [u8; 32], index: u16) -> Option<Vec<u8>> {
        self.entries.lock().get(&NodeKey { stem, index }).cloned()
    }

    pub fn committed_root(&self, block_id: BlockId) -> Option<[u8; 32]> {
        self.committed_roots.lock().get(&block_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> Arc<Metrics> {
        Metrics::new_for_test()
    }

    #[test]
    fn require_full_rejects_oversized_payload() {
        let mut params = Parameters::local();
        params.witness_mode = WitnessMode::RequireFull;
        params.witness_max_bytes = 10;
        let cache = WitnessCache::new(&params, metrics());
        let block = BlockId::from_bytes([1; 32]);
        let err = cache
            .put(block, None, &[0u8; 20], WitnessMode::RequireFull, &params)
            .unwrap_err();
        assert_eq!(err, ConsensusError::WitnessTooLarge(20));
    }

    #[test]
    fn delta_only_requires_parent_root() {
        let params = Parameters::local();
        let cache = WitnessCache::new(&params, metrics());
        let block = BlockId::from_bytes([2; 32]);
        let err = cache
            .put(block, None, &[1u8; 8], WitnessMode::DeltaOnly, &params)
            .unwrap_err();
        assert_eq!(err, ConsensusError::WitnessDeltaMissingParent);

        let ok = cache.put(block, Some([9u8; 32]), &[1u8; 8], WitnessMode::DeltaOnly, &params);
        assert!(ok.is_ok());
    }

    #[test]
    fn get_after_put_returns_same_bytes() {
        let params = Parameters::local();
        let cache = WitnessCache::new(&params, metrics());
        let block = BlockId::from_bytes([3; 32]);
        cache
            .put(block, None, &[7u8; 100], WitnessMode::Soft, &params)
            .unwrap();
        assert_eq!(cache.get(*block.as_bytes(), 0), Some(vec![7u8; 100]));
    }

    #[test]
    fn committed_root_is_write_once() {
        let params = Parameters::local();
        let cache = WitnessCache::new(&params, metrics());
        let block = BlockId::from_bytes([4; 32]);
        let r1 = cache.put(block, None, &[1u8; 4], WitnessMode::Soft, &params).unwrap();
        let r2 = cache.put(block, None, &[2u8; 4], WitnessMode::Soft, &params).unwrap();
        // delta_root returned each time reflects this call's hash, but the
        // stored committed_root is pinned to the first write.
        assert_ne!(r1, r2);
        assert_eq!(cache.committed_root(block), Some(r1));
    }

    #[test]
    fn eviction_respects_byte_budget() {
        let mut params = Parameters::local();
        params.witness_node_entries = 1000;
        params.witness_node_budget_bytes = 4 * 1024;
        let cache = WitnessCache::new(&params, metrics());

        for i in 0..10u8 {
            let block = BlockId::from_bytes([i; 32]);
            cache
                .put(block, None, &[i; 2048], WitnessMode::Soft, &params)
                .unwrap();
        }
        assert!(*cache.total_bytes.lock() <= params.witness_node_budget_bytes);
    }
}
