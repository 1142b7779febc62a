// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Admission policy for the Witness Admission Cache (component F).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WitnessMode {
    /// Accept any size; execution can be deferred.
    Soft,
    /// Accept iff `0 < witness_bytes <= witness_max_bytes`.
    RequireFull,
    /// Accept iff `0 < witness_bytes <= witness_max_delta` and the parent's
    /// committed root is known.
    DeltaOnly,
}

/// Operational configuration of a consensus authority (§6, "Configuration
/// contract"). All fields tolerate inconsistency across authorities without
/// affecting protocol safety, mirroring the teacher's `Parameters` doc
/// comment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Parameters {
    /// Sample size `k` for each poll round.
    #[serde(default = "Parameters::default_k")]
    pub k: usize,
    /// Majority threshold `alpha_pref` for switching preference.
    #[serde(default = "Parameters::default_alpha_preference")]
    pub alpha_preference: usize,
    /// Stricter threshold `alpha_conf` for incrementing confidence.
    #[serde(default = "Parameters::default_alpha_confidence")]
    pub alpha_confidence: usize,
    /// Consecutive successful polls `beta` required for finality.
    #[serde(default = "Parameters::default_beta")]
    pub beta: u32,
    /// Maximum number of vertices proposed per batch.
    #[serde(default = "Parameters::default_batch_size")]
    pub batch_size: usize,
    /// Lower bound between successive poll rounds on one node.
    #[serde(default = "Parameters::default_min_round_interval")]
    pub min_round_interval: Duration,
    /// Per-vertex wall-clock budget from `add` to terminal status.
    #[serde(default = "Parameters::default_max_item_processing_time")]
    pub max_item_processing_time: Duration,
    /// PQ aggregation deadline; must be `<= max_item_processing_time`.
    #[serde(default = "Parameters::default_quasar_timeout")]
    pub quasar_timeout: Duration,
    /// Number of PQ shares required to form a certificate (`2f+1`) if it
    /// diverges from the committee's own `cert_threshold()`.
    #[serde(default)]
    pub quasar_threshold: Option<usize>,
    /// Interval at which the event horizon is advanced absent an epoch-bit block.
    #[serde(default = "Parameters::default_horizon_interval")]
    pub horizon_interval: Duration,
    /// Witness admission policy.
    #[serde(default = "Parameters::default_witness_mode")]
    pub witness_mode: WitnessMode,
    /// Max bytes for `RequireFull` admission.
    #[serde(default = "Parameters::default_witness_max_bytes")]
    pub witness_max_bytes: usize,
    /// Max bytes for `DeltaOnly` admission.
    #[serde(default = "Parameters::default_witness_max_delta")]
    pub witness_max_delta: usize,
    /// Maximum LRU entries held by the witness cache.
    #[serde(default = "Parameters::default_witness_node_entries")]
    pub witness_node_entries: usize,
    /// Maximum total bytes held by the witness cache.
    #[serde(default = "Parameters::default_witness_node_budget_bytes")]
    pub witness_node_budget_bytes: usize,
}

impl Parameters {
    pub fn default_k() -> usize {
        20
    }
    pub fn default_alpha_preference() -> usize {
        13
    }
    pub fn default_alpha_confidence() -> usize {
        18
    }
    pub fn default_beta() -> u32 {
        8
    }
    pub fn default_batch_size() -> usize {
        256
    }
    pub fn default_min_round_interval() -> Duration {
        Duration::from_millis(100)
    }
    pub fn default_max_item_processing_time() -> Duration {
        Duration::from_secs(30)
    }
    pub fn default_quasar_timeout() -> Duration {
        Duration::from_secs(2)
    }
    pub fn default_horizon_interval() -> Duration {
        Duration::from_secs(60)
    }
    pub fn default_witness_mode() -> WitnessMode {
        WitnessMode::Soft
    }
    pub fn default_witness_max_bytes() -> usize {
        64 * 1024
    }
    pub fn default_witness_max_delta() -> usize {
        16 * 1024
    }
    pub fn default_witness_node_entries() -> usize {
        4096
    }
    pub fn default_witness_node_budget_bytes() -> usize {
        32 * 1024 * 1024
    }

    /// `Local` preset: small committee, short intervals, fast iteration.
    pub fn local() -> Self {
        Self {
            k: 4,
            alpha_preference: 3,
            alpha_confidence: 3,
            beta: 4,
            batch_size: 16,
            min_round_interval: Duration::from_millis(10),
            max_item_processing_time: Duration::from_secs(5),
            quasar_timeout: Duration::from_millis(500),
            quasar_threshold: None,
            horizon_interval: Duration::from_secs(5),
            witness_mode: WitnessMode::Soft,
            witness_max_bytes: 8 * 1024,
            witness_max_delta: 4 * 1024,
            witness_node_entries: 256,
            witness_node_budget_bytes: 1024 * 1024,
        }
    }

    /// `Testnet` preset: mid-sized committee, relaxed deadlines.
    pub fn testnet() -> Self {
        Self {
            k: 20,
            alpha_preference: 13,
            alpha_confidence: 15,
            beta: 8,
            batch_size: 128,
            min_round_interval: Duration::from_millis(50),
            max_item_processing_time: Duration::from_secs(10),
            quasar_timeout: Duration::from_secs(1),
            quasar_threshold: None,
            horizon_interval: Duration::from_secs(30),
            witness_mode: WitnessMode::RequireFull,
            witness_max_bytes: 64 * 1024,
            witness_max_delta: 16 * 1024,
            witness_node_entries: 4096,
            witness_node_budget_bytes: 32 * 1024 * 1024,
        }
    }

    /// `Mainnet` preset: production committee sizes, conservative deadlines.
    pub fn mainnet() -> Self {
        Self {
            k: 20,
            alpha_preference: 13,
            alpha_confidence: 18,
            beta: 8,
            batch_size: 256,
            min_round_interval: Duration::from_millis(100),
            max_item_processing_time: Duration::from_secs(30),
            quasar_timeout: Duration::from_secs(2),
            quasar_threshold: None,
            horizon_interval: Duration::from_secs(60),
            witness_mode: WitnessMode::RequireFull,
            witness_max_bytes: 64 * 1024,
            witness_max_delta: 16 * 1024,
            witness_node_entries: 4096,
            witness_node_budget_bytes: 32 * 1024 * 1024,
        }
    }

    /// Validates the `k/2 < alpha_pref <= alpha_conf <= k` and `beta >= 1`
    /// constraints from §4.1. Returns an error message rather than
    /// panicking; construction-time validation is the caller's
    /// responsibility (§7 kind 4: an invalid parameter set is a
    /// process-invariant precondition, not a recoverable protocol error).
    pub fn validate(&self) -> Result<(), String> {
        if !(self.k / 2 < self.alpha_preference) {
            return Err(format!(
                "alpha_preference ({}) must exceed k/2 ({})",
                self.alpha_preference,
                self.k / 2
            ));
        }
        if !(self.alpha_preference <= self.alpha_confidence) {
            return Err(format!(
                "alpha_preference ({}) must be <= alpha_confidence ({})",
                self.alpha_preference, self.alpha_confidence
            ));
        }
        if !(self.alpha_confidence <= self.k) {
            return Err(format!(
                "alpha_confidence ({}) must be <= k ({})",
                self.alpha_confidence, self.k
            ));
        }
        if self.beta < 1 {
            return Err("beta must be >= 1".to_string());
        }
        if self.quasar_timeout > self.max_item_processing_time {
            return Err("quasar_timeout must be <= max_item_processing_time".to_string());
        }
        Ok(())
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::mainnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        Parameters::local().validate().unwrap();
        Parameters::testnet().validate().unwrap();
        Parameters::mainnet().validate().unwrap();
    }

    #[test]
    fn rejects_bad_thresholds() {
        let mut p = Parameters::mainnet();
        p.alpha_confidence = p.k + 1;
        assert!(p.validate().is_err());

        let mut p = Parameters::mainnet();
        p.alpha_preference = p.k / 2;
        assert!(p.validate().is_err());

        let mut p = Parameters::mainnet();
        p.beta = 0;
        assert!(p.validate().is_err());
    }
}
