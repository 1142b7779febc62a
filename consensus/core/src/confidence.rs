// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Metastable sampling confidence counters (component B, §4.1). Tracks a
//! single binary or k-ary choice's running preference and confidence as
//! poll responses arrive, in the style of Avalanche's Snowball/Slush
//! counters, grounded the way the teacher tracks stake against a threshold
//! in `base_committer.rs` (here against `alpha_preference`/`alpha_confidence`
//! sample counts rather than committee weight).

use std::collections::HashMap;

use consensus_config::Parameters;
use consensus_types::VertexId;

/// Outcome of folding one poll round's tally into a confidence record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// No choice in the tally reached `alpha_preference`; nothing changed.
    NoQuorum,
    /// The existing preference was reinforced; confidence incremented.
    Reinforced,
    /// The preference flipped to a new choice; confidence reset to 1.
    Flipped,
    /// `beta` consecutive confident rounds reached; the choice is now final.
    Finalized,
}

/// A single metastable confidence counter over a k-ary choice set (§4.1).
/// A binary choice is the special case `k = 2`.
pub struct ConfidenceCounter {
    preference: Option<VertexId>,
    /// Consecutive rounds preference held with tally >= alpha_confidence.
    consecutive_confident: u32,
    finalized: bool,
}

impl ConfidenceCounter {
    pub fn new() -> Self {
        Self {
            preference: None,
            consecutive_confident: 0,
            finalized: false,
        }
    }

    pub fn preference(&self) -> Option<VertexId> {
        self.preference
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn consecutive_confident(&self) -> u32 {
        self.consecutive_confident
    }

    /// Folds one poll round's tally (choice -> vote count out of `k`) into
    /// this counter. `tally` need not sum to `k` (some peers may not
    /// respond); only counts that meet `alpha_preference` are eligible to
    /// become or remain the preference.
    pub fn fold(&mut self, tally: &HashMap<VertexId, usize>, params: &Parameters) -> FoldOutcome {
        if self.finalized {
            return FoldOutcome::Finalized;
        }

        let max_count = tally
            .iter()
            .filter(|(_, count)| **count >= params.alpha_preference)
            .map(|(_, count)| *count)
            .max();

        let Some(max_count) = max_count else {
            self.consecutive_confident = 0;
            return FoldOutcome::NoQuorum;
        };

        let mut leaders: Vec<VertexId> = tally
            .iter()
            .filter(|(_, count)| **count == max_count)
            .map(|(id, _)| *id)
            .collect();
        leaders.sort();

        // §4.1 Edge cases: "on ties the existing preference is retained";
        // only fall back to the lowest id when the current preference
        // isn't among this round's tied leaders (or there is none yet).
        let choice = match self.preference {
            Some(current) if leaders.contains(&current) => current,
            _ => leaders[0],
        };

        let confident = max_count >= params.alpha_confidence;
        let outcome = match self.preference {
            Some(current) if current == choice => {
                if confident {
                    self.consecutive_confident += 1;
                } else {
                    self.consecutive_confident = 0;
                }
                FoldOutcome::Reinforced
            }
            _ => {
                self.preference = Some(choice);
                self.consecutive_confident = if confident { 1 } else { 0 };
                FoldOutcome::Flipped
            }
        };

        if self.consecutive_confident >= params.beta {
            self.finalized = true;
            return FoldOutcome::Finalized;
        }
        outcome
    }
}

impl Default for ConfidenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
