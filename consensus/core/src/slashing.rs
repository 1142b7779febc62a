// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Slashing Reporter (component I, §4.7): appends structured evidence
//! records for downstream consumers. The core itself never acts on
//! evidence (no stake is burned here); it only maintains the log, the way
//! the teacher's metrics are observed rather than acted upon in-process.

use std::sync::Arc;

use consensus_config::{NodeId, PqShare};
use consensus_types::Height;
use parking_lot::Mutex;
use tracing::warn;

use crate::metrics::Metrics;

/// One piece of slashable evidence (§4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    /// The PQ certificate did not assemble within `quasar_timeout`.
    QuasarTimeout { height: Height, proposer: NodeId },
    /// A share verified against the author's PQ pubkey but failed the
    /// aggregate verification post-hoc.
    InvalidPqShare {
        author: NodeId,
        height: Height,
        share_bytes: PqShare,
    },
}

impl Evidence {
    fn kind(&self) -> &'static str {
        match self {
            Evidence::QuasarTimeout { .. } => "quasar_timeout",
            Evidence::InvalidPqShare { .. } => "invalid_pq_share",
        }
    }
}

/// Append-only evidence log. Not durable across restarts in this crate;
/// §6 leaves evidence-log persistence to the embedding system.
pub struct SlashingReporter {
    log: Mutex<Vec<Evidence>>,
    metrics: Arc<Metrics>,
}

impl SlashingReporter {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            metrics,
        }
    }

    pub fn report(&self, evidence: Evidence) {
        warn!(kind = evidence.kind(), "slashing evidence recorded");
        self.metrics
            .slashing_evidence_total
            .with_label_values(&[evidence.kind()])
            .inc();
        self.log.lock().push(evidence);
    }

    pub fn evidence(&self) -> Vec<Evidence> {
        self.log.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
