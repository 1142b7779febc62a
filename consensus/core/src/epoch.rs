// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Epoch / Checkpoint Manager (component J, §4.8): maintains the sequence
//! of `EventHorizon` checkpoints and is the sole public entry point for
//! advancing them (the "simple Horizon API" decision recorded in
//! DESIGN.md; see that file for the full rationale).

use std::sync::Arc;
use std::time::{Duration, Instant};

use consensus_config::{ClassicalSignature, NodeId};
use consensus_types::{Height, VertexId};
use parking_lot::Mutex;
use tracing::info;

use crate::dag::DagStore;
use crate::metrics::Metrics;

/// A published checkpoint (§4.8). `signature` is the classical certificate
/// that demonstrated the signing quorum backing this checkpoint (§4.3):
/// the horizon never advances to a candidate without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHorizon {
    pub checkpoint: VertexId,
    pub height: Height,
    pub validators: Vec<NodeId>,
    pub signature: ClassicalSignature,
}

pub struct EpochManager {
    metrics: Arc<Metrics>,
    horizon_interval: Duration,
    log: Mutex<Vec<EventHorizon>>,
    last_tick: Mutex<Instant>,
}

impl EpochManager {
    pub fn new(horizon_interval: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            horizon_interval,
            log: Mutex::new(Vec::new()),
            last_tick: Mutex::new(Instant::now()),
        }
    }

    pub fn latest(&self) -> Option<EventHorizon> {
        self.log.lock().last().cloned()
    }

    fn latest_height(&self) -> Height {
        self.log.lock().last().map(|h| h.height).unwrap_or(0)
    }

    /// Invoked periodically (trigger a) or immediately after an
    /// `epoch_bit = true` vertex is accepted (trigger b). Advances the
    /// horizon to the highest round reachable from the latest checkpoint
    /// across `frontier`, provided it is strictly non-regressing AND
    /// `signing_quorum` can produce a classical certificate for the chosen
    /// candidate (§4.3: advancement requires a signing quorum, not merely a
    /// sufficiently-high frontier vertex). `now` is caller-supplied so the
    /// interval check is deterministic in tests.
    pub fn maybe_advance(
        &self,
        store: &DagStore,
        frontier: &[VertexId],
        validators: Vec<NodeId>,
        now: Instant,
        epoch_bit_triggered: bool,
        signing_quorum: impl Fn(VertexId) -> Option<ClassicalSignature>,
    ) -> Option<EventHorizon> {
        let interval_elapsed = {
            let last_tick = self.last_tick.lock();
            now.duration_since(*last_tick) >= self.horizon_interval
        };
        if !interval_elapsed && !epoch_bit_triggered {
            return None;
        }
        *self.last_tick.lock() = now;

        let (checkpoint, height, signature) =
            event_horizon(store, self.log.lock().last(), frontier, signing_quorum)?;

        let horizon = EventHorizon {
            checkpoint,
            height,
            validators,
            signature,
        };
        self.log.lock().push(horizon.clone());
        self.metrics.event_horizon_height.set(height as i64);
        info!(?checkpoint, height, "event horizon advanced");
        Some(horizon)
    }
}

/// Pure advancement function mirroring §4.3's `event_horizon(checkpoints)`
/// predicate: given the log so far and a candidate frontier, returns the
/// new checkpoint without mutating any state. `EpochManager::maybe_advance`
/// is the stateful driver built on top of it.
///
/// `signing_quorum(id)` models "does `id` have a signing quorum backing
/// it" (§4.3/§4.8): a candidate only advances the horizon when this
/// returns `Some`. This crate's modeling choice (see DESIGN.md) is that a
/// vertex satisfies the signing quorum exactly when its classical
/// aggregate certificate has already assembled, since assembling that
/// certificate itself required `cert_threshold` authority signatures.
pub fn event_horizon(
    store: &DagStore,
    previous: Option<&EventHorizon>,
    frontier: &[VertexId],
    signing_quorum: impl Fn(VertexId) -> Option<ClassicalSignature>,
) -> Option<(VertexId, Height, ClassicalSignature)> {
    let floor = previous.map(|h| h.height).unwrap_or(0);
    frontier
        .iter()
        .filter_map(|&id| {
            let height = store.get(id)?.height();
            let signature = signing_quorum(id)?;
            Some((id, height, signature))
        })
        .filter(|(_, height, _)| *height > floor)
        .max_by_key(|(_, height, _)| *height)
}
