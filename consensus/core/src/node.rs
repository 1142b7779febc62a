// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Top-level authority wiring, adapted from the teacher's
//! `authority_node.rs`: a single `start`-style constructor assembles every
//! component against a shared `Context`, then spawns the background tasks
//! that drive poll ticks and event-horizon advancement.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tokio::time::interval;
use tracing::info;

use crate::aggregator::VoteAggregator;
use crate::context::Context;
use crate::dag::DagStore;
use crate::epoch::EpochManager;
use crate::finalization::FinalizationEngine;
use crate::sampling::QueryClient;
use crate::signing::{ClassicalAggregator, PqThresholdScheme};
use crate::slashing::SlashingReporter;
use crate::witness::WitnessCache;

/// A running authority: the finalization engine plus the background tasks
/// that keep polling and epoch-advancing it.
pub struct AuthorityNode<C> {
    pub context: Arc<Context>,
    pub store: Arc<DagStore>,
    pub finalization: Arc<FinalizationEngine<C>>,
    pub witness_cache: Arc<WitnessCache>,
    pub epoch: Arc<EpochManager>,
    start_time: Instant,
    tasks: JoinSet<()>,
}

impl<C: QueryClient + 'static> AuthorityNode<C> {
    pub fn start(
        context: Arc<Context>,
        query_client: Arc<C>,
        classical_aggregator: Arc<dyn ClassicalAggregator>,
        pq_scheme: Arc<dyn PqThresholdScheme>,
    ) -> Self {
        info!(own_id = ?context.own_id, "starting authority");
        let store = Arc::new(DagStore::new());
        let slashing = Arc::new(SlashingReporter::new(context.metrics.clone()));
        let aggregator = Arc::new(VoteAggregator::new(
            context.clone(),
            classical_aggregator,
            pq_scheme,
            slashing.clone(),
        ));
        let witness_cache = Arc::new(WitnessCache::new(&context.parameters, context.metrics.clone()));
        let epoch = Arc::new(EpochManager::new(context.parameters.horizon_interval, context.metrics.clone()));
        let finalization = Arc::new(FinalizationEngine::new(
            context.clone(),
            store.clone(),
            query_client,
            aggregator,
            slashing,
        ));

        let mut tasks = JoinSet::new();
        tasks.spawn(Self::poll_loop(context.clone(), finalization.clone()));
        tasks.spawn(Self::epoch_loop(context.clone(), store.clone(), epoch.clone(), finalization.clone()));

        Self {
            context,
            store,
            finalization,
            witness_cache,
            epoch,
            start_time: Instant::now(),
            tasks,
        }
    }

    async fn poll_loop(context: Arc<Context>, finalization: Arc<FinalizationEngine<C>>) {
        let mut ticker = interval(context.parameters.min_round_interval);
        let mut stop = context.stop.waiter();
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    info!("poll loop stopping on signal");
                    return;
                }
                _ = ticker.tick() => {}
            }
            let now = Instant::now();
            for id in finalization.processing_ids() {
                if let Err(e) = finalization.poll_tick(id, now).await {
                    tracing::trace!(?id, error = ?e, "poll tick failed");
                }
            }
            // Proactive deadline check (§8 scenario 3): a stalled PQ leg
            // that never receives another share must still be reported,
            // not just ones that happen to get a fresh share past deadline.
            if let Err(e) = finalization.sweep_quasar_timeouts(now) {
                tracing::trace!(error = ?e, "quasar timeout sweep failed");
            }
        }
    }

    async fn epoch_loop(
        context: Arc<Context>,
        store: Arc<DagStore>,
        epoch: Arc<EpochManager>,
        finalization: Arc<FinalizationEngine<C>>,
    ) {
        let validators: Vec<_> = context
            .committee
            .authorities()
            .map(|(_, a)| a.node_id)
            .collect();
        let mut ticker = interval(context.parameters.horizon_interval);
        let mut stop = context.stop.waiter();
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    info!("epoch loop stopping on signal");
                    return;
                }
                _ = ticker.tick() => {}
            }
            let frontier = store.head();
            epoch.maybe_advance(&store, &frontier, validators.clone(), Instant::now(), false, |id| {
                finalization.classical_signature(id)
            });
        }
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Signals the background tasks to stop gracefully (§5, §9: the single
    /// stop signal every cancellable wait observes), then aborts whatever
    /// hasn't exited yet as a backstop. Intentionally does not wait for the
    /// abort to take effect, mirroring the teacher's `Broadcaster::stop`.
    pub fn stop(&mut self) {
        self.context.stop.stop();
        self.tasks.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::test_utils::{NoopClassicalAggregator, NoopPqScheme};
    use async_trait::async_trait;
    use consensus_config::NodeId;
    use consensus_types::{ConsensusResult, VertexId};

    struct EchoClient;

    #[async_trait]
    impl QueryClient for EchoClient {
        async fn query_preference(&self, _peer: NodeId, subject: VertexId) -> ConsensusResult<VertexId> {
            Ok(subject)
        }
    }

    #[tokio::test]
    async fn starts_and_stops_cleanly() {
        let context = Arc::new(Context::new_for_test(4));
        let mut node = AuthorityNode::start(
            context,
            Arc::new(EchoClient),
            Arc::new(NoopClassicalAggregator),
            Arc::new(NoopPqScheme),
        );
        assert!(node.uptime() < std::time::Duration::from_secs(5));
        node.stop();
    }
}
