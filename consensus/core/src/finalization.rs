// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Finalization Engine (component H, §4.6): the top-level state machine
//! driving each vertex from `Processing` to a terminal status. Wires
//! together the DAG store (D), the DAG predicates (E), the Sampling
//! Engine (C, via its confidence counters B), the Vote Aggregator (G) and
//! the Slashing Reporter (I), the way the teacher's `core.rs` wires
//! `DagState`, `BlockManager`, `Broadcaster` and `CommitObserver` into one
//! driving loop.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use consensus_types::{ConsensusError, ConsensusResult, VertexId};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::aggregator::{CertificateBundle, VoteAggregator};
use crate::confidence::FoldOutcome;
use crate::context::Context;
use crate::dag::{self, Classification, DagStore};
use crate::payload::{AcceptAllPayloadValidator, PayloadValidator};
use crate::sampling::{PollOutcome, QueryClient, SamplingEngine};
use crate::slashing::{Evidence, SlashingReporter};
use crate::vertex::{Status, Vertex};

/// Poll interval for `await_terminal_status`'s cancellable wait loop.
const FINALIZATION_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct FinalizationEngine<C> {
    context: Arc<Context>,
    store: Arc<DagStore>,
    sampler: Mutex<SamplingEngine<C>>,
    aggregator: Arc<VoteAggregator>,
    slashing: Arc<SlashingReporter>,
    payload_validator: Arc<dyn PayloadValidator<Error = eyre::Report>>,
    statuses: Mutex<HashMap<VertexId, Status>>,
    added_at: Mutex<HashMap<VertexId, Instant>>,
    certs: Mutex<HashMap<VertexId, CertificateBundle>>,
}

impl<C: QueryClient> FinalizationEngine<C> {
    pub fn new(
        context: Arc<Context>,
        store: Arc<DagStore>,
        query_client: Arc<C>,
        aggregator: Arc<VoteAggregator>,
        slashing: Arc<SlashingReporter>,
    ) -> Self {
        Self::with_payload_validator(
            context,
            store,
            query_client,
            aggregator,
            slashing,
            Arc::new(AcceptAllPayloadValidator),
        )
    }

    pub fn with_payload_validator(
        context: Arc<Context>,
        store: Arc<DagStore>,
        query_client: Arc<C>,
        aggregator: Arc<VoteAggregator>,
        slashing: Arc<SlashingReporter>,
        payload_validator: Arc<dyn PayloadValidator<Error = eyre::Report>>,
    ) -> Self {
        let sampler = SamplingEngine::new(context.clone(), query_client);
        Self {
            context,
            store,
            sampler: Mutex::new(sampler),
            aggregator,
            slashing,
            payload_validator,
            statuses: Mutex::new(HashMap::new()),
            added_at: Mutex::new(HashMap::new()),
            certs: Mutex::new(HashMap::new()),
        }
    }

    pub fn status(&self, id: VertexId) -> Option<Status> {
        self.statuses.lock().get(&id).copied()
    }

    pub fn certs(&self, id: VertexId) -> Option<CertificateBundle> {
        self.certs.lock().get(&id).cloned()
    }

    /// Vertices still in `Processing`, i.e. eligible for the next poll tick.
    pub fn processing_ids(&self) -> Vec<VertexId> {
        self.statuses
            .lock()
            .iter()
            .filter(|(_, status)| **status == Status::Processing)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Transition 1 (§4.6): validates `vertex`'s opaque payload, then
    /// inserts it into the DAG store and begins tracking its status,
    /// starting the PQ deadline for its certificate assembly so later
    /// `add_pq_share` calls can detect a quasar timeout.
    pub async fn add(&self, vertex: Vertex, now: Instant) -> ConsensusResult<VertexId> {
        if let Err(e) = self.payload_validator.validate(&vertex).await {
            tracing::warn!(error = %e, "payload rejected at admission");
            return Err(ConsensusError::InvalidPayload);
        }

        let id = vertex.id();
        match self.store.insert(vertex) {
            dag::InsertOutcome::MissingParent(missing) => Err(ConsensusError::MissingParent(missing)),
            dag::InsertOutcome::Inserted(admitted) => {
                for vid in admitted {
                    self.statuses.lock().entry(vid).or_insert(Status::Processing);
                    self.added_at.lock().entry(vid).or_insert(now);
                    self.aggregator.start_pq_deadline(vid, now);
                }
                Ok(id)
            }
        }
    }

    fn is_expired(&self, id: VertexId, now: Instant) -> bool {
        self.added_at
            .lock()
            .get(&id)
            .map(|&started| now.duration_since(started) > self.context.parameters.max_item_processing_time)
            .unwrap_or(false)
    }

    /// Transition 2 + 3 (§4.6): runs one poll round for `subject`, and if
    /// its confidence counter just finalized, evaluates the DAG
    /// classification and drives the vertex to a terminal status.
    ///
    /// A `ConfidenceCounter` is keyed by `subject`, the poll target, but its
    /// `preference` is the argmax of peers' answers and can resolve to a
    /// conflicting sibling instead (§4.1, §4.6 transition 2: "schedule its
    /// vertex for commit" refers to the record's preference, not the poll
    /// key). When that happens `subject` has lost the choice group and is
    /// rejected; the winning sibling is scheduled for commit instead.
    pub async fn poll_tick(&self, subject: VertexId, now: Instant) -> ConsensusResult<()> {
        if self.status(subject) != Some(Status::Processing) {
            return Ok(());
        }
        if self.is_expired(subject, now) {
            self.finish(subject, Status::Rejected);
            return Ok(());
        }

        let outcome = self.sampler.lock().poll_round(subject).await;
        if outcome != PollOutcome::Folded(FoldOutcome::Finalized) {
            return Ok(());
        }

        let preference = self.sampler.lock().counter(subject).and_then(|c| c.preference());
        let Some(winner) = preference else {
            return Ok(());
        };

        if winner != subject {
            debug!(?subject, ?winner, "choice group finalized on a different vertex; rejecting this one");
            self.finish(subject, Status::Rejected);
        }
        self.schedule_commit(winner, now)
    }

    /// Calls `on_commit_schedule` for `winner`, swallowing
    /// `UnknownVertex`: `winner` may be a sibling this authority hasn't
    /// synced yet, in which case it is scheduled once it is admitted and
    /// its own poll tick runs.
    fn schedule_commit(&self, winner: VertexId, now: Instant) -> ConsensusResult<()> {
        if matches!(self.status(winner), Some(Status::Accepted) | Some(Status::Rejected)) {
            return Ok(());
        }
        match self.on_commit_schedule(winner, now) {
            Ok(()) => Ok(()),
            Err(ConsensusError::UnknownVertex(_)) => Ok(()),
            Err(other) => Err(other),
        }
    }

    fn on_commit_schedule(&self, subject: VertexId, now: Instant) -> ConsensusResult<()> {
        let vertex = self
            .store
            .get(subject)
            .ok_or(ConsensusError::UnknownVertex(subject))?;

        match dag::classify(&self.store, &self.context.committee, subject, vertex.round()) {
            Classification::Skip => {
                debug!(?subject, "classified Skip -> Rejected");
                self.context.metrics.dag_skips_total.inc();
                self.finish(subject, Status::Rejected);
            }
            Classification::Commit => {
                self.context.metrics.dag_commits_total.inc();
                if let Some(bundle) = self.aggregator.try_assemble(subject, subject.as_bytes()) {
                    self.certs.lock().insert(subject, bundle);
                    self.finish(subject, Status::Accepted);
                } else if self.aggregator.pq_timed_out(subject) {
                    self.handle_quasar_timeout(subject, &vertex);
                }
                // otherwise: certificates still assembling, re-evaluate on next tick.
            }
            Classification::Undecided => {
                // Deferred; re-evaluated on the next poll tick.
            }
        }
        Ok(())
    }

    fn handle_quasar_timeout(&self, id: VertexId, vertex: &Vertex) {
        self.slashing.report(Evidence::QuasarTimeout {
            height: vertex.height(),
            proposer: vertex.author(),
        });
        self.finish(id, Status::Rejected);
    }

    /// Proactively reports every vertex whose PQ deadline has elapsed
    /// without a further share ever arriving (§8 scenario 3: a stalled
    /// proposer's buffer stuck below threshold otherwise never times out,
    /// since `add_pq_share` only checks the deadline when a new share
    /// shows up). Intended to be driven from the authority's poll loop
    /// independent of `poll_tick`.
    pub fn sweep_quasar_timeouts(&self, now: Instant) -> ConsensusResult<()> {
        for id in self.aggregator.sweep_pq_timeouts(now) {
            if self.status(id) != Some(Status::Processing) {
                continue;
            }
            let vertex = self.store.get(id).ok_or(ConsensusError::UnknownVertex(id))?;
            self.handle_quasar_timeout(id, &vertex);
        }
        Ok(())
    }

    /// The classical half of `id`'s assembled certificate, if any — used by
    /// the epoch manager's signing-quorum check (§4.3) without exposing the
    /// full `CertificateBundle`.
    pub fn classical_signature(&self, id: VertexId) -> Option<consensus_config::ClassicalSignature> {
        self.certs.lock().get(&id).and_then(|b| b.classical_aggregate.clone())
    }

    /// The PQ-wait entry point named by §5: suspends until `id`'s dual
    /// certificate assembles, its PQ deadline elapses, or the authority's
    /// stop signal fires. Delegates to the Vote Aggregator's own
    /// cancellable wait; a cancelled wait surfaces here the same way a
    /// timeout does, as `None`.
    pub async fn await_certificate(&self, id: VertexId) -> Option<CertificateBundle> {
        self.aggregator.wait_for_certificate(id, id.as_bytes()).await
    }

    /// Suspends until `id` reaches a terminal status or the authority's
    /// stop signal fires — whichever comes first (§5: "finalization itself
    /// is cancellable at vertex granularity"; every wait observes the one
    /// stop signal). Returns `None` if cancelled before a terminal status
    /// was reached.
    pub async fn await_terminal_status(&self, id: VertexId) -> Option<Status> {
        let mut stop = self.context.stop.waiter();
        loop {
            if let Some(status) = self.status(id).filter(|s| s.is_terminal()) {
                return Some(status);
            }
            tokio::select! {
                biased;
                _ = stop.cancelled() => return None,
                _ = tokio::time::sleep(FINALIZATION_WAIT_POLL_INTERVAL) => {}
            }
        }
    }

    fn finish(&self, id: VertexId, status: Status) {
        self.statuses.lock().insert(id, status);
        info!(?id, ?status, "vertex reached terminal status");
    }

    /// Ordering guarantee (§4.6): only vertices in `compute_safe_prefix(frontier)`
    /// that have actually reached `Accepted` are eligible for publication.
    pub fn accepted_safe_prefix(&self, frontier: &[VertexId]) -> HashSet<VertexId> {
        let safe = dag::compute_safe_prefix(&self.store, frontier);
        let statuses = self.statuses.lock();
        safe.into_iter()
            .filter(|id| statuses.get(id) == Some(&Status::Accepted))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::test_utils::{NoopClassicalAggregator, NoopPqScheme};
    use async_trait::async_trait;
    use consensus_config::NodeId;

    struct EchoClient;

    #[async_trait]
    impl QueryClient for EchoClient {
        async fn query_preference(
            &self,
            _peer: NodeId,
            subject: VertexId,
        ) -> ConsensusResult<VertexId> {
            Ok(subject)
        }
    }

    fn engine() -> FinalizationEngine<EchoClient> {
        // 5 authorities leaves exactly k=4 non-self peers (§4.2 under-supply fix).
        let context = Arc::new(Context::new_for_test(5));
        let store = Arc::new(DagStore::new());
        let slashing = Arc::new(SlashingReporter::new(context.metrics.clone()));
        let aggregator = Arc::new(VoteAggregator::new(
            context.clone(),
            Arc::new(NoopClassicalAggregator),
            Arc::new(NoopPqScheme),
            slashing.clone(),
        ));
        FinalizationEngine::new(context, store, Arc::new(EchoClient), aggregator, slashing)
    }

    #[tokio::test]
    async fn happy_path_reaches_accepted_once_certs_assemble() {
        let engine = engine();
        let now = Instant::now();
        let root = Vertex::new_for_test(NodeId::new_for_test(0), 0, vec![]);
        let root_id = engine.add(root, now).await.unwrap();

        // 3 supporting children at round 1 gives a certificate (cert_threshold=3 for n=4).
        for i in 0..3u8 {
            let child = Vertex::new_for_test(NodeId::new_for_test(i + 1), 1, vec![root_id]);
            engine.add(child, now).await.unwrap();
        }

        // Parameters::local(): k=4, alpha_preference=3, alpha_confidence=3, beta=4.
        for _ in 0..4 {
            engine.poll_tick(root_id, now).await.unwrap();
        }
        assert_eq!(engine.status(root_id), Some(Status::Processing));

        for i in 0..3u8 {
            engine
                .aggregator
                .add_classical_share(
                    root_id,
                    NodeId::new_for_test(i),
                    consensus_config::ClassicalSignature([0; 96]),
                    root_id.as_bytes(),
                )
                .unwrap();
        }
        for i in 0..3u8 {
            engine
                .aggregator
                .add_pq_share(
                    root_id,
                    NodeId::new_for_test(i),
                    consensus_config::PqShare(vec![0]),
                    0,
                    root_id.as_bytes(),
                    now,
                )
                .unwrap();
        }

        engine.poll_tick(root_id, now).await.unwrap();
        assert_eq!(engine.status(root_id), Some(Status::Accepted));
        assert!(engine.certs(root_id).unwrap().is_complete());
    }

    #[tokio::test]
    async fn skip_decision_rejects_without_waiting_on_certificates() {
        let engine = engine();
        let now = Instant::now();
        let root = Vertex::new_for_test(NodeId::new_for_test(0), 0, vec![]);
        let root_id = engine.add(root, now).await.unwrap();

        // 3 round-1 vertices that do NOT reference root as a parent: a
        // certificate blame quorum (cert_threshold=3 for n=4).
        for i in 0..3u8 {
            let non_supporter = Vertex::new_for_test(NodeId::new_for_test(i + 1), 1, vec![]);
            engine.add(non_supporter, now).await.unwrap();
        }

        for _ in 0..4 {
            engine.poll_tick(root_id, now).await.unwrap();
        }
        assert_eq!(engine.status(root_id), Some(Status::Rejected));
    }

    #[tokio::test]
    async fn expired_vertex_is_rejected() {
        let engine = engine();
        let now = Instant::now();
        let root = Vertex::new_for_test(NodeId::new_for_test(0), 0, vec![]);
        let root_id = engine.add(root, now).await.unwrap();

        let later = now + engine.context.parameters.max_item_processing_time + std::time::Duration::from_secs(1);
        engine.poll_tick(root_id, later).await.unwrap();
        assert_eq!(engine.status(root_id), Some(Status::Rejected));
    }

    /// §8 scenario 3: the proposer never gossips the PQ shares needed to
    /// cross threshold, and no further share ever arrives to trigger the
    /// deadline check inline — only a proactive sweep catches it.
    #[tokio::test]
    async fn stalled_pq_leg_is_caught_by_sweep_without_a_new_share() {
        let engine = engine();
        let now = Instant::now();
        let root = Vertex::new_for_test(NodeId::new_for_test(0), 0, vec![]);
        let root_id = engine.add(root, now).await.unwrap();

        for i in 0..3u8 {
            let child = Vertex::new_for_test(NodeId::new_for_test(i + 1), 1, vec![root_id]);
            engine.add(child, now).await.unwrap();
        }
        for _ in 0..4 {
            engine.poll_tick(root_id, now).await.unwrap();
        }

        for i in 0..3u8 {
            engine
                .aggregator
                .add_classical_share(
                    root_id,
                    NodeId::new_for_test(i),
                    consensus_config::ClassicalSignature([0; 96]),
                    root_id.as_bytes(),
                )
                .unwrap();
        }
        // Only 2 of 3 required PQ shares ever arrive; the buffer is stuck.
        for i in 0..2u8 {
            engine
                .aggregator
                .add_pq_share(
                    root_id,
                    NodeId::new_for_test(i),
                    consensus_config::PqShare(vec![0]),
                    0,
                    root_id.as_bytes(),
                    now,
                )
                .unwrap();
        }

        engine.poll_tick(root_id, now).await.unwrap();
        assert_eq!(engine.status(root_id), Some(Status::Processing));

        let past_deadline = now + engine.context.parameters.quasar_timeout + std::time::Duration::from_millis(1);
        engine.sweep_quasar_timeouts(past_deadline).unwrap();
        assert_eq!(engine.status(root_id), Some(Status::Rejected));
        assert_eq!(engine.slashing.len(), 1);
    }

    /// A peer majority answering a poll on `subject` with a conflicting
    /// sibling's id, rather than `subject` itself, must reject `subject`
    /// and schedule the sibling for commit instead of blindly trusting the
    /// poll key (§4.1, §4.6 transition 2).
    struct SiblingClient {
        winner: VertexId,
    }

    #[async_trait]
    impl QueryClient for SiblingClient {
        async fn query_preference(
            &self,
            _peer: NodeId,
            _subject: VertexId,
        ) -> ConsensusResult<VertexId> {
            Ok(self.winner)
        }
    }

    #[tokio::test]
    async fn finalized_preference_diverging_from_subject_rejects_subject() {
        let context = Arc::new(Context::new_for_test(5));
        let store = Arc::new(DagStore::new());
        let slashing = Arc::new(SlashingReporter::new(context.metrics.clone()));
        let aggregator = Arc::new(VoteAggregator::new(
            context.clone(),
            Arc::new(NoopClassicalAggregator),
            Arc::new(NoopPqScheme),
            slashing.clone(),
        ));
        let winner = VertexId::from_bytes([42; 32]);
        let engine = FinalizationEngine::new(
            context,
            store,
            Arc::new(SiblingClient { winner }),
            aggregator,
            slashing,
        );

        let now = Instant::now();
        let subject = Vertex::new_for_test(NodeId::new_for_test(0), 0, vec![]);
        let subject_id = engine.add(subject, now).await.unwrap();
        assert_ne!(subject_id, winner);

        // Parameters::local(): beta=4 poll rounds to finalize, but the
        // record finalizes on `winner`, not `subject_id`.
        for _ in 0..4 {
            engine.poll_tick(subject_id, now).await.unwrap();
        }
        assert_eq!(engine.status(subject_id), Some(Status::Rejected));
        // `winner` isn't locally known yet; scheduling it is a no-op until
        // it is synced and its own poll tick runs.
        assert_eq!(engine.status(winner), None);
    }

    #[tokio::test]
    async fn await_terminal_status_resolves_once_status_settles() {
        let engine = engine();
        let now = Instant::now();
        let root = Vertex::new_for_test(NodeId::new_for_test(0), 0, vec![]);
        let root_id = engine.add(root, now).await.unwrap();

        let later = now + engine.context.parameters.max_item_processing_time + std::time::Duration::from_secs(1);
        engine.poll_tick(root_id, later).await.unwrap();

        let status = engine.await_terminal_status(root_id).await;
        assert_eq!(status, Some(Status::Rejected));
    }

    #[tokio::test]
    async fn await_certificate_resolves_once_both_legs_assemble() {
        let engine = engine();
        let now = Instant::now();
        let root = Vertex::new_for_test(NodeId::new_for_test(0), 0, vec![]);
        let root_id = engine.add(root, now).await.unwrap();

        for i in 0..3u8 {
            engine
                .aggregator
                .add_classical_share(
                    root_id,
                    NodeId::new_for_test(i),
                    consensus_config::ClassicalSignature([0; 96]),
                    root_id.as_bytes(),
                )
                .unwrap();
            engine
                .aggregator
                .add_pq_share(
                    root_id,
                    NodeId::new_for_test(i),
                    consensus_config::PqShare(vec![0]),
                    0,
                    root_id.as_bytes(),
                    now,
                )
                .unwrap();
        }

        let bundle = engine.await_certificate(root_id).await.expect("should assemble");
        assert!(bundle.is_complete());
    }

    #[tokio::test]
    async fn await_terminal_status_is_cancelled_by_stop_signal() {
        let engine = engine();
        let now = Instant::now();
        let root = Vertex::new_for_test(NodeId::new_for_test(0), 0, vec![]);
        let root_id = engine.add(root, now).await.unwrap();

        engine.context.stop.stop();
        let status = engine.await_terminal_status(root_id).await;
        assert_eq!(status, None);
        assert_eq!(engine.status(root_id), Some(Status::Processing));
    }
}
