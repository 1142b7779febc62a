// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Vote Aggregator (component G, §4.5): collects classical-signature and
//! post-quantum threshold-signature shares for a vertex, independently, and
//! assembles a dual certificate once both legs cross `cert_threshold`
//! authorities. Grounded on `commit_vote_monitor.rs`'s pattern of tracking
//! per-authority contributions behind a `parking_lot::Mutex` and folding
//! them through a stake aggregator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use consensus_config::{ClassicalSignature, NodeId, PqCertificate, PqShare};
use consensus_types::{ConsensusError, ConsensusResult, Height, VertexId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::Context;
use crate::signals::StopWaiter;
use crate::signing::{ClassicalAggregator, PqThresholdScheme};
use crate::slashing::{Evidence, SlashingReporter};
use crate::stake::{QuorumThreshold, StakeAggregator};

/// Poll interval for `wait_for_certificate`'s cancellable wait loop.
const PQ_WAIT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(20);

/// The dual certificate attached to a finalized vertex (§3). Either half
/// may be absent while assembly is in progress.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CertificateBundle {
    pub classical_aggregate: Option<ClassicalSignature>,
    pub pq_cert: Option<PqCertificate>,
}

impl CertificateBundle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.classical_aggregate.is_some() && self.pq_cert.is_some()
    }
}

struct PendingClassical {
    aggregator: StakeAggregator<QuorumThreshold>,
    shares: Vec<ClassicalSignature>,
}

struct PendingPq {
    aggregator: StakeAggregator<QuorumThreshold>,
    shares: Vec<PqShare>,
    deadline: Instant,
    timed_out: bool,
}

/// Tracks in-flight certificate assembly for every vertex currently awaiting
/// finalization. One instance per authority, shared across the components
/// that receive vote/share messages from peers.
pub struct VoteAggregator {
    context: Arc<Context>,
    classical_aggregator: Arc<dyn ClassicalAggregator>,
    pq_scheme: Arc<dyn PqThresholdScheme>,
    slashing: Arc<SlashingReporter>,
    classical: Mutex<HashMap<VertexId, PendingClassical>>,
    pq: Mutex<HashMap<VertexId, PendingPq>>,
    stop: StopWaiter,
}

impl VoteAggregator {
    pub fn new(
        context: Arc<Context>,
        classical_aggregator: Arc<dyn ClassicalAggregator>,
        pq_scheme: Arc<dyn PqThresholdScheme>,
        slashing: Arc<SlashingReporter>,
    ) -> Self {
        let stop = context.stop.waiter();
        Self {
            context,
            classical_aggregator,
            pq_scheme,
            slashing,
            classical: Mutex::new(HashMap::new()),
            pq: Mutex::new(HashMap::new()),
            stop,
        }
    }

    /// Records a classical signature share from `author` over `msg`,
    /// verifying it against the author's registered key before it counts
    /// toward `cert_threshold` (§4.5 step 2). Returns `true` if the
    /// classical leg has now reached threshold, or
    /// `Err(ConsensusError::InvalidClassicalSig)` if the share does not
    /// verify (the author is unknown to the committee, or the signature
    /// itself fails verification).
    pub fn add_classical_share(
        &self,
        vertex: VertexId,
        author: NodeId,
        share: ClassicalSignature,
        msg: &[u8],
    ) -> ConsensusResult<bool> {
        let Some(pk) = self.context.committee.authority_by_id(author).map(|a| a.classical_pk.clone()) else {
            warn!(?vertex, ?author, "classical share from unknown authority rejected");
            return Err(ConsensusError::InvalidClassicalSig);
        };
        if !self.classical_aggregator.verify_share(msg, &share, &pk) {
            warn!(?vertex, ?author, "invalid classical share rejected");
            return Err(ConsensusError::InvalidClassicalSig);
        }

        let mut map = self.classical.lock();
        let entry = map.entry(vertex).or_insert_with(|| PendingClassical {
            aggregator: StakeAggregator::new(),
            shares: Vec::new(),
        });

        if entry.aggregator.voters().contains(&author) {
            // Idempotent: a retransmitted share from an author already
            // counted must not be appended again (§4.5 concurrency note;
            // §8 "appending a duplicate share leaves the aggregate
            // unchanged").
            return Ok(entry.aggregator.reached_threshold(&self.context.committee));
        }

        entry.shares.push(share);
        Ok(entry.aggregator.add(author, &self.context.committee))
    }

    /// Starts (or restarts) the `quasar_timeout` deadline for `vertex`'s PQ
    /// leg, counted from `now`.
    pub fn start_pq_deadline(&self, vertex: VertexId, now: Instant) {
        let mut map = self.pq.lock();
        map.entry(vertex).or_insert_with(|| PendingPq {
            aggregator: StakeAggregator::new(),
            shares: Vec::new(),
            deadline: now + self.context.parameters.quasar_timeout,
            timed_out: false,
        });
    }

    /// Records a PQ threshold share from `author` over `msg`, checked
    /// against the deadline started by `start_pq_deadline` and verified
    /// against the author's registered PQ key before it counts toward
    /// `cert_threshold` (§4.5 step 2). Returns
    /// `Err(ConsensusError::QuasarTimeout)` if `now` is past the deadline
    /// and the leg has not yet reached threshold, or
    /// `Err(ConsensusError::InvalidPqShare)` if the share fails
    /// verification (reported to the Slashing Reporter as
    /// `Evidence::InvalidPqShare`).
    pub fn add_pq_share(
        &self,
        vertex: VertexId,
        author: NodeId,
        share: PqShare,
        height: Height,
        msg: &[u8],
        now: Instant,
    ) -> ConsensusResult<bool> {
        let Some(pk) = self.context.committee.authority_by_id(author).map(|a| a.pq_pk.clone()) else {
            warn!(?vertex, ?author, "pq share from unknown authority rejected");
            return Err(ConsensusError::InvalidPqShare);
        };
        if !self.pq_scheme.verify_share(msg, &share, &pk) {
            warn!(?vertex, ?author, "invalid pq share rejected");
            self.slashing.report(Evidence::InvalidPqShare {
                author,
                height,
                share_bytes: share,
            });
            return Err(ConsensusError::InvalidPqShare);
        }

        let mut map = self.pq.lock();
        let entry = map.entry(vertex).or_insert_with(|| PendingPq {
            aggregator: StakeAggregator::new(),
            shares: Vec::new(),
            deadline: now + self.context.parameters.quasar_timeout,
            timed_out: false,
        });

        if entry.aggregator.voters().contains(&author) {
            // Idempotent: see `add_classical_share`.
            return Ok(entry.aggregator.reached_threshold(&self.context.committee));
        }

        if now >= entry.deadline && !entry.aggregator.reached_threshold(&self.context.committee) {
            if !entry.timed_out {
                entry.timed_out = true;
                self.context.metrics.quasar_timeouts_total.inc();
                warn!(?vertex, "quasar timeout before PQ threshold reached");
            }
            return Err(ConsensusError::QuasarTimeout);
        }

        entry.shares.push(share);
        Ok(entry.aggregator.add(author, &self.context.committee))
    }

    pub fn pq_timed_out(&self, vertex: VertexId) -> bool {
        self.pq
            .lock()
            .get(&vertex)
            .map(|p| p.timed_out)
            .unwrap_or(false)
    }

    /// Proactively marks every vertex whose PQ deadline has elapsed without
    /// reaching threshold as timed out, independent of any new share
    /// arriving (§8 scenario 3: a stalled proposer whose buffer never
    /// receives another share must still be reported). Returns the ids
    /// newly marked this call so the caller can report them once each.
    pub fn sweep_pq_timeouts(&self, now: Instant) -> Vec<VertexId> {
        let mut newly_timed_out = Vec::new();
        let mut map = self.pq.lock();
        for (&vertex, entry) in map.iter_mut() {
            if !entry.timed_out
                && now >= entry.deadline
                && !entry.aggregator.reached_threshold(&self.context.committee)
            {
                entry.timed_out = true;
                self.context.metrics.quasar_timeouts_total.inc();
                warn!(?vertex, "quasar timeout swept before any further share arrived");
                newly_timed_out.push(vertex);
            }
        }
        newly_timed_out
    }

    /// Assembles the dual certificate once both legs have independently
    /// reached `cert_threshold`. Returns `None` if either leg is not yet
    /// ready; does not remove the pending state (idempotent).
    pub fn try_assemble(&self, vertex: VertexId, msg: &[u8]) -> Option<CertificateBundle> {
        let classical_ready = {
            let map = self.classical.lock();
            map.get(&vertex)
                .map(|p| p.aggregator.reached_threshold(&self.context.committee))
                .unwrap_or(false)
        };
        let pq_ready = {
            let map = self.pq.lock();
            map.get(&vertex)
                .map(|p| p.aggregator.reached_threshold(&self.context.committee) && !p.timed_out)
                .unwrap_or(false)
        };
        if !(classical_ready && pq_ready) {
            return None;
        }

        let classical_aggregate = {
            let map = self.classical.lock();
            let pending = map.get(&vertex)?;
            self.classical_aggregator.aggregate(&pending.shares)
        };
        let pq_cert = {
            let map = self.pq.lock();
            let pending = map.get(&vertex)?;
            self.pq_scheme.combine(&pending.shares)
        };
        let _ = msg; // reserved for real schemes that sign over an explicit message
        self.context.metrics.certificates_assembled_total.inc();
        debug!(?vertex, "dual certificate assembled");
        Some(CertificateBundle {
            classical_aggregate: Some(classical_aggregate),
            pq_cert: Some(pq_cert),
        })
    }

    /// Suspends until `vertex`'s dual certificate assembles, its PQ
    /// deadline elapses, or the authority's stop signal fires — whichever
    /// comes first (§4.5 step 5: "the proposer task await[s] the PQ
    /// threshold or timeout"; §5, §9: every wait observes the one stop
    /// signal, and cancellation here propagates to the caller as a missing
    /// certificate, the same shape as a timeout). Polls at a fixed interval
    /// against real time, since the share buffer is appended to by other
    /// tasks rather than signalling this waiter directly.
    pub async fn wait_for_certificate(&self, vertex: VertexId, msg: &[u8]) -> Option<CertificateBundle> {
        let mut stop = self.stop.clone();
        loop {
            if let Some(bundle) = self.try_assemble(vertex, msg) {
                return Some(bundle);
            }
            self.sweep_pq_timeouts(Instant::now());
            if self.pq_timed_out(vertex) {
                return None;
            }
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    debug!(?vertex, "pq certificate wait cancelled by stop signal");
                    return None;
                }
                _ = tokio::time::sleep(PQ_WAIT_POLL_INTERVAL) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::test_utils::{NoopClassicalAggregator, NoopPqScheme};
    use std::time::Duration;

    fn aggregator(committee_size: usize) -> VoteAggregator {
        let context = Arc::new(Context::new_for_test(committee_size));
        let slashing = Arc::new(SlashingReporter::new(context.metrics.clone()));
        VoteAggregator::new(context, Arc::new(NoopClassicalAggregator), Arc::new(NoopPqScheme), slashing)
    }

    fn sig(b: u8) -> ClassicalSignature {
        ClassicalSignature([b; 96])
    }

    fn share(b: u8) -> PqShare {
        PqShare(vec![b; 8])
    }

    #[test]
    fn assembles_once_both_legs_reach_threshold() {
        let agg = aggregator(4);
        let vertex = VertexId::from_bytes([1; 32]);
        let now = Instant::now();
        agg.start_pq_deadline(vertex, now);

        // cert_threshold for n=4 is 2*1+1=3.
        for i in 0..2u8 {
            assert!(!agg
                .add_classical_share(vertex, NodeId::new_for_test(i), sig(i), b"msg")
                .unwrap());
        }
        assert!(agg
            .add_classical_share(vertex, NodeId::new_for_test(2), sig(2), b"msg")
            .unwrap());

        for i in 0..2u8 {
            assert!(!agg
                .add_pq_share(vertex, NodeId::new_for_test(i), share(i), 1, b"msg", now)
                .unwrap());
        }
        assert!(agg
            .add_pq_share(vertex, NodeId::new_for_test(2), share(2), 1, b"msg", now)
            .unwrap());

        let bundle = agg.try_assemble(vertex, b"msg").expect("should assemble");
        assert!(bundle.is_complete());
    }

    #[test]
    fn pq_deadline_elapsed_before_threshold_is_quasar_timeout() {
        let agg = aggregator(4);
        let vertex = VertexId::from_bytes([2; 32]);
        let start = Instant::now();
        agg.start_pq_deadline(vertex, start);

        let later = start + Duration::from_secs(10);
        let err = agg
            .add_pq_share(vertex, NodeId::new_for_test(0), share(0), 1, b"msg", later)
            .unwrap_err();
        assert_eq!(err, ConsensusError::QuasarTimeout);
        assert!(agg.pq_timed_out(vertex));
    }

    #[test]
    fn sweep_marks_timeout_without_a_new_share_arriving() {
        let agg = aggregator(4);
        let vertex = VertexId::from_bytes([3; 32]);
        let start = Instant::now();
        agg.start_pq_deadline(vertex, start);

        assert!(agg.sweep_pq_timeouts(start).is_empty());
        assert!(!agg.pq_timed_out(vertex));

        let later = start + Duration::from_secs(10);
        let swept = agg.sweep_pq_timeouts(later);
        assert_eq!(swept, vec![vertex]);
        assert!(agg.pq_timed_out(vertex));

        // Idempotent: already-timed-out vertices aren't reported again.
        assert!(agg.sweep_pq_timeouts(later).is_empty());
    }

    #[test]
    fn invalid_classical_share_from_unknown_author_is_rejected() {
        let agg = aggregator(4);
        let vertex = VertexId::from_bytes([4; 32]);
        let err = agg
            .add_classical_share(vertex, NodeId::new_for_test(99), sig(0), b"msg")
            .unwrap_err();
        assert_eq!(err, ConsensusError::InvalidClassicalSig);
    }

    #[test]
    fn duplicate_classical_share_is_not_appended_twice() {
        let agg = aggregator(4);
        let vertex = VertexId::from_bytes([5; 32]);
        let author = NodeId::new_for_test(0);

        agg.add_classical_share(vertex, author, sig(0), b"msg").unwrap();
        agg.add_classical_share(vertex, author, sig(0), b"msg").unwrap();

        let map = agg.classical.lock();
        let entry = map.get(&vertex).unwrap();
        assert_eq!(entry.shares.len(), 1);
        assert_eq!(entry.aggregator.stake(), 1);
    }

    #[test]
    fn duplicate_pq_share_is_not_appended_twice() {
        let agg = aggregator(4);
        let vertex = VertexId::from_bytes([6; 32]);
        let author = NodeId::new_for_test(0);
        let now = Instant::now();
        agg.start_pq_deadline(vertex, now);

        agg.add_pq_share(vertex, author, share(0), 1, b"msg", now).unwrap();
        agg.add_pq_share(vertex, author, share(0), 1, b"msg", now).unwrap();

        let map = agg.pq.lock();
        let entry = map.get(&vertex).unwrap();
        assert_eq!(entry.shares.len(), 1);
        assert_eq!(entry.aggregator.stake(), 1);
    }

    #[tokio::test]
    async fn wait_for_certificate_returns_once_both_legs_ready() {
        let agg = aggregator(4);
        let vertex = VertexId::from_bytes([7; 32]);
        let now = Instant::now();
        agg.start_pq_deadline(vertex, now);

        for i in 0..3u8 {
            agg.add_classical_share(vertex, NodeId::new_for_test(i), sig(i), b"msg")
                .unwrap();
            agg.add_pq_share(vertex, NodeId::new_for_test(i), share(i), 1, b"msg", now)
                .unwrap();
        }

        let bundle = agg.wait_for_certificate(vertex, b"msg").await.expect("should assemble");
        assert!(bundle.is_complete());
    }

    #[tokio::test]
    async fn wait_for_certificate_is_cancelled_by_stop_signal() {
        let agg = aggregator(4);
        let vertex = VertexId::from_bytes([8; 32]);
        let now = Instant::now();
        agg.start_pq_deadline(vertex, now);

        agg.context.stop.stop();
        let result = agg.wait_for_certificate(vertex, b"msg").await;
        assert!(result.is_none());
    }
}
