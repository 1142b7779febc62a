// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use consensus_config::{Committee, NodeId, Parameters};
use prometheus::Registry;

use crate::metrics::Metrics;
use crate::signals::StopHandle;

/// Per-epoch configuration and metrics shared by all components of this
/// authority (§5, "shared-resource policy": the committee snapshot is
/// immutable and swapped wholesale at epoch boundaries).
#[derive(Clone)]
pub struct Context {
    /// This authority's own node id.
    pub own_id: NodeId,
    /// Committee of the current epoch.
    pub committee: Arc<Committee>,
    /// Operational parameters of this authority.
    pub parameters: Parameters,
    /// Metrics of this authority.
    pub metrics: Arc<Metrics>,
    /// The single stop signal every cancellable wait in this authority
    /// observes (§5, §9).
    pub stop: StopHandle,
}

impl Context {
    pub fn new(own_id: NodeId, committee: Arc<Committee>, parameters: Parameters) -> Self {
        parameters
            .validate()
            .unwrap_or_else(|e| panic!("invalid parameters: {e}"));
        Self {
            own_id,
            committee,
            parameters,
            metrics: Arc::new(Metrics::new(&Registry::new())),
            stop: StopHandle::new(),
        }
    }

    pub fn own_index(&self) -> Option<usize> {
        self.committee.index_of(self.own_id)
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_test(committee_size: usize) -> Self {
        use consensus_config::{
            ClassicalPublicKey, CommitteeBuilder, NetworkPublicKey, PqPublicKey,
        };

        let mut builder = CommitteeBuilder::new(0);
        for i in 0..committee_size as u8 {
            builder.add_authority(
                NodeId::new_for_test(i),
                1,
                ClassicalPublicKey([i; 48]),
                PqPublicKey(vec![i; 16]),
                NetworkPublicKey([i; 32]),
                format!("node-{i}"),
            );
        }
        let committee = Arc::new(builder.build());
        let own_id = committee.authority(0).node_id;
        Self::new(own_id, committee, Parameters::local())
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn with_own_id(mut self, own_id: NodeId) -> Self {
        self.own_id = own_id;
        self
    }
}
