// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::ids::{BlockId, VertexId};

/// Error taxonomy at the system boundary (§6, §7). These are recovered
/// locally by the caller — dropped message, policy rejection surfaced to
/// the caller, or retried on the next tick — and are distinct from the
/// fatal process-invariant violations of §7 kind 4, which `panic!` instead
/// of being represented here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("parent {0:?} is missing from the DAG")]
    MissingParent(VertexId),
    #[error("classical signature is invalid")]
    InvalidClassicalSig,
    #[error("post-quantum share is invalid")]
    InvalidPqShare,
    #[error("post-quantum certificate is invalid")]
    InvalidPqCert,
    #[error("application payload failed validation")]
    InvalidPayload,
    #[error("quasar timeout elapsed before the PQ certificate assembled")]
    QuasarTimeout,
    #[error("witness payload of {0} bytes exceeds the configured limit")]
    WitnessTooLarge(usize),
    #[error("delta-only witness admission requires a known parent committed root")]
    WitnessDeltaMissingParent,
    #[error("vertex {0:?} is unknown")]
    UnknownVertex(VertexId),
    #[error("block {0:?} is not finalized")]
    NotFinalized(BlockId),
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
