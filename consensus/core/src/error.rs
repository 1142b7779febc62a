// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

pub use consensus_types::{ConsensusError, ConsensusResult};
