// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/// The core targets validator counts in this range (§1, PURPOSE & SCOPE).
pub const MIN_VALIDATORS: usize = 4;
pub const MAX_VALIDATORS: usize = 1000;

/// Byte boundary the witness admission cache splits payloads at (§4.4).
pub const WITNESS_NODE_SPLIT_BYTES: usize = 2 * 1024;

/// Upper bound on a single witness payload the cache will ever split,
/// regardless of `witness_max_bytes` (§4.4).
pub const WITNESS_MAX_SPLIT_SOURCE_BYTES: usize = 64 * 1024;
