// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

mod committee;
mod crypto;
mod parameters;

pub use committee::*;
pub use crypto::*;
pub use parameters::*;
