// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

mod error;
mod ids;
mod messages;

pub use error::*;
pub use ids::*;
pub use messages::*;
