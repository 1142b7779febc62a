// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($name:ident) => {
        /// Opaque 32-byte identifier with a total order (§3, "Identifiers").
        #[derive(
            Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const ZERO: Self = Self([0u8; 32]);

            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    "{}({:02x}{:02x}{:02x}{:02x}..)",
                    stringify!($name),
                    self.0[0],
                    self.0[1],
                    self.0[2],
                    self.0[3]
                )
            }
        }
    };
}

opaque_id!(VertexId);
opaque_id!(BlockId);
opaque_id!(TxId);

/// Height/round are monotone 64-bit counters over the DAG.
pub type Height = u64;
pub type Round = u64;
