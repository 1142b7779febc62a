// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Application payload validation contract (§1 Non-goals: "interpreting
//! `payload` bytes... is out of scope; this core treats the payload as
//! opaque"). Grounded on the teacher's `block_validator.rs`: the core still
//! needs somewhere to call out to before admitting a vertex, even though it
//! never looks inside the payload itself, so that boundary is fixed behind
//! a small trait rather than skipped.

use async_trait::async_trait;

use crate::vertex::Vertex;

/// Validates a vertex's opaque application payload before it is admitted to
/// the DAG. Real deployments plug in whatever validity rules their
/// application layer needs; this crate ships no implementation beyond the
/// accept-all stand-in below.
#[async_trait]
pub trait PayloadValidator: Send + Sync + 'static {
    type Error: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static;

    async fn validate(&self, vertex: &Vertex) -> Result<(), Self::Error>;
}

/// The default validator: every payload is accepted. Used where the
/// embedding application has no payload-level rules of its own, or in
/// tests.
#[derive(Clone)]
pub struct AcceptAllPayloadValidator;

#[async_trait]
impl PayloadValidator for AcceptAllPayloadValidator {
    type Error = eyre::Report;

    async fn validate(&self, _vertex: &Vertex) -> Result<(), Self::Error> {
        Ok(())
    }
}
