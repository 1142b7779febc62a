// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! External-collaborator signature contracts (§1 Non-goals: "raw
//! cryptographic primitives... are out of scope; this core consumes them
//! through a signing interface"). Grounded on the teacher's
//! `authority_signature.rs`, which similarly wraps a signing/verification
//! pair behind a small trait rather than hand-rolling the math inline. Real
//! deployments plug in a classical aggregatable-signature scheme (e.g.
//! BLS12-381) and a lattice-based post-quantum threshold scheme
//! ("Ringtail"/"Quasar") that satisfy these traits; this crate ships no
//! implementation of either.

use consensus_config::{
    ClassicalPublicKey, ClassicalSignature, PqCertificate, PqPublicKey, PqShare,
};

/// Produces and verifies the classical aggregatable signature half of a
/// dual certificate (§3, "Finality").
pub trait ClassicalAggregator: Send + Sync {
    /// Combines individual authority signatures over the same message into
    /// one aggregate signature.
    fn aggregate(&self, shares: &[ClassicalSignature]) -> ClassicalSignature;

    /// Verifies a single authority's signature share.
    fn verify_share(&self, msg: &[u8], share: &ClassicalSignature, pk: &ClassicalPublicKey) -> bool;

    /// Verifies an aggregate signature against the committee's combined key
    /// material (implementation-specific; callers pass the set of
    /// contributing public keys).
    fn verify_aggregate(
        &self,
        msg: &[u8],
        aggregate: &ClassicalSignature,
        pks: &[ClassicalPublicKey],
    ) -> bool;
}

/// Produces and verifies the post-quantum threshold signature half of a
/// dual certificate.
pub trait PqThresholdScheme: Send + Sync {
    /// Combines `>= cert_threshold` shares into a single certificate.
    fn combine(&self, shares: &[PqShare]) -> PqCertificate;

    /// Verifies a single authority's threshold share.
    fn verify_share(&self, msg: &[u8], share: &PqShare, pk: &PqPublicKey) -> bool;

    /// Verifies a combined certificate.
    fn verify_cert(&self, msg: &[u8], cert: &PqCertificate, pks: &[PqPublicKey]) -> bool;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    //! In-memory stand-ins for the two traits above: "aggregation" is
    //! concatenation and "verification" always succeeds. Exists only to
    //! exercise the certificate-assembly and timeout code paths in tests;
    //! never a substitute for a real scheme.
    use super::*;

    pub struct NoopClassicalAggregator;

    impl ClassicalAggregator for NoopClassicalAggregator {
        fn aggregate(&self, shares: &[ClassicalSignature]) -> ClassicalSignature {
            let mut out = [0u8; 96];
            if let Some(first) = shares.first() {
                out[..first.0.len().min(96)].copy_from_slice(&first.0[..first.0.len().min(96)]);
            }
            ClassicalSignature(out)
        }

        fn verify_share(&self, _msg: &[u8], _share: &ClassicalSignature, _pk: &ClassicalPublicKey) -> bool {
            true
        }

        fn verify_aggregate(
            &self,
            _msg: &[u8],
            _aggregate: &ClassicalSignature,
            _pks: &[ClassicalPublicKey],
        ) -> bool {
            true
        }
    }

    pub struct NoopPqScheme;

    impl PqThresholdScheme for NoopPqScheme {
        fn combine(&self, shares: &[PqShare]) -> PqCertificate {
            PqCertificate(shares.iter().flat_map(|s| s.0.clone()).collect())
        }

        fn verify_share(&self, _msg: &[u8], _share: &PqShare, _pk: &PqPublicKey) -> bool {
            true
        }

        fn verify_cert(&self, _msg: &[u8], _cert: &PqCertificate, _pks: &[PqPublicKey]) -> bool {
            true
        }
    }
}
