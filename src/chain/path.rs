// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! PKIX path validation of a structurally valid chain, delegated to
//! openssl's X509 store machinery, plus the serial-number revocation pass.
//!
//! Trust anchors and verification time are injected per call, never taken
//! from ambient state, so providers can refresh between verifications and
//! tests can pin the clock.

use super::shape::AttestationChain;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Public};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::X509VerifyParam;
use openssl::x509::{X509Ref, X509StoreContext, X509};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Why PKIX rejected the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathValidationReason {
    NoTrustAnchor,
    NameChaining,
    InvalidSignature,
    NotYetValid,
    Expired,
    Revoked,
    Unspecified,
}

/// A PKIX rejection, preserving the underlying verifier's reason.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PathValidationError {
    pub message: String,
    pub reason: PathValidationReason,
}

impl PathValidationError {
    pub(crate) fn new(message: impl Into<String>, reason: PathValidationReason) -> Self {
        Self {
            message: message.into(),
            reason,
        }
    }
}

/// Subject common name of Google's software-only attestation roots.  A key
/// attested under one of these never left the application processor, so
/// accepting such a root as a trust anchor would defeat the point of
/// hardware attestation.
pub const SOFTWARE_ROOT_COMMON_NAME: &str = "Android Keystore Software Attestation Root";

/// Whether a candidate trust anchor is a known software attestation root.
pub fn is_software_root(cert: &X509Ref) -> bool {
    cert.subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .any(|entry| {
            entry
                .data()
                .as_utf8()
                .map(|s| s.to_string() == SOFTWARE_ROOT_COMMON_NAME)
                .unwrap_or(false)
        })
}

fn unspecified(e: openssl::error::ErrorStack) -> PathValidationError {
    PathValidationError::new(
        format!("path validation aborted: {e}"),
        PathValidationReason::Unspecified,
    )
}

fn reason_from_openssl(code: i32) -> PathValidationReason {
    match code {
        openssl_sys::X509_V_ERR_UNABLE_TO_GET_ISSUER_CERT
        | openssl_sys::X509_V_ERR_UNABLE_TO_GET_ISSUER_CERT_LOCALLY
        | openssl_sys::X509_V_ERR_SELF_SIGNED_CERT_IN_CHAIN
        | openssl_sys::X509_V_ERR_DEPTH_ZERO_SELF_SIGNED_CERT
        | openssl_sys::X509_V_ERR_CERT_UNTRUSTED => PathValidationReason::NoTrustAnchor,
        openssl_sys::X509_V_ERR_CERT_SIGNATURE_FAILURE => PathValidationReason::InvalidSignature,
        openssl_sys::X509_V_ERR_CERT_NOT_YET_VALID => PathValidationReason::NotYetValid,
        openssl_sys::X509_V_ERR_CERT_HAS_EXPIRED => PathValidationReason::Expired,
        openssl_sys::X509_V_ERR_SUBJECT_ISSUER_MISMATCH => PathValidationReason::NameChaining,
        _ => PathValidationReason::Unspecified,
    }
}

/// Runs PKIX validation of `chain` against `anchors` at time `now`, then
/// rejects any path certificate whose serial is in `revoked`.  On success
/// returns the attested key: the leaf's public key as established by the
/// validated path.
pub(crate) fn validate_path(
    chain: &AttestationChain,
    anchors: &[X509],
    now: SystemTime,
    revoked: &HashSet<String>,
) -> Result<PKey<Public>, PathValidationError> {
    for anchor in anchors {
        if is_software_root(anchor) {
            return Err(PathValidationError::new(
                "software attestation root offered as trust anchor",
                PathValidationReason::NoTrustAnchor,
            ));
        }
    }

    let mut builder = X509StoreBuilder::new().map_err(unspecified)?;
    for anchor in anchors {
        builder.add_cert(anchor.clone()).map_err(unspecified)?;
    }
    let mut param = X509VerifyParam::new().map_err(unspecified)?;
    let unix = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    param.set_time(unix as i64);
    builder.set_param(&param).map_err(unspecified)?;
    let store = builder.build();

    let path = chain.certificates_without_anchor();
    let leaf = path[0].x509();
    let mut untrusted = Stack::new().map_err(unspecified)?;
    for cert in &path[1..] {
        untrusted
            .push(cert.x509().to_owned())
            .map_err(unspecified)?;
    }

    let mut context = X509StoreContext::new().map_err(unspecified)?;
    let verdict = context
        .init(&store, leaf, &untrusted, |ctx| {
            let ok = ctx.verify_cert()?;
            Ok((ok, ctx.error()))
        })
        .map_err(unspecified)?;
    match verdict {
        (true, _) => {}
        (false, error) => {
            log::debug!(
                "certificate path rejected: {} (code {})",
                error.error_string(),
                error.as_raw()
            );
            return Err(PathValidationError::new(
                format!("certificate path rejected: {}", error.error_string()),
                reason_from_openssl(error.as_raw()),
            ));
        }
    }

    for cert in path {
        let serial = cert.serial_hex();
        if revoked.contains(&serial) {
            log::warn!("certificate serial {serial} found in the revocation list");
            return Err(PathValidationError::new(
                format!("certificate with serial {serial} is revoked"),
                PathValidationReason::Revoked,
            ));
        }
    }

    leaf.public_key().map_err(unspecified)
}
