// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Observation hook for the verifier.  Every method has an empty default
//! body, so implementations override only what they care about.  The
//! verifier behaves identically whether or not a hook is supplied.
//!
//! Callbacks run in-place on the verifying thread; implementations must be
//! thread-safe and should not block.

use crate::ext::{KeyDescription, ProvisioningInfoMap};
use crate::verifier::VerificationResult;

#[allow(unused_variables)]
pub trait VerificationLog: Send + Sync {
    /// The raw chain handed to `verify`, leaf first.
    fn log_input_chain(&self, chain: &[Vec<u8>]) {}

    /// The final outcome, emitted immediately before `verify` returns.
    fn log_result(&self, result: &VerificationResult) {}

    /// The parsed leaf extension.
    fn log_key_description(&self, key_description: &KeyDescription) {}

    /// The provisioning info found on the attestation certificate of a
    /// remotely provisioned chain.
    fn log_provisioning_info_map(&self, info: &ProvisioningInfoMap) {}

    /// Serial numbers (lowercase hex, no leading zeros) of every chain
    /// certificate except the leaf.
    fn log_cert_serial_numbers(&self, serials: &[String]) {}

    /// A recoverable oddity observed while parsing.
    fn log_info_message(&self, message: &str) {}
}

/// The hook used when the caller supplies none.
pub struct NopLog;

impl VerificationLog for NopLog {}
