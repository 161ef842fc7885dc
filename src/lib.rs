// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Android key attestation verification.
//!
//! This crate decides whether a certificate chain produced by Android's
//! Keystore is a genuine hardware-backed attestation of a cryptographic
//! key.  On success it returns the attested key together with the
//! challenge, security posture, boot state, device identity and
//! provisioning information embedded in the attestation extension.
//!
//! The API allows:
//! * Structural validation of the chain shape, rejecting chains extended
//!   to smuggle an attacker-controlled key behind a real attestation
//! * PKIX path validation against caller-supplied trust anchors, with a
//!   revocation check driven by the published serial-number status list
//! * Parsing and semantic appraisal of the KeyDescription extension, with
//!   configurable per-field validation levels
//! * Asynchronous, composable challenge checking
//!
//! # Example
//!
//! ```no_run
//! use keyattestation::store::{MemoRevocationList, MemoTrustAnchorStore};
//! use keyattestation::verifier::{ChallengeMatcher, SystemClock, Verifier};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let anchors = MemoTrustAnchorStore::new();
//! anchors.load_json(&std::fs::read_to_string("tastore.json")?)?;
//!
//! let revocations = MemoRevocationList::new();
//! revocations.load_json(&std::fs::read_to_string("status.json")?)?;
//!
//! let verifier = Verifier::new(anchors, revocations, SystemClock, Default::default())?;
//!
//! let chain: Vec<Vec<u8>> = todo!("leaf-first DER certificates from the device");
//! let checker = ChallengeMatcher::new(*b"expected challenge");
//! let result = verifier.verify(&chain, Some(&checker), None);
//! println!("{result:?}");
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod ext;
pub mod log;
pub mod store;
pub mod verifier;

#[cfg(test)]
mod fixtures;
