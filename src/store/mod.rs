// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The store module provides traits and concrete types to implement the
//! interface between the verifier and its two external inputs:
//! * the source of trust anchors that path validation chains up to
//! * the source of revoked certificate serial numbers
//!
//! Simple in-memory implementations of both, loadable from their JSON wire
//! shapes, are provided by [`MemoTrustAnchorStore`] and
//! [`MemoRevocationList`].
//!
//! # Examples
//!
//! * Initialise an in-memory revocation list from a status-list document:
//!
//! ```
//! use keyattestation::store::MemoRevocationList;
//!
//! let json = r#"
//!   {
//!     "entries": {
//!       "2c8cdddfd5e03bfc": {"status": "REVOKED", "reason": "KEY_COMPROMISE"},
//!       "c8966fcb2fbb0d7a": {"status": "SUSPENDED", "comment": "Pending decision"}
//!     }
//!   }"#;
//!
//! let crl = MemoRevocationList::new();
//! crl.load_json(json).expect("loading status list");
//! ```
//!
//! * Initialise an in-memory trust anchor store:
//!
//! ```no_run
//! use keyattestation::store::MemoTrustAnchorStore;
//!
//! let json = r#"
//! [
//!   {
//!     "name": "google-hardware-attestation-root",
//!     "certificate": "-----BEGIN CERTIFICATE-----\n...\n-----END CERTIFICATE-----\n"
//!   }
//! ]"#;
//!
//! let tas = MemoTrustAnchorStore::new();
//! tas.load_json(json).expect("loading trust anchors");
//! ```

pub use self::errors::Error;
pub use self::revocation::{IRevocationSource, MemoRevocationList};
pub use self::trustanchors::{ITrustAnchorSource, MemoTrustAnchorStore, TrustAnchorEntry};

mod errors;
mod revocation;
mod trustanchors;
