// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Parsers for the bespoke X.509 extensions that carry Android attestation
//! data: the KeyDescription extension (`1.3.6.1.4.1.11129.2.1.17`) and the
//! provisioning-info extension (`1.3.6.1.4.1.11129.2.1.30`).
//!
//! Parsing is total and never panics: every byte input maps to a value or
//! to an [`ExtensionParsingError`] carrying a reason.  Optional fields with
//! unparseable values degrade to absence (reported through the log hook);
//! structural damage, unknown tag numbers and forbidden boolean encodings
//! are fatal.

pub use self::authorizations::{
    AttestationApplicationId, AttestationPackageInfo, AuthorizationList, KeyOrigin, PatchLevel,
    RootOfTrust, VerifiedBootState,
};
pub use self::errors::{ExtensionParsingError, ExtensionParsingReason};
pub use self::keydescription::{KeyDescription, SecurityLevel, ATTESTATION_EXTENSION_OID};
pub use self::provisioning::{ProvisioningInfoMap, PROVISIONING_INFO_EXTENSION_OID};

pub(crate) mod asn;
mod authorizations;
mod errors;
mod keydescription;
mod provisioning;
