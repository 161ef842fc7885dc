// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::constraints::ConstraintViolationReason;
use crate::chain::{ChainParsingError, PathValidationError};
use crate::ext::{
    AuthorizationList, ExtensionParsingError, ProvisioningInfoMap, SecurityLevel,
    VerifiedBootState,
};
use crate::log::VerificationLog;
use openssl::pkey::{PKey, Public};
use std::collections::BTreeSet;
use std::fmt;

/// Device identity attested by the hardware-enforced authorization list.
/// Fields are absent when the corresponding attestation id was not included
/// (or was not valid UTF-8, which is logged and dropped).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceIdentity {
    pub brand: Option<String>,
    pub device: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
    pub imeis: BTreeSet<String>,
    pub meid: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
}

impl DeviceIdentity {
    pub(crate) fn from_authorizations(
        hardware_enforced: &AuthorizationList,
        log: &dyn VerificationLog,
    ) -> Self {
        let field = |name: &str, bytes: &Option<Vec<u8>>| -> Option<String> {
            let bytes = bytes.as_ref()?;
            match String::from_utf8(bytes.clone()) {
                Ok(s) => Some(s),
                Err(_) => {
                    log.log_info_message(&format!(
                        "attestation id {name} is not valid UTF-8, dropping"
                    ));
                    None
                }
            }
        };

        let mut imeis = BTreeSet::new();
        for (name, bytes) in [
            ("imei", &hardware_enforced.attestation_id_imei),
            ("secondImei", &hardware_enforced.attestation_id_second_imei),
        ] {
            if let Some(imei) = field(name, bytes) {
                imeis.insert(imei);
            }
        }

        Self {
            brand: field("brand", &hardware_enforced.attestation_id_brand),
            device: field("device", &hardware_enforced.attestation_id_device),
            product: field("product", &hardware_enforced.attestation_id_product),
            serial: field("serial", &hardware_enforced.attestation_id_serial),
            imeis,
            meid: field("meid", &hardware_enforced.attestation_id_meid),
            manufacturer: field(
                "manufacturer",
                &hardware_enforced.attestation_id_manufacturer,
            ),
            model: field("model", &hardware_enforced.attestation_id_model),
        }
    }
}

/// A verified attestation: the chain is genuine, the extension parsed and
/// every configured constraint held.
#[derive(Clone)]
pub struct Success {
    /// The attested public key, as established by the validated path.
    pub public_key: PKey<Public>,
    /// The challenge embedded in the attestation.
    pub challenge: Vec<u8>,
    /// The (consistent) security level of the attesting environment.
    pub security_level: SecurityLevel,
    /// Boot state from the root of trust, when one was attested.
    pub verified_boot_state: Option<VerifiedBootState>,
    /// Provisioning statistics, for remotely provisioned chains that carry
    /// a parseable provisioning-info extension.
    pub device_information: Option<ProvisioningInfoMap>,
    /// Identifiers of the attested device.
    pub attested_device_ids: DeviceIdentity,
}

impl fmt::Debug for Success {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Success")
            .field("challenge", &hex::encode(&self.challenge))
            .field("security_level", &self.security_level)
            .field("verified_boot_state", &self.verified_boot_state)
            .field("device_information", &self.device_information)
            .field("attested_device_ids", &self.attested_device_ids)
            .finish_non_exhaustive()
    }
}

/// Every possible outcome of a verification.  `verify` never fails in any
/// other way: all errors are folded into one of these variants.
#[derive(Debug)]
pub enum VerificationResult {
    Success(Success),
    /// The challenge checker rejected the attestation challenge.
    ChallengeMismatch,
    /// PKIX rejected the chain (including revocation).
    PathValidationFailure(PathValidationError),
    /// The chain is structurally unacceptable.
    ChainParsingFailure(ChainParsingError),
    /// The leaf's KeyDescription could not be parsed.
    ExtensionParsingFailure(ExtensionParsingError),
    /// The KeyDescription parsed but violated a configured constraint.
    ExtensionConstraintViolation {
        description: String,
        reason: ConstraintViolationReason,
    },
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationResult::Success(_))
    }
}
