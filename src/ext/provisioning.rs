// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Parser for the provisioning-info extension carried by remotely
//! provisioned attestation certificates: a CBOR map inside an OCTET STRING,
//! of which only key 1 (`certificatesIssued`) is specified.  Unknown keys
//! are ignored.

use super::errors::{ExtensionParsingError, ExtensionParsingReason};
use ciborium::de::from_reader;
use ciborium::Value;
use der::asn1::OctetStringRef;
use der::oid::ObjectIdentifier;
use der::Decode;

/// OID of the provisioning-info extension (non-critical).
pub const PROVISIONING_INFO_EXTENSION_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.11129.2.1.30");

const CERTIFICATES_ISSUED_KEY: i128 = 1;

/// Provisioning statistics recorded by the RKP backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisioningInfoMap {
    /// Number of certificates issued to the device over its lifetime.
    pub certificates_issued: u64,
}

impl ProvisioningInfoMap {
    /// Parses the raw X.509 extension value (OCTET STRING around CBOR).
    pub fn from_extension_value(bytes: &[u8]) -> Result<Self, ExtensionParsingError> {
        let inner = OctetStringRef::from_der(bytes)?;
        Self::from_cbor(inner.as_bytes())
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, ExtensionParsingError> {
        let value: Value = from_reader(bytes)
            .map_err(|e| ExtensionParsingError::new(format!("provisioning info: {e}")))?;

        let contents = match value {
            Value::Map(contents) => contents,
            _ => {
                return Err(ExtensionParsingError::with_reason(
                    "provisioning info: expecting map type",
                    ExtensionParsingReason::MalformedStructure,
                ))
            }
        };

        let mut certificates_issued = None;
        for (k, v) in contents.iter() {
            match k.as_integer() {
                Some(i) if i128::from(i) == CERTIFICATES_ISSUED_KEY => {
                    let n = v.as_integer().and_then(|n| u64::try_from(n).ok()).ok_or(
                        ExtensionParsingError::with_reason(
                            "provisioning info: certificatesIssued is not an unsigned integer",
                            ExtensionParsingReason::MalformedStructure,
                        ),
                    )?;
                    certificates_issued = Some(n);
                }
                _ => continue,
            }
        }

        match certificates_issued {
            Some(certificates_issued) => Ok(Self {
                certificates_issued,
            }),
            None => Err(ExtensionParsingError::with_reason(
                "provisioning info: missing certificatesIssued",
                ExtensionParsingReason::MalformedStructure,
            )),
        }
    }
}
