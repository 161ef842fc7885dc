// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Structural validation of an attestation certificate chain, before any
//! cryptography runs.
//!
//! A well-formed chain is leaf-first: the attested key's certificate, the
//! attestation certificate, one or two intermediates, and a self-issued
//! root.  Exactly one certificate may carry the attestation extension and
//! it must be the leaf; anything else is one of the chain-extension attacks
//! this module exists to reject.

use crate::ext::ATTESTATION_EXTENSION_OID;
use der::oid::ObjectIdentifier;
use der::{Any, Decode};
use num_bigint::BigUint;
use x509_cert::ext::Extension;
use x509_cert::Certificate;

const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_SERIAL_NUMBER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.5");
const OID_ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const OID_TITLE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.12");

/// Why a chain was rejected before path validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainParsingReason {
    /// No certificate in the chain carries the attestation extension.
    TargetMissingAttestationExtension,
    /// The leaf carries the extension but so does a later certificate.
    ChainExtendedWithFakeAttestationExtension,
    /// The extension sits on a non-leaf certificate: the chain was extended
    /// to smuggle an attacker-controlled key in front of it.
    ChainExtendedForKey,
}

/// Structural rejection of a chain.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ChainParsingError {
    pub message: String,
    pub reason: Option<ChainParsingReason>,
}

impl ChainParsingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reason: None,
        }
    }

    fn with_reason(message: impl Into<String>, reason: ChainParsingReason) -> Self {
        Self {
            message: message.into(),
            reason: Some(reason),
        }
    }
}

/// How the attestation key was provisioned, inferred from the intermediate
/// subject.  Informational; never a failure gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningMethod {
    FactoryProvisioned,
    RemotelyProvisioned,
    Unknown,
}

/// One chain element, held both as an openssl handle (for path validation)
/// and as a structural parse (for extension and name access).
#[derive(Debug)]
pub struct ChainCertificate {
    der: Vec<u8>,
    x509: openssl::x509::X509,
    parsed: Certificate,
}

impl ChainCertificate {
    fn parse(position: usize, der: &[u8]) -> Result<Self, ChainParsingError> {
        let x509 = openssl::x509::X509::from_der(der).map_err(|e| {
            ChainParsingError::new(format!("certificate {position} is not valid DER: {e}"))
        })?;
        let parsed = Certificate::from_der(der).map_err(|e| {
            ChainParsingError::new(format!("certificate {position} is not valid DER: {e}"))
        })?;
        Ok(Self {
            der: der.to_vec(),
            x509,
            parsed,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn x509(&self) -> &openssl::x509::X509Ref {
        &self.x509
    }

    pub fn certificate(&self) -> &Certificate {
        &self.parsed
    }

    /// Looks up an extension by OID.
    pub fn extension(&self, oid: &ObjectIdentifier) -> Option<&Extension> {
        self.parsed
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .find(|e| &e.extn_id == oid)
    }

    pub fn has_attestation_extension(&self) -> bool {
        self.extension(&ATTESTATION_EXTENSION_OID).is_some()
    }

    /// The serial number as lowercase hex without leading zeros, the form
    /// used by the revocation status list.
    pub fn serial_hex(&self) -> String {
        BigUint::from_bytes_be(self.parsed.tbs_certificate.serial_number.as_bytes())
            .to_str_radix(16)
    }

    pub fn is_self_issued(&self) -> bool {
        self.parsed.tbs_certificate.subject == self.parsed.tbs_certificate.issuer
    }
}

/// A structurally validated chain, leaf first, root (trust anchor) last.
#[derive(Debug)]
pub struct AttestationChain {
    certificates: Vec<ChainCertificate>,
}

impl AttestationChain {
    /// Applies the shape rules to a leaf-first list of DER certificates.
    pub fn new(chain: &[Vec<u8>]) -> Result<Self, ChainParsingError> {
        if chain.len() < 3 {
            return Err(ChainParsingError::new(
                "At least 3 certificates are required",
            ));
        }

        let certificates = chain
            .iter()
            .enumerate()
            .map(|(i, der)| ChainCertificate::parse(i, der))
            .collect::<Result<Vec<_>, _>>()?;

        let target = certificates
            .iter()
            .rposition(ChainCertificate::has_attestation_extension);
        match target {
            None => {
                return Err(ChainParsingError::with_reason(
                    "Attestation extension not found",
                    ChainParsingReason::TargetMissingAttestationExtension,
                ))
            }
            Some(0) => {}
            Some(_) if certificates[0].has_attestation_extension() => {
                return Err(ChainParsingError::with_reason(
                    "Attestation extension repeated after the leaf",
                    ChainParsingReason::ChainExtendedWithFakeAttestationExtension,
                ))
            }
            Some(_) => {
                return Err(ChainParsingError::with_reason(
                    "Certificate after target certificate",
                    ChainParsingReason::ChainExtendedForKey,
                ))
            }
        }

        if !certificates
            .last()
            .is_some_and(ChainCertificate::is_self_issued)
        {
            return Err(ChainParsingError::new("Root certificate not found"));
        }

        Ok(Self { certificates })
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// All chain elements, leaf first.
    pub fn certificates(&self) -> &[ChainCertificate] {
        &self.certificates
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// The certificate for the attested key.
    pub fn leaf(&self) -> &ChainCertificate {
        &self.certificates[0]
    }

    /// The certificate issued by the factory or RKP CA for the attesting
    /// environment.
    pub fn attestation_cert(&self) -> &ChainCertificate {
        &self.certificates[1]
    }

    /// The certificate directly under the trust anchor.
    pub fn intermediate(&self) -> &ChainCertificate {
        &self.certificates[self.certificates.len() - 2]
    }

    /// The self-issued trust anchor.
    pub fn root(&self) -> &ChainCertificate {
        &self.certificates[self.certificates.len() - 1]
    }

    /// Everything that goes into path validation: the anchor itself is the
    /// trust input, not part of the validated path.
    pub fn certificates_without_anchor(&self) -> &[ChainCertificate] {
        &self.certificates[..self.certificates.len() - 1]
    }

    /// Infers the provisioning method from the intermediate subject.  RDNs
    /// are matched by attribute-type OID, so escaped commas or reordered
    /// components in a rendered DN cannot confuse the match.
    pub fn provisioning_method(&self) -> ProvisioningMethod {
        let subject = &self.intermediate().parsed.tbs_certificate.subject;

        let mut has_serial_number = false;
        let mut title: Option<String> = None;
        let mut common_name: Option<String> = None;
        let mut organization: Option<String> = None;
        for rdn in subject.0.iter() {
            for atv in rdn.0.iter() {
                if atv.oid == OID_SERIAL_NUMBER {
                    has_serial_number = true;
                } else if atv.oid == OID_TITLE {
                    title = directory_string(&atv.value);
                } else if atv.oid == OID_COMMON_NAME {
                    common_name = directory_string(&atv.value);
                } else if atv.oid == OID_ORGANIZATION {
                    organization = directory_string(&atv.value);
                }
            }
        }

        if has_serial_number && matches!(title.as_deref(), Some("TEE") | Some("StrongBox")) {
            ProvisioningMethod::FactoryProvisioned
        } else if common_name.as_deref() == Some("Droid CA2")
            && organization.as_deref() == Some("Google LLC")
        {
            ProvisioningMethod::RemotelyProvisioned
        } else {
            ProvisioningMethod::Unknown
        }
    }
}

fn directory_string(value: &Any) -> Option<String> {
    if let Ok(s) = value.decode_as::<der::asn1::Utf8StringRef>() {
        return Some(s.to_string());
    }
    if let Ok(s) = value.decode_as::<der::asn1::PrintableStringRef>() {
        return Some(s.to_string());
    }
    if let Ok(s) = value.decode_as::<der::asn1::Ia5StringRef>() {
        return Some(s.to_string());
    }
    None
}
