// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Parser and encoder for the KeyDescription attestation extension.
//!
//! ```asn1
//! KeyDescription ::= SEQUENCE {
//!     attestationVersion         INTEGER,
//!     attestationSecurityLevel   SecurityLevel,
//!     keyMintVersion             INTEGER,
//!     keyMintSecurityLevel       SecurityLevel,
//!     attestationChallenge       OCTET_STRING,
//!     uniqueId                   OCTET_STRING,
//!     softwareEnforced           AuthorizationList,
//!     hardwareEnforced           AuthorizationList,
//! }
//! ```
//!
//! The X.509 extension value wraps this SEQUENCE in an OCTET STRING.

use super::asn;
use super::authorizations::AuthorizationList;
use super::errors::{ExtensionParsingError, ExtensionParsingReason};
use crate::log::VerificationLog;
use der::asn1::OctetStringRef;
use der::oid::ObjectIdentifier;
use der::{Decode, Encode, Header, Reader, SliceReader, Tag};
use num_bigint::BigUint;

/// OID of the Android key attestation extension (non-critical).
pub const ATTESTATION_EXTENSION_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.11129.2.1.17");

/// Where the key material lives and how strongly it is protected.
///
/// ```asn1
/// SecurityLevel ::= ENUMERATED {
///     Software                   (0),
///     TrustedEnvironment         (1),
///     StrongBox                  (2),
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    Software,
    TrustedEnvironment,
    StrongBox,
}

impl SecurityLevel {
    pub(crate) fn to_value(self) -> u32 {
        match self {
            SecurityLevel::Software => 0,
            SecurityLevel::TrustedEnvironment => 1,
            SecurityLevel::StrongBox => 2,
        }
    }
}

impl TryFrom<u32> for SecurityLevel {
    type Error = ExtensionParsingError;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(SecurityLevel::Software),
            1 => Ok(SecurityLevel::TrustedEnvironment),
            2 => Ok(SecurityLevel::StrongBox),
            _ => Err(ExtensionParsingError::with_reason(
                format!("unknown security level {v}"),
                ExtensionParsingReason::UnknownEnumValue,
            )),
        }
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SecurityLevel::Software => "SOFTWARE",
            SecurityLevel::TrustedEnvironment => "TRUSTED_ENVIRONMENT",
            SecurityLevel::StrongBox => "STRONG_BOX",
        };
        f.write_str(s)
    }
}

/// The fully parsed attestation extension.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyDescription {
    pub attestation_version: BigUint,
    pub attestation_security_level: SecurityLevel,
    pub keymint_version: BigUint,
    pub keymint_security_level: SecurityLevel,
    pub attestation_challenge: Vec<u8>,
    pub unique_id: Vec<u8>,
    pub software_enforced: AuthorizationList,
    pub hardware_enforced: AuthorizationList,
}

impl KeyDescription {
    /// Parses the raw X.509 extension value, i.e. the OCTET STRING that
    /// wraps the KeyDescription SEQUENCE.
    pub fn from_extension_value(
        bytes: &[u8],
        log: &dyn VerificationLog,
    ) -> Result<Self, ExtensionParsingError> {
        let inner = OctetStringRef::from_der(bytes)?;
        Self::from_der(inner.as_bytes(), log)
    }

    /// Parses the KeyDescription SEQUENCE itself.  Total: any byte input
    /// yields either a value or an [`ExtensionParsingError`] with a
    /// specific reason.
    pub fn from_der(
        bytes: &[u8],
        log: &dyn VerificationLog,
    ) -> Result<Self, ExtensionParsingError> {
        let mut outer = SliceReader::new(bytes)?;
        let header = Header::decode(&mut outer)?;
        if header.tag != Tag::Sequence {
            return Err(asn::type_mismatch("SEQUENCE", header.tag));
        }
        let body = outer.read_slice(header.length)?;
        if !outer.is_finished() {
            return Err(ExtensionParsingError::with_reason(
                "trailing data after KeyDescription",
                ExtensionParsingReason::WrongArity,
            ));
        }

        let mut reader = SliceReader::new(body)?;
        let attestation_version = asn::uint_from_tlv(element(&mut reader, 1)?)?;
        let attestation_security_level =
            SecurityLevel::try_from(asn::enumerated_from_tlv(element(&mut reader, 2)?)?)?;
        let keymint_version = asn::uint_from_tlv(element(&mut reader, 3)?)?;
        let keymint_security_level =
            SecurityLevel::try_from(asn::enumerated_from_tlv(element(&mut reader, 4)?)?)?;
        let attestation_challenge = asn::octet_string_from_tlv(element(&mut reader, 5)?)?;
        let unique_id = asn::octet_string_from_tlv(element(&mut reader, 6)?)?;
        require_more(&reader, 7)?;
        let software_enforced =
            AuthorizationList::decode_from(&mut reader, "softwareEnforced", log)?;
        require_more(&reader, 8)?;
        let hardware_enforced =
            AuthorizationList::decode_from(&mut reader, "hardwareEnforced", log)?;
        if !reader.is_finished() {
            return Err(ExtensionParsingError::with_reason(
                "KeyDescription has more than 8 elements",
                ExtensionParsingReason::WrongArity,
            ));
        }

        Ok(Self {
            attestation_version,
            attestation_security_level,
            keymint_version,
            keymint_security_level,
            attestation_challenge,
            unique_id,
            software_enforced,
            hardware_enforced,
        })
    }

    /// Encodes the KeyDescription SEQUENCE.  Authorization-list fields are
    /// emitted in canonical tag order, so parse∘encode is the identity on
    /// everything the parser retains.
    pub fn to_der(&self) -> Result<Vec<u8>, ExtensionParsingError> {
        let mut body = Vec::new();
        asn::encode_uint(&self.attestation_version, &mut body)?;
        asn::encode_enumerated(self.attestation_security_level.to_value(), &mut body)?;
        asn::encode_uint(&self.keymint_version, &mut body)?;
        asn::encode_enumerated(self.keymint_security_level.to_value(), &mut body)?;
        OctetStringRef::new(&self.attestation_challenge)?.encode(&mut body)?;
        OctetStringRef::new(&self.unique_id)?.encode(&mut body)?;
        body.extend_from_slice(&self.software_enforced.to_der()?);
        body.extend_from_slice(&self.hardware_enforced.to_der()?);

        let mut out = Vec::new();
        asn::encode_tlv(Tag::Sequence, &body, &mut out)?;
        Ok(out)
    }

    /// Encodes the extension value as placed in a certificate: the
    /// SEQUENCE wrapped in an OCTET STRING.
    pub fn to_extension_value(&self) -> Result<Vec<u8>, ExtensionParsingError> {
        Ok(OctetStringRef::new(&self.to_der()?)?.to_der()?)
    }
}

fn element<'a>(
    reader: &mut SliceReader<'a>,
    index: usize,
) -> Result<&'a [u8], ExtensionParsingError> {
    require_more(reader, index)?;
    Ok(reader.tlv_bytes()?)
}

fn require_more(reader: &SliceReader<'_>, index: usize) -> Result<(), ExtensionParsingError> {
    if reader.is_finished() {
        return Err(ExtensionParsingError::with_reason(
            format!("KeyDescription has {} elements, expecting 8", index - 1),
            ExtensionParsingReason::WrongArity,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ext::authorizations::{RootOfTrust, VerifiedBootState};
    use crate::log::NopLog;
    use hex_literal::hex;

    // The keymint reference encoding: version 300, TrustedEnvironment,
    // challenge "abc", unique id "xxx", empty softwareEnforced,
    // hardwareEnforced with algorithm=3 and a RootOfTrust.
    const REFERENCE: [u8; 115] = hex!(
        "3071"
        "0202012c"
        "0a0101"
        "0202012c"
        "0a0101"
        "0403616263"
        "0403787878"
        "3000"
        "3055"
        "a203020103"
        "bf85404c"
        "304a"
        "0420bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
        "010100"
        "0a0102"
        "0420eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"
    );

    #[test]
    fn parse_reference_vector() {
        let kd = KeyDescription::from_der(&REFERENCE, &NopLog).unwrap();
        assert_eq!(kd.attestation_version, BigUint::from(300u32));
        assert_eq!(
            kd.attestation_security_level,
            SecurityLevel::TrustedEnvironment
        );
        assert_eq!(kd.keymint_version, BigUint::from(300u32));
        assert_eq!(kd.attestation_challenge, b"abc");
        assert_eq!(kd.unique_id, b"xxx");
        assert_eq!(kd.software_enforced, Default::default());
        assert_eq!(kd.hardware_enforced.algorithm, Some(3));
        assert_eq!(
            kd.hardware_enforced.root_of_trust,
            Some(RootOfTrust {
                verified_boot_key: vec![0xbb; 32],
                device_locked: false,
                verified_boot_state: VerifiedBootState::Unverified,
                verified_boot_hash: Some(vec![0xee; 32]),
            })
        );
    }

    #[test]
    fn encode_matches_reference_vector() {
        let kd = KeyDescription::from_der(&REFERENCE, &NopLog).unwrap();
        assert_eq!(kd.to_der().unwrap(), REFERENCE);
    }

    #[test]
    fn extension_value_round_trip() {
        let kd = KeyDescription::from_der(&REFERENCE, &NopLog).unwrap();
        let wrapped = kd.to_extension_value().unwrap();
        let back = KeyDescription::from_extension_value(&wrapped, &NopLog).unwrap();
        assert_eq!(back, kd);
    }

    #[test]
    fn wrong_arity_is_reported() {
        // SEQUENCE with only the first two elements
        let e = KeyDescription::from_der(&hex!("30070202012c0a0101"), &NopLog).unwrap_err();
        assert_eq!(e.reason, Some(ExtensionParsingReason::WrongArity));
    }

    #[test]
    fn ninth_element_is_rejected() {
        let mut body = REFERENCE[2..].to_vec();
        body.extend_from_slice(&hex!("020100"));
        let mut seq = Vec::new();
        asn::encode_tlv(Tag::Sequence, &body, &mut seq).unwrap();
        let e = KeyDescription::from_der(&seq, &NopLog).unwrap_err();
        assert_eq!(e.reason, Some(ExtensionParsingReason::WrongArity));
    }

    #[test]
    fn unknown_security_level_discriminant() {
        let mut altered = REFERENCE;
        // attestationSecurityLevel value octet
        altered[8] = 7;
        let e = KeyDescription::from_der(&altered, &NopLog).unwrap_err();
        assert_eq!(e.reason, Some(ExtensionParsingReason::UnknownEnumValue));
    }

    #[test]
    fn parse_is_total_on_garbage() {
        for bytes in [&b""[..], &[0x30][..], &[0xff; 64][..]] {
            KeyDescription::from_der(bytes, &NopLog).unwrap_err();
        }
    }
}
