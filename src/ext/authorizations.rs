// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The `AuthorizationList` half of the attestation extension: an open record
//! of optional fields identified by KeyMint tag numbers, together with the
//! nested structures it can carry (RootOfTrust, AttestationApplicationId)
//! and the patch-level convention.
//!
//! ```asn1
//! AuthorizationList ::= SEQUENCE {
//!     purpose                    [1] EXPLICIT SET OF INTEGER OPTIONAL,
//!     algorithm                  [2] EXPLICIT INTEGER OPTIONAL,
//!     ...
//!     moduleHash                 [724] EXPLICIT OCTET_STRING OPTIONAL,
//! }
//! ```
//!
//! All fields are optional and context-tagged with the stable KeyMint tag
//! id.  A conformant encoder emits them in ascending tag order; a list that
//! violates that is still parsed but flagged via [`AuthorizationList::are_tags_ordered`].

use super::asn;
use super::errors::{ExtensionParsingError, ExtensionParsingReason};
use crate::log::VerificationLog;
use der::asn1::OctetStringRef;
use der::{Decode, Encode, Header, Reader, SliceReader, Tag};
use std::collections::BTreeSet;

pub(crate) const TAG_PURPOSE: u32 = 1;
pub(crate) const TAG_ALGORITHM: u32 = 2;
pub(crate) const TAG_KEY_SIZE: u32 = 3;
pub(crate) const TAG_BLOCK_MODE: u32 = 4;
pub(crate) const TAG_DIGEST: u32 = 5;
pub(crate) const TAG_PADDING: u32 = 6;
pub(crate) const TAG_CALLER_NONCE: u32 = 7;
pub(crate) const TAG_MIN_MAC_LENGTH: u32 = 8;
pub(crate) const TAG_EC_CURVE: u32 = 10;
pub(crate) const TAG_RSA_PUBLIC_EXPONENT: u32 = 200;
pub(crate) const TAG_MGF_DIGEST: u32 = 203;
pub(crate) const TAG_ROLLBACK_RESISTANCE: u32 = 303;
pub(crate) const TAG_EARLY_BOOT_ONLY: u32 = 305;
pub(crate) const TAG_ACTIVE_DATE_TIME: u32 = 400;
pub(crate) const TAG_ORIGINATION_EXPIRE_DATE_TIME: u32 = 401;
pub(crate) const TAG_USAGE_EXPIRE_DATE_TIME: u32 = 402;
pub(crate) const TAG_USAGE_COUNT_LIMIT: u32 = 405;
pub(crate) const TAG_USER_SECURE_ID: u32 = 502;
pub(crate) const TAG_NO_AUTH_REQUIRED: u32 = 503;
pub(crate) const TAG_USER_AUTH_TYPE: u32 = 504;
pub(crate) const TAG_AUTH_TIMEOUT: u32 = 505;
pub(crate) const TAG_ALLOW_WHILE_ON_BODY: u32 = 506;
pub(crate) const TAG_TRUSTED_USER_PRESENCE_REQUIRED: u32 = 507;
pub(crate) const TAG_TRUSTED_CONFIRMATION_REQUIRED: u32 = 508;
pub(crate) const TAG_UNLOCKED_DEVICE_REQUIRED: u32 = 509;
pub(crate) const TAG_CREATION_DATE_TIME: u32 = 701;
pub(crate) const TAG_ORIGIN: u32 = 702;
pub(crate) const TAG_ROOT_OF_TRUST: u32 = 704;
pub(crate) const TAG_OS_VERSION: u32 = 705;
pub(crate) const TAG_OS_PATCH_LEVEL: u32 = 706;
pub(crate) const TAG_ATTESTATION_APPLICATION_ID: u32 = 709;
pub(crate) const TAG_ATTESTATION_ID_BRAND: u32 = 710;
pub(crate) const TAG_ATTESTATION_ID_DEVICE: u32 = 711;
pub(crate) const TAG_ATTESTATION_ID_PRODUCT: u32 = 712;
pub(crate) const TAG_ATTESTATION_ID_SERIAL: u32 = 713;
pub(crate) const TAG_ATTESTATION_ID_IMEI: u32 = 714;
pub(crate) const TAG_ATTESTATION_ID_MEID: u32 = 715;
pub(crate) const TAG_ATTESTATION_ID_MANUFACTURER: u32 = 716;
pub(crate) const TAG_ATTESTATION_ID_MODEL: u32 = 717;
pub(crate) const TAG_VENDOR_PATCH_LEVEL: u32 = 718;
pub(crate) const TAG_BOOT_PATCH_LEVEL: u32 = 719;
pub(crate) const TAG_DEVICE_UNIQUE_ATTESTATION: u32 = 720;
pub(crate) const TAG_ATTESTATION_ID_SECOND_IMEI: u32 = 723;
pub(crate) const TAG_MODULE_HASH: u32 = 724;

/// Origin of the attested key material (KeyMint `Tag::ORIGIN` values).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    Generated,
    Derived,
    Imported,
    Reserved,
    SecurelyImported,
}

impl KeyOrigin {
    pub(crate) fn to_value(self) -> i64 {
        match self {
            KeyOrigin::Generated => 0,
            KeyOrigin::Derived => 1,
            KeyOrigin::Imported => 2,
            KeyOrigin::Reserved => 3,
            KeyOrigin::SecurelyImported => 4,
        }
    }
}

impl TryFrom<i64> for KeyOrigin {
    type Error = ExtensionParsingError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(KeyOrigin::Generated),
            1 => Ok(KeyOrigin::Derived),
            2 => Ok(KeyOrigin::Imported),
            3 => Ok(KeyOrigin::Reserved),
            4 => Ok(KeyOrigin::SecurelyImported),
            _ => Err(ExtensionParsingError::with_reason(
                format!("unknown key origin {v}"),
                ExtensionParsingReason::UnknownEnumValue,
            )),
        }
    }
}

/// Boot verification outcome reported by the root of trust.
///
/// ```asn1
/// VerifiedBootState ::= ENUMERATED {
///     Verified                   (0),
///     SelfSigned                 (1),
///     Unverified                 (2),
///     Failed                     (3),
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifiedBootState {
    Verified,
    SelfSigned,
    Unverified,
    Failed,
}

impl VerifiedBootState {
    pub(crate) fn to_value(self) -> u32 {
        match self {
            VerifiedBootState::Verified => 0,
            VerifiedBootState::SelfSigned => 1,
            VerifiedBootState::Unverified => 2,
            VerifiedBootState::Failed => 3,
        }
    }
}

impl TryFrom<u32> for VerifiedBootState {
    type Error = ExtensionParsingError;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(VerifiedBootState::Verified),
            1 => Ok(VerifiedBootState::SelfSigned),
            2 => Ok(VerifiedBootState::Unverified),
            3 => Ok(VerifiedBootState::Failed),
            _ => Err(ExtensionParsingError::with_reason(
                format!("unknown verified boot state {v}"),
                ExtensionParsingReason::UnknownEnumValue,
            )),
        }
    }
}

/// Boot-verified identity of the device.
///
/// ```asn1
/// RootOfTrust ::= SEQUENCE {
///     verifiedBootKey            OCTET_STRING,
///     deviceLocked               BOOLEAN,
///     verifiedBootState          VerifiedBootState,
///     verifiedBootHash           OCTET_STRING OPTIONAL,
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootOfTrust {
    pub verified_boot_key: Vec<u8>,
    pub device_locked: bool,
    pub verified_boot_state: VerifiedBootState,
    pub verified_boot_hash: Option<Vec<u8>>,
}

impl RootOfTrust {
    fn from_tlv(tlv: &[u8]) -> Result<Self, ExtensionParsingError> {
        let body = sequence_body(tlv)?;
        let mut reader = SliceReader::new(body)?;
        let verified_boot_key = OctetStringRef::decode(&mut reader)?.as_bytes().to_vec();
        let device_locked = bool::decode(&mut reader)?;
        let verified_boot_state =
            VerifiedBootState::try_from(asn::enumerated_from_tlv(reader.tlv_bytes()?)?)?;
        let verified_boot_hash = if reader.is_finished() {
            None
        } else {
            Some(OctetStringRef::decode(&mut reader)?.as_bytes().to_vec())
        };
        if !reader.is_finished() {
            return Err(ExtensionParsingError::with_reason(
                "RootOfTrust with more than 4 elements",
                ExtensionParsingReason::WrongArity,
            ));
        }
        Ok(Self {
            verified_boot_key,
            device_locked,
            verified_boot_state,
            verified_boot_hash,
        })
    }

    pub(crate) fn to_der(&self) -> der::Result<Vec<u8>> {
        let mut body = Vec::new();
        OctetStringRef::new(&self.verified_boot_key)?.encode(&mut body)?;
        self.device_locked.encode(&mut body)?;
        asn::encode_enumerated(self.verified_boot_state.to_value(), &mut body)?;
        if let Some(hash) = &self.verified_boot_hash {
            OctetStringRef::new(hash)?.encode(&mut body)?;
        }
        let mut out = Vec::new();
        asn::encode_tlv(Tag::Sequence, &body, &mut out)?;
        Ok(out)
    }
}

/// One package attested by the platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AttestationPackageInfo {
    pub name: String,
    pub version: i64,
}

/// The Android application(s) on whose behalf the key was created.
///
/// ```asn1
/// AttestationApplicationId ::= SEQUENCE {
///     packageInfos               SET OF AttestationPackageInfo,
///     signatureDigests           SET OF OCTET_STRING,
/// }
/// AttestationPackageInfo ::= SEQUENCE {
///     packageName                OCTET_STRING,
///     version                    INTEGER,
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttestationApplicationId {
    pub packages: BTreeSet<AttestationPackageInfo>,
    pub signatures: BTreeSet<Vec<u8>>,
}

impl AttestationApplicationId {
    /// Parses the field value: an OCTET STRING wrapping the DER structure.
    fn from_tlv(tlv: &[u8]) -> Result<Self, ExtensionParsingError> {
        let inner = asn::octet_string_from_tlv(tlv)?;
        Self::from_der(&inner)
    }

    pub(crate) fn from_der(bytes: &[u8]) -> Result<Self, ExtensionParsingError> {
        let body = sequence_body(bytes)?;
        let mut reader = SliceReader::new(body)?;
        let package_set = reader.tlv_bytes()?;
        let signature_set = reader.tlv_bytes()?;
        if !reader.is_finished() {
            return Err(ExtensionParsingError::with_reason(
                "AttestationApplicationId with more than 2 elements",
                ExtensionParsingReason::WrongArity,
            ));
        }

        let mut packages = BTreeSet::new();
        for element in asn::set_elements_from_tlv(package_set)? {
            let body = sequence_body(element)?;
            let mut r = SliceReader::new(body)?;
            let name = asn::utf8_from_bytes(OctetStringRef::decode(&mut r)?.as_bytes())?;
            let version = i64::decode(&mut r)?;
            if !r.is_finished() {
                return Err(ExtensionParsingError::with_reason(
                    "AttestationPackageInfo with more than 2 elements",
                    ExtensionParsingReason::WrongArity,
                ));
            }
            packages.insert(AttestationPackageInfo { name, version });
        }

        let mut signatures = BTreeSet::new();
        for element in asn::set_elements_from_tlv(signature_set)? {
            signatures.insert(asn::octet_string_from_tlv(element)?);
        }

        Ok(Self {
            packages,
            signatures,
        })
    }

    pub(crate) fn to_der(&self) -> der::Result<Vec<u8>> {
        let mut package_elements = Vec::new();
        for p in &self.packages {
            let mut body = Vec::new();
            OctetStringRef::new(p.name.as_bytes())?.encode(&mut body)?;
            p.version.encode(&mut body)?;
            let mut element = Vec::new();
            asn::encode_tlv(Tag::Sequence, &body, &mut element)?;
            package_elements.push(element);
        }
        let mut signature_elements = Vec::new();
        for s in &self.signatures {
            signature_elements.push(OctetStringRef::new(s)?.to_der()?);
        }

        let mut body = Vec::new();
        asn::encode_set_of(package_elements, &mut body)?;
        asn::encode_set_of(signature_elements, &mut body)?;
        let mut out = Vec::new();
        asn::encode_tlv(Tag::Sequence, &body, &mut out)?;
        Ok(out)
    }
}

/// A security patch level: year and month, with the day present only in the
/// eight-digit (`yyyyMMdd`) source form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchLevel {
    pub year: u16,
    pub month: u8,
    pub day: Option<u8>,
}

impl PatchLevel {
    /// Interprets a raw integer as `yyyyMM` or `yyyyMMdd`.  Any other width
    /// is not a patch level.
    pub fn from_value(v: i64) -> Option<Self> {
        match v {
            100_000..=999_999 => Some(Self {
                year: (v / 100) as u16,
                month: (v % 100) as u8,
                day: None,
            }),
            10_000_000..=99_999_999 => Some(Self {
                year: (v / 10_000) as u16,
                month: ((v / 100) % 100) as u8,
                day: Some((v % 100) as u8),
            }),
            _ => None,
        }
    }

    pub fn to_value(self) -> i64 {
        match self.day {
            None => i64::from(self.year) * 100 + i64::from(self.month),
            Some(day) => {
                i64::from(self.year) * 10_000 + i64::from(self.month) * 100 + i64::from(day)
            }
        }
    }
}

impl std::fmt::Display for PatchLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.day {
            None => write!(f, "{:04}-{:02}", self.year, self.month),
            Some(day) => write!(f, "{:04}-{:02}-{:02}", self.year, self.month, day),
        }
    }
}

/// An authorization list as carried in the attestation extension: every
/// field optional, identified by its KeyMint tag.
///
/// Boolean fields carry truth by presence alone (`true` when the tag was
/// emitted); an explicit FALSE on the wire is rejected during parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationList {
    pub purpose: Option<BTreeSet<i64>>,
    pub algorithm: Option<i64>,
    pub key_size: Option<i64>,
    pub block_mode: Option<BTreeSet<i64>>,
    pub digest: Option<BTreeSet<i64>>,
    pub padding: Option<BTreeSet<i64>>,
    pub caller_nonce: bool,
    pub min_mac_length: Option<i64>,
    pub ec_curve: Option<i64>,
    pub rsa_public_exponent: Option<i64>,
    pub mgf_digest: Option<BTreeSet<i64>>,
    pub rollback_resistance: bool,
    pub early_boot_only: bool,
    pub active_date_time: Option<i64>,
    pub origination_expire_date_time: Option<i64>,
    pub usage_expire_date_time: Option<i64>,
    pub usage_count_limit: Option<i64>,
    pub user_secure_id: Option<i64>,
    pub no_auth_required: bool,
    pub user_auth_type: Option<i64>,
    pub auth_timeout: Option<i64>,
    pub allow_while_on_body: bool,
    pub trusted_user_presence_required: bool,
    pub trusted_confirmation_required: bool,
    pub unlocked_device_required: bool,
    pub creation_date_time: Option<i64>,
    pub origin: Option<KeyOrigin>,
    pub root_of_trust: Option<RootOfTrust>,
    pub os_version: Option<i64>,
    pub os_patch_level: Option<PatchLevel>,
    pub attestation_application_id: Option<AttestationApplicationId>,
    pub attestation_id_brand: Option<Vec<u8>>,
    pub attestation_id_device: Option<Vec<u8>>,
    pub attestation_id_product: Option<Vec<u8>>,
    pub attestation_id_serial: Option<Vec<u8>>,
    pub attestation_id_imei: Option<Vec<u8>>,
    pub attestation_id_meid: Option<Vec<u8>>,
    pub attestation_id_manufacturer: Option<Vec<u8>>,
    pub attestation_id_model: Option<Vec<u8>>,
    pub vendor_patch_level: Option<PatchLevel>,
    pub boot_patch_level: Option<PatchLevel>,
    pub device_unique_attestation: bool,
    pub attestation_id_second_imei: Option<Vec<u8>>,
    pub module_hash: Option<Vec<u8>>,
    /// Whether the tags were emitted in strictly ascending order.  An
    /// observation, not a parse failure; the constraint engine can be
    /// configured to act on it.
    pub are_tags_ordered: bool,
}

impl Default for AuthorizationList {
    fn default() -> Self {
        Self {
            purpose: None,
            algorithm: None,
            key_size: None,
            block_mode: None,
            digest: None,
            padding: None,
            caller_nonce: false,
            min_mac_length: None,
            ec_curve: None,
            rsa_public_exponent: None,
            mgf_digest: None,
            rollback_resistance: false,
            early_boot_only: false,
            active_date_time: None,
            origination_expire_date_time: None,
            usage_expire_date_time: None,
            usage_count_limit: None,
            user_secure_id: None,
            no_auth_required: false,
            user_auth_type: None,
            auth_timeout: None,
            allow_while_on_body: false,
            trusted_user_presence_required: false,
            trusted_confirmation_required: false,
            unlocked_device_required: false,
            creation_date_time: None,
            origin: None,
            root_of_trust: None,
            os_version: None,
            os_patch_level: None,
            attestation_application_id: None,
            attestation_id_brand: None,
            attestation_id_device: None,
            attestation_id_product: None,
            attestation_id_serial: None,
            attestation_id_imei: None,
            attestation_id_meid: None,
            attestation_id_manufacturer: None,
            attestation_id_model: None,
            vendor_patch_level: None,
            boot_patch_level: None,
            device_unique_attestation: false,
            attestation_id_second_imei: None,
            module_hash: None,
            are_tags_ordered: true,
        }
    }
}

fn sequence_body(tlv: &[u8]) -> Result<&[u8], ExtensionParsingError> {
    let mut reader = SliceReader::new(tlv)?;
    let header = Header::decode(&mut reader)?;
    if header.tag != Tag::Sequence {
        return Err(asn::type_mismatch("SEQUENCE", header.tag));
    }
    let body = reader.read_slice(header.length)?;
    if !reader.is_finished() {
        return Err(ExtensionParsingError::with_reason(
            "trailing data after SEQUENCE",
            ExtensionParsingReason::MalformedDer,
        ));
    }
    Ok(body)
}

/// Recovers from a per-field parse error on an optional scalar field:
/// the field becomes absent and the oddity is reported through the log
/// hook.  A forbidden FALSE stays fatal.
fn recover<T>(
    which: &str,
    tag: u32,
    result: Result<T, ExtensionParsingError>,
    log: &dyn VerificationLog,
) -> Result<Option<T>, ExtensionParsingError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.reason == Some(ExtensionParsingReason::ForbiddenBooleanValue) => Err(e),
        Err(e) => {
            log.log_info_message(&format!(
                "{which}: dropping unparseable value for tag {tag}: {e}"
            ));
            Ok(None)
        }
    }
}

/// Same recovery for presence-only boolean fields: an unparseable value
/// degrades to absence (false), while an explicit FALSE remains fatal.
fn recover_flag(
    which: &str,
    tag: u32,
    result: Result<bool, ExtensionParsingError>,
    log: &dyn VerificationLog,
) -> Result<bool, ExtensionParsingError> {
    Ok(recover(which, tag, result, log)?.unwrap_or(false))
}

impl AuthorizationList {
    /// Decodes one `AuthorizationList` SEQUENCE off the reader.  `which`
    /// names the list ("softwareEnforced" / "hardwareEnforced") in
    /// diagnostics.
    pub(crate) fn decode_from<'a, R: Reader<'a>>(
        reader: &mut R,
        which: &str,
        log: &dyn VerificationLog,
    ) -> Result<Self, ExtensionParsingError> {
        let header = Header::decode(reader)?;
        if header.tag != Tag::Sequence {
            return Err(asn::type_mismatch("SEQUENCE", header.tag));
        }
        let body = reader.read_slice(header.length)?;

        let mut list = AuthorizationList::default();
        let mut reader = SliceReader::new(body)?;
        let mut previous: Option<u32> = None;
        while let Some(tag) = asn::read_context_tag(&mut reader)? {
            let value = asn::read_tagged_body(&mut reader)?;
            if let Some(p) = previous {
                if tag <= p && list.are_tags_ordered {
                    list.are_tags_ordered = false;
                    log.log_info_message(&format!(
                        "{which}: tag {tag} encoded out of order (follows {p})"
                    ));
                }
            }
            previous = Some(tag);
            list.apply(tag, value, which, log)?;
        }
        Ok(list)
    }

    /// Routes one tagged value to its field.  A repeated tag overwrites the
    /// earlier occurrence; an unknown tag number is fatal.
    fn apply(
        &mut self,
        tag: u32,
        value: &[u8],
        which: &str,
        log: &dyn VerificationLog,
    ) -> Result<(), ExtensionParsingError> {
        match tag {
            TAG_PURPOSE => self.purpose = recover(which, tag, asn::int_set_from_tlv(value), log)?,
            TAG_ALGORITHM => self.algorithm = recover(which, tag, asn::int_from_tlv(value), log)?,
            TAG_KEY_SIZE => self.key_size = recover(which, tag, asn::int_from_tlv(value), log)?,
            TAG_BLOCK_MODE => {
                self.block_mode = recover(which, tag, asn::int_set_from_tlv(value), log)?
            }
            TAG_DIGEST => self.digest = recover(which, tag, asn::int_set_from_tlv(value), log)?,
            TAG_PADDING => self.padding = recover(which, tag, asn::int_set_from_tlv(value), log)?,
            TAG_CALLER_NONCE => {
                self.caller_nonce = recover_flag(which, tag, asn::bool_presence_from_tlv(value), log)?
            }
            TAG_MIN_MAC_LENGTH => {
                self.min_mac_length = recover(which, tag, asn::int_from_tlv(value), log)?
            }
            TAG_EC_CURVE => self.ec_curve = recover(which, tag, asn::int_from_tlv(value), log)?,
            TAG_RSA_PUBLIC_EXPONENT => {
                self.rsa_public_exponent = recover(which, tag, asn::int_from_tlv(value), log)?
            }
            TAG_MGF_DIGEST => {
                self.mgf_digest = recover(which, tag, asn::int_set_from_tlv(value), log)?
            }
            TAG_ROLLBACK_RESISTANCE => {
                self.rollback_resistance =
                    recover_flag(which, tag, asn::bool_presence_from_tlv(value), log)?
            }
            TAG_EARLY_BOOT_ONLY => {
                self.early_boot_only =
                    recover_flag(which, tag, asn::bool_presence_from_tlv(value), log)?
            }
            TAG_ACTIVE_DATE_TIME => {
                self.active_date_time = recover(which, tag, asn::int_from_tlv(value), log)?
            }
            TAG_ORIGINATION_EXPIRE_DATE_TIME => {
                self.origination_expire_date_time =
                    recover(which, tag, asn::int_from_tlv(value), log)?
            }
            TAG_USAGE_EXPIRE_DATE_TIME => {
                self.usage_expire_date_time = recover(which, tag, asn::int_from_tlv(value), log)?
            }
            TAG_USAGE_COUNT_LIMIT => {
                self.usage_count_limit = recover(which, tag, asn::int_from_tlv(value), log)?
            }
            TAG_USER_SECURE_ID => {
                self.user_secure_id = recover(which, tag, asn::int_from_tlv(value), log)?
            }
            TAG_NO_AUTH_REQUIRED => {
                self.no_auth_required =
                    recover_flag(which, tag, asn::bool_presence_from_tlv(value), log)?
            }
            TAG_USER_AUTH_TYPE => {
                self.user_auth_type = recover(which, tag, asn::int_from_tlv(value), log)?
            }
            TAG_AUTH_TIMEOUT => {
                self.auth_timeout = recover(which, tag, asn::int_from_tlv(value), log)?
            }
            TAG_ALLOW_WHILE_ON_BODY => {
                self.allow_while_on_body =
                    recover_flag(which, tag, asn::bool_presence_from_tlv(value), log)?
            }
            TAG_TRUSTED_USER_PRESENCE_REQUIRED => {
                self.trusted_user_presence_required =
                    recover_flag(which, tag, asn::bool_presence_from_tlv(value), log)?
            }
            TAG_TRUSTED_CONFIRMATION_REQUIRED => {
                self.trusted_confirmation_required =
                    recover_flag(which, tag, asn::bool_presence_from_tlv(value), log)?
            }
            TAG_UNLOCKED_DEVICE_REQUIRED => {
                self.unlocked_device_required =
                    recover_flag(which, tag, asn::bool_presence_from_tlv(value), log)?
            }
            TAG_CREATION_DATE_TIME => {
                self.creation_date_time = recover(which, tag, asn::int_from_tlv(value), log)?
            }
            TAG_ORIGIN => {
                self.origin = recover(
                    which,
                    tag,
                    asn::int_from_tlv(value).and_then(KeyOrigin::try_from),
                    log,
                )?
            }
            TAG_ROOT_OF_TRUST => {
                self.root_of_trust = Some(RootOfTrust::from_tlv(value).map_err(|e| structural(
                    "RootOfTrust", e,
                ))?)
            }
            TAG_OS_VERSION => {
                self.os_version = recover(which, tag, asn::int_from_tlv(value), log)?
            }
            TAG_OS_PATCH_LEVEL => {
                self.os_patch_level = parse_patch_level(tag, value, which, log)?
            }
            TAG_ATTESTATION_APPLICATION_ID => {
                self.attestation_application_id = Some(
                    AttestationApplicationId::from_tlv(value)
                        .map_err(|e| structural("AttestationApplicationId", e))?,
                )
            }
            TAG_ATTESTATION_ID_BRAND => {
                self.attestation_id_brand =
                    recover(which, tag, asn::octet_string_from_tlv(value), log)?
            }
            TAG_ATTESTATION_ID_DEVICE => {
                self.attestation_id_device =
                    recover(which, tag, asn::octet_string_from_tlv(value), log)?
            }
            TAG_ATTESTATION_ID_PRODUCT => {
                self.attestation_id_product =
                    recover(which, tag, asn::octet_string_from_tlv(value), log)?
            }
            TAG_ATTESTATION_ID_SERIAL => {
                self.attestation_id_serial =
                    recover(which, tag, asn::octet_string_from_tlv(value), log)?
            }
            TAG_ATTESTATION_ID_IMEI => {
                self.attestation_id_imei =
                    recover(which, tag, asn::octet_string_from_tlv(value), log)?
            }
            TAG_ATTESTATION_ID_MEID => {
                self.attestation_id_meid =
                    recover(which, tag, asn::octet_string_from_tlv(value), log)?
            }
            TAG_ATTESTATION_ID_MANUFACTURER => {
                self.attestation_id_manufacturer =
                    recover(which, tag, asn::octet_string_from_tlv(value), log)?
            }
            TAG_ATTESTATION_ID_MODEL => {
                self.attestation_id_model =
                    recover(which, tag, asn::octet_string_from_tlv(value), log)?
            }
            TAG_VENDOR_PATCH_LEVEL => {
                self.vendor_patch_level = parse_patch_level(tag, value, which, log)?
            }
            TAG_BOOT_PATCH_LEVEL => {
                self.boot_patch_level = parse_patch_level(tag, value, which, log)?
            }
            TAG_DEVICE_UNIQUE_ATTESTATION => {
                self.device_unique_attestation =
                    recover_flag(which, tag, asn::bool_presence_from_tlv(value), log)?
            }
            TAG_ATTESTATION_ID_SECOND_IMEI => {
                self.attestation_id_second_imei =
                    recover(which, tag, asn::octet_string_from_tlv(value), log)?
            }
            TAG_MODULE_HASH => {
                self.module_hash = recover(which, tag, asn::octet_string_from_tlv(value), log)?
            }
            unknown => {
                return Err(ExtensionParsingError::with_reason(
                    format!("{which}: unknown tag number {unknown}"),
                    ExtensionParsingReason::UnknownTagNumber,
                ))
            }
        }
        Ok(())
    }

    /// Encodes the list as a SEQUENCE with fields in canonical (ascending
    /// tag) order.
    pub(crate) fn to_der(&self) -> der::Result<Vec<u8>> {
        use asn::{ExplicitTaggedValue, RawDer};

        let mut content = Vec::new();
        let out = &mut content;

        put_int_set(TAG_PURPOSE, &self.purpose, out)?;
        put_int(TAG_ALGORITHM, self.algorithm, out)?;
        put_int(TAG_KEY_SIZE, self.key_size, out)?;
        put_int_set(TAG_BLOCK_MODE, &self.block_mode, out)?;
        put_int_set(TAG_DIGEST, &self.digest, out)?;
        put_int_set(TAG_PADDING, &self.padding, out)?;
        put_flag(TAG_CALLER_NONCE, self.caller_nonce, out)?;
        put_int(TAG_MIN_MAC_LENGTH, self.min_mac_length, out)?;
        put_int(TAG_EC_CURVE, self.ec_curve, out)?;
        put_int(TAG_RSA_PUBLIC_EXPONENT, self.rsa_public_exponent, out)?;
        put_int_set(TAG_MGF_DIGEST, &self.mgf_digest, out)?;
        put_flag(TAG_ROLLBACK_RESISTANCE, self.rollback_resistance, out)?;
        put_flag(TAG_EARLY_BOOT_ONLY, self.early_boot_only, out)?;
        put_int(TAG_ACTIVE_DATE_TIME, self.active_date_time, out)?;
        put_int(
            TAG_ORIGINATION_EXPIRE_DATE_TIME,
            self.origination_expire_date_time,
            out,
        )?;
        put_int(TAG_USAGE_EXPIRE_DATE_TIME, self.usage_expire_date_time, out)?;
        put_int(TAG_USAGE_COUNT_LIMIT, self.usage_count_limit, out)?;
        put_int(TAG_USER_SECURE_ID, self.user_secure_id, out)?;
        put_flag(TAG_NO_AUTH_REQUIRED, self.no_auth_required, out)?;
        put_int(TAG_USER_AUTH_TYPE, self.user_auth_type, out)?;
        put_int(TAG_AUTH_TIMEOUT, self.auth_timeout, out)?;
        put_flag(TAG_ALLOW_WHILE_ON_BODY, self.allow_while_on_body, out)?;
        put_flag(
            TAG_TRUSTED_USER_PRESENCE_REQUIRED,
            self.trusted_user_presence_required,
            out,
        )?;
        put_flag(
            TAG_TRUSTED_CONFIRMATION_REQUIRED,
            self.trusted_confirmation_required,
            out,
        )?;
        put_flag(
            TAG_UNLOCKED_DEVICE_REQUIRED,
            self.unlocked_device_required,
            out,
        )?;
        put_int(TAG_CREATION_DATE_TIME, self.creation_date_time, out)?;
        put_int(TAG_ORIGIN, self.origin.map(KeyOrigin::to_value), out)?;
        if let Some(rot) = &self.root_of_trust {
            let encoded = rot.to_der()?;
            ExplicitTaggedValue {
                tag: TAG_ROOT_OF_TRUST,
                val: RawDer(&encoded),
            }
            .encode(out)?;
        }
        put_int(TAG_OS_VERSION, self.os_version, out)?;
        put_int(
            TAG_OS_PATCH_LEVEL,
            self.os_patch_level.map(PatchLevel::to_value),
            out,
        )?;
        if let Some(app_id) = &self.attestation_application_id {
            let encoded = app_id.to_der()?;
            ExplicitTaggedValue {
                tag: TAG_ATTESTATION_APPLICATION_ID,
                val: OctetStringRef::new(&encoded)?,
            }
            .encode(out)?;
        }
        put_bytes(TAG_ATTESTATION_ID_BRAND, &self.attestation_id_brand, out)?;
        put_bytes(TAG_ATTESTATION_ID_DEVICE, &self.attestation_id_device, out)?;
        put_bytes(
            TAG_ATTESTATION_ID_PRODUCT,
            &self.attestation_id_product,
            out,
        )?;
        put_bytes(TAG_ATTESTATION_ID_SERIAL, &self.attestation_id_serial, out)?;
        put_bytes(TAG_ATTESTATION_ID_IMEI, &self.attestation_id_imei, out)?;
        put_bytes(TAG_ATTESTATION_ID_MEID, &self.attestation_id_meid, out)?;
        put_bytes(
            TAG_ATTESTATION_ID_MANUFACTURER,
            &self.attestation_id_manufacturer,
            out,
        )?;
        put_bytes(TAG_ATTESTATION_ID_MODEL, &self.attestation_id_model, out)?;
        put_int(
            TAG_VENDOR_PATCH_LEVEL,
            self.vendor_patch_level.map(PatchLevel::to_value),
            out,
        )?;
        put_int(
            TAG_BOOT_PATCH_LEVEL,
            self.boot_patch_level.map(PatchLevel::to_value),
            out,
        )?;
        put_flag(
            TAG_DEVICE_UNIQUE_ATTESTATION,
            self.device_unique_attestation,
            out,
        )?;
        put_bytes(
            TAG_ATTESTATION_ID_SECOND_IMEI,
            &self.attestation_id_second_imei,
            out,
        )?;
        put_bytes(TAG_MODULE_HASH, &self.module_hash, out)?;

        let mut encoded = Vec::new();
        asn::encode_tlv(Tag::Sequence, &content, &mut encoded)?;
        Ok(encoded)
    }
}

fn parse_patch_level(
    tag: u32,
    value: &[u8],
    which: &str,
    log: &dyn VerificationLog,
) -> Result<Option<PatchLevel>, ExtensionParsingError> {
    let raw = match recover(which, tag, asn::int_from_tlv(value), log)? {
        Some(v) => v,
        None => return Ok(None),
    };
    match PatchLevel::from_value(raw) {
        Some(p) => Ok(Some(p)),
        None => {
            log.log_info_message(&format!(
                "{which}: patch level {raw} for tag {tag} is neither yyyyMM nor yyyyMMdd, \
                 treating as absent"
            ));
            Ok(None)
        }
    }
}

fn structural(name: &str, e: ExtensionParsingError) -> ExtensionParsingError {
    ExtensionParsingError {
        message: format!("{name}: {}", e.message),
        reason: Some(match e.reason {
            Some(ExtensionParsingReason::MalformedUtf8) => ExtensionParsingReason::MalformedUtf8,
            Some(ExtensionParsingReason::UnknownEnumValue) => {
                ExtensionParsingReason::UnknownEnumValue
            }
            _ => ExtensionParsingReason::MalformedStructure,
        }),
    }
}

fn put_int(tag: u32, value: Option<i64>, out: &mut Vec<u8>) -> der::Result<()> {
    if let Some(v) = value {
        asn::ExplicitTaggedValue { tag, val: v }.encode(out)?;
    }
    Ok(())
}

fn put_flag(tag: u32, present: bool, out: &mut Vec<u8>) -> der::Result<()> {
    if present {
        asn::ExplicitTaggedValue { tag, val: () }.encode(out)?;
    }
    Ok(())
}

fn put_int_set(tag: u32, value: &Option<BTreeSet<i64>>, out: &mut Vec<u8>) -> der::Result<()> {
    if let Some(set) = value {
        let mut encoded = Vec::new();
        asn::encode_int_set(set, &mut encoded)?;
        asn::ExplicitTaggedValue {
            tag,
            val: asn::RawDer(&encoded),
        }
        .encode(out)?;
    }
    Ok(())
}

fn put_bytes(tag: u32, value: &Option<Vec<u8>>, out: &mut Vec<u8>) -> der::Result<()> {
    if let Some(bytes) = value {
        asn::ExplicitTaggedValue {
            tag,
            val: OctetStringRef::new(bytes)?,
        }
        .encode(out)?;
    }
    Ok(())
}
