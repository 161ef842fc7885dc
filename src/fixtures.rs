// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Test-only builders for attestation chains: fresh EC P-256 hierarchies
//! with the attestation extension emitted through this crate's own encoder,
//! so end-to-end tests need no binary fixture files.

use crate::ext::{
    AttestationApplicationId, AttestationPackageInfo, AuthorizationList, KeyDescription,
    KeyOrigin, PatchLevel, RootOfTrust, SecurityLevel, VerifiedBootState,
};
use crate::log::VerificationLog;
use crate::verifier::{Clock, VerificationResult};
use num_bigint::BigUint;
use openssl::asn1::{Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509Extension, X509Name, X509NameRef, X509};
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const ATTESTATION_OID: &str = "1.3.6.1.4.1.11129.2.1.17";
pub const PROVISIONING_OID: &str = "1.3.6.1.4.1.11129.2.1.30";

pub fn p256_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

pub fn name(entries: &[(&str, &str)]) -> X509Name {
    let mut builder = X509Name::builder().unwrap();
    for (field, value) in entries {
        builder.append_entry_by_text(field, value).unwrap();
    }
    builder.build()
}

pub struct CertSpec<'a> {
    pub subject: &'a X509NameRef,
    pub issuer: &'a X509NameRef,
    pub public_key: &'a PKey<Private>,
    pub signer: &'a PKey<Private>,
    pub serial: u32,
    pub ca: bool,
    /// Extra extensions as (dotted OID, raw DER value).
    pub extensions: Vec<(&'static str, Vec<u8>)>,
}

pub fn make_cert(spec: CertSpec<'_>) -> X509 {
    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(spec.serial)
        .unwrap()
        .to_asn1_integer()
        .unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(spec.subject).unwrap();
    builder.set_issuer_name(spec.issuer).unwrap();
    builder.set_pubkey(spec.public_key).unwrap();

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    builder
        .set_not_before(&Asn1Time::from_unix(now - 86_400).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(now + 30 * 86_400).unwrap())
        .unwrap();

    if spec.ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
    }
    for (oid, value) in &spec.extensions {
        let obj = Asn1Object::from_str(oid).unwrap();
        let data = Asn1OctetString::new_from_bytes(value).unwrap();
        builder
            .append_extension(X509Extension::new_from_der(&obj, false, &data).unwrap())
            .unwrap();
    }

    builder.sign(spec.signer, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// The KeyDescription used by the happy-path scenarios: a freshly generated
/// TEE key on an unlocked test device with the usual Pixel 3 identifiers.
pub fn default_key_description() -> KeyDescription {
    let mut software_enforced = AuthorizationList::default();
    software_enforced.creation_date_time = Some(1_700_000_000_000);
    software_enforced.attestation_application_id = Some(AttestationApplicationId {
        packages: BTreeSet::from([AttestationPackageInfo {
            name: "com.example.keyattestation".to_string(),
            version: 1,
        }]),
        signatures: BTreeSet::from([vec![0x5a; 32]]),
    });

    let mut hardware_enforced = AuthorizationList::default();
    hardware_enforced.purpose = Some(BTreeSet::from([2, 3]));
    hardware_enforced.algorithm = Some(3);
    hardware_enforced.key_size = Some(256);
    hardware_enforced.digest = Some(BTreeSet::from([4]));
    hardware_enforced.ec_curve = Some(1);
    hardware_enforced.no_auth_required = true;
    hardware_enforced.origin = Some(KeyOrigin::Generated);
    hardware_enforced.root_of_trust = Some(RootOfTrust {
        verified_boot_key: vec![0; 32],
        device_locked: false,
        verified_boot_state: VerifiedBootState::Unverified,
        verified_boot_hash: Some(vec![0xee; 32]),
    });
    hardware_enforced.os_version = Some(130_000);
    hardware_enforced.os_patch_level = Some(PatchLevel {
        year: 2023,
        month: 6,
        day: None,
    });
    hardware_enforced.attestation_id_brand = Some(b"google".to_vec());
    hardware_enforced.attestation_id_device = Some(b"blueline".to_vec());
    hardware_enforced.attestation_id_product = Some(b"blueline".to_vec());
    hardware_enforced.attestation_id_manufacturer = Some(b"Google".to_vec());
    hardware_enforced.attestation_id_model = Some(b"Pixel 3".to_vec());
    hardware_enforced.vendor_patch_level = Some(PatchLevel {
        year: 2023,
        month: 6,
        day: Some(5),
    });
    hardware_enforced.boot_patch_level = Some(PatchLevel {
        year: 2023,
        month: 6,
        day: Some(5),
    });

    KeyDescription {
        attestation_version: BigUint::from(300u32),
        attestation_security_level: SecurityLevel::TrustedEnvironment,
        keymint_version: BigUint::from(300u32),
        keymint_security_level: SecurityLevel::TrustedEnvironment,
        attestation_challenge: b"challenge".to_vec(),
        unique_id: Vec::new(),
        software_enforced,
        hardware_enforced,
    }
}

pub enum ChainKind {
    /// 4 certificates, intermediate subject carrying serialNumber and
    /// title=TEE.
    Factory,
    /// 5 certificates, the certificate under the root being Droid CA2; the
    /// attestation certificate optionally carries provisioning-info CBOR.
    Remote { provisioning_info: Option<Vec<u8>> },
}

pub struct TestChain {
    /// DER certificates, leaf first.
    pub der: Vec<Vec<u8>>,
    pub root: X509,
    pub leaf_key: PKey<Private>,
}

/// Builds a fresh, correctly signed chain embedding `key_description` in
/// the leaf.  The attestation certificate gets `attestation_serial`.
pub fn build_chain(
    key_description: &KeyDescription,
    kind: &ChainKind,
    attestation_serial: u32,
) -> TestChain {
    let root_key = p256_key();
    let attest_key = p256_key();
    let leaf_key = p256_key();

    let root_name = name(&[("CN", "Test Hardware Attestation Root"), ("O", "Test")]);
    let root = make_cert(CertSpec {
        subject: &root_name,
        issuer: &root_name,
        public_key: &root_key,
        signer: &root_key,
        serial: 1,
        ca: true,
        extensions: vec![],
    });

    // intermediates between the attestation certificate and the root,
    // closest-to-root first
    let mut intermediates: Vec<(X509, PKey<Private>)> = Vec::new();
    match kind {
        ChainKind::Factory => {
            let key = p256_key();
            let subject = name(&[("serialNumber", "8c5d32a0f2b1c4d7"), ("title", "TEE")]);
            let cert = make_cert(CertSpec {
                subject: &subject,
                issuer: &root_name,
                public_key: &key,
                signer: &root_key,
                serial: 2,
                ca: true,
                extensions: vec![],
            });
            intermediates.push((cert, key));
        }
        ChainKind::Remote { .. } => {
            let ca2_key = p256_key();
            let ca2_name = name(&[("CN", "Droid CA2"), ("O", "Google LLC")]);
            let ca2 = make_cert(CertSpec {
                subject: &ca2_name,
                issuer: &root_name,
                public_key: &ca2_key,
                signer: &root_key,
                serial: 2,
                ca: true,
                extensions: vec![],
            });
            let ca3_key = p256_key();
            let ca3_name = name(&[("CN", "Droid CA3"), ("O", "Google LLC")]);
            let ca3 = make_cert(CertSpec {
                subject: &ca3_name,
                issuer: &ca2_name,
                public_key: &ca3_key,
                signer: &ca2_key,
                serial: 3,
                ca: true,
                extensions: vec![],
            });
            intermediates.push((ca2, ca2_key));
            intermediates.push((ca3, ca3_key));
        }
    }
    let (issuer_cert, issuer_key) = intermediates.last().unwrap();

    let attest_name = name(&[("CN", "Test Attestation CA")]);
    let mut attest_extensions = Vec::new();
    if let ChainKind::Remote {
        provisioning_info: Some(cbor),
    } = kind
    {
        attest_extensions.push((PROVISIONING_OID, cbor.clone()));
    }
    let attestation = make_cert(CertSpec {
        subject: &attest_name,
        issuer: issuer_cert.subject_name(),
        public_key: &attest_key,
        signer: issuer_key,
        serial: attestation_serial,
        ca: true,
        extensions: attest_extensions,
    });

    let leaf_name = name(&[("CN", "Android Keystore Key")]);
    let leaf = make_cert(CertSpec {
        subject: &leaf_name,
        issuer: &attest_name,
        public_key: &leaf_key,
        signer: &attest_key,
        serial: 1,
        ca: false,
        extensions: vec![(ATTESTATION_OID, key_description.to_der().unwrap())],
    });

    let mut der = vec![leaf.to_der().unwrap(), attestation.to_der().unwrap()];
    for (cert, _) in intermediates.iter().rev() {
        der.push(cert.to_der().unwrap());
    }
    der.push(root.to_der().unwrap());

    TestChain {
        der,
        root,
        leaf_key,
    }
}

/// A throwaway self-signed certificate, optionally carrying an attestation
/// extension, for building mis-shaped chains.
pub fn standalone_cert(key_description: Option<&KeyDescription>) -> Vec<u8> {
    let key = p256_key();
    let subject = name(&[("CN", "Interloper")]);
    let extensions = match key_description {
        Some(kd) => vec![(ATTESTATION_OID, kd.to_der().unwrap())],
        None => vec![],
    };
    make_cert(CertSpec {
        subject: &subject,
        issuer: &subject,
        public_key: &key,
        signer: &key,
        serial: 99,
        ca: false,
        extensions,
    })
    .to_der()
    .unwrap()
}

/// A clock pinned to a fixed instant.
pub struct FixedClock(pub SystemTime);

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        self.0
    }
}

impl FixedClock {
    pub fn current() -> Self {
        Self(SystemTime::now())
    }

    pub fn days_from_now(days: i64) -> Self {
        let offset = Duration::from_secs(days.unsigned_abs() * 86_400);
        let t = if days >= 0 {
            SystemTime::now() + offset
        } else {
            SystemTime::now() - offset
        };
        Self(t)
    }
}

/// A log hook that records everything it sees.
#[derive(Default)]
pub struct RecordingLog {
    pub input_chains: Mutex<usize>,
    pub serials: Mutex<Vec<Vec<String>>>,
    pub key_descriptions: Mutex<usize>,
    pub provisioning_infos: Mutex<usize>,
    pub results: Mutex<Vec<String>>,
    pub messages: Mutex<Vec<String>>,
}

impl VerificationLog for RecordingLog {
    fn log_input_chain(&self, _chain: &[Vec<u8>]) {
        *self.input_chains.lock().unwrap() += 1;
    }

    fn log_result(&self, result: &VerificationResult) {
        self.results.lock().unwrap().push(format!("{result:?}"));
    }

    fn log_key_description(&self, _key_description: &KeyDescription) {
        *self.key_descriptions.lock().unwrap() += 1;
    }

    fn log_provisioning_info_map(&self, _info: &crate::ext::ProvisioningInfoMap) {
        *self.provisioning_infos.lock().unwrap() += 1;
    }

    fn log_cert_serial_numbers(&self, serials: &[String]) {
        self.serials.lock().unwrap().push(serials.to_vec());
    }

    fn log_info_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
