// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The verifier module glues the pieces together: chain shape checks, PKIX
//! path validation, extension parsing, the constraint engine and the
//! challenge check, in that order, folding every outcome into a
//! [`VerificationResult`].

pub use self::challenge::{
    ChallengeChecker, ChallengeCheckerChain, ChallengeMatcher, OneTimeChallengeCache,
};
pub use self::config::{ExtensionConstraintConfig, SecurityLevelValidation, ValidationLevel};
pub use self::constraints::{ConstraintViolation, ConstraintViolationReason};
pub use self::result::{DeviceIdentity, Success, VerificationResult};

mod challenge;
mod config;
mod constraints;
mod result;

use crate::chain::{
    validate_path, AttestationChain, ChainCertificate, PathValidationError, PathValidationReason,
    ProvisioningMethod,
};
use crate::ext::{
    KeyDescription, ProvisioningInfoMap, ATTESTATION_EXTENSION_OID,
    PROVISIONING_INFO_EXTENSION_OID,
};
use crate::log::{NopLog, VerificationLog};
use crate::store::{Error as StoreError, IRevocationSource, ITrustAnchorSource};
use std::time::SystemTime;

/// The verifier's view of time.  Injected so that callers control the
/// validity instant and tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Verifies Android key attestation chains against caller-supplied trust
/// anchors, revocation data and clock.
pub struct Verifier<T, R, C>
where
    T: ITrustAnchorSource,
    R: IRevocationSource,
    C: Clock,
{
    trust_anchors: T,
    revocations: R,
    clock: C,
    config: ExtensionConstraintConfig,
}

impl<T, R, C> Verifier<T, R, C>
where
    T: ITrustAnchorSource,
    R: IRevocationSource,
    C: Clock,
{
    /// Builds a verifier.  Fails fast when the anchor source currently
    /// offers a known software attestation root: a verifier anchored there
    /// could only ever prove that a key lives in plain application code.
    pub fn new(
        trust_anchors: T,
        revocations: R,
        clock: C,
        config: ExtensionConstraintConfig,
    ) -> Result<Self, StoreError> {
        for anchor in trust_anchors.trust_anchors()? {
            if crate::chain::is_software_root(&anchor) {
                return Err(StoreError::Sema(
                    "software attestation root cannot be a trust anchor".to_string(),
                ));
            }
        }
        Ok(Self {
            trust_anchors,
            revocations,
            clock,
            config,
        })
    }

    /// Verifies a leaf-first certificate chain, blocking the calling thread
    /// while the challenge checker's future is driven to completion.  Safe
    /// to call from any thread.
    pub fn verify(
        &self,
        chain: &[Vec<u8>],
        challenge_checker: Option<&dyn ChallengeChecker>,
        log: Option<&dyn VerificationLog>,
    ) -> VerificationResult {
        futures::executor::block_on(self.verify_async(chain, challenge_checker, log))
    }

    /// Asynchronous verification.  The returned future suspends at exactly
    /// one point, awaiting the challenge checker; parsing and path
    /// validation run to completion without yielding.
    pub async fn verify_async(
        &self,
        chain: &[Vec<u8>],
        challenge_checker: Option<&dyn ChallengeChecker>,
        log: Option<&dyn VerificationLog>,
    ) -> VerificationResult {
        let log = log.unwrap_or(&NopLog);

        let parsed_chain = match AttestationChain::new(chain) {
            Ok(c) => c,
            Err(e) => {
                log.log_input_chain(chain);
                return finish(VerificationResult::ChainParsingFailure(e), log);
            }
        };

        let serials: Vec<String> = parsed_chain
            .certificates()
            .iter()
            .skip(1)
            .map(ChainCertificate::serial_hex)
            .collect();
        log.log_cert_serial_numbers(&serials);

        let device_information = match parsed_chain.provisioning_method() {
            ProvisioningMethod::RemotelyProvisioned => {
                provisioning_info(&parsed_chain, log)
            }
            _ => None,
        };

        let anchors = match self.trust_anchors.trust_anchors() {
            Ok(a) => a,
            Err(e) => return finish(provider_failure("trust anchor source", e), log),
        };
        let revoked = match self.revocations.revoked_serials() {
            Ok(r) => r,
            Err(e) => return finish(provider_failure("revocation source", e), log),
        };
        let public_key =
            match validate_path(&parsed_chain, &anchors, self.clock.now(), &revoked) {
                Ok(k) => k,
                Err(e) => return finish(VerificationResult::PathValidationFailure(e), log),
            };

        let extension = match parsed_chain.leaf().extension(&ATTESTATION_EXTENSION_OID) {
            Some(e) => e,
            None => {
                return finish(
                    VerificationResult::ExtensionParsingFailure(
                        crate::ext::ExtensionParsingError::new("attestation extension not found"),
                    ),
                    log,
                )
            }
        };
        let key_description =
            match KeyDescription::from_der(extension.extn_value.as_bytes(), log) {
                Ok(kd) => kd,
                Err(e) => return finish(VerificationResult::ExtensionParsingFailure(e), log),
            };
        log.log_key_description(&key_description);

        if let Some(checker) = challenge_checker {
            if !checker
                .check_challenge(&key_description.attestation_challenge)
                .await
            {
                return finish(VerificationResult::ChallengeMismatch, log);
            }
        }

        if let Err(v) = constraints::check(&self.config, &key_description) {
            return finish(
                VerificationResult::ExtensionConstraintViolation {
                    description: v.description,
                    reason: v.reason,
                },
                log,
            );
        }

        let verified_boot_state = key_description
            .hardware_enforced
            .root_of_trust
            .as_ref()
            .map(|r| r.verified_boot_state);
        let attested_device_ids =
            DeviceIdentity::from_authorizations(&key_description.hardware_enforced, log);
        let success = Success {
            public_key,
            challenge: key_description.attestation_challenge.clone(),
            security_level: key_description.attestation_security_level,
            verified_boot_state,
            device_information,
            attested_device_ids,
        };
        finish(VerificationResult::Success(success), log)
    }
}

fn finish(result: VerificationResult, log: &dyn VerificationLog) -> VerificationResult {
    log.log_result(&result);
    result
}

fn provider_failure(what: &str, e: StoreError) -> VerificationResult {
    VerificationResult::PathValidationFailure(PathValidationError::new(
        format!("{what} failed: {e}"),
        PathValidationReason::Unspecified,
    ))
}

fn provisioning_info(
    chain: &AttestationChain,
    log: &dyn VerificationLog,
) -> Option<ProvisioningInfoMap> {
    let extension = match chain
        .attestation_cert()
        .extension(&PROVISIONING_INFO_EXTENSION_OID)
    {
        Some(e) => e,
        None => {
            log.log_info_message(
                "remotely provisioned chain without a provisioning info extension",
            );
            return None;
        }
    };
    match ProvisioningInfoMap::from_cbor(extension.extn_value.as_bytes()) {
        Ok(info) => {
            log.log_provisioning_info_map(&info);
            Some(info)
        }
        Err(e) => {
            log.log_info_message(&format!("ignoring unparseable provisioning info: {e}"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainParsingReason, SOFTWARE_ROOT_COMMON_NAME};
    use crate::ext::{ProvisioningInfoMap, SecurityLevel, VerifiedBootState};
    use crate::fixtures::{
        build_chain, default_key_description, make_cert, name, p256_key, standalone_cert,
        CertSpec, ChainKind, FixedClock, RecordingLog, TestChain,
    };
    use crate::store::{MemoRevocationList, MemoTrustAnchorStore};
    use hex_literal::hex;

    type TestVerifier = Verifier<MemoTrustAnchorStore, MemoRevocationList, FixedClock>;

    fn verifier_with(
        chain: &TestChain,
        config: ExtensionConstraintConfig,
        clock: FixedClock,
    ) -> TestVerifier {
        let anchors = MemoTrustAnchorStore::new();
        anchors.add_cert(chain.root.clone());
        Verifier::new(anchors, MemoRevocationList::new(), clock, config).unwrap()
    }

    fn verifier_for(chain: &TestChain) -> TestVerifier {
        verifier_with(chain, Default::default(), FixedClock::current())
    }

    fn expect_success(result: VerificationResult) -> Success {
        match result {
            VerificationResult::Success(s) => s,
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn valid_factory_chain_with_default_config() {
        let chain = build_chain(&default_key_description(), &ChainKind::Factory, 100);
        let verifier = verifier_for(&chain);

        let s = expect_success(verifier.verify(&chain.der, None, None));
        assert_eq!(s.challenge, b"challenge");
        assert_eq!(s.security_level, SecurityLevel::TrustedEnvironment);
        assert_eq!(s.verified_boot_state, Some(VerifiedBootState::Unverified));
        assert!(s.device_information.is_none());
        assert!(s.public_key.public_eq(&chain.leaf_key));

        let ids = &s.attested_device_ids;
        assert_eq!(ids.brand.as_deref(), Some("google"));
        assert_eq!(ids.device.as_deref(), Some("blueline"));
        assert_eq!(ids.product.as_deref(), Some("blueline"));
        assert_eq!(ids.manufacturer.as_deref(), Some("Google"));
        assert_eq!(ids.model.as_deref(), Some("Pixel 3"));
        assert!(ids.serial.is_none());
        assert!(ids.imeis.is_empty());
    }

    #[test]
    fn valid_remotely_provisioned_chain() {
        let chain = build_chain(
            &default_key_description(),
            &ChainKind::Remote {
                provisioning_info: Some(hex!("a10101").to_vec()),
            },
            100,
        );
        let verifier = verifier_for(&chain);

        let s = expect_success(verifier.verify(&chain.der, None, None));
        assert_eq!(
            s.device_information,
            Some(ProvisioningInfoMap {
                certificates_issued: 1
            })
        );
    }

    #[test]
    fn unparseable_provisioning_info_is_not_fatal() {
        let chain = build_chain(
            &default_key_description(),
            &ChainKind::Remote {
                provisioning_info: Some(b"not cbor at all, sorry".to_vec()),
            },
            100,
        );
        let verifier = verifier_for(&chain);
        let log = RecordingLog::default();

        let s = expect_success(verifier.verify(&chain.der, None, Some(&log)));
        assert!(s.device_information.is_none());
        assert!(log
            .messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.contains("provisioning info")));
    }

    #[test]
    fn chain_extended_with_fake_attestation_extension() {
        let kd = default_key_description();
        let chain = build_chain(&kd, &ChainKind::Factory, 100);
        let verifier = verifier_for(&chain);

        let mut der = chain.der.clone();
        der.insert(0, standalone_cert(Some(&kd)));

        match verifier.verify(&der, None, None) {
            VerificationResult::ChainParsingFailure(e) => assert_eq!(
                e.reason,
                Some(ChainParsingReason::ChainExtendedWithFakeAttestationExtension)
            ),
            other => panic!("expected chain parsing failure, got {other:?}"),
        }
    }

    #[test]
    fn chain_extended_for_key() {
        let chain = build_chain(&default_key_description(), &ChainKind::Factory, 100);
        let verifier = verifier_for(&chain);

        let mut der = chain.der.clone();
        der.insert(0, standalone_cert(None));

        match verifier.verify(&der, None, None) {
            VerificationResult::ChainParsingFailure(e) => {
                assert_eq!(e.reason, Some(ChainParsingReason::ChainExtendedForKey))
            }
            other => panic!("expected chain parsing failure, got {other:?}"),
        }
    }

    #[test]
    fn wrong_trust_anchor() {
        let chain = build_chain(&default_key_description(), &ChainKind::Factory, 100);
        let other = build_chain(&default_key_description(), &ChainKind::Factory, 7);
        let verifier = verifier_for(&other);

        match verifier.verify(&chain.der, None, None) {
            VerificationResult::PathValidationFailure(e) => {
                assert_eq!(e.reason, PathValidationReason::NoTrustAnchor)
            }
            other => panic!("expected path validation failure, got {other:?}"),
        }
    }

    #[test]
    fn revoked_attestation_certificate() {
        let chain = build_chain(&default_key_description(), &ChainKind::Factory, 42);

        let anchors = MemoTrustAnchorStore::new();
        anchors.add_cert(chain.root.clone());
        let revocations = MemoRevocationList::new();
        revocations.insert("2a");
        let verifier = Verifier::new(
            anchors,
            revocations,
            FixedClock::current(),
            Default::default(),
        )
        .unwrap();

        match verifier.verify(&chain.der, None, None) {
            VerificationResult::PathValidationFailure(e) => {
                assert_eq!(e.reason, PathValidationReason::Revoked)
            }
            other => panic!("expected path validation failure, got {other:?}"),
        }
    }

    #[test]
    fn expired_chain() {
        let chain = build_chain(&default_key_description(), &ChainKind::Factory, 100);
        let verifier = verifier_with(&chain, Default::default(), FixedClock::days_from_now(60));

        match verifier.verify(&chain.der, None, None) {
            VerificationResult::PathValidationFailure(e) => {
                assert_eq!(e.reason, PathValidationReason::Expired)
            }
            other => panic!("expected path validation failure, got {other:?}"),
        }
    }

    #[test]
    fn not_yet_valid_chain() {
        let chain = build_chain(&default_key_description(), &ChainKind::Factory, 100);
        let verifier = verifier_with(&chain, Default::default(), FixedClock::days_from_now(-2));

        match verifier.verify(&chain.der, None, None) {
            VerificationResult::PathValidationFailure(e) => {
                assert_eq!(e.reason, PathValidationReason::NotYetValid)
            }
            other => panic!("expected path validation failure, got {other:?}"),
        }
    }

    #[test]
    fn challenge_mismatch() {
        let chain = build_chain(&default_key_description(), &ChainKind::Factory, 100);
        let verifier = verifier_for(&chain);

        let matcher = ChallengeMatcher::new(*b"foo");
        match verifier.verify(&chain.der, Some(&matcher), None) {
            VerificationResult::ChallengeMismatch => {}
            other => panic!("expected challenge mismatch, got {other:?}"),
        }

        let matcher = ChallengeMatcher::new(*b"challenge");
        expect_success(verifier.verify(&chain.der, Some(&matcher), None));
    }

    #[test]
    fn mismatched_security_levels() {
        let mut kd = default_key_description();
        kd.attestation_security_level = SecurityLevel::StrongBox;
        let chain = build_chain(&kd, &ChainKind::Factory, 100);

        let verifier = verifier_for(&chain);
        match verifier.verify(&chain.der, None, None) {
            VerificationResult::ExtensionConstraintViolation { reason, .. } => assert_eq!(
                reason,
                ConstraintViolationReason::SecurityLevelConstraintViolation
            ),
            other => panic!("expected constraint violation, got {other:?}"),
        }

        let relaxed = ExtensionConstraintConfig {
            security_level: SecurityLevelValidation::NotNull,
            ..Default::default()
        };
        let verifier = verifier_with(&chain, relaxed, FixedClock::current());
        expect_success(verifier.verify(&chain.der, None, None));
    }

    #[test]
    fn software_anchor_is_rejected_at_construction() {
        let key = p256_key();
        let subject = name(&[
            ("CN", SOFTWARE_ROOT_COMMON_NAME),
            ("O", "Google Inc."),
        ]);
        let software_root = make_cert(CertSpec {
            subject: &subject,
            issuer: &subject,
            public_key: &key,
            signer: &key,
            serial: 1,
            ca: true,
            extensions: vec![],
        });

        let anchors = MemoTrustAnchorStore::new();
        anchors.add_cert(software_root);
        let built = Verifier::new(
            anchors,
            MemoRevocationList::new(),
            FixedClock::current(),
            ExtensionConstraintConfig::default(),
        );
        assert!(built.is_err());
    }

    #[test]
    fn verify_async_resolves_like_verify() {
        let chain = build_chain(&default_key_description(), &ChainKind::Factory, 100);
        let verifier = verifier_for(&chain);

        let matcher = ChallengeMatcher::new(*b"challenge");
        let result = futures::executor::block_on(verifier.verify_async(
            &chain.der,
            Some(&matcher),
            None,
        ));
        expect_success(result);
    }

    #[test]
    fn hook_sees_serials_and_results() {
        let chain = build_chain(&default_key_description(), &ChainKind::Factory, 100);
        let verifier = verifier_for(&chain);
        let log = RecordingLog::default();

        expect_success(verifier.verify(&chain.der, None, Some(&log)));

        // every certificate except the leaf, leaf-first order
        assert_eq!(
            log.serials.lock().unwrap().as_slice(),
            &[vec!["64".to_string(), "2".to_string(), "1".to_string()]]
        );
        assert_eq!(*log.key_descriptions.lock().unwrap(), 1);
        let results = log.results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].starts_with("Success"));
    }
}
