// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The constraint engine: semantic checks applied to a successfully parsed
//! KeyDescription.  Constraints are evaluated in a fixed order (key origin,
//! security level, root of trust, tag order) and the first violation wins.

use super::config::{ExtensionConstraintConfig, SecurityLevelValidation, ValidationLevel};
use crate::ext::{KeyDescription, SecurityLevel};

/// Which constraint a KeyDescription violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintViolationReason {
    KeyOriginConstraintViolation,
    SecurityLevelConstraintViolation,
    RootOfTrustConstraintViolation,
    AuthorizationListOrderingConstraintViolation,
}

/// A constraint violation: the extension parsed, but its content is not
/// acceptable under the configured levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub description: String,
    pub reason: ConstraintViolationReason,
}

fn violation(
    description: impl Into<String>,
    reason: ConstraintViolationReason,
) -> Result<(), ConstraintViolation> {
    Err(ConstraintViolation {
        description: description.into(),
        reason,
    })
}

pub(crate) fn check(
    config: &ExtensionConstraintConfig,
    key_description: &KeyDescription,
) -> Result<(), ConstraintViolation> {
    check_key_origin(config, key_description)?;
    check_security_level(config, key_description)?;
    check_root_of_trust(config, key_description)?;
    check_tag_order(config, key_description)?;
    Ok(())
}

fn check_key_origin(
    config: &ExtensionConstraintConfig,
    key_description: &KeyDescription,
) -> Result<(), ConstraintViolation> {
    let origin = key_description.hardware_enforced.origin;
    let reason = ConstraintViolationReason::KeyOriginConstraintViolation;
    match &config.key_origin {
        ValidationLevel::Strict(expected) => match origin {
            Some(o) if o == *expected => Ok(()),
            Some(o) => violation(
                format!("key origin is {o:?}, expecting {expected:?}"),
                reason,
            ),
            None => violation("key origin is absent", reason),
        },
        ValidationLevel::NotNull => match origin {
            Some(_) => Ok(()),
            None => violation("key origin is absent", reason),
        },
        ValidationLevel::Ignore => Ok(()),
    }
}

fn check_security_level(
    config: &ExtensionConstraintConfig,
    key_description: &KeyDescription,
) -> Result<(), ConstraintViolation> {
    let attestation = key_description.attestation_security_level;
    let keymint = key_description.keymint_security_level;
    let reason = ConstraintViolationReason::SecurityLevelConstraintViolation;

    let consistent = || -> Result<(), ConstraintViolation> {
        if attestation == keymint {
            Ok(())
        } else {
            violation(
                format!(
                    "attestation security level {attestation} disagrees with \
                     keymint security level {keymint}"
                ),
                reason,
            )
        }
    };

    match config.security_level {
        SecurityLevelValidation::Strict(expected) => {
            consistent()?;
            if attestation == expected {
                Ok(())
            } else {
                violation(
                    format!("security level is {attestation}, expecting {expected}"),
                    reason,
                )
            }
        }
        SecurityLevelValidation::NotSoftware => {
            consistent()?;
            if attestation == SecurityLevel::Software {
                violation("security level is SOFTWARE", reason)
            } else {
                Ok(())
            }
        }
        SecurityLevelValidation::Consistent => consistent(),
        SecurityLevelValidation::NotNull | SecurityLevelValidation::Ignore => Ok(()),
    }
}

fn check_root_of_trust(
    config: &ExtensionConstraintConfig,
    key_description: &KeyDescription,
) -> Result<(), ConstraintViolation> {
    let root_of_trust = &key_description.hardware_enforced.root_of_trust;
    let reason = ConstraintViolationReason::RootOfTrustConstraintViolation;
    match &config.root_of_trust {
        ValidationLevel::Strict(expected) => match root_of_trust {
            Some(r) if r == expected => Ok(()),
            Some(_) => violation("root of trust differs from the expected value", reason),
            None => violation("root of trust is absent", reason),
        },
        ValidationLevel::NotNull => match root_of_trust {
            Some(_) => Ok(()),
            None => violation("root of trust is absent", reason),
        },
        ValidationLevel::Ignore => Ok(()),
    }
}

fn check_tag_order(
    config: &ExtensionConstraintConfig,
    key_description: &KeyDescription,
) -> Result<(), ConstraintViolation> {
    let reason = ConstraintViolationReason::AuthorizationListOrderingConstraintViolation;
    match config.authorization_list_tag_order {
        ValidationLevel::Strict(expected) => {
            for (which, list) in [
                ("softwareEnforced", &key_description.software_enforced),
                ("hardwareEnforced", &key_description.hardware_enforced),
            ] {
                if list.are_tags_ordered != expected {
                    return violation(
                        format!("{which} authorization list tags are out of order"),
                        reason,
                    );
                }
            }
            Ok(())
        }
        ValidationLevel::NotNull | ValidationLevel::Ignore => Ok(()),
    }
}
