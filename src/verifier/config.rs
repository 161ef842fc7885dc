// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::ext::{KeyOrigin, RootOfTrust, SecurityLevel};

/// How strictly one constrained field of the parsed extension is checked.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel<T> {
    /// The field must be present and equal to the expected value.
    Strict(T),
    /// The field must be present; its value is not inspected.
    NotNull,
    /// The field is not checked at all.
    Ignore,
}

/// The extended level set for the two security-level fields, which are
/// always present but must usually agree with each other.  Modeled as its
/// own sum because two of its variants have no counterpart in
/// [`ValidationLevel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevelValidation {
    /// Both fields equal each other and the expected value.
    Strict(SecurityLevel),
    /// Both fields equal each other and are not `SOFTWARE`.
    NotSoftware,
    /// Both fields equal each other.
    Consistent,
    /// Both fields are present (trivially true after a successful parse).
    NotNull,
    /// Not checked.
    Ignore,
}

/// Per-field validation levels applied by the constraint engine after the
/// extension has parsed.  The defaults describe a freshly generated key in
/// a trusted execution environment with an intact root of trust.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionConstraintConfig {
    /// Checked against `hardwareEnforced.origin`.
    pub key_origin: ValidationLevel<KeyOrigin>,
    /// Checked against both security-level fields of the KeyDescription.
    pub security_level: SecurityLevelValidation,
    /// Checked against `hardwareEnforced.rootOfTrust`.
    pub root_of_trust: ValidationLevel<RootOfTrust>,
    /// When `Strict(true)`, both authorization lists must have their tags
    /// in canonical order.
    pub authorization_list_tag_order: ValidationLevel<bool>,
}

impl Default for ExtensionConstraintConfig {
    fn default() -> Self {
        Self {
            key_origin: ValidationLevel::Strict(KeyOrigin::Generated),
            security_level: SecurityLevelValidation::Strict(SecurityLevel::TrustedEnvironment),
            root_of_trust: ValidationLevel::NotNull,
            authorization_list_tag_order: ValidationLevel::Ignore,
        }
    }
}
