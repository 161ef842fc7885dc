// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

/// Classification of extension parsing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionParsingReason {
    /// A context tag number that is not part of the KeyMint tag table.
    UnknownTagNumber,
    /// An ENUMERATED discriminant outside the known variant set.
    UnknownEnumValue,
    /// The DER itself could not be decoded.
    MalformedDer,
    /// A string-valued field held bytes that are not valid UTF-8.
    MalformedUtf8,
    /// A positional SEQUENCE had the wrong number of elements.
    WrongArity,
    /// A presence-only boolean field carried an explicit FALSE.
    ForbiddenBooleanValue,
    /// A nested structure (RootOfTrust, AttestationApplicationId) was
    /// malformed.
    MalformedStructure,
}

/// Error raised while parsing the attestation or provisioning-info
/// extension.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ExtensionParsingError {
    pub message: String,
    pub reason: Option<ExtensionParsingReason>,
}

impl ExtensionParsingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reason: None,
        }
    }

    pub fn with_reason(message: impl Into<String>, reason: ExtensionParsingReason) -> Self {
        Self {
            message: message.into(),
            reason: Some(reason),
        }
    }
}

impl From<der::Error> for ExtensionParsingError {
    fn from(e: der::Error) -> Self {
        Self::with_reason(e.to_string(), ExtensionParsingReason::MalformedDer)
    }
}
