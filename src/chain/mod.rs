// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Certificate-chain handling: the structural shape rules that defeat
//! chain-extension attacks, and the PKIX path validation adapter.

pub use self::path::{
    is_software_root, PathValidationError, PathValidationReason, SOFTWARE_ROOT_COMMON_NAME,
};
pub use self::shape::{
    AttestationChain, ChainCertificate, ChainParsingError, ChainParsingReason, ProvisioningMethod,
};

pub(crate) use self::path::validate_path;

mod path;
mod shape;
