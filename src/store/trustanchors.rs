// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use openssl::x509::X509;
use serde::Deserialize;
use std::sync::RwLock;

/// Interface to the source of trust anchors for path validation.  It is
/// consulted once per `verify` call, so implementations are free to refresh
/// their contents between calls; they must be safe to call concurrently.
pub trait ITrustAnchorSource: Send + Sync {
    /// The current set of root certificates to anchor path validation on.
    fn trust_anchors(&self) -> Result<Vec<X509>, Error>;
}

/// One entry of the trust anchor JSON bundle: a PEM certificate with an
/// optional display name.
#[derive(Clone, Debug, Deserialize)]
pub struct TrustAnchorEntry {
    #[serde(default)]
    pub name: Option<String>,

    /// The root certificate, textual encoding per §13 of RFC 7468.
    pub certificate: String,
}

/// An in-memory trust anchor source, loadable from a JSON bundle.
#[derive(Debug, Default)]
pub struct MemoTrustAnchorStore {
    anchors: RwLock<Vec<X509>>,
}

impl MemoTrustAnchorStore {
    /// Returns a new empty store.
    pub fn new() -> Self {
        Default::default()
    }

    /// Add to an existing (and possibly empty) store the anchors from the
    /// given JSON bundle.
    pub fn load_json(&self, j: &str) -> Result<(), Error> {
        let entries: Vec<TrustAnchorEntry> =
            serde_json::from_str(j).map_err(|e| Error::Syntax(e.to_string()))?;

        let mut certs = Vec::with_capacity(entries.len());
        for entry in &entries {
            let cert = X509::from_pem(entry.certificate.as_bytes()).map_err(|e| {
                Error::Certificate(format!(
                    "trust anchor {}: {e}",
                    entry.name.as_deref().unwrap_or("<unnamed>")
                ))
            })?;
            certs.push(cert);
        }

        self.anchors.write().unwrap().extend(certs);
        Ok(())
    }

    /// Adds a single anchor certificate.
    pub fn add_cert(&self, cert: X509) {
        self.anchors.write().unwrap().push(cert);
    }
}

impl ITrustAnchorSource for MemoTrustAnchorStore {
    fn trust_anchors(&self) -> Result<Vec<X509>, Error> {
        Ok(self.anchors.read().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{make_cert, name, p256_key, CertSpec};

    #[test]
    fn load_json_and_list() {
        let key = p256_key();
        let subject = name(&[("CN", "Test Anchor")]);
        let cert = make_cert(CertSpec {
            subject: &subject,
            issuer: &subject,
            public_key: &key,
            signer: &key,
            serial: 1,
            ca: true,
            extensions: vec![],
        });
        let pem = String::from_utf8(cert.to_pem().unwrap()).unwrap();
        let json =
            serde_json::json!([{ "name": "test-root", "certificate": pem }]).to_string();

        let s = MemoTrustAnchorStore::new();
        s.load_json(&json).unwrap();

        let anchors = s.trust_anchors().unwrap();
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].to_der().unwrap(), cert.to_der().unwrap());
    }

    #[test]
    fn bad_pem_is_a_certificate_error() {
        let s = MemoTrustAnchorStore::new();
        let json = r#"[{"name": "broken", "certificate": "not pem"}]"#;
        match s.load_json(json) {
            Err(Error::Certificate(msg)) => assert!(msg.contains("broken")),
            other => panic!("expected certificate error, got {other:?}"),
        }
    }
}
