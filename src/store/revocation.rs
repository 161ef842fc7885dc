// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Interface to the source of revoked certificate serial numbers.  Like the
/// trust anchor source it is consulted once per `verify` call and must be
/// safe to call concurrently.
pub trait IRevocationSource: Send + Sync {
    /// Serial numbers (lowercase hex, no leading zeros) of revoked
    /// certificates.
    fn revoked_serials(&self) -> Result<HashSet<String>, Error>;
}

const STATUS_REVOKED: &str = "REVOKED";

#[derive(Deserialize)]
struct StatusEntry {
    status: String,
}

#[derive(Deserialize)]
struct StatusList {
    entries: HashMap<String, StatusEntry>,
}

/// An in-memory revocation source, loadable from the published status-list
/// JSON (`{"entries": {"<serial-hex>": {"status": ...}}}`).  Only entries
/// whose status is `REVOKED` are retained; anything else in the document is
/// ignored.
#[derive(Debug, Default)]
pub struct MemoRevocationList {
    revoked: RwLock<HashSet<String>>,
}

impl MemoRevocationList {
    /// Returns a new empty list: nothing is revoked.
    pub fn new() -> Self {
        Default::default()
    }

    /// Add to an existing (and possibly empty) list the revoked serials
    /// found in the given status-list JSON.
    pub fn load_json(&self, j: &str) -> Result<(), Error> {
        let list: StatusList = serde_json::from_str(j).map_err(|e| Error::Syntax(e.to_string()))?;

        let mut revoked = self.revoked.write().unwrap();
        for (serial, entry) in list.entries {
            if entry.status == STATUS_REVOKED {
                revoked.insert(serial);
            }
        }
        Ok(())
    }

    /// Marks a single serial (lowercase hex, no leading zeros) as revoked.
    pub fn insert(&self, serial: impl Into<String>) {
        self.revoked.write().unwrap().insert(serial.into());
    }
}

impl IRevocationSource for MemoRevocationList {
    fn revoked_serials(&self) -> Result<HashSet<String>, Error> {
        Ok(self.revoked.read().unwrap().clone())
    }
}
