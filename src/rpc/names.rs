//! Allow-list of rpc names.
//!
//! The built-in list covers every rpc the service exposes. A replacement
//! list can be loaded from JSON:
//! { "names": ["ADM_ping", "ADM_register_job"] }

use crate::Result;
use crate::error::VerifyError;

use anyhow::{Context, bail};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const BUILTIN_NAMES: &[&str] = &[
    "ADM_ping",
    "ADM_register_job",
    "ADM_update_job",
    "ADM_remove_job",
    "ADM_register_adhoc_storage",
    "ADM_update_adhoc_storage",
    "ADM_remove_adhoc_storage",
    "ADM_deploy_adhoc_storage",
    "ADM_terminate_adhoc_storage",
    "ADM_register_pfs_storage",
    "ADM_update_pfs_storage",
    "ADM_remove_pfs_storage",
    "ADM_transfer_datasets",
    "ADM_get_transfer_priority",
    "ADM_set_transfer_priority",
    "ADM_cancel_transfer",
    "ADM_get_pending_transfers",
    "ADM_set_qos_constraints",
    "ADM_get_qos_constraints",
    "ADM_define_data_operation",
    "ADM_connect_data_operation",
    "ADM_finalize_data_operation",
    "ADM_link_transfer_to_data_operation",
    "ADM_in_situ_ops",
    "ADM_in_transit_ops",
    "ADM_get_statistics",
    "ADM_set_dataset_information",
    "ADM_set_io_resources",
];

/// Immutable set of recognized rpc names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcNames(BTreeSet<String>);

impl RpcNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_NAMES.iter().copied())
    }

    /// Load and validate a JSON names file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read rpc names file {}", path.display()))?;
        let spec: NamesSpec = serde_json::from_str(&text)
            .with_context(|| format!("parse rpc names file {}", path.display()))?;
        spec.validate_and_build()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Comma-separated, sorted list used in diagnostics.
    pub fn joined(&self) -> String {
        self.iter().collect::<Vec<_>>().join(", ")
    }

    /// Reject a requested rpc name that is not in the list.
    pub fn check(&self, name: &str) -> std::result::Result<(), VerifyError> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(VerifyError::UnknownRpcName {
                name: name.to_string(),
                valid: self.joined(),
            })
        }
    }
}

/// Raw names file shape.
#[derive(Debug, Clone, Deserialize)]
pub struct NamesSpec {
    #[serde(default)]
    pub names: Vec<String>,
}

impl NamesSpec {
    pub fn validate_and_build(&self) -> Result<RpcNames> {
        let mut seen = BTreeSet::new();
        for name in &self.names {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                bail!("rpc names file contains a blank name");
            }
            if !seen.insert(trimmed.to_string()) {
                bail!("duplicate rpc name in names file: {}", trimmed);
            }
        }
        if seen.is_empty() {
            bail!("rpc names file contained no names");
        }
        Ok(RpcNames(seen))
    }
}
