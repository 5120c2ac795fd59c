//! A chain of logs: the client library, the server it called, and
//! optionally the controller the server called in turn.
//!
//! Each log is reduced to its operations independently, then every
//! adjacent pair is matched, origin first.

use crate::Result;
use crate::correlate::process_file;
use crate::error::VerifyError;
use crate::matcher::{FileOperations, PairReport, match_operations};
use crate::rpc::RpcNames;

use anyhow::Context;
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One participant in the chain.
#[derive(Debug, Clone)]
pub struct ChainLink {
    /// Name used in diagnostics, e.g. `SERVER_LOG`.
    pub role: String,
    pub path: PathBuf,
    /// Address of the process that wrote this log, when known.
    pub address: Option<String>,
}

impl ChainLink {
    pub fn new(role: impl Into<String>, path: impl Into<PathBuf>, address: Option<String>) -> Self {
        Self {
            role: role.into(),
            path: path.into(),
            address,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChainSpec {
    pub rpc_name: String,
    pub links: Vec<ChainLink>,
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub rpc_name: String,
    pub pairs: Vec<PairReport>,
}

impl ChainReport {
    pub fn all_match(&self) -> bool {
        self.pairs.iter().all(|p| p.ok)
    }

    pub fn failed_pairs(&self) -> impl Iterator<Item = &PairReport> {
        self.pairs.iter().filter(|p| !p.ok)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;
        Ok(())
    }
}

/// Run the whole verification.
///
/// Fatal conditions (missing file, unknown rpc name, corrupt log) return an
/// error; mismatches are collected into the report.
pub fn verify_chain(spec: &ChainSpec, names: &RpcNames) -> Result<ChainReport> {
    // 1) Inputs must exist before any scanning starts.
    for link in &spec.links {
        if !link.path.is_file() {
            return Err(VerifyError::NotAFile {
                role: link.role.clone(),
                path: link.path.clone(),
            }
            .into());
        }
    }

    names.check(&spec.rpc_name)?;

    // 2) Reduce every log to its operations.
    let mut files = Vec::with_capacity(spec.links.len());
    for link in &spec.links {
        let ops = process_file(&link.path, &spec.rpc_name, names, link.address.as_deref())?;
        files.push(FileOperations {
            path: link.path.clone(),
            ops,
        });
    }

    // 3) Match adjacent pairs.
    let mut pairs = Vec::new();
    for window in files.windows(2) {
        let report = match_operations(&window[0], &window[1], spec.strict)?;
        info!(
            "'{}' -> '{}': {} matched, {} findings",
            report.origin.display(),
            report.target.display(),
            report.matched,
            report.diagnostics.len()
        );
        pairs.push(report);
    }

    Ok(ChainReport {
        rpc_name: spec.rpc_name.clone(),
        pairs,
    })
}
