//! Data-integrity findings collected while matching logs.
//!
//! Unlike `VerifyError`, a diagnostic never aborts the run: every pair in the
//! chain is checked and all findings are reported before the verdict.

use crate::body::Value;
use crate::rpc::{CallRecord, OpId};

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a record came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    pub file: PathBuf,
    pub lineno: usize,
    pub line: String,
}

impl Provenance {
    pub fn of(file: &Path, record: &CallRecord) -> Self {
        Self {
            file: file.to_path_buf(),
            lineno: record.meta.lineno,
            line: record.meta.line.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    Request,
    Reply,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Request => write!(f, "request"),
            Leg::Reply => write!(f, "reply"),
        }
    }
}

/// How two bodies differ.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mismatch {
    /// Keys present on only one side. Both sides are always listed.
    KeySet {
        origin_only: BTreeSet<String>,
        target_only: BTreeSet<String>,
    },
    /// A shared key whose values differ.
    Value {
        key: String,
        origin_value: Value,
        target_value: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    MissingOperation {
        op_id: OpId,
        origin: PathBuf,
        target: PathBuf,
    },
    BodyMismatch {
        op_id: OpId,
        leg: Leg,
        origin: Provenance,
        target: Provenance,
        mismatch: Mismatch,
    },
}

impl Diagnostic {
    pub fn is_missing_operation(&self) -> bool {
        matches!(self, Diagnostic::MissingOperation { .. })
    }
}

fn key_list(keys: &BTreeSet<String>) -> String {
    if keys.is_empty() {
        "-".to_string()
    } else {
        keys.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingOperation {
                op_id,
                origin,
                target,
            } => write!(
                f,
                "an operation with id '{}' was found in '{}' but is missing from '{}'",
                op_id,
                origin.display(),
                target.display()
            ),
            Diagnostic::BodyMismatch {
                op_id,
                leg,
                origin,
                target,
                mismatch,
            } => {
                match mismatch {
                    Mismatch::KeySet {
                        origin_only,
                        target_only,
                    } => {
                        writeln!(
                            f,
                            "extra fields were found when comparing the {} of operation '{}' to its counterpart",
                            leg, op_id
                        )?;
                        writeln!(f, "    only in origin: {}", key_list(origin_only))?;
                        writeln!(f, "    only in target: {}", key_list(target_only))?;
                    }
                    Mismatch::Value {
                        key,
                        origin_value,
                        target_value,
                    } => {
                        writeln!(
                            f,
                            "mismatching values were found when comparing the {} of operation '{}' to its counterpart",
                            leg, op_id
                        )?;
                        writeln!(f, "    value1 (line: {}): {}: {}", origin.lineno, key, origin_value)?;
                        writeln!(f, "    value2 (line: {}): {}: {}", target.lineno, key, target_value)?;
                    }
                }
                writeln!(f, "    origin {}:{}: {}", origin.file.display(), origin.lineno, origin.line)?;
                write!(f, "    target {}:{}: {}", target.file.display(), target.lineno, target.line)
            }
        }
    }
}
