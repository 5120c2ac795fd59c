//! Cross-file matching of operations by correlation id.

use crate::diagnostics::{Diagnostic, Leg, Mismatch, Provenance};
use crate::error::VerifyError;
use crate::rpc::{CallRecord, Operation, OperationMap};

use log::{error, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Operations extracted from one log of the chain.
#[derive(Debug, Clone)]
pub struct FileOperations {
    pub path: PathBuf,
    pub ops: OperationMap,
}

/// Outcome of matching one adjacent pair of logs.
#[derive(Debug, Clone, Serialize)]
pub struct PairReport {
    pub origin: PathBuf,
    pub target: PathBuf,
    pub strict: bool,
    /// Operations present on both sides with equal bodies.
    pub matched: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub ok: bool,
}

/// Compare the bodies of two records of the same rpc.
///
/// Key-set differences are reported first, then every shared key whose
/// values differ. An empty result means the bodies are equal. Records of
/// different rpcs are never comparable and yield an error.
pub fn compare_records(
    origin: &CallRecord,
    target: &CallRecord,
) -> Result<Vec<Mismatch>, VerifyError> {
    if origin.name != target.name {
        return Err(VerifyError::NameMismatch {
            left: origin.name.clone(),
            left_lineno: origin.meta.lineno,
            right: target.name.clone(),
            right_lineno: target.meta.lineno,
        });
    }

    let mut out = Vec::new();

    let origin_keys: BTreeSet<&String> = origin.body.keys().collect();
    let target_keys: BTreeSet<&String> = target.body.keys().collect();

    let origin_only: BTreeSet<String> = origin_keys
        .difference(&target_keys)
        .map(|k| k.to_string())
        .collect();
    let target_only: BTreeSet<String> = target_keys
        .difference(&origin_keys)
        .map(|k| k.to_string())
        .collect();
    if !origin_only.is_empty() || !target_only.is_empty() {
        out.push(Mismatch::KeySet {
            origin_only,
            target_only,
        });
    }

    for key in origin_keys.intersection(&target_keys) {
        let (a, b) = (&origin.body[*key], &target.body[*key]);
        if a != b {
            out.push(Mismatch::Value {
                key: key.to_string(),
                origin_value: a.clone(),
                target_value: b.clone(),
            });
        }
    }

    Ok(out)
}

/// Compare both legs of two operations, attaching provenance to every
/// mismatch found.
pub fn compare_operations(
    origin: &Operation,
    origin_file: &Path,
    target: &Operation,
    target_file: &Path,
) -> Result<Vec<Diagnostic>, VerifyError> {
    let mut out = Vec::new();

    for (leg, a, b) in [
        (Leg::Request, &origin.request, &target.request),
        (Leg::Reply, &origin.reply, &target.reply),
    ] {
        for mismatch in compare_records(a, b)? {
            out.push(Diagnostic::BodyMismatch {
                op_id: origin.id,
                leg,
                origin: Provenance::of(origin_file, a),
                target: Provenance::of(target_file, b),
                mismatch,
            });
        }
    }

    Ok(out)
}

/// Check every operation of `origin` against its counterpart in `target`.
///
/// Operations missing from `target` fail the pair only in strict mode;
/// body mismatches always fail it. All findings are collected.
pub fn match_operations(
    origin: &FileOperations,
    target: &FileOperations,
    strict: bool,
) -> Result<PairReport, VerifyError> {
    info!(
        "matching operations in '{}' and '{}'",
        origin.path.display(),
        target.path.display()
    );

    let mut diagnostics = Vec::new();
    let mut matched = 0usize;
    let mut ok = true;

    for (op_id, origin_op) in &origin.ops {
        let Some(target_op) = target.ops.get(op_id) else {
            let d = Diagnostic::MissingOperation {
                op_id: *op_id,
                origin: origin.path.clone(),
                target: target.path.clone(),
            };
            warn!("{}", d);
            if strict {
                ok = false;
            }
            diagnostics.push(d);
            continue;
        };

        let found = compare_operations(origin_op, &origin.path, target_op, &target.path)?;
        if found.is_empty() {
            matched += 1;
        } else {
            ok = false;
            for d in &found {
                error!("{}", d);
            }
            diagnostics.extend(found);
        }
    }

    Ok(PairReport {
        origin: origin.path.clone(),
        target: target.path.clone(),
        strict,
        matched,
        diagnostics,
        ok,
    })
}
