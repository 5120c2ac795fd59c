//! Conditions that abort a verification run.

use crate::body::BodyError;
use crate::rpc::Direction;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("malformed rpc body at line {lineno}: {reason}\n    raw: '{line}'")]
    MalformedBody {
        lineno: usize,
        line: String,
        reason: BodyError,
    },

    #[error("invalid op_id {value} at line {lineno}\n    raw: '{line}'")]
    InvalidOpId {
        lineno: usize,
        value: String,
        line: String,
    },

    #[error("found {direction} rpc {prep} own address '{address}' at line {lineno}\n    raw: '{line}'", prep = .direction.preposition())]
    SelfAddressedCall {
        direction: Direction,
        address: String,
        lineno: usize,
        line: String,
    },

    #[error("attempting to compare rpcs with different names: '{left}' (line {left_lineno}) and '{right}' (line {right_lineno})")]
    NameMismatch {
        left: String,
        left_lineno: usize,
        right: String,
        right_lineno: usize,
    },

    #[error("'{name}' is not a valid rpc name\n  Valid names: {valid}")]
    UnknownRpcName { name: String, valid: String },

    #[error("{role} '{}' is not a file", .path.display())]
    NotAFile { role: String, path: PathBuf },
}
