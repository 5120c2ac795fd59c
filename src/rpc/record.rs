//! One rpc event as recorded in a log line.

use crate::body::{Body, Object, Value};
use crate::error::VerifyError;
use crate::rpc::operation::OpId;

use std::fmt;

/// Line metadata common to every log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    pub line: String,
    pub lineno: usize,
    pub timestamp: String,
    pub progname: String,
    pub pid: u32,
    pub log_level: String,
}

/// Direction of an rpc as seen by the process that wrote the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    /// `<=` marks inbound records, `=>` outbound ones.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "<=" => Some(Direction::Inbound),
            "=>" => Some(Direction::Outbound),
            _ => None,
        }
    }

    /// Preposition used in front of the peer address in log lines.
    pub fn preposition(self) -> &'static str {
        match self {
            Direction::Inbound => "from",
            Direction::Outbound => "to",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

/// Process-scoped rpc identifier. Multi-hop records also carry the pid of
/// the remote peer, which takes part in the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalId {
    pub pid: Option<u32>,
    pub id: u64,
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "(pid: {}, id: {})", pid, self.id),
            None => write!(f, "(id: {})", self.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub meta: RecordMeta,
    pub local_id: LocalId,
    pub name: String,
    pub direction: Direction,
    pub address: String,
    pub body: Object,
    /// Correlation id: taken from the options block when the peer reported
    /// one, otherwise the local id.
    pub op_id: OpId,
}

impl CallRecord {
    pub fn new(
        meta: RecordMeta,
        local_id: LocalId,
        name: String,
        direction: Direction,
        address: String,
        body: Body,
    ) -> std::result::Result<Self, VerifyError> {
        let op_id = match body.opts.get("op_id") {
            None => local_id.id,
            Some(value) => match value {
                Value::Number(n) => n.as_u64(),
                _ => None,
            }
            .ok_or_else(|| VerifyError::InvalidOpId {
                lineno: meta.lineno,
                value: value.to_string(),
                line: meta.line.clone(),
            })?,
        };

        Ok(Self {
            meta,
            local_id,
            name,
            direction,
            address,
            body: body.body,
            op_id,
        })
    }
}
