//! Request/reply pairs.

use crate::rpc::record::CallRecord;
use std::collections::BTreeMap;

/// Correlation id shared by the logs of every process an operation crossed.
pub type OpId = u64;

/// The two legs of one rpc within a single log, keyed by correlation id.
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: OpId,
    pub request: CallRecord,
    pub reply: CallRecord,
}

pub type OperationMap = BTreeMap<OpId, Operation>;
