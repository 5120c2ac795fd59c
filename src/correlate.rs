//! Per-file pairing of rpc records into operations.
//!
//! Within one log, the request and the reply of an rpc share a local id.
//! Across logs, operations are matched by correlation id, which the server
//! side sends back to its caller inside the reply's options block:
//!
//! client log:
//!   rpc => id: 10 name: "ADM_ping" to: "..." body: {...}
//!   rpc <= id: 10 name: "ADM_ping" from: "..." body: {...} [op_id: 42]
//!
//! server log:
//!   rpc <= id: 42 name: "ADM_ping" from: "..." body: {...}
//!   rpc => id: 42 name: "ADM_ping" to: "..." body: {...}

use crate::Result;
use crate::error::VerifyError;
use crate::rpc::{CallRecord, LocalId, Operation, OperationMap, RpcNames, RpcScanner};

use anyhow::Context;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::Path;

/// Strip a `scheme://` prefix so `ofi+tcp://host:1` and `host:1` compare equal.
pub fn sanitize_address(address: &str) -> &str {
    address
        .split_once("://")
        .map_or(address, |(_, rest)| rest)
}

/// Pair the records of one log into operations keyed by correlation id.
///
/// `self_address` is the address of the process that wrote the log, when
/// known. A record addressed to it means the log is corrupt and aborts the
/// run. Records still unpaired at the end are dropped.
pub fn correlate<I>(records: I, self_address: Option<&str>) -> Result<OperationMap>
where
    I: IntoIterator<Item = Result<(CallRecord, usize)>>,
{
    let own = self_address.map(sanitize_address);
    let mut pending: HashMap<LocalId, CallRecord> = HashMap::new();
    let mut ops = OperationMap::new();

    for item in records {
        let (rpc, lineno) = item?;

        debug!(
            "found {} rpc {} '{}' with id {} at line {}",
            rpc.direction,
            rpc.direction.preposition(),
            rpc.address,
            rpc.local_id,
            lineno
        );

        if own.is_some_and(|own| own == sanitize_address(&rpc.address)) {
            return Err(VerifyError::SelfAddressedCall {
                direction: rpc.direction,
                address: rpc.address.clone(),
                lineno,
                line: rpc.meta.line.clone(),
            }
            .into());
        }

        let Some(first) = pending.remove(&rpc.local_id) else {
            pending.insert(rpc.local_id, rpc);
            continue;
        };

        // The later leg decides the key: a reply that carries the peer's
        // op_id links this operation to the peer's log.
        debug!("creating new operation with id '{}'", rpc.op_id);
        let id = rpc.op_id;
        let op = Operation {
            id,
            request: first,
            reply: rpc,
        };
        if let Some(prev) = ops.insert(id, op) {
            warn!(
                "operation id '{}' seen twice (lines {}-{}), keeping the later one",
                id, prev.request.meta.lineno, prev.reply.meta.lineno
            );
        }
    }

    if !pending.is_empty() {
        debug!("{} rpcs left without a counterpart", pending.len());
    }

    Ok(ops)
}

/// Scan `path` for rpcs named `rpc_name` and pair them into operations.
pub fn process_file(
    path: &Path,
    rpc_name: &str,
    names: &RpcNames,
    self_address: Option<&str>,
) -> Result<OperationMap> {
    info!(
        "searching for rpc \"{}\" in {}\n  self address: {}",
        rpc_name,
        path.display(),
        self_address.unwrap_or("<unknown>")
    );

    let scanner = RpcScanner::open(path, rpc_name, names)?;
    let ops = correlate(scanner, self_address)
        .with_context(|| format!("process log file {}", path.display()))?;

    info!("{} operations found in {}", ops.len(), path.display());
    Ok(ops)
}
