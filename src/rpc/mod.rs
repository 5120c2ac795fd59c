//! Rpc records as written by the client library and the servers.

pub mod names;
pub mod operation;
pub mod record;
pub mod scan;

pub use names::{NamesSpec, RpcNames};
pub use operation::{OpId, Operation, OperationMap};
pub use record::{CallRecord, Direction, LocalId, RecordMeta};
pub use scan::RpcScanner;
