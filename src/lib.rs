//! Cross-checks the rpc trace logs written by cooperating processes.
//!
//! Every process logs one line per rpc it sends or receives. Given the logs
//! of a call path (client library -> server -> controller), this crate
//! pairs requests with replies inside each log and then checks that each
//! operation seen by a caller was seen, field for field, by its callee.

pub mod body;
pub mod chain;
pub mod correlate;
pub mod diagnostics;
pub mod error;
pub mod matcher;
pub mod rpc;

pub type Result<T> = anyhow::Result<T>;

pub use chain::{ChainLink, ChainReport, ChainSpec, verify_chain};
pub use error::VerifyError;
