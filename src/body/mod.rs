//! The value language embedded after `body:` in rpc log lines.

pub mod parse;
pub mod value;

#[cfg(test)]
pub(crate) mod strategy;

pub use parse::{BodyError, parse_body};
pub use value::{Body, Number, Object, Value};
