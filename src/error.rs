//! Internal errors.
//!
//! Note: returning `Result<(), a-singleton>` is identical to returning `bool`,
//! but a named enum documents the fatal kinds the engine can surface (see
//! the error handling table in the specification).
use crate::types::NodeId;
use std::fmt;

#[derive(Debug, Eq, PartialEq)]
pub enum EngineError {
    /// Allocation of the node table, cache, ilist, or proof buffer failed.
    Memory,
    /// `make_node` would exceed the configured `max_nodes`.
    NodeNum,
    /// An operation referenced an out-of-range or freed node.
    IllBdd(NodeId),
    /// Input variable count exceeds the engine's variable-index space.
    Var(u32),
    /// Write to the proof stream failed.
    File(String),
    /// RUP check failed while justifying an apply step, or a clause with
    /// literal `0` was encountered.
    Proof(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineError::Memory => write!(f, "out of memory"),
            EngineError::NodeNum => write!(f, "node table exhausted"),
            EngineError::IllBdd(id) => write!(f, "illegal BDD node reference: {id}"),
            EngineError::Var(v) => write!(f, "variable out of range: {v}"),
            EngineError::File(msg) => write!(f, "proof stream I/O error: {msg}"),
            EngineError::Proof(msg) => write!(f, "proof generation failed: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::File(e.to_string())
    }
}

/// A Result type used by every fallible entry point in the engine.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        assert_eq!(format!("{}", EngineError::NodeNum), "node table exhausted");
        assert_eq!(
            format!("{}", EngineError::IllBdd(42)),
            "illegal BDD node reference: 42"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let e: EngineError = io.into();
        assert!(matches!(e, EngineError::File(_)));
    }
}
