//! Error types for tree operations.

use thiserror::Error;

use crate::key::{format_chain, Key};
use crate::node::{NodeId, TypeTag};

pub type TomeResult<T> = Result<T, TomeError>;

/// Broad class of a [`TomeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Value of the wrong type for the operation.
    Type,
    /// Operation addressed something that does not exist.
    Reference,
    /// A cycle was found while building or exporting a tree.
    Circular,
    /// A diff entry could not be decoded or replayed.
    Protocol,
}

#[derive(Debug, Error)]
pub enum TomeError {
    #[error("{op} requires {expected}, found {found}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        found: TypeTag,
    },

    #[error("increment must be a finite number, got {0}")]
    NonFiniteDelta(f64),

    #[error("unset is only valid as an array element")]
    InvalidUnsetPlacement,

    #[error("invalid rename: {0}")]
    InvalidRename(String),

    #[error("node {0} is not a root")]
    NotARoot(NodeId),

    #[error("value nests deeper than {0} levels")]
    DepthLimit(usize),

    #[error("key {key} is not defined")]
    UndefinedKey { key: Key },

    #[error("value at key {key} is not a tome")]
    NotATome { key: Key },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("circular reference detected")]
    CircularReference,

    #[error("cannot swap a root node")]
    RootSwap,

    #[error("cannot resolve key {key} along chain {}", format_chain(.chain))]
    ChainResolution { chain: Vec<Key>, key: Key },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("malformed {op} entry: {reason}")]
    MalformedEntry { op: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TomeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TomeError::TypeMismatch { .. }
            | TomeError::NonFiniteDelta(_)
            | TomeError::InvalidUnsetPlacement
            | TomeError::InvalidRename(_)
            | TomeError::NotARoot(_)
            | TomeError::DepthLimit(_)
            | TomeError::RootSwap => ErrorClass::Type,
            TomeError::UndefinedKey { .. }
            | TomeError::NotATome { .. }
            | TomeError::UnknownNode(_) => ErrorClass::Reference,
            TomeError::CircularReference => ErrorClass::Circular,
            TomeError::ChainResolution { .. }
            | TomeError::UnsupportedOperation(_)
            | TomeError::MalformedEntry { .. }
            | TomeError::Serialization(_) => ErrorClass::Protocol,
        }
    }

    pub(crate) fn malformed(op: &str, reason: impl Into<String>) -> Self {
        TomeError::MalformedEntry {
            op: op.to_owned(),
            reason: reason.into(),
        }
    }
}
