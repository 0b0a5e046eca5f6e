//! tome: observable JSON document trees with a replayable operation log.
//!
//! A [`Forest`] holds one or more trees of typed value nodes. Every mutation
//! (`set`, `assign`, `del`, array and structural operations) updates the
//! tree, notifies listeners on the affected nodes, marks the path to the
//! root dirty, and appends a [`DiffEntry`] to the root's log. Entries read
//! from one tree can be merged into another tree that started from the same
//! value to reproduce the same state.
//!
//! ```
//! use serde_json::json;
//! use tome::Forest;
//!
//! let mut forest = Forest::new();
//! let a = forest.conjure(json!({"b": 1})).unwrap();
//! let b = forest.conjure(json!({"b": 1})).unwrap();
//!
//! forest.set(a, "c", 2).unwrap();
//! let log = forest.read_all(a).unwrap();
//! forest.merge(b, &log).unwrap();
//!
//! assert_eq!(forest.un_tome(b).unwrap(), forest.un_tome(a).unwrap());
//! ```

pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod event;
pub mod forest;
pub mod handle;
pub mod key;
pub mod node;
pub mod plain;
pub mod snapshot;

mod array;
mod mutate;
mod structure;
mod sync;

pub use config::TomeConfig;
pub use diff::{decode_entries, DiffEntry, DiffOp, OPERATIONS};
pub use error::{ErrorClass, TomeError, TomeResult};
pub use event::{EventKind, ListenerId, TomeEvent};
pub use forest::Forest;
pub use handle::TomeMut;
pub use key::{format_chain, Chain, Key};
pub use node::{Node, NodeId, TypeTag};
pub use plain::Plain;
pub use snapshot::Snapshot;
