//! Core logic of the `tome-replay` binary.

use serde_json::Value;

use crate::error::TomeResult;
use crate::forest::Forest;

/// Conjures `document`, merges the entries in `log` (one entry or an array)
/// and returns the resulting document as JSON text.
pub fn replay(document: &str, log: &str) -> TomeResult<String> {
    let document: Value = serde_json::from_str(document)?;
    let log: Value = serde_json::from_str(log)?;

    let mut forest = Forest::new();
    let root = forest.conjure(document)?;
    forest.merge_json(root, &log)?;
    let result = forest.un_tome(root)?.to_json();
    Ok(serde_json::to_string(&result)?)
}
