//! Consuming one tree's log and replaying it onto another.

use serde_json::Value;

use crate::diff::{decode_entries, DiffEntry, DiffOp};
use crate::error::TomeResult;
use crate::forest::Forest;
use crate::key::format_chain;
use crate::node::NodeId;

impl Forest {
    /// Dequeues the oldest unread entry of `root`'s log.
    pub fn read(&mut self, root: NodeId) -> TomeResult<Option<DiffEntry>> {
        Ok(self.journal_mut(root)?.log.pop_front())
    }

    /// Drains every pending entry of `root`'s log.
    pub fn read_all(&mut self, root: NodeId) -> TomeResult<Vec<DiffEntry>> {
        Ok(self.journal_mut(root)?.log.drain(..).collect())
    }

    /// Number of entries waiting to be read.
    pub fn pending(&self, root: NodeId) -> TomeResult<usize> {
        Ok(self.journal(root)?.log.len())
    }

    /// Replays `entries` onto the tree rooted at `root`, in order.
    ///
    /// Each entry runs through the same operation a local caller would use,
    /// so listeners and the receiving log see exactly what a local mutation
    /// produces. Replay stops at the first failing entry; entries before it
    /// stay applied.
    pub fn merge(&mut self, root: NodeId, entries: &[DiffEntry]) -> TomeResult<()> {
        self.require_root(root)?;
        for entry in entries {
            self.merge_entry(root, entry)?;
        }
        Ok(())
    }

    /// Decodes one entry or an array of entries from their wire form and
    /// merges them.
    pub fn merge_json(&mut self, root: NodeId, entries: &Value) -> TomeResult<()> {
        let entries = decode_entries(entries)?;
        self.merge(root, &entries)
    }

    pub fn merge_entry(&mut self, root: NodeId, entry: &DiffEntry) -> TomeResult<()> {
        self.require_root(root)?;
        let node = self.resolve_chain(root, &entry.chain)?;
        tracing::debug!(
            root = %root,
            op = entry.op.name(),
            chain = %format_chain(&entry.chain),
            "merge diff entry"
        );
        match entry.op.clone() {
            DiffOp::Assign(value) => self.assign(node, value).map(drop),
            DiffOp::Set { key, val } => self.set(node, key, val),
            DiffOp::Del(key) => self.del(node, key),
            DiffOp::Move {
                key,
                new_parent,
                new_key,
            } => {
                let new_parent = self.resolve_chain(root, &new_parent)?;
                self.move_child(node, key, new_parent, new_key)
            }
            DiffOp::Pop => self.pop(node).map(drop),
            DiffOp::Push(items) => self.push(node, items).map(drop),
            DiffOp::Rename(pairs) => self.rename(node, pairs),
            DiffOp::Reverse => self.reverse(node),
            DiffOp::Shift => self.shift(node).map(drop),
            DiffOp::Splice {
                start,
                delete_count,
                items,
            } => {
                let start = i64::try_from(start).unwrap_or(i64::MAX);
                self.splice(node, start, Some(delete_count), items).map(drop)
            }
            DiffOp::Swap { key, target } => {
                let target = self.resolve_chain(root, &target)?;
                self.swap(node, key, target)
            }
            DiffOp::Unshift(items) => self.unshift(node, items).map(drop),
        }
    }
}
