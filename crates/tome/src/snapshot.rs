//! Point-in-time capture and rollback of a whole tree.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::diff::DiffEntry;
use crate::error::{TomeError, TomeResult};
use crate::forest::Forest;
use crate::node::NodeId;
use crate::plain::Plain;

/// Content, unread log and version of a tree at one moment.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub content: Plain,
    pub diff: Vec<DiffEntry>,
    pub version: u64,
}

impl Snapshot {
    pub fn to_json(&self) -> Value {
        json!({
            "content": self.content.to_json(),
            "diff": self.diff.iter().map(DiffEntry::to_json).collect::<Vec<_>>(),
            "version": self.version,
        })
    }

    pub fn from_json(v: &Value) -> TomeResult<Self> {
        let obj = v
            .as_object()
            .ok_or_else(|| TomeError::malformed("snapshot", "snapshot must be an object"))?;
        let content = obj
            .get("content")
            .map(Plain::from)
            .ok_or_else(|| TomeError::malformed("snapshot", "missing content"))?;
        let diff = match obj.get("diff") {
            Some(Value::Array(items)) => items
                .iter()
                .map(DiffEntry::from_json)
                .collect::<TomeResult<Vec<_>>>()?,
            None => Vec::new(),
            Some(_) => return Err(TomeError::malformed("snapshot", "diff must be an array")),
        };
        let version = obj
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| TomeError::malformed("snapshot", "version must be an unsigned integer"))?;
        Ok(Self {
            content,
            diff,
            version,
        })
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(deserializer)?;
        Snapshot::from_json(&v).map_err(serde::de::Error::custom)
    }
}

impl Forest {
    /// Captures `root`'s tree. When `existing` was taken at the current
    /// version it is returned as is, sharing the same allocation.
    pub fn take_snapshot(
        &self,
        root: NodeId,
        existing: Option<&Arc<Snapshot>>,
    ) -> TomeResult<Arc<Snapshot>> {
        self.require_root(root)?;
        let journal = self.journal(root)?;
        if let Some(existing) = existing.filter(|s| s.version == journal.version) {
            return Ok(Arc::clone(existing));
        }
        let snapshot = Snapshot {
            content: self.un_tome(root)?,
            diff: journal.log.iter().cloned().collect(),
            version: journal.version,
        };
        tracing::debug!(root = %root, version = snapshot.version, "take snapshot");
        Ok(Arc::new(snapshot))
    }

    /// Rolls `root`'s tree back (or forward) to `snapshot`.
    ///
    /// Version and log are replaced by the snapshot's, then the content is
    /// reassigned with logging off. Nodes touched by the rebuild are stamped
    /// with the restored version, which is not advanced.
    pub fn restore_snapshot(&mut self, root: NodeId, snapshot: &Snapshot) -> TomeResult<()> {
        self.require_root(root)?;
        if self.journal(root)?.version == snapshot.version {
            return Ok(());
        }
        if snapshot.content.is_unset() {
            return Err(TomeError::InvalidUnsetPlacement);
        }
        self.check_depth(0, snapshot.content.depth())?;

        let journal = self.journal_mut(root)?;
        journal.version = snapshot.version;
        journal.log = snapshot.diff.iter().cloned().collect();
        let logging = std::mem::replace(&mut journal.logging, false);

        let result = self.in_pinned_pass(root, |forest| {
            forest.assign_inner(root, snapshot.content.clone(), true)
        });
        self.journal_mut(root)?.logging = logging;
        self.clamp_dirty(root, snapshot.version);
        tracing::debug!(root = %root, version = snapshot.version, "restore snapshot");
        result.map(drop)
    }

    /// Keeps every node's dirty stamp at or below `version` after the
    /// version moved backwards.
    fn clamp_dirty(&mut self, root: NodeId, version: u64) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.dirty = node.dirty.min(version);
                stack.extend(node.payload.children());
            }
        }
    }
}
