//! Per-node change notifications.
//!
//! Every node carries its own listener table. Delivery is synchronous and in
//! registration order; listeners see the event only, never the forest, so
//! they cannot re-enter a mutation that is still running.

use std::collections::BTreeMap;
use std::fmt;

use crate::diff::DiffEntry;
use crate::key::Key;
use crate::node::{NodeId, TypeTag};
use crate::plain::Plain;

#[derive(Debug, Clone, PartialEq)]
pub enum TomeEvent {
    /// A child appeared under `key`.
    Add { key: Key, node: NodeId },
    /// The child under `key` went away.
    Del { key: Key },
    /// This node is being torn down; no further events follow.
    Destroy,
    /// This node or a descendant changed. `was` holds the previous value
    /// for scalar-to-scalar transitions of the node itself.
    Readable { was: Option<Plain> },
    /// The node's type tag changed.
    TypeChange { from: TypeTag, to: TypeTag },
    /// An entry was appended to this root's operation log.
    Diff(DiffEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Add,
    Del,
    Destroy,
    Readable,
    TypeChange,
    Diff,
}

impl TomeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TomeEvent::Add { .. } => EventKind::Add,
            TomeEvent::Del { .. } => EventKind::Del,
            TomeEvent::Destroy => EventKind::Destroy,
            TomeEvent::Readable { .. } => EventKind::Readable,
            TomeEvent::TypeChange { .. } => EventKind::TypeChange,
            TomeEvent::Diff(_) => EventKind::Diff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&TomeEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    map: BTreeMap<u64, Listener>,
}

impl Listeners {
    pub(crate) fn add(&mut self, listener: Listener) -> ListenerId {
        self.next_id = self.next_id.saturating_add(1);
        self.map.insert(self.next_id, listener);
        ListenerId(self.next_id)
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        self.map.remove(&id.0).is_some()
    }

    pub(crate) fn dispatch(&mut self, event: &TomeEvent) {
        for listener in self.map.values_mut() {
            listener(event);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.map.len())
            .finish()
    }
}
