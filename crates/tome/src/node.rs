//! Node storage types.
//!
//! A node is one JSON value in a tree. Its [`Payload`] is a tagged union:
//! scalars hold their value inline, containers hold the ids of their child
//! nodes. `parent` and `root` are plain ids into the owning
//! [`Forest`](crate::Forest), so they never keep anything alive; the child
//! lists inside container payloads are the only ownership edges.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::diff::DiffEntry;
use crate::event::Listeners;
use crate::key::Key;
use crate::plain::Plain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Array,
    Object,
    Boolean,
    Number,
    String,
    Null,
    Unset,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Array => "array",
            TypeTag::Object => "object",
            TypeTag::Boolean => "boolean",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::Null => "null",
            TypeTag::Unset => "unset",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, TypeTag::Array | TypeTag::Object)
    }

    /// Type tag of a raw value.
    pub fn of(value: &Plain) -> Self {
        value.type_tag()
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Payload {
    Unset,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<NodeId>),
    Object(BTreeMap<String, NodeId>),
}

impl Payload {
    pub(crate) fn tag(&self) -> TypeTag {
        match self {
            Payload::Unset => TypeTag::Unset,
            Payload::Null => TypeTag::Null,
            Payload::Boolean(_) => TypeTag::Boolean,
            Payload::Number(_) => TypeTag::Number,
            Payload::String(_) => TypeTag::String,
            Payload::Array(_) => TypeTag::Array,
            Payload::Object(_) => TypeTag::Object,
        }
    }

    /// Scalar payload for `value`; `None` for containers.
    pub(crate) fn scalar(value: &Plain) -> Option<Self> {
        Some(match value {
            Plain::Unset => Payload::Unset,
            Plain::Null => Payload::Null,
            Plain::Bool(b) => Payload::Boolean(*b),
            Plain::Number(n) => Payload::Number(*n),
            Plain::Str(s) => Payload::String(s.clone()),
            Plain::Array(_) | Plain::Object(_) => return None,
        })
    }

    /// Plain form of a scalar payload; `None` for containers.
    pub(crate) fn scalar_plain(&self) -> Option<Plain> {
        Some(match self {
            Payload::Unset => Plain::Unset,
            Payload::Null => Plain::Null,
            Payload::Boolean(b) => Plain::Bool(*b),
            Payload::Number(n) => Plain::Number(*n),
            Payload::String(s) => Plain::Str(s.clone()),
            Payload::Array(_) | Payload::Object(_) => return None,
        })
    }

    pub(crate) fn children(&self) -> Vec<NodeId> {
        match self {
            Payload::Array(items) => items.clone(),
            Payload::Object(map) => map.values().copied().collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn entries(&self) -> Vec<(Key, NodeId)> {
        match self {
            Payload::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, id)| (Key::Index(i), *id))
                .collect(),
            Payload::Object(map) => map
                .iter()
                .map(|(k, id)| (Key::Name(k.clone()), *id))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Root-only state: the operation log and version counter.
#[derive(Debug)]
pub(crate) struct Journal {
    pub(crate) log: VecDeque<DiffEntry>,
    pub(crate) version: u64,
    pub(crate) logging: bool,
}

impl Journal {
    pub(crate) fn new(logging: bool) -> Self {
        Self {
            log: VecDeque::new(),
            version: 0,
            logging,
        }
    }
}

#[derive(Debug)]
pub struct Node {
    pub(crate) payload: Payload,
    pub(crate) parent: Option<NodeId>,
    pub(crate) root: NodeId,
    pub(crate) key: Option<Key>,
    pub(crate) dirty: u64,
    pub(crate) listeners: Listeners,
    pub(crate) journal: Option<Journal>,
}

impl Node {
    pub(crate) fn new(
        parent: Option<NodeId>,
        root: NodeId,
        key: Option<Key>,
        dirty: u64,
        journal: Option<Journal>,
    ) -> Self {
        Self {
            payload: Payload::Null,
            parent,
            root,
            key,
            dirty,
            listeners: Listeners::default(),
            journal,
        }
    }

    pub fn type_tag(&self) -> TypeTag {
        self.payload.tag()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn dirty_version(&self) -> u64 {
        self.dirty
    }
}
