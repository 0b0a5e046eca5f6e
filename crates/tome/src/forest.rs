//! Arena holding every node of one or more trees.
//!
//! Nodes are addressed by [`NodeId`]. Ids are never reused, so an id that
//! outlives its node fails lookups with [`TomeError::UnknownNode`] instead of
//! aliasing a newer node. Each root owns a journal (operation log, version
//! counter, logging flag); every other node reaches its journal through its
//! `root` id.
//!
//! Mutations run inside a *pass*. The first node a pass marks dirty bumps
//! its root's version once; every node stamped during the pass gets that
//! version, which is what limits `readable` to one emission per node per
//! externally triggered operation.

use std::collections::{HashMap, HashSet};

use crate::config::TomeConfig;
use crate::diff::{DiffEntry, DiffOp};
use crate::error::{TomeError, TomeResult};
use crate::event::{ListenerId, TomeEvent};
use crate::key::{format_chain, Chain, Key};
use crate::node::{Journal, Node, NodeId, Payload, TypeTag};
use crate::plain::Plain;

#[derive(Debug)]
pub struct Forest {
    pub(crate) nodes: HashMap<NodeId, Node>,
    next_id: u64,
    pub(crate) config: TomeConfig,
    pass_depth: usize,
    /// Roots whose version was bumped in the current pass.
    touched: Vec<(NodeId, u64)>,
}

impl Default for Forest {
    fn default() -> Self {
        Self::new()
    }
}

impl Forest {
    pub fn new() -> Self {
        Self::with_config(TomeConfig::default())
    }

    pub fn with_config(config: TomeConfig) -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 1,
            config,
            pass_depth: 0,
            touched: Vec::new(),
        }
    }

    pub fn config(&self) -> &TomeConfig {
        &self.config
    }

    // ── Construction ──────────────────────────────────────────────────────

    /// Builds a new tree from `value` and returns its root.
    pub fn conjure(&mut self, value: impl Into<Plain>) -> TomeResult<NodeId> {
        let value = value.into();
        if value.is_unset() {
            return Err(TomeError::InvalidUnsetPlacement);
        }
        self.check_depth(0, value.depth())?;
        Ok(self.build(&value, None, None))
    }

    /// Builds a new, independent tree holding a copy of `node`'s content.
    pub fn clone_tree(&mut self, node: NodeId) -> TomeResult<NodeId> {
        let value = self.un_tome(node)?;
        self.conjure(value)
    }

    /// Tears down a whole tree. Children are removed with `del` instead.
    pub fn destroy(&mut self, root: NodeId) -> TomeResult<()> {
        self.require_root(root)?;
        self.destroy_subtree(root);
        Ok(())
    }

    // ── Inspection ────────────────────────────────────────────────────────

    /// Whether `id` names a live node of this forest.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn type_of(&self, id: NodeId) -> TomeResult<TypeTag> {
        Ok(self.node(id)?.payload.tag())
    }

    /// Exports the subtree at `id` as a plain value.
    pub fn un_tome(&self, id: NodeId) -> TomeResult<Plain> {
        let mut seen = HashSet::new();
        self.export(id, 0, &mut seen)
    }

    pub fn value_of(&self, id: NodeId) -> TomeResult<Plain> {
        self.un_tome(id)
    }

    pub fn to_js_string(&self, id: NodeId) -> TomeResult<String> {
        Ok(self.un_tome(id)?.to_js_string())
    }

    pub fn get_key(&self, id: NodeId) -> TomeResult<Option<Key>> {
        Ok(self.node(id)?.key.clone())
    }

    pub fn get_parent(&self, id: NodeId) -> TomeResult<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn get_root(&self, id: NodeId) -> TomeResult<NodeId> {
        Ok(self.node(id)?.root)
    }

    pub fn is_root(&self, id: NodeId) -> TomeResult<bool> {
        Ok(self.node(id)?.parent.is_none())
    }

    /// Version of the tree `id` belongs to.
    pub fn get_version(&self, id: NodeId) -> TomeResult<u64> {
        let root = self.node(id)?.root;
        Ok(self.journal(root)?.version)
    }

    /// Whether `id` or a descendant changed at the tree's current version.
    pub fn is_dirty(&self, id: NodeId) -> TomeResult<bool> {
        let node = self.node(id)?;
        Ok(node.dirty == self.journal(node.root)?.version)
    }

    /// Child exposed under `key`. Unset array slots are not exposed.
    pub fn child(&self, id: NodeId, key: impl Into<Key>) -> TomeResult<Option<NodeId>> {
        self.node(id)?;
        Ok(self.child_of(id, &key.into()))
    }

    /// Exposed keys, in index order for arrays and name order for objects.
    pub fn keys(&self, id: NodeId) -> TomeResult<Vec<Key>> {
        let entries = self.node(id)?.payload.entries();
        Ok(entries
            .into_iter()
            .filter(|(_, child)| !self.is_unset_node(*child))
            .map(|(key, _)| key)
            .collect())
    }

    /// Array length (unset slots included) or object member count.
    pub fn len(&self, id: NodeId) -> TomeResult<usize> {
        Ok(match &self.node(id)?.payload {
            Payload::Array(items) => items.len(),
            Payload::Object(map) => map.len(),
            _ => 0,
        })
    }

    /// Path from the root to `id`.
    pub fn chain_of(&self, id: NodeId) -> TomeResult<Chain> {
        let mut chain = Vec::new();
        let mut cur = self.node(id)?;
        while let Some(parent) = cur.parent {
            if chain.len() > self.nodes.len() {
                return Err(TomeError::CircularReference);
            }
            if let Some(key) = &cur.key {
                chain.push(key.clone());
            }
            cur = self.node(parent)?;
        }
        chain.reverse();
        Ok(chain)
    }

    /// Walks `chain` down from `root`, one exposed child per key.
    pub fn resolve_chain(&self, root: NodeId, chain: &[Key]) -> TomeResult<NodeId> {
        let mut cur = root;
        self.node(cur)?;
        for key in chain {
            cur = self
                .child_of(cur, key)
                .ok_or_else(|| TomeError::ChainResolution {
                    chain: chain.to_vec(),
                    key: key.clone(),
                })?;
        }
        Ok(cur)
    }

    // ── Listeners ─────────────────────────────────────────────────────────

    pub fn on<F>(&mut self, id: NodeId, listener: F) -> TomeResult<ListenerId>
    where
        F: FnMut(&TomeEvent) + Send + Sync + 'static,
    {
        Ok(self.node_mut(id)?.listeners.add(Box::new(listener)))
    }

    pub fn off(&mut self, id: NodeId, listener: ListenerId) -> bool {
        self.nodes
            .get_mut(&id)
            .is_some_and(|node| node.listeners.remove(listener))
    }

    /// Turns operation logging on or off for the tree rooted at `root`.
    pub fn set_logging(&mut self, root: NodeId, enabled: bool) -> TomeResult<()> {
        self.journal_mut(root)?.logging = enabled;
        Ok(())
    }

    pub fn is_logging(&self, root: NodeId) -> TomeResult<bool> {
        Ok(self.journal(root)?.logging)
    }

    // ── Internals ─────────────────────────────────────────────────────────

    pub(crate) fn node(&self, id: NodeId) -> TomeResult<&Node> {
        self.nodes.get(&id).ok_or(TomeError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> TomeResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(TomeError::UnknownNode(id))
    }

    pub(crate) fn require_root(&self, id: NodeId) -> TomeResult<()> {
        if self.node(id)?.parent.is_some() {
            return Err(TomeError::NotARoot(id));
        }
        Ok(())
    }

    pub(crate) fn journal(&self, root: NodeId) -> TomeResult<&Journal> {
        self.node(root)?
            .journal
            .as_ref()
            .ok_or(TomeError::NotARoot(root))
    }

    pub(crate) fn journal_mut(&mut self, root: NodeId) -> TomeResult<&mut Journal> {
        self.node_mut(root)?
            .journal
            .as_mut()
            .ok_or(TomeError::NotARoot(root))
    }

    pub(crate) fn is_unset_node(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|n| matches!(n.payload, Payload::Unset))
    }

    pub(crate) fn child_of(&self, id: NodeId, key: &Key) -> Option<NodeId> {
        match &self.nodes.get(&id)?.payload {
            Payload::Object(map) => map.get(key.as_name().as_ref()).copied(),
            Payload::Array(items) => key
                .as_index()
                .and_then(|i| items.get(i).copied())
                .filter(|child| !self.is_unset_node(*child)),
            _ => None,
        }
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub(crate) fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = Some(id);
        let mut steps = 0;
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return false;
            }
            cur = self.nodes.get(&n).and_then(|node| node.parent);
        }
        false
    }

    /// Rejects a subtree `height` container levels tall placed at `depth`
    /// (the chain length of its slot) when its deepest node would land
    /// below `max_depth`.
    pub(crate) fn check_depth(&self, depth: usize, height: usize) -> TomeResult<()> {
        if depth.saturating_add(height) > self.config.max_depth {
            return Err(TomeError::DepthLimit(self.config.max_depth));
        }
        Ok(())
    }

    /// Chain length of `id`; zero for a root.
    pub(crate) fn depth_of(&self, id: NodeId) -> TomeResult<usize> {
        Ok(self.chain_of(id)?.len())
    }

    /// Container levels in the subtree at `id`, counted like [`Plain::depth`].
    pub(crate) fn height(&self, id: NodeId) -> usize {
        let mut max = 0;
        let mut stack = vec![(id, 0usize)];
        while let Some((n, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(&n) else {
                continue;
            };
            if node.payload.tag().is_container() {
                max = max.max(depth + 1);
                stack.extend(node.payload.children().into_iter().map(|c| (c, depth + 1)));
            }
        }
        max
    }

    /// Allocates a node for `value` (and its descendants) under `parent`.
    pub(crate) fn build(&mut self, value: &Plain, parent: Option<NodeId>, key: Option<Key>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let (root, journal) = match parent.and_then(|p| self.nodes.get(&p)) {
            Some(p) => (p.root, None),
            None => (id, Some(Journal::new(self.config.logging))),
        };
        let dirty = if journal.is_some() { 0 } else { self.stamp(root) };
        self.nodes.insert(id, Node::new(parent, root, key, dirty, journal));
        let payload = self.build_payload(id, value);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.payload = payload;
        }
        id
    }

    pub(crate) fn build_payload(&mut self, owner: NodeId, value: &Plain) -> Payload {
        match value {
            Plain::Array(items) => Payload::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| self.build(v, Some(owner), Some(Key::Index(i))))
                    .collect(),
            ),
            Plain::Object(map) => Payload::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_unset())
                    .map(|(k, v)| {
                        let child = self.build(v, Some(owner), Some(Key::Name(k.clone())));
                        (k.clone(), child)
                    })
                    .collect(),
            ),
            scalar => Payload::scalar(scalar).unwrap_or(Payload::Null),
        }
    }

    fn export(&self, id: NodeId, depth: usize, seen: &mut HashSet<NodeId>) -> TomeResult<Plain> {
        if !seen.insert(id) {
            return Err(TomeError::CircularReference);
        }
        if depth > self.config.max_depth {
            return Err(TomeError::DepthLimit(self.config.max_depth));
        }
        let node = self.node(id)?;
        Ok(match &node.payload {
            Payload::Array(items) => Plain::Array(
                items
                    .iter()
                    .map(|child| self.export(*child, depth + 1, seen))
                    .collect::<TomeResult<_>>()?,
            ),
            Payload::Object(map) => Plain::Object(
                map.iter()
                    .map(|(k, child)| Ok((k.clone(), self.export(*child, depth + 1, seen)?)))
                    .collect::<TomeResult<_>>()?,
            ),
            scalar => scalar.scalar_plain().unwrap_or(Plain::Null),
        })
    }

    /// Removes the subtree at `id` from the arena, children first. Each node
    /// gets its `Destroy` event before its listeners are dropped with it.
    pub(crate) fn destroy_subtree(&mut self, id: NodeId) {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(node) = self.nodes.get(&n) {
                order.push(n);
                stack.extend(node.payload.children());
            }
        }
        for n in order.into_iter().rev() {
            self.emit(n, &TomeEvent::Destroy);
            self.nodes.remove(&n);
        }
    }

    /// Points every node of the subtree at `id` to `root`.
    pub(crate) fn reroot(&mut self, id: NodeId, root: NodeId) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(&n) {
                node.root = root;
                stack.extend(node.payload.children());
            }
        }
    }

    /// Rewrites the `key` of every child of the array `id` to its position.
    pub(crate) fn reindex(&mut self, id: NodeId) {
        let items = match self.nodes.get(&id).map(|n| &n.payload) {
            Some(Payload::Array(items)) => items.clone(),
            _ => return,
        };
        for (i, child) in items.into_iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(&child) {
                node.key = Some(Key::Index(i));
            }
        }
    }

    pub(crate) fn emit(&mut self, id: NodeId, event: &TomeEvent) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.listeners.dispatch(event);
        }
    }

    /// Runs `f` as one mutation pass.
    pub(crate) fn in_pass<T>(&mut self, f: impl FnOnce(&mut Self) -> TomeResult<T>) -> TomeResult<T> {
        self.pass_depth += 1;
        let result = f(self);
        self.pass_depth -= 1;
        if self.pass_depth == 0 {
            self.touched.clear();
        }
        result
    }

    /// Runs `f` as a pass whose stamp for `root` is its current version, so
    /// the pass changes the tree without advancing the version.
    pub(crate) fn in_pinned_pass<T>(
        &mut self,
        root: NodeId,
        f: impl FnOnce(&mut Self) -> TomeResult<T>,
    ) -> TomeResult<T> {
        let version = self.journal(root)?.version;
        self.in_pass(|forest| {
            forest.touched.push((root, version));
            f(forest)
        })
    }

    /// Version stamp for nodes of `root` touched by the current pass. Outside
    /// a pass this is the root's version as is.
    fn stamp(&mut self, root: NodeId) -> u64 {
        if let Some((_, version)) = self.touched.iter().find(|(r, _)| *r == root) {
            return *version;
        }
        let in_pass = self.pass_depth > 0;
        let Some(journal) = self.nodes.get_mut(&root).and_then(|n| n.journal.as_mut()) else {
            return 0;
        };
        if !in_pass {
            return journal.version;
        }
        journal.version += 1;
        let version = journal.version;
        self.touched.push((root, version));
        version
    }

    /// Stamps `id` and its ancestors with the pass version, emitting
    /// `readable` on each node not already stamped in this pass.
    pub(crate) fn mark_dirty(&mut self, id: NodeId, was: Option<Plain>) {
        let Some(root) = self.nodes.get(&id).map(|n| n.root) else {
            return;
        };
        let version = self.stamp(root);
        let mut was = was;
        let mut cur = Some(id);
        while let Some(n) = cur {
            let Some(node) = self.nodes.get_mut(&n) else {
                break;
            };
            cur = node.parent;
            if node.dirty == version {
                was = None;
                continue;
            }
            node.dirty = version;
            let event = TomeEvent::Readable { was: was.take() };
            node.listeners.dispatch(&event);
        }
    }

    /// Appends `op` to the log of the tree `id` belongs to, addressed by
    /// `id`'s current chain.
    pub(crate) fn log(&mut self, id: NodeId, op: DiffOp) -> TomeResult<()> {
        let root = self.node(id)?.root;
        if !self.journal(root)?.logging {
            return Ok(());
        }
        let chain = self.chain_of(id)?;
        self.log_at(root, chain, op)
    }

    /// Appends `op` addressed by a chain captured before the mutation ran.
    pub(crate) fn log_at(&mut self, root: NodeId, chain: Chain, op: DiffOp) -> TomeResult<()> {
        let journal = self.journal_mut(root)?;
        if !journal.logging {
            return Ok(());
        }
        let entry = DiffEntry::new(chain, op);
        tracing::trace!(
            root = %root,
            op = entry.op.name(),
            chain = %format_chain(&entry.chain),
            "append diff entry"
        );
        journal.log.push_back(entry.clone());
        self.emit(root, &TomeEvent::Diff(entry));
        Ok(())
    }
}
