//! Array structural operations.
//!
//! The backing `Vec<NodeId>` of an array payload is the single source of
//! truth for positions; after any reordering every child's `key` is rewritten
//! from its position with [`Forest::reindex`]. Unset slots occupy positions
//! like any element but are never announced with `add`/`del`.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::diff::DiffOp;
use crate::error::{TomeError, TomeResult};
use crate::event::TomeEvent;
use crate::forest::Forest;
use crate::key::Key;
use crate::node::{NodeId, Payload};
use crate::plain::Plain;

impl Forest {
    /// Appends `items` and returns the new length.
    pub fn push(&mut self, node: NodeId, items: Vec<Plain>) -> TomeResult<usize> {
        self.in_pass(|forest| forest.push_inner(node, items))
    }

    /// Prepends `items` and returns the new length.
    pub fn unshift(&mut self, node: NodeId, items: Vec<Plain>) -> TomeResult<usize> {
        self.in_pass(|forest| forest.unshift_inner(node, items))
    }

    /// Removes and returns the last element; `None` on an empty array.
    pub fn pop(&mut self, node: NodeId) -> TomeResult<Option<Plain>> {
        self.in_pass(|forest| forest.remove_edge(node, Edge::Back))
    }

    /// Removes and returns the first element; `None` on an empty array.
    pub fn shift(&mut self, node: NodeId) -> TomeResult<Option<Plain>> {
        self.in_pass(|forest| forest.remove_edge(node, Edge::Front))
    }

    /// Removes `delete_count` elements at `start` and inserts `items` there.
    ///
    /// `start` follows `Array.prototype.splice`: negative values count from
    /// the end and the result is clamped to `[0, len]`. A missing
    /// `delete_count` removes everything from `start` on. Returns the removed
    /// values.
    pub fn splice(
        &mut self,
        node: NodeId,
        start: i64,
        delete_count: Option<usize>,
        items: Vec<Plain>,
    ) -> TomeResult<Vec<Plain>> {
        self.in_pass(|forest| forest.splice_inner(node, start, delete_count, items))
    }

    pub fn reverse(&mut self, node: NodeId) -> TomeResult<()> {
        self.in_pass(|forest| forest.reverse_inner(node))
    }

    /// Sorts with the default ordering: by string form, unset slots last.
    pub fn sort(&mut self, node: NodeId) -> TomeResult<()> {
        self.sort_by(node, default_order)
    }

    /// Stable sort with a caller-supplied comparator. Logged as a single
    /// `rename` of the elements that changed position.
    pub fn sort_by<F>(&mut self, node: NodeId, compare: F) -> TomeResult<()>
    where
        F: FnMut(&Plain, &Plain) -> Ordering,
    {
        self.in_pass(|forest| forest.sort_inner(node, compare))
    }

    pub(crate) fn array_items(&self, id: NodeId, op: &'static str) -> TomeResult<Vec<NodeId>> {
        match &self.node(id)?.payload {
            Payload::Array(items) => Ok(items.clone()),
            other => Err(TomeError::TypeMismatch {
                op,
                expected: "array",
                found: other.tag(),
            }),
        }
    }

    fn set_items(&mut self, id: NodeId, items: Vec<NodeId>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.payload = Payload::Array(items);
        }
        self.reindex(id);
    }

    fn announce_added(&mut self, id: NodeId, added: &[(usize, NodeId)]) {
        for &(index, child) in added {
            if !self.is_unset_node(child) {
                self.emit(id, &TomeEvent::Add { key: Key::Index(index), node: child });
            }
        }
    }

    pub(crate) fn push_inner(&mut self, id: NodeId, values: Vec<Plain>) -> TomeResult<usize> {
        let mut items = self.array_items(id, "push")?;
        let depth = self.depth_of(id)? + 1;
        for value in &values {
            self.check_depth(depth, value.depth())?;
        }
        if values.is_empty() {
            return Ok(items.len());
        }
        let base = items.len();
        let added: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(offset, value)| {
                let index = base + offset;
                (index, self.build(value, Some(id), Some(Key::Index(index))))
            })
            .collect();
        items.extend(added.iter().map(|(_, child)| *child));
        let len = items.len();
        self.set_items(id, items);
        self.announce_added(id, &added);
        self.log(id, DiffOp::Push(values))?;
        self.mark_dirty(id, None);
        Ok(len)
    }

    pub(crate) fn unshift_inner(&mut self, id: NodeId, values: Vec<Plain>) -> TomeResult<usize> {
        let items = self.array_items(id, "unshift")?;
        let depth = self.depth_of(id)? + 1;
        for value in &values {
            self.check_depth(depth, value.depth())?;
        }
        if values.is_empty() {
            return Ok(items.len());
        }
        let added: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(index, value)| (index, self.build(value, Some(id), Some(Key::Index(index)))))
            .collect();
        let mut next: Vec<NodeId> = added.iter().map(|(_, child)| *child).collect();
        next.extend(items);
        let len = next.len();
        self.set_items(id, next);
        self.announce_added(id, &added);
        self.log(id, DiffOp::Unshift(values))?;
        self.mark_dirty(id, None);
        Ok(len)
    }

    fn remove_edge(&mut self, id: NodeId, edge: Edge) -> TomeResult<Option<Plain>> {
        let (op, log_op) = match edge {
            Edge::Back => ("pop", DiffOp::Pop),
            Edge::Front => ("shift", DiffOp::Shift),
        };
        let mut items = self.array_items(id, op)?;
        if items.is_empty() {
            return Ok(None);
        }
        let index = match edge {
            Edge::Back => items.len() - 1,
            Edge::Front => 0,
        };
        let child = items.remove(index);
        let value = self.un_tome(child)?;
        self.set_items(id, items);
        self.destroy_subtree(child);
        if !value.is_unset() {
            self.emit(id, &TomeEvent::Del { key: Key::Index(index) });
        }
        self.log(id, log_op)?;
        self.mark_dirty(id, None);
        Ok(Some(value))
    }

    pub(crate) fn splice_inner(
        &mut self,
        id: NodeId,
        start: i64,
        delete_count: Option<usize>,
        values: Vec<Plain>,
    ) -> TomeResult<Vec<Plain>> {
        let mut items = self.array_items(id, "splice")?;
        let len = items.len();
        let start = clamp_start(start, len);
        let delete_count = delete_count.unwrap_or(len - start).min(len - start);
        let depth = self.depth_of(id)? + 1;
        for value in &values {
            self.check_depth(depth, value.depth())?;
        }
        if delete_count == 0 && values.is_empty() {
            return Ok(Vec::new());
        }

        let removed_ids: Vec<NodeId> = items[start..start + delete_count].to_vec();
        let removed = removed_ids
            .iter()
            .map(|child| self.un_tome(*child))
            .collect::<TomeResult<Vec<_>>>()?;
        let added: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(offset, value)| {
                let index = start + offset;
                (index, self.build(value, Some(id), Some(Key::Index(index))))
            })
            .collect();
        items.splice(start..start + delete_count, added.iter().map(|(_, child)| *child));
        self.set_items(id, items);

        for (offset, (child, value)) in removed_ids.iter().zip(&removed).enumerate() {
            self.destroy_subtree(*child);
            if !value.is_unset() {
                self.emit(id, &TomeEvent::Del { key: Key::Index(start + offset) });
            }
        }
        self.announce_added(id, &added);
        self.log(
            id,
            DiffOp::Splice {
                start,
                delete_count,
                items: values,
            },
        )?;
        self.mark_dirty(id, None);
        Ok(removed)
    }

    pub(crate) fn reverse_inner(&mut self, id: NodeId) -> TomeResult<()> {
        let mut items = self.array_items(id, "reverse")?;
        items.reverse();
        self.set_items(id, items);
        self.log(id, DiffOp::Reverse)?;
        self.mark_dirty(id, None);
        Ok(())
    }

    fn sort_inner<F>(&mut self, id: NodeId, mut compare: F) -> TomeResult<()>
    where
        F: FnMut(&Plain, &Plain) -> Ordering,
    {
        let items = self.array_items(id, "sort")?;
        let values = items
            .iter()
            .map(|child| self.un_tome(*child))
            .collect::<TomeResult<Vec<_>>>()?;
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by(|a, b| compare(&values[*a], &values[*b]));

        let moves: Vec<(Key, Key)> = order
            .iter()
            .enumerate()
            .filter(|(new, old)| *new != **old)
            .map(|(new, old)| (Key::Index(*old), Key::Index(new)))
            .collect();
        if moves.is_empty() {
            return Ok(());
        }
        self.rename_elements(id, moves)
    }

    /// Moves each element from its old index to its new one. The pairs must
    /// permute a subset of the existing indices.
    pub(crate) fn rename_elements(&mut self, id: NodeId, pairs: Vec<(Key, Key)>) -> TomeResult<()> {
        let items = self.array_items(id, "rename")?;
        let len = items.len();
        let mut moves = Vec::with_capacity(pairs.len());
        for (old, new) in &pairs {
            let from = old
                .as_index()
                .filter(|i| *i < len)
                .ok_or_else(|| TomeError::UndefinedKey { key: old.clone() })?;
            let to = new
                .as_index()
                .filter(|i| *i < len)
                .ok_or_else(|| TomeError::InvalidRename(format!("index {new} is out of range")))?;
            moves.push((from, to));
        }
        if moves.is_empty() {
            return Ok(());
        }
        let sources: HashSet<usize> = moves.iter().map(|(from, _)| *from).collect();
        let targets: HashSet<usize> = moves.iter().map(|(_, to)| *to).collect();
        if sources.len() != moves.len() || targets.len() != moves.len() || sources != targets {
            return Err(TomeError::InvalidRename(
                "array renames must permute existing indices".to_owned(),
            ));
        }

        let mut next = items.clone();
        for &(from, to) in &moves {
            next[to] = items[from];
        }
        self.set_items(id, next);
        let logged = moves
            .into_iter()
            .map(|(from, to)| (Key::Index(from), Key::Index(to)))
            .collect();
        self.log(id, DiffOp::Rename(logged))?;
        self.mark_dirty(id, None);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Edge {
    Front,
    Back,
}

fn clamp_start(start: i64, len: usize) -> usize {
    if start < 0 {
        let back = usize::try_from(start.unsigned_abs()).unwrap_or(usize::MAX);
        len.saturating_sub(back)
    } else {
        usize::try_from(start).unwrap_or(usize::MAX).min(len)
    }
}

fn default_order(a: &Plain, b: &Plain) -> Ordering {
    match (a.is_unset(), b.is_unset()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.to_js_string().cmp(&b.to_js_string()),
    }
}
