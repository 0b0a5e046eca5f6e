//! Relocating nodes: `move`, `swap` and key `rename`.
//!
//! `move` and `swap` may cross between trees of the same forest. Within one
//! tree they log a single entry. Across trees no single entry can address
//! both logs, so each side logs what a replica of that tree alone needs: the
//! source a `del` (for `move`), the destination a placement of the arriving
//! value. A placement into an object is a `set`; a placement into an array
//! is a `splice`, since `set` would turn a replica's array into an object.

use std::collections::HashSet;

use crate::diff::DiffOp;
use crate::error::{TomeError, TomeResult};
use crate::event::TomeEvent;
use crate::forest::Forest;
use crate::key::Key;
use crate::node::{NodeId, Payload, TypeTag};
use crate::plain::Plain;

impl Forest {
    /// Remaps keys of an array or object.
    ///
    /// For arrays the pairs must permute existing indices. For objects each
    /// old key must exist; a new key that already exists is overwritten. All
    /// pairs are validated before anything changes.
    pub fn rename(&mut self, node: NodeId, pairs: Vec<(Key, Key)>) -> TomeResult<()> {
        self.in_pass(|forest| forest.rename_inner(node, pairs))
    }

    /// Moves the child at `key` under `new_parent` as `new_key` (default:
    /// the same key). `new_parent` becomes an object unless it is an array
    /// and the destination key is an index.
    pub fn move_child(
        &mut self,
        node: NodeId,
        key: impl Into<Key>,
        new_parent: NodeId,
        new_key: Option<Key>,
    ) -> TomeResult<()> {
        let key = key.into();
        self.in_pass(|forest| forest.move_inner(node, key, new_parent, new_key))
    }

    /// Exchanges the child at `key` with `target`, which must not be a root.
    pub fn swap(&mut self, node: NodeId, key: impl Into<Key>, target: NodeId) -> TomeResult<()> {
        let key = key.into();
        self.in_pass(|forest| forest.swap_inner(node, key, target))
    }

    pub(crate) fn rename_inner(&mut self, id: NodeId, pairs: Vec<(Key, Key)>) -> TomeResult<()> {
        match self.node(id)?.payload.tag() {
            TypeTag::Array => self.rename_elements(id, pairs),
            TypeTag::Object => self.rename_members(id, pairs),
            found => Err(TomeError::TypeMismatch {
                op: "rename",
                expected: "array or object",
                found,
            }),
        }
    }

    fn rename_members(&mut self, id: NodeId, pairs: Vec<(Key, Key)>) -> TomeResult<()> {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(old, new)| (old.into_name(), new.into_name()))
            .collect();
        let mut present: HashSet<String> = match &self.node(id)?.payload {
            Payload::Object(map) => map.keys().cloned().collect(),
            _ => HashSet::new(),
        };
        for (old, new) in &pairs {
            if !present.remove(old) {
                return Err(TomeError::UndefinedKey { key: Key::Name(old.clone()) });
            }
            present.insert(new.clone());
        }

        let renames: Vec<(String, String)> = pairs
            .into_iter()
            .filter(|(old, new)| old != new)
            .collect();
        if renames.is_empty() {
            return Ok(());
        }

        for (old, new) in &renames {
            let (child, replaced) = match &mut self.node_mut(id)?.payload {
                Payload::Object(map) => {
                    let Some(child) = map.remove(old) else {
                        continue;
                    };
                    (child, map.insert(new.clone(), child))
                }
                _ => continue,
            };
            if let Some(replaced) = replaced {
                self.destroy_subtree(replaced);
                self.emit(id, &TomeEvent::Del { key: Key::Name(new.clone()) });
            }
            self.node_mut(child)?.key = Some(Key::Name(new.clone()));
            self.emit(id, &TomeEvent::Del { key: Key::Name(old.clone()) });
            self.emit(
                id,
                &TomeEvent::Add {
                    key: Key::Name(new.clone()),
                    node: child,
                },
            );
        }

        let logged = renames
            .into_iter()
            .map(|(old, new)| (Key::Name(old), Key::Name(new)))
            .collect();
        self.log(id, DiffOp::Rename(logged))?;
        self.mark_dirty(id, None);
        Ok(())
    }

    pub(crate) fn move_inner(
        &mut self,
        id: NodeId,
        key: Key,
        new_parent: NodeId,
        new_key: Option<Key>,
    ) -> TomeResult<()> {
        let child = self
            .child_of(id, &key)
            .ok_or_else(|| TomeError::UndefinedKey { key: key.clone() })?;
        let dest_tag = self.node(new_parent)?.payload.tag();
        if self.is_ancestor_or_self(child, new_parent) {
            return Err(TomeError::CircularReference);
        }
        self.check_depth(self.depth_of(new_parent)? + 1, self.height(child))?;
        let source_key = self.slot_key(id, &key)?;
        let dest_key = new_key.as_ref().unwrap_or(&key);
        let dest_key = match dest_key.as_index() {
            Some(i) if dest_tag == TypeTag::Array => Key::Index(i),
            _ => Key::Name(dest_key.as_name().into_owned()),
        };
        if id == new_parent && source_key == dest_key {
            return Ok(());
        }

        let source_root = self.node(id)?.root;
        let dest_root = self.node(new_parent)?.root;
        let source_chain = self.chain_of(id)?;
        let same_root = source_root == dest_root;
        let (parent_chain, value) = if same_root {
            (Some(self.chain_of(new_parent)?), None)
        } else {
            (None, Some(self.un_tome(child)?))
        };

        self.detach(id, &source_key, child);
        self.emit(id, &TomeEvent::Del { key: source_key.clone() });

        if matches!(dest_key, Key::Name(_)) && self.node(new_parent)?.payload.tag() != TypeTag::Object {
            self.rebuild(new_parent, &Plain::Object(Default::default()));
        }
        let dest_len = self.len(new_parent)?;
        self.attach(new_parent, &dest_key, child)?;
        if !same_root {
            self.reroot(child, dest_root);
        }
        self.emit(
            new_parent,
            &TomeEvent::Add {
                key: dest_key.clone(),
                node: child,
            },
        );

        match (parent_chain, value) {
            (Some(parent_chain), _) => {
                let logged_key = new_key.map(|_| dest_key);
                self.log_at(
                    source_root,
                    source_chain,
                    DiffOp::Move {
                        key: source_key,
                        new_parent: parent_chain,
                        new_key: logged_key,
                    },
                )?;
            }
            (None, value) => {
                tracing::debug!(
                    from = %source_root,
                    to = %dest_root,
                    "split cross-root move into del and placement"
                );
                self.log_at(source_root, source_chain, DiffOp::Del(source_key))?;
                let placement = placement(&dest_key, dest_len, value.unwrap_or_default());
                self.log(new_parent, placement)?;
            }
        }

        self.mark_dirty(id, None);
        self.mark_dirty(child, None);
        Ok(())
    }

    pub(crate) fn swap_inner(&mut self, id: NodeId, key: Key, target: NodeId) -> TomeResult<()> {
        let child = self
            .child_of(id, &key)
            .ok_or_else(|| TomeError::UndefinedKey { key: key.clone() })?;
        let target_node = self.node(target)?;
        let (Some(target_parent), Some(target_key)) = (target_node.parent, target_node.key.clone()) else {
            return Err(TomeError::RootSwap);
        };
        if child == target {
            return Ok(());
        }
        if self.is_ancestor_or_self(child, target) || self.is_ancestor_or_self(target, child) {
            return Err(TomeError::CircularReference);
        }
        self.check_depth(self.depth_of(target)?, self.height(child))?;
        self.check_depth(self.depth_of(child)?, self.height(target))?;
        let child_key = self.slot_key(id, &key)?;
        if self.is_unset_node(target) && self.node(id)?.payload.tag() == TypeTag::Object {
            return Err(TomeError::InvalidUnsetPlacement);
        }

        let child_root = self.node(id)?.root;
        let target_root = self.node(target)?.root;
        let same_root = child_root == target_root;
        let chains = if same_root {
            Some((self.chain_of(id)?, self.chain_of(target)?))
        } else {
            None
        };
        let values = if same_root {
            None
        } else {
            Some((self.un_tome(child)?, self.un_tome(target)?))
        };

        self.put_slot(id, &child_key, target);
        self.put_slot(target_parent, &target_key, child);
        {
            let node = self.node_mut(target)?;
            node.parent = Some(id);
            node.key = Some(child_key.clone());
        }
        {
            let node = self.node_mut(child)?;
            node.parent = Some(target_parent);
            node.key = Some(target_key.clone());
        }
        if !same_root {
            self.reroot(target, child_root);
            self.reroot(child, target_root);
        }
        if !self.is_unset_node(target) {
            self.emit(
                id,
                &TomeEvent::Add {
                    key: child_key.clone(),
                    node: target,
                },
            );
        }
        self.emit(
            target_parent,
            &TomeEvent::Add {
                key: target_key.clone(),
                node: child,
            },
        );

        match (chains, values) {
            (Some((source_chain, target_chain)), _) => {
                self.log_at(
                    child_root,
                    source_chain,
                    DiffOp::Swap {
                        key: child_key,
                        target: target_chain,
                    },
                )?;
            }
            (None, Some((child_value, target_value))) => {
                tracing::debug!(
                    from = %child_root,
                    to = %target_root,
                    "split cross-root swap into two placements"
                );
                let here = placement(&child_key, usize::MAX, target_value);
                self.log(id, here)?;
                let there = placement(&target_key, usize::MAX, child_value);
                self.log(target_parent, there)?;
            }
            (None, None) => {}
        }

        self.mark_dirty(child, None);
        self.mark_dirty(target, None);
        Ok(())
    }

    /// Canonical form of `key` for the container `id`: an index for arrays,
    /// a name otherwise.
    fn slot_key(&self, id: NodeId, key: &Key) -> TomeResult<Key> {
        Ok(match (&self.node(id)?.payload, key.as_index()) {
            (Payload::Array(_), Some(i)) => Key::Index(i),
            _ => Key::Name(key.as_name().into_owned()),
        })
    }

    /// Takes `child` out of its slot without destroying it. Array slots are
    /// left holding a fresh unset node.
    fn detach(&mut self, id: NodeId, key: &Key, child: NodeId) {
        let is_array = matches!(self.nodes.get(&id).map(|n| &n.payload), Some(Payload::Array(_)));
        if is_array {
            let hole = self.build(&Plain::Unset, Some(id), Some(key.clone()));
            self.put_slot(id, key, hole);
        } else if let Some(Payload::Object(map)) = self.nodes.get_mut(&id).map(|n| &mut n.payload) {
            map.remove(key.as_name().as_ref());
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
            node.key = None;
        }
    }

    /// Places `child` at `key` under `id`, destroying any previous occupant
    /// and padding arrays with unset slots as needed.
    fn attach(&mut self, id: NodeId, key: &Key, child: NodeId) -> TomeResult<()> {
        let array_len = match &self.node(id)?.payload {
            Payload::Array(items) => Some(items.len()),
            _ => None,
        };
        let previous = match (array_len, key) {
            (Some(len), Key::Index(i)) if *i < len => self.replace_slot(id, *i, child),
            (Some(len), Key::Index(i)) => {
                let mut tail: Vec<NodeId> = (len..*i)
                    .map(|pad| self.build(&Plain::Unset, Some(id), Some(Key::Index(pad))))
                    .collect();
                tail.push(child);
                if let Payload::Array(items) = &mut self.node_mut(id)?.payload {
                    items.extend(tail);
                }
                None
            }
            _ => match &mut self.node_mut(id)?.payload {
                Payload::Object(map) => map.insert(key.as_name().into_owned(), child),
                _ => None,
            },
        };
        if let Some(previous) = previous {
            let exposed = !self.is_unset_node(previous);
            self.destroy_subtree(previous);
            if exposed {
                self.emit(id, &TomeEvent::Del { key: key.clone() });
            }
        }
        let node = self.node_mut(child)?;
        node.parent = Some(id);
        node.key = Some(key.clone());
        Ok(())
    }

    fn replace_slot(&mut self, id: NodeId, index: usize, child: NodeId) -> Option<NodeId> {
        match self.nodes.get_mut(&id).map(|n| &mut n.payload) {
            Some(Payload::Array(items)) => items
                .get_mut(index)
                .map(|slot| std::mem::replace(slot, child)),
            _ => None,
        }
    }

    /// Overwrites the slot at `key` with `child`, leaving the previous
    /// occupant alive.
    fn put_slot(&mut self, id: NodeId, key: &Key, child: NodeId) {
        match self.nodes.get_mut(&id).map(|n| &mut n.payload) {
            Some(Payload::Array(items)) => {
                if let Some(slot) = key.as_index().and_then(|i| items.get_mut(i)) {
                    *slot = child;
                }
            }
            Some(Payload::Object(map)) => {
                map.insert(key.as_name().into_owned(), child);
            }
            _ => {}
        }
    }
}

/// Log entry that recreates `value` at `key` in a replica of the
/// destination tree. `len` is the destination array's length before the
/// value arrived.
fn placement(key: &Key, len: usize, value: Plain) -> DiffOp {
    match key {
        Key::Index(i) if *i < len => DiffOp::Splice {
            start: *i,
            delete_count: 1,
            items: vec![value],
        },
        Key::Index(i) => {
            let mut items = vec![Plain::Unset; i - len];
            items.push(value);
            DiffOp::Splice {
                start: len,
                delete_count: 0,
                items,
            }
        }
        Key::Name(name) => DiffOp::Set {
            key: Key::Name(name.clone()),
            val: value,
        },
    }
}
