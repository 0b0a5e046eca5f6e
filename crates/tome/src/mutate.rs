//! Value mutations: `set`, `assign`, `del`, `inc`.

use std::collections::BTreeMap;

use crate::diff::DiffOp;
use crate::error::{TomeError, TomeResult};
use crate::event::TomeEvent;
use crate::forest::Forest;
use crate::key::Key;
use crate::node::{NodeId, Payload, TypeTag};
use crate::plain::Plain;

impl Forest {
    /// Sets `key` on `node`, turning `node` into an object first if needed.
    ///
    /// Setting [`Plain::Unset`] removes the key from an object and is a no-op
    /// on anything else. An existing child is assigned in place.
    pub fn set(&mut self, node: NodeId, key: impl Into<Key>, value: impl Into<Plain>) -> TomeResult<()> {
        let (key, value) = (key.into(), value.into());
        self.in_pass(|forest| forest.set_inner(node, key, value))
    }

    /// Replaces the value of `node`.
    ///
    /// Returns `false` when `value` equals the current scalar value, in which
    /// case nothing is logged or signalled.
    ///
    /// Assigning [`Plain::Unset`] to an array element is a `del` of its
    /// index: the element is destroyed, so `node` is no longer valid
    /// afterwards. Anywhere else it fails with `InvalidUnsetPlacement`.
    pub fn assign(&mut self, node: NodeId, value: impl Into<Plain>) -> TomeResult<bool> {
        let value = value.into();
        self.in_pass(|forest| forest.assign_inner(node, value, true))
    }

    /// Removes the child at `key`. Array slots become unset, keeping indices.
    pub fn del(&mut self, node: NodeId, key: impl Into<Key>) -> TomeResult<()> {
        let key = key.into();
        self.in_pass(|forest| forest.del_inner(node, key))
    }

    /// Adds `delta` to a number node.
    pub fn inc(&mut self, node: NodeId, delta: f64) -> TomeResult<()> {
        self.in_pass(|forest| forest.inc_inner(node, delta))
    }

    pub fn dec(&mut self, node: NodeId, delta: f64) -> TomeResult<()> {
        self.inc(node, -delta)
    }

    pub(crate) fn set_inner(&mut self, id: NodeId, key: Key, value: Plain) -> TomeResult<()> {
        let name = key.into_name();
        if value.is_unset() {
            let existing = match &self.node(id)?.payload {
                Payload::Object(map) => map.get(&name).copied(),
                _ => None,
            };
            let Some(child) = existing else {
                return Ok(());
            };
            self.remove_member(id, &name, child);
            self.log(
                id,
                DiffOp::Set {
                    key: Key::Name(name),
                    val: Plain::Unset,
                },
            )?;
            self.mark_dirty(id, None);
            return Ok(());
        }

        self.check_depth(self.depth_of(id)? + 1, value.depth())?;
        if self.node(id)?.payload.tag() != TypeTag::Object {
            self.rebuild(id, &Plain::Object(BTreeMap::new()));
        }
        let existing = match &self.node(id)?.payload {
            Payload::Object(map) => map.get(&name).copied(),
            _ => None,
        };
        let key = Key::Name(name.clone());
        match existing {
            Some(child) => {
                if self.assign_inner(child, value.clone(), false)? {
                    self.log(id, DiffOp::Set { key, val: value })?;
                }
            }
            None => {
                let child = self.build(&value, Some(id), Some(key.clone()));
                if let Payload::Object(map) = &mut self.node_mut(id)?.payload {
                    map.insert(name, child);
                }
                self.emit(id, &TomeEvent::Add { key: key.clone(), node: child });
                self.log(id, DiffOp::Set { key, val: value })?;
                self.mark_dirty(id, None);
            }
        }
        Ok(())
    }

    pub(crate) fn assign_inner(&mut self, id: NodeId, value: Plain, log: bool) -> TomeResult<bool> {
        let old_tag = self.node(id)?.payload.tag();
        let new_tag = value.type_tag();
        if new_tag == TypeTag::Unset {
            return self.unset_element(id, log);
        }
        self.check_depth(self.depth_of(id)?, value.depth())?;

        let was = if new_tag.is_container() {
            None
        } else {
            self.node(id)?.payload.scalar_plain()
        };
        if old_tag == new_tag && !old_tag.is_container() {
            let next = Payload::scalar(&value).unwrap_or(Payload::Null);
            let node = self.node_mut(id)?;
            if node.payload == next {
                return Ok(false);
            }
            node.payload = next;
        } else {
            self.rebuild(id, &value);
        }

        if log {
            self.log(id, DiffOp::Assign(value))?;
        }
        self.mark_dirty(id, was);
        Ok(true)
    }

    /// Empties the array slot holding `id`, the same way `del` does: the
    /// element is destroyed and its index stops being exposed.
    fn unset_element(&mut self, id: NodeId, log: bool) -> TomeResult<bool> {
        let slot = match self.node(id)?.parent {
            Some(parent) => match &self.node(parent)?.payload {
                Payload::Array(items) => items.iter().position(|c| *c == id).map(|i| (parent, i)),
                _ => None,
            },
            None => None,
        };
        let Some((parent, index)) = slot else {
            return Err(TomeError::InvalidUnsetPlacement);
        };
        if self.is_unset_node(id) {
            return Ok(false);
        }
        self.clear_slot(parent, index);
        if log {
            self.log(parent, DiffOp::Del(Key::Index(index)))?;
        }
        self.mark_dirty(parent, None);
        Ok(true)
    }

    pub(crate) fn del_inner(&mut self, id: NodeId, key: Key) -> TomeResult<()> {
        enum Slot {
            Member(String, NodeId),
            Element(usize, NodeId),
        }

        let slot = match &self.node(id)?.payload {
            Payload::Object(map) => map
                .get(key.as_name().as_ref())
                .map(|child| Slot::Member(key.as_name().into_owned(), *child)),
            Payload::Array(items) => key
                .as_index()
                .and_then(|i| items.get(i).map(|child| Slot::Element(i, *child))),
            _ => None,
        };
        let Some(slot) = slot else {
            return Err(TomeError::UndefinedKey { key });
        };

        let logged = match slot {
            Slot::Member(name, child) => {
                if !self.contains(child) {
                    return Err(TomeError::NotATome { key });
                }
                self.remove_member(id, &name, child);
                Key::Name(name)
            }
            Slot::Element(index, child) => {
                if !self.contains(child) {
                    return Err(TomeError::NotATome { key });
                }
                if self.is_unset_node(child) {
                    return Err(TomeError::UndefinedKey { key });
                }
                self.clear_slot(id, index);
                Key::Index(index)
            }
        };
        self.log(id, DiffOp::Del(logged))?;
        self.mark_dirty(id, None);
        Ok(())
    }

    pub(crate) fn inc_inner(&mut self, id: NodeId, delta: f64) -> TomeResult<()> {
        let node = self.node_mut(id)?;
        let Payload::Number(current) = node.payload else {
            return Err(TomeError::TypeMismatch {
                op: "inc",
                expected: "number",
                found: node.payload.tag(),
            });
        };
        if !delta.is_finite() {
            return Err(TomeError::NonFiniteDelta(delta));
        }
        if delta == 0.0 {
            return Ok(());
        }
        let next = current + delta;
        node.payload = Payload::Number(next);
        self.log(id, DiffOp::Assign(Plain::Number(next)))?;
        self.mark_dirty(id, Some(Plain::Number(current)));
        Ok(())
    }

    // ── Shared structural helpers ─────────────────────────────────────────

    /// Swaps the payload of `id` for one built from `value`.
    ///
    /// Old children are destroyed (each followed by `Del`), `TypeChange`
    /// fires if the tag changes, then each new child gets an `Add`.
    pub(crate) fn rebuild(&mut self, id: NodeId, value: &Plain) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let old = std::mem::replace(&mut node.payload, Payload::Null);
        let old_tag = old.tag();
        for (key, child) in old.entries() {
            let exposed = !self.is_unset_node(child);
            self.destroy_subtree(child);
            if exposed {
                self.emit(id, &TomeEvent::Del { key });
            }
        }

        let new_tag = value.type_tag();
        if old_tag != new_tag {
            self.emit(id, &TomeEvent::TypeChange { from: old_tag, to: new_tag });
        }

        let payload = self.build_payload(id, value);
        let added: Vec<_> = payload
            .entries()
            .into_iter()
            .filter(|(_, child)| !self.is_unset_node(*child))
            .collect();
        if let Some(node) = self.nodes.get_mut(&id) {
            node.payload = payload;
        }
        for (key, child) in added {
            self.emit(id, &TomeEvent::Add { key, node: child });
        }
    }

    /// Drops object member `name` (holding `child`) and destroys it.
    pub(crate) fn remove_member(&mut self, id: NodeId, name: &str, child: NodeId) {
        if let Some(Payload::Object(map)) = self.nodes.get_mut(&id).map(|n| &mut n.payload) {
            map.remove(name);
        }
        self.destroy_subtree(child);
        self.emit(id, &TomeEvent::Del { key: Key::Name(name.to_owned()) });
    }

    /// Replaces array slot `index` with a fresh unset node and destroys the
    /// previous occupant.
    pub(crate) fn clear_slot(&mut self, id: NodeId, index: usize) {
        let hole = self.build(&Plain::Unset, Some(id), Some(Key::Index(index)));
        let previous = match self.nodes.get_mut(&id).map(|n| &mut n.payload) {
            Some(Payload::Array(items)) if index < items.len() => {
                Some(std::mem::replace(&mut items[index], hole))
            }
            _ => None,
        };
        if let Some(previous) = previous {
            self.destroy_subtree(previous);
            self.emit(id, &TomeEvent::Del { key: Key::Index(index) });
        }
    }
}
