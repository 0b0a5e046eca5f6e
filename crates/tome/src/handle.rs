use std::cmp::Ordering;

use crate::error::{TomeError, TomeResult};
use crate::event::{ListenerId, TomeEvent};
use crate::forest::Forest;
use crate::key::{Chain, Key};
use crate::node::{NodeId, TypeTag};
use crate::plain::Plain;

/// Mutable handle on one node of a [`Forest`].
///
/// Forwards to the forest's operations with the node id filled in:
///
/// ```
/// use tome::Forest;
/// use serde_json::json;
///
/// let mut forest = Forest::new();
/// let root = forest.conjure(json!({"b": 1})).unwrap();
/// forest.tome(root).set("c", 2).unwrap();
/// assert_eq!(forest.un_tome(root).unwrap().to_json(), json!({"b": 1, "c": 2}));
/// ```
pub struct TomeMut<'a> {
    forest: &'a mut Forest,
    id: NodeId,
}

impl Forest {
    pub fn tome(&mut self, id: NodeId) -> TomeMut<'_> {
        TomeMut { forest: self, id }
    }
}

impl<'a> TomeMut<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Handle on the exposed child at `key`.
    pub fn at(self, key: impl Into<Key>) -> TomeResult<Self> {
        let key = key.into();
        match self.forest.child(self.id, key.clone())? {
            Some(id) => Ok(TomeMut {
                forest: self.forest,
                id,
            }),
            None => Err(TomeError::UndefinedKey { key }),
        }
    }

    pub fn type_of(&self) -> TomeResult<TypeTag> {
        self.forest.type_of(self.id)
    }

    pub fn value(&self) -> TomeResult<Plain> {
        self.forest.un_tome(self.id)
    }

    pub fn chain(&self) -> TomeResult<Chain> {
        self.forest.chain_of(self.id)
    }

    pub fn on<F>(&mut self, listener: F) -> TomeResult<ListenerId>
    where
        F: FnMut(&TomeEvent) + Send + Sync + 'static,
    {
        self.forest.on(self.id, listener)
    }

    pub fn set(&mut self, key: impl Into<Key>, value: impl Into<Plain>) -> TomeResult<()> {
        self.forest.set(self.id, key, value)
    }

    pub fn assign(&mut self, value: impl Into<Plain>) -> TomeResult<bool> {
        self.forest.assign(self.id, value)
    }

    pub fn del(&mut self, key: impl Into<Key>) -> TomeResult<()> {
        self.forest.del(self.id, key)
    }

    pub fn inc(&mut self, delta: f64) -> TomeResult<()> {
        self.forest.inc(self.id, delta)
    }

    pub fn dec(&mut self, delta: f64) -> TomeResult<()> {
        self.forest.dec(self.id, delta)
    }

    pub fn push(&mut self, items: Vec<Plain>) -> TomeResult<usize> {
        self.forest.push(self.id, items)
    }

    pub fn pop(&mut self) -> TomeResult<Option<Plain>> {
        self.forest.pop(self.id)
    }

    pub fn shift(&mut self) -> TomeResult<Option<Plain>> {
        self.forest.shift(self.id)
    }

    pub fn unshift(&mut self, items: Vec<Plain>) -> TomeResult<usize> {
        self.forest.unshift(self.id, items)
    }

    pub fn splice(
        &mut self,
        start: i64,
        delete_count: Option<usize>,
        items: Vec<Plain>,
    ) -> TomeResult<Vec<Plain>> {
        self.forest.splice(self.id, start, delete_count, items)
    }

    pub fn reverse(&mut self) -> TomeResult<()> {
        self.forest.reverse(self.id)
    }

    pub fn sort(&mut self) -> TomeResult<()> {
        self.forest.sort(self.id)
    }

    pub fn sort_by<F>(&mut self, compare: F) -> TomeResult<()>
    where
        F: FnMut(&Plain, &Plain) -> Ordering,
    {
        self.forest.sort_by(self.id, compare)
    }

    pub fn rename(&mut self, pairs: Vec<(Key, Key)>) -> TomeResult<()> {
        self.forest.rename(self.id, pairs)
    }

    pub fn move_to(
        &mut self,
        key: impl Into<Key>,
        new_parent: NodeId,
        new_key: Option<Key>,
    ) -> TomeResult<()> {
        self.forest.move_child(self.id, key, new_parent, new_key)
    }

    pub fn swap(&mut self, key: impl Into<Key>, target: NodeId) -> TomeResult<()> {
        self.forest.swap(self.id, key, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn at_walks_exposed_children() {
        let mut forest = Forest::new();
        let root = forest.conjure(json!({"list": [1, {"n": 2}]})).unwrap();
        let mut item = forest.tome(root).at("list").unwrap().at(1).unwrap();
        assert_eq!(item.chain().unwrap(), vec![Key::from("list"), Key::Index(1)]);
        item.set("m", 3).unwrap();
        assert_eq!(
            forest.un_tome(root).unwrap().to_json(),
            json!({"list": [1, {"n": 2, "m": 3}]})
        );
        assert!(matches!(
            forest.tome(root).at("missing"),
            Err(TomeError::UndefinedKey { .. })
        ));
    }
}
