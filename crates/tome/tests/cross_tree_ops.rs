use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tome::{DiffEntry, ErrorClass, Forest, Key, NodeId, Plain, TomeError, TomeEvent, TypeTag};

fn wire(entries: &[DiffEntry]) -> Value {
    Value::Array(entries.iter().map(DiffEntry::to_json).collect())
}

fn doc(forest: &Forest, id: NodeId) -> Value {
    forest.un_tome(id).unwrap().to_json()
}

/// Replays everything pending on `source` onto `replica`.
fn sync(forest: &mut Forest, source: NodeId, replica: NodeId) -> Vec<DiffEntry> {
    let entries = forest.read_all(source).unwrap();
    forest.merge(replica, &entries).expect("merge must succeed");
    forest.read_all(replica).unwrap();
    entries
}

#[test]
fn move_within_one_tree_logs_a_single_move() {
    let mut forest = Forest::new();
    let initial = json!({"a": {"x": 1}, "b": {}});
    let t = forest.conjure(initial.clone()).unwrap();
    let replica = forest.conjure(initial).unwrap();
    let a = forest.child(t, "a").unwrap().unwrap();
    let b = forest.child(t, "b").unwrap().unwrap();
    let x = forest.child(a, "x").unwrap().unwrap();

    forest.move_child(a, "x", b, None).unwrap();

    assert_eq!(doc(&forest, t), json!({"a": {}, "b": {"x": 1}}));
    assert_eq!(forest.get_parent(x).unwrap(), Some(b));
    assert_eq!(forest.chain_of(x).unwrap(), vec![Key::from("b"), Key::from("x")]);
    let entries = sync(&mut forest, t, replica);
    assert_eq!(
        wire(&entries),
        json!([{"chain": ["a"], "op": "move", "value": {"key": "x", "newParent": ["b"]}}])
    );
    assert_eq!(doc(&forest, replica), doc(&forest, t));
}

#[test]
fn move_out_of_an_array_leaves_an_unset_slot() {
    let mut forest = Forest::new();
    let initial = json!({"list": [1, 2, 3], "obj": {}});
    let t = forest.conjure(initial.clone()).unwrap();
    let replica = forest.conjure(initial).unwrap();
    let list = forest.child(t, "list").unwrap().unwrap();
    let obj = forest.child(t, "obj").unwrap().unwrap();

    forest.move_child(list, 1, obj, Some(Key::from("two"))).unwrap();

    assert_eq!(
        forest.un_tome(list).unwrap(),
        Plain::Array(vec![Plain::from(1), Plain::Unset, Plain::from(3)])
    );
    assert_eq!(doc(&forest, obj), json!({"two": 2}));
    let entries = sync(&mut forest, t, replica);
    assert_eq!(
        wire(&entries),
        json!([{
            "chain": ["list"],
            "op": "move",
            "value": {"key": 1, "newParent": ["obj"], "newKey": "two"}
        }])
    );
    assert_eq!(forest.un_tome(replica).unwrap(), forest.un_tome(t).unwrap());
}

#[test]
fn move_preserves_element_count_within_one_tree() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"a": 1, "b": 2, "c": {"d": 3}})).unwrap();
    let c = forest.child(t, "c").unwrap().unwrap();

    forest.move_child(t, "a", c, Some(Key::from("a2"))).unwrap();

    assert_eq!(forest.keys(t).unwrap(), vec![Key::from("b"), Key::from("c")]);
    assert_eq!(forest.keys(c).unwrap(), vec![Key::from("a2"), Key::from("d")]);
    assert_eq!(doc(&forest, t), json!({"b": 2, "c": {"a2": 1, "d": 3}}));
}

#[test]
fn move_to_a_name_turns_an_array_into_an_object() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"list": [1], "src": {"k": true}})).unwrap();
    let list = forest.child(t, "list").unwrap().unwrap();
    let src = forest.child(t, "src").unwrap().unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    forest
        .on(list, move |e| sink.lock().unwrap().push(e.clone()))
        .unwrap();

    forest.move_child(src, "k", list, None).unwrap();

    assert_eq!(doc(&forest, t), json!({"list": {"k": true}, "src": {}}));
    assert!(events.lock().unwrap().contains(&TomeEvent::TypeChange {
        from: TypeTag::Array,
        to: TypeTag::Object
    }));
}

#[test]
fn move_into_own_descendant_is_rejected() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"a": {"b": {}}})).unwrap();
    let a = forest.child(t, "a").unwrap().unwrap();
    let b = forest.child(a, "b").unwrap().unwrap();

    let err = forest.move_child(t, "a", b, None).unwrap_err();
    assert!(matches!(err, TomeError::CircularReference));
    assert_eq!(err.class(), ErrorClass::Circular);
    assert_eq!(doc(&forest, t), json!({"a": {"b": {}}}));
    assert_eq!(forest.pending(t).unwrap(), 0);
}

#[test]
fn move_to_the_same_slot_does_nothing() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"a": 1})).unwrap();
    forest.move_child(t, "a", t, None).unwrap();
    assert_eq!(forest.pending(t).unwrap(), 0);
    assert_eq!(forest.get_version(t).unwrap(), 0);
}

#[test]
fn cross_root_move_splits_into_del_and_set() {
    let mut forest = Forest::new();
    let (one, two) = (json!({"a": {"x": {"deep": 1}}}), json!({"b": {}}));
    let t1 = forest.conjure(one.clone()).unwrap();
    let t2 = forest.conjure(two.clone()).unwrap();
    let r1 = forest.conjure(one).unwrap();
    let r2 = forest.conjure(two).unwrap();
    let a = forest.child(t1, "a").unwrap().unwrap();
    let b = forest.child(t2, "b").unwrap().unwrap();
    let x = forest.child(a, "x").unwrap().unwrap();
    let deep = forest.child(x, "deep").unwrap().unwrap();

    forest.move_child(a, "x", b, None).unwrap();

    assert_eq!(forest.get_root(x).unwrap(), t2);
    assert_eq!(forest.get_root(deep).unwrap(), t2);
    assert_eq!(forest.child(a, "x").unwrap(), None);
    assert_eq!(doc(&forest, t1), json!({"a": {}}));
    assert_eq!(doc(&forest, t2), json!({"b": {"x": {"deep": 1}}}));

    let left = sync(&mut forest, t1, r1);
    let right = sync(&mut forest, t2, r2);
    assert_eq!(wire(&left), json!([{"chain": ["a"], "op": "del", "value": "x"}]));
    assert_eq!(
        wire(&right),
        json!([{"chain": ["b"], "op": "set", "value": {"key": "x", "val": {"deep": 1}}}])
    );
    assert_eq!(doc(&forest, r1), doc(&forest, t1));
    assert_eq!(doc(&forest, r2), doc(&forest, t2));

    // The moved node now logs into its new tree, by its new path.
    forest.inc(deep, 1.0).unwrap();
    assert_eq!(forest.pending(t1).unwrap(), 0);
    let entries = forest.read_all(t2).unwrap();
    assert_eq!(entries[0].chain, vec![Key::from("b"), Key::from("x"), Key::from("deep")]);
}

#[test]
fn cross_root_move_into_an_array_logs_a_splice() {
    let mut forest = Forest::new();
    let t1 = forest.conjure(json!({"x": "v"})).unwrap();
    let t2 = forest.conjure(json!([1])).unwrap();
    let r2 = forest.conjure(json!([1])).unwrap();

    forest.move_child(t1, "x", t2, Some(Key::Index(3))).unwrap();

    assert_eq!(
        forest.un_tome(t2).unwrap(),
        Plain::Array(vec![Plain::from(1), Plain::Unset, Plain::Unset, Plain::from("v")])
    );
    assert_eq!(forest.keys(t2).unwrap(), vec![Key::Index(0), Key::Index(3)]);
    let entries = sync(&mut forest, t2, r2);
    assert_eq!(
        wire(&entries),
        json!([{"chain": [], "op": "splice", "value": [1, 0, null, null, "v"]}])
    );
    assert_eq!(forest.un_tome(r2).unwrap(), forest.un_tome(t2).unwrap());
}

#[test]
fn swap_within_one_tree_logs_a_single_swap() {
    let mut forest = Forest::new();
    let initial = json!({"a": 1, "b": [2]});
    let t = forest.conjure(initial.clone()).unwrap();
    let replica = forest.conjure(initial).unwrap();
    let a = forest.child(t, "a").unwrap().unwrap();
    let b = forest.child(t, "b").unwrap().unwrap();
    let b0 = forest.child(b, 0).unwrap().unwrap();

    forest.swap(t, "a", b0).unwrap();

    assert_eq!(doc(&forest, t), json!({"a": 2, "b": [1]}));
    assert_eq!(forest.get_parent(a).unwrap(), Some(b));
    assert_eq!(forest.get_key(a).unwrap(), Some(Key::Index(0)));
    assert_eq!(forest.get_key(b0).unwrap(), Some(Key::from("a")));
    let entries = sync(&mut forest, t, replica);
    assert_eq!(
        wire(&entries),
        json!([{"chain": [], "op": "swap", "value": {"key": "a", "target": ["b", 0]}}])
    );
    assert_eq!(doc(&forest, replica), doc(&forest, t));
}

#[test]
fn swap_emits_add_on_both_parents() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"l": {"x": 1}, "r": {"y": 2}})).unwrap();
    let l = forest.child(t, "l").unwrap().unwrap();
    let r = forest.child(t, "r").unwrap().unwrap();
    let y = forest.child(r, "y").unwrap().unwrap();
    let x = forest.child(l, "x").unwrap().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    for id in [l, r] {
        let sink = Arc::clone(&seen);
        forest
            .on(id, move |e| {
                if let TomeEvent::Add { key, node } = e {
                    sink.lock().unwrap().push((id, key.clone(), *node));
                }
            })
            .unwrap();
    }

    forest.swap(l, "x", y).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(l, Key::from("x"), y), (r, Key::from("y"), x)]
    );
    assert_eq!(doc(&forest, t), json!({"l": {"x": 2}, "r": {"y": 1}}));
}

#[test]
fn swap_with_a_root_is_rejected() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"a": 1})).unwrap();
    let other = forest.conjure(json!(2)).unwrap();
    let err = forest.swap(t, "a", other).unwrap_err();
    assert!(matches!(err, TomeError::RootSwap));
    assert_eq!(err.class(), ErrorClass::Type);
    assert_eq!(doc(&forest, t), json!({"a": 1}));
}

#[test]
fn swap_with_own_ancestor_is_rejected() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"a": {"b": {"c": 1}}})).unwrap();
    let a = forest.child(t, "a").unwrap().unwrap();
    let b = forest.child(a, "b").unwrap().unwrap();
    assert!(matches!(
        forest.swap(b, "c", a),
        Err(TomeError::CircularReference)
    ));
}

#[test]
fn cross_root_swap_logs_a_placement_on_each_side() {
    let mut forest = Forest::new();
    let (one, two) = (json!({"a": 1}), json!({"b": [2]}));
    let t1 = forest.conjure(one.clone()).unwrap();
    let t2 = forest.conjure(two.clone()).unwrap();
    let r1 = forest.conjure(one).unwrap();
    let r2 = forest.conjure(two).unwrap();
    let a = forest.child(t1, "a").unwrap().unwrap();
    let b = forest.child(t2, "b").unwrap().unwrap();
    let b0 = forest.child(b, 0).unwrap().unwrap();

    forest.swap(t1, "a", b0).unwrap();

    assert_eq!(forest.get_root(a).unwrap(), t2);
    assert_eq!(forest.get_root(b0).unwrap(), t1);
    assert_eq!(doc(&forest, t1), json!({"a": 2}));
    assert_eq!(doc(&forest, t2), json!({"b": [1]}));

    let left = sync(&mut forest, t1, r1);
    let right = sync(&mut forest, t2, r2);
    assert_eq!(
        wire(&left),
        json!([{"chain": [], "op": "set", "value": {"key": "a", "val": 2}}])
    );
    assert_eq!(
        wire(&right),
        json!([{"chain": ["b"], "op": "splice", "value": [0, 1, 1]}])
    );
    assert_eq!(doc(&forest, r1), doc(&forest, t1));
    assert_eq!(doc(&forest, r2), doc(&forest, t2));
}

#[test]
fn listeners_stay_with_a_moved_node() {
    let mut forest = Forest::new();
    let t1 = forest.conjure(json!({"n": 1})).unwrap();
    let t2 = forest.conjure(json!({})).unwrap();
    let n = forest.child(t1, "n").unwrap().unwrap();
    let hits = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&hits);
    forest
        .on(n, move |e| {
            if matches!(e, TomeEvent::Readable { .. }) {
                *sink.lock().unwrap() += 1;
            }
        })
        .unwrap();

    forest.move_child(t1, "n", t2, None).unwrap();
    let after_move = *hits.lock().unwrap();
    forest.inc(n, 1.0).unwrap();

    assert_eq!(*hits.lock().unwrap(), after_move + 1);
    assert_eq!(forest.get_root(n).unwrap(), t2);
    assert!(forest.is_dirty(n).unwrap());
}
