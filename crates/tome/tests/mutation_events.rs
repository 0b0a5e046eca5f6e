use std::sync::{Arc, Mutex};

use serde_json::json;
use tome::{
    DiffEntry, DiffOp, ErrorClass, EventKind, Forest, Key, NodeId, Plain, TomeError, TomeEvent, TypeTag,
};

type Events = Arc<Mutex<Vec<TomeEvent>>>;

fn record(forest: &mut Forest, id: NodeId) -> Events {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    forest
        .on(id, move |event| sink.lock().unwrap().push(event.clone()))
        .expect("listener must attach");
    events
}

fn kinds(events: &Events) -> Vec<EventKind> {
    events.lock().unwrap().iter().map(TomeEvent::kind).collect()
}

fn count(events: &Events, kind: EventKind) -> usize {
    kinds(events).into_iter().filter(|k| *k == kind).count()
}

#[test]
fn set_new_key_emits_one_add_and_one_set_entry() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"b": 1})).unwrap();
    let events = record(&mut forest, t);

    forest.set(t, "c", 2).unwrap();

    let c = forest.child(t, "c").unwrap().expect("c must exist");
    let adds: Vec<_> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.kind() == EventKind::Add)
        .cloned()
        .collect();
    assert_eq!(adds, vec![TomeEvent::Add { key: Key::from("c"), node: c }]);

    let entries = forest.read_all(t).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].to_json(),
        json!({"chain": [], "op": "set", "value": {"key": "c", "val": 2}})
    );
    assert_eq!(forest.un_tome(t).unwrap().to_json(), json!({"b": 1, "c": 2}));
}

#[test]
fn pop_returns_last_and_emits_one_del() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!([1, 2, 3])).unwrap();
    let events = record(&mut forest, t);

    assert_eq!(forest.pop(t).unwrap(), Some(Plain::from(3)));
    assert_eq!(forest.len(t).unwrap(), 2);
    assert_eq!(
        kinds(&events),
        vec![EventKind::Del, EventKind::Diff, EventKind::Readable]
    );
    assert_eq!(events.lock().unwrap()[0], TomeEvent::Del { key: Key::Index(2) });

    let entries = forest.read_all(t).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].to_json(), json!({"chain": [], "op": "pop"}));
}

#[test]
fn assign_scalar_over_object_changes_type() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"x": 5})).unwrap();
    let x = forest.child(t, "x").unwrap().unwrap();
    let events = record(&mut forest, t);
    let x_events = record(&mut forest, x);

    assert!(forest.assign(t, 5).unwrap());

    assert_eq!(forest.un_tome(t).unwrap().to_json(), json!(5));
    assert_eq!(forest.type_of(t).unwrap(), TypeTag::Number);
    assert_eq!(
        kinds(&events),
        vec![
            EventKind::Del,
            EventKind::TypeChange,
            EventKind::Diff,
            EventKind::Readable
        ]
    );
    assert_eq!(
        events.lock().unwrap()[1],
        TomeEvent::TypeChange {
            from: TypeTag::Object,
            to: TypeTag::Number
        }
    );
    assert_eq!(kinds(&x_events), vec![EventKind::Destroy]);
    assert!(!forest.contains(x));

    let entries = forest.read_all(t).unwrap();
    assert_eq!(entries[0].to_json(), json!({"chain": [], "op": "assign", "value": 5}));
}

#[test]
fn assign_container_rebuilds_children() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"a": [1, 2]})).unwrap();
    let a = forest.child(t, "a").unwrap().unwrap();
    let events = record(&mut forest, a);

    forest.assign(a, json!([3])).unwrap();

    let got: Vec<_> = events.lock().unwrap().clone();
    let new_child = forest.child(a, 0).unwrap().unwrap();
    assert_eq!(got[0], TomeEvent::Del { key: Key::Index(0) });
    assert_eq!(got[1], TomeEvent::Del { key: Key::Index(1) });
    assert_eq!(
        got[2],
        TomeEvent::Add {
            key: Key::Index(0),
            node: new_child
        }
    );
    assert_eq!(count(&events, EventKind::TypeChange), 0);
    assert_eq!(forest.un_tome(t).unwrap().to_json(), json!({"a": [3]}));
}

#[test]
fn assign_equal_scalar_is_a_no_op() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"n": 1})).unwrap();
    let n = forest.child(t, "n").unwrap().unwrap();
    let events = record(&mut forest, n);

    assert!(!forest.assign(n, 1).unwrap());
    assert!(kinds(&events).is_empty());
    assert_eq!(forest.pending(t).unwrap(), 0);
    assert_eq!(forest.get_version(t).unwrap(), 0);
}

#[test]
fn set_existing_key_delegates_to_assign() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"a": 1})).unwrap();
    let a = forest.child(t, "a").unwrap().unwrap();
    let events = record(&mut forest, a);

    forest.set(t, "a", 2).unwrap();
    assert_eq!(forest.child(t, "a").unwrap(), Some(a));
    assert_eq!(
        *events.lock().unwrap(),
        vec![TomeEvent::Readable {
            was: Some(Plain::from(1))
        }]
    );
    let entries = forest.read_all(t).unwrap();
    assert_eq!(
        entries[0].to_json(),
        json!({"chain": [], "op": "set", "value": {"key": "a", "val": 2}})
    );

    forest.set(t, "a", 2).unwrap();
    assert_eq!(forest.pending(t).unwrap(), 0);
}

#[test]
fn set_unset_removes_object_key_only() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"a": 1, "list": [1]})).unwrap();
    let events = record(&mut forest, t);

    forest.set(t, "a", Plain::Unset).unwrap();
    assert_eq!(forest.un_tome(t).unwrap().to_json(), json!({"list": [1]}));
    assert_eq!(events.lock().unwrap()[0], TomeEvent::Del { key: Key::from("a") });
    let entries = forest.read_all(t).unwrap();
    assert_eq!(
        entries[0].to_json(),
        json!({"chain": [], "op": "set", "value": {"key": "a"}})
    );

    let list = forest.child(t, "list").unwrap().unwrap();
    forest.set(list, 0, Plain::Unset).unwrap();
    forest.set(t, "missing", Plain::Unset).unwrap();
    assert_eq!(forest.un_tome(t).unwrap().to_json(), json!({"list": [1]}));
    assert_eq!(forest.pending(t).unwrap(), 0);
}

#[test]
fn set_on_scalar_converts_to_object() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"n": 1})).unwrap();
    let n = forest.child(t, "n").unwrap().unwrap();
    let events = record(&mut forest, n);

    forest.set(n, "k", true).unwrap();

    assert_eq!(forest.un_tome(t).unwrap().to_json(), json!({"n": {"k": true}}));
    assert_eq!(
        events.lock().unwrap()[0],
        TomeEvent::TypeChange {
            from: TypeTag::Number,
            to: TypeTag::Object
        }
    );
    assert_eq!(count(&events, EventKind::Add), 1);
}

#[test]
fn readable_fires_once_per_ancestor_per_operation() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"a": {"b": {"c": 1}}, "d": 1})).unwrap();
    let a = forest.child(t, "a").unwrap().unwrap();
    let b = forest.child(a, "b").unwrap().unwrap();
    let c = forest.child(b, "c").unwrap().unwrap();
    let d = forest.child(t, "d").unwrap().unwrap();
    let root_events = record(&mut forest, t);
    let a_events = record(&mut forest, a);

    forest.assign(c, 2).unwrap();
    assert_eq!(count(&root_events, EventKind::Readable), 1);
    assert_eq!(
        *a_events.lock().unwrap(),
        vec![TomeEvent::Readable { was: None }]
    );
    assert_eq!(forest.get_version(t).unwrap(), 1);
    assert!(forest.is_dirty(t).unwrap());
    assert!(forest.is_dirty(c).unwrap());
    assert!(!forest.is_dirty(d).unwrap());

    forest.set(t, "a", json!({"z": 1})).unwrap();
    assert_eq!(count(&root_events, EventKind::Readable), 2);
    assert_eq!(forest.get_version(t).unwrap(), 2);
    assert!(!forest.is_dirty(d).unwrap());
}

#[test]
fn inc_logs_new_value_and_reports_previous() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"n": 1})).unwrap();
    let n = forest.child(t, "n").unwrap().unwrap();
    let events = record(&mut forest, n);

    forest.inc(n, 2.5).unwrap();
    assert_eq!(forest.un_tome(n).unwrap(), Plain::from(3.5));
    assert_eq!(
        *events.lock().unwrap(),
        vec![TomeEvent::Readable {
            was: Some(Plain::from(1))
        }]
    );
    forest.inc(n, 0.0).unwrap();
    forest.dec(n, 0.5).unwrap();
    assert_eq!(forest.un_tome(n).unwrap(), Plain::from(3));

    let entries: Vec<_> = forest
        .read_all(t)
        .unwrap()
        .iter()
        .map(|e| e.to_json())
        .collect();
    assert_eq!(
        entries,
        vec![
            json!({"chain": ["n"], "op": "assign", "value": 3.5}),
            json!({"chain": ["n"], "op": "assign", "value": 3}),
        ]
    );
}

#[test]
fn inc_rejects_bad_input() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"n": 1, "s": "x"})).unwrap();
    let n = forest.child(t, "n").unwrap().unwrap();
    let s = forest.child(t, "s").unwrap().unwrap();

    let err = forest.inc(n, f64::NAN).unwrap_err();
    assert!(matches!(err, TomeError::NonFiniteDelta(_)));
    assert_eq!(err.class(), ErrorClass::Type);

    let err = forest.inc(s, 1.0).unwrap_err();
    assert!(matches!(
        err,
        TomeError::TypeMismatch {
            op: "inc",
            found: TypeTag::String,
            ..
        }
    ));
    assert_eq!(forest.un_tome(t).unwrap().to_json(), json!({"n": 1, "s": "x"}));
}

#[test]
fn del_removes_object_member_and_destroys_subtree() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"a": {"b": 1}, "c": 2})).unwrap();
    let a = forest.child(t, "a").unwrap().unwrap();
    let b = forest.child(a, "b").unwrap().unwrap();
    let root_events = record(&mut forest, t);
    let a_events = record(&mut forest, a);
    let b_events = record(&mut forest, b);

    forest.del(t, "a").unwrap();

    assert_eq!(kinds(&a_events), vec![EventKind::Destroy]);
    assert_eq!(kinds(&b_events), vec![EventKind::Destroy]);
    assert_eq!(root_events.lock().unwrap()[0], TomeEvent::Del { key: Key::from("a") });
    assert!(!forest.contains(a));
    assert!(!forest.contains(b));
    assert_eq!(forest.un_tome(t).unwrap().to_json(), json!({"c": 2}));
    let entries = forest.read_all(t).unwrap();
    assert_eq!(entries[0].to_json(), json!({"chain": [], "op": "del", "value": "a"}));
}

#[test]
fn del_on_array_leaves_an_unset_slot() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!([1, 2, 3])).unwrap();

    forest.del(t, 1).unwrap();

    assert_eq!(
        forest.un_tome(t).unwrap(),
        Plain::Array(vec![Plain::from(1), Plain::Unset, Plain::from(3)])
    );
    assert_eq!(forest.len(t).unwrap(), 3);
    assert_eq!(forest.keys(t).unwrap(), vec![Key::Index(0), Key::Index(2)]);
    let entries = forest.read_all(t).unwrap();
    assert_eq!(entries[0].to_json(), json!({"chain": [], "op": "del", "value": 1}));

    let err = forest.del(t, 1).unwrap_err();
    assert!(matches!(err, TomeError::UndefinedKey { .. }));
}

#[test]
fn del_missing_key_is_a_reference_error() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"a": 1})).unwrap();
    let events = record(&mut forest, t);

    let err = forest.del(t, "nope").unwrap_err();
    assert!(matches!(&err, TomeError::UndefinedKey { key } if *key == Key::from("nope")));
    assert_eq!(err.class(), ErrorClass::Reference);
    assert!(kinds(&events).is_empty());
    assert_eq!(forest.get_version(t).unwrap(), 0);
}

#[test]
fn unset_assign_is_only_valid_in_array_slots() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"a": 1, "list": [1, 2]})).unwrap();
    let a = forest.child(t, "a").unwrap().unwrap();
    assert!(matches!(
        forest.assign(a, Plain::Unset),
        Err(TomeError::InvalidUnsetPlacement)
    ));
    assert!(matches!(
        forest.assign(t, Plain::Unset),
        Err(TomeError::InvalidUnsetPlacement)
    ));

    let list = forest.child(t, "list").unwrap().unwrap();
    let first = forest.child(list, 0).unwrap().unwrap();
    forest.assign(first, Plain::Unset).unwrap();
    assert_eq!(forest.un_tome(list).unwrap().to_json(), json!([null, 2]));
    assert_eq!(forest.keys(list).unwrap(), vec![Key::Index(1)]);
}

#[test]
fn unset_assign_empties_the_slot_like_del() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!([1, 2])).unwrap();
    let first = forest.child(t, 0).unwrap().unwrap();
    let parent_events = record(&mut forest, t);
    let element_events = record(&mut forest, first);

    assert!(forest.assign(first, Plain::Unset).unwrap());

    assert_eq!(
        kinds(&parent_events),
        vec![EventKind::Del, EventKind::Diff, EventKind::Readable]
    );
    assert_eq!(
        parent_events.lock().unwrap()[0],
        TomeEvent::Del { key: Key::Index(0) }
    );
    assert_eq!(kinds(&element_events), vec![EventKind::Destroy]);
    assert_eq!(
        forest.read_all(t).unwrap(),
        vec![DiffEntry::new(vec![], DiffOp::Del(Key::Index(0)))]
    );
    assert_eq!(forest.get_version(t).unwrap(), 1);
    assert_eq!(forest.keys(t).unwrap(), vec![Key::Index(1)]);

    assert!(!forest.contains(first));
    assert!(matches!(
        forest.assign(first, 5),
        Err(TomeError::UnknownNode(id)) if id == first
    ));
    assert_eq!(forest.un_tome(t).unwrap().to_json(), json!([null, 2]));
    assert_eq!(forest.pending(t).unwrap(), 0);
}

#[test]
fn off_detaches_listener() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({})).unwrap();
    let events = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&events);
    let id = forest
        .on(t, move |_| *sink.lock().unwrap() += 1)
        .unwrap();

    forest.set(t, "a", 1).unwrap();
    let seen = *events.lock().unwrap();
    assert!(seen > 0);

    assert!(forest.off(t, id));
    assert!(!forest.off(t, id));
    forest.set(t, "b", 1).unwrap();
    assert_eq!(*events.lock().unwrap(), seen);
}

#[test]
fn disabled_logging_still_signals() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({})).unwrap();
    let events = record(&mut forest, t);
    forest.set_logging(t, false).unwrap();

    forest.set(t, "a", 1).unwrap();

    assert_eq!(forest.pending(t).unwrap(), 0);
    assert_eq!(kinds(&events), vec![EventKind::Add, EventKind::Readable]);
    assert_eq!(forest.get_version(t).unwrap(), 1);
}

#[test]
fn diff_events_mirror_the_log() {
    let mut forest = Forest::new();
    let t = forest.conjure(json!({"list": []})).unwrap();
    let list = forest.child(t, "list").unwrap().unwrap();
    let events = record(&mut forest, t);

    forest.push(list, vec![Plain::from(1), Plain::from(2)]).unwrap();
    forest.set(t, "k", "v").unwrap();

    let diffs: Vec<_> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            TomeEvent::Diff(entry) => Some(entry.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(diffs, forest.read_all(t).unwrap());
    assert_eq!(diffs.len(), 2);
}
