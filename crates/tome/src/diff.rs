//! Operation log entries and their JSON wire form.
//!
//! Every mutation appends one [`DiffEntry`] to its root's log. An entry names
//! the target node by its chain and carries the arguments needed to replay
//! the operation on another tree. On the wire an entry is a plain record:
//!
//! ```json
//! {"chain": ["items", 2], "op": "set", "value": {"key": "done", "val": true}}
//! ```
//!
//! JSON has no hole marker. [`Plain::Unset`] items inside a `push`,
//! `unshift`, `splice` or `assign` value are written as `null`, so a
//! replica fed through the wire holds addressable `null` elements where the
//! source has unset slots. Entries merged in process keep the holes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::error::{TomeError, TomeResult};
use crate::key::{Chain, Key};
use crate::plain::Plain;

/// Names of every operation `merge` accepts.
pub const OPERATIONS: [&str; 12] = [
    "assign", "del", "move", "pop", "push", "rename", "reverse", "set", "shift", "splice",
    "swap", "unshift",
];

#[derive(Debug, Clone, PartialEq)]
pub enum DiffOp {
    /// Full-value replacement of the target node.
    Assign(Plain),
    /// `val` is [`Plain::Unset`] when the key was removed.
    Set { key: Key, val: Plain },
    Del(Key),
    /// Same-tree relocation of the child at `key` under the node at
    /// `new_parent`.
    Move {
        key: Key,
        new_parent: Chain,
        new_key: Option<Key>,
    },
    Pop,
    Push(Vec<Plain>),
    /// `(old, new)` key pairs.
    Rename(Vec<(Key, Key)>),
    Reverse,
    Shift,
    /// Normalized arguments: `start` is clamped and `delete_count` is the
    /// number of elements actually removed.
    Splice {
        start: usize,
        delete_count: usize,
        items: Vec<Plain>,
    },
    /// Same-tree exchange of the child at `key` with the node at `target`.
    Swap { key: Key, target: Chain },
    Unshift(Vec<Plain>),
}

impl DiffOp {
    pub fn name(&self) -> &'static str {
        match self {
            DiffOp::Assign(_) => "assign",
            DiffOp::Set { .. } => "set",
            DiffOp::Del(_) => "del",
            DiffOp::Move { .. } => "move",
            DiffOp::Pop => "pop",
            DiffOp::Push(_) => "push",
            DiffOp::Rename(_) => "rename",
            DiffOp::Reverse => "reverse",
            DiffOp::Shift => "shift",
            DiffOp::Splice { .. } => "splice",
            DiffOp::Swap { .. } => "swap",
            DiffOp::Unshift(_) => "unshift",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub chain: Chain,
    pub op: DiffOp,
}

impl DiffEntry {
    pub fn new(chain: Chain, op: DiffOp) -> Self {
        Self { chain, op }
    }

    /// Encodes the entry as `{chain, op, value?}`.
    pub fn to_json(&self) -> Value {
        let mut m = Map::new();
        m.insert("chain".into(), encode_chain(&self.chain));
        m.insert("op".into(), json!(self.op.name()));
        if let Some(value) = encode_value(&self.op) {
            m.insert("value".into(), value);
        }
        Value::Object(m)
    }

    pub fn from_json(v: &Value) -> TomeResult<Self> {
        let obj = v
            .as_object()
            .ok_or_else(|| TomeError::malformed("entry", "entry must be an object"))?;
        let op = obj
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| TomeError::malformed("entry", "op must be a string"))?;
        let chain = match obj.get("chain") {
            Some(c) => decode_chain(op, c)?,
            None => return Err(TomeError::malformed(op, "missing chain")),
        };
        let op = decode_op(op, obj.get("value"))?;
        Ok(Self { chain, op })
    }
}

impl Serialize for DiffEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DiffEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(deserializer)?;
        DiffEntry::from_json(&v).map_err(serde::de::Error::custom)
    }
}

/// Decodes one entry, or an array of entries.
pub fn decode_entries(v: &Value) -> TomeResult<Vec<DiffEntry>> {
    match v {
        Value::Array(items) => items.iter().map(DiffEntry::from_json).collect(),
        single => Ok(vec![DiffEntry::from_json(single)?]),
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────

fn encode_chain(chain: &[Key]) -> Value {
    Value::Array(chain.iter().map(encode_key).collect())
}

fn encode_key(key: &Key) -> Value {
    match key {
        Key::Index(i) => json!(i),
        Key::Name(s) => json!(s),
    }
}

fn encode_items(items: &[Plain]) -> Value {
    Value::Array(items.iter().map(Plain::to_json).collect())
}

fn encode_value(op: &DiffOp) -> Option<Value> {
    match op {
        DiffOp::Assign(Plain::Unset) => None,
        DiffOp::Assign(v) => Some(v.to_json()),
        DiffOp::Set { key, val } => {
            let mut m = Map::new();
            m.insert("key".into(), encode_key(key));
            if !val.is_unset() {
                m.insert("val".into(), val.to_json());
            }
            Some(Value::Object(m))
        }
        DiffOp::Del(key) => Some(encode_key(key)),
        DiffOp::Move {
            key,
            new_parent,
            new_key,
        } => {
            let mut m = Map::new();
            m.insert("key".into(), encode_key(key));
            m.insert("newParent".into(), encode_chain(new_parent));
            if let Some(k) = new_key {
                m.insert("newKey".into(), encode_key(k));
            }
            Some(Value::Object(m))
        }
        DiffOp::Pop | DiffOp::Shift | DiffOp::Reverse => None,
        DiffOp::Push(items) | DiffOp::Unshift(items) => Some(encode_items(items)),
        DiffOp::Rename(pairs) => Some(Value::Array(
            pairs
                .iter()
                .map(|(old, new)| json!({"old": encode_key(old), "new": encode_key(new)}))
                .collect(),
        )),
        DiffOp::Splice {
            start,
            delete_count,
            items,
        } => {
            let mut arr = vec![json!(start), json!(delete_count)];
            arr.extend(items.iter().map(Plain::to_json));
            Some(Value::Array(arr))
        }
        DiffOp::Swap { key, target } => Some(json!({
            "key": encode_key(key),
            "target": encode_chain(target),
        })),
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────

fn decode_key(op: &str, v: &Value) -> TomeResult<Key> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .map(Key::Index)
            .ok_or_else(|| TomeError::malformed(op, format!("invalid index key {n}"))),
        Value::String(s) => Ok(Key::Name(s.clone())),
        other => Err(TomeError::malformed(
            op,
            format!("key must be a string or index, got {other}"),
        )),
    }
}

fn decode_chain(op: &str, v: &Value) -> TomeResult<Chain> {
    let arr = v
        .as_array()
        .ok_or_else(|| TomeError::malformed(op, "chain must be an array"))?;
    arr.iter().map(|k| decode_key(op, k)).collect()
}

fn decode_items(op: &str, v: Option<&Value>) -> TomeResult<Vec<Plain>> {
    match v {
        Some(Value::Array(items)) => Ok(items.iter().map(Plain::from).collect()),
        _ => Err(TomeError::malformed(op, "value must be an array")),
    }
}

fn decode_usize(op: &str, v: Option<&Value>, what: &str) -> TomeResult<usize> {
    v.and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| TomeError::malformed(op, format!("{what} must be a non-negative integer")))
}

fn field<'a>(op: &str, v: Option<&'a Value>, name: &str) -> TomeResult<&'a Value> {
    v.and_then(|v| v.get(name))
        .ok_or_else(|| TomeError::malformed(op, format!("missing {name}")))
}

fn decode_op(op: &str, value: Option<&Value>) -> TomeResult<DiffOp> {
    Ok(match op {
        "assign" => DiffOp::Assign(value.map(Plain::from).unwrap_or(Plain::Unset)),
        "set" => DiffOp::Set {
            key: decode_key(op, field(op, value, "key")?)?,
            val: value
                .and_then(|v| v.get("val"))
                .map(Plain::from)
                .unwrap_or(Plain::Unset),
        },
        "del" => DiffOp::Del(decode_key(
            op,
            value.ok_or_else(|| TomeError::malformed(op, "missing key"))?,
        )?),
        "move" => DiffOp::Move {
            key: decode_key(op, field(op, value, "key")?)?,
            new_parent: decode_chain(op, field(op, value, "newParent")?)?,
            new_key: match value.and_then(|v| v.get("newKey")) {
                Some(k) => Some(decode_key(op, k)?),
                None => None,
            },
        },
        "pop" => DiffOp::Pop,
        "shift" => DiffOp::Shift,
        "reverse" => DiffOp::Reverse,
        "push" => DiffOp::Push(decode_items(op, value)?),
        "unshift" => DiffOp::Unshift(decode_items(op, value)?),
        "rename" => {
            let pairs = value
                .and_then(Value::as_array)
                .ok_or_else(|| TomeError::malformed(op, "value must be an array of pairs"))?;
            DiffOp::Rename(
                pairs
                    .iter()
                    .map(|p| {
                        let old = decode_key(op, field(op, Some(p), "old")?)?;
                        let new = decode_key(op, field(op, Some(p), "new")?)?;
                        Ok((old, new))
                    })
                    .collect::<TomeResult<_>>()?,
            )
        }
        "splice" => {
            let args = value
                .and_then(Value::as_array)
                .ok_or_else(|| TomeError::malformed(op, "value must be an array"))?;
            DiffOp::Splice {
                start: decode_usize(op, args.first(), "start")?,
                delete_count: decode_usize(op, args.get(1), "deleteCount")?,
                items: args.iter().skip(2).map(Plain::from).collect(),
            }
        }
        "swap" => DiffOp::Swap {
            key: decode_key(op, field(op, value, "key")?)?,
            target: decode_chain(op, field(op, value, "target")?)?,
        },
        other => return Err(TomeError::UnsupportedOperation(other.to_owned())),
    })
}
