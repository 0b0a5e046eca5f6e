//! Plain JSON-compatible values.
//!
//! [`Plain`] is what goes into a tree (`conjure`, `assign`, `set`, ...) and
//! what comes back out of one (`un_tome`). It is a JSON value plus one extra
//! variant, [`Plain::Unset`], marking an array slot that holds no value.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::node::TypeTag;

/// Largest integer an `f64` holds exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Plain {
    /// Array slot without a value. Never valid as an object member or root.
    Unset,
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Plain>),
    Object(BTreeMap<String, Plain>),
}

impl Plain {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Plain::Unset => TypeTag::Unset,
            Plain::Null => TypeTag::Null,
            Plain::Bool(_) => TypeTag::Boolean,
            Plain::Number(_) => TypeTag::Number,
            Plain::Str(_) => TypeTag::String,
            Plain::Array(_) => TypeTag::Array,
            Plain::Object(_) => TypeTag::Object,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Plain::Unset)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Plain::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Plain::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Plain]> {
        match self {
            Plain::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Plain>> {
        match self {
            Plain::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Nesting depth: scalars are 0, `[]` and `{}` are 1.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((value, depth)) = stack.pop() {
            match value {
                Plain::Array(items) => {
                    max = max.max(depth + 1);
                    stack.extend(items.iter().map(|v| (v, depth + 1)));
                }
                Plain::Object(map) => {
                    max = max.max(depth + 1);
                    stack.extend(map.values().map(|v| (v, depth + 1)));
                }
                _ => {}
            }
        }
        max
    }

    /// Converts to a `serde_json::Value`.
    ///
    /// Unset array slots become `null`, unset object members are dropped
    /// and integral numbers are written as JSON integers.
    pub fn to_json(&self) -> Value {
        match self {
            Plain::Unset | Plain::Null => Value::Null,
            Plain::Bool(b) => Value::Bool(*b),
            Plain::Number(n) => number_to_json(*n),
            Plain::Str(s) => Value::String(s.clone()),
            Plain::Array(items) => Value::Array(items.iter().map(Plain::to_json).collect()),
            Plain::Object(map) => Value::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_unset())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Renders the value the way a `toString()` call would.
    pub fn to_js_string(&self) -> String {
        match self {
            Plain::Unset => "undefined".to_owned(),
            Plain::Null => "null".to_owned(),
            Plain::Bool(b) => b.to_string(),
            Plain::Number(n) => format_number(*n),
            Plain::Str(s) => s.clone(),
            Plain::Array(items) => items
                .iter()
                .map(|item| match item {
                    Plain::Unset | Plain::Null => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Plain::Object(_) => "[object Object]".to_owned(),
        }
    }
}

fn number_to_json(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<Value> for Plain {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Plain::Null,
            Value::Bool(b) => Plain::Bool(b),
            Value::Number(n) => Plain::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => Plain::Str(s),
            Value::Array(items) => Plain::Array(items.into_iter().map(Plain::from).collect()),
            Value::Object(map) => {
                Plain::Object(map.into_iter().map(|(k, v)| (k, Plain::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for Plain {
    fn from(v: &Value) -> Self {
        Plain::from(v.clone())
    }
}

impl From<&Plain> for Value {
    fn from(p: &Plain) -> Self {
        p.to_json()
    }
}

impl From<Plain> for Value {
    fn from(p: Plain) -> Self {
        p.to_json()
    }
}

impl From<bool> for Plain {
    fn from(b: bool) -> Self {
        Plain::Bool(b)
    }
}

impl From<f64> for Plain {
    fn from(n: f64) -> Self {
        Plain::Number(n)
    }
}

impl From<i32> for Plain {
    fn from(n: i32) -> Self {
        Plain::Number(f64::from(n))
    }
}

impl From<u32> for Plain {
    fn from(n: u32) -> Self {
        Plain::Number(f64::from(n))
    }
}

impl From<i64> for Plain {
    fn from(n: i64) -> Self {
        Plain::Number(n as f64)
    }
}

impl From<usize> for Plain {
    fn from(n: usize) -> Self {
        Plain::Number(n as f64)
    }
}

impl From<&str> for Plain {
    fn from(s: &str) -> Self {
        Plain::Str(s.to_owned())
    }
}

impl From<String> for Plain {
    fn from(s: String) -> Self {
        Plain::Str(s)
    }
}

impl From<Vec<Plain>> for Plain {
    fn from(items: Vec<Plain>) -> Self {
        Plain::Array(items)
    }
}

impl From<BTreeMap<String, Plain>> for Plain {
    fn from(map: BTreeMap<String, Plain>) -> Self {
        Plain::Object(map)
    }
}

impl Serialize for Plain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Plain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Plain::from)
    }
}
