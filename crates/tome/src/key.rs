//! Keys and chains.
//!
//! A [`Key`] names a child inside its parent: an index for array slots, a
//! property name for object members. A chain is the ordered list of keys
//! walked from a root down to a node, and is how diff entries address nodes
//! in a remote tree.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A property name or array index.
///
/// Serializes untagged: indices as JSON numbers, names as JSON strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Index(usize),
    Name(String),
}

/// Path from a root to a node.
pub type Chain = Vec<Key>;

impl Key {
    /// Returns the array index this key denotes, if any.
    ///
    /// Names only count as indices in canonical decimal form, so `"3"` is an
    /// index and `"03"` is not.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(s) => {
                if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
                    return None;
                }
                if !s.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                s.parse().ok()
            }
        }
    }

    /// Returns the property name this key denotes.
    pub fn as_name(&self) -> Cow<'_, str> {
        match self {
            Key::Index(i) => Cow::Owned(i.to_string()),
            Key::Name(s) => Cow::Borrowed(s),
        }
    }

    pub fn into_name(self) -> String {
        match self {
            Key::Index(i) => i.to_string(),
            Key::Name(s) => s,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

/// Non-negative values become indices; negative ones are plain property
/// names, the way `arr[-1]` names a property rather than a slot.
impl From<i32> for Key {
    fn from(i: i32) -> Self {
        match usize::try_from(i) {
            Ok(i) => Key::Index(i),
            Err(_) => Key::Name(i.to_string()),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Name(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Name(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::Name(s.clone())
    }
}

fn escape_component(component: &str) -> Cow<'_, str> {
    if !component.contains(['~', '/']) {
        return Cow::Borrowed(component);
    }
    // `~` first so the `~1` introduced for `/` is not re-escaped.
    Cow::Owned(component.replace('~', "~0").replace('/', "~1"))
}

/// Formats a chain as a JSON Pointer (RFC 6901). The root chain is `""`.
pub fn format_chain(chain: &[Key]) -> String {
    let mut out = String::new();
    for key in chain {
        out.push('/');
        out.push_str(&escape_component(&key.as_name()));
    }
    out
}
