//! Partial trees produced by the diff engine.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One node of a partial state tree.
///
/// `Branch` means "descend": only the listed children are part of the
/// tree. `Value` means "this whole value" at this location. Array
/// children of a `Branch` are keyed by their decimal index.
#[derive(Clone, Debug, PartialEq)]
pub enum DiffNode {
    Value(Value),
    Branch(BTreeMap<String, DiffNode>),
}

impl DiffNode {
    /// An empty branch (nothing changed).
    pub fn empty() -> Self {
        DiffNode::Branch(BTreeMap::new())
    }

    /// True for a branch with no children. A `Value` is never empty,
    /// even when it holds `{}`: writing `{}` is still a change.
    pub fn is_empty(&self) -> bool {
        matches!(self, DiffNode::Branch(children) if children.is_empty())
    }

    /// Child of a branch.
    pub fn get(&self, key: &str) -> Option<&DiffNode> {
        match self {
            DiffNode::Branch(children) => children.get(key),
            DiffNode::Value(_) => None,
        }
    }

    /// Render as plain JSON, the form carried on the wire.
    pub fn to_value(&self) -> Value {
        match self {
            DiffNode::Value(value) => value.clone(),
            DiffNode::Branch(children) => Value::Object(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.to_value()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }

    /// Count the locations covered by this tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            DiffNode::Value(_) => 1,
            DiffNode::Branch(children) => children.values().map(DiffNode::leaf_count).sum(),
        }
    }
}

impl Default for DiffNode {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for DiffNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DiffNode::Value(value) => value.serialize(serializer),
            DiffNode::Branch(children) => serializer.collect_map(children),
        }
    }
}
