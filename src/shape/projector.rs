//! Restricting diffs and snapshots to a shape.

use super::descriptor::ShapeDescriptor;
use crate::diff::{DiffNode, StateDiff};
use serde_json::Value;
use std::collections::BTreeMap;

/// Restrict a diff node to the paths selected by `shape`.
///
/// The result is always a subset of `node`. An empty result means the
/// shape selects nothing that changed.
pub fn project(node: &DiffNode, shape: &ShapeDescriptor) -> DiffNode {
    match shape {
        ShapeDescriptor::Leaf(true) => node.clone(),
        ShapeDescriptor::Leaf(false) => DiffNode::empty(),
        ShapeDescriptor::Node(wanted) => match node {
            DiffNode::Branch(children) => {
                let mut out = BTreeMap::new();
                for (key, child_shape) in wanted {
                    if let Some(child) = children.get(key) {
                        keep(&mut out, key, project(child, child_shape));
                    }
                }
                DiffNode::Branch(out)
            }
            DiffNode::Value(value) => project_value(value, shape),
        },
    }
}

/// Filter a full state snapshot through `shape`.
///
/// Used to seed a new subscriber with the part of the state it watches.
pub fn project_state(state: &Value, shape: &ShapeDescriptor) -> Value {
    project_value(state, shape).to_value()
}

fn project_value(value: &Value, shape: &ShapeDescriptor) -> DiffNode {
    let wanted = match shape {
        ShapeDescriptor::Leaf(true) => return DiffNode::Value(value.clone()),
        ShapeDescriptor::Leaf(false) => return DiffNode::empty(),
        ShapeDescriptor::Node(wanted) => wanted,
    };

    let mut out = BTreeMap::new();
    match value {
        Value::Object(map) => {
            for (key, child_shape) in wanted {
                if let Some(child) = map.get(key) {
                    keep(&mut out, key, project_value(child, child_shape));
                }
            }
        }
        Value::Array(items) => {
            for (key, child_shape) in wanted {
                let child = key.parse::<usize>().ok().and_then(|i| items.get(i));
                if let Some(child) = child {
                    keep(&mut out, key, project_value(child, child_shape));
                }
            }
        }
        // A scalar sitting where the shape expects children overwrites
        // every watched path below it.
        _ if shape.is_interested() => return DiffNode::Value(value.clone()),
        _ => {}
    }
    DiffNode::Branch(out)
}

fn keep(out: &mut BTreeMap<String, DiffNode>, key: &str, node: DiffNode) {
    if !node.is_empty() {
        out.insert(key.to_string(), node);
    }
}

impl StateDiff {
    /// Project both halves of this diff through `shape`.
    pub fn project(&self, shape: &ShapeDescriptor) -> StateDiff {
        StateDiff {
            updated: project(&self.updated, shape),
            deleted: project(&self.deleted, shape),
        }
    }
}
