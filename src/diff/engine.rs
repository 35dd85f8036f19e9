//! The diff engine.

use super::node::DiffNode;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Difference between two state snapshots.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StateDiff {
    /// Branches whose value changed, holding the new value.
    pub updated: DiffNode,
    /// Locations removed, holding the previous value.
    pub deleted: DiffNode,
}

impl StateDiff {
    /// True when neither half carries anything.
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Render as `{"updated": .., "deleted": ..}`.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "updated": self.updated.to_value(),
            "deleted": self.deleted.to_value(),
        })
    }
}

/// Compute the difference between `prev` and `next`.
///
/// Every location is visited once, so this runs in time proportional to
/// the size of both snapshots. When the roots are not containers of the
/// same kind, `updated` is the whole of `next` and `deleted` lists the
/// children `prev` had.
pub fn diff(prev: &Value, next: &Value) -> StateDiff {
    let mut updated = BTreeMap::new();
    let mut deleted = BTreeMap::new();

    match (prev, next) {
        (Value::Object(prev_map), Value::Object(next_map)) => {
            for (key, next_child) in next_map {
                match prev_map.get(key) {
                    Some(prev_child) => {
                        diff_child(key, prev_child, next_child, &mut updated, &mut deleted)
                    }
                    None => {
                        updated.insert(key.clone(), DiffNode::Value(next_child.clone()));
                    }
                }
            }

            for (key, prev_child) in prev_map {
                if !next_map.contains_key(key) {
                    deleted.insert(key.clone(), DiffNode::Value(prev_child.clone()));
                }
            }
        }

        (Value::Array(prev_items), Value::Array(next_items)) => {
            for (index, next_child) in next_items.iter().enumerate() {
                let key = index.to_string();
                match prev_items.get(index) {
                    Some(prev_child) => {
                        diff_child(&key, prev_child, next_child, &mut updated, &mut deleted)
                    }
                    None => {
                        updated.insert(key, DiffNode::Value(next_child.clone()));
                    }
                }
            }

            for (index, prev_child) in prev_items.iter().enumerate().skip(next_items.len()) {
                deleted.insert(index.to_string(), DiffNode::Value(prev_child.clone()));
            }
        }

        // Scalars, or containers of different kinds: the comparison
        // never walks a subtree.
        _ if prev == next => return StateDiff::default(),
        _ => {
            return StateDiff {
                updated: DiffNode::Value(next.clone()),
                deleted: DiffNode::Branch(removed_children(prev)),
            };
        }
    }

    StateDiff {
        updated: DiffNode::Branch(updated),
        deleted: DiffNode::Branch(deleted),
    }
}

/// Diff one child present on both sides.
fn diff_child(
    key: &str,
    prev: &Value,
    next: &Value,
    updated: &mut BTreeMap<String, DiffNode>,
    deleted: &mut BTreeMap<String, DiffNode>,
) {
    if !same_container_kind(prev, next) {
        if prev != next {
            // The new value replaces the old one; whatever the old
            // container held below this key is gone.
            updated.insert(key.to_string(), DiffNode::Value(next.clone()));
            let removed = removed_children(prev);
            if !removed.is_empty() {
                deleted.insert(key.to_string(), DiffNode::Branch(removed));
            }
        }
        return;
    }

    // Equal containers come back empty from `diff` itself.
    let child = diff(prev, next);
    if !child.updated.is_empty() {
        updated.insert(key.to_string(), child.updated);
    }
    if !child.deleted.is_empty() {
        deleted.insert(key.to_string(), child.deleted);
    }
}

/// Children of a container, as whole-value deletions keyed the way
/// `diff` keys them. Scalars have none.
fn removed_children(prev: &Value) -> BTreeMap<String, DiffNode> {
    match prev {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), DiffNode::Value(value.clone())))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, value)| (index.to_string(), DiffNode::Value(value.clone())))
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn same_container_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_))
    )
}
