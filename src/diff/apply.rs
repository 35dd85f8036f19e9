//! Applying a diff to a state value.

use super::engine::StateDiff;
use super::node::DiffNode;
use serde_json::{Map, Value};

impl StateDiff {
    /// Apply this diff to `state` in place.
    ///
    /// Deleted locations are removed first, then updated values are
    /// written. Applying `diff(prev, next)` to `prev` yields `next`.
    pub fn apply(&self, state: &mut Value) {
        remove_deleted(state, &self.deleted);
        write_updated(state, &self.updated);
    }
}

fn remove_deleted(target: &mut Value, node: &DiffNode) {
    let children = match node {
        DiffNode::Value(_) => {
            *target = Value::Null;
            return;
        }
        DiffNode::Branch(children) => children,
    };

    match target {
        Value::Object(map) => {
            for (key, child) in children {
                match child {
                    DiffNode::Value(_) => {
                        map.remove(key);
                    }
                    DiffNode::Branch(_) => {
                        if let Some(slot) = map.get_mut(key) {
                            remove_deleted(slot, child);
                        }
                    }
                }
            }
        }

        Value::Array(items) => {
            // Recurse with the original indices, then remove from the back.
            let mut removals = Vec::new();
            for (key, child) in children {
                let Ok(index) = key.parse::<usize>() else {
                    continue;
                };
                match child {
                    DiffNode::Value(_) => removals.push(index),
                    DiffNode::Branch(_) => {
                        if let Some(slot) = items.get_mut(index) {
                            remove_deleted(slot, child);
                        }
                    }
                }
            }

            removals.sort_unstable_by(|a, b| b.cmp(a));
            for index in removals {
                if index < items.len() {
                    items.remove(index);
                }
            }
        }

        _ => {}
    }
}

fn write_updated(target: &mut Value, node: &DiffNode) {
    let children = match node {
        DiffNode::Value(value) => {
            *target = value.clone();
            return;
        }
        DiffNode::Branch(children) => children,
    };

    if children.is_empty() {
        return;
    }

    match target {
        Value::Object(map) => {
            for (key, child) in children {
                let slot = map.entry(key.clone()).or_insert(Value::Null);
                write_updated(slot, child);
            }
        }

        Value::Array(items) => {
            let mut indexed: Vec<(usize, &DiffNode)> = children
                .iter()
                .filter_map(|(key, child)| key.parse::<usize>().ok().map(|i| (i, child)))
                .collect();
            indexed.sort_unstable_by_key(|(index, _)| *index);

            for (index, child) in indexed {
                if index >= items.len() {
                    items.resize(index + 1, Value::Null);
                }
                write_updated(&mut items[index], child);
            }
        }

        _ => {
            // Descending into a scalar (or a missing slot): grow an object.
            let mut map = Map::new();
            for (key, child) in children {
                let mut slot = Value::Null;
                write_updated(&mut slot, child);
                map.insert(key.clone(), slot);
            }
            *target = Value::Object(map);
        }
    }
}
