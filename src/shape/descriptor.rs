//! The shape descriptor type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Declares which branches of the state a subscriber wants.
///
/// `Leaf(true)` covers everything beneath it, `Leaf(false)` nothing.
/// `Node` names children; unnamed children are excluded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ShapeDescriptor {
    Leaf(bool),
    Node(BTreeMap<String, ShapeDescriptor>),
}

impl ShapeDescriptor {
    /// Interest in the whole state.
    pub fn all() -> Self {
        ShapeDescriptor::Leaf(true)
    }

    /// Interest in nothing.
    pub fn none() -> Self {
        ShapeDescriptor::Node(BTreeMap::new())
    }

    /// Build a shape from dotted paths, e.g. `["todos", "user.name"]`.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut shape = Self::none();
        for path in paths {
            let segments: Vec<&str> = path
                .as_ref()
                .split('.')
                .filter(|s| !s.is_empty())
                .collect();
            shape.insert_path(&segments);
        }
        shape
    }

    /// Add a child to a node shape. A leaf becomes a node first, so
    /// `Leaf(true).with(..)` narrows interest to the named children.
    pub fn with(mut self, key: impl Into<String>, child: ShapeDescriptor) -> Self {
        if let ShapeDescriptor::Leaf(_) = self {
            self = Self::none();
        }
        if let ShapeDescriptor::Node(children) = &mut self {
            children.insert(key.into(), child);
        }
        self
    }

    /// Shape for a child key, if the child is named.
    pub fn child(&self, key: &str) -> Option<&ShapeDescriptor> {
        match self {
            ShapeDescriptor::Node(children) => children.get(key),
            ShapeDescriptor::Leaf(_) => None,
        }
    }

    /// True if any location is selected by this shape.
    pub fn is_interested(&self) -> bool {
        match self {
            ShapeDescriptor::Leaf(interested) => *interested,
            ShapeDescriptor::Node(children) => children.values().any(Self::is_interested),
        }
    }

    fn insert_path(&mut self, segments: &[&str]) {
        let Some((first, rest)) = segments.split_first() else {
            *self = ShapeDescriptor::Leaf(true);
            return;
        };

        match self {
            // Already covered by a broader interest.
            ShapeDescriptor::Leaf(true) => {}
            ShapeDescriptor::Leaf(false) => {
                *self = Self::none();
                self.insert_path(segments);
            }
            ShapeDescriptor::Node(children) => {
                children
                    .entry(first.to_string())
                    .or_insert_with(Self::none)
                    .insert_path(rest);
            }
        }
    }
}

impl Default for ShapeDescriptor {
    fn default() -> Self {
        Self::none()
    }
}

impl From<Value> for ShapeDescriptor {
    /// Read the plain JSON form. Objects (and arrays, by index) become
    /// nodes; any other value is a leaf, truthy or not.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => ShapeDescriptor::Node(
                map.into_iter()
                    .map(|(key, child)| (key, ShapeDescriptor::from(child)))
                    .collect(),
            ),
            Value::Array(items) => ShapeDescriptor::Node(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, child)| (index.to_string(), ShapeDescriptor::from(child)))
                    .collect(),
            ),
            Value::Bool(b) => ShapeDescriptor::Leaf(b),
            Value::Null => ShapeDescriptor::Leaf(false),
            Value::Number(n) => ShapeDescriptor::Leaf(n.as_f64().is_some_and(|f| f != 0.0)),
            Value::String(s) => ShapeDescriptor::Leaf(!s.is_empty()),
        }
    }
}

impl From<ShapeDescriptor> for Value {
    fn from(shape: ShapeDescriptor) -> Self {
        match shape {
            ShapeDescriptor::Leaf(b) => Value::Bool(b),
            ShapeDescriptor::Node(children) => Value::Object(
                children
                    .into_iter()
                    .map(|(key, child)| (key, Value::from(child)))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}
