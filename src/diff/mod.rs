//! Structural diffing between two state snapshots.
//!
//! A diff has two halves, `updated` and `deleted`, each a partial tree
//! mirroring the state's shape:
//! - `updated` holds only the branches whose value changed
//! - `deleted` holds the previous value at every removed location
//!
//! Objects are compared per key and arrays per index. Equality is
//! structural `serde_json::Value` equality.
//!
//! # Example
//!
//! ```ignore
//! let prev = json!({"a": 1, "b": {"c": 2, "d": 3}});
//! let next = json!({"a": 1, "b": {"c": 5}, "e": 6});
//!
//! let delta = diff(&prev, &next);
//! assert_eq!(delta.updated.to_value(), json!({"b": {"c": 5}, "e": 6}));
//! assert_eq!(delta.deleted.to_value(), json!({"b": {"d": 3}}));
//! ```

mod apply;
mod engine;
mod node;

pub use engine::{diff, StateDiff};
pub use node::DiffNode;
