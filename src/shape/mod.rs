//! Shape descriptors and diff projection.
//!
//! A subscriber declares the branches of state it cares about with a
//! [`ShapeDescriptor`]. Anything not named is excluded. Projection
//! restricts a diff (or a full snapshot) to the declared shape.
//!
//! On the wire a shape is plain JSON: `true` marks interest in a whole
//! subtree and nested objects name children.
//!
//! ```ignore
//! let shape: ShapeDescriptor = serde_json::from_value(json!({
//!     "todos": true,
//!     "user": {"name": true},
//! }))?;
//!
//! let projected = diff(&prev, &next).project(&shape);
//! if !projected.is_empty() {
//!     // send it
//! }
//! ```

mod descriptor;
mod projector;

pub use descriptor::ShapeDescriptor;
pub use projector::{project, project_state};
