//! Mirroring store mutations to subscribers.
//!
//! Every action goes through the same steps:
//! 1. stamp `source` if unset
//! 2. snapshot, run hooks and the store's dispatch, snapshot again
//! 3. diff the two snapshots
//! 4. project the diff per subscriber and send the non-empty ones
//!
//! Relayed actions carry a [`DispatchContext`] naming the subordinate
//! that sent them, which becomes the broadcast's provenance tag.

mod context;
mod pipeline;

pub use context::{BroadcastReport, DispatchContext};
pub use pipeline::{DispatchHook, DispatchPipeline, SyncConfig};
