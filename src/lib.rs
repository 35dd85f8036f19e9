//! # State Mirror
//!
//! Keeps one authoritative state in a primary process and mirrors the
//! parts each subordinate process asks for, over a message transport.
//!
//! ## Core Concepts
//!
//! - **Diff**: every mutation is diffed into `{updated, deleted}` trees
//! - **Shapes**: each subordinate declares the branches it watches
//! - **Projection**: a diff is cut down to each subscriber's shape, and
//!   empty projections are never sent
//! - **Registry**: subscriptions follow connection and window lifecycles,
//!   and dead connections are pruned without stopping a broadcast
//!
//! ## Example
//!
//! ```ignore
//! use state_mirror::{
//!     Action, ChannelConnection, DispatchPipeline, HandleId, ReducerStore,
//!     RegisterRequest, ShapeDescriptor, SyncConfig, WindowId,
//! };
//!
//! let store = ReducerStore::new(reducer, json!({"todos": [], "user": {}}));
//! let mut pipeline = DispatchPipeline::new(store, SyncConfig::default());
//!
//! // A window subscribes to the todo list only
//! let (connection, receiver) = ChannelConnection::unbounded(HandleId(1));
//! pipeline.register(
//!     Box::new(connection),
//!     RegisterRequest {
//!         shape_descriptor: ShapeDescriptor::from_paths(["todos"]),
//!         client_id: "todo-window".into(),
//!     },
//!     Some(WindowId(1)),
//! );
//!
//! // Only changes under `todos` reach it
//! pipeline.dispatch(Action::new("ADD_TODO").with("text", json!("milk")))?;
//! let message = receiver.recv()?;
//! ```

pub mod diff;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod shape;
pub mod store;
pub mod subscriptions;
pub mod transport;
pub mod types;

// Re-exports
pub use diff::{diff, DiffNode, StateDiff};
pub use dispatch::{BroadcastReport, DispatchContext, DispatchHook, DispatchPipeline, SyncConfig};
pub use error::{DeliveryError, Result, SyncError};
pub use hub::{HostEvent, SyncHub};
pub use shape::{project, project_state, ShapeDescriptor};
pub use store::{ReducerStore, Store};
pub use subscriptions::{Subscription, SubscriptionRegistry};
pub use transport::{
    BroadcastMessage, BroadcastReceiver, Channel, ChannelConnection, Connection, RegisterRequest,
    DEFAULT_CHANNEL_PREFIX,
};
pub use types::*;
