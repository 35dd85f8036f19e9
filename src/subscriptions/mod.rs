//! Subordinate subscriptions.
//!
//! Each subordinate registers once per connection with a shape
//! descriptor and a client id. The registry keeps:
//! - one subscription per connection handle
//! - at most one subscription per window (a reload replaces the old one)
//!
//! Entries leave on explicit lifecycle signals, or are pruned during a
//! broadcast when their connection turns out to be gone.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = SubscriptionRegistry::new();
//! let (connection, receiver) = ChannelConnection::unbounded(HandleId(1));
//!
//! registry.register(Box::new(connection), shape, "settings-window", Some(WindowId(3)));
//!
//! // The window reloads: new handle, same window.
//! let (connection, receiver) = ChannelConnection::unbounded(HandleId(2));
//! registry.register(Box::new(connection), shape, "settings-window", Some(WindowId(3)));
//! assert_eq!(registry.len(), 1);
//! ```

mod registry;
mod types;

pub use registry::SubscriptionRegistry;
pub use types::Subscription;
