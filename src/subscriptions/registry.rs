//! Registry of active subordinate subscriptions.

use crate::error::DeliveryError;
use crate::shape::ShapeDescriptor;
use crate::transport::Connection;
use crate::types::{HandleId, WindowId};
use std::collections::HashMap;
use tracing::{debug, trace};

use super::types::Subscription;

/// Tracks subscriptions by connection handle, with at most one per window.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    /// Active subscriptions by handle.
    subscriptions: HashMap<HandleId, Subscription>,
    /// Which handle currently speaks for each window.
    windows: HashMap<WindowId, HandleId>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a subscription under the connection's handle.
    ///
    /// If `owner_window` already has a subscription (the window reloaded
    /// and its old connection is stale), that one is removed first.
    /// Returns the subscription that was displaced, if any.
    pub fn register(
        &mut self,
        connection: Box<dyn Connection>,
        shape: ShapeDescriptor,
        client_id: impl Into<String>,
        owner_window: Option<WindowId>,
    ) -> Option<Subscription> {
        let handle = connection.handle();
        let client_id = client_id.into();

        let mut replaced = self.unregister(handle);

        if let Some(window) = owner_window {
            if let Some(stale) = self.windows.get(&window).copied() {
                debug!(%window, %stale, %handle, "replacing window subscription");
                replaced = self.unregister(stale).or(replaced);
            }
            self.windows.insert(window, handle);
        }

        debug!(%handle, client_id = %client_id, ?owner_window, "subscription registered");
        self.subscriptions.insert(
            handle,
            Subscription {
                connection,
                shape,
                client_id,
                window_id: owner_window,
            },
        );

        replaced
    }

    /// Remove a subscription. Removing an absent handle is a no-op.
    pub fn unregister(&mut self, handle: HandleId) -> Option<Subscription> {
        let subscription = self.subscriptions.remove(&handle)?;

        if let Some(window) = subscription.window_id {
            if self.windows.get(&window) == Some(&handle) {
                self.windows.remove(&window);
            }
        }

        debug!(%handle, client_id = %subscription.client_id, "subscription removed");
        Some(subscription)
    }

    /// Remove whatever subscription speaks for `window`.
    pub fn unregister_window(&mut self, window: WindowId) -> Option<Subscription> {
        let handle = self.windows.get(&window).copied()?;
        self.unregister(handle)
    }

    /// Visit every active subscription.
    ///
    /// The set visited is fixed when the call begins. A subscription whose
    /// connection is no longer alive, or whose visit reports it
    /// disconnected, is pruned and the walk continues with the rest.
    /// Returns the number pruned.
    pub fn for_each_active<F>(&mut self, mut visit: F) -> usize
    where
        F: FnMut(&Subscription) -> Result<(), DeliveryError>,
    {
        let mut handles: Vec<HandleId> = self.subscriptions.keys().copied().collect();
        handles.sort_unstable();

        let mut dead = Vec::new();
        for handle in handles {
            let Some(subscription) = self.subscriptions.get(&handle) else {
                continue;
            };

            if !subscription.connection.is_alive() {
                dead.push(handle);
                continue;
            }

            match visit(subscription) {
                Ok(()) => {}
                Err(DeliveryError::Disconnected(_)) => dead.push(handle),
                Err(DeliveryError::Full(_)) => {
                    trace!(%handle, "delivery dropped, keeping subscription");
                }
            }
        }

        for handle in &dead {
            debug!(%handle, "pruning dead subscription");
            self.unregister(*handle);
        }

        dead.len()
    }

    pub fn get(&self, handle: HandleId) -> Option<&Subscription> {
        self.subscriptions.get(&handle)
    }

    /// Client id registered for `handle`.
    pub fn client_id(&self, handle: HandleId) -> Option<&str> {
        self.subscriptions.get(&handle).map(|s| s.client_id.as_str())
    }

    /// Handle currently registered for `window`.
    pub fn window_handle(&self, window: WindowId) -> Option<HandleId> {
        self.windows.get(&window).copied()
    }

    pub fn contains(&self, handle: HandleId) -> bool {
        self.subscriptions.contains_key(&handle)
    }

    /// Active handles, in ascending order.
    pub fn handles(&self) -> Vec<HandleId> {
        let mut handles: Vec<HandleId> = self.subscriptions.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
