//! Subscription types.

use crate::shape::ShapeDescriptor;
use crate::transport::Connection;
use crate::types::{HandleId, WindowId};
use std::fmt;

/// One subordinate's live subscription.
pub struct Subscription {
    pub(super) connection: Box<dyn Connection>,
    pub(super) shape: ShapeDescriptor,
    pub(super) client_id: String,
    /// Window owning the connection (None for embedded/guest content).
    pub(super) window_id: Option<WindowId>,
}

impl Subscription {
    pub fn handle(&self) -> HandleId {
        self.connection.handle()
    }

    pub fn shape(&self) -> &ShapeDescriptor {
        &self.shape
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn window_id(&self) -> Option<WindowId> {
        self.window_id
    }

    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle())
            .field("client_id", &self.client_id)
            .field("window_id", &self.window_id)
            .field("shape", &self.shape)
            .finish()
    }
}
