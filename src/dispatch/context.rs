//! Per-dispatch context and outcome.

/// Who a dispatch is running on behalf of.
///
/// Passed explicitly through one dispatch, so a relayed action's
/// broadcast is attributed to the subordinate that sent it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchContext {
    relay_client_id: Option<String>,
}

impl DispatchContext {
    /// A dispatch originating in the primary process.
    pub fn primary() -> Self {
        Self::default()
    }

    /// A dispatch relayed from the subordinate `client_id`.
    pub fn relay(client_id: impl Into<String>) -> Self {
        Self {
            relay_client_id: Some(client_id.into()),
        }
    }

    pub fn relay_client_id(&self) -> Option<&str> {
        self.relay_client_id.as_deref()
    }

    pub fn is_relay(&self) -> bool {
        self.relay_client_id.is_some()
    }
}

/// What one broadcast did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Messages handed to the transport.
    pub delivered: usize,
    /// Subscribers skipped because nothing in their shape changed.
    pub suppressed: usize,
    /// Dead subscriptions removed during the broadcast.
    pub pruned: usize,
    /// Messages lost to a full transport queue.
    pub dropped: usize,
}
