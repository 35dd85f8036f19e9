//! Wire messages and the connection seam to subordinate processes.
//!
//! The transport itself (IPC, sockets, in-process channels) lives
//! outside this crate. It hands us a [`Connection`] per subordinate and
//! delivers the inbound messages described here.

use crate::error::{DeliveryError, Result};
use crate::shape::ShapeDescriptor;
use crate::types::{Action, HandleId};
use crossbeam_channel::{
    bounded, unbounded, Receiver, RecvError, RecvTimeoutError, Sender, TryIter, TryRecvError,
    TrySendError,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Prefix shared by every channel name.
pub const DEFAULT_CHANNEL_PREFIX: &str = "__STATE_MIRROR__";

/// The channels the sync protocol uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// subordinate → primary: `RegisterRequest`
    Register,
    /// subordinate → primary: serialized `Action`
    RelayDispatch,
    /// primary → subordinate: `BroadcastMessage`
    Broadcast,
}

impl Channel {
    pub fn suffix(&self) -> &'static str {
        match self {
            Channel::Register => "register",
            Channel::RelayDispatch => "relay-dispatch",
            Channel::Broadcast => "broadcast",
        }
    }

    /// Full channel name under `prefix`.
    pub fn name(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.suffix())
    }
}

/// Registration sent by a subordinate when it starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(alias = "filter")]
    pub shape_descriptor: ShapeDescriptor,
    pub client_id: String,
}

/// A state change pushed to one subordinate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMessage {
    /// JSON action, with `data: {updated, deleted}` projected for the receiver.
    pub action: String,
    /// Who caused the change: a relaying client id or the primary's identity.
    pub source_client_id: String,
}

impl BroadcastMessage {
    /// Decode the carried action.
    pub fn decode_action(&self) -> Result<Action> {
        Ok(serde_json::from_str(&self.action)?)
    }
}

/// A subordinate's end of the transport, as seen by the primary.
pub trait Connection: Send {
    /// Handle assigned by the transport. Unique among live connections.
    fn handle(&self) -> HandleId;

    /// False once the other end is known to be closed or crashed.
    fn is_alive(&self) -> bool {
        true
    }

    /// Fire-and-forget delivery.
    fn send(&self, message: BroadcastMessage) -> std::result::Result<(), DeliveryError>;
}

/// A connection backed by a crossbeam channel.
///
/// Dropping the [`BroadcastReceiver`] marks the connection dead; the
/// next broadcast prunes it whether or not anything was sent to it.
pub struct ChannelConnection {
    handle: HandleId,
    sender: Sender<BroadcastMessage>,
    alive: Arc<AtomicBool>,
}

impl ChannelConnection {
    /// Create a connection with an unbounded queue.
    pub fn unbounded(handle: HandleId) -> (Self, BroadcastReceiver) {
        Self::from_channel(handle, unbounded())
    }

    /// Create a connection with a bounded queue. Messages beyond
    /// `capacity` are dropped.
    pub fn bounded(handle: HandleId, capacity: usize) -> (Self, BroadcastReceiver) {
        Self::from_channel(handle, bounded(capacity))
    }

    fn from_channel(
        handle: HandleId,
        (sender, receiver): (Sender<BroadcastMessage>, Receiver<BroadcastMessage>),
    ) -> (Self, BroadcastReceiver) {
        let alive = Arc::new(AtomicBool::new(true));
        let connection = Self {
            handle,
            sender,
            alive: Arc::clone(&alive),
        };
        (connection, BroadcastReceiver { receiver, alive })
    }
}

impl Connection for ChannelConnection {
    fn handle(&self) -> HandleId {
        self.handle
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn send(&self, message: BroadcastMessage) -> std::result::Result<(), DeliveryError> {
        match self.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DeliveryError::Full(self.handle)),
            Err(TrySendError::Disconnected(_)) => Err(DeliveryError::Disconnected(self.handle)),
        }
    }
}

/// Subordinate end of a [`ChannelConnection`].
pub struct BroadcastReceiver {
    receiver: Receiver<BroadcastMessage>,
    alive: Arc<AtomicBool>,
}

impl BroadcastReceiver {
    /// Receive the next message (blocking).
    pub fn recv(&self) -> std::result::Result<BroadcastMessage, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<BroadcastMessage, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<BroadcastMessage, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain whatever is queued without blocking.
    pub fn try_iter(&self) -> TryIter<'_, BroadcastMessage> {
        self.receiver.try_iter()
    }
}

impl Drop for BroadcastReceiver {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}
