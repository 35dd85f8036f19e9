//! Inbound message handling for the primary process.
//!
//! The transport turns what it receives into [`HostEvent`]s. A
//! [`SyncHub`] applies them to the pipeline one at a time, so local
//! dispatches and relayed ones never interleave mid-broadcast.

use crate::dispatch::{BroadcastReport, DispatchPipeline};
use crate::error::{Result, SyncError};
use crate::store::Store;
use crate::transport::{Connection, RegisterRequest};
use crate::types::{Action, HandleId, WindowId};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Something the transport or the host environment reported.
pub enum HostEvent {
    /// A subordinate sent its registration on the `register` channel.
    Register {
        connection: Box<dyn Connection>,
        /// Window owning the connection; None for embedded content.
        owner_window: Option<WindowId>,
        /// JSON `RegisterRequest`.
        payload: String,
    },

    /// A subordinate asked for an action on the `relay-dispatch` channel.
    RelayDispatch { handle: HandleId, payload: String },

    /// The connection was closed.
    ConnectionClosed(HandleId),

    /// The subordinate process crashed or was destroyed.
    ConnectionDestroyed(HandleId),

    /// A window closed. Its connection is not torn down on its own.
    WindowClosed(WindowId),
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEvent::Register {
                connection,
                owner_window,
                ..
            } => f
                .debug_struct("Register")
                .field("handle", &connection.handle())
                .field("owner_window", owner_window)
                .finish(),
            HostEvent::RelayDispatch { handle, .. } => {
                f.debug_struct("RelayDispatch").field("handle", handle).finish()
            }
            HostEvent::ConnectionClosed(handle) => {
                f.debug_tuple("ConnectionClosed").field(handle).finish()
            }
            HostEvent::ConnectionDestroyed(handle) => {
                f.debug_tuple("ConnectionDestroyed").field(handle).finish()
            }
            HostEvent::WindowClosed(window) => f.debug_tuple("WindowClosed").field(window).finish(),
        }
    }
}

/// Owns the pipeline and serializes access to it.
///
/// The lock is not reentrant and is held for the whole of a dispatch,
/// including the store, its reducer and the dispatch hooks. None of those
/// may call back into the same hub; doing so deadlocks. Follow-up actions
/// belong on the event channel fed to [`SyncHub::run`].
pub struct SyncHub<S> {
    pipeline: Mutex<DispatchPipeline<S>>,
}

impl<S: Store> SyncHub<S> {
    pub fn new(pipeline: DispatchPipeline<S>) -> Self {
        Self {
            pipeline: Mutex::new(pipeline),
        }
    }

    /// Apply one event. Returns the broadcast report for relays.
    pub fn handle(&self, event: HostEvent) -> Result<Option<BroadcastReport>> {
        let mut pipeline = self.pipeline.lock();

        match event {
            HostEvent::Register {
                connection,
                owner_window,
                payload,
            } => {
                let handle = connection.handle();
                let request: RegisterRequest = serde_json::from_str(&payload).map_err(|e| {
                    SyncError::MalformedRegistration {
                        handle,
                        reason: e.to_string(),
                    }
                })?;
                pipeline.register(connection, request, owner_window);
                Ok(None)
            }

            HostEvent::RelayDispatch { handle, payload } => {
                pipeline.relay(handle, &payload).map(Some)
            }

            HostEvent::ConnectionClosed(handle) | HostEvent::ConnectionDestroyed(handle) => {
                pipeline.unregister(handle);
                Ok(None)
            }

            HostEvent::WindowClosed(window) => {
                pipeline.unregister_window(window);
                Ok(None)
            }
        }
    }

    /// Dispatch an action from the primary process itself.
    pub fn dispatch(&self, action: Action) -> Result<BroadcastReport> {
        self.pipeline.lock().dispatch(action)
    }

    /// Shape-filtered state for a registered subscriber.
    pub fn snapshot_for(&self, handle: HandleId) -> Result<Value> {
        self.pipeline.lock().snapshot_for(handle)
    }

    pub fn subscription_count(&self) -> usize {
        self.pipeline.lock().registry().len()
    }

    /// Run `f` with exclusive access to the pipeline.
    pub fn with_pipeline<T>(&self, f: impl FnOnce(&mut DispatchPipeline<S>) -> T) -> T {
        f(&mut self.pipeline.lock())
    }

    /// Apply events until every sender is dropped.
    ///
    /// A rejected event is logged and skipped; it never stops the loop.
    /// Returns the number of events that failed.
    pub fn run(&self, events: Receiver<HostEvent>) -> usize {
        let mut failures = 0;

        for event in events.iter() {
            let label = format!("{:?}", event);
            match self.handle(event) {
                Ok(Some(report)) => debug!(
                    event = %label,
                    delivered = report.delivered,
                    pruned = report.pruned,
                    "relay handled"
                ),
                Ok(None) => debug!(event = %label, "event handled"),
                Err(err) => {
                    failures += 1;
                    warn!(event = %label, error = %err, "rejected inbound message");
                }
            }
        }

        debug!(failures, "event channel closed");
        failures
    }

    /// Take the pipeline back out.
    pub fn into_inner(self) -> DispatchPipeline<S> {
        self.pipeline.into_inner()
    }
}
