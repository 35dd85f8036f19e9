//! The dispatch pipeline: mutate, diff, project, fan out.

use crate::diff::{diff, StateDiff};
use crate::error::{DeliveryError, Result, SyncError};
use crate::shape::project_state;
use crate::store::Store;
use crate::subscriptions::{Subscription, SubscriptionRegistry};
use crate::transport::{BroadcastMessage, Connection, RegisterRequest, DEFAULT_CHANNEL_PREFIX};
use crate::types::{Action, HandleId, WindowId, DEFAULT_SOURCE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::context::{BroadcastReport, DispatchContext};

/// Pipeline configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Overrides the identity stamped on primary-process actions.
    /// Default: "main_process"
    pub source_name: Option<String>,

    /// Prefix of every channel name.
    /// Default: "__STATE_MIRROR__"
    pub channel_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_name: None,
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
        }
    }
}

impl SyncConfig {
    /// Identity used for actions without a source and as the
    /// provenance of non-relayed broadcasts.
    pub fn default_source(&self) -> &str {
        self.source_name.as_deref().unwrap_or(DEFAULT_SOURCE)
    }
}

/// Observer called around the store's dispatch.
pub type DispatchHook = Box<dyn FnMut(&Action) + Send>;

/// Wraps a store's dispatch so every mutation is mirrored to subscribers.
pub struct DispatchPipeline<S> {
    store: S,
    registry: SubscriptionRegistry,
    config: SyncConfig,
    pre_dispatch: Option<DispatchHook>,
    post_dispatch: Option<DispatchHook>,
}

impl<S: Store> DispatchPipeline<S> {
    pub fn new(store: S, config: SyncConfig) -> Self {
        Self {
            store,
            registry: SubscriptionRegistry::new(),
            config,
            pre_dispatch: None,
            post_dispatch: None,
        }
    }

    /// Run `hook` before every store dispatch.
    ///
    /// Hooks only observe the action. They must not dispatch again: when
    /// the pipeline sits behind a [`SyncHub`](crate::SyncHub), the hub's
    /// lock is held while the hook runs and a nested dispatch through the
    /// hub deadlocks.
    pub fn with_pre_dispatch(mut self, hook: impl FnMut(&Action) + Send + 'static) -> Self {
        self.pre_dispatch = Some(Box::new(hook));
        self
    }

    /// Run `hook` after every store dispatch. The same restriction as
    /// [`with_pre_dispatch`](Self::with_pre_dispatch) applies.
    pub fn with_post_dispatch(mut self, hook: impl FnMut(&Action) + Send + 'static) -> Self {
        self.post_dispatch = Some(Box::new(hook));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // --- Registration ---

    /// Register a subordinate. Returns the subscription it displaced.
    pub fn register(
        &mut self,
        connection: Box<dyn Connection>,
        request: RegisterRequest,
        owner_window: Option<WindowId>,
    ) -> Option<Subscription> {
        self.registry.register(
            connection,
            request.shape_descriptor,
            request.client_id,
            owner_window,
        )
    }

    pub fn unregister(&mut self, handle: HandleId) -> Option<Subscription> {
        self.registry.unregister(handle)
    }

    pub fn unregister_window(&mut self, window: WindowId) -> Option<Subscription> {
        self.registry.unregister_window(window)
    }

    /// The current state filtered through a subscriber's shape.
    pub fn snapshot_for(&self, handle: HandleId) -> Result<Value> {
        let subscription = self
            .registry
            .get(handle)
            .ok_or(SyncError::Registration(handle))?;
        Ok(project_state(&self.store.get_state(), subscription.shape()))
    }

    // --- Dispatch ---

    /// Dispatch an action originating in the primary process.
    pub fn dispatch(&mut self, action: Action) -> Result<BroadcastReport> {
        self.dispatch_with(Some(action), &DispatchContext::primary())
    }

    /// Dispatch a serialized action relayed by the subordinate at `handle`.
    pub fn relay(&mut self, handle: HandleId, payload: &str) -> Result<BroadcastReport> {
        let client_id = self
            .registry
            .client_id(handle)
            .ok_or(SyncError::Registration(handle))?
            .to_string();

        let action: Action =
            serde_json::from_str(payload).map_err(|e| SyncError::MalformedAction {
                handle,
                reason: e.to_string(),
            })?;

        debug!(%handle, client_id = %client_id, action = %action.action_type, "relaying action");
        self.dispatch_with(Some(action), &DispatchContext::relay(client_id))
    }

    /// Dispatch with an explicit context.
    ///
    /// `None` is forwarded straight to the store with no diff and no
    /// broadcast.
    pub fn dispatch_with(
        &mut self,
        action: Option<Action>,
        context: &DispatchContext,
    ) -> Result<BroadcastReport> {
        let Some(mut action) = action else {
            self.store.dispatch(None);
            return Ok(BroadcastReport::default());
        };

        action.stamp_source(self.config.default_source());

        let prev_state = self.store.get_state();

        if let Some(hook) = self.pre_dispatch.as_mut() {
            hook(&action);
        }
        self.store.dispatch(Some(&action));
        if let Some(hook) = self.post_dispatch.as_mut() {
            hook(&action);
        }

        let new_state = self.store.get_state();
        let state_diff = diff(&prev_state, &new_state);

        let source_client_id = context
            .relay_client_id()
            .unwrap_or_else(|| self.config.default_source())
            .to_string();

        self.broadcast(&action, &state_diff, &source_client_id)
    }

    fn broadcast(
        &mut self,
        action: &Action,
        state_diff: &StateDiff,
        source_client_id: &str,
    ) -> Result<BroadcastReport> {
        let base = serde_json::to_value(action)?;
        let mut report = BroadcastReport::default();

        let pruned = self.registry.for_each_active(|subscription| {
            let projected = state_diff.project(subscription.shape());
            if projected.is_empty() {
                trace!(handle = %subscription.handle(), "nothing in shape changed");
                report.suppressed += 1;
                return Ok(());
            }

            let mut payload = base.clone();
            if let Value::Object(fields) = &mut payload {
                fields.insert("data".to_string(), projected.to_value());
            }

            let message = BroadcastMessage {
                action: payload.to_string(),
                source_client_id: source_client_id.to_string(),
            };

            match subscription.connection().send(message) {
                Ok(()) => {
                    report.delivered += 1;
                    Ok(())
                }
                Err(err) => {
                    if let DeliveryError::Full(handle) = err {
                        warn!(
                            %handle,
                            action = %action.action_type,
                            "broadcast dropped, queue full"
                        );
                        report.dropped += 1;
                    }
                    Err(err)
                }
            }
        });
        report.pruned = pruned;

        trace!(
            action = %action.action_type,
            delivered = report.delivered,
            suppressed = report.suppressed,
            pruned = report.pruned,
            "broadcast complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeDescriptor;
    use crate::store::ReducerStore;
    use crate::transport::{BroadcastReceiver, ChannelConnection};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Merges `action.patch` into the state; `REMOVE` drops `action.key`.
    fn merge_reducer(state: &Value, action: &Action) -> Value {
        let mut next = state.clone();
        match action.action_type.as_str() {
            "PATCH" => {
                if let (Some(Value::Object(patch)), Value::Object(fields)) =
                    (action.get("patch"), &mut next)
                {
                    for (k, v) in patch {
                        fields.insert(k.clone(), v.clone());
                    }
                }
            }
            "REMOVE" => {
                if let (Some(Value::String(key)), Value::Object(fields)) =
                    (action.get("key"), &mut next)
                {
                    fields.remove(key);
                }
            }
            _ => {}
        }
        next
    }

    type TestPipeline = DispatchPipeline<ReducerStore<fn(&Value, &Action) -> Value>>;

    fn pipeline(initial: Value) -> TestPipeline {
        let reducer: fn(&Value, &Action) -> Value = merge_reducer;
        DispatchPipeline::new(ReducerStore::new(reducer, initial), SyncConfig::default())
    }

    fn subscribe(
        pipeline: &mut TestPipeline,
        id: u64,
        client_id: &str,
        shape: Value,
    ) -> BroadcastReceiver {
        let (connection, receiver) = ChannelConnection::unbounded(HandleId(id));
        pipeline.register(
            Box::new(connection),
            RegisterRequest {
                shape_descriptor: ShapeDescriptor::from(shape),
                client_id: client_id.to_string(),
            },
            None,
        );
        receiver
    }

    fn patch(value: Value) -> Action {
        Action::new("PATCH").with("patch", value)
    }

    #[test]
    fn test_broadcast_carries_projected_data() {
        let mut pipeline = pipeline(json!({"a": 1, "b": {"c": 2, "d": 3}}));
        let rx = subscribe(&mut pipeline, 1, "w1", json!({"b": {"c": true}}));

        let report = pipeline
            .dispatch(patch(json!({"b": {"c": 5}, "e": 6})))
            .unwrap();
        assert_eq!(report.delivered, 1);

        let message = rx.try_recv().unwrap();
        assert_eq!(message.source_client_id, "main_process");

        let action = message.decode_action().unwrap();
        assert_eq!(action.action_type, "PATCH");
        assert_eq!(action.source.as_deref(), Some("main_process"));
        assert_eq!(
            action.get("data"),
            Some(&json!({"updated": {"b": {"c": 5}}, "deleted": {}}))
        );
    }

    #[test]
    fn test_suppressed_when_shape_untouched() {
        let mut pipeline = pipeline(json!({"a": 1, "b": 1}));
        let rx_a = subscribe(&mut pipeline, 1, "a", json!({"a": true}));
        let rx_b = subscribe(&mut pipeline, 2, "b", json!({"b": true}));

        let report = pipeline.dispatch(patch(json!({"a": 2}))).unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.suppressed, 1);

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_deletions_are_broadcast() {
        let mut pipeline = pipeline(json!({"a": 1, "b": 2}));
        let rx = subscribe(&mut pipeline, 1, "w", json!({"b": true}));

        pipeline
            .dispatch(Action::new("REMOVE").with("key", json!("b")))
            .unwrap();

        let action = rx.try_recv().unwrap().decode_action().unwrap();
        assert_eq!(
            action.get("data"),
            Some(&json!({"updated": {}, "deleted": {"b": 2}}))
        );
    }

    #[test]
    fn test_watched_branch_replaced_by_other_kind() {
        let mut pipeline = pipeline(json!({"a": {"x": 1}}));
        let rx = subscribe(&mut pipeline, 1, "w", json!({"a": {"x": true}}));

        let report = pipeline.dispatch(patch(json!({"a": []}))).unwrap();
        assert_eq!(report.delivered, 1);

        let action = rx.try_recv().unwrap().decode_action().unwrap();
        assert_eq!(
            action.get("data"),
            Some(&json!({"updated": {}, "deleted": {"a": {"x": 1}}}))
        );
    }

    #[test]
    fn test_source_stamped_only_when_unset() {
        let mut pipeline = pipeline(json!({}));
        let rx = subscribe(&mut pipeline, 1, "w", json!(true));

        pipeline.dispatch(patch(json!({"x": 1}))).unwrap();
        pipeline
            .dispatch(patch(json!({"x": 2})).with_source("peerA"))
            .unwrap();

        let first = rx.try_recv().unwrap().decode_action().unwrap();
        let second = rx.try_recv().unwrap().decode_action().unwrap();
        assert_eq!(first.source.as_deref(), Some("main_process"));
        assert_eq!(second.source.as_deref(), Some("peerA"));
    }

    #[test]
    fn test_source_name_override() {
        let reducer: fn(&Value, &Action) -> Value = merge_reducer;
        let config = SyncConfig {
            source_name: Some("backend".to_string()),
            ..Default::default()
        };
        let mut pipeline = DispatchPipeline::new(ReducerStore::new(reducer, json!({})), config);
        let rx = subscribe(&mut pipeline, 1, "w", json!(true));

        pipeline.dispatch(patch(json!({"x": 1}))).unwrap();

        let message = rx.try_recv().unwrap();
        assert_eq!(message.source_client_id, "backend");
        assert_eq!(
            message.decode_action().unwrap().source.as_deref(),
            Some("backend")
        );
    }

    #[test]
    fn test_empty_dispatch_skips_everything() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let reducer: fn(&Value, &Action) -> Value = merge_reducer;
        let store = ReducerStore::new(reducer, json!({}));
        let mut pipeline = DispatchPipeline::new(store, SyncConfig::default())
            .with_pre_dispatch(move |_| *counter.lock().unwrap() += 1);
        let rx = subscribe(&mut pipeline, 1, "w", json!(true));

        let report = pipeline
            .dispatch_with(None, &DispatchContext::primary())
            .unwrap();

        assert_eq!(report, BroadcastReport::default());
        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_hooks_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pre = Arc::clone(&log);
        let post = Arc::clone(&log);

        let reducer: fn(&Value, &Action) -> Value = merge_reducer;
        let store = ReducerStore::new(reducer, json!({}));
        let mut pipeline = DispatchPipeline::new(store, SyncConfig::default())
            .with_pre_dispatch(move |a| pre.lock().unwrap().push(format!("pre:{}", a.action_type)))
            .with_post_dispatch(move |a| {
                post.lock().unwrap().push(format!("post:{:?}", a.source))
            });

        pipeline.dispatch(patch(json!({"x": 1}))).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["pre:PATCH".to_string(), "post:Some(\"main_process\")".to_string()]
        );
    }

    #[test]
    fn test_relay_attributes_to_client() {
        let mut pipeline = pipeline(json!({"x": 0}));
        let rx_sender = subscribe(&mut pipeline, 1, "editor", json!(true));
        let rx_other = subscribe(&mut pipeline, 2, "preview", json!({"x": true}));

        pipeline
            .relay(HandleId(1), r#"{"type":"PATCH","patch":{"x":1},"source":"editor"}"#)
            .unwrap();

        for rx in [&rx_sender, &rx_other] {
            let message = rx.try_recv().unwrap();
            assert_eq!(message.source_client_id, "editor");
        }

        // The next primary dispatch is attributed to the primary again.
        pipeline.dispatch(patch(json!({"x": 2}))).unwrap();
        assert_eq!(rx_other.try_recv().unwrap().source_client_id, "main_process");
    }

    #[test]
    fn test_relay_from_unregistered_handle() {
        let mut pipeline = pipeline(json!({}));
        let err = pipeline.relay(HandleId(9), r#"{"type":"PATCH"}"#).unwrap_err();
        assert!(matches!(err, SyncError::Registration(HandleId(9))));
    }

    #[test]
    fn test_relay_malformed_payload() {
        let mut pipeline = pipeline(json!({"x": 0}));
        let rx = subscribe(&mut pipeline, 1, "w", json!(true));

        let err = pipeline.relay(HandleId(1), "{not json").unwrap_err();
        assert!(matches!(err, SyncError::MalformedAction { handle: HandleId(1), .. }));

        // Other traffic is unaffected.
        pipeline.dispatch(patch(json!({"x": 1}))).unwrap();
        assert!(rx.try_recv().is_ok());
        assert_eq!(pipeline.store().state(), &json!({"x": 1}));
    }

    #[test]
    fn test_dead_subscriber_pruned_rest_still_served() {
        let mut pipeline = pipeline(json!({}));
        let rx_dead = subscribe(&mut pipeline, 1, "dead", json!(true));
        let rx_2 = subscribe(&mut pipeline, 2, "b", json!(true));
        let rx_3 = subscribe(&mut pipeline, 3, "c", json!(true));
        drop(rx_dead);

        let report = pipeline.dispatch(patch(json!({"x": 1}))).unwrap();
        assert_eq!(report.pruned, 1);
        assert_eq!(report.delivered, 2);
        assert!(rx_2.try_recv().is_ok());
        assert!(rx_3.try_recv().is_ok());
        assert_eq!(pipeline.registry().handles(), vec![HandleId(2), HandleId(3)]);
    }

    #[test]
    fn test_dead_subscriber_pruned_when_shape_untouched() {
        let mut pipeline = pipeline(json!({"a": 0, "other": 0}));
        let rx_dead = subscribe(&mut pipeline, 1, "dead", json!({"other": true}));
        let rx_live = subscribe(&mut pipeline, 2, "live", json!({"a": true}));
        drop(rx_dead);

        let report = pipeline.dispatch(patch(json!({"a": 1}))).unwrap();
        assert_eq!(report.pruned, 1);
        assert_eq!(report.suppressed, 0);
        assert_eq!(report.delivered, 1);
        assert!(rx_live.try_recv().is_ok());
        assert_eq!(pipeline.registry().handles(), vec![HandleId(2)]);
    }

    #[test]
    fn test_snapshot_for() {
        let mut pipeline = pipeline(json!({"todos": [1], "secret": "x"}));
        let _rx = subscribe(&mut pipeline, 1, "w", json!({"todos": true}));

        assert_eq!(pipeline.snapshot_for(HandleId(1)).unwrap(), json!({"todos": [1]}));
        assert!(matches!(
            pipeline.snapshot_for(HandleId(2)),
            Err(SyncError::Registration(HandleId(2)))
        ));
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: SyncConfig = serde_json::from_value(json!({"source_name": "main"})).unwrap();
        assert_eq!(config.default_source(), "main");
        assert_eq!(config.channel_prefix, DEFAULT_CHANNEL_PREFIX);

        assert_eq!(SyncConfig::default().default_source(), DEFAULT_SOURCE);
    }
}
