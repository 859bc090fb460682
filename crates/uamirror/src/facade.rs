// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client entry point.
//!
//! [`ClientFacade`] wires the components around one session:
//!
//! ```text
//!                       ┌──────────────┐
//!   connect/close ────► │ ClientFacade │ ───► EventBus ───► consumers
//!   read/write/browse   └──────┬───────┘
//!              ┌───────────────┼────────────────┬──────────────┐
//!              ▼               ▼                ▼              ▼
//!        BrowseEngine   MonitorManager    TypeCoercer   AddressSpaceCache
//!              └───────────────┴──────┬─────────┘
//!                                     ▼
//!                                 Session
//! ```
//!
//! Lifecycle calls are safe in any state. Writes go only to monitored
//! items; `write` and `switch_bool_value` report failures on the event bus
//! and return `false` instead of raising, so one bad node cannot take the
//! caller down. [`ClientFacade::try_write`] is the raising variant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::browse::{BrowseEngine, BrowseReport};
use crate::cache::AddressSpaceCache;
use crate::coercion::TypeCoercer;
use crate::config::MirrorConfig;
use crate::error::{ConnectionError, MirrorError, MirrorResult, WriteError};
use crate::events::{ClientEvent, EventBus, EventEmitter, EventSubscriber};
use crate::monitor::{ChangeSubscriber, MonitorManager};
use crate::session::{DataValue, Session, SessionEvent, StatusCode};
use crate::types::{AttributeId, DiscoveredItem, NodeId};

/// Supervisory client over one session.
pub struct ClientFacade {
    config: MirrorConfig,
    session: Arc<dyn Session>,
    bus: Arc<EventBus>,
    emitter: EventEmitter,
    cache: Arc<AddressSpaceCache>,
    monitor: Arc<MonitorManager>,
    engine: BrowseEngine,
    coercer: TypeCoercer,
    transport_open: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ClientFacade {
    /// Creates a client for `config` over `session`.
    ///
    /// Prepares the cache directory and removes any previous cache file.
    pub fn new(config: MirrorConfig, session: Arc<dyn Session>) -> MirrorResult<Self> {
        config.validate()?;

        let bus = Arc::new(EventBus::new(config.events.capacity));
        let emitter = EventEmitter::new("client", bus.clone());
        let cache = Arc::new(AddressSpaceCache::new(
            &config.cache,
            emitter.for_component("cache"),
        )?);
        let monitor = Arc::new(MonitorManager::new(
            session.clone(),
            config.subscription.clone(),
            config.monitoring.clone(),
            emitter.for_component("monitor"),
        ));
        let engine = BrowseEngine::new(
            session.clone(),
            cache.clone(),
            monitor.clone(),
            emitter.for_component("browse"),
        );

        Ok(Self {
            config,
            session,
            bus,
            emitter,
            cache,
            monitor,
            engine,
            coercer: TypeCoercer::new(),
            transport_open: AtomicBool::new(false),
            pump: Mutex::new(None),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the configuration.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Returns the address-space cache.
    pub fn cache(&self) -> &Arc<AddressSpaceCache> {
        &self.cache
    }

    /// Returns the monitor manager.
    pub fn monitor(&self) -> &Arc<MonitorManager> {
        &self.monitor
    }

    /// Returns the browse engine.
    pub fn engine(&self) -> &BrowseEngine {
        &self.engine
    }

    /// Returns `true` while a session is open.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Subscribes to client events.
    pub fn subscribe_events(&self) -> EventSubscriber {
        self.bus.subscribe()
    }

    /// Subscribes to change events of monitored items.
    pub fn subscribe_changes(&self) -> ChangeSubscriber {
        self.monitor.subscribe()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects to the configured endpoint and opens a session.
    pub async fn connect(&self) -> MirrorResult<()> {
        if self.session.is_connected() {
            return Ok(());
        }
        let endpoint = self.config.endpoint.as_str();

        if let Err(e) = self.session.connect(endpoint).await {
            self.emitter.error(&e, "connect");
            return Err(e);
        }
        self.transport_open.store(true, Ordering::SeqCst);

        if let Err(e) = self.session.create_session(&self.config.credentials).await {
            self.emitter.error(&e, "create session");
            return Err(e);
        }

        self.start_event_pump();
        self.emitter.info(format!("Connected to {}", endpoint));
        self.emitter.publish(ClientEvent::Connected {
            endpoint: endpoint.to_string(),
        });
        Ok(())
    }

    /// Terminates the subscription and closes the session.
    ///
    /// Safe to call when nothing is open. Every step is attempted; the first
    /// failure is returned after all of them ran.
    pub async fn close(&self) -> MirrorResult<()> {
        let mut first_error = None;

        match self.monitor.close().await {
            Ok(true) => self.emitter.publish(ClientEvent::SessionTerminated),
            Ok(false) => {}
            Err(e) => {
                self.emitter.error(&e, "terminate subscription");
                first_error.get_or_insert(e);
            }
        }

        if self.session.is_connected() {
            match self.session.close_session().await {
                Ok(()) => self.emitter.publish(ClientEvent::SessionClosed),
                Err(e) => {
                    self.emitter.error(&e, "close session");
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Closes everything and drops the transport connection.
    ///
    /// Safe to call when nothing is open.
    pub async fn disconnect(&self) -> MirrorResult<()> {
        let closed = self.close().await;

        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        if !self.transport_open.swap(false, Ordering::SeqCst) {
            return closed;
        }

        if let Err(e) = self.session.disconnect().await {
            self.emitter.error(&e, "disconnect");
            return Err(e);
        }
        self.emitter.info("Disconnected");
        self.emitter.publish(ClientEvent::Disconnected);
        closed
    }

    fn start_event_pump(&self) {
        let mut pump = self.pump.lock();
        if pump.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let mut events = self.session.session_events();
        let monitor = self.monitor.clone();
        let emitter = self.emitter.for_component("session");
        let endpoint = self.config.endpoint.clone();

        *pump = Some(tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        tracing::warn!(count, "Session event receiver lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                match event {
                    SessionEvent::KeepAlive => tracing::trace!("Keep-alive"),
                    SessionEvent::ConnectionLost { reason } => {
                        emitter.warn(format!("Connection lost: {}", reason));
                    }
                    SessionEvent::ConnectionRestored => {
                        emitter.info("Connection restored");
                        emitter.publish(ClientEvent::Connected {
                            endpoint: endpoint.clone(),
                        });
                    }
                    SessionEvent::SessionClosed => {
                        emitter.warn("Session closed by server");
                        emitter.publish(ClientEvent::SessionClosed);
                    }
                    SessionEvent::SubscriptionTerminated { subscription_id } => {
                        if monitor.handle_terminated(subscription_id) {
                            emitter.publish(ClientEvent::SessionTerminated);
                        }
                    }
                }
            }
        }));
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Reads the current value of a node.
    pub async fn read(&self, node_id: &NodeId) -> MirrorResult<DataValue> {
        self.ensure_connected()?;
        self.session.read(node_id, AttributeId::Value).await
    }

    /// Browses `root`, registering new variables for monitoring if asked.
    pub async fn browse(&self, root: &NodeId, monitor: bool) -> MirrorResult<BrowseReport> {
        self.ensure_connected()?;
        self.engine.browse(root, monitor).await
    }

    /// Browses every configured root.
    pub async fn browse_configured(&self) -> Vec<(NodeId, MirrorResult<BrowseReport>)> {
        if !self.session.is_connected() {
            return self
                .config
                .browse
                .roots
                .iter()
                .map(|root| (root.clone(), Err(self.connection_error())))
                .collect();
        }
        self.engine
            .browse_all(&self.config.browse.roots, self.config.browse.monitor_new_items)
            .await
    }

    /// Opens the subscription over every registered item.
    pub async fn start_monitoring(&self) -> MirrorResult<usize> {
        self.ensure_connected()?;
        self.monitor.start().await.map_err(|e| {
            self.emitter.error(&e, "start monitoring");
            e
        })
    }

    /// Searches cached items by browse name, ignoring case.
    pub fn search(&self, pattern: &str) -> Vec<DiscoveredItem> {
        self.cache.search_by_name_contains(pattern)
    }

    /// Reloads the cache from its file.
    pub fn load_cache(&self) -> MirrorResult<usize> {
        self.cache.load_from_file()
    }

    /// Writes `proposed` to a monitored item.
    ///
    /// Returns `false` and reports the failure when the item is not
    /// monitored, the value cannot be coerced or the server rejects it.
    pub async fn write(&self, node_id: &NodeId, proposed: JsonValue) -> bool {
        match self.try_write(node_id, proposed).await {
            Ok(_) => true,
            Err(e) => {
                self.emitter.error(&e, &format!("write {}", node_id));
                false
            }
        }
    }

    /// Writes `proposed` to a monitored item, returning failures.
    pub async fn try_write(&self, node_id: &NodeId, proposed: JsonValue) -> MirrorResult<StatusCode> {
        self.ensure_connected()?;

        let spec = self
            .monitor
            .get(node_id)
            .ok_or_else(|| WriteError::not_monitored(node_id.to_string()))?;
        let last_known = self
            .monitor
            .last_value(node_id)
            .unwrap_or_else(|| spec.value.clone());

        let coerced = self
            .coercer
            .coerce(node_id, &spec.data_type, &proposed, &last_known)?;
        let wire_type = coerced.wire_type;
        let value = coerced.into_variant(self.session.as_ref()).await?;

        self.emitter.publish(ClientEvent::BeforeWrite {
            node_id: node_id.clone(),
            value: value.clone(),
        });
        let status = self
            .session
            .write(node_id, AttributeId::Value, value)
            .await?;
        self.emitter.publish(ClientEvent::AfterWrite {
            node_id: node_id.clone(),
            status,
        });

        if status.is_bad() {
            return Err(WriteError::rejected(node_id.to_string(), status.0).into());
        }
        tracing::debug!(node_id = %node_id, wire_type = %wire_type, status = %status, "Write accepted");
        Ok(status)
    }

    /// Writes the negation of a monitored boolean's last known value.
    ///
    /// Does nothing and returns `false` if the item is not monitored (which
    /// is reported) or does not currently hold a boolean.
    pub async fn switch_bool_value(&self, node_id: &NodeId) -> bool {
        let Some(current) = self.monitor.last_value(node_id) else {
            let error: MirrorError = WriteError::not_monitored(node_id.to_string()).into();
            self.emitter.error(&error, "switch value");
            return false;
        };

        match current.as_bool() {
            Some(value) => self.write(node_id, JsonValue::Bool(!value)).await,
            None => {
                self.emitter
                    .debug(format!("{} does not hold a boolean, not switched", node_id));
                false
            }
        }
    }

    fn ensure_connected(&self) -> MirrorResult<()> {
        if self.session.is_connected() {
            Ok(())
        } else {
            Err(self.connection_error())
        }
    }

    /// Distinguishes a transport left without a session from no transport.
    fn connection_error(&self) -> MirrorError {
        if self.transport_open.load(Ordering::SeqCst) {
            ConnectionError::closed(Some("no open session".into())).into()
        } else {
            MirrorError::not_connected()
        }
    }
}

impl Drop for ClientFacade {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for ClientFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientFacade")
            .field("endpoint", &self.config.endpoint)
            .field("connected", &self.is_connected())
            .field("cache", &self.cache)
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SimulatedNode, SimulatedSession, Variant};
    use crate::types::data_type_ids;

    fn pump() -> NodeId {
        NodeId::string(2, "Pump.On")
    }

    fn setpoint() -> NodeId {
        NodeId::string(2, "Pump.Setpoint")
    }

    fn server() -> Arc<SimulatedSession> {
        Arc::new(
            SimulatedSession::new()
                .with_node(
                    &NodeId::objects_folder(),
                    SimulatedNode::variable(
                        pump(),
                        "On",
                        NodeId::numeric(0, data_type_ids::BOOLEAN),
                        Variant::Boolean(true),
                    ),
                )
                .with_node(
                    &NodeId::objects_folder(),
                    SimulatedNode::variable(
                        setpoint(),
                        "Setpoint",
                        NodeId::numeric(0, data_type_ids::FLOAT),
                        Variant::Float(1.5),
                    ),
                ),
        )
    }

    fn client(session: Arc<SimulatedSession>, dir: &tempfile::TempDir) -> ClientFacade {
        let config = MirrorConfig::builder()
            .endpoint("opc.tcp://sim:4840")
            .cache_directory(dir.path())
            .build()
            .unwrap();
        ClientFacade::new(config, session).unwrap()
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(server(), &dir);

        let err = client.read(&pump()).await.unwrap_err();
        assert!(matches!(err, MirrorError::Connection(ConnectionError::NotConnected)));
        assert!(client.browse(&NodeId::objects_folder(), true).await.is_err());
        assert!(!client.write(&pump(), JsonValue::Bool(false)).await);
    }

    #[tokio::test]
    async fn test_closed_session_is_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(server(), &dir);
        client.connect().await.unwrap();

        // Session closed, transport still open.
        client.close().await.unwrap();
        let err = client.read(&pump()).await.unwrap_err();
        assert!(matches!(err, MirrorError::Connection(ConnectionError::Closed { .. })));
        assert!(err.is_retryable());

        client.disconnect().await.unwrap();
        let err = client.read(&pump()).await.unwrap_err();
        assert!(matches!(err, MirrorError::Connection(ConnectionError::NotConnected)));
    }

    #[tokio::test]
    async fn test_lifecycle_is_safe_in_any_state() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(server(), &dir);

        client.close().await.unwrap();
        client.disconnect().await.unwrap();

        client.connect().await.unwrap();
        assert!(client.is_connected());
        client.disconnect().await.unwrap();
        client.disconnect().await.unwrap();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_refused_connection_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let session = server();
        session.refuse_connections(true);
        let client = client(session, &dir);
        let mut events = client.subscribe_events();

        assert!(client.connect().await.is_err());
        assert!(events
            .drain()
            .iter()
            .any(|e| matches!(e, ClientEvent::Error { component: "client", .. })));
    }

    #[tokio::test]
    async fn test_close_terminates_then_closes() {
        let dir = tempfile::tempdir().unwrap();
        let session = server();
        let client = client(session.clone(), &dir);
        client.connect().await.unwrap();
        client.browse(&NodeId::objects_folder(), true).await.unwrap();
        client.start_monitoring().await.unwrap();
        let mut events = client.subscribe_events();

        client.disconnect().await.unwrap();

        let names: Vec<_> = events
            .drain()
            .into_iter()
            .filter(|e| !e.is_log())
            .map(|e| e.name())
            .collect();
        assert_eq!(names, ["session_terminated", "session_closed", "disconnected"]);
        assert_eq!(session.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_write_coerces_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let session = server();
        let client = client(session.clone(), &dir);
        client.connect().await.unwrap();
        client.browse(&NodeId::objects_folder(), true).await.unwrap();

        let status = client
            .try_write(&setpoint(), JsonValue::String("2.25".into()))
            .await
            .unwrap();
        assert!(status.is_good());
        assert_eq!(session.value(&setpoint()), Some(Variant::Float(2.25)));

        let mut events = client.subscribe_events();
        assert!(!client.write(&setpoint(), JsonValue::String("fast".into())).await);
        assert_eq!(session.writes().len(), 1);
        assert!(events
            .drain()
            .iter()
            .any(|e| matches!(e, ClientEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_write_to_unmonitored_item_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session = server();
        let client = client(session.clone(), &dir);
        client.connect().await.unwrap();
        client.browse(&NodeId::objects_folder(), false).await.unwrap();

        let err = client
            .try_write(&pump(), JsonValue::Bool(false))
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::Write(WriteError::NotMonitored { .. })));
        assert!(session.writes().is_empty());
    }

    #[tokio::test]
    async fn test_switch_bool_value() {
        let dir = tempfile::tempdir().unwrap();
        let session = server();
        let client = client(session.clone(), &dir);
        client.connect().await.unwrap();
        client.browse(&NodeId::objects_folder(), true).await.unwrap();

        assert!(client.switch_bool_value(&pump()).await);
        assert_eq!(session.value(&pump()), Some(Variant::Boolean(false)));

        // Not a boolean: nothing is written.
        assert!(!client.switch_bool_value(&setpoint()).await);
        assert!(!client.switch_bool_value(&NodeId::string(2, "Missing")).await);
        assert_eq!(session.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_server_termination_is_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let session = server();
        let client = client(session.clone(), &dir);
        client.connect().await.unwrap();
        client.browse(&NodeId::objects_folder(), true).await.unwrap();
        client.start_monitoring().await.unwrap();
        let subscription_id = client.monitor().subscription_id().unwrap();
        let mut events = client.subscribe_events();

        session.emit(SessionEvent::SubscriptionTerminated { subscription_id });

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            loop {
                match events.recv().await {
                    Some(ClientEvent::SessionTerminated) => break true,
                    Some(_) => continue,
                    None => break false,
                }
            }
        })
        .await
        .unwrap();
        assert!(event);
        assert!(!client.monitor().is_started());
    }
}
