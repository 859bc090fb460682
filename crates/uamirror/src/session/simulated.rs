// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory session for tests and offline demos.
//!
//! [`SimulatedSession`] serves a small address space held in memory and
//! behaves like a well-mannered server: forward and inverse references,
//! bad statuses on unsupported attributes, write type checking and data
//! change notifications echoed to every live subscription. Failures can be
//! injected per node, structure types must be declared before records of
//! them can be constructed, and [`SimulatedSession::pause_requests`] holds every
//! read and browse until [`SimulatedSession::resume_requests`] is called,
//! which makes in-progress states observable.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::{broadcast, watch};

use super::{
    Credentials, DataChangeNotification, DataValue, ExtensionObject, NodeClass,
    NotificationSink, ReferenceDescription, Session, SessionEvent, StatusCode,
    TimestampsToReturn, Variant,
};
use crate::config::{MonitoredItemSettings, SubscriptionSettings};
use crate::error::{CoercionError, ConnectionError, MirrorError, MirrorResult, MonitorError};
use crate::types::{data_type_ids, AttributeId, MonitoredItemSpec, NodeId};

// =============================================================================
// SimulatedNode
// =============================================================================

/// A node of the simulated address space.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedNode {
    /// Node identifier.
    pub node_id: NodeId,

    /// Browse name.
    pub browse_name: String,

    /// Node class.
    pub node_class: NodeClass,

    /// Declared data type (variables only).
    pub data_type: Option<NodeId>,

    /// Current value (variables only).
    pub value: Variant,

    /// Whether writes are accepted.
    pub writable: bool,

    /// Forward references, in browse order.
    pub children: Vec<NodeId>,
}

impl SimulatedNode {
    /// Creates an object (folder) node.
    pub fn object(node_id: NodeId, browse_name: impl Into<String>) -> Self {
        Self {
            node_id,
            browse_name: browse_name.into(),
            node_class: NodeClass::Object,
            data_type: None,
            value: Variant::Null,
            writable: false,
            children: Vec::new(),
        }
    }

    /// Creates a writable variable node.
    pub fn variable(
        node_id: NodeId,
        browse_name: impl Into<String>,
        data_type: NodeId,
        value: Variant,
    ) -> Self {
        Self {
            node_id,
            browse_name: browse_name.into(),
            node_class: NodeClass::Variable,
            data_type: Some(data_type),
            value,
            writable: true,
            children: Vec::new(),
        }
    }

    /// Marks the node read-only.
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
}

/// A write accepted by the simulated server.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    /// Target node.
    pub node_id: NodeId,

    /// Target attribute.
    pub attribute: AttributeId,

    /// Value written.
    pub value: Variant,
}

struct MonitoredBatch {
    subscription_id: u32,
    items: Vec<(usize, u32, NodeId)>,
    sink: Arc<dyn NotificationSink>,
}

// =============================================================================
// SimulatedSession
// =============================================================================

/// In-memory [`Session`] implementation.
pub struct SimulatedSession {
    nodes: RwLock<HashMap<NodeId, SimulatedNode>>,
    transport_open: AtomicBool,
    connected: AtomicBool,
    refuse_connections: AtomicBool,
    fail_monitor_items: AtomicBool,
    fail_terminate: AtomicBool,
    failing_reads: RwLock<HashSet<NodeId>>,
    failing_browses: RwLock<HashSet<NodeId>>,
    structures: RwLock<HashMap<NodeId, Vec<String>>>,
    subscriptions: Mutex<HashSet<u32>>,
    batches: Mutex<Vec<MonitoredBatch>>,
    writes: Mutex<Vec<WriteRecord>>,
    next_handle: AtomicU32,
    read_count: AtomicU64,
    gate: watch::Sender<bool>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SimulatedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSession {
    /// Creates a session serving an empty Objects folder (`i=85`).
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        let (events, _) = broadcast::channel(64);

        let mut nodes = HashMap::new();
        let root = SimulatedNode::object(NodeId::objects_folder(), "Objects");
        nodes.insert(root.node_id.clone(), root);

        Self {
            nodes: RwLock::new(nodes),
            transport_open: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            refuse_connections: AtomicBool::new(false),
            fail_monitor_items: AtomicBool::new(false),
            fail_terminate: AtomicBool::new(false),
            failing_reads: RwLock::new(HashSet::new()),
            failing_browses: RwLock::new(HashSet::new()),
            structures: RwLock::new(HashMap::new()),
            subscriptions: Mutex::new(HashSet::new()),
            batches: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            next_handle: AtomicU32::new(1),
            read_count: AtomicU64::new(0),
            gate,
            events,
        }
    }

    /// Adds `node` under `parent` (builder form of [`insert`](Self::insert)).
    pub fn with_node(self, parent: &NodeId, node: SimulatedNode) -> Self {
        self.insert(parent, node);
        self
    }

    /// Declares a structure type and its field names.
    pub fn with_structure<I, S>(self, type_id: NodeId, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.structures
            .write()
            .insert(type_id, fields.into_iter().map(Into::into).collect());
        self
    }

    /// Adds `node` as the last forward reference of `parent`.
    ///
    /// An unknown parent leaves the node unreachable by browsing.
    pub fn insert(&self, parent: &NodeId, node: SimulatedNode) {
        let mut nodes = self.nodes.write();
        if let Some(parent) = nodes.get_mut(parent) {
            if !parent.children.contains(&node.node_id) {
                parent.children.push(node.node_id.clone());
            }
        }
        nodes.insert(node.node_id.clone(), node);
    }

    /// Adds a forward reference between two existing nodes.
    ///
    /// Address spaces are not trees; this is how cycles and shared
    /// children are modelled.
    pub fn link(&self, parent: &NodeId, child: &NodeId) {
        let mut nodes = self.nodes.write();
        if !nodes.contains_key(child) {
            return;
        }
        if let Some(parent) = nodes.get_mut(parent) {
            if !parent.children.contains(child) {
                parent.children.push(child.clone());
            }
        }
    }

    /// Returns the current value of a node.
    pub fn value(&self, node_id: &NodeId) -> Option<Variant> {
        self.nodes.read().get(node_id).map(|n| n.value.clone())
    }

    /// Changes a value server-side and notifies every subscription
    /// monitoring it. Returns the number of notifications delivered.
    pub fn notify(&self, node_id: &NodeId, value: Variant) -> usize {
        if let Some(node) = self.nodes.write().get_mut(node_id) {
            node.value = value.clone();
        }
        self.deliver(node_id, &value)
    }

    /// Sends a transport health event.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Returns the writes accepted so far.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().clone()
    }

    /// Returns the number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Returns the number of monitored items across live subscriptions.
    pub fn monitored_item_count(&self) -> usize {
        self.batches.lock().iter().map(|b| b.items.len()).sum()
    }

    /// Returns the number of attribute reads served.
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Makes connection attempts fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Makes every read of `node_id` fail.
    pub fn fail_reads_for(&self, node_id: NodeId) {
        self.failing_reads.write().insert(node_id);
    }

    /// Makes every browse of `node_id` fail.
    pub fn fail_browses_for(&self, node_id: NodeId) {
        self.failing_browses.write().insert(node_id);
    }

    /// Makes monitored item creation fail.
    pub fn fail_monitor_items(&self, fail: bool) {
        self.fail_monitor_items.store(fail, Ordering::SeqCst);
    }

    /// Makes subscription termination fail.
    pub fn fail_terminate(&self, fail: bool) {
        self.fail_terminate.store(fail, Ordering::SeqCst);
    }

    /// Holds reads and browses until [`resume_requests`](Self::resume_requests).
    pub fn pause_requests(&self) {
        self.gate.send_replace(false);
    }

    /// Releases held requests.
    pub fn resume_requests(&self) {
        self.gate.send_replace(true);
    }

    async fn pass_gate(&self) {
        let mut rx = self.gate.subscribe();
        // The sender lives as long as `self`, so this only returns once open.
        let _ = rx.wait_for(|open| *open).await;
    }

    fn ensure_connected(&self) -> MirrorResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MirrorError::not_connected())
        }
    }

    fn deliver(&self, node_id: &NodeId, value: &Variant) -> usize {
        let targets: Vec<_> = self
            .batches
            .lock()
            .iter()
            .flat_map(|batch| {
                batch
                    .items
                    .iter()
                    .filter(|(_, _, id)| id == node_id)
                    .map(|(index, handle, _)| {
                        (batch.subscription_id, *index, *handle, batch.sink.clone())
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        for (subscription_id, index, monitored_item_id, sink) in &targets {
            sink.on_data_change(DataChangeNotification {
                subscription_id: *subscription_id,
                monitored_item_id: *monitored_item_id,
                index: *index,
                node_id: node_id.clone(),
                value: DataValue::good(value.clone()),
            });
        }
        targets.len()
    }

    fn inverse_references(
        &self,
        nodes: &HashMap<NodeId, SimulatedNode>,
        target: &NodeId,
    ) -> Vec<ReferenceDescription> {
        nodes
            .values()
            .filter(|n| n.children.contains(target))
            .map(|parent| describe(parent, false))
            .collect()
    }
}

fn describe(node: &SimulatedNode, is_forward: bool) -> ReferenceDescription {
    ReferenceDescription {
        node_id: node.node_id.clone(),
        browse_name: node.browse_name.clone(),
        display_name: node.browse_name.clone(),
        node_class: node.node_class,
        is_forward,
    }
}

#[async_trait]
impl Session for SimulatedSession {
    async fn connect(&self, endpoint: &str) -> MirrorResult<()> {
        if !endpoint.starts_with("opc.tcp://") {
            return Err(ConnectionError::invalid_endpoint(endpoint, "expected opc.tcp scheme").into());
        }
        if self.refuse_connections.load(Ordering::SeqCst) {
            return Err(ConnectionError::refused(endpoint).into());
        }
        self.transport_open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn create_session(&self, credentials: &Credentials) -> MirrorResult<()> {
        if !self.transport_open.load(Ordering::SeqCst) {
            return Err(MirrorError::not_connected());
        }
        if let Credentials::UserName { password, .. } = credentials {
            if password.is_empty() {
                return Err(ConnectionError::session_failed("BadIdentityTokenRejected").into());
            }
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn read(&self, node_id: &NodeId, attribute: AttributeId) -> MirrorResult<DataValue> {
        self.pass_gate().await;
        self.ensure_connected()?;
        if self.failing_reads.read().contains(node_id) {
            return Err(MirrorError::read_failed(node_id.to_string(), "BadCommunicationError"));
        }
        self.read_count.fetch_add(1, Ordering::Relaxed);

        let nodes = self.nodes.read();
        let Some(node) = nodes.get(node_id) else {
            return Ok(DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN));
        };

        let value = match (attribute, node.node_class) {
            (AttributeId::NodeClass, class) => DataValue::good(Variant::Int32(class.value())),
            (AttributeId::BrowseName, _) => DataValue::good(Variant::String(node.browse_name.clone())),
            (AttributeId::Value, NodeClass::Variable) => DataValue::good(node.value.clone()),
            (AttributeId::DataType, NodeClass::Variable) => match &node.data_type {
                Some(data_type) => DataValue::good(Variant::NodeId(data_type.clone())),
                None => DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
            },
            _ => DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
        };
        Ok(value)
    }

    async fn write(
        &self,
        node_id: &NodeId,
        attribute: AttributeId,
        value: Variant,
    ) -> MirrorResult<StatusCode> {
        self.ensure_connected()?;

        {
            let mut nodes = self.nodes.write();
            let Some(node) = nodes.get_mut(node_id) else {
                return Ok(StatusCode::BAD_NODE_ID_UNKNOWN);
            };
            if attribute != AttributeId::Value || node.node_class != NodeClass::Variable {
                return Ok(StatusCode::BAD_ATTRIBUTE_ID_INVALID);
            }
            if !node.writable {
                return Ok(StatusCode::BAD_NOT_WRITABLE);
            }
            let declared = node.data_type.as_ref().and_then(NodeId::as_builtin_code);
            if let Some(code) = declared.filter(|c| *c <= data_type_ids::DOUBLE) {
                if value.type_code() != code {
                    return Ok(StatusCode::BAD_TYPE_MISMATCH);
                }
            }
            node.value = value.clone();
        }

        self.writes.lock().push(WriteRecord {
            node_id: node_id.clone(),
            attribute,
            value: value.clone(),
        });
        self.deliver(node_id, &value);
        Ok(StatusCode::GOOD)
    }

    async fn browse(&self, node_id: &NodeId) -> MirrorResult<Vec<ReferenceDescription>> {
        self.pass_gate().await;
        self.ensure_connected()?;
        if self.failing_browses.read().contains(node_id) {
            return Err(MirrorError::browse_failed(node_id.to_string(), "BadCommunicationError"));
        }

        let nodes = self.nodes.read();
        let Some(node) = nodes.get(node_id) else {
            return Err(MirrorError::browse_failed(node_id.to_string(), "BadNodeIdUnknown"));
        };

        let mut references = self.inverse_references(&nodes, node_id);
        references.extend(
            node.children
                .iter()
                .filter_map(|child| nodes.get(child))
                .map(|child| describe(child, true)),
        );
        Ok(references)
    }

    async fn create_subscription(&self, _settings: &SubscriptionSettings) -> MirrorResult<u32> {
        self.ensure_connected()?;
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.lock().insert(id);
        Ok(id)
    }

    async fn monitor_items(
        &self,
        subscription_id: u32,
        items: &[MonitoredItemSpec],
        _sampling: &MonitoredItemSettings,
        _timestamps: TimestampsToReturn,
        sink: Arc<dyn NotificationSink>,
    ) -> MirrorResult<Vec<u32>> {
        self.ensure_connected()?;
        if self.fail_monitor_items.load(Ordering::SeqCst) {
            return Err(MonitorError::creation_failed("BadTooManyMonitoredItems").into());
        }
        if !self.subscriptions.lock().contains(&subscription_id) {
            return Err(MonitorError::creation_failed("BadSubscriptionIdInvalid").into());
        }

        let entries: Vec<_> = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
                (index, handle, item.node_id.clone())
            })
            .collect();
        let handles = entries.iter().map(|(_, handle, _)| *handle).collect();

        self.batches.lock().push(MonitoredBatch {
            subscription_id,
            items: entries,
            sink,
        });
        Ok(handles)
    }

    async fn terminate_subscription(&self, subscription_id: u32) -> MirrorResult<()> {
        if self.fail_terminate.load(Ordering::SeqCst) {
            return Err(ConnectionError::session_failed("BadTimeout").into());
        }
        self.subscriptions.lock().remove(&subscription_id);
        self.batches
            .lock()
            .retain(|batch| batch.subscription_id != subscription_id);
        Ok(())
    }

    async fn close_session(&self) -> MirrorResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.subscriptions.lock().clear();
        self.batches.lock().clear();
        Ok(())
    }

    async fn disconnect(&self) -> MirrorResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.transport_open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn construct_typed_record(
        &self,
        type_id: &NodeId,
        fields: Map<String, JsonValue>,
    ) -> MirrorResult<Variant> {
        self.ensure_connected()?;

        let structures = self.structures.read();
        let Some(definition) = structures.get(type_id) else {
            return Err(CoercionError::record_construction(
                type_id.to_string(),
                "BadDataTypeIdUnknown",
            )
            .into());
        };
        if let Some(unknown) = fields.keys().find(|name| !definition.contains(name)) {
            return Err(CoercionError::record_construction(
                type_id.to_string(),
                format!("unknown field '{}'", unknown),
            )
            .into());
        }

        // Encode in declaration order.
        let mut ordered = Map::new();
        for name in definition {
            if let Some(value) = fields.get(name) {
                ordered.insert(name.clone(), value.clone());
            }
        }
        Ok(Variant::ExtensionObject(ExtensionObject::new(type_id.clone(), ordered)))
    }

    fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Collect(Mutex<Vec<DataChangeNotification>>);

    impl NotificationSink for Collect {
        fn on_data_change(&self, notification: DataChangeNotification) {
            self.0.lock().push(notification);
        }
    }

    fn plant() -> SimulatedSession {
        let line = NodeId::string(2, "Line1");
        SimulatedSession::new()
            .with_node(&NodeId::objects_folder(), SimulatedNode::object(line.clone(), "Line1"))
            .with_node(
                &line,
                SimulatedNode::variable(
                    NodeId::string(2, "Line1.Running"),
                    "Running",
                    NodeId::numeric(0, data_type_ids::BOOLEAN),
                    Variant::Boolean(false),
                ),
            )
    }

    async fn connected(session: &SimulatedSession) {
        session.connect("opc.tcp://sim:4840").await.unwrap();
        session.create_session(&Credentials::Anonymous).await.unwrap();
    }

    #[tokio::test]
    async fn test_requires_session() {
        let session = plant();
        assert!(session.read(&NodeId::objects_folder(), AttributeId::Value).await.is_err());
        assert!(session.create_session(&Credentials::Anonymous).await.is_err());

        connected(&session).await;
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failures() {
        let session = plant();
        assert!(session.connect("http://sim").await.is_err());

        session.refuse_connections(true);
        let err = session.connect("opc.tcp://sim:4840").await.unwrap_err();
        assert!(matches!(err, MirrorError::Connection(ConnectionError::Refused { .. })));
    }

    #[tokio::test]
    async fn test_read_attributes() {
        let session = plant();
        connected(&session).await;

        let folder = session.read(&NodeId::string(2, "Line1"), AttributeId::Value).await.unwrap();
        assert_eq!(folder.status, StatusCode::BAD_ATTRIBUTE_ID_INVALID);

        let running = NodeId::string(2, "Line1.Running");
        let value = session.read(&running, AttributeId::Value).await.unwrap();
        assert_eq!(value.value, Variant::Boolean(false));

        let data_type = session.read(&running, AttributeId::DataType).await.unwrap();
        assert_eq!(data_type.value, Variant::NodeId(NodeId::numeric(0, 1)));

        let unknown = session.read(&NodeId::numeric(2, 999), AttributeId::Value).await.unwrap();
        assert_eq!(unknown.status, StatusCode::BAD_NODE_ID_UNKNOWN);
    }

    #[tokio::test]
    async fn test_browse_references() {
        let session = plant();
        connected(&session).await;

        let refs = session.browse(&NodeId::string(2, "Line1")).await.unwrap();
        assert_eq!(refs.len(), 2);
        assert!(!refs[0].is_forward);
        assert_eq!(refs[0].node_id, NodeId::objects_folder());
        assert!(refs[1].is_forward);
        assert_eq!(refs[1].browse_name, "Running");
    }

    #[tokio::test]
    async fn test_write_type_check() {
        let session = plant();
        connected(&session).await;
        let running = NodeId::string(2, "Line1.Running");

        let status = session.write(&running, AttributeId::Value, Variant::Int32(1)).await.unwrap();
        assert_eq!(status, StatusCode::BAD_TYPE_MISMATCH);

        let status = session
            .write(&running, AttributeId::Value, Variant::Boolean(true))
            .await
            .unwrap();
        assert!(status.is_good());
        assert_eq!(session.value(&running), Some(Variant::Boolean(true)));
        assert_eq!(session.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_notifications_follow_subscription() {
        let session = plant();
        connected(&session).await;
        let running = NodeId::string(2, "Line1.Running");

        let sub = session.create_subscription(&SubscriptionSettings::default()).await.unwrap();
        let sink = Arc::new(Collect(Mutex::new(Vec::new())));
        let spec = MonitoredItemSpec::from(&crate::types::DiscoveredItem::new(
            running.clone(),
            "Running",
            NodeId::numeric(0, 1),
            Variant::Boolean(false),
        ));
        session
            .monitor_items(
                sub,
                &[spec],
                &MonitoredItemSettings::default(),
                TimestampsToReturn::Both,
                sink.clone(),
            )
            .await
            .unwrap();
        assert_eq!(session.monitored_item_count(), 1);

        assert_eq!(session.notify(&running, Variant::Boolean(true)), 1);
        assert_eq!(sink.0.lock()[0].index, 0);

        session.terminate_subscription(sub).await.unwrap();
        assert_eq!(session.subscription_count(), 0);
        assert_eq!(session.notify(&running, Variant::Boolean(false)), 0);
    }

    #[tokio::test]
    async fn test_construct_typed_record() {
        let recipe = NodeId::numeric(3, 3001);
        let session = plant().with_structure(recipe.clone(), ["speed", "temperature"]);
        connected(&session).await;

        let mut fields = Map::new();
        fields.insert("temperature".into(), JsonValue::from(80));
        fields.insert("speed".into(), JsonValue::from(12));
        let record = session.construct_typed_record(&recipe, fields).await.unwrap();
        let record = record.as_record().unwrap();
        assert_eq!(record.fields.keys().collect::<Vec<_>>(), ["speed", "temperature"]);

        let mut bad = Map::new();
        bad.insert("pressure".into(), JsonValue::from(1));
        assert!(session.construct_typed_record(&recipe, bad).await.is_err());
        assert!(session
            .construct_typed_record(&NodeId::numeric(3, 9999), Map::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_pause_holds_reads() {
        let session = Arc::new(plant());
        connected(&session).await;
        session.pause_requests();

        let reader = {
            let session = session.clone();
            tokio::spawn(async move {
                session.read(&NodeId::objects_folder(), AttributeId::BrowseName).await
            })
        };
        tokio::task::yield_now().await;
        assert!(!reader.is_finished());

        session.resume_requests();
        let value = reader.await.unwrap().unwrap();
        assert_eq!(value.value, Variant::String("Objects".into()));
    }
}
