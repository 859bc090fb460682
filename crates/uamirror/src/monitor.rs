// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Monitored item registry and subscription lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                    MonitorManager                     │
//! │   registry: [spec 0, spec 1, ...]  (one per node id)  │
//! └───────────────────────────────────────────────────────┘
//!                │ start(): one subscription, one batch
//!                ▼
//!       Session::monitor_items(..., sink = ChangeForwarder)
//!                │ on_data_change (transport task, never blocks)
//!                ▼
//! ┌───────────────────────────────────────────────────────┐
//! │ ChangeForwarder: last value ─► ChangeEvent broadcast  │
//! │                              ─► ClientEvent::ItemChanged│
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! At most one subscription is live. Items registered while it is live are
//! kept and included in the batch of the next `start()`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::{MonitoredItemSettings, SubscriptionSettings};
use crate::error::{MirrorError, MirrorResult, MonitorError};
use crate::events::{ClientEvent, EventEmitter};
use crate::session::{DataChangeNotification, NotificationSink, Session, Variant};
use crate::types::{DiscoveredItem, MonitoredItemSpec, NodeId};

// =============================================================================
// ChangeEvent
// =============================================================================

/// A value change of a monitored item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// Changed node.
    pub node_id: NodeId,

    /// New value.
    pub value: Variant,

    /// Position of the item in the monitored batch.
    pub index: usize,
}

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of monitoring counters.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    /// Registered items.
    pub registered: usize,
    /// Notifications received from the transport.
    pub notifications: u64,
    /// Change events lost by lagging subscribers.
    pub dropped: u64,
    /// Live subscription, if any.
    pub subscription_id: Option<u32>,
}

#[derive(Debug, Default)]
struct AtomicMonitorStats {
    notifications: AtomicU64,
    dropped: AtomicU64,
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Default)]
struct Registry {
    specs: Vec<MonitoredItemSpec>,
    index: HashMap<NodeId, usize>,
}

struct ActiveSubscription {
    id: u32,
    item_count: usize,
    forwarder: Arc<ChangeForwarder>,
}

// =============================================================================
// ChangeForwarder
// =============================================================================

/// Sink handed to the transport; turns notifications into change events.
///
/// A notification holds the gate's read side until both events are sent, so
/// `deactivate` returns only once no delivery is in flight.
struct ChangeForwarder {
    gate: RwLock<bool>,
    last_values: Arc<RwLock<HashMap<NodeId, Variant>>>,
    changes: broadcast::Sender<ChangeEvent>,
    stats: Arc<AtomicMonitorStats>,
    emitter: EventEmitter,
}

impl NotificationSink for ChangeForwarder {
    fn on_data_change(&self, notification: DataChangeNotification) {
        let open = self.gate.read();
        if !*open {
            return;
        }
        self.stats.notifications.fetch_add(1, Ordering::Relaxed);

        let DataChangeNotification {
            node_id,
            index,
            value,
            ..
        } = notification;
        let value = value.value;

        self.last_values.write().insert(node_id.clone(), value.clone());

        // No receivers is fine.
        let _ = self.changes.send(ChangeEvent {
            node_id: node_id.clone(),
            value: value.clone(),
            index,
        });
        self.emitter.publish(ClientEvent::ItemChanged { node_id, value });
    }
}

impl ChangeForwarder {
    fn set_active(&self, active: bool) {
        *self.gate.write() = active;
    }
}

// =============================================================================
// MonitorManager
// =============================================================================

/// Owns the monitored item set and its subscription.
pub struct MonitorManager {
    session: Arc<dyn Session>,
    subscription_settings: SubscriptionSettings,
    sampling: MonitoredItemSettings,
    registry: RwLock<Registry>,
    last_values: Arc<RwLock<HashMap<NodeId, Variant>>>,
    active: Mutex<Option<ActiveSubscription>>,
    lifecycle: tokio::sync::Mutex<()>,
    changes: broadcast::Sender<ChangeEvent>,
    stats: Arc<AtomicMonitorStats>,
    emitter: EventEmitter,
}

impl MonitorManager {
    /// Creates an empty manager.
    pub fn new(
        session: Arc<dyn Session>,
        subscription_settings: SubscriptionSettings,
        sampling: MonitoredItemSettings,
        emitter: EventEmitter,
    ) -> Self {
        let (changes, _) = broadcast::channel(emitter.bus().capacity().max(1));
        Self {
            session,
            subscription_settings,
            sampling,
            registry: RwLock::new(Registry::default()),
            last_values: Arc::new(RwLock::new(HashMap::new())),
            active: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            changes,
            stats: Arc::new(AtomicMonitorStats::default()),
            emitter,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a discovered item for monitoring.
    ///
    /// A node can be registered once; repeated calls leave the registry
    /// untouched, are reported and return `DuplicateRegistration`.
    pub fn add(&self, item: &DiscoveredItem) -> MirrorResult<()> {
        self.emitter.publish(ClientEvent::BeforeMonitorItem {
            node_id: item.node_id.clone(),
        });

        let registered = {
            let mut registry = self.registry.write();
            if registry.index.contains_key(&item.node_id) {
                false
            } else {
                let position = registry.specs.len();
                registry.index.insert(item.node_id.clone(), position);
                registry.specs.push(MonitoredItemSpec::from(item));
                true
            }
        };

        self.emitter.publish(ClientEvent::AfterMonitorItem {
            node_id: item.node_id.clone(),
            registered,
        });

        if !registered {
            let error: MirrorError = MonitorError::duplicate(item.node_id.to_string()).into();
            self.emitter.error(&error, "add monitored item");
            return Err(error);
        }

        if self.is_started() {
            self.emitter.debug(format!(
                "{} registered; monitored from the next start",
                item.node_id
            ));
        }
        Ok(())
    }

    /// Returns `true` if `node_id` is registered.
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.registry.read().index.contains_key(node_id)
    }

    /// Returns the registration of `node_id`.
    pub fn get(&self, node_id: &NodeId) -> Option<MonitoredItemSpec> {
        let registry = self.registry.read();
        registry
            .index
            .get(node_id)
            .map(|&i| registry.specs[i].clone())
    }

    /// Returns every registration in registration order.
    pub fn specs(&self) -> Vec<MonitoredItemSpec> {
        self.registry.read().specs.clone()
    }

    /// Returns the number of registered items.
    pub fn len(&self) -> usize {
        self.registry.read().specs.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registry.read().specs.is_empty()
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Returns the last known value of a registered item.
    ///
    /// That is the latest change event, or the registration snapshot when no
    /// change has been received yet.
    pub fn last_value(&self, node_id: &NodeId) -> Option<Variant> {
        if let Some(value) = self.last_values.read().get(node_id) {
            return Some(value.clone());
        }
        self.get(node_id).map(|spec| spec.value)
    }

    /// Subscribes to change events.
    pub fn subscribe(&self) -> ChangeSubscriber {
        ChangeSubscriber {
            receiver: self.changes.subscribe(),
            stats: self.stats.clone(),
        }
    }

    // =========================================================================
    // Subscription lifecycle
    // =========================================================================

    /// Returns `true` while a subscription is live.
    pub fn is_started(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Returns the live subscription handle.
    pub fn subscription_id(&self) -> Option<u32> {
        self.active.lock().as_ref().map(|s| s.id)
    }

    /// Opens one subscription covering every registered item.
    ///
    /// Returns the number of monitored items created.
    pub async fn start(&self) -> MirrorResult<usize> {
        let _lifecycle = self.lifecycle.lock().await;

        if let Some(id) = self.subscription_id() {
            return Err(MonitorError::AlreadyStarted {
                subscription_id: id,
            }
            .into());
        }

        let specs = self.specs();
        if specs.is_empty() {
            return Err(MonitorError::NothingToMonitor.into());
        }

        self.emitter.publish(ClientEvent::BeforeMonitoring {
            item_count: specs.len(),
        });

        let subscription_id = self
            .session
            .create_subscription(&self.subscription_settings)
            .await?;

        let forwarder = Arc::new(ChangeForwarder {
            gate: RwLock::new(true),
            last_values: self.last_values.clone(),
            changes: self.changes.clone(),
            stats: self.stats.clone(),
            emitter: self.emitter.clone(),
        });

        let handles = match self
            .session
            .monitor_items(
                subscription_id,
                &specs,
                &self.sampling,
                self.sampling.timestamps,
                forwarder.clone(),
            )
            .await
        {
            Ok(handles) => handles,
            Err(e) => {
                forwarder.set_active(false);
                if let Err(terminate) = self.session.terminate_subscription(subscription_id).await {
                    self.emitter.error(&terminate, "terminate failed subscription");
                }
                return Err(match e {
                    e @ MirrorError::Monitor(_) => e,
                    other => MonitorError::creation_failed(other.to_string()).into(),
                });
            }
        };

        let item_count = handles.len();
        *self.active.lock() = Some(ActiveSubscription {
            id: subscription_id,
            item_count,
            forwarder,
        });

        tracing::info!(
            subscription_id,
            monitored_items = item_count,
            publishing_interval_ms = self.subscription_settings.publishing_interval.as_millis() as u64,
            "Subscription created"
        );
        self.emitter.publish(ClientEvent::AfterMonitoring { item_count });
        Ok(item_count)
    }

    /// Terminates the live subscription.
    ///
    /// Returns `false` if nothing was running. No change event is produced
    /// after this returns `Ok` until the next `start()`. If the server refuses
    /// the termination the subscription stays live and `close` may be retried.
    pub async fn close(&self) -> MirrorResult<bool> {
        let _lifecycle = self.lifecycle.lock().await;

        let Some(active) = self.active.lock().take() else {
            return Ok(false);
        };
        active.forwarder.set_active(false);

        if let Err(e) = self.session.terminate_subscription(active.id).await {
            active.forwarder.set_active(true);
            *self.active.lock() = Some(active);
            return Err(e);
        }
        self.emitter.info(format!(
            "Subscription {} terminated ({} items)",
            active.id, active.item_count
        ));
        Ok(true)
    }

    /// Forgets a subscription the server terminated on its own.
    pub fn handle_terminated(&self, subscription_id: u32) -> bool {
        let mut active = self.active.lock();
        if active.as_ref().map(|s| s.id) != Some(subscription_id) {
            return false;
        }
        if let Some(current) = active.take() {
            current.forwarder.set_active(false);
        }
        drop(active);

        self.emitter
            .warn(format!("Subscription {} terminated by server", subscription_id));
        true
    }

    /// Returns current statistics.
    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            registered: self.len(),
            notifications: self.stats.notifications.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            subscription_id: self.subscription_id(),
        }
    }
}

impl std::fmt::Debug for MonitorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorManager")
            .field("registered", &self.len())
            .field("subscription_id", &self.subscription_id())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ChangeSubscriber
// =============================================================================

/// Receiver of change events.
pub struct ChangeSubscriber {
    receiver: broadcast::Receiver<ChangeEvent>,
    stats: Arc<AtomicMonitorStats>,
}

impl ChangeSubscriber {
    /// Receives the next change event.
    ///
    /// Returns `None` once the manager has been dropped.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    self.stats.dropped.fetch_add(count, Ordering::Relaxed);
                    tracing::warn!(count, "Change subscriber lagged, events dropped");
                }
            }
        }
    }

    /// Returns the next buffered change event, if any.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    self.stats.dropped.fetch_add(count, Ordering::Relaxed);
                }
                Err(_) => return None,
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
