// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Event surface and observability port.
//!
//! - **ClientEvent**: closed set of lifecycle and domain events
//! - **EventBus**: broadcast channel distributing events to any number of
//!   in-process consumers (1:N)
//! - **EventEmitter**: the per-component port. Each component owns one,
//!   tagged with its name; it writes `tracing` records and mirrors them onto
//!   the bus so consumers see logs and errors next to domain events.
//!
//! # Architecture
//!
//! ```text
//!  BrowseEngine   MonitorManager   ClientFacade   AddressSpaceCache
//!       │               │               │                │
//!   EventEmitter    EventEmitter    EventEmitter     EventEmitter
//!       └───────────────┴───────┬───────┴────────────────┘
//!                               ▼
//!                     EventBus (broadcast)
//!                       │       │       │
//!                       ▼       ▼       ▼
//!                   consumers (EventSubscriber)
//! ```
//!
//! Publishing never blocks. A subscriber that falls more than `capacity`
//! events behind loses the oldest ones; the loss is counted and logged.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::MirrorError;
use crate::session::{StatusCode, Variant};
use crate::types::NodeId;

// =============================================================================
// ClientEvent
// =============================================================================

/// Severity of a [`ClientEvent::Log`] event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug.
    Debug,
    /// Info.
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Events published by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A component log record.
    Log {
        /// Severity.
        level: LogLevel,
        /// Emitting component.
        component: &'static str,
        /// Message.
        message: String,
    },

    /// A reported failure.
    Error {
        /// Emitting component.
        component: &'static str,
        /// Error code (`MR-XXYY`).
        code: String,
        /// Message.
        message: String,
    },

    /// Session established.
    Connected {
        /// Server endpoint.
        endpoint: String,
    },

    /// Transport connection closed.
    Disconnected,

    /// Session closed.
    SessionClosed,

    /// Subscription terminated.
    SessionTerminated,

    /// A write is about to be sent.
    BeforeWrite {
        /// Target node.
        node_id: NodeId,
        /// Coerced value.
        value: Variant,
    },

    /// A write was answered.
    AfterWrite {
        /// Target node.
        node_id: NodeId,
        /// Status returned by the server.
        status: StatusCode,
    },

    /// An item is about to be registered for monitoring.
    BeforeMonitorItem {
        /// Node being registered.
        node_id: NodeId,
    },

    /// An item registration finished.
    AfterMonitorItem {
        /// Node being registered.
        node_id: NodeId,
        /// `false` when the node was already registered.
        registered: bool,
    },

    /// A subscription is about to be created.
    BeforeMonitoring {
        /// Number of registered items.
        item_count: usize,
    },

    /// The subscription is live.
    AfterMonitoring {
        /// Number of monitored items created.
        item_count: usize,
    },

    /// A browse is starting.
    BeforeBrowsing {
        /// Browse root.
        root: NodeId,
    },

    /// A browse completed.
    AfterBrowsing {
        /// Browse root.
        root: NodeId,
        /// Variables visited.
        discovered: usize,
        /// Variables not previously cached.
        new_items: usize,
    },

    /// A monitored value changed.
    ItemChanged {
        /// Changed node.
        node_id: NodeId,
        /// New value.
        value: Variant,
    },
}

impl ClientEvent {
    /// Returns the event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Log { .. } => "log",
            Self::Error { .. } => "error",
            Self::Connected { .. } => "connected",
            Self::Disconnected => "disconnected",
            Self::SessionClosed => "session_closed",
            Self::SessionTerminated => "session_terminated",
            Self::BeforeWrite { .. } => "before_write",
            Self::AfterWrite { .. } => "after_write",
            Self::BeforeMonitorItem { .. } => "before_monitor_item",
            Self::AfterMonitorItem { .. } => "after_monitor_item",
            Self::BeforeMonitoring { .. } => "before_monitoring",
            Self::AfterMonitoring { .. } => "after_monitoring",
            Self::BeforeBrowsing { .. } => "before_browsing",
            Self::AfterBrowsing { .. } => "after_browsing",
            Self::ItemChanged { .. } => "item_changed",
        }
    }

    /// Returns `true` for `Log` events.
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }
}

// =============================================================================
// EventBus
// =============================================================================

/// Statistics of an [`EventBus`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventBusStats {
    /// Events published.
    pub published: u64,
    /// Events lost by lagging subscribers.
    pub dropped: u64,
    /// Current number of subscribers.
    pub subscribers: usize,
}

#[derive(Debug, Default)]
struct AtomicEventStats {
    published: AtomicU64,
    dropped: AtomicU64,
}

/// Broadcast bus carrying [`ClientEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
    capacity: usize,
    stats: Arc<AtomicEventStats>,
}

impl EventBus {
    /// Creates a bus buffering `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            capacity,
            stats: Arc::new(AtomicEventStats::default()),
        }
    }

    /// Publishes an event without waiting.
    ///
    /// Returns the number of subscribers that will see it.
    pub fn publish(&self, event: ClientEvent) -> usize {
        self.stats.published.fetch_add(1, Ordering::Relaxed);
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new subscriber.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
            stats: self.stats.clone(),
        }
    }

    /// Returns the current number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns the per-subscriber capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns current statistics.
    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            published: self.stats.published.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A subscriber to the event bus.
pub struct EventSubscriber {
    receiver: broadcast::Receiver<ClientEvent>,
    stats: Arc<AtomicEventStats>,
}

impl EventSubscriber {
    /// Receives the next event.
    ///
    /// Returns `None` once the bus has been dropped.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    self.stats.dropped.fetch_add(count, Ordering::Relaxed);
                    tracing::warn!(count, "Event subscriber lagged, events dropped");
                }
            }
        }
    }

    /// Returns the next buffered event, if any.
    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    self.stats.dropped.fetch_add(count, Ordering::Relaxed);
                    tracing::warn!(count, "Event subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drains every buffered event.
    pub fn drain(&mut self) -> Vec<ClientEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

// =============================================================================
// EventEmitter
// =============================================================================

/// Observability port handed to each component.
#[derive(Clone)]
pub struct EventEmitter {
    component: &'static str,
    bus: Arc<EventBus>,
}

impl EventEmitter {
    /// Creates an emitter for `component` publishing on `bus`.
    pub fn new(component: &'static str, bus: Arc<EventBus>) -> Self {
        Self { component, bus }
    }

    /// Returns an emitter for another component on the same bus.
    pub fn for_component(&self, component: &'static str) -> Self {
        Self::new(component, self.bus.clone())
    }

    /// Returns the component name.
    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Returns the underlying bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Publishes a domain event.
    pub fn publish(&self, event: ClientEvent) {
        self.bus.publish(event);
    }

    /// Emits a debug record.
    pub fn debug(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(component = self.component, "{}", message);
        self.log(LogLevel::Debug, message);
    }

    /// Emits an info record.
    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(component = self.component, "{}", message);
        self.log(LogLevel::Info, message);
    }

    /// Emits a warning record.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(component = self.component, "{}", message);
        self.log(LogLevel::Warn, message);
    }

    /// Reports an error.
    ///
    /// The record is written at the error's own severity and published as
    /// an [`ClientEvent::Error`].
    pub fn error(&self, error: &MirrorError, context: &str) {
        error.log(context);
        self.bus.publish(ClientEvent::Error {
            component: self.component,
            code: error.error_code().to_string(),
            message: format!("{}: {}", context, error),
        });
    }

    fn log(&self, level: LogLevel, message: String) {
        self.bus.publish(ClientEvent::Log {
            level,
            component: self.component,
            message,
        });
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonitorError;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();

        assert_eq!(bus.publish(ClientEvent::Disconnected), 1);
        assert_eq!(sub.recv().await, Some(ClientEvent::Disconnected));
        assert_eq!(bus.stats().published, 1);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(ClientEvent::SessionClosed), 0);
    }

    #[test]
    fn test_lagging_subscriber_counts_drops() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for _ in 0..5 {
            bus.publish(ClientEvent::Disconnected);
        }

        let received = sub.drain();
        assert_eq!(received.len(), 2);
        assert_eq!(bus.stats().dropped, 3);
    }

    #[test]
    fn test_emitter_mirrors_logs() {
        let bus = Arc::new(EventBus::new(16));
        let mut sub = bus.subscribe();
        let emitter = EventEmitter::new("browse", bus.clone());

        emitter.info("Browse started");
        emitter.for_component("monitor").warn("Queue full");

        let events = sub.drain();
        assert_eq!(
            events[0],
            ClientEvent::Log {
                level: LogLevel::Info,
                component: "browse",
                message: "Browse started".into(),
            }
        );
        assert!(matches!(events[1], ClientEvent::Log { component: "monitor", level: LogLevel::Warn, .. }));
    }

    #[test]
    fn test_emitter_reports_errors() {
        let bus = Arc::new(EventBus::new(16));
        let mut sub = bus.subscribe();
        let emitter = EventEmitter::new("monitor", bus);

        emitter.error(&MonitorError::NothingToMonitor.into(), "start");
        match sub.try_recv() {
            Some(ClientEvent::Error { component, code, message }) => {
                assert_eq!(component, "monitor");
                assert_eq!(code, "MR-0401");
                assert_eq!(message, "start: nothing to monitor");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = ClientEvent::ItemChanged {
            node_id: NodeId::string(2, "A"),
            value: Variant::Boolean(true),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "item_changed");
        assert_eq!(json["node_id"], "ns=2;s=A");
        assert_eq!(event.name(), "item_changed");
    }
}
