// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Address-space discovery.
//!
//! [`BrowseEngine`] walks the address space from a root along forward
//! references and mirrors every variable it finds into the
//! [`AddressSpaceCache`].
//!
//! # Traversal
//!
//! Depth-first with an explicit stack and a visited set keyed by node id:
//! every reachable node is read and browsed exactly once whatever the
//! topology (shared children, cycles), and deep hierarchies cannot exhaust
//! the call stack. Children are visited in server order. Requests are issued
//! one at a time.
//!
//! Per node:
//!
//! 1. Read the Value attribute. A bad status marks a container (object,
//!    folder) that is traversed but not cached.
//! 2. Read the DataType attribute and upsert the variable into the cache.
//! 3. If the variable was not cached before and monitoring was requested,
//!    register it with the [`MonitorManager`].
//! 4. Browse its forward references.
//!
//! The cache file is written once, after the whole traversal succeeded.
//! Any read or browse failure aborts the traversal and is returned to the
//! caller; the items upserted so far stay in memory.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::cache::AddressSpaceCache;
use crate::error::{BrowseError, MirrorError, MirrorResult, MonitorError};
use crate::events::{ClientEvent, EventEmitter};
use crate::monitor::MonitorManager;
use crate::session::{Session, Variant};
use crate::types::{AttributeId, DiscoveredItem, NodeId};

// =============================================================================
// BrowseReport
// =============================================================================

/// Outcome of one browse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowseReport {
    /// Browse root.
    pub root: NodeId,

    /// Nodes visited, containers included.
    pub visited: usize,

    /// Variables cached or refreshed.
    pub discovered: usize,

    /// Variables that were not cached before.
    pub new_items: usize,

    /// New variables registered for monitoring.
    pub registered: usize,
}

impl BrowseReport {
    fn new(root: NodeId) -> Self {
        Self {
            root,
            visited: 0,
            discovered: 0,
            new_items: 0,
            registered: 0,
        }
    }
}

// =============================================================================
// BrowseStatistics
// =============================================================================

/// Statistics for browse operations.
#[derive(Debug, Default)]
pub struct BrowseStatistics {
    /// Completed browses.
    pub browse_count: AtomicU64,

    /// Nodes visited.
    pub nodes_visited: AtomicU64,

    /// Variables not previously cached.
    pub new_items: AtomicU64,

    /// Failed or rejected browses.
    pub errors: AtomicU64,
}

impl BrowseStatistics {
    /// Creates new statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed browse.
    pub fn record_browse(&self, report: &BrowseReport) {
        self.browse_count.fetch_add(1, Ordering::Relaxed);
        self.nodes_visited
            .fetch_add(report.visited as u64, Ordering::Relaxed);
        self.new_items
            .fetch_add(report.new_items as u64, Ordering::Relaxed);
    }

    /// Records an error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Resets all statistics.
    pub fn reset(&self) {
        self.browse_count.store(0, Ordering::Relaxed);
        self.nodes_visited.store(0, Ordering::Relaxed);
        self.new_items.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }
}

// =============================================================================
// BrowseEngine
// =============================================================================

/// Walks the address space into the cache.
pub struct BrowseEngine {
    session: Arc<dyn Session>,
    cache: Arc<AddressSpaceCache>,
    monitor: Arc<MonitorManager>,
    emitter: EventEmitter,
    stats: BrowseStatistics,
}

impl BrowseEngine {
    /// Creates an engine.
    pub fn new(
        session: Arc<dyn Session>,
        cache: Arc<AddressSpaceCache>,
        monitor: Arc<MonitorManager>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            session,
            cache,
            monitor,
            emitter,
            stats: BrowseStatistics::new(),
        }
    }

    /// Returns a reference to the statistics.
    pub fn stats(&self) -> &BrowseStatistics {
        &self.stats
    }

    /// Returns `true` while a browse (or a cache load) is running.
    pub fn is_browsing(&self) -> bool {
        self.cache.is_browsing()
    }

    /// Browses `root` and everything reachable from it.
    ///
    /// With `monitor` set, variables seen for the first time are registered
    /// for monitoring. Fails with `Busy` if another browse is running, in
    /// which case the cache is left untouched.
    pub async fn browse(&self, root: &NodeId, monitor: bool) -> MirrorResult<BrowseReport> {
        let Some(_gate) = self.cache.try_begin_browse() else {
            self.stats.record_error();
            let error: MirrorError = BrowseError::Busy.into();
            self.emitter.error(&error, "browse");
            return Err(error);
        };

        self.emitter
            .publish(ClientEvent::BeforeBrowsing { root: root.clone() });
        self.emitter.info(format!("Browsing from {}", root));

        let report = match self.walk(root, monitor).await {
            Ok(report) => report,
            Err(e) => {
                self.stats.record_error();
                self.emitter.error(&e, &format!("browse {}", root));
                return Err(e);
            }
        };

        if let Err(e) = self.cache.save_to_file() {
            self.stats.record_error();
            self.emitter.error(&e, "save cache after browse");
            return Err(e);
        }

        self.stats.record_browse(&report);
        self.emitter.info(format!(
            "Browse of {} complete: {} nodes, {} variables, {} new",
            root, report.visited, report.discovered, report.new_items
        ));
        self.emitter.publish(ClientEvent::AfterBrowsing {
            root: root.clone(),
            discovered: report.discovered,
            new_items: report.new_items,
        });
        Ok(report)
    }

    /// Browses each root in turn.
    ///
    /// Roots are independent: a failing root does not prevent the others
    /// from being browsed.
    pub async fn browse_all(
        &self,
        roots: &[NodeId],
        monitor: bool,
    ) -> Vec<(NodeId, MirrorResult<BrowseReport>)> {
        let mut results = Vec::with_capacity(roots.len());
        for root in roots {
            let result = self.browse(root, monitor).await;
            results.push((root.clone(), result));
        }
        results
    }

    async fn walk(&self, root: &NodeId, monitor: bool) -> MirrorResult<BrowseReport> {
        let mut report = BrowseReport::new(root.clone());
        let mut visited: HashSet<NodeId> = HashSet::new();
        // (node, browse name from the parent's reference)
        let mut stack: Vec<(NodeId, Option<String>)> = vec![(root.clone(), None)];

        while let Some((node_id, browse_name)) = stack.pop() {
            if !visited.insert(node_id.clone()) {
                continue;
            }
            report.visited += 1;

            let value = self.session.read(&node_id, AttributeId::Value).await?;
            if value.status.is_good() {
                let browse_name = match browse_name {
                    Some(name) => name,
                    None => self.read_browse_name(&node_id).await?,
                };
                let data_type_id = self.read_data_type(&node_id, &value.value).await?;
                let item = DiscoveredItem::new(node_id.clone(), browse_name, data_type_id, value.value);

                report.discovered += 1;
                if self.cache.upsert(item.clone()).is_new() {
                    report.new_items += 1;
                    if monitor && self.register(&item) {
                        report.registered += 1;
                    }
                }
            } else {
                tracing::trace!(node_id = %node_id, status = %value.status, "Container node");
            }

            let references = self.session.browse(&node_id).await?;
            // Reversed so children pop in server order.
            for reference in references.into_iter().rev() {
                if reference.is_forward && !visited.contains(&reference.node_id) {
                    stack.push((reference.node_id, Some(reference.browse_name)));
                }
            }
        }

        Ok(report)
    }

    /// Registers a new item; registration failures never abort the browse.
    fn register(&self, item: &DiscoveredItem) -> bool {
        match self.monitor.add(item) {
            Ok(()) => true,
            // Already reported by the monitor.
            Err(MirrorError::Monitor(MonitorError::DuplicateRegistration { .. })) => false,
            Err(e) => {
                self.emitter.error(&e, "register monitored item");
                false
            }
        }
    }

    async fn read_browse_name(&self, node_id: &NodeId) -> MirrorResult<String> {
        let name = self.session.read(node_id, AttributeId::BrowseName).await?;
        Ok(match name.value {
            Variant::String(text) if name.status.is_good() && !text.is_empty() => text,
            _ => node_id.to_string(),
        })
    }

    async fn read_data_type(&self, node_id: &NodeId, value: &Variant) -> MirrorResult<NodeId> {
        let data_type = self.session.read(node_id, AttributeId::DataType).await?;
        Ok(match data_type.value {
            Variant::NodeId(id) if data_type.status.is_good() => id,
            _ => NodeId::numeric(0, value.type_code()),
        })
    }
}

impl std::fmt::Debug for BrowseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowseEngine")
            .field("browsing", &self.is_browsing())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheSettings, MonitoredItemSettings, SubscriptionSettings};
    use crate::events::EventBus;
    use crate::session::{Credentials, SimulatedNode, SimulatedSession};
    use crate::types::{data_type_ids, ValueKind};

    struct Fixture {
        session: Arc<SimulatedSession>,
        cache: Arc<AddressSpaceCache>,
        monitor: Arc<MonitorManager>,
        engine: Arc<BrowseEngine>,
        bus: Arc<EventBus>,
        _dir: tempfile::TempDir,
    }

    fn line() -> NodeId {
        NodeId::string(2, "Line1")
    }

    fn plant() -> SimulatedSession {
        let motor = NodeId::string(2, "Line1.Motor");
        SimulatedSession::new()
            .with_node(&NodeId::objects_folder(), SimulatedNode::object(line(), "Line1"))
            .with_node(
                &line(),
                SimulatedNode::variable(
                    NodeId::string(2, "Line1.Running"),
                    "Running",
                    NodeId::numeric(0, data_type_ids::BOOLEAN),
                    Variant::Boolean(false),
                ),
            )
            .with_node(&line(), SimulatedNode::object(motor.clone(), "Motor"))
            .with_node(
                &motor,
                SimulatedNode::variable(
                    NodeId::string(2, "Line1.Motor.Speed"),
                    "Speed",
                    NodeId::numeric(0, data_type_ids::INT32),
                    Variant::Int32(1450),
                ),
            )
            .with_node(
                &line(),
                SimulatedNode::variable(
                    NodeId::string(2, "Line1.Count"),
                    "Count",
                    NodeId::numeric(0, data_type_ids::INT16),
                    Variant::Int16(7),
                ),
            )
    }

    async fn fixture(session: SimulatedSession) -> Fixture {
        let session = Arc::new(session);
        session.connect("opc.tcp://sim:4840").await.unwrap();
        session.create_session(&Credentials::Anonymous).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(EventBus::new(256));
        let emitter = EventEmitter::new("browse", bus.clone());
        let cache = Arc::new(
            AddressSpaceCache::new(
                &CacheSettings::in_directory(dir.path()),
                emitter.for_component("cache"),
            )
            .unwrap(),
        );
        let monitor = Arc::new(MonitorManager::new(
            session.clone(),
            SubscriptionSettings::default(),
            MonitoredItemSettings::default(),
            emitter.for_component("monitor"),
        ));
        let engine = Arc::new(BrowseEngine::new(
            session.clone(),
            cache.clone(),
            monitor.clone(),
            emitter,
        ));

        Fixture {
            session,
            cache,
            monitor,
            engine,
            bus,
            _dir: dir,
        }
    }

    fn names(cache: &AddressSpaceCache) -> Vec<String> {
        cache.items().into_iter().map(|i| i.browse_name).collect()
    }

    #[tokio::test]
    async fn test_depth_first_in_server_order() {
        let f = fixture(plant()).await;
        let report = f.engine.browse(&line(), false).await.unwrap();

        assert_eq!(names(&f.cache), ["Running", "Speed", "Count"]);
        assert_eq!(report.visited, 5);
        assert_eq!(report.discovered, 3);
        assert_eq!(report.new_items, 3);
        assert_eq!(report.registered, 0);
        assert!(f.monitor.is_empty());

        let speed = f.cache.find(&NodeId::string(2, "Line1.Motor.Speed")).unwrap();
        assert_eq!(speed.data_type, ValueKind::Numeric { type_code: 6 });
        assert!(f.cache.path().exists());
    }

    #[tokio::test]
    async fn test_root_variable_uses_browse_name_attribute() {
        let f = fixture(plant()).await;
        f.engine
            .browse(&NodeId::string(2, "Line1.Count"), false)
            .await
            .unwrap();
        assert_eq!(names(&f.cache), ["Count"]);
    }

    #[tokio::test]
    async fn test_rebrowse_is_idempotent() {
        let f = fixture(plant()).await;
        f.engine.browse(&line(), true).await.unwrap();
        let first = f.cache.items();

        let report = f.engine.browse(&line(), true).await.unwrap();
        assert_eq!(f.cache.items(), first);
        assert_eq!(report.new_items, 0);
        assert_eq!(report.registered, 0);
        assert_eq!(f.monitor.len(), 3);
    }

    #[tokio::test]
    async fn test_only_new_items_are_registered() {
        let f = fixture(plant()).await;
        f.engine.browse(&line(), true).await.unwrap();

        f.session.notify(&NodeId::string(2, "Line1.Count"), Variant::Int16(9));
        f.session.insert(
            &line(),
            SimulatedNode::variable(
                NodeId::string(2, "Line1.Alarm"),
                "Alarm",
                NodeId::numeric(0, data_type_ids::BOOLEAN),
                Variant::Boolean(false),
            ),
        );

        let report = f.engine.browse(&line(), true).await.unwrap();
        assert_eq!(report.new_items, 1);
        assert_eq!(report.registered, 1);
        assert_eq!(f.monitor.len(), 4);
        assert_eq!(f.cache.find_index(&NodeId::string(2, "Line1.Alarm")), Some(3));

        // Cache follows the server, the registration snapshot does not.
        let count = NodeId::string(2, "Line1.Count");
        assert_eq!(f.cache.find(&count).unwrap().value, Variant::Int16(9));
        assert_eq!(f.monitor.get(&count).unwrap().value, Variant::Int16(7));
    }

    #[tokio::test]
    async fn test_cycles_are_visited_once() {
        let f = fixture(plant()).await;
        f.session.link(&NodeId::string(2, "Line1.Motor"), &line());
        f.session
            .link(&NodeId::string(2, "Line1.Motor"), &NodeId::string(2, "Line1.Count"));

        let report = f.engine.browse(&line(), false).await.unwrap();
        assert_eq!(report.visited, 5);
        assert_eq!(f.cache.len(), 3);
        assert_eq!(names(&f.cache), ["Running", "Speed", "Count"]);
    }

    #[tokio::test]
    async fn test_concurrent_browse_is_busy() {
        let f = fixture(plant()).await;
        f.session.pause_requests();

        let first = {
            let engine = f.engine.clone();
            tokio::spawn(async move { engine.browse(&line(), false).await })
        };
        while !f.engine.is_browsing() {
            tokio::task::yield_now().await;
        }

        let err = f.engine.browse(&line(), false).await.unwrap_err();
        assert!(matches!(err, MirrorError::Browse(BrowseError::Busy)));
        assert!(f.cache.is_empty());

        f.session.resume_requests();
        first.await.unwrap().unwrap();
        assert_eq!(f.cache.len(), 3);
        assert!(!f.engine.is_browsing());
        assert_eq!(f.engine.stats().errors.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_failure_propagates_and_releases_gate() {
        let f = fixture(plant()).await;
        f.session.fail_reads_for(NodeId::string(2, "Line1.Motor.Speed"));

        let err = f.engine.browse(&line(), false).await.unwrap_err();
        assert!(matches!(err, MirrorError::Browse(BrowseError::ReadFailed { .. })));
        assert!(!f.engine.is_browsing());
        // Not persisted.
        assert!(!f.cache.path().exists());
        assert_eq!(names(&f.cache), ["Running"]);
    }

    #[tokio::test]
    async fn test_browse_all_roots_are_independent() {
        let f = fixture(plant()).await;
        f.session.fail_browses_for(NodeId::string(2, "Line1.Motor"));

        let results = f
            .engine
            .browse_all(
                &[NodeId::string(2, "Line1.Motor"), NodeId::string(2, "Line1.Count")],
                true,
            )
            .await;

        assert!(results[0].1.is_err());
        let report = results[1].1.as_ref().unwrap();
        assert_eq!(report.registered, 1);
        assert!(f.monitor.contains(&NodeId::string(2, "Line1.Count")));
    }

    #[tokio::test]
    async fn test_browse_events() {
        let f = fixture(plant()).await;
        let mut events = f.bus.subscribe();
        f.engine.browse(&line(), true).await.unwrap();

        let domain: Vec<_> = events
            .drain()
            .into_iter()
            .filter(|e| !e.is_log())
            .collect();
        assert_eq!(domain.first(), Some(&ClientEvent::BeforeBrowsing { root: line() }));
        assert_eq!(
            domain.last(),
            Some(&ClientEvent::AfterBrowsing {
                root: line(),
                discovered: 3,
                new_items: 3,
            })
        );
        let registered = domain
            .iter()
            .filter(|e| matches!(e, ClientEvent::AfterMonitorItem { registered: true, .. }))
            .count();
        assert_eq!(registered, 3);
    }
}
