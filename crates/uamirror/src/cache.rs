// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Local mirror of the discovered address space.
//!
//! [`AddressSpaceCache`] holds discovered variables in discovery order with
//! a node-id index on the side, so lookups and upserts are O(1) while the
//! positions of existing items never move.
//!
//! # Persistence
//!
//! The collection is mirrored to a pretty-printed JSON array. Writes go to a
//! temporary file that is renamed over the target, so a crash leaves the
//! previous file intact. The file is a mirror, not a source of truth: it is
//! deleted when the cache is constructed.
//!
//! # Browse Gate
//!
//! A browse takes the gate through [`AddressSpaceCache::try_begin_browse`]
//! and holds it until the returned guard is dropped. Loading from file while
//! the gate is held fails with `CacheError::Busy`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::config::CacheSettings;
use crate::error::{CacheError, MirrorResult};
use crate::events::EventEmitter;
use crate::types::{DiscoveredItem, NodeId};

// =============================================================================
// Upsert
// =============================================================================

/// Outcome of [`AddressSpaceCache::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The node was not cached; it was appended at this position.
    Inserted(usize),
    /// The node was cached; it was replaced in place at this position.
    Updated(usize),
}

impl Upsert {
    /// Returns `true` if the item was new.
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }

    /// Returns the position of the item.
    pub fn index(&self) -> usize {
        match self {
            Self::Inserted(i) | Self::Updated(i) => *i,
        }
    }
}

#[derive(Debug, Default)]
struct Items {
    list: Vec<DiscoveredItem>,
    index: HashMap<NodeId, usize>,
}

impl Items {
    fn replace(&mut self, list: Vec<DiscoveredItem>) {
        self.index.clear();
        self.list.clear();
        for item in list {
            match self.index.get(&item.node_id) {
                // Keep the first position of duplicated entries.
                Some(&i) => self.list[i] = item,
                None => {
                    self.index.insert(item.node_id.clone(), self.list.len());
                    self.list.push(item);
                }
            }
        }
    }
}

// =============================================================================
// AddressSpaceCache
// =============================================================================

/// Node-id indexed collection of discovered variables.
pub struct AddressSpaceCache {
    path: PathBuf,
    items: RwLock<Items>,
    browsing: AtomicBool,
    emitter: EventEmitter,
}

impl AddressSpaceCache {
    /// Creates an empty cache persisting to the configured file.
    ///
    /// The directory is created if missing and any existing file at the
    /// target path is removed.
    pub fn new(settings: &CacheSettings, emitter: EventEmitter) -> MirrorResult<Self> {
        fs::create_dir_all(&settings.directory)
            .map_err(|e| CacheError::io(&settings.directory, e))?;

        let path = settings.path();
        if path.exists() {
            fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))?;
            emitter.debug(format!("Removed stale cache file {}", path.display()));
        }

        Ok(Self {
            path,
            items: RwLock::new(Items::default()),
            browsing: AtomicBool::new(false),
            emitter,
        })
    }

    /// Returns the cache file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts or replaces an item keyed by its node id.
    pub fn upsert(&self, item: DiscoveredItem) -> Upsert {
        let mut items = self.items.write();
        if let Some(&i) = items.index.get(&item.node_id) {
            items.list[i] = item;
            return Upsert::Updated(i);
        }

        let i = items.list.len();
        items.index.insert(item.node_id.clone(), i);
        items.list.push(item);
        Upsert::Inserted(i)
    }

    /// Returns a copy of the cached item for `node_id`.
    pub fn find(&self, node_id: &NodeId) -> Option<DiscoveredItem> {
        let items = self.items.read();
        items.index.get(node_id).map(|&i| items.list[i].clone())
    }

    /// Returns the position of `node_id` in discovery order.
    pub fn find_index(&self, node_id: &NodeId) -> Option<usize> {
        self.items.read().index.get(node_id).copied()
    }

    /// Returns `true` if `node_id` is cached.
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.items.read().index.contains_key(node_id)
    }

    /// Returns every item whose browse name contains `pattern`, ignoring case.
    pub fn search_by_name_contains(&self, pattern: &str) -> Vec<DiscoveredItem> {
        self.items
            .read()
            .list
            .iter()
            .filter(|item| item.name_contains(pattern))
            .cloned()
            .collect()
    }

    /// Returns the number of cached items.
    pub fn len(&self) -> usize {
        self.items.read().list.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.items.read().list.is_empty()
    }

    /// Returns a copy of every item in discovery order.
    pub fn items(&self) -> Vec<DiscoveredItem> {
        self.items.read().list.clone()
    }

    /// Removes every item.
    pub fn clear(&self) {
        let mut items = self.items.write();
        items.list.clear();
        items.index.clear();
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Writes the whole collection to the cache file.
    pub fn save_to_file(&self) -> MirrorResult<()> {
        let json = {
            let items = self.items.read();
            serde_json::to_string_pretty(&items.list).map_err(|e| CacheError::Serialize {
                message: e.to_string(),
            })?
        };

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| CacheError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| CacheError::io(&self.path, e))?;

        self.emitter
            .debug(format!("Saved {} items to {}", self.len(), self.path.display()));
        Ok(())
    }

    /// Replaces the collection with the content of the cache file.
    ///
    /// Fails with `Busy` while a browse holds the gate and with `NotFound`
    /// when there is no file. A malformed file leaves the cache empty.
    pub fn load_from_file(&self) -> MirrorResult<usize> {
        if self
            .browsing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CacheError::Busy.into());
        }
        let _gate = GateRelease(&self.browsing);

        if !self.path.exists() {
            return Err(CacheError::not_found(&self.path).into());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| CacheError::io(&self.path, e))?;

        let mut items = self.items.write();
        items.replace(Vec::new());

        let list = match parse_items(&self.path, &content) {
            Ok(list) => list,
            Err(error) => {
                self.emitter.error(&error, "load cache");
                return Err(error);
            }
        };
        items.replace(list);
        let count = items.list.len();
        drop(items);

        self.emitter
            .info(format!("Loaded {} items from {}", count, self.path.display()));
        Ok(count)
    }

    /// Reads a cache file without a cache instance.
    ///
    /// Used for offline inspection, since constructing a cache deletes the
    /// file it is configured with.
    pub fn read_file(path: impl AsRef<Path>) -> MirrorResult<Vec<DiscoveredItem>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CacheError::not_found(path).into());
        }
        let content = fs::read_to_string(path).map_err(|e| CacheError::io(path, e))?;
        parse_items(path, &content)
    }

    // =========================================================================
    // Browse gate
    // =========================================================================

    /// Takes the browse gate, or returns `None` if it is already held.
    pub fn try_begin_browse(&self) -> Option<BrowseGuard<'_>> {
        self.browsing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BrowseGuard(GateRelease(&self.browsing)))
    }

    /// Returns `true` while the browse gate is held.
    pub fn is_browsing(&self) -> bool {
        self.browsing.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for AddressSpaceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSpaceCache")
            .field("path", &self.path)
            .field("len", &self.len())
            .field("browsing", &self.is_browsing())
            .finish()
    }
}

fn parse_items(path: &Path, content: &str) -> MirrorResult<Vec<DiscoveredItem>> {
    serde_json::from_str(content).map_err(|e| CacheError::parse(path, e.to_string()).into())
}

struct GateRelease<'a>(&'a AtomicBool);

impl Drop for GateRelease<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Holds the browse gate; released on drop, including on error paths.
pub struct BrowseGuard<'a>(GateRelease<'a>);

impl std::fmt::Debug for BrowseGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BrowseGuard")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MirrorError;
    use crate::events::EventBus;
    use crate::session::Variant;
    use crate::types::data_type_ids;
    use std::sync::Arc;

    fn cache_in(dir: &Path) -> AddressSpaceCache {
        let emitter = EventEmitter::new("cache", Arc::new(EventBus::new(64)));
        AddressSpaceCache::new(&CacheSettings::in_directory(dir), emitter).unwrap()
    }

    fn item(name: &str, value: i32) -> DiscoveredItem {
        DiscoveredItem::new(
            NodeId::string(2, name),
            name,
            NodeId::numeric(0, data_type_ids::INT32),
            Variant::Int32(value),
        )
    }

    #[test]
    fn test_upsert_preserves_positions() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        assert_eq!(cache.upsert(item("A", 1)), Upsert::Inserted(0));
        assert_eq!(cache.upsert(item("B", 2)), Upsert::Inserted(1));
        assert_eq!(cache.upsert(item("A", 10)), Upsert::Updated(0));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.find_index(&NodeId::string(2, "B")), Some(1));
        assert_eq!(
            cache.find(&NodeId::string(2, "A")).unwrap().value,
            Variant::Int32(10)
        );
        assert!(cache.find(&NodeId::string(2, "C")).is_none());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.upsert(item("PumpSpeed", 1));
        cache.upsert(item("ValveState", 2));
        cache.upsert(item("pump_hours", 3));

        let found = cache.search_by_name_contains("PUMP");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].browse_name, "PumpSpeed");
        assert!(cache.search_by_name_contains("boiler").is_empty());
    }

    #[test]
    fn test_construction_creates_directory_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("mirror");
        let cache = cache_in(&nested);
        cache.upsert(item("A", 1));
        cache.save_to_file().unwrap();
        assert!(cache.path().exists());

        let fresh = cache_in(&nested);
        assert!(!fresh.path().exists());
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.upsert(item("A", 1));
        cache.upsert(item("B", 2));
        cache.save_to_file().unwrap();

        cache.clear();
        assert_eq!(cache.load_from_file().unwrap(), 2);
        assert_eq!(cache.items()[1].node_id, NodeId::string(2, "B"));
        assert_eq!(cache.find_index(&NodeId::string(2, "B")), Some(1));
    }

    #[test]
    fn test_cache_round_trip_non_finite() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.upsert(item("A", 1));
        cache.upsert(DiscoveredItem::new(
            NodeId::string(2, "Temp"),
            "Temp",
            NodeId::numeric(0, data_type_ids::DOUBLE),
            Variant::Double(f64::NAN),
        ));
        cache.upsert(DiscoveredItem::new(
            NodeId::string(2, "Level"),
            "Level",
            NodeId::numeric(0, data_type_ids::FLOAT),
            Variant::Float(f32::INFINITY),
        ));
        cache.save_to_file().unwrap();

        cache.clear();
        assert_eq!(cache.load_from_file().unwrap(), 3);
        let temp = cache.find(&NodeId::string(2, "Temp")).unwrap();
        assert!(matches!(temp.value, Variant::Double(v) if v.is_nan()));
        let level = cache.find(&NodeId::string(2, "Level")).unwrap();
        assert_eq!(level.value, Variant::Float(f32::INFINITY));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        let err = cache.load_from_file().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_malformed_file_leaves_cache_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.upsert(item("A", 1));
        fs::write(cache.path(), "[{\"nodeId\": ").unwrap();

        let err = cache.load_from_file().unwrap_err();
        assert!(matches!(err, MirrorError::Cache(CacheError::Parse { .. })));
        assert!(cache.is_empty());
        assert!(!cache.is_browsing());
    }

    #[test]
    fn test_load_rejected_while_browsing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.save_to_file().unwrap();

        let guard = cache.try_begin_browse().unwrap();
        assert!(cache.try_begin_browse().is_none());
        assert!(cache.load_from_file().unwrap_err().is_busy());

        drop(guard);
        assert!(!cache.is_browsing());
        assert_eq!(cache.load_from_file().unwrap(), 0);
    }

    #[test]
    fn test_read_file_without_instance() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        cache.upsert(item("A", 1));
        cache.save_to_file().unwrap();

        let items = AddressSpaceCache::read_file(cache.path()).unwrap();
        assert_eq!(items, cache.items());
        assert!(AddressSpaceCache::read_file(dir.path().join("missing.json"))
            .unwrap_err()
            .is_not_found());
    }
}
