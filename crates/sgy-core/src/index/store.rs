// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Storage port for trace index contents.
//!
//! A backend holds, per index name, a manifest describing what was indexed
//! and the `key tuple -> trace ids` groups. [`replace`](IndexStore::replace)
//! is all-or-nothing: readers see either the previous contents or the new
//! ones, never a mix.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::{GroupMap, TraceId};
use crate::PersistenceError;

/// What an index was built from; used to decide whether stored contents can
/// be reused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Ordered key field names.
    pub keys: Vec<String>,
    /// Whether queries carry an extra position-within-group component.
    pub has_sequence: bool,
    /// Trace count of the indexed file.
    pub num_traces: u32,
    /// Record size of the indexed file.
    pub trace_record_size: u64,
}

/// Persist/load/query port for trace index contents.
///
/// Methods take `&self`; backends provide their own synchronization so a
/// single store can serve several indexes.
pub trait IndexStore: Send + Sync {
    /// Returns the manifest stored for `name`, or `None` when nothing is stored.
    fn load_manifest(&self, name: &str) -> Result<Option<IndexManifest>, PersistenceError>;

    /// Atomically replaces everything stored for `name`.
    fn replace(
        &self,
        name: &str,
        manifest: &IndexManifest,
        groups: &GroupMap,
    ) -> Result<(), PersistenceError>;

    /// Visits every stored group whose key tuple starts with `prefix`, in
    /// ascending key order. An empty prefix visits everything.
    fn scan(
        &self,
        name: &str,
        prefix: &[i32],
        visit: &mut dyn FnMut(&[i32], &[TraceId]),
    ) -> Result<(), PersistenceError>;
}

#[derive(Debug)]
struct StoredIndex {
    manifest: IndexManifest,
    groups: GroupMap,
}

/// In-process [`IndexStore`]. Contents live as long as the store does.
#[derive(Debug, Default)]
pub struct MemoryIndexStore {
    indexes: RwLock<HashMap<String, StoredIndex>>,
}

impl MemoryIndexStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexes currently stored.
    pub fn len(&self) -> usize {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no index is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IndexStore for MemoryIndexStore {
    fn load_manifest(&self, name: &str) -> Result<Option<IndexManifest>, PersistenceError> {
        let indexes = self.indexes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(indexes.get(name).map(|stored| stored.manifest.clone()))
    }

    fn replace(
        &self,
        name: &str,
        manifest: &IndexManifest,
        groups: &GroupMap,
    ) -> Result<(), PersistenceError> {
        let stored = StoredIndex {
            manifest: manifest.clone(),
            groups: groups.clone(),
        };
        self.indexes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), stored);
        Ok(())
    }

    fn scan(
        &self,
        name: &str,
        prefix: &[i32],
        visit: &mut dyn FnMut(&[i32], &[TraceId]),
    ) -> Result<(), PersistenceError> {
        let indexes = self.indexes.read().unwrap_or_else(PoisonError::into_inner);
        let Some(stored) = indexes.get(name) else {
            return Ok(());
        };
        for (key, ids) in stored.groups.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            visit(key, ids);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> IndexManifest {
        IndexManifest {
            keys: vec!["CDP".into(), "offset".into()],
            has_sequence: false,
            num_traces: 4,
            trace_record_size: 256,
        }
    }

    fn groups() -> GroupMap {
        GroupMap::from([
            (vec![-5, 0], vec![3]),
            (vec![100, 0], vec![0]),
            (vec![100, 50], vec![1]),
            (vec![200, 0], vec![2]),
        ])
    }

    #[test]
    fn prefix_scan_visits_contiguous_run() {
        let store = MemoryIndexStore::new();
        store.replace("m", &manifest(), &groups()).unwrap();

        let mut seen = Vec::new();
        store
            .scan("m", &[100], &mut |key, ids| seen.push((key.to_vec(), ids.to_vec())))
            .unwrap();
        assert_eq!(
            seen,
            vec![(vec![100, 0], vec![0]), (vec![100, 50], vec![1])]
        );

        let mut all = 0;
        store.scan("m", &[], &mut |_, _| all += 1).unwrap();
        assert_eq!(all, 4);
    }

    #[test]
    fn missing_index_has_no_manifest_and_no_rows() {
        let store = MemoryIndexStore::new();
        assert!(store.load_manifest("absent").unwrap().is_none());
        let mut visited = false;
        store.scan("absent", &[], &mut |_, _| visited = true).unwrap();
        assert!(!visited);
        assert!(store.is_empty());
    }

    #[test]
    fn replace_discards_previous_contents() {
        let store = MemoryIndexStore::new();
        store.replace("m", &manifest(), &groups()).unwrap();
        let smaller = GroupMap::from([(vec![7, 7], vec![0, 1])]);
        store.replace("m", &manifest(), &smaller).unwrap();

        let mut keys = Vec::new();
        store.scan("m", &[], &mut |key, _| keys.push(key.to_vec())).unwrap();
        assert_eq!(keys, vec![vec![7, 7]]);
        assert_eq!(store.len(), 1);
    }
}
