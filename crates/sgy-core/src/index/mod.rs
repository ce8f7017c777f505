// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Multi-key trace index.
//!
//! A [`TraceIndex`] maps composite key tuples (one `i32` per key field) to the
//! ascending list of trace indices carrying those header values. It moves
//! through `Unbuilt -> Building -> Built`; only [`TraceIndex::rebuild`] leaves
//! `Built`, and a failed rebuild restores the previous state with the prior
//! stored contents intact.
//!
//! Contents live behind an [`IndexStore`]: [`MemoryIndexStore`] for
//! throwaway indexes, [`RedbIndexStore`] for a durable artifact that later
//! runs load instead of rescanning.

mod build;
mod redb_store;
mod store;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

pub use redb_store::RedbIndexStore;
pub use store::{IndexManifest, IndexStore, MemoryIndexStore};

use crate::progress::Progress;
use crate::reader::TraceReader;
use crate::schema::{trace_field, FieldSpec};
use crate::{PersistenceError, SegyError};

/// Zero-based position of a trace record in its file.
pub type TraceId = u32;

/// One value per key field, in key order.
pub type KeyTuple = Vec<i32>;

/// Query tuple; `None` is a wildcard. With a sequence component the final
/// entry selects a position within the combined result.
pub type Query = [Option<i32>];

/// Key tuple to ascending trace ids; iteration is in ascending tuple order.
pub type GroupMap = BTreeMap<KeyTuple, Vec<TraceId>>;

/// Lifecycle of a [`TraceIndex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexState {
    /// Never built or loaded.
    Unbuilt,
    /// A scan-and-commit is in progress.
    Building,
    /// Contents are committed to the store and queryable.
    Built,
}

/// How [`TraceIndex::ensure_built`] reached `Built`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Headers were scanned and fresh contents committed.
    Built,
    /// Matching contents were already stored.
    Loaded,
}

/// Persistent composite-key index over the trace headers of one file.
pub struct TraceIndex {
    name: String,
    fields: Vec<FieldSpec>,
    has_sequence: bool,
    workers: usize,
    store: Arc<dyn IndexStore>,
    state: IndexState,
    cache: Mutex<FxHashMap<Vec<Option<i32>>, Arc<[TraceId]>>>,
}

impl fmt::Debug for TraceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceIndex")
            .field("name", &self.name)
            .field("keys", &self.keys())
            .field("has_sequence", &self.has_sequence)
            .field("workers", &self.workers)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl TraceIndex {
    /// Declares an index named `name` over the trace header fields `keys`.
    ///
    /// The index starts `Unbuilt` and backed by a fresh [`MemoryIndexStore`].
    ///
    /// # Errors
    ///
    /// [`SegyError::Argument`] for an empty or repeating key set,
    /// [`SegyError::SchemaLookup`] for a name outside the trace header schema.
    pub fn new(name: impl Into<String>, keys: &[&str]) -> Result<Self, SegyError> {
        if keys.is_empty() {
            return Err(SegyError::Argument("trace index needs at least one key".into()));
        }
        let mut seen = BTreeSet::new();
        let mut fields = Vec::with_capacity(keys.len());
        for key in keys {
            if !seen.insert(*key) {
                return Err(SegyError::Argument(format!("key `{key}` listed twice")));
            }
            fields.push(trace_field(key)?);
        }
        Ok(Self {
            name: name.into(),
            fields,
            has_sequence: false,
            workers: 0,
            store: Arc::new(MemoryIndexStore::new()),
            state: IndexState::Unbuilt,
            cache: Mutex::new(FxHashMap::default()),
        })
    }

    /// Puts the index contents in `store` instead of a private memory store.
    ///
    /// One store may hold many indexes, but each name must belong to a single
    /// live `TraceIndex`: the query cache is private to the index, so a
    /// rebuild through one handle leaves another handle on the same name
    /// answering from stale cached results.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn IndexStore>) -> Self {
        self.store = store;
        self
    }

    /// Adds a trailing query component that picks one position out of the
    /// combined match list.
    #[must_use]
    pub fn with_sequence(mut self) -> Self {
        self.has_sequence = true;
        self
    }

    /// Sets the build worker count; 0 uses the available parallelism.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Index name, unique within a store.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered key field names.
    pub fn keys(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// Whether queries carry a trailing sequence component.
    pub fn has_sequence(&self) -> bool {
        self.has_sequence
    }

    /// Current lifecycle state.
    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Number of distinct query tuples currently cached.
    pub fn cached_queries(&self) -> usize {
        self.lock_cache().len()
    }

    fn manifest_for(&self, reader: &TraceReader) -> IndexManifest {
        IndexManifest {
            keys: self.fields.iter().map(|f| f.name.to_owned()).collect(),
            has_sequence: self.has_sequence,
            num_traces: reader.num_traces(),
            trace_record_size: reader.trace_record_size() as u64,
        }
    }

    /// Loads stored contents that match this index and `reader`, or scans and
    /// commits fresh ones.
    ///
    /// A stored manifest with different keys or file geometry is stale and
    /// is replaced.
    ///
    /// # Errors
    ///
    /// [`SegyError::Persistence`] when the store fails, [`SegyError::Io`] when
    /// the header scan fails.
    pub fn ensure_built(
        &mut self,
        reader: &TraceReader,
        progress: Option<&dyn Progress>,
    ) -> Result<BuildOutcome, SegyError> {
        let expected = self.manifest_for(reader);
        let stored = self
            .store
            .load_manifest(&self.name)
            .map_err(|e| SegyError::persistence(&self.name, e))?;
        match stored {
            Some(stored) if stored == expected => {
                info!(index = %self.name, traces = expected.num_traces, "loaded stored trace index");
                self.state = IndexState::Built;
                return Ok(BuildOutcome::Loaded);
            }
            Some(stored) => {
                warn!(
                    index = %self.name,
                    stored_keys = ?stored.keys,
                    stored_traces = stored.num_traces,
                    "stored trace index does not match this file, rebuilding"
                );
            }
            None => debug!(index = %self.name, "no stored trace index"),
        }
        self.rebuild(reader, progress)?;
        Ok(BuildOutcome::Built)
    }

    /// Scans every header of `reader` and atomically replaces the stored
    /// contents. Clears the query cache on success.
    ///
    /// # Errors
    ///
    /// On failure the state and stored contents are left as they were.
    pub fn rebuild(
        &mut self,
        reader: &TraceReader,
        progress: Option<&dyn Progress>,
    ) -> Result<(), SegyError> {
        let previous = self.state;
        self.state = IndexState::Building;
        match self.scan_and_commit(reader, progress) {
            Ok(groups) => {
                self.lock_cache().clear();
                self.state = IndexState::Built;
                info!(index = %self.name, groups, traces = reader.num_traces(), "built trace index");
                Ok(())
            }
            Err(err) => {
                self.state = previous;
                Err(err)
            }
        }
    }

    fn scan_and_commit(
        &self,
        reader: &TraceReader,
        progress: Option<&dyn Progress>,
    ) -> Result<usize, SegyError> {
        let workers = build::resolve_workers(self.workers);
        debug!(index = %self.name, workers, "scanning trace headers");
        let groups = build::build_groups(reader, &self.fields, workers, progress)?;
        let manifest = self.manifest_for(reader);
        self.store
            .replace(&self.name, &manifest, &groups)
            .map_err(|e| SegyError::persistence(&self.name, e))?;
        Ok(groups.len())
    }

    fn ensure_queryable(&self) -> Result<(), SegyError> {
        if self.state == IndexState::Built {
            Ok(())
        } else {
            Err(SegyError::IndexNotBuilt(self.name.clone()))
        }
    }

    /// Trace ids matching `query`, ascending within each group and groups in
    /// ascending key order.
    ///
    /// The query holds one entry per key, plus one when the index has a
    /// sequence component. A query whose key entries are all wildcards
    /// matches nothing. Repeated identical queries are answered from cache.
    ///
    /// # Errors
    ///
    /// [`SegyError::Argument`] on arity mismatch, [`SegyError::IndexNotBuilt`]
    /// before a build, [`SegyError::Persistence`] if the store fails.
    pub fn find(&self, query: &Query) -> Result<Vec<TraceId>, SegyError> {
        self.ensure_queryable()?;
        let arity = self.fields.len() + usize::from(self.has_sequence);
        if query.len() != arity {
            return Err(SegyError::Argument(format!(
                "index `{}` takes {arity} query values, got {}",
                self.name,
                query.len()
            )));
        }
        let (keys, sequence) = query.split_at(self.fields.len());
        if keys.iter().all(Option::is_none) {
            debug!(index = %self.name, "all-wildcard query matches nothing");
            return Ok(Vec::new());
        }
        if let Some(hit) = self.lock_cache().get(query) {
            return Ok(hit.to_vec());
        }

        let mut ids = self.collect_matches(keys)?;
        if let Some(Some(position)) = sequence.first() {
            ids = usize::try_from(*position)
                .ok()
                .and_then(|p| ids.get(p).copied())
                .into_iter()
                .collect();
        }
        let result: Arc<[TraceId]> = ids.into();
        self.lock_cache().insert(query.to_vec(), Arc::clone(&result));
        Ok(result.to_vec())
    }

    /// Store scan that only passes on tuples with one value per key.
    fn scan_groups(
        &self,
        prefix: &[i32],
        visit: &mut dyn FnMut(&[i32], &[TraceId]),
    ) -> Result<(), SegyError> {
        let arity = self.fields.len();
        let mut ragged = None;
        self.store
            .scan(&self.name, prefix, &mut |tuple, group| {
                if tuple.len() == arity {
                    visit(tuple, group);
                } else if ragged.is_none() {
                    ragged = Some(tuple.len());
                }
            })
            .map_err(|e| SegyError::persistence(&self.name, e))?;
        match ragged {
            None => Ok(()),
            Some(len) => Err(SegyError::persistence(
                &self.name,
                PersistenceError::Corrupt(format!(
                    "stored key tuple has {len} values, index has {arity} keys"
                )),
            )),
        }
    }

    fn collect_matches(&self, keys: &[Option<i32>]) -> Result<Vec<TraceId>, SegyError> {
        let prefix: Vec<i32> = keys.iter().map_while(|k| *k).collect();
        let rest = &keys[prefix.len()..];
        let mut ids = Vec::new();
        self.scan_groups(&prefix, &mut |tuple, group| {
            let tail = &tuple[prefix.len()..];
            let matches = rest
                .iter()
                .zip(tail)
                .all(|(want, have)| want.map_or(true, |w| w == *have));
            if matches {
                ids.extend_from_slice(group);
            }
        })?;
        Ok(ids)
    }

    /// Distinct values of key `key` across all groups, ascending.
    ///
    /// # Errors
    ///
    /// [`SegyError::SchemaLookup`] for a name outside the schema,
    /// [`SegyError::Argument`] for a schema field this index does not key on.
    pub fn unique_values(&self, key: &str) -> Result<Vec<i32>, SegyError> {
        let field = trace_field(key)?;
        let position = self
            .fields
            .iter()
            .position(|f| f.name == field.name)
            .ok_or_else(|| {
                SegyError::Argument(format!("`{key}` is not a key of index `{}`", self.name))
            })?;
        self.ensure_queryable()?;
        let mut values = BTreeSet::new();
        self.scan_groups(&[], &mut |tuple, _| {
            values.insert(tuple[position]);
        })?;
        Ok(values.into_iter().collect())
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, FxHashMap<Vec<Option<i32>>, Arc<[TraceId]>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
