// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Durable [`IndexStore`] on an embedded `redb` database.
//!
//! Layout (one database file, any number of indexes):
//!
//! ```text
//! sgy_index_manifests : name -> JSON IndexManifest
//! sgy_index:<name>    : encoded key tuple -> trace ids (u32, native endian, contiguous)
//! ```
//!
//! Key tuples are encoded as big-endian `i32`s with the sign bit flipped, so
//! byte order equals numeric tuple order and prefix queries become range
//! scans.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition, TableError, WriteTransaction};
use tracing::{debug, warn};

use super::store::{IndexManifest, IndexStore};
use super::{GroupMap, TraceId};
use crate::PersistenceError;

const MANIFESTS: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("sgy_index_manifests");

const TRACE_ID_LEN: usize = std::mem::size_of::<TraceId>();

fn table_name(index: &str) -> String {
    format!("sgy_index:{index}")
}

fn groups_table(name: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(name)
}

fn encode_key(values: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for &v in values {
        out.extend_from_slice(&((v as u32) ^ 0x8000_0000).to_be_bytes());
    }
    out
}

fn decode_key(bytes: &[u8]) -> Result<Vec<i32>, PersistenceError> {
    if bytes.len() % 4 != 0 {
        return Err(PersistenceError::Corrupt(format!(
            "key of {} bytes is not a whole number of i32 values",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| (u32::from_be_bytes([c[0], c[1], c[2], c[3]]) ^ 0x8000_0000) as i32)
        .collect())
}

fn encode_ids(ids: &[TraceId]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ids.len() * TRACE_ID_LEN);
    for id in ids {
        out.extend_from_slice(&id.to_ne_bytes());
    }
    out
}

fn decode_ids(bytes: &[u8]) -> Result<Vec<TraceId>, PersistenceError> {
    if bytes.len() % TRACE_ID_LEN != 0 {
        return Err(PersistenceError::Corrupt(format!(
            "trace id list of {} bytes is not a whole number of ids",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(TRACE_ID_LEN)
        .map(|c| TraceId::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// [`IndexStore`] backed by a `redb` database file.
///
/// Cloning shares the underlying database handle.
#[derive(Clone)]
pub struct RedbIndexStore {
    db: Arc<Database>,
    path: PathBuf,
}

impl std::fmt::Debug for RedbIndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbIndexStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbIndexStore {
    /// Opens the database at `path`, creating an empty one if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path)?;
        debug!(path = %path.display(), "opened trace index database");
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_all(
        txn: &WriteTransaction<'_>,
        name: &str,
        manifest: &IndexManifest,
        groups: &GroupMap,
    ) -> Result<(), PersistenceError> {
        let table_name = table_name(name);
        let definition = groups_table(&table_name);
        txn.delete_table(definition)?;
        {
            let mut table = txn.open_table(definition)?;
            for (key, ids) in groups {
                let key = encode_key(key);
                let ids = encode_ids(ids);
                table.insert(key.as_slice(), ids.as_slice())?;
            }
        }
        let encoded = serde_json::to_vec(manifest)?;
        let mut manifests = txn.open_table(MANIFESTS)?;
        manifests.insert(name, encoded.as_slice())?;
        Ok(())
    }
}

impl IndexStore for RedbIndexStore {
    fn load_manifest(&self, name: &str) -> Result<Option<IndexManifest>, PersistenceError> {
        let txn = self.db.begin_read()?;
        let manifests = match txn.open_table(MANIFESTS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let Some(raw) = manifests.get(name)? else {
            return Ok(None);
        };
        let manifest = serde_json::from_slice(raw.value())?;
        Ok(Some(manifest))
    }

    fn replace(
        &self,
        name: &str,
        manifest: &IndexManifest,
        groups: &GroupMap,
    ) -> Result<(), PersistenceError> {
        let txn = self.db.begin_write()?;
        if let Err(err) = Self::write_all(&txn, name, manifest, groups) {
            if let Err(abort_err) = txn.abort() {
                warn!(index = name, error = %abort_err, "aborting trace index write failed");
            }
            return Err(err);
        }
        txn.commit()?;
        debug!(index = name, groups = groups.len(), "committed trace index");
        Ok(())
    }

    fn scan(
        &self,
        name: &str,
        prefix: &[i32],
        visit: &mut dyn FnMut(&[i32], &[TraceId]),
    ) -> Result<(), PersistenceError> {
        let table_name = table_name(name);
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(groups_table(&table_name)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let start = encode_key(prefix);
        for row in table.range::<&[u8]>(start.as_slice()..)? {
            let (key, ids) = row?;
            let key = key.value();
            if !key.starts_with(&start) {
                break;
            }
            let key = decode_key(key)?;
            let ids = decode_ids(ids.value())?;
            visit(&key, &ids);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encoding_preserves_numeric_order() {
        let mut values = vec![
            vec![i32::MIN, 0],
            vec![-1, 5],
            vec![0, -3],
            vec![0, 2],
            vec![1, i32::MIN],
            vec![i32::MAX, i32::MAX],
        ];
        let encoded: Vec<_> = values.iter().map(|v| encode_key(v)).collect();
        let mut sorted = encoded.clone();
        sorted.sort();
        assert_eq!(encoded, sorted);

        values.reverse();
        for v in &values {
            assert_eq!(&decode_key(&encode_key(v)).unwrap(), v);
        }
    }

    #[test]
    fn ragged_rows_are_corrupt() {
        assert!(matches!(decode_ids(&[1, 2, 3]), Err(PersistenceError::Corrupt(_))));
        assert!(matches!(decode_key(&[0; 5]), Err(PersistenceError::Corrupt(_))));
        assert_eq!(decode_ids(&encode_ids(&[0, 7, 9])).unwrap(), vec![0, 7, 9]);
    }

    #[test]
    fn contents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces.idx");
        let manifest = IndexManifest {
            keys: vec!["CDP".into()],
            has_sequence: false,
            num_traces: 3,
            trace_record_size: 256,
        };
        let groups = GroupMap::from([(vec![10], vec![0, 2]), (vec![11], vec![1])]);
        {
            let store = RedbIndexStore::open(&path).unwrap();
            assert!(store.load_manifest("cdp").unwrap().is_none());
            store.replace("cdp", &manifest, &groups).unwrap();
        }

        let store = RedbIndexStore::open(&path).unwrap();
        assert_eq!(store.load_manifest("cdp").unwrap(), Some(manifest));
        let mut rows = Vec::new();
        store
            .scan("cdp", &[], &mut |key, ids| rows.push((key.to_vec(), ids.to_vec())))
            .unwrap();
        assert_eq!(rows, vec![(vec![10], vec![0, 2]), (vec![11], vec![1])]);
    }

    #[test]
    fn indexes_share_one_file_independently() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbIndexStore::open(dir.path().join("shared.idx")).unwrap();
        let manifest = IndexManifest {
            keys: vec!["CDP".into()],
            has_sequence: false,
            num_traces: 1,
            trace_record_size: 244,
        };
        store
            .replace("a", &manifest, &GroupMap::from([(vec![1], vec![0])]))
            .unwrap();
        store
            .replace("b", &manifest, &GroupMap::from([(vec![2], vec![0])]))
            .unwrap();

        let mut a = Vec::new();
        store.scan("a", &[], &mut |key, _| a.push(key.to_vec())).unwrap();
        assert_eq!(a, vec![vec![1]]);
    }
}
