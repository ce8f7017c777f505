// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for the codec, trace store and trace index.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by readers, writers and trace indexes.
#[derive(Debug, Error)]
pub enum SegyError {
    /// The file does not have the fixed SEG-Y layout.
    #[error("malformed SEG-Y file {path}: {reason}")]
    Structural {
        /// File being opened.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A header field name is not part of the closed schema.
    #[error("unknown {table} header field `{name}`")]
    SchemaLookup {
        /// Which table was searched (`"binary"` or `"trace"`).
        table: &'static str,
        /// The name that failed to resolve.
        name: String,
    },

    /// Open, read, write or seek failure.
    #[error("IO error on {path}: {source}")]
    Io {
        /// File the operation targeted.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The durable index artifact could not be read or committed.
    #[error("trace index `{index}` persistence failed: {source}")]
    Persistence {
        /// Index name.
        index: String,
        /// Underlying backend failure.
        #[source]
        source: PersistenceError,
    },

    /// Size or arity mismatch, rejected before any I/O.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Requested trace lies past the end of the file.
    #[error("trace {index} out of range, file holds {count} traces")]
    TraceOutOfRange {
        /// Requested trace index.
        index: u64,
        /// Number of traces in the file.
        count: u64,
    },

    /// No index with this name is attached to the reader.
    #[error("no trace index named `{0}`")]
    UnknownIndex(String),

    /// The index has never been built or loaded.
    #[error("trace index `{0}` is not built")]
    IndexNotBuilt(String),
}

impl SegyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn structural(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Structural {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(index: &str, source: impl Into<PersistenceError>) -> Self {
        Self::Persistence {
            index: index.to_owned(),
            source: source.into(),
        }
    }
}

/// Failures inside an [`IndexStore`](crate::IndexStore) backend.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Embedded database failure (open, transaction, table, commit).
    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    /// Index manifest could not be encoded or decoded.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// A stored row does not have the expected shape.
    #[error("corrupt index row: {0}")]
    Corrupt(String),
}

macro_rules! redb_into_persistence {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for PersistenceError {
                fn from(err: $ty) -> Self {
                    Self::Database(err.into())
                }
            }
        )*
    };
}

redb_into_persistence!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
