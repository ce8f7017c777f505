// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Errors for correction, stacking and velocity loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by this crate.
#[derive(Debug, Error)]
pub enum NmoError {
    /// Input sequences whose lengths do not line up.
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// Interpolation was asked of a table with no velocity functions.
    #[error("velocity table is empty")]
    EmptyVelocityTable,

    /// The velocity table file could not be read.
    #[error("cannot read velocity table {path}: {source}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}
