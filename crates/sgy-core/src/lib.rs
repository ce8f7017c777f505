// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! sgy-core: SEG-Y record codec, trace store and persistent trace index.
//!
//! A SEG-Y file is laid out as
//!
//! ```text
//! [text header: 3200][binary header: 400][trace record: 240 + 4*N]*
//! ```
//!
//! where every trace record is a 240-byte header followed by `N` samples in
//! the IBM System/360 base-16 float encoding. This crate provides:
//!
//! - [`codec`]: big-endian integer access and the IBM float sample codec.
//! - [`schema`]: the closed, static field tables for both header kinds.
//! - [`TraceReader`]: random access to headers and samples by trace index.
//! - [`TraceIndex`]: a named multi-key index over one reader's traces, built
//!   once by a partitioned parallel scan and persisted through an
//!   [`IndexStore`] backend.
//! - [`TraceWriter`]: sequential trace output with a header template.
//!
//! # Example
//!
//! ```rust,no_run
//! use sgy_core::{SegyError, TraceIndex, TraceReader};
//!
//! # fn main() -> Result<(), SegyError> {
//! let mut reader = TraceReader::open("line.sgy")?;
//! let index = TraceIndex::new("cdp_offset", &["CDP", "offset"])?;
//! reader.build_index(index, None)?;
//!
//! let gather = reader.get_gather_and_headers("cdp_offset", &[Some(100), None])?;
//! for (header, samples) in gather.headers.iter().zip(&gather.traces) {
//!     let offset = sgy_core::trace_header_value(header, "offset")?;
//!     let _ = (offset, samples.len());
//! }
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

/// Byte-level codec: big-endian integers and IBM float samples.
pub mod codec;
mod error;
/// Trace index: build, persist, query and cache.
pub mod index;
mod progress;
mod reader;
/// Static field tables for the binary and trace headers.
pub mod schema;
mod writer;

pub use error::{PersistenceError, SegyError};
pub use index::{
    BuildOutcome, GroupMap, IndexManifest, IndexState, IndexStore, KeyTuple, MemoryIndexStore,
    Query, RedbIndexStore, TraceId, TraceIndex,
};
pub use progress::Progress;
pub use reader::{Gather, TraceReader};
pub use schema::{binary_header_value, trace_header_value, FieldSpec, FieldWidth, HeaderValue};
pub use writer::{TraceWriter, WriterTemplate};

/// Length of the opaque textual file header.
pub const TEXT_HEADER_LEN: usize = 3200;
/// Length of the binary file header.
pub const BINARY_HEADER_LEN: usize = 400;
/// Byte offset of the first trace record.
pub const DATA_OFFSET: u64 = (TEXT_HEADER_LEN + BINARY_HEADER_LEN) as u64;
/// Length of each trace header.
pub const TRACE_HEADER_LEN: usize = 240;
/// Width of one encoded sample.
pub const SAMPLE_LEN: usize = 4;

/// Size in bytes of one trace record holding `num_samples` samples.
pub fn trace_record_size(num_samples: usize) -> usize {
    TRACE_HEADER_LEN + SAMPLE_LEN * num_samples
}
