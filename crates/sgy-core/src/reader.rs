// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Random-access reader over one SEG-Y file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::codec::decode_samples;
use crate::index::{BuildOutcome, Query, TraceId, TraceIndex};
use crate::progress::Progress;
use crate::schema::{binary_field, read_field, trace_header_value, HeaderValue};
use crate::{
    binary_header_value, trace_record_size, SegyError, BINARY_HEADER_LEN, DATA_OFFSET,
    TEXT_HEADER_LEN, TRACE_HEADER_LEN,
};

const SCAN_BUFFER: usize = 1 << 16;

/// Traces selected by one index query, in ascending trace order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gather {
    /// Trace indices, ascending.
    pub indices: Vec<TraceId>,
    /// Raw 240-byte headers, parallel to `indices`.
    pub headers: Vec<Vec<u8>>,
    /// Decoded samples, parallel to `indices`.
    pub traces: Vec<Vec<f32>>,
}

impl Gather {
    /// Number of traces in the gather.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` when the query matched nothing.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Read side of a SEG-Y file.
///
/// Geometry (`N`, `Δt`, record size, trace count) is fixed at open. Every
/// read seeks explicitly, so reads never depend on a previous position.
/// Any number of named [`TraceIndex`]es can be attached.
#[derive(Debug)]
pub struct TraceReader {
    path: PathBuf,
    file: Mutex<File>,
    text_header: Vec<u8>,
    binary_header: Vec<u8>,
    num_samples: usize,
    sample_interval: i32,
    trace_record_size: usize,
    num_traces: TraceId,
    indexes: HashMap<String, TraceIndex>,
}

impl TraceReader {
    /// Opens `path` and validates its layout.
    ///
    /// # Errors
    ///
    /// [`SegyError::Io`] if the file cannot be opened or read;
    /// [`SegyError::Structural`] if it is shorter than the two file headers,
    /// declares a non-positive sample count, or its trace region is not a
    /// whole number of records.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SegyError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|e| SegyError::io(&path, e))?;
        let file_len = file.metadata().map_err(|e| SegyError::io(&path, e))?.len();
        if file_len < DATA_OFFSET {
            return Err(SegyError::structural(
                &path,
                format!("{file_len} bytes is shorter than the {DATA_OFFSET}-byte file headers"),
            ));
        }

        let mut text_header = vec![0u8; TEXT_HEADER_LEN];
        let mut binary_header = vec![0u8; BINARY_HEADER_LEN];
        file.read_exact(&mut text_header)
            .and_then(|()| file.read_exact(&mut binary_header))
            .map_err(|e| SegyError::io(&path, e))?;

        let samples = binary_header_value(&binary_header, "SamplesPerTrace")?.as_i32();
        let num_samples = usize::try_from(samples)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                SegyError::structural(&path, format!("sample count {samples} is not positive"))
            })?;
        let sample_interval = binary_header_value(&binary_header, "SampleInterval")?.as_i32();

        let record = trace_record_size(num_samples);
        let payload = file_len - DATA_OFFSET;
        if payload % record as u64 != 0 {
            return Err(SegyError::structural(
                &path,
                format!("{payload} trace bytes is not a multiple of the {record}-byte record"),
            ));
        }
        let num_traces = TraceId::try_from(payload / record as u64).map_err(|_| {
            SegyError::structural(&path, "trace count exceeds the addressable range")
        })?;

        debug!(
            path = %path.display(),
            num_samples,
            sample_interval,
            num_traces,
            "opened SEG-Y file"
        );
        Ok(Self {
            path,
            file: Mutex::new(file),
            text_header,
            binary_header,
            num_samples,
            sample_interval,
            trace_record_size: record,
            num_traces,
            indexes: HashMap::new(),
        })
    }

    /// Path the reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The opaque 3200-byte text header.
    pub fn text_header(&self) -> &[u8] {
        &self.text_header
    }

    /// The 400-byte binary header.
    pub fn binary_header(&self) -> &[u8] {
        &self.binary_header
    }

    /// Samples per trace (`N`).
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Sample interval in microseconds.
    pub fn sample_interval(&self) -> i32 {
        self.sample_interval
    }

    /// Bytes per trace record, `240 + 4N`.
    pub fn trace_record_size(&self) -> usize {
        self.trace_record_size
    }

    /// Number of trace records, derived from the file size.
    pub fn num_traces(&self) -> TraceId {
        self.num_traces
    }

    /// Reads a named field from the binary header.
    pub fn binary_header_value(&self, name: &str) -> Result<HeaderValue, SegyError> {
        read_field(&self.binary_header, binary_field(name)?)
    }

    /// Reads a named field from a trace header buffer.
    pub fn get_header_field(&self, header: &[u8], name: &str) -> Result<HeaderValue, SegyError> {
        trace_header_value(header, name)
    }

    /// Reads a named field from the header of trace `index`.
    pub fn header_value(&self, index: TraceId, name: &str) -> Result<HeaderValue, SegyError> {
        trace_header_value(&self.get_trace_header(index)?, name)
    }

    fn record_offset(&self, index: TraceId) -> Result<u64, SegyError> {
        if index >= self.num_traces {
            return Err(SegyError::TraceOutOfRange {
                index: u64::from(index),
                count: u64::from(self.num_traces),
            });
        }
        Ok(DATA_OFFSET + u64::from(index) * self.trace_record_size as u64)
    }

    fn read_at(&self, file: &mut File, offset: u64, buf: &mut [u8]) -> Result<(), SegyError> {
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(buf))
            .map_err(|e| SegyError::io(&self.path, e))
    }

    fn lock_file(&self) -> std::sync::MutexGuard<'_, File> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The raw 240-byte header of trace `index`.
    ///
    /// # Errors
    ///
    /// [`SegyError::TraceOutOfRange`] past the last trace.
    pub fn get_trace_header(&self, index: TraceId) -> Result<Vec<u8>, SegyError> {
        let offset = self.record_offset(index)?;
        let mut header = vec![0u8; TRACE_HEADER_LEN];
        self.read_at(&mut self.lock_file(), offset, &mut header)?;
        Ok(header)
    }

    /// The decoded samples of trace `index`.
    ///
    /// # Errors
    ///
    /// [`SegyError::TraceOutOfRange`] past the last trace.
    pub fn get_trace(&self, index: TraceId) -> Result<Vec<f32>, SegyError> {
        let offset = self.record_offset(index)? + TRACE_HEADER_LEN as u64;
        let mut raw = vec![0u8; self.trace_record_size - TRACE_HEADER_LEN];
        self.read_at(&mut self.lock_file(), offset, &mut raw)?;
        Ok(decode_samples(&raw))
    }

    /// Streams the headers of traces in `range` through `visit`, in order.
    ///
    /// Uses a private buffered handle, so concurrent calls do not contend on
    /// the reader's random-access handle.
    pub(crate) fn for_each_header_in(
        &self,
        range: Range<TraceId>,
        mut visit: impl FnMut(TraceId, &[u8]) -> Result<(), SegyError>,
    ) -> Result<(), SegyError> {
        if range.is_empty() {
            return Ok(());
        }
        let start = self.record_offset(range.start)?;
        let io = |e| SegyError::io(&self.path, e);
        let mut file = File::open(&self.path).map_err(io)?;
        file.seek(SeekFrom::Start(start)).map_err(io)?;
        let mut stream = BufReader::with_capacity(SCAN_BUFFER, file);
        let skip = (self.trace_record_size - TRACE_HEADER_LEN) as i64;
        let mut header = [0u8; TRACE_HEADER_LEN];
        for id in range {
            stream.read_exact(&mut header).map_err(io)?;
            visit(id, &header)?;
            stream.seek_relative(skip).map_err(io)?;
        }
        Ok(())
    }

    /// One sequential pass over every trace header, in file order.
    pub fn scan_headers(
        &self,
        visit: impl FnMut(TraceId, &[u8]) -> Result<(), SegyError>,
    ) -> Result<(), SegyError> {
        self.for_each_header_in(0..self.num_traces, visit)
    }

    /// Loads or builds `index` against this file and attaches it, replacing
    /// any index with the same name.
    pub fn build_index(
        &mut self,
        mut index: TraceIndex,
        progress: Option<&dyn Progress>,
    ) -> Result<BuildOutcome, SegyError> {
        let outcome = index.ensure_built(self, progress)?;
        self.attach_index(index);
        Ok(outcome)
    }

    /// Attaches `index` under its name and returns the one it replaced.
    pub fn attach_index(&mut self, index: TraceIndex) -> Option<TraceIndex> {
        self.indexes.insert(index.name().to_owned(), index)
    }

    /// Forces a fresh scan of the attached index `name`.
    ///
    /// # Errors
    ///
    /// [`SegyError::UnknownIndex`] if nothing is attached under `name`. On a
    /// failed rebuild the index stays attached in its previous state.
    pub fn rebuild_index(
        &mut self,
        name: &str,
        progress: Option<&dyn Progress>,
    ) -> Result<(), SegyError> {
        let mut index = self
            .indexes
            .remove(name)
            .ok_or_else(|| SegyError::UnknownIndex(name.to_owned()))?;
        let result = index.rebuild(self, progress);
        self.attach_index(index);
        result
    }

    /// The attached index called `name`.
    pub fn index(&self, name: &str) -> Result<&TraceIndex, SegyError> {
        self.indexes
            .get(name)
            .ok_or_else(|| SegyError::UnknownIndex(name.to_owned()))
    }

    fn resolve(&self, index_name: &str, query: &Query) -> Result<Vec<TraceId>, SegyError> {
        let mut ids = self.index(index_name)?.find(query)?;
        ids.sort_unstable();
        Ok(ids)
    }

    fn read_records(
        &self,
        ids: &[TraceId],
        mut visit: impl FnMut(&[u8], &[u8]),
    ) -> Result<(), SegyError> {
        let mut record = vec![0u8; self.trace_record_size];
        let mut file = self.lock_file();
        for &id in ids {
            let offset = self.record_offset(id)?;
            self.read_at(&mut file, offset, &mut record)?;
            let (header, samples) = record.split_at(TRACE_HEADER_LEN);
            visit(header, samples);
        }
        Ok(())
    }

    /// Samples of every trace matching `query` on index `index_name`,
    /// ascending by trace index.
    pub fn get_gather(&self, index_name: &str, query: &Query) -> Result<Vec<Vec<f32>>, SegyError> {
        let ids = self.resolve(index_name, query)?;
        let mut traces = Vec::with_capacity(ids.len());
        self.read_records(&ids, |_, samples| traces.push(decode_samples(samples)))?;
        Ok(traces)
    }

    /// Headers of every trace matching `query`, ascending by trace index.
    pub fn get_gather_headers(
        &self,
        index_name: &str,
        query: &Query,
    ) -> Result<Vec<Vec<u8>>, SegyError> {
        let ids = self.resolve(index_name, query)?;
        let mut headers = Vec::with_capacity(ids.len());
        self.read_records(&ids, |header, _| headers.push(header.to_vec()))?;
        Ok(headers)
    }

    /// Headers and samples of every trace matching `query`, read in one pass.
    pub fn get_gather_and_headers(
        &self,
        index_name: &str,
        query: &Query,
    ) -> Result<Gather, SegyError> {
        let indices = self.resolve(index_name, query)?;
        let mut headers = Vec::with_capacity(indices.len());
        let mut traces = Vec::with_capacity(indices.len());
        self.read_records(&indices, |header, samples| {
            headers.push(header.to_vec());
            traces.push(decode_samples(samples));
        })?;
        Ok(Gather {
            indices,
            headers,
            traces,
        })
    }
}
