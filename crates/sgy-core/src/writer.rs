// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sequential SEG-Y writer.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codec::encode_samples_into;
use crate::schema::{binary_field, write_field, FieldWidth};
use crate::{
    SegyError, TraceReader, BINARY_HEADER_LEN, TEXT_HEADER_LEN, TRACE_HEADER_LEN,
};

/// File-level headers and geometry for a new file.
#[derive(Clone, Debug)]
pub struct WriterTemplate {
    /// 3200-byte text header, copied verbatim.
    pub text_header: Vec<u8>,
    /// 400-byte binary header, copied verbatim apart from the trace count.
    pub binary_header: Vec<u8>,
    /// Samples per trace.
    pub num_samples: usize,
    /// Sample interval in microseconds.
    pub sample_interval: i32,
}

impl WriterTemplate {
    /// Template carrying the headers and geometry of `reader`.
    pub fn from_reader(reader: &TraceReader) -> Self {
        Self {
            text_header: reader.text_header().to_vec(),
            binary_header: reader.binary_header().to_vec(),
            num_samples: reader.num_samples(),
            sample_interval: reader.sample_interval(),
        }
    }
}

/// Appends trace records after a copied pair of file headers.
///
/// The binary header's trace count is patched on [`finish`](Self::finish)
/// (or on drop). Until then the file is structurally valid but its count
/// field is stale.
#[derive(Debug)]
pub struct TraceWriter {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    binary_header: Vec<u8>,
    num_samples: usize,
    sample_interval: i32,
    written: u64,
    record: Vec<u8>,
}

impl TraceWriter {
    /// Creates `path` with the headers and geometry of `reader`.
    pub fn from_reader(path: impl AsRef<Path>, reader: &TraceReader) -> Result<Self, SegyError> {
        Self::create(path, WriterTemplate::from_reader(reader))
    }

    /// Creates (truncating) `path` and writes both file headers.
    ///
    /// # Errors
    ///
    /// [`SegyError::Argument`] for a template with wrong header sizes or
    /// zero samples, [`SegyError::Io`] if the file cannot be written.
    pub fn create(path: impl AsRef<Path>, template: WriterTemplate) -> Result<Self, SegyError> {
        let path = path.as_ref().to_path_buf();
        if template.text_header.len() != TEXT_HEADER_LEN {
            return Err(SegyError::Argument(format!(
                "text header is {} bytes, expected {TEXT_HEADER_LEN}",
                template.text_header.len()
            )));
        }
        if template.binary_header.len() != BINARY_HEADER_LEN {
            return Err(SegyError::Argument(format!(
                "binary header is {} bytes, expected {BINARY_HEADER_LEN}",
                template.binary_header.len()
            )));
        }
        if template.num_samples == 0 {
            return Err(SegyError::Argument("template has zero samples per trace".into()));
        }

        let file = File::create(&path).map_err(|e| SegyError::io(&path, e))?;
        let mut out = BufWriter::new(file);
        out.write_all(&template.text_header)
            .and_then(|()| out.write_all(&template.binary_header))
            .map_err(|e| SegyError::io(&path, e))?;
        debug!(path = %path.display(), num_samples = template.num_samples, "created SEG-Y file");

        let record = Vec::with_capacity(crate::trace_record_size(template.num_samples));
        Ok(Self {
            path,
            out: Some(out),
            binary_header: template.binary_header,
            num_samples: template.num_samples,
            sample_interval: template.sample_interval,
            written: 0,
            record,
        })
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples per trace every written trace must carry.
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Sample interval in microseconds.
    pub fn sample_interval(&self) -> i32 {
        self.sample_interval
    }

    /// Traces written so far.
    pub fn traces_written(&self) -> u64 {
        self.written
    }

    /// Appends one trace record.
    ///
    /// # Errors
    ///
    /// [`SegyError::Argument`] unless `header` is 240 bytes and `samples`
    /// holds exactly `N` values; nothing is written in that case.
    pub fn write_trace(&mut self, header: &[u8], samples: &[f32]) -> Result<(), SegyError> {
        if header.len() != TRACE_HEADER_LEN {
            return Err(SegyError::Argument(format!(
                "trace header is {} bytes, expected {TRACE_HEADER_LEN}",
                header.len()
            )));
        }
        if samples.len() != self.num_samples {
            return Err(SegyError::Argument(format!(
                "trace has {} samples, expected {}",
                samples.len(),
                self.num_samples
            )));
        }
        let Some(out) = self.out.as_mut() else {
            return Err(SegyError::Argument("writer is already finished".into()));
        };
        self.record.clear();
        self.record.extend_from_slice(header);
        encode_samples_into(samples, &mut self.record);
        out.write_all(&self.record)
            .map_err(|e| SegyError::io(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    /// Writes `headers[i]` with `traces[i]` for each `i`, in order.
    ///
    /// # Errors
    ///
    /// [`SegyError::Argument`] if the two sequences differ in length.
    pub fn write_gather<H, T>(&mut self, headers: &[H], traces: &[T]) -> Result<(), SegyError>
    where
        H: AsRef<[u8]>,
        T: AsRef<[f32]>,
    {
        if headers.len() != traces.len() {
            return Err(SegyError::Argument(format!(
                "{} headers for {} traces",
                headers.len(),
                traces.len()
            )));
        }
        for (header, samples) in headers.iter().zip(traces) {
            self.write_trace(header.as_ref(), samples.as_ref())?;
        }
        Ok(())
    }

    /// Patches the trace count into the binary header, flushes and closes.
    /// Returns the number of traces written.
    pub fn finish(mut self) -> Result<u64, SegyError> {
        self.finalize()?;
        Ok(self.written)
    }

    fn finalize(&mut self) -> Result<(), SegyError> {
        let Some(mut out) = self.out.take() else {
            return Ok(());
        };
        let field = binary_field("DataTracesPerEnsemble")?;
        let limit = match field.width {
            FieldWidth::I16 => i64::from(i16::MAX),
            FieldWidth::I32 => i64::from(i32::MAX),
        };
        let count = i64::try_from(self.written).unwrap_or(i64::MAX);
        if count > limit {
            warn!(
                path = %self.path.display(),
                written = self.written,
                "trace count exceeds the header field, storing its maximum"
            );
        }
        let stored = i32::try_from(count.min(limit)).unwrap_or(i32::MAX);
        write_field(&mut self.binary_header, field, stored)?;

        let patch = &self.binary_header[field.offset..field.offset + field.width.bytes()];
        let at = (TEXT_HEADER_LEN + field.offset) as u64;
        out.seek(SeekFrom::Start(at))
            .and_then(|_| out.write_all(patch))
            .and_then(|()| out.flush())
            .map_err(|e| SegyError::io(&self.path, e))?;
        debug!(path = %self.path.display(), traces = self.written, "finished SEG-Y file");
        Ok(())
    }
}

impl Drop for TraceWriter {
    fn drop(&mut self) {
        if let Err(err) = self.finalize() {
            warn!(path = %self.path.display(), error = %err, "finalizing SEG-Y file on drop failed");
        }
    }
}
