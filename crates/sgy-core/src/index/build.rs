// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Partitioned header scan that produces the contents of a trace index.
//!
//! `0..num_traces` is split into contiguous ranges, one per worker. Each
//! worker owns a private [`GroupMap`] for its range and reads headers through
//! its own file handle, so nothing is shared while scanning. The partials are
//! then folded in partition order: because ranges are contiguous and
//! ascending, appending a later partial's list onto an earlier one keeps every
//! list ascending without a sort.

use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{GroupMap, TraceId};
use crate::progress::{report_every, Progress};
use crate::reader::TraceReader;
use crate::schema::{read_field, FieldSpec};
use crate::SegyError;

const PROGRESS_LABEL: &str = "Indexing traces";

/// Worker count for a request where 0 means "all cores".
pub(crate) fn resolve_workers(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Splits `0..total` into at most `workers` contiguous, non-empty, ascending
/// ranges whose lengths differ by at most one.
pub(crate) fn partition(total: TraceId, workers: usize) -> Vec<Range<TraceId>> {
    if total == 0 {
        return Vec::new();
    }
    let workers = TraceId::try_from(workers.max(1)).unwrap_or(TraceId::MAX).min(total);
    let base = total / workers;
    let extra = total % workers;
    let mut ranges = Vec::with_capacity(workers as usize);
    let mut start = 0;
    for w in 0..workers {
        let len = base + TraceId::from(w < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// Folds per-partition maps, given in partition order, into one.
pub(crate) fn merge_partials(partials: impl IntoIterator<Item = GroupMap>) -> GroupMap {
    let mut merged = GroupMap::new();
    for partial in partials {
        for (key, mut ids) in partial {
            merged.entry(key).or_default().append(&mut ids);
        }
    }
    merged
}

fn scan_range(
    reader: &TraceReader,
    fields: &[FieldSpec],
    range: Range<TraceId>,
    done: &AtomicU64,
    progress: Option<&dyn Progress>,
) -> Result<GroupMap, SegyError> {
    let total = u64::from(reader.num_traces());
    let mut groups = GroupMap::new();
    reader.for_each_header_in(range, |id, header| {
        let key = fields
            .iter()
            .map(|field| read_field(header, *field).map(i32::from))
            .collect::<Result<Vec<_>, _>>()?;
        groups.entry(key).or_default().push(id);
        let current = done.fetch_add(1, Ordering::Relaxed) + 1;
        report_every(progress, PROGRESS_LABEL, current, total);
        Ok(())
    })?;
    Ok(groups)
}

/// Scans every trace header of `reader` on `workers` threads.
///
/// The first failing partition (in partition order) decides the error.
///
/// # Panics
///
/// Re-raises a worker thread's panic on the calling thread.
pub(crate) fn build_groups(
    reader: &TraceReader,
    fields: &[FieldSpec],
    workers: usize,
    progress: Option<&dyn Progress>,
) -> Result<GroupMap, SegyError> {
    let ranges = partition(reader.num_traces(), workers);
    let done = AtomicU64::new(0);

    if ranges.len() <= 1 {
        let partials = ranges
            .into_iter()
            .map(|range| scan_range(reader, fields, range, &done, progress))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(merge_partials(partials));
    }

    let partials = std::thread::scope(|s| {
        let handles: Vec<_> = ranges
            .into_iter()
            .map(|range| {
                let done = &done;
                s.spawn(move || scan_range(reader, fields, range, done, progress))
            })
            .collect();

        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(partial) => partial,
                Err(e) => std::panic::resume_unwind(e),
            })
            .collect::<Result<Vec<_>, _>>()
    })?;
    Ok(merge_partials(partials))
}
