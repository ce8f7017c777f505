// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Progress reporting hook.

/// Observer invoked with `(label, current, total)` during long scans.
///
/// Purely a side channel: omitting it changes nothing about results. Any
/// `Fn(&str, u64, u64) + Sync` closure qualifies.
pub trait Progress: Sync {
    /// Reports that `current` of `total` units of `label` are done.
    fn report(&self, label: &str, current: u64, total: u64);
}

impl<F> Progress for F
where
    F: Fn(&str, u64, u64) + Sync,
{
    fn report(&self, label: &str, current: u64, total: u64) {
        self(label, current, total);
    }
}

/// Reports roughly every 1% of `total`, and always on the last unit.
pub(crate) fn report_every(
    progress: Option<&dyn Progress>,
    label: &str,
    current: u64,
    total: u64,
) {
    let Some(progress) = progress else {
        return;
    };
    let step = (total / 100).max(1);
    if current % step == 0 || current == total {
        progress.report(label, current, total);
    }
}
