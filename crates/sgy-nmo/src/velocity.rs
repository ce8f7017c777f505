// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Velocity functions per CDP and their interpolation onto a sample axis.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::NmoError;

/// Guards the linear time interpolation against repeated picks.
const TIME_EPSILON: f32 = 1e-6;

/// One velocity per output sample, keyed by CDP.
pub type VelocityFunctions = BTreeMap<i32, Vec<f32>>;

/// Sparse velocity picks: per CDP, `(time_s, velocity)` pairs ascending in time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VelocityTable {
    functions: BTreeMap<i32, Vec<(f32, f32)>>,
}

impl VelocityTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one pick. Picks at equal times keep insertion order.
    pub fn insert(&mut self, cdp: i32, time_s: f32, velocity: f32) {
        let picks = self.functions.entry(cdp).or_default();
        let at = picks.partition_point(|(t, _)| *t <= time_s);
        picks.insert(at, (time_s, velocity));
    }

    /// Parses whitespace-separated `cdp time_ms velocity` lines.
    ///
    /// The first line mentioning `CDP`/`cdp` is taken as a column header and
    /// skipped. Blank lines are ignored; lines that do not parse are skipped
    /// with a warning.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::new();
        let mut header_skipped = false;
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !header_skipped && (line.contains("CDP") || line.contains("cdp")) {
                header_skipped = true;
                continue;
            }
            let mut cols = line.split_whitespace();
            let cdp = cols.next().and_then(|c| c.parse::<i32>().ok());
            let time_ms = cols.next().and_then(|c| c.parse::<f32>().ok());
            let velocity = cols.next().and_then(|c| c.parse::<f32>().ok());
            match (cdp, time_ms, velocity) {
                (Some(cdp), Some(time_ms), Some(velocity)) => {
                    table.insert(cdp, time_ms / 1000.0, velocity);
                }
                _ => warn!(line = number + 1, text = line, "skipping unparsable velocity line"),
            }
        }
        debug!(cdps = table.len(), "parsed velocity table");
        table
    }

    /// Reads and parses a velocity table file.
    ///
    /// # Errors
    ///
    /// [`NmoError::Io`] if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NmoError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| NmoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Builds a table from dense velocity traces: sample `i` of each trace
    /// is a pick at time `i * dt`. Empty traces are ignored.
    pub fn from_traces<I, T>(traces: I, dt: f32) -> Self
    where
        I: IntoIterator<Item = (i32, T)>,
        T: AsRef<[f32]>,
    {
        let mut functions = BTreeMap::new();
        for (cdp, samples) in traces {
            let samples = samples.as_ref();
            if samples.is_empty() {
                continue;
            }
            let picks = samples
                .iter()
                .enumerate()
                .map(|(i, v)| (i as f32 * dt, *v))
                .collect();
            functions.insert(cdp, picks);
        }
        Self { functions }
    }

    /// Number of CDPs with picks.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if the table has no picks.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Picks for `cdp`, ascending in time.
    pub fn picks(&self, cdp: i32) -> Option<&[(f32, f32)]> {
        self.functions.get(&cdp).map(Vec::as_slice)
    }

    fn nearest(&self, cdp: i32) -> Option<&[(f32, f32)]> {
        let below = self.functions.range(..cdp).next_back();
        let above = self.functions.range(cdp..).next();
        let chosen = match (below, above) {
            (Some(b), Some(a)) => {
                if i64::from(cdp) - i64::from(*b.0) < i64::from(*a.0) - i64::from(cdp) {
                    b
                } else {
                    a
                }
            }
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => return None,
        };
        Some(chosen.1)
    }

    /// Samples a velocity function of `n` values at spacing `dt` (seconds)
    /// for each CDP in `cdps`.
    ///
    /// Each CDP uses the nearest CDP with picks (ties go to the larger one).
    /// Between picks velocity is linear in time; outside them it is held
    /// constant.
    ///
    /// # Errors
    ///
    /// [`NmoError::EmptyVelocityTable`] if there are no picks at all.
    pub fn interpolate(
        &self,
        cdps: &[i32],
        n: usize,
        dt: f32,
    ) -> Result<VelocityFunctions, NmoError> {
        if self.is_empty() {
            return Err(NmoError::EmptyVelocityTable);
        }
        let mut out = VelocityFunctions::new();
        for &cdp in cdps {
            let Some(picks) = self.nearest(cdp) else {
                continue;
            };
            out.insert(cdp, sample_function(picks, n, dt));
        }
        Ok(out)
    }
}

fn sample_function(picks: &[(f32, f32)], n: usize, dt: f32) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let t = i as f32 * dt;
            let upper = picks.partition_point(|(tk, _)| *tk < t);
            match (upper.checked_sub(1).map(|l| picks[l]), picks.get(upper)) {
                (Some((t1, v1)), Some(&(t2, v2))) => {
                    let alpha = (t - t1) / (t2 - t1 + TIME_EPSILON);
                    v1 + alpha * (v2 - v1)
                }
                (Some((_, v)), None) | (None, Some(&(_, v))) => v,
                (None, None) => 0.0,
            }
        })
        .collect()
}
