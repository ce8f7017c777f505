// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Normal-moveout correction.
//!
//! For output time `t` on a trace at offset `x`, the reflection arrives at
//! `t_nmo = sqrt(t² + x²/v(t)²)`. The corrected sample at `t` is read from
//! the input near `t_nmo` with a short windowed-sinc kernel centred on the
//! nearest sample. Samples stretched past the mute threshold are zeroed, and
//! once `t_nmo` runs off the end of the trace the remainder is zero.

use std::f32::consts::PI;
use std::num::NonZeroUsize;

use tracing::debug;

use crate::NmoError;

/// Half-width of the interpolation kernel, in samples.
pub const SINC_HALF_WINDOW: usize = 4;
const SINC_WINDOW: usize = 2 * SINC_HALF_WINDOW + 1;
const MIN_VELOCITY: f32 = 1e-12;

/// Correction parameters shared by every trace of a gather.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NmoParams {
    /// Sample interval in seconds.
    pub dt: f32,
    /// Samples whose stretch `(1 - t/t_nmo) * 100` exceeds this are zeroed.
    pub stretch_mute_percent: f32,
    /// Worker threads; 0 uses the available parallelism.
    pub workers: usize,
}

impl NmoParams {
    /// Parameters using every available core.
    pub fn new(dt: f32, stretch_mute_percent: f32) -> Self {
        Self {
            dt,
            stretch_mute_percent,
            workers: 0,
        }
    }

    /// Sets the worker count; 0 uses the available parallelism.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

fn sinc_weights() -> [f32; SINC_WINDOW] {
    let mut weights = [0.0; SINC_WINDOW];
    for (k, w) in weights.iter_mut().enumerate() {
        let x = k as f32 - SINC_HALF_WINDOW as f32;
        *w = if x == 0.0 { 1.0 } else { (PI * x).sin() / (PI * x) };
    }
    weights
}

fn correct_trace(
    trace: &[f32],
    offset: f32,
    velocities: &[f32],
    params: NmoParams,
    weights: &[f32; SINC_WINDOW],
    out: &mut [f32],
) {
    let n = trace.len();
    let dt = params.dt;
    for j in 0..n {
        let t = j as f32 * dt;
        let mut v = velocities[j];
        if v == 0.0 {
            v = MIN_VELOCITY;
        }
        let t_nmo = (t * t + (offset * offset) / (v * v)).sqrt();
        let k = (t_nmo / dt).round();
        if k.is_nan() || k >= n as f32 {
            out[j..].fill(0.0);
            return;
        }
        let k = k as usize;

        let stretch = if t_nmo > 0.0 { (1.0 - t / t_nmo) * 100.0 } else { 0.0 };
        if stretch > params.stretch_mute_percent {
            out[j] = 0.0;
            continue;
        }

        out[j] = if k < SINC_HALF_WINDOW || k + SINC_HALF_WINDOW >= n {
            trace[k]
        } else {
            trace[k - SINC_HALF_WINDOW..=k + SINC_HALF_WINDOW]
                .iter()
                .zip(weights)
                .map(|(s, w)| s * w)
                .sum()
        };
    }
}

fn resolve_workers(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Applies NMO correction to every trace of `gather`.
///
/// `offsets[i]` is the source-receiver offset of `gather[i]`; `velocities`
/// holds one velocity per sample. Traces are split across scoped worker
/// threads; the result keeps input order.
///
/// # Errors
///
/// [`NmoError::Shape`] if `offsets` does not match the trace count, traces
/// differ in length, `velocities` does not match the sample count, or `dt`
/// is not positive.
///
/// # Panics
///
/// Re-raises a worker thread's panic on the calling thread.
pub fn correct_gather(
    gather: &[Vec<f32>],
    offsets: &[f32],
    velocities: &[f32],
    params: NmoParams,
) -> Result<Vec<Vec<f32>>, NmoError> {
    let Some(first) = gather.first() else {
        return Ok(Vec::new());
    };
    let n = first.len();
    if offsets.len() != gather.len() {
        return Err(NmoError::Shape(format!(
            "{} offsets for {} traces",
            offsets.len(),
            gather.len()
        )));
    }
    if let Some(bad) = gather.iter().position(|t| t.len() != n) {
        return Err(NmoError::Shape(format!(
            "trace {bad} has {} samples, trace 0 has {n}",
            gather[bad].len()
        )));
    }
    if velocities.len() != n {
        return Err(NmoError::Shape(format!(
            "{} velocities for {n} samples",
            velocities.len()
        )));
    }
    if params.dt.is_nan() || params.dt <= 0.0 {
        return Err(NmoError::Shape(format!(
            "sample interval {} is not positive",
            params.dt
        )));
    }

    let weights = sinc_weights();
    let workers = resolve_workers(params.workers).min(gather.len());
    let chunk = gather.len().div_ceil(workers);
    debug!(traces = gather.len(), samples = n, workers, "NMO correcting gather");

    let mut corrected = vec![vec![0.0f32; n]; gather.len()];
    std::thread::scope(|s| {
        let weights = &weights;
        let handles: Vec<_> = corrected
            .chunks_mut(chunk)
            .zip(gather.chunks(chunk))
            .zip(offsets.chunks(chunk))
            .map(|((out, traces), offs)| {
                s.spawn(move || {
                    for ((o, trace), &offset) in out.iter_mut().zip(traces).zip(offs) {
                        correct_trace(trace, offset, velocities, params, weights, o);
                    }
                })
            })
            .collect();

        for h in handles {
            if let Err(e) = h.join() {
                std::panic::resume_unwind(e);
            }
        }
    });
    Ok(corrected)
}
