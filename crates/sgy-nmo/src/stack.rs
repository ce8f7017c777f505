// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Stacking of corrected gathers.

use crate::NmoError;

/// Per-sample arithmetic mean of `traces`. An empty gather stacks to an
/// empty trace.
///
/// # Errors
///
/// [`NmoError::Shape`] if the traces differ in length.
pub fn stack<T: AsRef<[f32]>>(traces: &[T]) -> Result<Vec<f32>, NmoError> {
    let Some(first) = traces.first() else {
        return Ok(Vec::new());
    };
    let n = first.as_ref().len();
    let mut sum = vec![0.0f32; n];
    for (i, trace) in traces.iter().enumerate() {
        let trace = trace.as_ref();
        if trace.len() != n {
            return Err(NmoError::Shape(format!(
                "trace {i} has {} samples, trace 0 has {n}",
                trace.len()
            )));
        }
        for (acc, s) in sum.iter_mut().zip(trace) {
            *acc += s;
        }
    }
    let scale = 1.0 / traces.len() as f32;
    for acc in &mut sum {
        *acc *= scale;
    }
    Ok(sum)
}
