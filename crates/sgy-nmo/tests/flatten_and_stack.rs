// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A hyperbolic event flattens under the right velocity and stacks coherently.
#![allow(missing_docs)]

use sgy_nmo::{correct_gather, stack, NmoParams, VelocityTable};

const N: usize = 200;
const DT: f32 = 0.004;
const T0: f32 = 0.4;
const VELOCITY: f32 = 2000.0;

fn spike_gather(offsets: &[f32]) -> Vec<Vec<f32>> {
    offsets
        .iter()
        .map(|x| {
            let t = (T0 * T0 + (x * x) / (VELOCITY * VELOCITY)).sqrt();
            let mut trace = vec![0.0; N];
            trace[(t / DT).round() as usize] = 1.0;
            trace
        })
        .collect()
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap()
}

#[test]
fn event_lines_up_at_zero_offset_time() {
    let offsets = [0.0, 200.0, 400.0, 600.0];
    let gather = spike_gather(&offsets);
    let table = VelocityTable::parse(&format!("cdp time vel\n1 0 {VELOCITY}\n1 2000 {VELOCITY}\n"));
    let velocities = table.interpolate(&[1], N, DT).unwrap();

    let corrected =
        correct_gather(&gather, &offsets, &velocities[&1], NmoParams::new(DT, 30.0)).unwrap();
    let t0_sample = (T0 / DT).round() as usize;
    for trace in &corrected {
        assert_eq!(argmax(trace), t0_sample);
    }

    let stacked = stack(&corrected).unwrap();
    assert_eq!(stacked.len(), N);
    assert_eq!(argmax(&stacked), t0_sample);
    assert!((stacked[t0_sample] - 1.0).abs() < 1e-3);
}

#[test]
fn wrong_velocity_smears_the_stack() {
    let offsets = [0.0, 200.0, 400.0, 600.0];
    let gather = spike_gather(&offsets);
    let slow = vec![1200.0; N];
    let corrected = correct_gather(&gather, &offsets, &slow, NmoParams::new(DT, 100.0)).unwrap();
    let stacked = stack(&corrected).unwrap();
    let t0_sample = (T0 / DT).round() as usize;
    assert!(stacked[t0_sample] < 0.5);
}
