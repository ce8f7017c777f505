// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use sgy_core::schema::{binary_field, trace_field, write_field};
use sgy_core::{TraceWriter, WriterTemplate, BINARY_HEADER_LEN, TEXT_HEADER_LEN, TRACE_HEADER_LEN};

pub const NUM_SAMPLES: usize = 64;
pub const SAMPLE_INTERVAL_US: i32 = 4000;
pub const CDPS: [i32; 3] = [10, 11, 12];
pub const OFFSETS: [i32; 4] = [0, 100, 200, 300];

fn template() -> WriterTemplate {
    let mut binary_header = vec![0u8; BINARY_HEADER_LEN];
    write_field(
        &mut binary_header,
        binary_field("SamplesPerTrace").unwrap(),
        NUM_SAMPLES as i32,
    )
    .unwrap();
    write_field(
        &mut binary_header,
        binary_field("SampleInterval").unwrap(),
        SAMPLE_INTERVAL_US,
    )
    .unwrap();
    WriterTemplate {
        text_header: vec![b' '; TEXT_HEADER_LEN],
        binary_header,
        num_samples: NUM_SAMPLES,
        sample_interval: SAMPLE_INTERVAL_US,
    }
}

fn header(cdp: i32, offset: i32) -> Vec<u8> {
    let mut header = vec![0u8; TRACE_HEADER_LEN];
    write_field(&mut header, trace_field("CDP").unwrap(), cdp).unwrap();
    write_field(&mut header, trace_field("offset").unwrap(), offset).unwrap();
    header
}

/// Gathers for `CDPS` x `OFFSETS`, interleaved by offset so the CDPs are not
/// contiguous in the file.
pub fn write_input(dir: &Path) -> PathBuf {
    let path = dir.join("input.sgy");
    let mut writer = TraceWriter::create(&path, template()).unwrap();
    for &offset in &OFFSETS {
        for &cdp in &CDPS {
            let samples: Vec<f32> = (0..NUM_SAMPLES).map(|i| (i % 7) as f32 + cdp as f32).collect();
            writer.write_trace(&header(cdp, offset), &samples).unwrap();
        }
    }
    writer.finish().unwrap();
    path
}

/// A velocity SEG-Y file with one constant-velocity trace for `cdp`.
pub fn write_velocity_segy(dir: &Path, cdp: i32, velocity: f32) -> PathBuf {
    let path = dir.join("velocity.sgy");
    let mut writer = TraceWriter::create(&path, template()).unwrap();
    writer
        .write_trace(&header(cdp, 0), &vec![velocity; NUM_SAMPLES])
        .unwrap();
    writer.finish().unwrap();
    path
}

pub fn write_velocity_table(dir: &Path) -> PathBuf {
    let path = dir.join("velocity.txt");
    std::fs::write(&path, "CDP TIME VEL\n10 0 1500\n10 250 2500\n12 0 1800\n").unwrap();
    path
}

pub fn write_config(dir: &Path, input: &Path, output: &Path, velocity: &Path) -> PathBuf {
    let path = dir.join("job.cfg");
    let text = format!(
        "# test job\ninput_file={}\noutput_file={}\nvelocity_file={}\nnmo_stretch_muting_percent=40\nnum_threads=2\n",
        input.display(),
        output.display(),
        velocity.display()
    );
    std::fs::write(&path, text).unwrap();
    path
}
