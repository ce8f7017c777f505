// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use sgy_core::codec::{write_i16_be, write_i32_be};
use sgy_core::{codec, BINARY_HEADER_LEN, TEXT_HEADER_LEN, TRACE_HEADER_LEN};

/// Byte offsets used to stamp synthetic headers.
pub const CDP_OFFSET: usize = 20;
pub const OFFSET_OFFSET: usize = 36;
pub const INLINE_OFFSET: usize = 188;
pub const SAMPLE_INTERVAL_OFFSET: usize = 16;
pub const SAMPLES_PER_TRACE_OFFSET: usize = 20;

/// One synthetic trace: key header values plus samples.
#[derive(Clone, Debug)]
pub struct SynthTrace {
    pub cdp: i32,
    pub offset: i32,
    pub inline: i32,
    pub samples: Vec<f32>,
}

impl SynthTrace {
    pub fn new(cdp: i32, offset: i32, samples: Vec<f32>) -> Self {
        Self {
            cdp,
            offset,
            inline: 0,
            samples,
        }
    }

    pub fn header(&self) -> Vec<u8> {
        let mut header = vec![0u8; TRACE_HEADER_LEN];
        write_i32_be(&mut header, CDP_OFFSET, self.cdp).unwrap();
        write_i32_be(&mut header, OFFSET_OFFSET, self.offset).unwrap();
        write_i32_be(&mut header, INLINE_OFFSET, self.inline).unwrap();
        header
    }
}

pub fn text_header() -> Vec<u8> {
    let mut text = vec![b' '; TEXT_HEADER_LEN];
    text[..10].copy_from_slice(b"C 1 SYNTH ");
    text
}

pub fn binary_header(num_samples: i16, sample_interval: i16) -> Vec<u8> {
    let mut bin = vec![0u8; BINARY_HEADER_LEN];
    write_i16_be(&mut bin, SAMPLE_INTERVAL_OFFSET, sample_interval).unwrap();
    write_i16_be(&mut bin, SAMPLES_PER_TRACE_OFFSET, num_samples).unwrap();
    bin
}

/// Raw bytes of a complete file.
pub fn file_bytes(num_samples: usize, sample_interval: i16, traces: &[SynthTrace]) -> Vec<u8> {
    let mut bytes = text_header();
    bytes.extend(binary_header(num_samples as i16, sample_interval));
    for trace in traces {
        assert_eq!(trace.samples.len(), num_samples);
        bytes.extend(trace.header());
        codec::encode_samples_into(&trace.samples, &mut bytes);
    }
    bytes
}

pub fn write_file(
    dir: &Path,
    name: &str,
    num_samples: usize,
    sample_interval: i16,
    traces: &[SynthTrace],
) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, file_bytes(num_samples, sample_interval, traces)).unwrap();
    path
}

/// The three-trace file: N=4, Δt=2000µs, (CDP, offset) = (100,0), (100,50), (200,0).
pub fn three_trace_file(dir: &Path) -> PathBuf {
    let traces = vec![
        SynthTrace::new(100, 0, vec![1.0, 2.0, 3.0, 4.0]),
        SynthTrace::new(100, 50, vec![-1.0, -2.0, -3.0, -4.0]),
        SynthTrace::new(200, 0, vec![0.5, 0.25, 0.125, 0.0]),
    ];
    write_file(dir, "three.sgy", 4, 2000, &traces)
}

/// `count` traces cycling through `groups` CDPs, offsets counting up.
pub fn many_trace_file(dir: &Path, count: usize, groups: i32) -> PathBuf {
    let traces: Vec<_> = (0..count)
        .map(|i| {
            let i = i as i32;
            SynthTrace::new(1000 + i % groups, i / groups * 25, vec![i as f32; 2])
        })
        .collect();
    write_file(dir, "many.sgy", 2, 4000, &traces)
}
