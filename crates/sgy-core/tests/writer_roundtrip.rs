// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Writing traces and reading them back.
#![allow(missing_docs)]

mod common;

use common::{binary_header, text_header, three_trace_file, SynthTrace};
use sgy_core::{SegyError, TraceReader, TraceWriter, WriterTemplate};

fn template(num_samples: usize) -> WriterTemplate {
    WriterTemplate {
        text_header: text_header(),
        binary_header: binary_header(num_samples as i16, 1000),
        num_samples,
        sample_interval: 1000,
    }
}

#[test]
fn copy_preserves_headers_and_samples() {
    let dir = tempfile::tempdir().unwrap();
    let source = TraceReader::open(three_trace_file(dir.path())).unwrap();
    let out_path = dir.path().join("copy.sgy");

    let mut writer = TraceWriter::from_reader(&out_path, &source).unwrap();
    for i in (0..source.num_traces()).rev() {
        writer
            .write_trace(&source.get_trace_header(i).unwrap(), &source.get_trace(i).unwrap())
            .unwrap();
    }
    assert_eq!(writer.finish().unwrap(), 3);

    let copy = TraceReader::open(&out_path).unwrap();
    assert_eq!(copy.text_header(), source.text_header());
    assert_eq!(copy.num_traces(), 3);
    assert_eq!(copy.sample_interval(), 2000);
    assert_eq!(copy.get_trace(0).unwrap(), source.get_trace(2).unwrap());
    assert_eq!(copy.header_value(2, "offset").unwrap().as_i32(), 0);
    assert_eq!(copy.header_value(1, "offset").unwrap().as_i32(), 50);
    assert_eq!(
        copy.binary_header_value("DataTracesPerEnsemble")
            .unwrap()
            .as_i32(),
        3
    );
}

#[test]
fn mismatched_lengths_are_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.sgy");
    let mut writer = TraceWriter::create(&path, template(4)).unwrap();

    assert!(matches!(
        writer.write_trace(&[0u8; 239], &[0.0; 4]),
        Err(SegyError::Argument(_))
    ));
    assert!(matches!(
        writer.write_trace(&[0u8; 240], &[0.0; 5]),
        Err(SegyError::Argument(_))
    ));
    let headers = vec![vec![0u8; 240]; 2];
    let traces = vec![vec![0.0f32; 4]; 1];
    assert!(matches!(
        writer.write_gather(&headers, &traces),
        Err(SegyError::Argument(_))
    ));
    assert_eq!(writer.finish().unwrap(), 0);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 3600);
}

#[test]
fn gather_is_written_in_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gather.sgy");
    let traces: Vec<_> = (0..5)
        .map(|i| SynthTrace::new(7, i * 10, vec![i as f32, -(i as f32)]))
        .collect();
    let headers: Vec<_> = traces.iter().map(SynthTrace::header).collect();
    let samples: Vec<_> = traces.iter().map(|t| t.samples.clone()).collect();

    let mut writer = TraceWriter::create(&path, template(2)).unwrap();
    writer.write_gather(&headers, &samples).unwrap();
    drop(writer);

    let reader = TraceReader::open(&path).unwrap();
    assert_eq!(reader.num_traces(), 5);
    for i in 0..5u32 {
        assert_eq!(reader.header_value(i, "offset").unwrap().as_i32(), i as i32 * 10);
        assert_eq!(reader.get_trace(i).unwrap(), vec![i as f32, -(i as f32)]);
    }
    assert_eq!(
        reader
            .binary_header_value("DataTracesPerEnsemble")
            .unwrap()
            .as_i32(),
        5
    );
}

#[test]
fn template_sizes_are_validated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.sgy");

    let mut short_text = template(4);
    short_text.text_header.pop();
    assert!(matches!(
        TraceWriter::create(&path, short_text),
        Err(SegyError::Argument(_))
    ));

    let mut long_binary = template(4);
    long_binary.binary_header.push(0);
    assert!(matches!(
        TraceWriter::create(&path, long_binary),
        Err(SegyError::Argument(_))
    ));

    assert!(matches!(
        TraceWriter::create(&path, template(0)),
        Err(SegyError::Argument(_))
    ));
    assert!(!path.exists());
}

#[test]
fn create_truncates_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.sgy");
    std::fs::write(&path, vec![1u8; 10_000]).unwrap();
    TraceWriter::create(&path, template(4)).unwrap().finish().unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 3600);
}
