// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Closed field schema for the binary header and the trace header.
//!
//! Both tables are `static` slices: they are never built at runtime and can
//! not be extended. Offsets are relative to the start of the header they
//! describe (byte 3200 of the file for the binary header, the start of the
//! trace record for the trace header). Every field is a signed big-endian
//! integer of width 2 or 4.

use crate::codec::{read_i16_be, read_i32_be, write_i16_be, write_i32_be};
use crate::SegyError;

/// Width of a header field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldWidth {
    /// Signed 16-bit.
    I16,
    /// Signed 32-bit.
    I32,
}

impl FieldWidth {
    /// Width in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            Self::I16 => 2,
            Self::I32 => 4,
        }
    }
}

/// Location and width of a named header field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    /// Schema name.
    pub name: &'static str,
    /// Byte offset inside the header.
    pub offset: usize,
    /// Integer width.
    pub width: FieldWidth,
}

/// Decoded header field value; the variant follows the field width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeaderValue {
    /// Value of a 2-byte field.
    I16(i16),
    /// Value of a 4-byte field.
    I32(i32),
}

impl HeaderValue {
    /// Widens the value to `i32`.
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::I16(v) => v as i32,
            Self::I32(v) => v,
        }
    }
}

impl From<HeaderValue> for i32 {
    fn from(value: HeaderValue) -> Self {
        value.as_i32()
    }
}

const fn f(name: &'static str, offset: usize, width: FieldWidth) -> FieldSpec {
    FieldSpec {
        name,
        offset,
        width,
    }
}

use FieldWidth::{I16, I32};

/// Binary header fields (offsets relative to file byte 3200).
pub static BINARY_HEADER_FIELDS: &[FieldSpec] = &[
    f("JobID", 0, I32),
    f("LineNumber", 4, I32),
    f("ReelNumber", 8, I32),
    f("DataTracesPerEnsemble", 12, I16),
    f("AuxiliaryTracesPerEnsemble", 14, I16),
    f("SampleInterval", 16, I16),
    f("SampleIntervalOriginal", 18, I16),
    f("SamplesPerTrace", 20, I16),
    f("SamplesPerTraceOriginal", 22, I16),
    f("DataSampleFormat", 24, I16),
    f("EnsembleFold", 26, I16),
    f("TraceSorting", 28, I16),
    f("VerticalSumCode", 30, I16),
    f("SweepFrequencyStart", 32, I16),
    f("SweepFrequencyEnd", 34, I16),
    f("SweepLength", 36, I16),
    f("SweepType", 38, I16),
    f("SweepChannel", 40, I16),
    f("SweepTaperLengthStart", 42, I16),
    f("SweepTaperLengthEnd", 44, I16),
    f("TaperType", 46, I16),
    f("CorrelatedDataTraces", 48, I16),
    f("BinaryGainRecovered", 50, I16),
    f("AmplitudeRecoveryMethod", 52, I16),
    f("MeasurementSystem", 54, I16),
    f("ImpulseSignalPolarity", 56, I16),
    f("VibratoryPolarityCode", 58, I16),
    f("SegyFormatRevisionNumber", 300, I16),
    f("FixedLengthTraceFlag", 302, I16),
    f("NumberOfExtTextualHeaders", 304, I16),
];

/// Trace header fields (offsets relative to the start of the trace record).
pub static TRACE_HEADER_FIELDS: &[FieldSpec] = &[
    f("TRACE_SEQUENCE_LINE", 0, I32),
    f("TRACE_SEQUENCE_FILE", 4, I32),
    f("FieldRecord", 8, I32),
    f("TraceNumber", 12, I32),
    f("EnergySourcePoint", 16, I32),
    f("CDP", 20, I32),
    f("CDP_TRACE", 24, I32),
    f("TraceIdentificationCode", 28, I16),
    f("NSummedTraces", 30, I16),
    f("NStackedTraces", 32, I16),
    f("DataUse", 34, I16),
    f("offset", 36, I32),
    f("ReceiverGroupElevation", 40, I32),
    f("SourceSurfaceElevation", 44, I32),
    f("SourceDepth", 48, I32),
    f("ReceiverDatumElevation", 52, I32),
    f("SourceDatumElevation", 56, I32),
    f("SourceWaterDepth", 60, I32),
    f("GroupWaterDepth", 64, I32),
    f("ElevationScalar", 68, I16),
    f("SourceGroupScalar", 70, I16),
    f("SourceX", 72, I32),
    f("SourceY", 76, I32),
    f("GroupX", 80, I32),
    f("GroupY", 84, I32),
    f("CoordinateUnits", 88, I16),
    f("WeatheringVelocity", 90, I16),
    f("SubWeatheringVelocity", 92, I16),
    f("SourceUpholeTime", 94, I16),
    f("GroupUpholeTime", 96, I16),
    f("SourceStaticCorrection", 98, I16),
    f("GroupStaticCorrection", 100, I16),
    f("TotalStaticApplied", 102, I16),
    f("LagTimeA", 104, I16),
    f("LagTimeB", 106, I16),
    f("DelayRecordingTime", 108, I16),
    f("MuteTimeStart", 110, I16),
    f("MuteTimeEND", 112, I16),
    f("TRACE_SAMPLE_COUNT", 114, I16),
    f("TRACE_SAMPLE_INTERVAL", 116, I16),
    f("GainType", 118, I16),
    f("InstrumentGainConstant", 120, I16),
    f("InstrumentInitialGain", 122, I16),
    f("Correlated", 124, I16),
    f("SweepFrequencyStart", 126, I16),
    f("SweepFrequencyEnd", 128, I16),
    f("SweepLength", 130, I16),
    f("SweepType", 132, I16),
    f("SweepTraceTaperLengthStart", 134, I16),
    f("SweepTraceTaperLengthEnd", 136, I16),
    f("TaperType", 138, I16),
    f("AliasFilterFrequency", 140, I16),
    f("AliasFilterSlope", 142, I16),
    f("NotchFilterFrequency", 144, I16),
    f("NotchFilterSlope", 146, I16),
    f("LowCutFrequency", 148, I16),
    f("HighCutFrequency", 150, I16),
    f("LowCutSlope", 152, I16),
    f("HighCutSlope", 154, I16),
    f("YearDataRecorded", 156, I16),
    f("DayOfYear", 158, I16),
    f("HourOfDay", 160, I16),
    f("MinuteOfHour", 162, I16),
    f("SecondOfMinute", 164, I16),
    f("TimeBaseCode", 166, I16),
    f("TraceWeightingFactor", 168, I16),
    f("GeophoneGroupNumberRoll1", 170, I16),
    f("GeophoneGroupNumberFirstTraceOrigField", 172, I16),
    f("GeophoneGroupNumberLastTraceOrigField", 174, I16),
    f("GapSize", 176, I16),
    f("OverTravel", 178, I16),
    f("CDP_X", 180, I32),
    f("CDP_Y", 184, I32),
    f("INLINE_3D", 188, I32),
    f("CROSSLINE_3D", 192, I32),
    f("ShotPoint", 196, I32),
    f("ShotPointScalar", 200, I16),
    f("TraceValueMeasurementUnit", 202, I16),
    f("TransductionConstantMantissa", 204, I32),
    f("TransductionConstantPower", 208, I16),
    f("TransductionUnit", 210, I16),
    f("TraceIdentifier", 212, I16),
    f("ScalarTraceHeader", 214, I16),
    f("SourceType", 216, I16),
    f("SourceEnergyDirectionMantissa", 218, I32),
    f("SourceEnergyDirectionExponent", 222, I16),
    f("SourceMeasurementMantissa", 224, I32),
    f("SourceMeasurementExponent", 228, I16),
    f("SourceMeasurementUnit", 230, I16),
];

fn lookup(
    table: &'static [FieldSpec],
    table_name: &'static str,
    name: &str,
) -> Result<FieldSpec, SegyError> {
    table
        .iter()
        .find(|spec| spec.name == name)
        .copied()
        .ok_or_else(|| SegyError::SchemaLookup {
            table: table_name,
            name: name.to_owned(),
        })
}

/// Resolves a binary header field by name.
pub fn binary_field(name: &str) -> Result<FieldSpec, SegyError> {
    lookup(BINARY_HEADER_FIELDS, "binary", name)
}

/// Resolves a trace header field by name.
pub fn trace_field(name: &str) -> Result<FieldSpec, SegyError> {
    lookup(TRACE_HEADER_FIELDS, "trace", name)
}

/// Reads a field out of a header buffer.
pub fn read_field(header: &[u8], spec: FieldSpec) -> Result<HeaderValue, SegyError> {
    let value = match spec.width {
        FieldWidth::I16 => read_i16_be(header, spec.offset).map(HeaderValue::I16),
        FieldWidth::I32 => read_i32_be(header, spec.offset).map(HeaderValue::I32),
    };
    value.ok_or_else(|| {
        SegyError::Argument(format!(
            "header of {} bytes is too short for field `{}` at offset {}",
            header.len(),
            spec.name,
            spec.offset
        ))
    })
}

/// Stores `value` into a field of a header buffer.
///
/// Values that do not fit a 2-byte field are rejected rather than truncated.
pub fn write_field(header: &mut [u8], spec: FieldSpec, value: i32) -> Result<(), SegyError> {
    let len = header.len();
    let written = match spec.width {
        FieldWidth::I16 => {
            let narrow = i16::try_from(value).map_err(|_| {
                SegyError::Argument(format!(
                    "value {value} does not fit 2-byte field `{}`",
                    spec.name
                ))
            })?;
            write_i16_be(header, spec.offset, narrow)
        }
        FieldWidth::I32 => write_i32_be(header, spec.offset, value),
    };
    written.ok_or_else(|| {
        SegyError::Argument(format!(
            "header of {len} bytes is too short for field `{}` at offset {}",
            spec.name, spec.offset
        ))
    })
}

/// Looks up `name` in the trace schema and reads it from `header`.
pub fn trace_header_value(header: &[u8], name: &str) -> Result<HeaderValue, SegyError> {
    read_field(header, trace_field(name)?)
}

/// Looks up `name` in the binary schema and reads it from `header`.
pub fn binary_header_value(header: &[u8], name: &str) -> Result<HeaderValue, SegyError> {
    read_field(header, binary_field(name)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BINARY_HEADER_LEN, TRACE_HEADER_LEN};

    #[test]
    fn tables_fit_their_headers_without_overlap() {
        for (table, len) in [
            (BINARY_HEADER_FIELDS, BINARY_HEADER_LEN),
            (TRACE_HEADER_FIELDS, TRACE_HEADER_LEN),
        ] {
            let mut taken = vec![false; len];
            for spec in table {
                let end = spec.offset + spec.width.bytes();
                assert!(end <= len, "{} overruns header", spec.name);
                for slot in &mut taken[spec.offset..end] {
                    assert!(!*slot, "{} overlaps another field", spec.name);
                    *slot = true;
                }
            }
        }
    }

    #[test]
    fn names_are_unique() {
        for table in [BINARY_HEADER_FIELDS, TRACE_HEADER_FIELDS] {
            let mut names: Vec<_> = table.iter().map(|s| s.name).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), table.len());
        }
    }

    #[test]
    fn unknown_names_fail_fast() {
        let err = trace_field("cdp").unwrap_err();
        assert!(matches!(err, SegyError::SchemaLookup { table: "trace", .. }));
        assert!(binary_field("CDP").is_err());
    }

    #[test]
    fn width_selects_value_type() {
        let mut header = vec![0u8; TRACE_HEADER_LEN];
        write_field(&mut header, trace_field("CDP").unwrap(), -70_000).unwrap();
        write_field(&mut header, trace_field("TRACE_SAMPLE_COUNT").unwrap(), 1500).unwrap();
        assert_eq!(
            trace_header_value(&header, "CDP").unwrap(),
            HeaderValue::I32(-70_000)
        );
        assert_eq!(
            trace_header_value(&header, "TRACE_SAMPLE_COUNT").unwrap(),
            HeaderValue::I16(1500)
        );
        assert_eq!(&header[20..24], &(-70_000i32).to_be_bytes());
    }

    #[test]
    fn narrow_fields_reject_wide_values() {
        let mut header = vec![0u8; BINARY_HEADER_LEN];
        let spec = binary_field("SamplesPerTrace").unwrap();
        assert!(matches!(
            write_field(&mut header, spec, 40_000),
            Err(SegyError::Argument(_))
        ));
        assert!(header.iter().all(|&b| b == 0));
    }

    #[test]
    fn short_buffers_are_argument_errors() {
        let header = [0u8; 10];
        assert!(matches!(
            trace_header_value(&header, "offset"),
            Err(SegyError::Argument(_))
        ));
    }
}
