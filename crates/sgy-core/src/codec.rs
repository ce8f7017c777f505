// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Stateless translation between raw record bytes and typed values.
//!
//! Integer helpers return `None` when the requested span does not fit inside
//! the buffer; callers turn that into an argument error with context.
//!
//! # IBM float layout
//!
//! ```text
//! bit 31      sign
//! bits 30..24 exponent, base 16, bias 64
//! bits 23..0  mantissa, fraction in [1/16, 1) for normalized values
//! value = (-1)^sign * (mantissa / 2^24) * 16^(exponent - 64)
//! ```

use crate::SAMPLE_LEN;

const SIGN_MASK: u32 = 0x8000_0000;
const EXPONENT_SHIFT: u32 = 24;
const EXPONENT_MASK: u32 = 0x7f;
const MANTISSA_MASK: u32 = 0x00ff_ffff;
const MANTISSA_SCALE: f64 = 16_777_216.0; // 2^24
const EXPONENT_BIAS: i32 = 64;

/// Largest magnitude the encoding can represent, sign bit clear.
pub const IBM_MAX_MAGNITUDE: u32 = 0x7fff_ffff;

fn span<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    buf.get(offset..end)?.try_into().ok()
}

/// Reads a big-endian `u16` at `offset`.
pub fn read_u16_be(buf: &[u8], offset: usize) -> Option<u16> {
    span::<2>(buf, offset).map(u16::from_be_bytes)
}

/// Reads a big-endian `i16` at `offset`.
pub fn read_i16_be(buf: &[u8], offset: usize) -> Option<i16> {
    span::<2>(buf, offset).map(i16::from_be_bytes)
}

/// Reads a big-endian `u32` at `offset`.
pub fn read_u32_be(buf: &[u8], offset: usize) -> Option<u32> {
    span::<4>(buf, offset).map(u32::from_be_bytes)
}

/// Reads a big-endian `i32` at `offset`.
pub fn read_i32_be(buf: &[u8], offset: usize) -> Option<i32> {
    span::<4>(buf, offset).map(i32::from_be_bytes)
}

fn put<const N: usize>(buf: &mut [u8], offset: usize, bytes: [u8; N]) -> Option<()> {
    let end = offset.checked_add(N)?;
    buf.get_mut(offset..end)?.copy_from_slice(&bytes);
    Some(())
}

/// Writes a big-endian `u16` at `offset`. Returns `None` if it does not fit.
pub fn write_u16_be(buf: &mut [u8], offset: usize, value: u16) -> Option<()> {
    put(buf, offset, value.to_be_bytes())
}

/// Writes a big-endian `i16` at `offset`. Returns `None` if it does not fit.
pub fn write_i16_be(buf: &mut [u8], offset: usize, value: i16) -> Option<()> {
    put(buf, offset, value.to_be_bytes())
}

/// Writes a big-endian `u32` at `offset`. Returns `None` if it does not fit.
pub fn write_u32_be(buf: &mut [u8], offset: usize, value: u32) -> Option<()> {
    put(buf, offset, value.to_be_bytes())
}

/// Writes a big-endian `i32` at `offset`. Returns `None` if it does not fit.
pub fn write_i32_be(buf: &mut [u8], offset: usize, value: i32) -> Option<()> {
    put(buf, offset, value.to_be_bytes())
}

/// Decodes one IBM float word (already assembled from big-endian bytes).
///
/// All-zero mantissas decode to `0.0` regardless of exponent; a set sign bit
/// with a zero mantissa gives `-0.0`.
pub fn ibm_to_f32(word: u32) -> f32 {
    let mantissa = word & MANTISSA_MASK;
    if mantissa == 0 {
        return if word & SIGN_MASK == 0 { 0.0 } else { -0.0 };
    }
    let exponent = ((word >> EXPONENT_SHIFT) & EXPONENT_MASK) as i32 - EXPONENT_BIAS;
    let magnitude = f64::from(mantissa) / MANTISSA_SCALE * 16f64.powi(exponent);
    let value = if word & SIGN_MASK == 0 {
        magnitude
    } else {
        -magnitude
    };
    value as f32
}

/// Encodes an IEEE `f32` as an IBM float word.
///
/// Magnitudes above the IBM range saturate to [`IBM_MAX_MAGNITUDE`]; values
/// below the smallest normalized IBM magnitude flush to zero. `NaN` encodes
/// as zero and infinities saturate.
pub fn f32_to_ibm(value: f32) -> u32 {
    if value == 0.0 || value.is_nan() {
        return 0;
    }
    let sign = if value.is_sign_negative() { SIGN_MASK } else { 0 };
    if value.is_infinite() {
        return sign | IBM_MAX_MAGNITUDE;
    }

    let mut fraction = f64::from(value).abs();
    let mut exponent = EXPONENT_BIAS;
    while fraction >= 1.0 {
        fraction /= 16.0;
        exponent += 1;
    }
    while fraction < 1.0 / 16.0 {
        fraction *= 16.0;
        exponent -= 1;
    }

    let mut mantissa = (fraction * MANTISSA_SCALE).round() as u32;
    if mantissa > MANTISSA_MASK {
        // rounding carried into a new hex digit
        mantissa >>= 4;
        exponent += 1;
    }

    if exponent > EXPONENT_MASK as i32 {
        return sign | IBM_MAX_MAGNITUDE;
    }
    if exponent < 0 {
        return 0;
    }
    sign | ((exponent as u32) << EXPONENT_SHIFT) | mantissa
}

/// Decodes one sample from its 4 big-endian bytes.
pub fn decode_sample(bytes: [u8; 4]) -> f32 {
    ibm_to_f32(u32::from_be_bytes(bytes))
}

/// Encodes one sample into 4 big-endian bytes.
pub fn encode_sample(value: f32) -> [u8; 4] {
    f32_to_ibm(value).to_be_bytes()
}

/// Decodes a contiguous run of samples, appending to `out`.
///
/// Trailing bytes that do not form a whole sample are ignored.
pub fn decode_samples_into(bytes: &[u8], out: &mut Vec<f32>) {
    out.reserve(bytes.len() / SAMPLE_LEN);
    for chunk in bytes.chunks_exact(SAMPLE_LEN) {
        out.push(decode_sample([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
}

/// Decodes a contiguous run of samples into a new vector.
pub fn decode_samples(bytes: &[u8]) -> Vec<f32> {
    let mut out = Vec::new();
    decode_samples_into(bytes, &mut out);
    out
}

/// Encodes samples back to back, appending to `out`.
pub fn encode_samples_into(samples: &[f32], out: &mut Vec<u8>) {
    out.reserve(samples.len() * SAMPLE_LEN);
    for &sample in samples {
        out.extend_from_slice(&encode_sample(sample));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_reference_word() {
        // Classic reference value from the IBM hexadecimal float docs.
        assert_eq!(ibm_to_f32(0xC276_A000), -118.625);
        assert_eq!(ibm_to_f32(0x4110_0000), 1.0);
        assert_eq!(ibm_to_f32(0x4080_0000), 0.5);
    }

    #[test]
    fn encodes_reference_values() {
        assert_eq!(f32_to_ibm(-118.625), 0xC276_A000);
        assert_eq!(f32_to_ibm(1.0), 0x4110_0000);
        assert_eq!(f32_to_ibm(0.5), 0x4080_0000);
        assert_eq!(f32_to_ibm(16.0), 0x4210_0000);
    }

    #[test]
    fn zero_is_exact() {
        assert_eq!(f32_to_ibm(0.0), 0);
        assert_eq!(ibm_to_f32(0).to_bits(), 0.0f32.to_bits());
        assert_eq!(decode_sample(encode_sample(0.0)), 0.0);
    }

    #[test]
    fn non_finite_inputs_saturate_or_vanish() {
        assert_eq!(f32_to_ibm(f32::NAN), 0);
        assert_eq!(f32_to_ibm(f32::INFINITY), IBM_MAX_MAGNITUDE);
        assert_eq!(f32_to_ibm(f32::NEG_INFINITY), SIGN_MASK | IBM_MAX_MAGNITUDE);
    }

    #[test]
    fn leading_hex_zeros_cost_low_bits() {
        // 1/16 has three leading zero bits in its hex digit; the extra f32 bits round away.
        let value = 0.0625f32 + f32::EPSILON / 16.0;
        let word = f32_to_ibm(value);
        assert_eq!(word, 0x4010_0000);
        let back = ibm_to_f32(word);
        assert!(((back - value) / value).abs() <= 1.0 / 2_097_152.0);
    }

    #[test]
    fn integer_helpers_are_bounds_checked() {
        let mut buf = [0u8; 6];
        assert_eq!(write_i32_be(&mut buf, 2, -2), Some(()));
        assert_eq!(read_i32_be(&buf, 2), Some(-2));
        assert_eq!(read_u16_be(&buf, 4), Some(0xfffe));
        assert_eq!(read_i32_be(&buf, 3), None);
        assert_eq!(write_u16_be(&mut buf, 5, 1), None);
        assert_eq!(read_i16_be(&buf, usize::MAX), None);
    }

    #[test]
    fn sample_runs_round_trip() {
        let samples = [0.0f32, 1.5, -3.25, 1000.0];
        let mut bytes = Vec::new();
        encode_samples_into(&samples, &mut bytes);
        assert_eq!(bytes.len(), 16);
        assert_eq!(decode_samples(&bytes), samples);
    }
}
