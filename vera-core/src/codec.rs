//! Bit-level codec
//!
//! Signal windows are addressed by bit, where bit 0 is the most significant
//! bit of payload byte 0 and indices grow across byte boundaries. A window is
//! read and written as one MSB-first run of bits: the first bit of the window
//! is the most significant bit of the extracted value.
//!
//! On top of the raw bit moves this module holds the value conversions shared
//! by the decoder and the encoder: sign extension, fixed-point interpretation,
//! linear scaling and clamping.

use crate::signals::database::Signal;
use crate::types::CodecError;

/// Widest window the codec can move in one go
pub const MAX_WINDOW_BITS: usize = 64;

fn check_window(payload_len: usize, start: usize, length: usize) -> Result<(), CodecError> {
    let frame_bits = payload_len * 8;
    if length == 0 || length > MAX_WINDOW_BITS || start + length > frame_bits {
        return Err(CodecError::OutOfBounds {
            start: start as u16,
            length: length as u16,
            frame_bits,
        });
    }
    Ok(())
}

/// Read `length` bits starting at bit `start` as a right-aligned unsigned value
pub fn extract_bits(payload: &[u8], start: usize, length: usize) -> Result<u64, CodecError> {
    check_window(payload.len(), start, length)?;

    let mut value = 0u64;
    for bit in start..start + length {
        let bit_value = (payload[bit / 8] >> (7 - bit % 8)) & 0x01;
        value = (value << 1) | bit_value as u64;
    }
    Ok(value)
}

/// OR the low `length` bits of `value` into the window starting at `start`
///
/// The window must be zero beforehand; bits already set are left set.
pub fn insert_bits(
    payload: &mut [u8],
    start: usize,
    length: usize,
    value: u64,
) -> Result<(), CodecError> {
    check_window(payload.len(), start, length)?;

    for i in 0..length {
        if (value >> (length - 1 - i)) & 0x01 == 1 {
            let bit = start + i;
            payload[bit / 8] |= 0x80 >> (bit % 8);
        }
    }
    Ok(())
}

/// All-ones mask covering the low `length` bits
pub fn mask(length: usize) -> u64 {
    if length >= 64 {
        u64::MAX
    } else {
        (1u64 << length) - 1
    }
}

/// Sign-extend a value from N bits to 64 bits
///
/// If the value's MSB is 1, fill the upper bits with 1s.
pub fn sign_extend(value: u64, bit_length: usize) -> i64 {
    if bit_length == 0 || bit_length >= 64 {
        return value as i64;
    }

    let sign_bit = 1u64 << (bit_length - 1);
    if (value & sign_bit) != 0 {
        (value | !mask(bit_length)) as i64
    } else {
        value as i64
    }
}

/// Interpret raw window bits as a number before scaling
///
/// Returns the raw integer (sign-extended for signed signals) and its numeric
/// value: the integer itself, or the fixed-point reading when figures are set.
pub fn interpret_raw(signal: &Signal, bits: u64) -> (i64, f32) {
    let length = signal.length as usize;
    let (raw, numeric) = if signal.signed {
        let raw = sign_extend(bits, length);
        (raw, raw as f32)
    } else {
        (bits as i64, bits as f32)
    };

    if signal.is_fixed_point() {
        (raw, numeric / 2f32.powi(signal.decimal_figures as i32))
    } else {
        (raw, numeric)
    }
}

/// Clamp to `[min, max]`; values below `min` become `min`, above `max` become `max`
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Raw bits to physical value: interpret, scale, clamp
pub fn to_physical(signal: &Signal, bits: u64) -> (i64, f32) {
    let (raw, numeric) = interpret_raw(signal, bits);
    let scaled = numeric * signal.factor + signal.offset;
    (raw, clamp(scaled, signal.min, signal.max))
}

/// Physical value to raw window bits: clamp, unscale, fix point, mask
pub fn to_raw(signal: &Signal, value: f32) -> Result<u64, CodecError> {
    let unrepresentable = || CodecError::Unrepresentable {
        signal: signal.name.clone(),
        value,
    };
    if !value.is_finite() {
        return Err(unrepresentable());
    }

    let clamped = clamp(value, signal.min, signal.max) as f64;
    let mut numeric = (clamped - signal.offset as f64) / signal.factor as f64;
    if signal.is_fixed_point() {
        numeric *= 2f64.powi(signal.decimal_figures as i32);
    }
    let numeric = numeric.round();

    let length = signal.length as usize;
    if signal.signed {
        let half = 2f64.powi(length as i32 - 1);
        if !numeric.is_finite() || numeric < -half || numeric >= half {
            return Err(unrepresentable());
        }
        Ok((numeric as i64) as u64 & mask(length))
    } else {
        if !numeric.is_finite() || numeric < 0.0 || numeric >= 2f64.powi(length as i32) {
            return Err(unrepresentable());
        }
        Ok(numeric as u64)
    }
}
