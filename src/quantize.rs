//! Fixed-point quantization
//!
//! Values are stored as two's complement integers of `width` bits, of which
//! the low `precision` bits hold the fraction. Out-of-range values clamp to
//! the nearest representable code.

/// Largest supported field width
pub const MAX_FIELD_WIDTH: u32 = 63;

fn clamp_width(width: u32) -> u32 {
    width.clamp(1, MAX_FIELD_WIDTH)
}

/// Smallest and largest code of a signed `width`-bit field
pub fn code_range(width: u32) -> (i64, i64) {
    let width = clamp_width(width);
    let max = (1i64 << (width - 1)) - 1;
    (-max - 1, max)
}

/// Quantize `value` to a signed `width`-bit fixed-point code.
///
/// Rounds to nearest; clamps to the representable range; NaN becomes 0.
pub fn quantize(value: f64, width: u32, precision: u32) -> i64 {
    if value.is_nan() {
        return 0;
    }

    let (min, max) = code_range(width);
    let scaled = (value * (2.0f64).powi(precision as i32)).round();

    if scaled <= min as f64 {
        min
    } else if scaled >= max as f64 {
        max
    } else {
        scaled as i64
    }
}

/// Recover the real value of a `width`-bit code.
///
/// Only the low `width` bits of `code` are used and they are sign-extended,
/// so raw unsigned fields read off the wire can be passed directly.
pub fn dequantize(code: i64, width: u32, precision: u32) -> f64 {
    let width = clamp_width(width);
    let shift = 64 - width;
    let signed = (code << shift) >> shift;
    signed as f64 / (2.0f64).powi(precision as i32)
}

/// Largest magnitude representable without clamping
pub fn max_abs_representable(width: u32, precision: u32) -> f64 {
    let (_, max) = code_range(width);
    max as f64 / (2.0f64).powi(precision as i32)
}

/// True when `value` quantizes without clamping
pub fn fits(value: f64, width: u32, precision: u32) -> bool {
    if !value.is_finite() {
        return false;
    }
    let (min, max) = code_range(width);
    let scaled = (value * (2.0f64).powi(precision as i32)).round();
    scaled >= min as f64 && scaled <= max as f64
}

/// Integer bits, sign included, needed to hold the integer part of `value`
pub fn non_fractional_bits(value: f64) -> u32 {
    let magnitude = value.abs().floor();
    if !magnitude.is_finite() {
        return MAX_FIELD_WIDTH;
    }
    let mut bits = 1;
    while bits < MAX_FIELD_WIDTH && (1u64 << (bits - 1)) as f64 <= magnitude {
        bits += 1;
    }
    bits
}
