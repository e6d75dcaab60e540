//! Encoder module
//!
//! This module packs collected measurements into bit-exact messages. Three
//! layouts are supported, all MSB-first in a single bit stream whose last
//! byte is zero-filled:
//!
//! ```text
//! standard: [bitmap: T bits][values: K*D x width bits]
//! grouped:  [group table: 8*(G+1) bits][bitmap: T bits][group 0 values]...[group G-1 values]
//! stable:   [width - 1: 5 bits][bitmap: T bits][values: K*D x width bits]
//! ```
//!
//! Values are fixed-point codes from [`crate::quantize`]; out-of-range
//! values clamp rather than fail.

use crate::bits::BitWriter;
use crate::error::{Result, ShapeError};
use crate::planner::{
    clamp_group_width, clamp_shift, group_precision, group_sizes, write_group_table, GroupPlan,
    GroupSpec,
};
use crate::protocol::{validate_indices, write_bitmap, Measurements, MIN_WIDTH, WIDTH_BITS};
use crate::quantize::{fits, quantize};

/// Largest width the stable header can announce
pub const MAX_STABLE_WIDTH: u32 = 1 << WIDTH_BITS;

/// Encode with a single global `(width, precision)`.
///
/// The receiver must know `width` and `precision` out of band.
pub fn encode_standard(
    measurements: &Measurements,
    collected_indices: &[usize],
    seq_length: usize,
    width: u32,
    precision: u32,
) -> Result<Vec<u8>> {
    validate_indices(measurements, collected_indices, seq_length)?;

    let mut writer =
        BitWriter::with_capacity(seq_length + measurements.as_slice().len() * width as usize);
    write_bitmap(&mut writer, collected_indices, seq_length);
    write_values(&mut writer, measurements.as_slice(), width, precision);

    Ok(writer.into_bytes())
}

/// Encode with one width per group, choosing each group's shift.
///
/// The values of the collected measurements (row-major) are split into
/// `widths.len()` balanced groups.
pub fn encode_grouped(
    measurements: &Measurements,
    collected_indices: &[usize],
    seq_length: usize,
    widths: &[u32],
    non_fractional: u32,
) -> Result<Vec<u8>> {
    let plan = GroupPlan::build(measurements.as_slice(), widths, non_fractional, true);
    encode_grouped_plan(
        measurements,
        collected_indices,
        seq_length,
        &plan,
        non_fractional,
    )
}

/// Encode with an explicit group plan.
///
/// Group sizes must follow [`group_sizes`] so the receiver can recover them
/// from the group count alone. Widths and shifts outside what the group
/// table can carry are clamped, and the payload is written at the clamped
/// values.
pub fn encode_grouped_plan(
    measurements: &Measurements,
    collected_indices: &[usize],
    seq_length: usize,
    plan: &GroupPlan,
    non_fractional: u32,
) -> Result<Vec<u8>> {
    validate_indices(measurements, collected_indices, seq_length)?;

    let values = measurements.as_slice();
    let expected = group_sizes(values.len(), plan.groups.len());
    let sizes: Vec<usize> = plan.groups.iter().map(|g| g.size).collect();
    if sizes != expected {
        return Err(ShapeError::PlanMismatch {
            planned: plan.num_values(),
            values: values.len(),
        }
        .into());
    }

    let plan = GroupPlan {
        groups: plan
            .groups
            .iter()
            .map(|g| GroupSpec {
                size: g.size,
                width: clamp_group_width(g.width),
                shift: clamp_shift(g.shift),
            })
            .collect(),
    };

    let mut writer = BitWriter::with_capacity(
        8 * (plan.groups.len() + 1) + seq_length + plan.payload_bits(),
    );
    write_group_table(&mut writer, &plan.widths(), &plan.shifts());
    write_bitmap(&mut writer, collected_indices, seq_length);

    let mut offset = 0;
    for group in &plan.groups {
        let precision = group_precision(group.width, non_fractional, group.shift);
        write_values(
            &mut writer,
            &values[offset..offset + group.size],
            group.width,
            precision,
        );
        offset += group.size;
    }

    Ok(writer.into_bytes())
}

/// Smallest width in `[MIN_WIDTH, MAX_STABLE_WIDTH]` at which no value
/// clamps at `precision`; `MAX_STABLE_WIDTH` when none does.
pub fn select_stable_width(values: &[f64], precision: u32) -> u32 {
    let max_abs = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    (MIN_WIDTH..=MAX_STABLE_WIDTH)
        .find(|&width| fits(max_abs, width, precision))
        .unwrap_or(MAX_STABLE_WIDTH)
}

/// Encode with one width for the whole message, chosen so that every value
/// is within `2^-precision` of its original (unless it exceeds even the
/// widest field). The width travels in the header; `precision` does not.
pub fn encode_stable(
    measurements: &Measurements,
    collected_indices: &[usize],
    seq_length: usize,
    precision: u32,
) -> Result<Vec<u8>> {
    validate_indices(measurements, collected_indices, seq_length)?;

    let width = select_stable_width(measurements.as_slice(), precision);

    let mut writer = BitWriter::with_capacity(
        WIDTH_BITS as usize + seq_length + measurements.as_slice().len() * width as usize,
    );
    writer.write_bits((width - 1) as u64, WIDTH_BITS);
    write_bitmap(&mut writer, collected_indices, seq_length);
    write_values(&mut writer, measurements.as_slice(), width, precision);

    Ok(writer.into_bytes())
}

fn write_values(writer: &mut BitWriter, values: &[f64], width: u32, precision: u32) {
    for &value in values {
        writer.write_signed(quantize(value, width, precision), width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode_grouped;

    fn sample() -> Measurements {
        Measurements::from_rows(&[[0.25, -0.125, 0.75], [-0.125, 0.625, -0.5]]).unwrap()
    }

    #[test]
    fn test_standard_layout() {
        let encoded = encode_standard(&sample(), &[0, 3], 8, 8, 6).unwrap();
        // 8 bitmap bits + 6 values x 8 bits
        assert_eq!(encoded.len(), 7);
        assert_eq!(encoded[0], 0b1001_0000);
        // 0.25 * 64 = 16
        assert_eq!(encoded[1], 16);
        // -0.125 * 64 = -8
        assert_eq!(encoded[2], (-8i8) as u8);
    }

    #[test]
    fn test_standard_empty_is_header_only() {
        let empty = Measurements::empty(3);
        let encoded = encode_standard(&empty, &[], 12, 8, 6).unwrap();
        assert_eq!(encoded, vec![0, 0]);
    }

    #[test]
    fn test_standard_rejects_bad_indices() {
        assert!(encode_standard(&sample(), &[3, 0], 8, 8, 6).is_err());
        assert!(encode_standard(&sample(), &[0, 8], 8, 8, 6).is_err());
        assert!(encode_standard(&sample(), &[0], 8, 8, 6).is_err());
    }

    #[test]
    fn test_grouped_size() {
        let encoded = encode_grouped(&sample(), &[0, 1], 8, &[6, 5], 2).unwrap();
        // 3 table bytes, 8 bitmap bits, 3x6 + 3x5 payload bits
        assert_eq!(encoded.len(), (24 + 8 + 33usize).div_ceil(8));
    }

    #[test]
    fn test_grouped_plan_mismatch() {
        let mut plan = GroupPlan::build(sample().as_slice(), &[6, 5], 2, true);
        plan.groups[0].size = 4;
        plan.groups[1].size = 2;
        let result = encode_grouped_plan(&sample(), &[0, 1], 8, &plan, 2);
        assert!(result.is_err());
    }

    #[test]
    fn test_grouped_plan_clamps_width() {
        let plan = GroupPlan {
            groups: vec![
                GroupSpec { size: 3, width: 40, shift: 0 },
                GroupSpec { size: 3, width: 8, shift: 0 },
            ],
        };
        let encoded = encode_grouped_plan(&sample(), &[0, 1], 8, &plan, 2).unwrap();
        let (decoded, indices) = decode_grouped(&encoded, 8, 3, 2).unwrap();

        // Width 40 is sent as 31, still enough for every value
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_grouped_plan_clamps_shift() {
        let m = Measurements::from_rows(&[[0.01, -0.02, 0.015], [-0.125, 0.625, -0.5]]).unwrap();
        let plan = GroupPlan {
            groups: vec![
                GroupSpec { size: 3, width: 8, shift: -6 },
                GroupSpec { size: 3, width: 8, shift: 0 },
            ],
        };
        let encoded = encode_grouped_plan(&m, &[0, 1], 8, &plan, 2).unwrap();
        let (decoded, _) = decode_grouped(&encoded, 8, 3, 2).unwrap();

        // Shift -6 is sent as -4: precision 8 - 2 + 4 = 10
        for (a, b) in m.row(0).iter().zip(decoded.row(0)) {
            assert!((a - b).abs() <= 1.0 / 2048.0);
        }
        assert_eq!(decoded.row(1), m.row(1));
    }

    #[test]
    fn test_grouped_plan_zero_width() {
        let plan = GroupPlan {
            groups: vec![
                GroupSpec { size: 3, width: 0, shift: 0 },
                GroupSpec { size: 3, width: 8, shift: 0 },
            ],
        };
        let encoded = encode_grouped_plan(&sample(), &[0, 1], 8, &plan, 2).unwrap();
        let (decoded, _) = decode_grouped(&encoded, 8, 3, 2).unwrap();

        // The 1-bit group keeps the second group aligned
        assert_eq!(decoded.row(0), &[0.0, 0.0, 0.0]);
        assert_eq!(decoded.row(1), sample().row(1));
    }

    #[test]
    fn test_stable_width_selection() {
        // 0.75 at precision 6 is code 48, which needs 7 bits
        assert_eq!(select_stable_width(&[0.25, 0.75], 6), 7);
        assert_eq!(select_stable_width(&[0.0], 2), MIN_WIDTH);
        assert_eq!(select_stable_width(&[1e12], 8), MAX_STABLE_WIDTH);

        let encoded = encode_stable(&sample(), &[0, 3], 8, 6).unwrap();
        assert_eq!(encoded[0] >> 3, 6);
    }
}
