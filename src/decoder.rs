//! Decoder module
//!
//! This module turns messages produced by [`crate::encoder`] back into
//! measurements and their sequence positions. Decoders read exactly the
//! fields their header announces, so trailing zero padding is ignored.

use crate::bits::BitReader;
use crate::error::{AdasenseError, DecodeError, Result};
use crate::planner::{group_precision, read_group_table, GroupPlan};
use crate::protocol::{read_bitmap, Measurements, WIDTH_BITS};
use crate::quantize::dequantize;

/// Decoded measurements and the sequence indices they were collected at
pub type Decoded = (Measurements, Vec<usize>);

/// Decode a standard message encoded at `(width, precision)`.
pub fn decode_standard(
    bytes: &[u8],
    seq_length: usize,
    num_features: usize,
    width: u32,
    precision: u32,
) -> Result<Decoded> {
    let mut reader = BitReader::new(bytes);
    let indices = read_bitmap(&mut reader, seq_length)?;
    let values = read_values(&mut reader, indices.len() * num_features, width, precision)?;
    Ok((Measurements::new(num_features, values)?, indices))
}

/// Decode a grouped message.
///
/// If the message ends inside the payload, measurements that could not be
/// read completely are reported as not collected.
pub fn decode_grouped(
    bytes: &[u8],
    seq_length: usize,
    num_features: usize,
    non_fractional: u32,
) -> Result<Decoded> {
    let mut reader = BitReader::new(bytes);
    let (widths, shifts) = read_group_table(&mut reader)?;
    let mut indices = read_bitmap(&mut reader, seq_length)?;

    let num_values = indices.len() * num_features;
    let plan = GroupPlan::from_table(&widths, &shifts, num_values);
    if plan.num_values() != num_values {
        return Err(DecodeError::MalformedMessage {
            offset: reader.position(),
            reason: format!(
                "group table covers {} values, bitmap announces {}",
                plan.num_values(),
                num_values
            ),
        }
        .into());
    }

    let mut values = Vec::with_capacity(num_values);
    'groups: for group in &plan.groups {
        let precision = group_precision(group.width, non_fractional, group.shift);
        for _ in 0..group.size {
            match reader.read_signed(group.width) {
                Ok(code) => values.push(dequantize(code, group.width, precision)),
                Err(AdasenseError::Decode(DecodeError::BufferTooShort { .. })) => {
                    log::debug!(
                        "grouped message truncated after {} of {} values",
                        values.len(),
                        num_values
                    );
                    break 'groups;
                }
                Err(err) => return Err(err),
            }
        }
    }

    let complete = if num_features == 0 {
        0
    } else {
        values.len() / num_features
    };
    values.truncate(complete * num_features);
    indices.truncate(complete);

    Ok((Measurements::new(num_features, values)?, indices))
}

/// Decode a stable message; the width comes from the header.
pub fn decode_stable(
    bytes: &[u8],
    seq_length: usize,
    num_features: usize,
    precision: u32,
) -> Result<Decoded> {
    let mut reader = BitReader::new(bytes);
    let width = reader.read_bits(WIDTH_BITS)? as u32 + 1;
    let indices = read_bitmap(&mut reader, seq_length)?;
    let values = read_values(&mut reader, indices.len() * num_features, width, precision)?;
    Ok((Measurements::new(num_features, values)?, indices))
}

fn read_values(
    reader: &mut BitReader<'_>,
    count: usize,
    width: u32,
    precision: u32,
) -> Result<Vec<f64>> {
    (0..count)
        .map(|_| Ok(dequantize(reader.read_signed(width)?, width, precision)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{encode_grouped, encode_standard, encode_stable};
    use crate::planner::pad_to_length;
    use approx::assert_abs_diff_eq;

    fn sample() -> Measurements {
        Measurements::from_rows(&[[0.25, -0.125, 0.75], [-0.125, 0.625, -0.5]]).unwrap()
    }

    fn assert_close(actual: &Measurements, expected: &[f64], epsilon: f64) {
        assert_eq!(actual.as_slice().len(), expected.len());
        for (a, e) in actual.as_slice().iter().zip(expected) {
            assert_abs_diff_eq!(*a, *e, epsilon = epsilon);
        }
    }

    #[test]
    fn test_standard_roundtrip_precision_six() {
        let encoded = encode_standard(&sample(), &[0, 3], 8, 8, 6).unwrap();
        let (decoded, indices) = decode_standard(&encoded, 8, 3, 8, 6).unwrap();
        assert_close(&decoded, sample().as_slice(), 1e-9);
        assert_eq!(indices, vec![0, 3]);
    }

    #[test]
    fn test_standard_roundtrip_precision_two() {
        let encoded = encode_standard(&sample(), &[0, 4], 8, 16, 2).unwrap();
        let (decoded, indices) = decode_standard(&encoded, 8, 3, 16, 2).unwrap();
        // Ties round away from zero
        assert_close(&decoded, &[0.25, -0.25, 0.75, -0.25, 0.75, -0.5], 1e-9);
        assert_eq!(indices, vec![0, 4]);
    }

    #[test]
    fn test_standard_short_buffer() {
        let encoded = encode_standard(&sample(), &[0, 3], 8, 8, 6).unwrap();
        assert!(decode_standard(&encoded[..4], 8, 3, 8, 6).is_err());
    }

    #[test]
    fn test_grouped_roundtrip_two_groups() {
        let encoded = encode_grouped(&sample(), &[0, 1], 8, &[6, 5], 2).unwrap();
        let (decoded, indices) = decode_grouped(&encoded, 8, 3, 2).unwrap();
        assert_close(&decoded, sample().as_slice(), 1e-9);
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_grouped_narrow_width_loses_precision() {
        let encoded = encode_grouped(&sample(), &[0, 5], 8, &[6, 3], 2).unwrap();
        let (decoded, indices) = decode_grouped(&encoded, 8, 3, 2).unwrap();
        assert_eq!(indices, vec![0, 5]);
        // Second group: 3 bits leave 2 fractional bits
        assert_close(&decoded, &[0.25, -0.125, 0.75, -0.25, 0.75, -0.5], 1e-9);
    }

    #[test]
    fn test_grouped_three_groups_padded() {
        let encoded = encode_grouped(&sample(), &[0, 7], 8, &[6, 5, 5], 2).unwrap();
        let padded = pad_to_length(encoded.clone(), encoded.len() + 6);

        let plain = decode_grouped(&encoded, 8, 3, 2).unwrap();
        let from_padded = decode_grouped(&padded, 8, 3, 2).unwrap();
        assert_eq!(plain, from_padded);
        assert_close(&plain.0, sample().as_slice(), 1e-9);
        assert_eq!(plain.1, vec![0, 7]);
    }

    #[test]
    fn test_grouped_truncated_payload() {
        let encoded = encode_grouped(&sample(), &[2, 6], 8, &[16], 2).unwrap();
        // Table (2 bytes) + bitmap (1 byte) + first measurement (6 bytes)
        let truncated = &encoded[..9];
        let (decoded, indices) = decode_grouped(truncated, 8, 3, 2).unwrap();
        assert_eq!(indices, vec![2]);
        assert_close(&decoded, &[0.25, -0.125, 0.75], 1e-9);
    }

    #[test]
    fn test_grouped_empty() {
        let empty = Measurements::empty(3);
        let encoded = encode_grouped(&empty, &[], 8, &[], 2).unwrap();
        let (decoded, indices) = decode_grouped(&encoded, 8, 3, 2).unwrap();
        assert!(decoded.is_empty());
        assert!(indices.is_empty());
    }

    #[test]
    fn test_stable_roundtrip() {
        let encoded = encode_stable(&sample(), &[1, 6], 8, 6).unwrap();
        let mut padded = encoded.clone();
        padded.extend_from_slice(&[0; 3]);

        for bytes in [&encoded, &padded] {
            let (decoded, indices) = decode_stable(bytes, 8, 3, 6).unwrap();
            assert_close(&decoded, sample().as_slice(), 1.0 / 64.0);
            assert_eq!(indices, vec![1, 6]);
        }
    }
}
