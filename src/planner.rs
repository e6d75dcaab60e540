// AdaSense - Adaptive sampling and budgeted telemetry codec
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Group-width planning and byte-budget arithmetic
//!
//! The grouped encoding splits the flattened values of the collected
//! measurements into contiguous groups and gives each group its own bit
//! width and shift. This module decides those widths from a byte budget,
//! which itself depends on the encryption applied after encoding:
//!
//! ```text
//! message on air = [length prefix][encrypt(grouped message)]
//! Stream: encrypt(n) = n + nonce          Block: encrypt(n) = roundup(n, 16)
//! ```
//!
//! It also hosts the group table sub-codec, which packs every
//! `(width, shift)` pair into one byte.

use crate::bits::{BitReader, BitWriter};
use crate::error::{DecodeError, Result};
use crate::protocol::{
    bitmap_bytes, target_count, EncryptionMode, Measurements, BITS_PER_BYTE, BIT_WIDTH,
    LENGTH_SIZE, MAX_GROUP_WIDTH, MAX_SHIFT, MAX_WIDTH, MIN_SHIFT, MIN_WIDTH, SHIFT_BITS,
    WIDTH_BITS,
};
use crate::quantize::fits;

/// Width code marking the end of a group table
const TABLE_END: u64 = (1 << WIDTH_BITS) - 1;

/// Bits taken by one group table entry
const ENTRY_BITS: usize = (WIDTH_BITS + SHIFT_BITS) as usize;

/// Size after encryption, excluding the length prefix
pub fn encrypted_size(plaintext_bytes: usize, mode: EncryptionMode) -> usize {
    match mode {
        EncryptionMode::Stream => plaintext_bytes + mode.nonce_len(),
        EncryptionMode::Block => plaintext_bytes.div_ceil(mode.block_size()) * mode.block_size(),
    }
}

/// Largest plaintext whose encrypted size plus length prefix fits
/// `target_bytes`
pub fn plaintext_budget(target_bytes: usize, mode: EncryptionMode) -> usize {
    let available = target_bytes.saturating_sub(LENGTH_SIZE);
    match mode {
        EncryptionMode::Stream => available.saturating_sub(mode.nonce_len()),
        EncryptionMode::Block => (available / mode.block_size()) * mode.block_size(),
    }
}

/// Bytes on air for a standard message of `num_collected` measurements at
/// a single `width`.
pub fn calculate_bytes(
    width: u32,
    num_collected: usize,
    num_features: usize,
    seq_length: usize,
    mode: EncryptionMode,
) -> usize {
    let data_bits = width as usize * num_collected * num_features;
    let data_bytes = data_bits.div_ceil(BITS_PER_BYTE as usize);
    LENGTH_SIZE + encrypted_size(bitmap_bytes(seq_length) + data_bytes, mode)
}

/// Bits of a grouped message (table, bitmap, payload) before padding
pub fn grouped_message_bits(widths: &[u32], num_values: usize, seq_length: usize) -> usize {
    let sizes = group_sizes(num_values, widths.len());
    let payload: usize = sizes
        .iter()
        .zip(widths)
        .map(|(&size, &width)| size * clamp_group_width(width) as usize)
        .sum();
    ENTRY_BITS * (widths.len() + 1) + seq_length + payload
}

/// Bytes on air for a grouped message with the given group widths
pub fn calculate_grouped_bytes(
    widths: &[u32],
    num_collected: usize,
    num_features: usize,
    seq_length: usize,
    mode: EncryptionMode,
) -> usize {
    let bits = grouped_message_bits(widths, num_collected * num_features, seq_length);
    LENGTH_SIZE + encrypted_size(bits.div_ceil(BITS_PER_BYTE as usize), mode)
}

/// Byte budget for a policy: a standard message at `BIT_WIDTH` holding the
/// target number of measurements.
pub fn target_bytes(
    target: f64,
    num_features: usize,
    seq_length: usize,
    mode: EncryptionMode,
) -> usize {
    calculate_bytes(
        BIT_WIDTH,
        target_count(target, seq_length),
        num_features,
        seq_length,
        mode,
    )
}

/// Number of groups needed for `num_values` values of at most `group_size`
pub fn get_num_groups(num_values: usize, group_size: usize) -> usize {
    num_values.div_ceil(group_size.max(1))
}

/// Balanced contiguous partition of `num_values` values into `num_groups`
/// groups. The first `num_values % num_groups` groups hold one extra value.
pub fn group_sizes(num_values: usize, num_groups: usize) -> Vec<usize> {
    if num_groups == 0 {
        return Vec::new();
    }
    let base = num_values / num_groups;
    let extra = num_values % num_groups;
    (0..num_groups)
        .map(|i| base + usize::from(i < extra))
        .collect()
}

/// Clamp a width into the range a group table entry can carry
pub fn clamp_group_width(width: u32) -> u32 {
    width.clamp(1, MAX_GROUP_WIDTH)
}

/// Clamp a shift into the range a group table entry can carry
pub fn clamp_shift(shift: i32) -> i32 {
    shift.clamp(MIN_SHIFT, MAX_SHIFT)
}

/// Fractional bits of a group: `width - non_fractional - shift`, floored at 0
pub fn group_precision(width: u32, non_fractional: u32, shift: i32) -> u32 {
    (width as i64 - non_fractional as i64 - shift as i64).max(0) as u32
}

/// Pick the group shift that keeps the most fractional bits while every
/// value stays representable. Falls back to `MAX_SHIFT`.
pub fn select_shift(values: &[f64], width: u32, non_fractional: u32) -> i32 {
    let max_abs = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    (MIN_SHIFT..=MAX_SHIFT)
        .find(|&shift| fits(max_abs, width, group_precision(width, non_fractional, shift)))
        .unwrap_or(MAX_SHIFT)
}

/// Widths for `num_collected` measurements so that the grouped message fits
/// the policy's byte budget.
///
/// The payload budget left after the group table and bitmap is split across
/// groups in proportion to their size. Each group takes the largest width in
/// `[MIN_WIDTH, MAX_WIDTH]` its share allows; leftover bits then raise
/// widths one step at a time in group order. If even `MIN_WIDTH` does not
/// fit, every group gets `MIN_WIDTH`.
pub fn get_group_widths(
    group_size: usize,
    num_collected: usize,
    num_features: usize,
    seq_length: usize,
    target: f64,
    mode: EncryptionMode,
) -> Vec<u32> {
    let num_values = num_collected * num_features;
    if num_values == 0 {
        return Vec::new();
    }

    let num_groups = get_num_groups(num_values, group_size);
    let sizes = group_sizes(num_values, num_groups);

    let budget_bits = plaintext_budget(
        target_bytes(target, num_features, seq_length, mode),
        mode,
    ) * BITS_PER_BYTE as usize;
    let overhead_bits = ENTRY_BITS * (num_groups + 1) + seq_length;
    let available = budget_bits.saturating_sub(overhead_bits);

    if available < num_values * MIN_WIDTH as usize {
        log::debug!(
            "budget of {} bits cannot hold {} values at the minimum width",
            available,
            num_values
        );
        return vec![MIN_WIDTH; num_groups];
    }

    let mut widths: Vec<u32> = sizes
        .iter()
        .map(|&size| {
            let allotment = available * size / num_values;
            ((allotment / size.max(1)) as u32).clamp(MIN_WIDTH, MAX_WIDTH)
        })
        .collect();

    let used: usize = sizes.iter().zip(&widths).map(|(s, &w)| s * w as usize).sum();
    let mut leftover = available.saturating_sub(used);

    let mut changed = true;
    while changed {
        changed = false;
        for (width, &size) in widths.iter_mut().zip(&sizes) {
            if *width < MAX_WIDTH && size <= leftover {
                *width += 1;
                leftover -= size;
                changed = true;
            }
        }
    }

    widths
}

/// Largest number of measurements whose grouped encoding at `min_width`
/// still fits `target_size` bytes on air.
pub fn get_max_collected(
    seq_length: usize,
    num_features: usize,
    group_size: usize,
    min_width: u32,
    target_size: usize,
    mode: EncryptionMode,
) -> usize {
    (0..=seq_length)
        .rev()
        .find(|&count| {
            let num_values = count * num_features;
            let num_groups = get_num_groups(num_values, group_size);
            let widths = vec![min_width; num_groups];
            calculate_grouped_bytes(&widths, count, num_features, seq_length, mode) <= target_size
        })
        .unwrap_or(0)
}

/// Drop measurements until at most `max_collected` remain.
///
/// The first measurement is always kept. Each round removes the measurement
/// closest (L1) to the one before it, so the least informative samples go
/// first.
pub fn prune_sequence(
    measurements: &Measurements,
    collected_indices: &[usize],
    max_collected: usize,
) -> (Measurements, Vec<usize>) {
    if collected_indices.len() <= max_collected {
        return (measurements.clone(), collected_indices.to_vec());
    }

    let mut kept: Vec<usize> = (0..collected_indices.len()).collect();
    if max_collected == 0 {
        kept.clear();
    }

    while kept.len() > max_collected {
        let mut best = 1;
        let mut best_dist = f64::INFINITY;
        for pos in 1..kept.len() {
            let dist: f64 = measurements
                .row(kept[pos])
                .iter()
                .zip(measurements.row(kept[pos - 1]))
                .map(|(a, b)| (a - b).abs())
                .sum();
            if dist < best_dist {
                best_dist = dist;
                best = pos;
            }
        }
        kept.remove(best);
    }

    let indices = kept.iter().map(|&k| collected_indices[k]).collect();
    (measurements.select(&kept), indices)
}

/// Zero-pad `message` to `length` bytes. Longer messages are left as is.
pub fn pad_to_length(mut message: Vec<u8>, length: usize) -> Vec<u8> {
    if message.len() < length {
        message.resize(length, 0);
    }
    message
}

/// One contiguous group of the grouped encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSpec {
    /// Number of values in the group
    pub size: usize,
    /// Bits per value
    pub width: u32,
    /// Signed exponent adjustment; precision is `width - non_fractional - shift`
    pub shift: i32,
}

/// Widths, shifts and sizes of every group in a grouped message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupPlan {
    /// Groups in payload order
    pub groups: Vec<GroupSpec>,
}

impl GroupPlan {
    /// Plan groups over `values` (flattened collected measurements).
    ///
    /// Widths are clamped to what the group table can carry. With `shifted`
    /// each group gets the shift from [`select_shift`], otherwise shift 0.
    /// An empty `widths` list plans one group at `BIT_WIDTH`.
    pub fn build(values: &[f64], widths: &[u32], non_fractional: u32, shifted: bool) -> Self {
        let widths: Vec<u32> = if widths.is_empty() {
            vec![BIT_WIDTH]
        } else {
            widths.iter().map(|&w| clamp_group_width(w)).collect()
        };

        let sizes = group_sizes(values.len(), widths.len());
        let mut offset = 0;
        let groups = sizes
            .into_iter()
            .zip(widths)
            .map(|(size, width)| {
                let slice = &values[offset..offset + size];
                offset += size;
                let shift = if shifted {
                    select_shift(slice, width, non_fractional)
                } else {
                    0
                };
                GroupSpec { size, width, shift }
            })
            .collect();

        Self { groups }
    }

    /// Rebuild a plan from a decoded group table
    pub fn from_table(widths: &[u32], shifts: &[i32], num_values: usize) -> Self {
        let groups = group_sizes(num_values, widths.len())
            .into_iter()
            .zip(widths.iter().zip(shifts))
            .map(|(size, (&width, &shift))| GroupSpec { size, width, shift })
            .collect();
        Self { groups }
    }

    /// Group widths in order
    pub fn widths(&self) -> Vec<u32> {
        self.groups.iter().map(|g| g.width).collect()
    }

    /// Group shifts in order
    pub fn shifts(&self) -> Vec<i32> {
        self.groups.iter().map(|g| g.shift).collect()
    }

    /// Total values covered by the plan
    pub fn num_values(&self) -> usize {
        self.groups.iter().map(|g| g.size).sum()
    }

    /// Bits taken by the payload
    pub fn payload_bits(&self) -> usize {
        self.groups.iter().map(|g| g.size * g.width as usize).sum()
    }
}

/// Append a group table: one `(width - 1, shift)` byte per group followed by
/// the end marker. Widths and shifts are clamped to their field ranges.
pub fn write_group_table(writer: &mut BitWriter, widths: &[u32], shifts: &[i32]) {
    for (i, &width) in widths.iter().enumerate() {
        let shift = clamp_shift(shifts.get(i).copied().unwrap_or(0));
        writer.write_bits((clamp_group_width(width) - 1) as u64, WIDTH_BITS);
        writer.write_signed(shift as i64, SHIFT_BITS);
    }
    writer.write_bits(TABLE_END, WIDTH_BITS);
    writer.write_bits(0, SHIFT_BITS);
}

/// Read a group table written by [`write_group_table`]
pub fn read_group_table(reader: &mut BitReader<'_>) -> Result<(Vec<u32>, Vec<i32>)> {
    let mut widths = Vec::new();
    let mut shifts = Vec::new();

    loop {
        let offset = reader.position();
        let code = reader.read_bits(WIDTH_BITS).map_err(|_| DecodeError::MalformedMessage {
            offset,
            reason: "group table has no end marker".to_string(),
        })?;
        let shift = reader.read_signed(SHIFT_BITS)?;
        if code == TABLE_END {
            break;
        }
        widths.push(code as u32 + 1);
        shifts.push(shift as i32);
    }

    Ok((widths, shifts))
}

/// Pack group widths and shifts into bytes
pub fn encode_group_widths(widths: &[u32], shifts: &[i32]) -> Vec<u8> {
    let mut writer = BitWriter::with_capacity(ENTRY_BITS * (widths.len() + 1));
    write_group_table(&mut writer, widths, shifts);
    writer.into_bytes()
}

/// Unpack group widths and shifts; trailing bytes are ignored
pub fn decode_group_widths(bytes: &[u8]) -> Result<(Vec<u32>, Vec<i32>)> {
    let mut reader = BitReader::new(bytes);
    read_group_table(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_bytes() {
        // 23 steps, 10 features, 8 measurements at 16 bits: 160 data bytes,
        // 3 bitmap bytes
        assert_eq!(calculate_bytes(16, 8, 10, 23, EncryptionMode::Block), 178);
        assert_eq!(calculate_bytes(16, 8, 10, 23, EncryptionMode::Stream), 177);
    }

    #[test]
    fn test_plaintext_budget_inverts_encryption() {
        for mode in [EncryptionMode::Stream, EncryptionMode::Block] {
            let target = calculate_bytes(16, 15, 6, 50, mode);
            let budget = plaintext_budget(target, mode);
            assert!(LENGTH_SIZE + encrypted_size(budget, mode) <= target);
            assert!(LENGTH_SIZE + encrypted_size(budget + 1, mode) > target);
        }
    }

    #[test]
    fn test_group_sizes() {
        assert_eq!(group_sizes(6, 2), vec![3, 3]);
        assert_eq!(group_sizes(10, 4), vec![3, 3, 2, 2]);
        assert_eq!(group_sizes(2, 4), vec![1, 1, 0, 0]);
        assert!(group_sizes(5, 0).is_empty());
        assert_eq!(get_num_groups(150, 43), 4);
        assert_eq!(get_num_groups(0, 43), 0);
    }

    #[test]
    fn test_group_widths_fit_budget() {
        let mode = EncryptionMode::Stream;
        let widths = get_group_widths(43, 25, 6, 50, 0.3, mode);
        assert_eq!(widths.len(), 4);
        assert!(widths.iter().all(|&w| (MIN_WIDTH..=MAX_WIDTH).contains(&w)));

        let used = calculate_grouped_bytes(&widths, 25, 6, 50, mode);
        assert!(used <= target_bytes(0.3, 6, 50, mode));
        assert_eq!(widths, vec![10, 9, 9, 9]);
    }

    #[test]
    fn test_group_widths_cap_at_max() {
        // Few values, generous budget
        let widths = get_group_widths(43, 2, 6, 50, 0.5, EncryptionMode::Block);
        assert_eq!(widths, vec![MAX_WIDTH]);
    }

    #[test]
    fn test_group_widths_fall_back_to_min() {
        let widths = get_group_widths(43, 50, 6, 50, 0.1, EncryptionMode::Stream);
        assert_eq!(widths.len(), 7);
        assert!(widths.iter().all(|&w| w == MIN_WIDTH));
    }

    #[test]
    fn test_max_collected() {
        let mode = EncryptionMode::Stream;
        let target = target_bytes(0.3, 6, 50, mode);
        let max = get_max_collected(50, 6, 43, MIN_WIDTH, target, mode);
        assert_eq!(max, 46);

        let widths = vec![MIN_WIDTH; get_num_groups(max * 6, 43)];
        assert!(calculate_grouped_bytes(&widths, max, 6, 50, mode) <= target);
    }

    #[test]
    fn test_select_shift() {
        // 0.75 needs 5 fractional bits at width 6 with 2 integer bits
        assert_eq!(select_shift(&[0.25, -0.125, 0.75], 6, 2), -1);
        assert_eq!(group_precision(6, 2, -1), 5);
        // Too large for any shift
        assert_eq!(select_shift(&[1000.0], 6, 2), MAX_SHIFT);
        assert_eq!(group_precision(5, 8, 3), 0);
    }

    #[test]
    fn test_plan_build() {
        let values = [0.25, -0.125, 0.75, -0.125, 0.625, -0.5];
        let plan = GroupPlan::build(&values, &[6, 5], 2, true);
        assert_eq!(plan.groups.len(), 2);
        assert_eq!(plan.num_values(), 6);
        assert_eq!(plan.widths(), vec![6, 5]);
        assert_eq!(plan.payload_bits(), 33);

        let unshifted = GroupPlan::build(&values, &[6, 5], 2, false);
        assert_eq!(unshifted.shifts(), vec![0, 0]);
    }

    #[test]
    fn test_group_widths_roundtrip_exact() {
        let widths = [31, 1, 9, 12];
        let shifts = [0, -4, 3, -1];
        let bytes = encode_group_widths(&widths, &shifts);
        assert_eq!(bytes.len(), widths.len() + 1);

        let (w, s) = decode_group_widths(&bytes).unwrap();
        assert_eq!(w, widths.to_vec());
        assert_eq!(s, shifts.to_vec());
    }

    #[test]
    fn test_group_widths_roundtrip_clamped() {
        let bytes = encode_group_widths(&[32, 4, 6], &[5, 0, -9]);
        let (w, s) = decode_group_widths(&bytes).unwrap();
        assert_eq!(w, vec![31, 4, 6]);
        assert_eq!(s, vec![3, 0, -4]);
    }

    #[test]
    fn test_group_table_ignores_padding() {
        let mut bytes = encode_group_widths(&[7, 8], &[1, 2]);
        bytes.extend_from_slice(&[0; 5]);
        let (w, s) = decode_group_widths(&bytes).unwrap();
        assert_eq!(w, vec![7, 8]);
        assert_eq!(s, vec![1, 2]);
    }

    #[test]
    fn test_group_table_missing_end_marker() {
        let bytes = encode_group_widths(&[7, 8], &[0, 0]);
        assert!(decode_group_widths(&bytes[..2]).is_err());
    }

    #[test]
    fn test_prune_sequence() {
        let m = Measurements::from_rows(&[[0.0], [0.1], [5.0], [5.05], [9.0]]).unwrap();
        let indices = [0, 2, 4, 6, 8];
        let (pruned, kept) = prune_sequence(&m, &indices, 3);
        assert_eq!(kept, vec![0, 4, 8]);
        assert_eq!(pruned.as_slice(), &[0.0, 5.0, 9.0]);

        let (same, all) = prune_sequence(&m, &indices, 10);
        assert_eq!(same, m);
        assert_eq!(all, indices.to_vec());
    }

    #[test]
    fn test_pad_to_length() {
        assert_eq!(pad_to_length(vec![1, 2], 4), vec![1, 2, 0, 0]);
        assert_eq!(pad_to_length(vec![1, 2, 3], 2), vec![1, 2, 3]);
    }
}
