//! Receiver-side sequence reconstruction
//!
//! Fills the steps a policy skipped by linear interpolation between the
//! collected measurements on either side. Steps before the first or after
//! the last collected measurement repeat the nearest one.

use crate::protocol::Measurements;

/// Rebuild a full `[seq_length, D]` sequence from collected measurements.
///
/// With nothing collected every step is zero.
pub fn reconstruct_sequence(
    measurements: &Measurements,
    collected_indices: &[usize],
    seq_length: usize,
) -> Measurements {
    let nf = measurements.num_features();
    let count = collected_indices.len().min(measurements.len());
    let mut values = vec![0.0; seq_length * nf];

    if count == 0 {
        return Measurements::from_raw(nf, values);
    }

    let mut next = 0;
    for t in 0..seq_length {
        while next < count && collected_indices[next] < t {
            next += 1;
        }

        let out = &mut values[t * nf..(t + 1) * nf];
        if next == count {
            out.copy_from_slice(measurements.row(count - 1));
        } else if collected_indices[next] == t || next == 0 {
            out.copy_from_slice(measurements.row(next));
        } else {
            let (left, right) = (collected_indices[next - 1], collected_indices[next]);
            let weight = (t - left) as f64 / (right - left) as f64;
            let (a, b) = (measurements.row(next - 1), measurements.row(next));
            for (j, slot) in out.iter_mut().enumerate() {
                *slot = a[j] + weight * (b[j] - a[j]);
            }
        }
    }

    Measurements::from_raw(nf, values)
}

/// Mean absolute error between two sequences of the same shape
pub fn mean_absolute_error(expected: &Measurements, actual: &Measurements) -> f64 {
    let n = expected.as_slice().len().min(actual.as_slice().len());
    if n == 0 {
        return 0.0;
    }
    let total: f64 = expected
        .as_slice()
        .iter()
        .zip(actual.as_slice())
        .map(|(e, a)| (e - a).abs())
        .sum();
    total / n as f64
}
