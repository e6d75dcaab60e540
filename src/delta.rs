//! Delta transform over consecutive measurements
//!
//! Row 0 is kept as is and every later row becomes its difference from the
//! previous one. Slowly varying sequences turn into small values, which
//! quantize into narrower fields.

use crate::protocol::Measurements;

/// Replace each row after the first with its difference from the previous row.
///
/// [`delta_decode`] restores the input exactly only when every difference
/// and running sum is exact in `f64`, as with fixed-point data. Rows of
/// very different magnitude lose the small components: `[1.0, 1e-20]`
/// comes back as `[1.0, 0.0]`.
pub fn delta_encode(measurements: &Measurements) -> Measurements {
    let nf = measurements.num_features();
    let values = measurements.as_slice();
    let mut out = values.to_vec();

    for i in (nf..values.len()).rev() {
        out[i] = values[i] - values[i - nf];
    }

    Measurements::from_raw(nf, out)
}

/// Inverse of [`delta_encode`]: running sum over rows.
///
/// Subject to `f64` rounding; see [`delta_encode`].
pub fn delta_decode(deltas: &Measurements) -> Measurements {
    let nf = deltas.num_features();
    let mut out = deltas.as_slice().to_vec();

    for i in nf..out.len() {
        out[i] += out[i - nf];
    }

    Measurements::from_raw(nf, out)
}
