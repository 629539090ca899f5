//! Fixed-point requantization: 32-bit accumulators to 8-bit outputs through a
//! (multiplier, shift) pair.
//!
//! Two paths exist. The direct path rounds half-up in a single shift. The qdm
//! ("quantized-down-multiply") path first runs a 32x32 multiply-high with a
//! fixed 31-bit rounding shift, then a second half-away-from-zero shift. The
//! double rounding is what the accelerator does and must not be folded into one.

use crate::error::{QuantError, Result};
use rayon::prelude::*;

/// Fixed shift of the multiply-high stage.
pub const QDM_SHIFT: u32 = 31;

/// Output range selection shared by every requantizing operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequantParams {
    pub qdm: bool,
    pub out_signed: bool,
    pub relu: bool,
}

impl RequantParams {
    pub fn bounds(&self) -> (i64, i64) {
        if self.out_signed {
            (if self.relu { 0 } else { i8::MIN as i64 }, i8::MAX as i64)
        } else {
            (0, u8::MAX as i64)
        }
    }

    #[inline]
    pub fn saturate(&self, v: i64) -> i32 {
        let (lo, hi) = self.bounds();
        v.clamp(lo, hi) as i32
    }

    /// Smallest shift each path accepts. Only qdm may skip its second stage.
    pub fn min_shift(&self) -> i32 { if self.qdm { 0 } else { 1 } }
}

pub fn validate_shift(shift: i32, min: i32) -> Result<()> {
    // anything past 62 would shift the rounding bias out of an i64
    if shift < min || shift > 62 {
        return Err(QuantError::InvalidShift { shift, min });
    }
    Ok(())
}

/// `(v + 2^(shift-1)) >> shift`, arithmetic. Requires `shift >= 1`.
#[inline]
pub fn shift_round_half_up(v: i64, shift: u32) -> i64 {
    (v + (1i64 << (shift - 1))) >> shift
}

/// Sign-magnitude rounding shift: ties move away from zero. `shift == 0` is identity.
#[inline]
pub fn shift_round_away(v: i64, shift: u32) -> i64 {
    if shift == 0 {
        return v;
    }
    let mag = (v.abs() + (1i64 << (shift - 1))) >> shift;
    if v < 0 { -mag } else { mag }
}

/// Multiply-high with rounding: `(acc * mult + 2^30) >> 31`.
#[inline]
pub fn multiply_high(acc: i32, multiplier: i64) -> i64 {
    (acc as i64 * multiplier + (1i64 << (QDM_SHIFT - 1))) >> QDM_SHIFT
}

/// The unsaturated scaled value. Shift must already be validated for the path.
#[inline]
pub fn scale_unchecked(acc: i32, multiplier: i32, shift: i32, qdm: bool) -> i64 {
    if qdm {
        shift_round_away(multiply_high(acc, multiplier as i64), shift as u32)
    } else {
        shift_round_half_up(acc as i64 * multiplier as i64, shift as u32)
    }
}

/// Scale one accumulator without saturating.
pub fn scale_accumulator(acc: i32, multiplier: i32, shift: i32, qdm: bool) -> Result<i64> {
    validate_shift(shift, if qdm { 0 } else { 1 })?;
    Ok(scale_unchecked(acc, multiplier, shift, qdm))
}

/// Requantize one accumulator into the range selected by `params`.
pub fn requantize(acc: i32, multiplier: i32, shift: i32, params: RequantParams) -> Result<i32> {
    let v = scale_accumulator(acc, multiplier, shift, params.qdm)?;
    Ok(params.saturate(v))
}

/// Per-tensor requantization of a whole buffer. Results are in `i32` but lie in the
/// 8-bit range chosen by `params`.
pub fn requantize_tensor(acc: &[i32], out: &mut [i32], multiplier: i32, shift: i32, params: RequantParams) -> Result<()> {
    validate_shift(shift, params.min_shift())?;
    if out.len() < acc.len() {
        return Err(QuantError::ShapeMismatch(format!("{} accumulators into {} outputs", acc.len(), out.len())));
    }
    out[..acc.len()].par_iter_mut().zip(acc.par_iter()).for_each(|(o, &a)| {
        *o = params.saturate(scale_unchecked(a, multiplier, shift, params.qdm));
    });
    Ok(())
}

/// Per-channel requantization of an NCHW tensor. Every (n, c) plane uses
/// `multipliers[c]` and `shifts[c]`.
pub fn requantize_per_channel(
    acc: &[i32],
    out: &mut [i32],
    shape: [usize; 4],
    multipliers: &[i32],
    shifts: &[i32],
    params: RequantParams,
) -> Result<()> {
    let [n, c, h, w] = shape;
    let total = n * c * h * w;
    if acc.len() < total || out.len() < total {
        return Err(QuantError::ShapeMismatch(format!("{:?} needs {} elements", shape, total)));
    }
    if multipliers.len() != c || shifts.len() != c {
        return Err(QuantError::ShapeMismatch(format!(
            "{} channels but {} multipliers and {} shifts",
            c,
            multipliers.len(),
            shifts.len()
        )));
    }
    for &s in shifts {
        validate_shift(s, params.min_shift())?;
    }
    let plane = h * w;
    if total == 0 {
        return Ok(());
    }
    out[..total]
        .par_chunks_mut(plane)
        .zip(acc[..total].par_chunks(plane))
        .enumerate()
        .for_each(|(p, (o, a))| {
            let ch = p % c;
            let (m, s) = (multipliers[ch], shifts[ch]);
            for (ov, &av) in o.iter_mut().zip(a) {
                *ov = params.saturate(scale_unchecked(av, m, s, params.qdm));
            }
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn away_shift_is_symmetric() {
        for v in [-7i64, -6, -5, -1, 0, 1, 5, 6, 7] {
            assert_eq!(shift_round_away(-v, 1), -shift_round_away(v, 1));
        }
        assert_eq!(shift_round_away(5, 1), 3);
        assert_eq!(shift_round_away(-5, 1), -3);
    }

    #[test]
    fn half_up_shift_moves_ties_up() {
        assert_eq!(shift_round_half_up(5, 1), 3);
        assert_eq!(shift_round_half_up(-5, 1), -2);
    }
}
