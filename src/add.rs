//! Saturating elementwise add of two narrow tensors with per-operand rescaling.

use crate::error::{QuantError, Result};
use crate::requant::{shift_round_half_up, validate_shift};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// How the hardware applies the two operand scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scaling", rename_all = "snake_case")]
pub enum AddScaling {
    /// `(a*mul0 + b*mul1 + 2^(shift-1)) >> shift`, saturated once.
    Combined { shift: i32 },
    /// Each operand requantized to int8 on its own, summed, saturated again.
    Sequential { shift0: i32, shift1: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddParams {
    pub mul0: i32,
    pub mul1: i32,
    pub scaling: AddScaling,
    pub out_signed: bool,
}

impl AddParams {
    pub fn validate(&self) -> Result<()> {
        match self.scaling {
            AddScaling::Combined { shift } => validate_shift(shift, 1),
            AddScaling::Sequential { shift0, shift1 } => {
                validate_shift(shift0, 1)?;
                validate_shift(shift1, 1)
            }
        }
    }

    fn clamp_out(&self, v: i64) -> i32 {
        if self.out_signed {
            v.clamp(i8::MIN as i64, i8::MAX as i64) as i32
        } else {
            v.clamp(0, u8::MAX as i64) as i32
        }
    }

    /// One output element. `validate` must have passed and both operands be 8-bit values.
    #[inline]
    fn apply(&self, a: i32, b: i32) -> i32 {
        let (a, b) = (a as i64, b as i64);
        match self.scaling {
            AddScaling::Combined { shift } => {
                let sum = a * self.mul0 as i64 + b * self.mul1 as i64;
                self.clamp_out(shift_round_half_up(sum, shift as u32))
            }
            AddScaling::Sequential { shift0, shift1 } => {
                let to_i8 = |v: i64| v.clamp(i8::MIN as i64, i8::MAX as i64);
                let ra = to_i8(shift_round_half_up(a * self.mul0 as i64, shift0 as u32));
                let rb = to_i8(shift_round_half_up(b * self.mul1 as i64, shift1 as u32));
                self.clamp_out(ra + rb)
            }
        }
    }
}

/// Operands are int8 or uint8 values carried in `i32`.
fn check_operand(v: i32) -> Result<()> {
    if !(i8::MIN as i32..=u8::MAX as i32).contains(&v) {
        return Err(QuantError::OperandOutOfRange(v));
    }
    Ok(())
}

/// Scalar form of the add, with shift and operand validation.
pub fn add_requant(a: i32, b: i32, params: &AddParams) -> Result<i32> {
    params.validate()?;
    check_operand(a)?;
    check_operand(b)?;
    Ok(params.apply(a, b))
}

/// Elementwise over equal-length operands; narrow inputs are widened by the caller.
pub fn add_tensor(a: &[i32], b: &[i32], out: &mut [i32], params: &AddParams) -> Result<()> {
    params.validate()?;
    if a.len() != b.len() || out.len() < a.len() {
        return Err(QuantError::ShapeMismatch(format!(
            "operands {} and {} elements, output {}",
            a.len(),
            b.len(),
            out.len()
        )));
    }
    if let Some(&v) = a.iter().chain(b).find(|v| check_operand(**v).is_err()) {
        return Err(QuantError::OperandOutOfRange(v));
    }
    out[..a.len()]
        .par_iter_mut()
        .zip(a.par_iter().zip(b.par_iter()))
        .for_each(|(o, (&x, &y))| *o = params.apply(x, y));
    Ok(())
}
