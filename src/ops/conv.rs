//! Direct int8 convolution (NCHW input, OIHW filter) with qdm requantization.
//!
//! The final cast truncates to 8 bits without clamping unless `saturate_output`
//! is set. This matches the hardware reference; overflowing results wrap.

use crate::error::{QuantError, Result};
use crate::requant::{multiply_high, shift_round_away, validate_shift};
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct ConvParams {
    pub stride: usize,
    pub padding: usize,
    /// Q31 multipliers per output channel; `1 << 31` is the identity.
    pub multipliers: Vec<i64>,
    /// Second-stage shifts per output channel; 0 skips the stage.
    pub shifts: Vec<i32>,
    pub saturate_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvShape {
    /// Input (n, c, h, w).
    pub input: [usize; 4],
    /// Filter (out_c, in_c, kh, kw).
    pub filter: [usize; 4],
}

impl ConvShape {
    pub fn output(&self, stride: usize, padding: usize) -> Result<[usize; 4]> {
        let [n, c, h, w] = self.input;
        let [oc, ic, kh, kw] = self.filter;
        if ic != c {
            return Err(QuantError::ShapeMismatch(format!("filter expects {} input channels, input has {}", ic, c)));
        }
        if stride == 0 {
            return Err(QuantError::ShapeMismatch("stride must be >= 1".into()));
        }
        if kh == 0 || kw == 0 || h + 2 * padding < kh || w + 2 * padding < kw {
            return Err(QuantError::ShapeMismatch(format!("kernel {}x{} does not fit {}x{} with padding {}", kh, kw, h, w, padding)));
        }
        let oh = (h + 2 * padding - kh) / stride + 1;
        let ow = (w + 2 * padding - kw) / stride + 1;
        Ok([n, oc, oh, ow])
    }
}

/// Raw 32-bit accumulator for one output position, bias excluded.
#[allow(clippy::too_many_arguments)]
fn accumulate(input: &[i8], filter: &[i8], shape: &ConvShape, stride: usize, padding: usize, b: usize, o: usize, oy: usize, ox: usize) -> i32 {
    let [_, c, h, w] = shape.input;
    let [_, _, kh, kw] = shape.filter;
    let mut acc: i32 = 0;
    for ci in 0..c {
        for ky in 0..kh {
            let iy = (oy * stride + ky) as isize - padding as isize;
            if iy < 0 || iy >= h as isize { continue; }
            for kx in 0..kw {
                let ix = (ox * stride + kx) as isize - padding as isize;
                if ix < 0 || ix >= w as isize { continue; }
                let x = input[((b * c + ci) * h + iy as usize) * w + ix as usize] as i32;
                let f = filter[((o * c + ci) * kh + ky) * kw + kx] as i32;
                // 32-bit accumulator register
                acc = acc.wrapping_add(x * f);
            }
        }
    }
    acc
}

pub fn conv2d(input: &[i8], filter: &[i8], bias: Option<&[i32]>, output: &mut [i8], shape: ConvShape, params: &ConvParams) -> Result<[usize; 4]> {
    let out_shape = shape.output(params.stride, params.padding)?;
    let [n, oc, oh, ow] = out_shape;
    let in_len: usize = shape.input.iter().product();
    let f_len: usize = shape.filter.iter().product();
    let out_len = n * oc * oh * ow;
    if input.len() < in_len || filter.len() < f_len || output.len() < out_len {
        return Err(QuantError::ShapeMismatch(format!(
            "buffers {}/{}/{} too small for input {:?} filter {:?}",
            input.len(), filter.len(), output.len(), shape.input, shape.filter
        )));
    }
    if params.multipliers.len() != oc || params.shifts.len() != oc {
        return Err(QuantError::ShapeMismatch(format!("{} output channels need as many multipliers and shifts", oc)));
    }
    if let Some(b) = bias {
        if b.len() != oc {
            return Err(QuantError::ShapeMismatch(format!("bias has {} entries for {} channels", b.len(), oc)));
        }
    }
    for &s in &params.shifts {
        validate_shift(s, 0)?;
    }
    if let Some(&m) = params.multipliers.iter().find(|m| !(-(1i64 << 31)..=1i64 << 31).contains(*m)) {
        return Err(QuantError::InvalidMultiplier(m));
    }
    if out_len == 0 {
        return Ok(out_shape);
    }

    let plane = oh * ow;
    output[..out_len].par_chunks_mut(plane).enumerate().for_each(|(p, dst)| {
        let (b, o) = (p / oc, p % oc);
        let mult = params.multipliers[o];
        let shift = params.shifts[o] as u32;
        let bias_o = bias.map(|bs| bs[o]).unwrap_or(0);
        for oy in 0..oh {
            for ox in 0..ow {
                let acc = accumulate(input, filter, &shape, params.stride, params.padding, b, o, oy, ox).wrapping_add(bias_o);
                let v = shift_round_away(multiply_high(acc, mult), shift);
                dst[oy * ow + ox] = if params.saturate_output {
                    v.clamp(i8::MIN as i64, i8::MAX as i64) as i8
                } else {
                    v as i8
                };
            }
        }
    });
    Ok(out_shape)
}
