//! Untyped entry points: byte buffers plus caller-supplied numeric tags.
//!
//! Each call validates tags, lengths and shifts first, recovers typed slices,
//! runs the operator on the launcher's pool and only then writes the output
//! bytes. An `Err` therefore never leaves a partially written buffer.

use crate::add::{add_tensor, AddParams, AddScaling};
use crate::bf16::scale_multiply;
use crate::dtype::{check_len, decode, encode, DType, Element};
use crate::error::{QuantError, Result};
use crate::launch::Launcher;
use crate::ops::conv::{conv2d, ConvParams, ConvShape};
use crate::ops::{matmul, permute};
use crate::requant::{requantize_per_channel, requantize_tensor, RequantParams};
use crate::round::{round_to, RoundTarget, RoundingMode};
use log::{debug, warn};
use rayon::prelude::*;

#[derive(Default)]
pub struct Dispatcher {
    launcher: Launcher,
}

fn logged<T>(op: &str, r: Result<T>) -> Result<T> {
    if let Err(e) = &r {
        warn!("{} rejected: {}", op, e);
    }
    r
}

/// Widen an int8/uint8/int32 buffer to i32.
fn read_ints(bytes: &[u8], ty: DType, count: usize) -> Result<Vec<i32>> {
    Ok(match ty {
        DType::I8 => decode::<i8>(bytes, count)?.into_iter().map(i32::from).collect(),
        DType::U8 => decode::<u8>(bytes, count)?.into_iter().map(i32::from).collect(),
        DType::I32 => decode::<i32>(bytes, count)?,
        DType::F32 => return Err(QuantError::Unsupported { from: ty, to: DType::I32 }),
    })
}

/// Store already-saturated values into an 8-bit buffer.
fn write_narrow(vals: &[i32], dst: &mut [u8], ty: DType) {
    match ty {
        DType::I8 => encode(&vals.iter().map(|&v| v as i8).collect::<Vec<_>>(), dst),
        DType::U8 => encode(&vals.iter().map(|&v| v as u8).collect::<Vec<_>>(), dst),
        _ => unreachable!("narrow output tag checked by caller"),
    }
}

fn narrow_out(from: DType, to: DType) -> Result<bool> {
    match to {
        DType::I8 => Ok(true),
        DType::U8 => Ok(false),
        _ => Err(QuantError::Unsupported { from, to }),
    }
}

fn round_all<T: RoundTarget + Element>(vals: &[f32], mode: RoundingMode) -> Vec<T> {
    vals.par_iter().map(|&v| round_to::<T>(v, mode)).collect()
}

impl Dispatcher {
    pub fn new(launcher: Launcher) -> Self { Self { launcher } }

    pub fn launcher(&self) -> &Launcher { &self.launcher }

    /// Element-wise type conversion. Floats go through the rounding primitive,
    /// int32 -> 8-bit saturates, anything -> float32 widens (int32 magnitudes
    /// above 2^24 round to the nearest float32).
    pub fn convert(&self, src: &[u8], src_ty: DType, dst: &mut [u8], dst_ty: DType, count: usize, mode: RoundingMode) -> Result<()> {
        debug!("convert {} -> {} x{} ({:?})", src_ty, dst_ty, count, mode);
        logged("convert", self.launcher.install(|| {
            check_len(dst, dst_ty, count)?;
            match (src_ty, dst_ty) {
                (DType::F32, _) => {
                    let x = decode::<f32>(src, count)?;
                    match dst_ty {
                        DType::F32 => encode(&x, dst),
                        DType::I32 => encode(&round_all::<i32>(&x, mode), dst),
                        DType::I8 => encode(&round_all::<i8>(&x, mode), dst),
                        DType::U8 => encode(&round_all::<u8>(&x, mode), dst),
                    }
                }
                (DType::I32, DType::I8) | (DType::I32, DType::U8) => {
                    let x = decode::<i32>(src, count)?;
                    let signed = dst_ty == DType::I8;
                    let params = RequantParams { out_signed: signed, ..Default::default() };
                    let sat: Vec<i32> = x.par_iter().map(|&v| params.saturate(v as i64)).collect();
                    write_narrow(&sat, dst, dst_ty);
                }
                (_, DType::F32) => {
                    let x = read_ints(src, src_ty, count)?;
                    encode(&x.iter().map(|&v| v as f32).collect::<Vec<_>>(), dst);
                }
                _ => return Err(QuantError::Unsupported { from: src_ty, to: dst_ty }),
            }
            Ok(())
        }))
    }

    /// Affine quantization: `round(x / scale) + zero_point`, saturated to the output tag.
    pub fn quantize(&self, src: &[u8], dst: &mut [u8], dst_ty: DType, count: usize, scale: f32, zero_point: i32, mode: RoundingMode) -> Result<()> {
        debug!("quantize float32 -> {} x{} scale={} zp={}", dst_ty, count, scale, zero_point);
        logged("quantize", self.launcher.install(|| {
            let signed = narrow_out(DType::F32, dst_ty)?;
            check_len(dst, dst_ty, count)?;
            let x = decode::<f32>(src, count)?;
            let params = RequantParams { out_signed: signed, ..Default::default() };
            let q: Vec<i32> = x
                .par_iter()
                .map(|&v| params.saturate(round_to::<i32>(v / scale, mode) as i64 + zero_point as i64))
                .collect();
            write_narrow(&q, dst, dst_ty);
            Ok(())
        }))
    }

    /// `(q - zero_point) * scale` into float32. The difference is taken in 64 bits.
    pub fn dequantize(&self, src: &[u8], src_ty: DType, dst: &mut [u8], count: usize, scale: f32, zero_point: i32) -> Result<()> {
        debug!("dequantize {} -> float32 x{}", src_ty, count);
        logged("dequantize", self.launcher.install(|| {
            if !src_ty.is_narrow() {
                return Err(QuantError::Unsupported { from: src_ty, to: DType::F32 });
            }
            check_len(dst, DType::F32, count)?;
            let q = read_ints(src, src_ty, count)?;
            let x: Vec<f32> = q.par_iter().map(|&v| (v as i64 - zero_point as i64) as f32 * scale).collect();
            encode(&x, dst);
            Ok(())
        }))
    }

    /// Per-tensor requantization of int32 accumulators. Output signedness follows `dst_ty`.
    #[allow(clippy::too_many_arguments)]
    pub fn requantize(&self, src: &[u8], dst: &mut [u8], dst_ty: DType, count: usize, multiplier: i32, shift: i32, qdm: bool, relu: bool) -> Result<()> {
        debug!("requantize int32 -> {} x{} m={} s={} qdm={} relu={}", dst_ty, count, multiplier, shift, qdm, relu);
        logged("requantize", self.launcher.install(|| {
            let out_signed = narrow_out(DType::I32, dst_ty)?;
            check_len(dst, dst_ty, count)?;
            let acc = decode::<i32>(src, count)?;
            let mut out = vec![0i32; count];
            requantize_tensor(&acc, &mut out, multiplier, shift, RequantParams { qdm, out_signed, relu })?;
            write_narrow(&out, dst, dst_ty);
            Ok(())
        }))
    }

    /// Per-channel requantization of an NCHW int32 tensor.
    #[allow(clippy::too_many_arguments)]
    pub fn requantize_per_channel(&self, src: &[u8], dst: &mut [u8], dst_ty: DType, shape: [usize; 4], multipliers: &[i32], shifts: &[i32], qdm: bool, relu: bool) -> Result<()> {
        let count: usize = shape.iter().product();
        debug!("requantize_per_channel int32 -> {} {:?} qdm={} relu={}", dst_ty, shape, qdm, relu);
        logged("requantize_per_channel", self.launcher.install(|| {
            let out_signed = narrow_out(DType::I32, dst_ty)?;
            check_len(dst, dst_ty, count)?;
            let acc = decode::<i32>(src, count)?;
            let mut out = vec![0i32; count];
            requantize_per_channel(&acc, &mut out, shape, multipliers, shifts, RequantParams { qdm, out_signed, relu })?;
            write_narrow(&out, dst, dst_ty);
            Ok(())
        }))
    }

    /// Saturating add of two 8-bit tensors of the same tag.
    #[allow(clippy::too_many_arguments)]
    pub fn add(&self, a: &[u8], b: &[u8], in_ty: DType, dst: &mut [u8], out_ty: DType, count: usize, mul0: i32, mul1: i32, scaling: AddScaling) -> Result<()> {
        debug!("add {} -> {} x{} ({:?})", in_ty, out_ty, count, scaling);
        logged("add", self.launcher.install(|| {
            if !in_ty.is_narrow() {
                return Err(QuantError::Unsupported { from: in_ty, to: out_ty });
            }
            let out_signed = narrow_out(in_ty, out_ty)?;
            check_len(dst, out_ty, count)?;
            let x = read_ints(a, in_ty, count)?;
            let y = read_ints(b, in_ty, count)?;
            let mut out = vec![0i32; count];
            add_tensor(&x, &y, &mut out, &AddParams { mul0, mul1, scaling, out_signed })?;
            write_narrow(&out, dst, out_ty);
            Ok(())
        }))
    }

    /// Multiply a float32 tensor by `scale` through the Reduced16 scale unit.
    pub fn bf16_scale(&self, src: &[u8], dst: &mut [u8], count: usize, scale: f32, round_inputs: bool) -> Result<()> {
        debug!("bf16_scale x{} scale={} round_inputs={}", count, scale, round_inputs);
        logged("bf16_scale", self.launcher.install(|| {
            check_len(dst, DType::F32, count)?;
            let x = decode::<f32>(src, count)?;
            let y: Vec<f32> = x.par_iter().map(|&v| scale_multiply(v, scale, round_inputs)).collect();
            encode(&y, dst);
            Ok(())
        }))
    }

    /// int8 convolution; returns the NCHW output shape.
    pub fn conv2d(&self, input: &[u8], filter: &[u8], bias: Option<&[i32]>, dst: &mut [u8], shape: ConvShape, params: &ConvParams) -> Result<[usize; 4]> {
        debug!("conv2d input={:?} filter={:?} stride={} pad={}", shape.input, shape.filter, params.stride, params.padding);
        logged("conv2d", self.launcher.install(|| {
            let out_shape = shape.output(params.stride, params.padding)?;
            let out_len: usize = out_shape.iter().product();
            check_len(dst, DType::I8, out_len)?;
            let x = decode::<i8>(input, shape.input.iter().product())?;
            let f = decode::<i8>(filter, shape.filter.iter().product())?;
            let mut out = vec![0i8; out_len];
            conv2d(&x, &f, bias, &mut out, shape, params)?;
            encode(&out, dst);
            Ok(out_shape)
        }))
    }

    pub fn matmul(&self, a: &[u8], b: &[u8], dst: &mut [u8], m: usize, k: usize, n: usize) -> Result<()> {
        debug!("matmul {}x{}x{}", m, k, n);
        logged("matmul", self.launcher.install(|| {
            check_len(dst, DType::F32, m * n)?;
            let x = decode::<f32>(a, m * k)?;
            let y = decode::<f32>(b, k * n)?;
            let mut out = vec![0f32; m * n];
            matmul::matmul(&x, &y, &mut out, m, k, n)?;
            encode(&out, dst);
            Ok(())
        }))
    }

    pub fn permute(&self, src: &[u8], dst: &mut [u8], shape: [usize; 4], perm: [usize; 4], elem_size: usize) -> Result<[usize; 4]> {
        debug!("permute {:?} by {:?} ({}B)", shape, perm, elem_size);
        logged("permute", self.launcher.install(|| permute::permute4d(src, dst, shape, perm, elem_size)))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn insert_along_axis(&self, src: &[u8], src_shape: [usize; 4], dst: &mut [u8], dst_shape: [usize; 4], axis: usize, offset: usize, elem_size: usize) -> Result<()> {
        debug!("insert {:?} into {:?} axis={} offset={}", src_shape, dst_shape, axis, offset);
        logged("insert_along_axis", self.launcher.install(|| {
            permute::insert_along_axis(src, src_shape, dst, dst_shape, axis, offset, elem_size)
        }))
    }
}
