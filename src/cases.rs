//! JSON-lines test vectors for the validation harness: one operation, its inputs and
//! parameters, and the exact expected output per line.

use crate::add::AddScaling;
use crate::dispatch::Dispatcher;
use crate::dtype::{decode, to_bytes, DType};
use crate::error::{QuantError, Result};
use crate::ops::conv::{ConvParams, ConvShape};
use crate::round::RoundingMode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CaseOp {
    Convert { input: Vec<f32>, dtype: DType, mode: RoundingMode },
    Requantize { input: Vec<i32>, dtype: DType, multiplier: i32, shift: i32, qdm: bool, relu: bool },
    RequantizePerChannel {
        input: Vec<i32>,
        dtype: DType,
        shape: [usize; 4],
        multipliers: Vec<i32>,
        shifts: Vec<i32>,
        qdm: bool,
        relu: bool,
    },
    Add { a: Vec<i32>, b: Vec<i32>, in_dtype: DType, out_dtype: DType, mul0: i32, mul1: i32, scaling: AddScaling },
    Bf16Scale { input: Vec<f32>, scale: f32, round_inputs: bool },
    Conv2d {
        input: Vec<i8>,
        filter: Vec<i8>,
        #[serde(default)]
        bias: Option<Vec<i32>>,
        input_shape: [usize; 4],
        filter_shape: [usize; 4],
        stride: usize,
        padding: usize,
        multipliers: Vec<i64>,
        shifts: Vec<i32>,
        #[serde(default)]
        saturate_output: bool,
    },
    Matmul { a: Vec<f32>, b: Vec<f32>, m: usize, k: usize, n: usize },
    Quantize { input: Vec<f32>, dtype: DType, scale: f32, zero_point: i32, mode: RoundingMode },
    Dequantize { input: Vec<i32>, dtype: DType, scale: f32, zero_point: i32 },
    /// Elements are stored as their low `elem_size` little-endian bytes.
    Permute { input: Vec<i64>, shape: [usize; 4], perm: [usize; 4], elem_size: usize },
    InsertAlongAxis {
        input: Vec<i64>,
        src_shape: [usize; 4],
        dst_shape: [usize; 4],
        axis: usize,
        offset: usize,
        elem_size: usize,
    },
}

impl CaseOp {
    /// Whether the output holds float32 values; everything else compares as exact integers.
    pub fn float_output(&self) -> bool {
        match self {
            CaseOp::Convert { dtype, .. } => *dtype == DType::F32,
            CaseOp::Bf16Scale { .. } | CaseOp::Matmul { .. } | CaseOp::Dequantize { .. } => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub name: String,
    #[serde(flatten)]
    pub op: CaseOp,
    #[serde(default)]
    pub expected: Vec<f64>,
    /// The call must be rejected instead of producing output.
    #[serde(default)]
    pub expect_error: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    /// (index, expected, actual) for every differing element.
    Mismatch(Vec<(usize, f64, f64)>),
    LengthMismatch { expected: usize, actual: usize },
    UnexpectedError(QuantError),
    MissingError,
}

impl Verdict {
    pub fn passed(&self) -> bool { matches!(self, Verdict::Pass) }
}

/// Re-encode narrow integer inputs given as JSON numbers.
fn narrow_bytes(vals: &[i32], ty: DType) -> Vec<u8> {
    match ty {
        DType::I8 => to_bytes(&vals.iter().map(|&v| v as i8).collect::<Vec<_>>()),
        DType::U8 => to_bytes(&vals.iter().map(|&v| v as u8).collect::<Vec<_>>()),
        DType::I32 => to_bytes(vals),
        DType::F32 => to_bytes(&vals.iter().map(|&v| v as f32).collect::<Vec<_>>()),
    }
}

fn raw_bytes(vals: &[i64], elem_size: usize) -> Vec<u8> {
    vals.iter().flat_map(|v| v.to_le_bytes().into_iter().take(elem_size)).collect()
}

fn read_raw(bytes: &[u8], elem_size: usize) -> Vec<f64> {
    bytes
        .chunks_exact(elem_size)
        .map(|c| {
            let mut b = [0u8; 8];
            b[..elem_size].copy_from_slice(c);
            u64::from_le_bytes(b) as f64
        })
        .collect()
}

fn read_back(bytes: &[u8], ty: DType, count: usize) -> Result<Vec<f64>> {
    Ok(match ty {
        DType::F32 => decode::<f32>(bytes, count)?.into_iter().map(f64::from).collect(),
        DType::I32 => decode::<i32>(bytes, count)?.into_iter().map(f64::from).collect(),
        DType::I8 => decode::<i8>(bytes, count)?.into_iter().map(f64::from).collect(),
        DType::U8 => decode::<u8>(bytes, count)?.into_iter().map(f64::from).collect(),
    })
}

/// Run one operation through the dispatch surface and return its output as f64.
pub fn evaluate(d: &Dispatcher, op: &CaseOp) -> Result<Vec<f64>> {
    match op {
        CaseOp::Convert { input, dtype, mode } => {
            let mut dst = vec![0u8; input.len() * dtype.size()];
            d.convert(&to_bytes(input), DType::F32, &mut dst, *dtype, input.len(), *mode)?;
            read_back(&dst, *dtype, input.len())
        }
        CaseOp::Requantize { input, dtype, multiplier, shift, qdm, relu } => {
            let mut dst = vec![0u8; input.len() * dtype.size()];
            d.requantize(&to_bytes(input), &mut dst, *dtype, input.len(), *multiplier, *shift, *qdm, *relu)?;
            read_back(&dst, *dtype, input.len())
        }
        CaseOp::RequantizePerChannel { input, dtype, shape, multipliers, shifts, qdm, relu } => {
            let count: usize = shape.iter().product();
            let mut dst = vec![0u8; count * dtype.size()];
            d.requantize_per_channel(&to_bytes(input), &mut dst, *dtype, *shape, multipliers, shifts, *qdm, *relu)?;
            read_back(&dst, *dtype, count)
        }
        CaseOp::Add { a, b, in_dtype, out_dtype, mul0, mul1, scaling } => {
            if a.len() != b.len() {
                return Err(QuantError::ShapeMismatch(format!("operands {} and {} elements", a.len(), b.len())));
            }
            let mut dst = vec![0u8; a.len() * out_dtype.size()];
            d.add(&narrow_bytes(a, *in_dtype), &narrow_bytes(b, *in_dtype), *in_dtype, &mut dst, *out_dtype, a.len(), *mul0, *mul1, *scaling)?;
            read_back(&dst, *out_dtype, a.len())
        }
        CaseOp::Bf16Scale { input, scale, round_inputs } => {
            let mut dst = vec![0u8; input.len() * 4];
            d.bf16_scale(&to_bytes(input), &mut dst, input.len(), *scale, *round_inputs)?;
            read_back(&dst, DType::F32, input.len())
        }
        CaseOp::Conv2d { input, filter, bias, input_shape, filter_shape, stride, padding, multipliers, shifts, saturate_output } => {
            let shape = ConvShape { input: *input_shape, filter: *filter_shape };
            let params = ConvParams {
                stride: *stride,
                padding: *padding,
                multipliers: multipliers.clone(),
                shifts: shifts.clone(),
                saturate_output: *saturate_output,
            };
            let out_len: usize = shape.output(*stride, *padding)?.iter().product();
            let mut dst = vec![0u8; out_len];
            d.conv2d(&to_bytes(input), &to_bytes(filter), bias.as_deref(), &mut dst, shape, &params)?;
            read_back(&dst, DType::I8, out_len)
        }
        CaseOp::Matmul { a, b, m, k, n } => {
            let mut dst = vec![0u8; m * n * 4];
            d.matmul(&to_bytes(a), &to_bytes(b), &mut dst, *m, *k, *n)?;
            read_back(&dst, DType::F32, m * n)
        }
        CaseOp::Quantize { input, dtype, scale, zero_point, mode } => {
            let mut dst = vec![0u8; input.len() * dtype.size()];
            d.quantize(&to_bytes(input), &mut dst, *dtype, input.len(), *scale, *zero_point, *mode)?;
            read_back(&dst, *dtype, input.len())
        }
        CaseOp::Dequantize { input, dtype, scale, zero_point } => {
            let mut dst = vec![0u8; input.len() * 4];
            d.dequantize(&narrow_bytes(input, *dtype), *dtype, &mut dst, input.len(), *scale, *zero_point)?;
            read_back(&dst, DType::F32, input.len())
        }
        CaseOp::Permute { input, shape, perm, elem_size } => {
            let count: usize = shape.iter().product();
            let mut dst = vec![0u8; count * elem_size];
            d.permute(&raw_bytes(input, *elem_size), &mut dst, *shape, *perm, *elem_size)?;
            Ok(read_raw(&dst, *elem_size))
        }
        CaseOp::InsertAlongAxis { input, src_shape, dst_shape, axis, offset, elem_size } => {
            let count: usize = dst_shape.iter().product();
            let mut dst = vec![0u8; count * elem_size];
            d.insert_along_axis(&raw_bytes(input, *elem_size), *src_shape, &mut dst, *dst_shape, *axis, *offset, *elem_size)?;
            Ok(read_raw(&dst, *elem_size))
        }
    }
}

fn same(float: bool, expected: f64, actual: f64) -> bool {
    if !float {
        // integer outputs are exact in f64
        return expected == actual;
    }
    // float outputs are f32; compare at that precision, NaN equal to NaN
    let (e, a) = (expected as f32, actual as f32);
    e.to_bits() == a.to_bits() || (e.is_nan() && a.is_nan()) || e == a
}

pub fn run_case(d: &Dispatcher, case: &Case) -> Verdict {
    match (evaluate(d, &case.op), case.expect_error) {
        (Err(_), true) => Verdict::Pass,
        (Ok(_), true) => Verdict::MissingError,
        (Err(e), false) => Verdict::UnexpectedError(e),
        (Ok(actual), false) => {
            if actual.len() != case.expected.len() {
                return Verdict::LengthMismatch { expected: case.expected.len(), actual: actual.len() };
            }
            let float = case.op.float_output();
            let bad: Vec<(usize, f64, f64)> = case
                .expected
                .iter()
                .zip(&actual)
                .enumerate()
                .filter(|(_, (e, a))| !same(float, **e, **a))
                .map(|(i, (&e, &a))| (i, e, a))
                .collect();
            if bad.is_empty() { Verdict::Pass } else { Verdict::Mismatch(bad) }
        }
    }
}

/// Blank lines are skipped; a malformed line is an error with its line number.
pub fn load_cases<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Case>> {
    let f = File::open(&path).with_context(|| format!("open case file: {}", path.as_ref().display()))?;
    let rdr = BufReader::new(f);
    let mut out = Vec::new();
    for (i, line) in rdr.lines().enumerate() {
        let line = line.with_context(|| format!("read line {}", i + 1))?;
        let l = line.trim();
        if l.is_empty() { continue; }
        let case: Case = serde_json::from_str(l).with_context(|| format!("parse case on line {}", i + 1))?;
        out.push(case);
    }
    Ok(out)
}

pub fn write_cases<P: AsRef<Path>>(path: P, cases: &[Case]) -> anyhow::Result<()> {
    let f = File::create(&path).with_context(|| format!("create case file: {}", path.as_ref().display()))?;
    let mut w = BufWriter::new(f);
    for c in cases {
        serde_json::to_writer(&mut w, c).context("serialize case")?;
        writeln!(w)?;
    }
    w.flush().context("flush case file")?;
    Ok(())
}
