use anyhow::{Context, Result};
use clap::Parser;
use quantref::add::AddScaling;
use quantref::cases::{evaluate, write_cases, Case, CaseOp};
use quantref::{DType, Dispatcher, RoundingMode};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "quantref-gen", version, about = "Generate seeded golden vectors from the reference arithmetic")]
struct Args {
    /// Output JSON-lines file
    #[arg(long)]
    out: PathBuf,

    /// Cases per operation
    #[arg(long, default_value_t = 16)]
    per_op: usize,

    /// Elements per case
    #[arg(long, default_value_t = 64)]
    len: usize,

    /// RNG seed
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Std-dev of generated int32 accumulators
    #[arg(long, default_value_t = 20000.0)]
    acc_sigma: f64,
}

const MODES: [RoundingMode; 4] = [RoundingMode::HalfAwayFromZero, RoundingMode::HalfUp, RoundingMode::TowardsZero, RoundingMode::HalfToEven];

fn narrow(rng: &mut SmallRng) -> DType { if rng.gen_bool(0.5) { DType::I8 } else { DType::U8 } }

fn make_ops(args: &Args, rng: &mut SmallRng) -> Result<Vec<(String, CaseOp)>> {
    let acc = Normal::new(0.0, args.acc_sigma).context("accumulator distribution")?;
    let mut ops = Vec::new();
    for i in 0..args.per_op {
        // ties are the interesting inputs, so half of them sit on .5
        let input: Vec<f32> = (0..args.len)
            .map(|_| {
                let base = rng.gen_range(-300i32..300) as f32;
                if rng.gen_bool(0.5) { base + 0.5 } else { base + rng.gen::<f32>() }
            })
            .collect();
        let mode = MODES[i % MODES.len()];
        let dtype = [DType::I8, DType::U8, DType::I32][i % 3];
        ops.push((format!("convert_{}", i), CaseOp::Convert { input, dtype, mode }));

        let input: Vec<i32> = (0..args.len).map(|_| acc.sample(rng) as i32).collect();
        let qdm = rng.gen_bool(0.5);
        let min_shift = if qdm { 0 } else { 1 };
        let shift = rng.gen_range(min_shift..16);
        let multiplier = rng.gen_range(1..i32::MAX);
        let multiplier = if qdm { multiplier } else { multiplier >> 16 };
        ops.push((
            format!("requantize_{}", i),
            CaseOp::Requantize { input, dtype: narrow(rng), multiplier, shift, qdm, relu: rng.gen_bool(0.25) },
        ));

        let c = rng.gen_range(1..5usize);
        let shape = [1, c, 2, args.len.max(2) / 2];
        let count: usize = shape.iter().product();
        ops.push((
            format!("requantize_per_channel_{}", i),
            CaseOp::RequantizePerChannel {
                input: (0..count).map(|_| acc.sample(rng) as i32).collect(),
                dtype: narrow(rng),
                shape,
                multipliers: (0..c).map(|_| rng.gen_range(1..i32::MAX)).collect(),
                shifts: (0..c).map(|_| rng.gen_range(0..12)).collect(),
                qdm: true,
                relu: false,
            },
        ));

        let a: Vec<i32> = (0..args.len).map(|_| rng.gen_range(-128..128)).collect();
        let b: Vec<i32> = (0..args.len).map(|_| rng.gen_range(-128..128)).collect();
        let scaling = if rng.gen_bool(0.5) {
            AddScaling::Combined { shift: rng.gen_range(1..16) }
        } else {
            AddScaling::Sequential { shift0: rng.gen_range(1..16), shift1: rng.gen_range(1..16) }
        };
        ops.push((
            format!("add_{}", i),
            CaseOp::Add { a, b, in_dtype: DType::I8, out_dtype: narrow(rng), mul0: rng.gen_range(1..1 << 15), mul1: rng.gen_range(1..1 << 15), scaling },
        ));

        let input: Vec<f32> = (0..args.len).map(|_| rng.gen_range(-1.0e4f32..1.0e4)).collect();
        ops.push((
            format!("bf16_scale_{}", i),
            CaseOp::Bf16Scale { input, scale: rng.gen_range(1.0e-4f32..4.0), round_inputs: rng.gen_bool(0.5) },
        ));

        let (ic, oc) = (rng.gen_range(1..4usize), rng.gen_range(1..4usize));
        let input_shape = [1, ic, 5, 5];
        let filter_shape = [oc, ic, 3, 3];
        ops.push((
            format!("conv2d_{}", i),
            CaseOp::Conv2d {
                input: (0..ic * 25).map(|_| rng.gen::<i8>()).collect(),
                filter: (0..oc * ic * 9).map(|_| rng.gen::<i8>()).collect(),
                bias: Some((0..oc).map(|_| rng.gen_range(-1000..1000)).collect()),
                input_shape,
                filter_shape,
                stride: rng.gen_range(1..3),
                padding: rng.gen_range(0..2),
                multipliers: (0..oc).map(|_| rng.gen_range(1i64..1 << 31)).collect(),
                shifts: (0..oc).map(|_| rng.gen_range(0..10)).collect(),
                saturate_output: false,
            },
        ));

        let (m, k, n) = (rng.gen_range(1..8usize), rng.gen_range(1..8usize), rng.gen_range(1..8usize));
        ops.push((
            format!("matmul_{}", i),
            CaseOp::Matmul {
                a: (0..m * k).map(|_| rng.gen_range(-2.0f32..2.0)).collect(),
                b: (0..k * n).map(|_| rng.gen_range(-2.0f32..2.0)).collect(),
                m,
                k,
                n,
            },
        ));

        let input: Vec<f32> = (0..args.len).map(|_| rng.gen_range(-50.0f32..50.0)).collect();
        let dtype = narrow(rng);
        ops.push((
            format!("quantize_{}", i),
            CaseOp::Quantize { input, dtype, scale: rng.gen_range(0.05f32..2.0), zero_point: rng.gen_range(-20..140), mode },
        ));
        let input: Vec<i32> = match dtype {
            DType::I8 => (0..args.len).map(|_| rng.gen_range(-128..128)).collect(),
            _ => (0..args.len).map(|_| rng.gen_range(0..256)).collect(),
        };
        ops.push((
            format!("dequantize_{}", i),
            CaseOp::Dequantize { input, dtype, scale: rng.gen_range(0.01f32..1.0), zero_point: rng.gen_range(-128..256) },
        ));

        let elem_size = [1usize, 2, 4][i % 3];
        let max = 1i64 << (8 * elem_size);
        let shape = [rng.gen_range(1..3usize), rng.gen_range(1..4usize), rng.gen_range(1..4usize), rng.gen_range(1..5usize)];
        let count: usize = shape.iter().product();
        let mut perm = [0usize, 1, 2, 3];
        perm.shuffle(rng);
        ops.push((
            format!("permute_{}", i),
            CaseOp::Permute { input: (0..count).map(|_| rng.gen_range(0..max)).collect(), shape, perm, elem_size },
        ));

        let axis = rng.gen_range(0..4usize);
        let mut dst_shape = shape;
        dst_shape[axis] += rng.gen_range(0..3usize);
        let offset = rng.gen_range(0..=dst_shape[axis] - shape[axis]);
        ops.push((
            format!("insert_along_axis_{}", i),
            CaseOp::InsertAlongAxis {
                input: (0..count).map(|_| rng.gen_range(0..max)).collect(),
                src_shape: shape,
                dst_shape,
                axis,
                offset,
                elem_size,
            },
        ));
    }
    Ok(ops)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let dispatcher = Dispatcher::default();

    let mut cases = Vec::new();
    for (name, op) in make_ops(&args, &mut rng)? {
        let expected = evaluate(&dispatcher, &op).with_context(|| format!("evaluate {}", name))?;
        cases.push(Case { name, op, expected, expect_error: false });
    }
    write_cases(&args.out, &cases)?;
    println!("wrote {} cases to {}", cases.len(), args.out.display());
    Ok(())
}
