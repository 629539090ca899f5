use criterion::{criterion_group, criterion_main, Criterion, black_box};
use quantref::ops::conv::{conv2d, ConvParams, ConvShape};

fn next_i8(seed: &mut u64) -> i8 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    (((*seed >> 32) as i32 % 7) - 3) as i8
}

fn bench_conv(c: &mut Criterion) {
    let shape = ConvShape { input: [1, 16, 32, 32], filter: [32, 16, 3, 3] };
    let mut seed = 0x9e37_79b9_7f4a_7c15u64;
    let input: Vec<i8> = (0..16 * 32 * 32).map(|_| next_i8(&mut seed)).collect();
    let filter: Vec<i8> = (0..32 * 16 * 9).map(|_| next_i8(&mut seed)).collect();
    let params = ConvParams { stride: 1, padding: 1, multipliers: vec![1 << 30; 32], shifts: vec![2; 32], saturate_output: false };
    let mut out = vec![0i8; 32 * 32 * 32];
    c.bench_function("conv2d_16x32x32_k3_oc32", |ben| {
        ben.iter(|| conv2d(black_box(&input), black_box(&filter), None, &mut out, shape, &params).unwrap())
    });
}

criterion_group!(benches, bench_conv);
criterion_main!(benches);
