use quantref::bf16::{scale_multiply, Bf16, MAX_FINITE};

fn samples() -> Vec<f32> {
    let mut out = vec![0.0, -0.0, 1.0, -1.0, 0.1, -0.1, 3.14159, 65504.0, 1.0e-30, -7.5e12, f32::MAX, f32::MIN_POSITIVE];
    let mut seed = 0x2545_f491_4f6c_dd1du64;
    for _ in 0..256 {
        seed ^= seed << 13; seed ^= seed >> 7; seed ^= seed << 17;
        let v = f32::from_bits((seed >> 32) as u32);
        if v.is_finite() { out.push(v); }
    }
    out
}

#[test]
fn truncation_shrinks_magnitude_and_is_idempotent() {
    for x in samples() {
        let once = Bf16::from_f32(x, false).to_f32();
        let twice = Bf16::from_f32(once, false).to_f32();
        assert!(once.abs() <= x.abs(), "x={} once={}", x, once);
        assert_eq!(once.to_bits(), twice.to_bits(), "x={}", x);
        assert_eq!(once.to_bits() & 0xffff, 0);
    }
}

#[test]
fn rounding_picks_nearest_even() {
    // 1 + 3*2^-8: truncates to 1 + 2^-7, rounds to 1 + 2^-6
    let x = 1.01171875f32;
    assert_eq!(Bf16::truncate(x).to_f32(), 1.0078125);
    assert_eq!(Bf16::round(x).to_f32(), 1.015625);
    assert_eq!(scale_multiply(x, 1.0, false), 1.0078125);
    assert_eq!(scale_multiply(x, 1.0, true), 1.015625);
}

#[test]
fn product_is_rounded_back_to_reduced() {
    let a = Bf16::from_bits(0x3f81); // 1.0078125
    // exact product 1 + 2^-6 + 2^-14 loses its low bit
    assert_eq!(a.mul(a).to_bits(), 0x3f82);
    assert_eq!(Bf16::round(3.0).mul(Bf16::round(0.5)).to_f32(), 1.5);
}

#[test]
fn overflowing_product_never_reaches_infinity() {
    let big = Bf16::round(3.0e38);
    assert_eq!(big.mul(Bf16::round(10.0)).to_bits(), MAX_FINITE);
    assert_eq!(big.mul(Bf16::round(-10.0)).to_bits(), 0x8000 | MAX_FINITE);
    assert!(scale_multiply(3.0e38, 10.0, true).is_finite());
}
