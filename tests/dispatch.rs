use pretty_assertions::assert_eq;
use quantref::dtype::{decode, to_bytes};
use quantref::ops::conv::{ConvParams, ConvShape};
use quantref::{AddScaling, DType, Dispatcher, Launcher, QuantError, RoundingMode};

#[test]
fn convert_float_to_int8_rounds_then_saturates() {
    let d = Dispatcher::default();
    let src = to_bytes(&[2.5f32, 3.5, -2.5, 200.0, -300.0]);
    let mut dst = [0u8; 5];
    d.convert(&src, DType::F32, &mut dst, DType::I8, 5, RoundingMode::HalfToEven).unwrap();
    assert_eq!(decode::<i8>(&dst, 5).unwrap(), vec![2, 4, -2, 127, -128]);
}

#[test]
fn convert_widens_narrow_ints_to_float() {
    let d = Dispatcher::default();
    let mut dst = [0u8; 12];
    d.convert(&to_bytes(&[-1i8, 0, 127]), DType::I8, &mut dst, DType::F32, 3, RoundingMode::HalfUp).unwrap();
    assert_eq!(decode::<f32>(&dst, 3).unwrap(), vec![-1.0, 0.0, 127.0]);

    let mut dst = [0u8; 3];
    d.convert(&to_bytes(&[-5i32, 100, 1000]), DType::I32, &mut dst, DType::U8, 3, RoundingMode::HalfUp).unwrap();
    assert_eq!(dst, [0, 100, 255]);
}

#[test]
fn unsupported_pair_writes_nothing() {
    let d = Dispatcher::default();
    let mut dst = [0xaau8; 4];
    let r = d.convert(&[1, 2, 3, 4], DType::I8, &mut dst, DType::U8, 4, RoundingMode::HalfUp);
    assert_eq!(r, Err(QuantError::Unsupported { from: DType::I8, to: DType::U8 }));
    assert_eq!(dst, [0xaa; 4]);
}

#[test]
fn zero_elements_is_a_no_op() {
    let d = Dispatcher::default();
    let mut dst = [0x55u8; 2];
    d.requantize(&[], &mut dst, DType::I8, 0, 1, 1, false, false).unwrap();
    d.convert(&[], DType::F32, &mut dst, DType::U8, 0, RoundingMode::HalfUp).unwrap();
    assert_eq!(dst, [0x55; 2]);
}

#[test]
fn short_buffers_are_rejected() {
    let d = Dispatcher::default();
    let mut dst = [0u8; 1];
    let r = d.convert(&to_bytes(&[1.0f32, 2.0]), DType::F32, &mut dst, DType::I8, 2, RoundingMode::HalfUp);
    assert_eq!(r, Err(QuantError::BufferTooSmall { needed: 2, got: 1 }));
}

#[test]
fn requantize_output_sign_follows_tag() {
    let d = Dispatcher::default();
    let src = to_bytes(&[-50i32, 50, 300]);
    let mut dst = [0u8; 3];
    d.requantize(&src, &mut dst, DType::U8, 3, 1 << 14, 14, false, false).unwrap();
    assert_eq!(dst, [0, 50, 255]);
    d.requantize(&src, &mut dst, DType::I8, 3, 1 << 14, 14, false, false).unwrap();
    assert_eq!(decode::<i8>(&dst, 3).unwrap(), vec![-50, 50, 127]);

    let r = d.requantize(&src, &mut dst, DType::I32, 3, 1 << 14, 14, false, false);
    assert_eq!(r, Err(QuantError::Unsupported { from: DType::I32, to: DType::I32 }));
}

#[test]
fn invalid_shift_fails_before_writing() {
    let d = Dispatcher::default();
    let mut dst = [7u8; 2];
    let r = d.requantize(&to_bytes(&[1i32, 2]), &mut dst, DType::I8, 2, 1, 0, false, false);
    assert_eq!(r, Err(QuantError::InvalidShift { shift: 0, min: 1 }));
    assert_eq!(dst, [7, 7]);
}

#[test]
fn per_channel_through_dispatch() {
    let d = Dispatcher::default();
    let mut dst = [0u8; 4];
    d.requantize_per_channel(&to_bytes(&[4i32, 4, 4, 4]), &mut dst, DType::I8, [1, 2, 1, 2], &[1 << 30, 1 << 29], &[0, 0], true, false).unwrap();
    assert_eq!(decode::<i8>(&dst, 4).unwrap(), vec![2, 2, 1, 1]);
}

#[test]
fn quantize_and_dequantize_affine() {
    let d = Dispatcher::default();
    let mut q = [0u8; 3];
    d.quantize(&to_bytes(&[0.5f32, 1.0, -1.0]), &mut q, DType::U8, 3, 0.5, 10, RoundingMode::HalfAwayFromZero).unwrap();
    assert_eq!(q, [11, 12, 8]);
    let mut x = [0u8; 12];
    d.dequantize(&q, DType::U8, &mut x, 3, 0.5, 10).unwrap();
    assert_eq!(decode::<f32>(&x, 3).unwrap(), vec![0.5, 1.0, -1.0]);
    assert!(d.dequantize(&to_bytes(&[1.0f32]), DType::F32, &mut x, 1, 1.0, 0).is_err());
}

#[test]
fn add_through_dispatch_uint8_inputs() {
    let d = Dispatcher::default();
    let mut dst = [0u8; 2];
    d.add(&[200, 10], &[100, 10], DType::U8, &mut dst, DType::U8, 2, 1 << 4, 1 << 4, AddScaling::Combined { shift: 4 }).unwrap();
    assert_eq!(dst, [255, 20]);
    let r = d.add(&[0; 8], &[0; 8], DType::I32, &mut dst, DType::I8, 2, 1, 1, AddScaling::Combined { shift: 1 });
    assert!(matches!(r, Err(QuantError::Unsupported { .. })));
}

#[test]
fn bf16_scale_through_dispatch() {
    let d = Dispatcher::default();
    let mut dst = [0u8; 8];
    d.bf16_scale(&to_bytes(&[3.0f32, 1.01171875]), &mut dst, 2, 0.5, true).unwrap();
    assert_eq!(decode::<f32>(&dst, 2).unwrap(), vec![1.5, 0.5078125]);
}

#[test]
fn conv_and_matmul_through_dispatch() {
    let d = Dispatcher::default();
    let input: Vec<i8> = (1..=9).collect();
    let shape = ConvShape { input: [1, 1, 3, 3], filter: [1, 1, 3, 3] };
    let params = ConvParams { stride: 1, padding: 0, multipliers: vec![1 << 31], shifts: vec![0], saturate_output: false };
    let mut out = [0u8; 1];
    assert_eq!(d.conv2d(&to_bytes(&input), &to_bytes(&[1i8; 9]), None, &mut out, shape, &params).unwrap(), [1, 1, 1, 1]);
    assert_eq!(out[0] as i8, 45);

    let mut c = [0u8; 4];
    d.matmul(&to_bytes(&[2.0f32]), &to_bytes(&[3.0f32]), &mut c, 1, 1, 1).unwrap();
    assert_eq!(decode::<f32>(&c, 1).unwrap(), vec![6.0]);
}

#[test]
fn thread_count_does_not_change_results() {
    let acc: Vec<i32> = (0..20_000).map(|i| (i * 7919) % 65_536 - 32_768).collect();
    let src = to_bytes(&acc);
    let run = |threads: usize| {
        let d = Dispatcher::new(Launcher::new(threads).unwrap());
        let mut dst = vec![0u8; acc.len()];
        d.requantize(&src, &mut dst, DType::I8, acc.len(), 0x1234_5678, 9, true, false).unwrap();
        dst
    };
    assert_eq!(run(1), run(4));
}

#[test]
fn dequantize_accepts_extreme_zero_points() {
    let d = Dispatcher::default();
    let mut x = [0u8; 4];
    d.dequantize(&[5u8], DType::U8, &mut x, 1, 1.0, i32::MIN).unwrap();
    assert_eq!(decode::<f32>(&x, 1).unwrap(), vec![5.0 - i32::MIN as f32]);
    d.dequantize(&to_bytes(&[-128i8]), DType::I8, &mut x, 1, 1.0, i32::MAX).unwrap();
    assert_eq!(decode::<f32>(&x, 1).unwrap(), vec![(-128i64 - i32::MAX as i64) as f32]);
}
