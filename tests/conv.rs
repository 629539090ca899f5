use pretty_assertions::assert_eq;
use quantref::ops::conv::{conv2d, ConvParams, ConvShape};
use quantref::QuantError;

const Q31_ONE: i64 = 1 << 31;

fn identity(oc: usize) -> ConvParams {
    ConvParams { stride: 1, padding: 0, multipliers: vec![Q31_ONE; oc], shifts: vec![0; oc], saturate_output: false }
}

#[test]
fn ones_filter_sums_the_window() {
    let input: Vec<i8> = (1..=9).collect();
    let shape = ConvShape { input: [1, 1, 3, 3], filter: [1, 1, 3, 3] };
    let mut out = [0i8; 1];
    let out_shape = conv2d(&input, &[1; 9], None, &mut out, shape, &identity(1)).unwrap();
    assert_eq!(out_shape, [1, 1, 1, 1]);
    assert_eq!(out[0], 45);

    conv2d(&input, &[1; 9], Some(&[10]), &mut out, shape, &identity(1)).unwrap();
    assert_eq!(out[0], 55);
}

#[test]
fn overflow_wraps_unless_saturation_requested() {
    let input = [100i8; 9];
    let shape = ConvShape { input: [1, 1, 3, 3], filter: [1, 1, 3, 3] };
    let mut out = [0i8; 1];
    // 900 truncated to 8 bits
    conv2d(&input, &[1; 9], None, &mut out, shape, &identity(1)).unwrap();
    assert_eq!(out[0], -124);

    let mut p = identity(1);
    p.saturate_output = true;
    conv2d(&input, &[1; 9], None, &mut out, shape, &p).unwrap();
    assert_eq!(out[0], 127);
}

#[test]
fn zero_padding_counts_only_real_pixels() {
    let shape = ConvShape { input: [1, 1, 3, 3], filter: [1, 1, 3, 3] };
    let mut p = identity(1);
    p.padding = 1;
    let mut out = [0i8; 9];
    conv2d(&[1; 9], &[1; 9], None, &mut out, shape, &p).unwrap();
    assert_eq!(out, [4, 6, 4, 6, 9, 6, 4, 6, 4]);
}

#[test]
fn stride_shrinks_output() {
    let shape = ConvShape { input: [1, 1, 5, 5], filter: [1, 1, 3, 3] };
    let mut p = identity(1);
    p.stride = 2;
    let input: Vec<i8> = (0..25).collect();
    let mut out = [0i8; 4];
    assert_eq!(conv2d(&input, &[0, 0, 0, 0, 1, 0, 0, 0, 0], None, &mut out, shape, &p).unwrap(), [1, 1, 2, 2]);
    // centre tap picks pixels (1,1), (1,3), (3,1), (3,3)
    assert_eq!(out, [6, 8, 16, 18]);
}

#[test]
fn per_channel_shift_rounds_away_from_zero() {
    let shape = ConvShape { input: [1, 1, 3, 3], filter: [2, 1, 3, 3] };
    let input: Vec<i8> = (1..=9).collect();
    let mut filter = vec![1i8; 9];
    filter.extend(std::iter::repeat(-1i8).take(9));
    let mut p = identity(2);
    p.shifts = vec![1, 1];
    let mut out = [0i8; 2];
    conv2d(&input, &filter, None, &mut out, shape, &p).unwrap();
    // +-45 / 2 -> +-23
    assert_eq!(out, [23, -23]);
}

#[test]
fn multi_channel_input_accumulates_across_channels() {
    let shape = ConvShape { input: [1, 2, 1, 1], filter: [1, 2, 1, 1] };
    let mut out = [0i8; 1];
    conv2d(&[3, 4], &[5, -2], None, &mut out, shape, &identity(1)).unwrap();
    assert_eq!(out[0], 7);
}

#[test]
fn invalid_configurations_are_rejected() {
    let mut out = [0i8; 1];
    let bad_channels = ConvShape { input: [1, 2, 3, 3], filter: [1, 1, 3, 3] };
    assert!(matches!(conv2d(&[0; 18], &[0; 9], None, &mut out, bad_channels, &identity(1)), Err(QuantError::ShapeMismatch(_))));

    let shape = ConvShape { input: [1, 1, 3, 3], filter: [1, 1, 3, 3] };
    let mut p = identity(1);
    p.shifts = vec![-1];
    assert_eq!(conv2d(&[0; 9], &[0; 9], None, &mut out, shape, &p), Err(QuantError::InvalidShift { shift: -1, min: 0 }));

    let mut p = identity(1);
    p.multipliers = vec![(1 << 31) + 1];
    assert_eq!(conv2d(&[0; 9], &[0; 9], None, &mut out, shape, &p), Err(QuantError::InvalidMultiplier((1 << 31) + 1)));

    let too_big = ConvShape { input: [1, 1, 2, 2], filter: [1, 1, 3, 3] };
    assert!(conv2d(&[0; 4], &[0; 9], None, &mut out, too_big, &identity(1)).is_err());
}
