//! Float -> integer conversion under the accelerator's rounding policies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundingMode {
    /// 2.5 -> 3, -2.5 -> -3
    HalfAwayFromZero,
    /// floor(x + 0.5): 2.5 -> 3, -2.5 -> -2
    HalfUp,
    /// Truncation.
    TowardsZero,
    /// Banker's rounding: ties go to the even neighbour.
    HalfToEven,
}

impl RoundingMode {
    /// Round `value` to an integral f32. No saturation here.
    #[inline]
    pub fn apply(self, value: f32) -> f32 {
        match self {
            RoundingMode::HalfAwayFromZero => value.round(),
            RoundingMode::HalfUp => (value + 0.5).floor(),
            RoundingMode::TowardsZero => value.trunc(),
            RoundingMode::HalfToEven => half_to_even(value),
        }
    }
}

fn half_to_even(value: f32) -> f32 {
    let abs = value.abs();
    let int = abs.trunc();
    let frac = abs - int;
    let r = if frac > 0.5 {
        int + 1.0
    } else if frac == 0.5 {
        // odd integer part rounds up to the next even
        if int % 2.0 == 0.0 { int } else { int + 1.0 }
    } else {
        int
    };
    if value < 0.0 { -r } else { r }
}

/// Destination of the rounding primitive. Narrow types clamp, wide ones pass through.
pub trait RoundTarget: Copy {
    fn saturate(rounded: f32) -> Self;
}

impl RoundTarget for i8 {
    #[inline]
    fn saturate(r: f32) -> Self { r.clamp(i8::MIN as f32, i8::MAX as f32) as i8 }
}

impl RoundTarget for u8 {
    #[inline]
    fn saturate(r: f32) -> Self { r.clamp(0.0, u8::MAX as f32) as u8 }
}

impl RoundTarget for i32 {
    // Not clamped by the primitive; out-of-range floats follow Rust's saturating cast.
    #[inline]
    fn saturate(r: f32) -> Self { r as i32 }
}

/// Round `value` with `mode`, then saturate into `T`.
#[inline]
pub fn round_to<T: RoundTarget>(value: f32, mode: RoundingMode) -> T {
    T::saturate(mode.apply(value))
}
