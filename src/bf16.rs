//! Reduced16: the upper half of an IEEE-754 f32 (sign, 8-bit exponent, 7 mantissa bits),
//! as consumed by the vendor scale-multiply unit.

/// Largest finite Reduced16 magnitude (exponent 0xfe, mantissa all ones).
pub const MAX_FINITE: u16 = 0x7f7f;
const EXP_MASK: u16 = 0x7f80;
const SIGN_MASK: u16 = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bf16(u16);

impl Bf16 {
    pub const fn from_bits(bits: u16) -> Self { Self(bits) }
    pub const fn to_bits(self) -> u16 { self.0 }

    /// Keep the upper 16 bits verbatim; this truncates toward zero in magnitude.
    #[inline]
    pub fn truncate(value: f32) -> Self { Self((value.to_bits() >> 16) as u16) }

    /// Round to nearest even at the 16-bit boundary. The unit never emits an
    /// all-ones exponent, so those patterns clamp to the largest finite value.
    #[inline]
    pub fn round(value: f32) -> Self {
        let bits = value.to_bits();
        let lsb = (bits >> 16) & 1;
        let hi = (bits.wrapping_add(0x7fff + lsb) >> 16) as u16;
        if hi & EXP_MASK == EXP_MASK {
            Self((hi & SIGN_MASK) | MAX_FINITE)
        } else {
            Self(hi)
        }
    }

    #[inline]
    pub fn from_f32(value: f32, round_up: bool) -> Self {
        if round_up { Self::round(value) } else { Self::truncate(value) }
    }

    #[inline]
    pub fn to_f32(self) -> f32 { f32::from_bits((self.0 as u32) << 16) }

    /// Promote both operands, multiply in full f32, round the product back.
    #[inline]
    pub fn mul(self, rhs: Bf16) -> Bf16 { Bf16::round(self.to_f32() * rhs.to_f32()) }
}

/// `value * scale` as the scale unit computes it: both operands reduced first.
#[inline]
pub fn scale_multiply(value: f32, scale: f32, round_inputs: bool) -> f32 {
    Bf16::from_f32(value, round_inputs).mul(Bf16::from_f32(scale, round_inputs)).to_f32()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_clamps_to_max_finite() {
        assert_eq!(Bf16::round(f32::MAX).to_bits(), MAX_FINITE);
        assert_eq!(Bf16::round(-f32::MAX).to_bits(), SIGN_MASK | MAX_FINITE);
        assert_eq!(Bf16::round(f32::INFINITY).to_bits(), MAX_FINITE);
    }

    #[test]
    fn tie_goes_to_even_mantissa() {
        // 1 + 2^-8 sits exactly between 1.0 and 1 + 2^-7
        let x = f32::from_bits(0x3f80_8000);
        assert_eq!(Bf16::round(x).to_bits(), 0x3f80);
        // 1 + 3 * 2^-8 sits between 1 + 2^-7 (odd) and 1 + 2^-6 (even)
        let y = f32::from_bits(0x3f81_8000);
        assert_eq!(Bf16::round(y).to_bits(), 0x3f82);
    }
}
