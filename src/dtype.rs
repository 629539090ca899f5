//! Numeric tags for untyped buffers and the typed views recovered from them.

use crate::error::{QuantError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of element types a buffer can hold. Always supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    I32,
    I8,
    U8,
}

impl DType {
    pub fn size(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::I8 | DType::U8 => 1,
        }
    }

    pub fn is_narrow(self) -> bool { matches!(self, DType::I8 | DType::U8) }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F32 => "float32",
            DType::I32 => "int32",
            DType::I8 => "int8",
            DType::U8 => "uint8",
        };
        f.write_str(s)
    }
}

/// A plain element with a little-endian byte encoding.
pub trait Element: Copy + Send + Sync + Default + 'static {
    const DTYPE: DType;
    fn read_le(b: &[u8]) -> Self;
    fn write_le(self, out: &mut [u8]);
}

macro_rules! impl_element {
    ($t:ty, $tag:expr, $n:expr) => {
        impl Element for $t {
            const DTYPE: DType = $tag;
            #[inline]
            fn read_le(b: &[u8]) -> Self {
                let mut a = [0u8; $n];
                a.copy_from_slice(&b[..$n]);
                <$t>::from_le_bytes(a)
            }
            #[inline]
            fn write_le(self, out: &mut [u8]) { out[..$n].copy_from_slice(&self.to_le_bytes()); }
        }
    };
}

impl_element!(f32, DType::F32, 4);
impl_element!(i32, DType::I32, 4);
impl_element!(i8, DType::I8, 1);
impl_element!(u8, DType::U8, 1);

/// Check that `bytes` holds at least `count` elements of `dtype`.
pub fn check_len(bytes: &[u8], dtype: DType, count: usize) -> Result<()> {
    let needed = count * dtype.size();
    if bytes.len() < needed {
        return Err(QuantError::BufferTooSmall { needed, got: bytes.len() });
    }
    Ok(())
}

/// Decode the first `count` elements of an untyped buffer.
pub fn decode<T: Element>(bytes: &[u8], count: usize) -> Result<Vec<T>> {
    check_len(bytes, T::DTYPE, count)?;
    let w = T::DTYPE.size();
    Ok(bytes[..count * w].chunks_exact(w).map(T::read_le).collect())
}

/// Write typed values into the head of an untyped buffer. Caller has checked the length.
pub fn encode<T: Element>(values: &[T], out: &mut [u8]) {
    let w = T::DTYPE.size();
    for (v, chunk) in values.iter().zip(out.chunks_exact_mut(w)) {
        v.write_le(chunk);
    }
}

/// Encode into a fresh byte vector; used by the harness to build buffers.
pub fn to_bytes<T: Element>(values: &[T]) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * T::DTYPE.size()];
    encode(values, &mut out);
    out
}
