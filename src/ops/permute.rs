//! Pure data movement over 4-D tensors, by element byte width (1, 2 or 4).

use crate::error::{QuantError, Result};
use rayon::prelude::*;

fn check_width(elem_size: usize) -> Result<()> {
    match elem_size {
        1 | 2 | 4 => Ok(()),
        w => Err(QuantError::InvalidElementWidth(w)),
    }
}

fn strides(shape: [usize; 4]) -> [usize; 4] {
    [shape[1] * shape[2] * shape[3], shape[2] * shape[3], shape[3], 1]
}

/// Output dimension `i` is input dimension `perm[i]`. Returns the output shape.
pub fn permute4d(src: &[u8], dst: &mut [u8], shape: [usize; 4], perm: [usize; 4], elem_size: usize) -> Result<[usize; 4]> {
    check_width(elem_size)?;
    let mut seen = [false; 4];
    for &p in &perm {
        if p > 3 || seen[p] {
            return Err(QuantError::InvalidPermutation(perm));
        }
        seen[p] = true;
    }
    let count: usize = shape.iter().product();
    let bytes = count * elem_size;
    if src.len() < bytes || dst.len() < bytes {
        return Err(QuantError::BufferTooSmall { needed: bytes, got: src.len().min(dst.len()) });
    }
    let out_shape = [shape[perm[0]], shape[perm[1]], shape[perm[2]], shape[perm[3]]];
    if count == 0 {
        return Ok(out_shape);
    }
    let in_strides = strides(shape);
    let out_strides = strides(out_shape);
    dst[..bytes].par_chunks_mut(elem_size).enumerate().for_each(|(i, out)| {
        let mut src_idx = 0;
        let mut rem = i;
        for d in 0..4 {
            let coord = rem / out_strides[d];
            rem %= out_strides[d];
            src_idx += coord * in_strides[perm[d]];
        }
        out.copy_from_slice(&src[src_idx * elem_size..(src_idx + 1) * elem_size]);
    });
    Ok(out_shape)
}

/// Copy `src` into `dst` at `offset` along `axis`; every other dimension must match.
pub fn insert_along_axis(
    src: &[u8],
    src_shape: [usize; 4],
    dst: &mut [u8],
    dst_shape: [usize; 4],
    axis: usize,
    offset: usize,
    elem_size: usize,
) -> Result<()> {
    check_width(elem_size)?;
    if axis > 3 {
        return Err(QuantError::ShapeMismatch(format!("axis {} out of range", axis)));
    }
    for d in 0..4 {
        if d != axis && src_shape[d] != dst_shape[d] {
            return Err(QuantError::ShapeMismatch(format!("{:?} vs {:?} differ off axis {}", src_shape, dst_shape, axis)));
        }
    }
    if offset + src_shape[axis] > dst_shape[axis] {
        return Err(QuantError::ShapeMismatch(format!(
            "slice [{}, {}) exceeds axis length {}",
            offset,
            offset + src_shape[axis],
            dst_shape[axis]
        )));
    }
    let src_bytes = src_shape.iter().product::<usize>() * elem_size;
    let dst_bytes = dst_shape.iter().product::<usize>() * elem_size;
    if src.len() < src_bytes {
        return Err(QuantError::BufferTooSmall { needed: src_bytes, got: src.len() });
    }
    if dst.len() < dst_bytes {
        return Err(QuantError::BufferTooSmall { needed: dst_bytes, got: dst.len() });
    }
    let outer: usize = src_shape[..axis].iter().product();
    let inner: usize = src_shape[axis + 1..].iter().product::<usize>() * elem_size;
    let src_block = src_shape[axis] * inner;
    let dst_block = dst_shape[axis] * inner;
    if src_block == 0 || outer == 0 {
        return Ok(());
    }
    // one destination block per outer index; the slice lands at a fixed offset inside it
    dst[..outer * dst_block]
        .par_chunks_mut(dst_block)
        .zip(src[..outer * src_block].par_chunks(src_block))
        .for_each(|(d, s)| {
            let at = offset * inner;
            d[at..at + src_block].copy_from_slice(s);
        });
    Ok(())
}
