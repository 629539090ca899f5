use crate::error::{QuantError, Result};
use rayon::prelude::*;

/// Plain f32 `a (m x k) * b (k x n)`, row-major. A numeric baseline, nothing quantized.
pub fn matmul(a: &[f32], b: &[f32], out: &mut [f32], m: usize, k: usize, n: usize) -> Result<()> {
    if a.len() < m * k || b.len() < k * n || out.len() < m * n {
        return Err(QuantError::ShapeMismatch(format!("matmul {}x{} * {}x{} with buffers {}/{}/{}", m, k, k, n, a.len(), b.len(), out.len())));
    }
    if m * n == 0 {
        return Ok(());
    }
    out[..m * n].par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        let a_row = &a[i * k..(i + 1) * k];
        for (j, o) in row.iter_mut().enumerate() {
            let mut sum = 0f32;
            for p in 0..k { sum += a_row[p] * b[p * n + j]; }
            *o = sum;
        }
    });
    Ok(())
}
