use rayon::prelude::*;

/// `out[m][n] = sum_k lhs[m][k] * rhs[n][k]` with every row contiguous.
///
/// `rhs` holds one packed patch per output column, so both operands are
/// walked sequentially. Output rows are computed in parallel.
pub fn gemm_nt(lhs: &[f32], rhs: &[f32], depth: usize, out: &mut [f32]) {
    if depth == 0 {
        out.fill(0.0);
        return;
    }
    let cols = rhs.len() / depth;
    out.par_chunks_mut(cols)
        .zip(lhs.par_chunks(depth))
        .for_each(|(out_row, lhs_row)| {
            for (dst, rhs_row) in out_row.iter_mut().zip(rhs.chunks(depth)) {
                *dst = dot(lhs_row, rhs_row);
            }
        });
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
