use faer::{linalg::matmul::matmul, Accum, MatMut, MatRef, Par};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Standard deviation of the factor initialization.
pub(crate) const INIT_STD: f32 = 0.01;

// ── 8-wide unrolled dot product ──────────────────────────────────────────
#[inline(always)]
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut acc = [0.0f32; 8];
    let a_chunks = a.chunks_exact(8);
    let b_chunks = b.chunks_exact(8);
    let tail: f32 = a_chunks
        .remainder()
        .iter()
        .zip(b_chunks.remainder())
        .map(|(x, y)| x * y)
        .sum();
    for (ca, cb) in a_chunks.zip(b_chunks) {
        for lane in 0..8 {
            acc[lane] += ca[lane] * cb[lane];
        }
    }
    (acc[0] + acc[1] + acc[2] + acc[3]) + (acc[4] + acc[5] + acc[6] + acc[7]) + tail
}

// ── Factor update with snapshot ──────────────────────────────────────────
// Both pu[f] and qi[f] are read before either is written, so each side is
// updated from the other's pre-update value.
#[inline(always)]
pub(crate) fn update_factors(pu: &mut [f32], qi: &mut [f32], lr_err: f32, lr_reg: f32) {
    debug_assert_eq!(pu.len(), qi.len());
    for (p, q) in pu.iter_mut().zip(qi.iter_mut()) {
        let pf = *p;
        let qf = *q;
        *p = pf + lr_err * qf - lr_reg * pf;
        *q = qf + lr_err * pf - lr_reg * qf;
    }
}

/// `n * k` row-major factors drawn from `Normal(0, INIT_STD)`.
pub(crate) fn normal_factors<R: Rng + ?Sized>(n: usize, k: usize, rng: &mut R) -> Vec<f32> {
    (0..n * k)
        .map(|_| {
            let z: f32 = StandardNormal.sample(&mut *rng);
            z * INIT_STD
        })
        .collect()
}

/// Scores of every item for one user: `item_factors · user_vec`.
pub(crate) fn catalog_scores(item_factors: &[f32], user_vec: &[f32], n_items: usize) -> Vec<f32> {
    let k = user_vec.len();
    let mut scores = vec![0.0f32; n_items];
    if n_items == 0 || k == 0 {
        return scores;
    }
    matmul(
        MatMut::from_row_major_slice_mut(&mut scores, n_items, 1).as_mut(),
        Accum::Replace,
        MatRef::from_row_major_slice(item_factors, n_items, k),
        MatRef::from_row_major_slice(user_vec, k, 1),
        1.0f32,
        Par::Seq,
    );
    scores
}
