//! Householder QR with column pivoting.
//!
//! `A P = Q R` where `P` is a column permutation chosen greedily by largest
//! remaining column norm. The leading `fixed_leading` columns are exempt from
//! pivoting and stay in place, which lets the intercept column of a design
//! matrix keep position 0. `faer`'s `ColPivQr` pivots every column and has
//! no way to hold a leading block in place, hence the hand-written loop.
//!
//! `Q` is never formed; the reflectors are kept so `Qᵀy` can be applied.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

/// The result of a (partially) pivoted Householder QR.
#[derive(Debug, Clone)]
pub struct PivotedQr {
    /// Upper-triangular factor, `min(n, p)` x `p`, columns in pivot order.
    r: Array2<f64>,
    /// `pivot[j]` is the original index of the j-th column of `r`.
    pivot: Vec<usize>,
    /// Householder vectors `v` and `vᵀv` per step; `None` when the column was
    /// already zero and no reflection was applied.
    reflectors: Vec<Option<(Array1<f64>, f64)>>,
    n_rows: usize,
}

/// Factor `a`. Columns `0..fixed_leading` are never pivoted.
pub fn pivoted_qr(a: ArrayView2<f64>, fixed_leading: usize) -> PivotedQr {
    let (n, p) = a.dim();
    let k = n.min(p);
    let mut w = a.to_owned();
    let mut pivot: Vec<usize> = (0..p).collect();
    let mut reflectors = Vec::with_capacity(k);

    for j in 0..k {
        if j >= fixed_leading {
            // Ties keep the lowest index.
            let mut best = j;
            let mut best_norm = remaining_norm_sq(&w, j, j);
            for c in j + 1..p {
                let norm = remaining_norm_sq(&w, j, c);
                if norm > best_norm {
                    best = c;
                    best_norm = norm;
                }
            }
            if best != j {
                swap_columns(&mut w, j, best);
                pivot.swap(j, best);
            }
        }

        let x = w.slice(s![j.., j]).to_owned();
        let norm_x = x.dot(&x).sqrt();
        if norm_x == 0.0 {
            reflectors.push(None);
            continue;
        }

        let alpha = if x[0] >= 0.0 { -norm_x } else { norm_x };
        let mut v = x;
        v[0] -= alpha;
        let vtv = v.dot(&v);

        for mut col in w.slice_mut(s![j.., j..]).columns_mut() {
            let d = 2.0 * v.dot(&col) / vtv;
            col.scaled_add(-d, &v);
        }
        w[[j, j]] = alpha;
        w.slice_mut(s![j + 1.., j]).fill(0.0);

        reflectors.push(Some((v, vtv)));
    }

    let r = w.slice(s![..k, ..]).to_owned();
    PivotedQr {
        r,
        pivot,
        reflectors,
        n_rows: n,
    }
}

fn remaining_norm_sq(w: &Array2<f64>, from_row: usize, col: usize) -> f64 {
    w.slice(s![from_row.., col]).iter().map(|x| x * x).sum()
}

fn swap_columns(w: &mut Array2<f64>, a: usize, b: usize) {
    for mut row in w.rows_mut() {
        row.swap(a, b);
    }
}

/// Frobenius norm of a matrix.
pub fn frobenius_norm<S>(matrix: &ndarray::ArrayBase<S, ndarray::Ix2>) -> f64
where
    S: ndarray::Data<Elem = f64>,
{
    matrix.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

impl PivotedQr {
    pub fn r(&self) -> &Array2<f64> {
        &self.r
    }

    pub fn pivot(&self) -> &[usize] {
        &self.pivot
    }

    /// `max(n, p) * eps * ||R||_F`: diagonal entries of `R` at or below this
    /// magnitude are treated as zero.
    pub fn rank_tolerance(&self) -> f64 {
        let (n, p) = (self.n_rows, self.r.ncols());
        n.max(p) as f64 * f64::EPSILON * frobenius_norm(&self.r)
    }

    /// Original indices of the columns whose diagonal entry is above the
    /// rank tolerance, ascending.
    pub fn independent_columns(&self) -> Vec<usize> {
        let tol = self.rank_tolerance();
        let mut cols: Vec<usize> = self
            .r
            .diag()
            .iter()
            .enumerate()
            .filter(|(_, d)| d.abs() > tol)
            .map(|(j, _)| self.pivot[j])
            .collect();
        cols.sort_unstable();
        cols
    }

    pub fn rank(&self) -> usize {
        self.independent_columns().len()
    }

    /// Apply `Qᵀ` to `y`.
    pub fn apply_qt(&self, y: ArrayView1<f64>) -> Array1<f64> {
        let mut out = y.to_owned();
        for (j, refl) in self.reflectors.iter().enumerate() {
            if let Some((v, vtv)) = refl {
                let mut tail = out.slice_mut(s![j..]);
                let d = 2.0 * v.dot(&tail) / vtv;
                tail.scaled_add(-d, v);
            }
        }
        out
    }

    /// Least-squares solution of `A x ≈ y`, in original column order.
    ///
    /// Returns `None` unless `A` has at least as many rows as columns and
    /// every diagonal entry of `R` is non-zero.
    pub fn solve(&self, y: ArrayView1<f64>) -> Option<Array1<f64>> {
        let p = self.r.ncols();
        if self.r.nrows() < p || self.r.diag().iter().any(|d| *d == 0.0) {
            return None;
        }
        let qty = self.apply_qt(y);
        let z = back_substitute(self.r.view(), qty.slice(s![..p]));
        let mut x = Array1::zeros(p);
        for (j, &orig) in self.pivot.iter().enumerate() {
            x[orig] = z[j];
        }
        Some(x)
    }

    /// Diagonal of `(AᵀA)⁻¹` in original column order, for coefficient
    /// standard errors. Same preconditions as [`PivotedQr::solve`].
    pub fn unscaled_variances(&self) -> Option<Array1<f64>> {
        let p = self.r.ncols();
        if self.r.nrows() < p || self.r.diag().iter().any(|d| *d == 0.0) {
            return None;
        }
        // (RᵀR)⁻¹ = R⁻¹ R⁻ᵀ, so its diagonal is the squared row norms of R⁻¹.
        let mut r_inv = Array2::<f64>::zeros((p, p));
        for c in 0..p {
            let mut e = Array1::<f64>::zeros(p);
            e[c] = 1.0;
            let col = back_substitute(self.r.view(), e.view());
            r_inv.column_mut(c).assign(&col);
        }
        let mut out = Array1::zeros(p);
        for (j, &orig) in self.pivot.iter().enumerate() {
            out[orig] = r_inv.row(j).iter().map(|x| x * x).sum::<f64>();
        }
        Some(out)
    }
}

/// Solve `R z = b` for upper-triangular square `R` (leading `b.len()` block).
fn back_substitute(r: ArrayView2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let p = b.len();
    let mut z = Array1::<f64>::zeros(p);
    for i in (0..p).rev() {
        let mut acc = b[i];
        for k in i + 1..p {
            acc -= r[[i, k]] * z[k];
        }
        z[i] = acc / r[[i, i]];
    }
    z
}
