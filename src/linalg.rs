//! Dense factorizations for symmetric positive definite matrices.

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// Computes the lower-triangular Cholesky factor L with A = LLᵀ.
///
/// Returns [`Error::Numerical`] if `a` is not symmetric positive definite
/// (a pivot comes out non-positive or non-finite).
pub fn cholesky_lower(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(Error::Dimension(format!(
            "Cholesky factorization needs a square matrix, got {}x{}",
            a.nrows(),
            a.ncols()
        )));
    }
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[(i, j)];
            for k in 0..j {
                sum -= l[(i, k)] * l[(j, k)];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(Error::Numerical(format!(
                        "matrix is not positive definite (pivot {} at row {})",
                        sum, i
                    )));
                }
                l[(i, j)] = sum.sqrt();
            } else {
                l[(i, j)] = sum / l[(j, j)];
            }
        }
    }
    Ok(l)
}

/// Inverts a lower-triangular matrix by forward substitution.
pub fn invert_lower_triangular(l: &Array2<f64>) -> Result<Array2<f64>> {
    let n = l.nrows();
    let mut inv = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        let d = l[(i, i)];
        if d == 0.0 || !d.is_finite() {
            return Err(Error::Numerical(format!(
                "triangular matrix is singular at row {}",
                i
            )));
        }
        inv[(i, i)] = 1.0 / d;
        for j in (i + 1)..n {
            let mut sum = 0.0;
            for k in i..j {
                sum += l[(j, k)] * inv[(k, i)];
            }
            inv[(j, i)] = -sum / l[(j, j)];
        }
    }
    Ok(inv)
}

/// Inverts an SPD matrix via its Cholesky factor: A⁻¹ = L⁻ᵀ L⁻¹.
pub fn spd_inverse(a: &Array2<f64>) -> Result<Array2<f64>> {
    let l = cholesky_lower(a)?;
    let l_inv = invert_lower_triangular(&l)?;
    Ok(l_inv.t().dot(&l_inv))
}

/// Estimates the dominant eigenvalue of the linear map `apply` by power
/// iteration. The map must have real positive spectrum (here: M⁻¹A with both
/// factors SPD), for which the iteration converges from a generic start.
pub fn dominant_eigenvalue<F>(apply: F, dim: usize) -> f64
where
    F: Fn(&Array1<f64>) -> Array1<f64>,
{
    let mut v = Array1::<f64>::from_elem(dim, 1.0 / (dim as f64).sqrt());
    let mut lambda = 0.0;
    for _ in 0..200 {
        let w = apply(&v);
        let next = v.dot(&w);
        let norm = w.dot(&w).sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return next;
        }
        v = w / norm;
        if (next - lambda).abs() <= 1e-10 * next.abs().max(1.0) {
            return next;
        }
        lambda = next;
    }
    lambda
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn cholesky_recovers_known_factor() {
        let a = arr2(&[[4.0, 2.0], [2.0, 3.0]]);
        let l = cholesky_lower(&a).unwrap();
        assert_abs_diff_eq!(l[(0, 0)], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(l[(1, 0)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(l[(1, 1)], 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_eq!(l[(0, 1)], 0.0);

        let reconstructed = l.dot(&l.t());
        assert_abs_diff_eq!(reconstructed, a, epsilon = 1e-12);
    }

    #[test]
    fn cholesky_rejects_indefinite_matrix() {
        let a = arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        assert!(matches!(cholesky_lower(&a), Err(Error::Numerical(_))));
    }

    #[test]
    fn spd_inverse_round_trips() {
        let a = arr2(&[[5.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 2.0]]);
        let inv = spd_inverse(&a).unwrap();
        let identity = a.dot(&inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(identity[(i, j)], expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn triangular_inverse_matches_direct() {
        let l = arr2(&[[2.0, 0.0], [3.0, 4.0]]);
        let inv = invert_lower_triangular(&l).unwrap();
        let identity = l.dot(&inv);
        assert_abs_diff_eq!(identity[(0, 0)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(identity[(1, 1)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(identity[(1, 0)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn power_iteration_finds_largest_eigenvalue() {
        let a = arr2(&[[1.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 3.0]]);
        let lambda = dominant_eigenvalue(|v| a.dot(v), 3);
        assert_abs_diff_eq!(lambda, 5.0, epsilon = 1e-6);
    }
}
