/*!
# Mass matrix for the augmented Hamiltonian system.

The momentum distribution is 𝒩(0, M) with M chosen from the posterior
curvature: `M = gravity · A` where A is the model's precomputed quadratic
form. Matching M to A makes the Hamiltonian flow near-circular in
transformed coordinates, which is what keeps acceptance high when A is
ill-conditioned.

Three shapes are supported and bound at construction, so the leap-frog
inner loop dispatches on a plain enum instead of a trait object:

- **Full**: M = gravity·A, with Cholesky factor, full inverse, and the
  diagonal fallbacks.
- **Diagonal**: M = diag(gravity·A).
- **Identity**: M = I.

For the full shape, two independent toggles select how much of M each
operation uses: `correlated_momenta` draws proposals through the Cholesky
factor L (otherwise only the diagonal stds are used), and
`general_kinetic` evaluates ½ pᵀM⁻¹p with the full inverse (otherwise
with 1/M_ii). The drift velocity M⁻¹p follows the kinetic-energy choice.
*/

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};
use crate::linalg::{cholesky_lower, dominant_eigenvalue, invert_lower_triangular};
use crate::random::RandomSource;

/// Which part of the ideal matrix gravity·A the mass matrix keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MassKind {
    Full,
    Diagonal,
    Identity,
}

impl MassKind {
    /// Maps the numeric CLI encoding (0 full, 1 diagonal, 2 identity).
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Full),
            1 => Ok(Self::Diagonal),
            2 => Ok(Self::Identity),
            other => Err(Error::Config(format!(
                "mass matrix type must be 0, 1, or 2, got {}",
                other
            ))),
        }
    }
}

/// The mass matrix with its precomputed factors.
#[derive(Debug, Clone)]
pub enum MassMatrix {
    Full {
        chol: Array2<f64>,
        inverse: Array2<f64>,
        diag_std: Array1<f64>,
        inv_diag: Array1<f64>,
        correlated_momenta: bool,
        general_kinetic: bool,
    },
    Diagonal {
        std: Array1<f64>,
        inv: Array1<f64>,
    },
    Identity {
        dim: usize,
    },
}

impl MassMatrix {
    /// Builds M = gravity·A (or its diagonal, or I) and the derived factors.
    ///
    /// Fails with [`Error::Numerical`] if the full matrix is not positive
    /// definite, and with [`Error::Config`] for a non-positive gravity.
    pub fn build(
        a: &Array2<f64>,
        gravity: f64,
        kind: MassKind,
        correlated_momenta: bool,
        general_kinetic: bool,
    ) -> Result<Self> {
        if gravity <= 0.0 || !gravity.is_finite() {
            return Err(Error::Config(format!(
                "mass matrix gravity must be positive, got {}",
                gravity
            )));
        }
        let dim = a.nrows();
        match kind {
            MassKind::Full => {
                let ideal = a.mapv(|v| gravity * v);
                let chol = cholesky_lower(&ideal)?;
                let chol_inv = invert_lower_triangular(&chol)?;
                let inverse = chol_inv.t().dot(&chol_inv);
                let diag = ideal.diag().to_owned();
                Ok(Self::Full {
                    chol,
                    inverse,
                    diag_std: diag.mapv(f64::sqrt),
                    inv_diag: diag.mapv(|d| 1.0 / d),
                    correlated_momenta,
                    general_kinetic,
                })
            }
            MassKind::Diagonal => {
                let diag = a.diag().mapv(|v| gravity * v);
                if diag.iter().any(|&d| d <= 0.0 || !d.is_finite()) {
                    return Err(Error::Numerical(
                        "diagonal mass matrix requires positive diagonal entries".into(),
                    ));
                }
                Ok(Self::Diagonal {
                    std: diag.mapv(f64::sqrt),
                    inv: diag.mapv(|d| 1.0 / d),
                })
            }
            MassKind::Identity => Ok(Self::Identity { dim }),
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            Self::Full { diag_std, .. } => diag_std.len(),
            Self::Diagonal { std, .. } => std.len(),
            Self::Identity { dim } => *dim,
        }
    }

    /// Draws a fresh momentum p ~ 𝒩(0, M).
    ///
    /// For the full shape with `correlated_momenta` unset, only the diagonal
    /// stds √M_ii are used, matching the cheaper uncorrelated proposal.
    pub fn sample_momentum(&self, rng: &mut RandomSource) -> Array1<f64> {
        match self {
            Self::Full {
                chol,
                diag_std,
                correlated_momenta,
                ..
            } => {
                if *correlated_momenta {
                    rng.correlated_normal(chol)
                } else {
                    let z = rng.standard_normal_vector(diag_std.len());
                    z * diag_std
                }
            }
            Self::Diagonal { std, .. } => {
                let z = rng.standard_normal_vector(std.len());
                z * std
            }
            Self::Identity { dim } => rng.standard_normal_vector(*dim),
        }
    }

    /// Kinetic energy ½ pᵀM⁻¹p (full inverse or diagonal, per shape/toggle).
    pub fn kinetic(&self, p: &Array1<f64>) -> f64 {
        match self {
            Self::Full {
                inverse,
                inv_diag,
                general_kinetic,
                ..
            } => {
                if *general_kinetic {
                    0.5 * p.dot(&inverse.dot(p))
                } else {
                    0.5 * p.dot(&(inv_diag * p))
                }
            }
            Self::Diagonal { inv, .. } => 0.5 * p.dot(&(inv * p)),
            Self::Identity { .. } => 0.5 * p.dot(p),
        }
    }

    /// Drift velocity M⁻¹p, using the same matrix choice as [`Self::kinetic`].
    pub fn velocity(&self, p: &Array1<f64>) -> Array1<f64> {
        match self {
            Self::Full {
                inverse,
                inv_diag,
                general_kinetic,
                ..
            } => {
                if *general_kinetic {
                    inverse.dot(p)
                } else {
                    inv_diag * p
                }
            }
            Self::Diagonal { inv, .. } => inv * p,
            Self::Identity { .. } => p.clone(),
        }
    }

    /// √λ_max(M⁻¹A), the highest oscillation frequency of the Hamiltonian
    /// flow. The leap-frog scheme is stable only for Δt below 2 over this.
    pub fn max_frequency(&self, a: &Array2<f64>) -> f64 {
        let lambda = dominant_eigenvalue(|v| self.velocity(&a.dot(v)), self.dim());
        lambda.max(0.0).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::{arr1, arr2};

    fn spd() -> Array2<f64> {
        arr2(&[[4.0, 1.0], [1.0, 3.0]])
    }

    #[test]
    fn full_factors_reconstruct_the_scaled_matrix() {
        let mass = MassMatrix::build(&spd(), 2.0, MassKind::Full, true, true).unwrap();
        let MassMatrix::Full { chol, inverse, .. } = &mass else {
            panic!("expected full shape");
        };
        let m = chol.dot(&chol.t());
        assert_abs_diff_eq!(m, spd().mapv(|v| 2.0 * v), epsilon = 1e-12);

        let identity = m.dot(inverse);
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(identity[(i, j)], expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn kinetic_energy_agrees_with_explicit_quadratic_form() {
        let mass = MassMatrix::build(&spd(), 1.0, MassKind::Full, true, true).unwrap();
        let p = arr1(&[0.7, -1.3]);
        // (gravity·A)⁻¹ for A = [[4,1],[1,3]] is [[3,-1],[-1,4]]/11.
        let expected = 0.5 * (3.0 * 0.49 + 4.0 * 1.69 + 2.0 * 0.7 * 1.3) / 11.0;
        assert_relative_eq!(mass.kinetic(&p), expected, max_relative = 1e-12);
    }

    #[test]
    fn diagonal_kinetic_ignores_off_diagonal_coupling() {
        let full_diag_only =
            MassMatrix::build(&spd(), 1.0, MassKind::Full, true, false).unwrap();
        let diagonal = MassMatrix::build(&spd(), 1.0, MassKind::Diagonal, true, true).unwrap();
        let p = arr1(&[1.0, 2.0]);
        assert_relative_eq!(
            full_diag_only.kinetic(&p),
            diagonal.kinetic(&p),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            diagonal.kinetic(&p),
            0.5 * (1.0 / 4.0 + 4.0 / 3.0),
            max_relative = 1e-12
        );
    }

    #[test]
    fn identity_shape_is_the_euclidean_metric() {
        let mass = MassMatrix::build(&spd(), 1.0, MassKind::Identity, true, true).unwrap();
        let p = arr1(&[3.0, 4.0]);
        assert_relative_eq!(mass.kinetic(&p), 12.5, max_relative = 1e-12);
        assert_eq!(mass.velocity(&p), p);
    }

    #[test]
    fn correlated_momenta_have_the_mass_covariance() {
        let a = arr2(&[[4.0, 2.0], [2.0, 3.0]]);
        let mass = MassMatrix::build(&a, 1.0, MassKind::Full, true, true).unwrap();
        let mut rng = RandomSource::with_seed(17);
        let n = 50_000;
        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for _ in 0..n {
            let p = mass.sample_momentum(&mut rng);
            sxx += p[0] * p[0];
            sxy += p[0] * p[1];
            syy += p[1] * p[1];
        }
        assert!((sxx / n as f64 - 4.0).abs() < 0.15);
        assert!((sxy / n as f64 - 2.0).abs() < 0.1);
        assert!((syy / n as f64 - 3.0).abs() < 0.12);
    }

    #[test]
    fn non_spd_matrix_is_rejected() {
        let a = arr2(&[[1.0, 5.0], [5.0, 1.0]]);
        assert!(MassMatrix::build(&a, 1.0, MassKind::Full, true, true).is_err());
    }

    #[test]
    fn max_frequency_matches_analytic_value() {
        // M = I, A = diag(1, 9): λ_max(M⁻¹A) = 9, frequency 3.
        let a = arr2(&[[1.0, 0.0], [0.0, 9.0]]);
        let mass = MassMatrix::build(&a, 1.0, MassKind::Identity, true, true).unwrap();
        assert_relative_eq!(mass.max_frequency(&a), 3.0, max_relative = 1e-6);
    }
}
