/*!
# Linear-Gaussian posterior model.

For a linear forward operator G, observed data d with diagonal noise
covariance, and a Gaussian prior with mean μ and diagonal covariance, the
negative log-posterior (up to a constant) is

```text
χ(m) = ½ (m−μ)ᵀ Σ_m⁻¹ (m−μ) + ½ (Gm−d)ᵀ Σ_d⁻¹ (Gm−d).
```

Evaluating χ through G on every call would cost O(MN) per evaluation.
Because the posterior is Gaussian, χ is a quadratic form, so construction
precomputes

```text
A = Σ_m⁻¹ + Gᵀ Σ_d⁻¹ G      b = Σ_m⁻¹ μ + Gᵀ Σ_d⁻¹ d
c = ½ (μᵀ Σ_m⁻¹ μ + dᵀ Σ_d⁻¹ d)
```

after which `χ(m) = ½ mᵀAm − bᵀm + c` and `∇χ(m) = Am − b`, one symmetric
matrix-vector product each.

## Example

```rust
use linear_hmc::model::{LinearModel, Observations, Prior};
use ndarray::{arr1, arr2};

let prior = Prior::new(arr1(&[0.0, 0.0]), arr1(&[1.0, 1.0]))?;
let observations = Observations::with_uniform_std(arr1(&[1.0, -1.0]), 1.0)?;
let forward = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
let model = LinearModel::from_parts(&prior, &observations, &forward)?;

// The posterior mode of this identity problem sits at d/2.
let mode = arr1(&[0.5, -0.5]);
assert!(model.grad(&mode).iter().all(|g| g.abs() < 1e-12));
# Ok::<(), linear_hmc::Error>(())
```
*/

use ndarray::{Array1, Array2, Axis};

use crate::error::{Error, Result};

/// Gaussian prior with per-parameter mean and standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct Prior {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl Prior {
    pub fn new(mean: Array1<f64>, std: Array1<f64>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(Error::Dimension(format!(
                "prior mean has {} entries but std has {}",
                mean.len(),
                std.len()
            )));
        }
        if std.iter().any(|&s| s <= 0.0 || !s.is_finite()) {
            return Err(Error::Numerical(
                "prior standard deviations must be positive and finite".into(),
            ));
        }
        Ok(Self { mean, std })
    }

    /// Broadcasts a scalar mean and std over `n` parameters.
    pub fn broadcast(mean: f64, std: f64, n: usize) -> Result<Self> {
        Self::new(Array1::from_elem(n, mean), Array1::from_elem(n, std))
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Componentwise 1/σ², the diagonal of Σ_m⁻¹.
    pub fn inverse_variance(&self) -> Array1<f64> {
        self.std.mapv(|s| 1.0 / (s * s))
    }
}

/// Observed data with per-datum noise standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observations {
    pub values: Array1<f64>,
    pub std: Array1<f64>,
}

impl Observations {
    pub fn new(values: Array1<f64>, std: Array1<f64>) -> Result<Self> {
        if values.len() != std.len() {
            return Err(Error::Dimension(format!(
                "data has {} entries but noise std has {}",
                values.len(),
                std.len()
            )));
        }
        if std.iter().any(|&s| s <= 0.0 || !s.is_finite()) {
            return Err(Error::Numerical(
                "data standard deviations must be positive and finite".into(),
            ));
        }
        Ok(Self { values, std })
    }

    /// Uses the same noise std for every observation.
    pub fn with_uniform_std(values: Array1<f64>, std: f64) -> Result<Self> {
        let n = values.len();
        Self::new(values, Array1::from_elem(n, std))
    }

    /// Componentwise 1/σ², the diagonal of Σ_d⁻¹.
    pub fn inverse_variance(&self) -> Array1<f64> {
        self.std.mapv(|s| 1.0 / (s * s))
    }
}

/// The posterior quadratic form (A, b, c) of a linear-Gaussian inversion.
#[derive(Debug, Clone)]
pub struct LinearModel {
    a: Array2<f64>,
    b: Array1<f64>,
    c: f64,
}

impl LinearModel {
    /// Builds the quadratic form from prior, observations, and forward matrix.
    pub fn from_parts(
        prior: &Prior,
        observations: &Observations,
        forward: &Array2<f64>,
    ) -> Result<Self> {
        let (n_data, n_params) = forward.dim();
        if prior.len() != n_params {
            return Err(Error::Dimension(format!(
                "forward matrix has {} columns but the prior has {} parameters",
                n_params,
                prior.len()
            )));
        }
        if observations.values.len() != n_data {
            return Err(Error::Dimension(format!(
                "forward matrix has {} rows but there are {} observations",
                n_data,
                observations.values.len()
            )));
        }

        let prior_inv_var = prior.inverse_variance();
        let data_inv_var = observations.inverse_variance();

        // Gᵀ Σ_d⁻¹ G, with the diagonal Σ_d⁻¹ applied as a row scaling.
        let weighted = forward * &data_inv_var.clone().insert_axis(Axis(1));
        let mut a = forward.t().dot(&weighted);
        for i in 0..n_params {
            a[(i, i)] += prior_inv_var[i];
        }

        let b = &prior_inv_var * &prior.mean
            + forward.t().dot(&(&data_inv_var * &observations.values));
        let c = 0.5
            * (prior.mean.dot(&(&prior_inv_var * &prior.mean))
                + observations
                    .values
                    .dot(&(&data_inv_var * &observations.values)));

        Ok(Self { a, b, c })
    }

    /// Uses a quadratic form read directly from files (A, b, c given).
    pub fn from_quadratic(a: Array2<f64>, b: Array1<f64>, c: f64) -> Result<Self> {
        if a.nrows() != a.ncols() {
            return Err(Error::Dimension(format!(
                "quadratic-form matrix must be square, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        if b.len() != a.nrows() {
            return Err(Error::Dimension(format!(
                "quadratic-form matrix is {0}x{0} but the linear term has {1} entries",
                a.nrows(),
                b.len()
            )));
        }
        Ok(Self { a, b, c })
    }

    /// Number of model parameters N.
    pub fn dim(&self) -> usize {
        self.b.len()
    }

    /// The precomputed SPD matrix A, also the mass-matrix seed.
    pub fn quadratic(&self) -> &Array2<f64> {
        &self.a
    }

    /// χ(m) = ½ mᵀAm − bᵀm + c.
    ///
    /// # Panics
    ///
    /// Panics if `m` has the wrong dimension.
    pub fn misfit(&self, m: &Array1<f64>) -> f64 {
        assert_eq!(m.len(), self.dim(), "misfit called with wrong dimension");
        0.5 * m.dot(&self.a.dot(m)) - self.b.dot(m) + self.c
    }

    /// ∇χ(m) = Am − b. A is symmetric, so left and right products agree.
    pub fn grad(&self, m: &Array1<f64>) -> Array1<f64> {
        assert_eq!(m.len(), self.dim(), "grad called with wrong dimension");
        self.a.dot(m) - &self.b
    }
}
