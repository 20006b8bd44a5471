/*!
# Störmer–Verlet (leap-frog) integration of Hamilton's equations.

Each step is the composition half-kick / full-drift / half-kick:

```text
p ← p − ½Δt ∇χ(m)      m ← m + Δt M⁻¹p      p ← p − ½Δt ∇χ(m)
```

The composition of these three explicit shears is symplectic, volume
preserving (unit Jacobian), and time-reversible under p → −p, which is
what the Metropolis acceptance rule needs for detailed balance.

After every step the no-U-turn criterion is checked against the start of
the trajectory: with α₁ = p·(m₀−m) and α₂ = p₀·(m−m₀), the trajectory
terminates early when both are positive, meaning the momentum is pulling
the state back past its starting point. Early termination is expected
behavior, not an error; the sampler counts it.
*/

use ndarray::Array1;

use crate::error::Result;
use crate::mass::MassMatrix;
use crate::model::LinearModel;
use crate::sink::TrajectorySink;

/// End state of one integrated trajectory.
#[derive(Debug, Clone)]
pub struct IntegrationResult {
    pub position: Array1<f64>,
    pub momentum: Array1<f64>,
    pub steps_taken: usize,
    pub early_termination: bool,
}

/// Integrates H(m, p) = χ(m) + K(p) for the linear-Gaussian model.
#[derive(Debug, Clone, Copy)]
pub struct LeapfrogIntegrator<'a> {
    model: &'a LinearModel,
    mass: &'a MassMatrix,
}

impl<'a> LeapfrogIntegrator<'a> {
    pub fn new(model: &'a LinearModel, mass: &'a MassMatrix) -> Self {
        Self { model, mass }
    }

    /// Advances `(start_position, start_momentum)` by up to `n_steps` steps
    /// of size `dt`, stopping early on a U-turn.
    ///
    /// When a `recorder` is supplied, the pre-drift state of every step is
    /// appended to it along with its misfit.
    pub fn integrate(
        &self,
        start_position: &Array1<f64>,
        start_momentum: &Array1<f64>,
        n_steps: usize,
        dt: f64,
        mut recorder: Option<&mut TrajectorySink>,
    ) -> Result<IntegrationResult> {
        let mut position = start_position.clone();
        let mut momentum = start_momentum.clone();
        let half = 0.5 * dt;
        let mut steps_taken = 0;
        let mut early_termination = false;

        for _ in 0..n_steps {
            let grad = self.model.grad(&position);
            momentum.scaled_add(-half, &grad);

            if let Some(rec) = recorder.as_deref_mut() {
                rec.write(&position, self.model.misfit(&position))?;
            }

            position.scaled_add(dt, &self.mass.velocity(&momentum));

            let grad = self.model.grad(&position);
            momentum.scaled_add(-half, &grad);
            steps_taken += 1;

            let angle_fresh = momentum.dot(&(start_position - &position));
            let angle_start = start_momentum.dot(&(&position - start_position));
            if angle_fresh > 0.0 && angle_start > 0.0 {
                early_termination = true;
                break;
            }
        }

        Ok(IntegrationResult {
            position,
            momentum,
            steps_taken,
            early_termination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mass::MassKind;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2};
    use tempfile::tempdir;

    /// G = I₂, d = 0, unit prior: A = 2I, a pure harmonic oscillator.
    fn harmonic_model() -> LinearModel {
        LinearModel::from_quadratic(
            arr2(&[[2.0, 0.0], [0.0, 2.0]]),
            arr1(&[0.0, 0.0]),
            0.0,
        )
        .unwrap()
    }

    fn identity_mass(dim: usize) -> MassMatrix {
        let eye = Array1::from_elem(dim, 1.0);
        let a = ndarray::Array2::from_diag(&eye);
        MassMatrix::build(&a, 1.0, MassKind::Identity, true, true).unwrap()
    }

    fn hamiltonian(model: &LinearModel, mass: &MassMatrix, m: &Array1<f64>, p: &Array1<f64>) -> f64 {
        model.misfit(m) + mass.kinetic(p)
    }

    /// Integrating forward, flipping the momentum, and integrating again
    /// must land back at the start (with the momentum flipped).
    #[test]
    fn integration_is_time_reversible() {
        let model = harmonic_model();
        let mass = identity_mass(2);
        let integrator = LeapfrogIntegrator::new(&model, &mass);

        let m0 = arr1(&[0.8, -0.3]);
        let p0 = arr1(&[0.2, 0.5]);
        let forward = integrator.integrate(&m0, &p0, 12, 0.05, None).unwrap();
        assert!(!forward.early_termination);

        let reversed_momentum = forward.momentum.mapv(|v| -v);
        let back = integrator
            .integrate(&forward.position, &reversed_momentum, 12, 0.05, None)
            .unwrap();
        assert!(!back.early_termination);

        assert_abs_diff_eq!(back.position, m0, epsilon = 1e-10);
        assert_abs_diff_eq!(back.momentum, p0.mapv(|v| -v), epsilon = 1e-10);
    }

    /// The flow map has unit Jacobian: a phase-space parallelogram keeps its
    /// signed area. Checked in 1-D (2-dimensional phase space) by
    /// propagating a base point and two offsets.
    #[test]
    fn integration_preserves_phase_space_volume() {
        let model =
            LinearModel::from_quadratic(arr2(&[[3.0]]), arr1(&[0.5]), 0.0).unwrap();
        let mass = identity_mass(1);
        let integrator = LeapfrogIntegrator::new(&model, &mass);

        let eps = 1e-6;
        let run = |m: f64, p: f64| {
            let r = integrator
                .integrate(&arr1(&[m]), &arr1(&[p]), 15, 0.1, None)
                .unwrap();
            (r.position[0], r.momentum[0])
        };

        let (m_base, p_base) = run(0.4, -0.2);
        let (m_dm, p_dm) = run(0.4 + eps, -0.2);
        let (m_dp, p_dp) = run(0.4, -0.2 + eps);

        let jacobian = ((m_dm - m_base) * (p_dp - p_base)
            - (m_dp - m_base) * (p_dm - p_base))
            / (eps * eps);
        assert_abs_diff_eq!(jacobian, 1.0, epsilon = 1e-6);
    }

    /// Halving Δt must shrink the energy error by about a factor of four.
    #[test]
    fn energy_error_scales_quadratically_in_step_size() {
        let model = harmonic_model();
        let mass = identity_mass(2);
        let integrator = LeapfrogIntegrator::new(&model, &mass);
        let m0 = arr1(&[1.0, 0.5]);
        let p0 = arr1(&[-0.4, 0.9]);
        let h0 = hamiltonian(&model, &mass, &m0, &p0);

        let drift = |dt: f64, n: usize| {
            let r = integrator.integrate(&m0, &p0, n, dt, None).unwrap();
            assert_eq!(r.steps_taken, n);
            (hamiltonian(&model, &mass, &r.position, &r.momentum) - h0).abs()
        };

        // Same total time 0.8, fine vs coarse discretization.
        let coarse = drift(0.2, 4);
        let fine = drift(0.1, 8);
        let ratio = coarse / fine;
        assert!(
            (2.0..8.0).contains(&ratio),
            "expected ~4x error reduction, got ratio {}",
            ratio
        );
    }

    /// A trajectory far longer than the oscillation half-period must turn
    /// around and trip the termination criterion.
    #[test]
    fn long_trajectory_terminates_on_u_turn() {
        let model = harmonic_model();
        let mass = identity_mass(2);
        let integrator = LeapfrogIntegrator::new(&model, &mass);

        let result = integrator
            .integrate(&arr1(&[0.0, 0.0]), &arr1(&[1.0, 0.5]), 400, 0.1, None)
            .unwrap();
        assert!(result.early_termination);
        assert!(result.steps_taken < 400);
    }

    #[test]
    fn recorder_sees_one_line_per_step() {
        let model = harmonic_model();
        let mass = identity_mass(2);
        let integrator = LeapfrogIntegrator::new(&model, &mass);

        let dir = tempdir().unwrap();
        let path = dir.path().join("trajectory.txt");
        let mut sink = TrajectorySink::create(&path, 2, 6).unwrap();
        let result = integrator
            .integrate(&arr1(&[0.3, 0.3]), &arr1(&[0.1, -0.1]), 6, 0.05, Some(&mut sink))
            .unwrap();
        sink.finish().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "2 6");
        assert_eq!(lines.len() - 1, result.steps_taken);
    }
}
