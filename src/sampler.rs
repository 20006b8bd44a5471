/*!
# Posterior sampler for the linear-Gaussian model.

Drives a single Markov chain over the posterior π(m|d) ∝ exp(−χ(m)) with
one of two proposal mechanisms:

- **Hamiltonian Monte Carlo**: augment the state with a momentum drawn
  from the mass matrix, integrate Hamilton's equations with the leap-frog
  scheme, and accept with the Metropolis rule on the total energy
  H(m, p) = χ(m) + K(p).
- **Metropolis-Hastings**: draw independent proposals from the prior and
  accept on χ alone.

Because H is conserved along an exact trajectory, the Hamiltonian at the
*start* of a trajectory (current model, fresh momentum) already equals the
end-of-trajectory energy up to integration error. With
[`Settings::test_before`] set, the accept/reject decision is therefore
made *before* running the integrator, and the leap-frog is only paid for
on acceptance; a rejection costs a single matrix-vector product instead
of `n_steps` of them.

Accepted states are appended to the owned [`SampleSink`]; rejected
proposals are not emitted (the on-disk record carries multiplicity by
omission, with the acceptance count in the footer). The full chain
history, with the rejected-state repetitions, is returned in memory for
analysis.
*/

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::leapfrog::LeapfrogIntegrator;
use crate::mass::{MassKind, MassMatrix};
use crate::model::{LinearModel, Prior};
use crate::random::RandomSource;
use crate::sink::{SampleSink, TrajectorySink};

/// Energy drift along one trajectory beyond this triggers a stderr warning
/// and is counted in [`RunSummary::drift_events`].
const DRIFT_WARNING_THRESHOLD: f64 = 10.0;

/// Safety factor applied to the leap-frog stability bound 2/ω_max when the
/// time step is adapted; leaves room for the ergodic jitter's 1.5x scaling.
const STABILITY_MARGIN: f64 = 0.5;

/// Tuning knobs of a sampling run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Number of proposals P (chain length including the initial state).
    pub proposals: usize,
    /// Leap-frog steps per trajectory.
    pub n_steps: usize,
    /// Leap-frog step size Δt.
    pub time_step: f64,
    /// Temperature in the acceptance rule exp(−ΔH/T).
    pub temperature: f64,
    /// Scaling of the ideal mass matrix M = gravity·A.
    pub gravity: f64,
    /// Shape of the mass matrix.
    pub mass_kind: MassKind,
    /// Propose momenta through the full Cholesky factor.
    pub correlated_momenta: bool,
    /// Use the full inverse mass matrix for kinetic energy and drift.
    pub general_kinetic: bool,
    /// Rescale each fresh momentum to the previous momentum's norm.
    pub normalize_momentum: bool,
    /// Evaluate the Hamiltonian before propagating; integrate on accept only.
    pub test_before: bool,
    /// Scale n_steps and Δt by U(0.5, 1.5) per proposal.
    pub ergodic: bool,
    /// Clamp Δt to the stability bound derived from λ_max(M⁻¹A).
    pub adapt_time_step: bool,
    /// Hamiltonian Monte Carlo (true) or Metropolis-Hastings (false).
    pub hmc: bool,
    /// Fixed RNG seed for reproducible chains.
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            proposals: 1000,
            n_steps: 10,
            time_step: 0.1,
            temperature: 1.0,
            gravity: 1.0,
            mass_kind: MassKind::Full,
            correlated_momenta: true,
            general_kinetic: true,
            normalize_momentum: false,
            test_before: true,
            ergodic: true,
            adapt_time_step: true,
            hmc: true,
            seed: None,
        }
    }
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if self.proposals < 1 {
            return Err(Error::Config("at least one proposal is required".into()));
        }
        if self.n_steps < 1 {
            return Err(Error::Config(
                "trajectories need at least one leap-frog step".into(),
            ));
        }
        if self.time_step <= 0.0 || !self.time_step.is_finite() {
            return Err(Error::Config(format!(
                "time step must be positive, got {}",
                self.time_step
            )));
        }
        if self.temperature <= 0.0 {
            return Err(Error::Config(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Counters and effective parameters reported after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub proposals: usize,
    /// Emitted states, counting the initial one.
    pub accepted: usize,
    /// Trajectories terminated early by the no-U-turn criterion.
    pub uturns: usize,
    /// Trajectories whose energy error exceeded the warning threshold.
    pub drift_events: usize,
    /// The time step actually used (after any stability clamping).
    pub time_step: f64,
}

/// Mutable chain state: the most recently accepted model, the proposal
/// under consideration, and the matching momenta.
#[derive(Debug, Clone)]
struct ChainState {
    current: Array1<f64>,
    proposed: Array1<f64>,
    current_momentum: Array1<f64>,
    proposed_momentum: Array1<f64>,
    energy: f64,
    accepted: usize,
    uturns: usize,
}

/// Single-threaded Markov chain driver. Owns the chain state, the RNG, and
/// the sample sink; borrows the immutable model and mass matrix.
pub struct Sampler<'a> {
    model: &'a LinearModel,
    mass: &'a MassMatrix,
    prior: &'a Prior,
    settings: Settings,
    rng: RandomSource,
    state: ChainState,
    sink: SampleSink,
    trajectory_path: Option<PathBuf>,
    drift_events: usize,
}

impl<'a> Sampler<'a> {
    /// Prepares a run: validates settings, clamps the time step to the
    /// stability bound (or warns when adaptation is off and the step is
    /// beyond it), and draws the starting state from the prior.
    pub fn new(
        model: &'a LinearModel,
        mass: &'a MassMatrix,
        prior: &'a Prior,
        mut settings: Settings,
        sink: SampleSink,
        trajectory_path: Option<PathBuf>,
    ) -> Result<Self> {
        settings.validate()?;
        if prior.len() != model.dim() {
            return Err(Error::Dimension(format!(
                "prior has {} parameters but the model has {}",
                prior.len(),
                model.dim()
            )));
        }
        if mass.dim() != model.dim() {
            return Err(Error::Dimension(format!(
                "mass matrix is {}-dimensional but the model has {} parameters",
                mass.dim(),
                model.dim()
            )));
        }

        let mut rng = match settings.seed {
            Some(seed) => RandomSource::with_seed(seed),
            None => RandomSource::new(),
        };

        if settings.hmc {
            let omega = mass.max_frequency(model.quadratic());
            if omega > 0.0 {
                let stable = 2.0 / omega;
                if settings.adapt_time_step {
                    let bound = STABILITY_MARGIN * stable;
                    if settings.time_step > bound {
                        settings.time_step = bound;
                    }
                } else if settings.time_step > stable {
                    eprintln!(
                        "warning: time step {} exceeds the stability bound {:.6}; \
                         trajectories will likely diverge",
                        settings.time_step, stable
                    );
                }
            }
        }

        let proposed = rng.normal_vector(&prior.mean, &prior.std);
        let proposed_momentum = mass.sample_momentum(&mut rng);
        let energy = if settings.hmc {
            model.misfit(&proposed) + mass.kinetic(&proposed_momentum)
        } else {
            model.misfit(&proposed)
        };
        let state = ChainState {
            current: proposed.clone(),
            proposed,
            current_momentum: proposed_momentum.clone(),
            proposed_momentum,
            energy,
            accepted: 1,
            uturns: 0,
        };

        Ok(Self {
            model,
            mass,
            prior,
            settings,
            rng,
            state,
            sink,
            trajectory_path,
            drift_events: 0,
        })
    }

    /// Runs the chain to completion, consuming the sampler and finishing the
    /// sink. Returns the per-proposal chain history (row i is the state
    /// after proposal i, repeating the previous row on rejection) and the
    /// run counters.
    pub fn run(self) -> Result<(Array2<f64>, RunSummary)> {
        self.run_impl(None)
    }

    /// Like [`Self::run`], with a progress bar on the terminal.
    pub fn run_progress(self) -> Result<(Array2<f64>, RunSummary)> {
        let bar = ProgressBar::new(self.settings.proposals as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:8} {bar:40.cyan/blue} {pos}/{len} ({eta}) | {msg}")
                .expect("progress template is valid")
                .progress_chars("=>-"),
        );
        bar.set_prefix(if self.settings.hmc { "HMC" } else { "MH" });
        self.run_impl(Some(bar))
    }

    fn run_impl(mut self, progress: Option<ProgressBar>) -> Result<(Array2<f64>, RunSummary)> {
        let dim = self.model.dim();
        let proposals = self.settings.proposals;
        let mut chain = Array2::<f64>::zeros((proposals, dim));

        self.sink.write(&self.state.proposed, self.state.energy)?;
        chain.row_mut(0).assign(&self.state.current);

        for it in 1..proposals {
            self.step(it)?;
            chain.row_mut(it).assign(&self.state.current);

            if let Some(bar) = &progress {
                bar.inc(1);
                if it % 256 == 0 {
                    bar.set_message(format!(
                        "p(accept)≈{:.2} u-turns={}",
                        self.state.accepted as f64 / (it + 1) as f64,
                        self.state.uturns
                    ));
                }
            }
        }
        if let Some(bar) = &progress {
            bar.finish_with_message("Done!");
        }

        let summary = RunSummary {
            proposals,
            accepted: self.state.accepted,
            uturns: self.state.uturns,
            drift_events: self.drift_events,
            time_step: self.settings.time_step,
        };
        self.sink.finish(self.state.accepted)?;
        Ok((chain, summary))
    }

    /// One proposal: momentum refresh (HMC) or prior draw (MH), the
    /// Metropolis test against the energy of the last accepted state, and
    /// the emit-on-accept bookkeeping.
    fn step(&mut self, it: usize) -> Result<()> {
        let last = it + 1 == self.settings.proposals;
        let x = self.state.energy;

        if self.settings.hmc {
            let (n_steps, dt) = self.jittered_schedule();
            self.propose_momentum();

            // H at the current model with the fresh momentum. Along an exact
            // trajectory this is conserved, so it doubles as the end-of-
            // trajectory energy when the integrator has not run yet.
            let energy_at_start = self.model.misfit(&self.state.current)
                + self.mass.kinetic(&self.state.proposed_momentum);

            let x_new = if self.settings.test_before {
                energy_at_start
            } else {
                self.propagate(n_steps, dt, last)?;
                let realized = self.model.misfit(&self.state.proposed)
                    + self.mass.kinetic(&self.state.proposed_momentum);
                self.note_drift(realized - energy_at_start);
                realized
            };

            if self.accepts(x, x_new) {
                if self.settings.test_before {
                    self.propagate(n_steps, dt, last)?;
                    let realized = self.model.misfit(&self.state.proposed)
                        + self.mass.kinetic(&self.state.proposed_momentum);
                    self.note_drift(realized - x_new);
                }
                self.accept(x_new)?;
            }
        } else {
            self.state.proposed = self.rng.normal_vector(&self.prior.mean, &self.prior.std);
            let x_new = self.model.misfit(&self.state.proposed);
            if self.accepts(x, x_new) {
                self.accept(x_new)?;
            }
        }
        Ok(())
    }

    /// Per-proposal trajectory length and step size, randomized by
    /// independent U(0.5, 1.5) factors when the ergodic toggle is on.
    fn jittered_schedule(&mut self) -> (usize, f64) {
        if !self.settings.ergodic {
            return (self.settings.n_steps, self.settings.time_step);
        }
        let steps_factor = self.rng.uniform_in(0.5, 1.5);
        let dt_factor = self.rng.uniform_in(0.5, 1.5);
        let n_steps = ((self.settings.n_steps as f64 * steps_factor).round() as usize).max(1);
        (n_steps, self.settings.time_step * dt_factor)
    }

    fn propose_momentum(&mut self) {
        let mut fresh = self.mass.sample_momentum(&mut self.rng);
        if self.settings.normalize_momentum {
            let current_norm = self
                .state
                .current_momentum
                .dot(&self.state.current_momentum)
                .sqrt();
            let fresh_norm = fresh.dot(&fresh).sqrt();
            if fresh_norm > 0.0 {
                fresh.mapv_inplace(|v| v * current_norm / fresh_norm);
            }
        }
        self.state.proposed_momentum = fresh;
    }

    /// Integrates from the current model with the proposed momentum,
    /// updating the proposal and the u-turn counter. The trajectory of the
    /// final proposal is written to the trajectory file if one is set.
    fn propagate(&mut self, n_steps: usize, dt: f64, record: bool) -> Result<()> {
        self.state.current_momentum = self.state.proposed_momentum.clone();

        let mut recorder = match (&self.trajectory_path, record) {
            (Some(path), true) => Some(TrajectorySink::create(path, self.model.dim(), n_steps)?),
            _ => None,
        };

        let integrator = LeapfrogIntegrator::new(self.model, self.mass);
        let result = integrator.integrate(
            &self.state.current,
            &self.state.current_momentum,
            n_steps,
            dt,
            recorder.as_mut(),
        )?;
        if let Some(rec) = recorder {
            rec.finish()?;
        }

        self.state.proposed = result.position;
        self.state.proposed_momentum = result.momentum;
        if result.early_termination {
            self.state.uturns += 1;
        }
        Ok(())
    }

    /// Metropolis rule: always take a downhill move, otherwise accept with
    /// probability exp(−ΔH/T).
    fn accepts(&mut self, x: f64, x_new: f64) -> bool {
        if x_new < x {
            return true;
        }
        (-(x_new - x) / self.settings.temperature).exp() > self.rng.uniform()
    }

    fn accept(&mut self, x_new: f64) -> Result<()> {
        self.state.accepted += 1;
        self.state.energy = x_new;
        self.state.current = self.state.proposed.clone();
        self.sink.write(&self.state.proposed, x_new)
    }

    fn note_drift(&mut self, delta: f64) {
        if delta.abs() > DRIFT_WARNING_THRESHOLD {
            if self.drift_events == 0 {
                eprintln!(
                    "warning: energy drift {:.3} along a trajectory exceeds {}; \
                     the time step is too coarse for this mass matrix",
                    delta, DRIFT_WARNING_THRESHOLD
                );
            }
            self.drift_events += 1;
        }
    }
}
