/*!
Command-line surface of the `linear-hmc` binary.

Inputs come in two flavors: a forward matrix plus observed data
(`--im`/`--id`), from which the posterior quadratic form is computed, or
the precomputed quadratic form itself (`--ia`/`--ib`/`--ic`). Boolean
toggles take explicit values (`--at false`), mirroring the original
program's `-at 0/1` style.
*/

use std::path::PathBuf;

use clap::Parser;

use crate::error::{Error, Result};
use crate::mass::MassKind;
use crate::sampler::Settings;

/// Sample the posterior of a linear-Gaussian inverse problem with
/// Hamiltonian Monte Carlo.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "linear-hmc")]
#[command(about = "Posterior sampling for linear inverse problems (HMC / Metropolis-Hastings)")]
#[command(version)]
#[command(allow_negative_numbers = true)]
pub struct Args {
    /// Forward matrix file G: header `M N`, then M whitespace-separated rows
    #[arg(long = "im")]
    pub input_matrix: Option<PathBuf>,

    /// Observed data file d: one value per line
    #[arg(long = "id")]
    pub input_data: Option<PathBuf>,

    /// Precomputed quadratic-form matrix A (header `N N`)
    #[arg(long = "ia")]
    pub input_a: Option<PathBuf>,

    /// Precomputed linear term b: one value per line
    #[arg(long = "ib")]
    pub input_b: Option<PathBuf>,

    /// Precomputed misfit constant c: a single value
    #[arg(long = "ic")]
    pub input_c: Option<PathBuf>,

    /// Output samples file
    #[arg(long = "os", default_value = "OUTPUT/samples.txt")]
    pub output_samples: PathBuf,

    /// Output trajectory file (written for the final proposal only)
    #[arg(long = "ot", default_value = "OUTPUT/trajectory.txt")]
    pub output_trajectory: PathBuf,

    /// Prior mean, broadcast over all parameters
    #[arg(long = "means", default_value_t = 0.0)]
    pub prior_mean: f64,

    /// Prior standard deviation, broadcast over all parameters
    #[arg(long = "std", default_value_t = 1.0)]
    pub prior_std: f64,

    /// Per-parameter prior file (`mean std` per line); overrides --means/--std
    #[arg(long = "ip")]
    pub prior_file: Option<PathBuf>,

    /// Data noise standard deviation, broadcast over all observations
    #[arg(long = "dstd", default_value_t = 1.0)]
    pub data_std: f64,

    /// Leap-frog step size (clamped to the stability bound when --at is on)
    #[arg(long = "dt")]
    pub time_step: Option<f64>,

    /// Leap-frog steps per trajectory
    #[arg(long = "nt", default_value_t = 10)]
    pub trajectory_steps: usize,

    /// Temperature in the acceptance rule
    #[arg(long = "t", default_value_t = 1.0)]
    pub temperature: f64,

    /// Mass matrix type: 0 full, 1 diagonal, 2 identity
    #[arg(long = "mtype", default_value_t = 0)]
    pub mass_matrix_type: u8,

    /// Number of proposals
    #[arg(long = "ns", default_value_t = 1000)]
    pub proposals: usize,

    /// Mass matrix scaling M = gravity·A
    #[arg(long = "gravity", default_value_t = 1.0)]
    pub gravity: f64,

    /// Adapt the time step to the leap-frog stability bound
    #[arg(long = "at", default_value_t = true, action = clap::ArgAction::Set)]
    pub adapt_time_step: bool,

    /// Randomize trajectory length and step size per proposal
    #[arg(long = "e", default_value_t = true, action = clap::ArgAction::Set)]
    pub ergodic: bool,

    /// Propose momenta through the full mass-matrix Cholesky factor
    #[arg(long = "gmp", default_value_t = true, action = clap::ArgAction::Set)]
    pub correlated_momenta: bool,

    /// Use the full inverse mass matrix in the kinetic energy
    #[arg(long = "gmc", default_value_t = true, action = clap::ArgAction::Set)]
    pub general_kinetic: bool,

    /// Evaluate the Hamiltonian before propagating
    #[arg(long = "Hb", default_value_t = true, action = clap::ArgAction::Set)]
    pub test_before: bool,

    /// Rescale fresh momenta to the previous momentum's norm
    #[arg(long = "nm", default_value_t = false, action = clap::ArgAction::Set)]
    pub normalize_momentum: bool,

    /// Algorithm: true for Hamiltonian Monte Carlo, false for Metropolis-Hastings
    #[arg(long = "an", default_value_t = true, action = clap::ArgAction::Set)]
    pub hamiltonian: bool,

    /// RNG seed for a reproducible chain
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Which inputs define the posterior quadratic form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    /// Build A, b, c from the forward matrix and observed data.
    ForwardAndData {
        matrix: PathBuf,
        data: PathBuf,
    },
    /// Read A, b, c directly.
    Quadratic {
        a: PathBuf,
        b: PathBuf,
        c: PathBuf,
    },
}

impl Args {
    /// Resolves the input mode, rejecting incomplete or mixed selections.
    pub fn input_mode(&self) -> Result<InputMode> {
        let abc = [&self.input_a, &self.input_b, &self.input_c];
        let n_abc = abc.iter().filter(|p| p.is_some()).count();
        match (&self.input_matrix, &self.input_data, n_abc) {
            (Some(matrix), Some(data), 0) => Ok(InputMode::ForwardAndData {
                matrix: matrix.clone(),
                data: data.clone(),
            }),
            (None, None, 3) => Ok(InputMode::Quadratic {
                a: self.input_a.clone().expect("checked above"),
                b: self.input_b.clone().expect("checked above"),
                c: self.input_c.clone().expect("checked above"),
            }),
            (None, None, 0) => Err(Error::Config(
                "no inputs given: use --im and --id, or --ia, --ib, and --ic".into(),
            )),
            (_, _, 0) => Err(Error::Config(
                "both --im and --id are required to build the posterior from data".into(),
            )),
            (None, None, _) => Err(Error::Config(
                "all three of --ia, --ib, and --ic are required in quadratic-form mode".into(),
            )),
            _ => Err(Error::Config(
                "--im/--id and --ia/--ib/--ic are mutually exclusive".into(),
            )),
        }
    }

    /// Converts the parsed flags into sampler settings.
    pub fn settings(&self) -> Result<Settings> {
        if self.prior_std <= 0.0 {
            return Err(Error::Config(format!(
                "prior standard deviation must be positive, got {}",
                self.prior_std
            )));
        }
        if self.data_std <= 0.0 {
            return Err(Error::Config(format!(
                "data standard deviation must be positive, got {}",
                self.data_std
            )));
        }
        Ok(Settings {
            proposals: self.proposals,
            n_steps: self.trajectory_steps,
            time_step: self.time_step.unwrap_or(0.1),
            temperature: self.temperature,
            gravity: self.gravity,
            mass_kind: MassKind::from_code(self.mass_matrix_type)?,
            correlated_momenta: self.correlated_momenta,
            general_kinetic: self.general_kinetic,
            normalize_momentum: self.normalize_momentum,
            test_before: self.test_before,
            ergodic: self.ergodic,
            adapt_time_step: self.adapt_time_step,
            hmc: self.hamiltonian,
            seed: self.seed,
        })
    }
}
