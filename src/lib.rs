//! # linear-hmc
//!
//! Posterior sampling for **linear-Gaussian inverse problems** with
//! **Hamiltonian Monte Carlo (HMC)** and a **Metropolis-Hastings** fallback.
//!
//! Given a forward operator G (data = G·model + noise), observed data d with
//! Gaussian noise, and a Gaussian prior, the posterior π(m|d) ∝ exp(−χ(m))
//! has the quadratic negative log-density
//!
//! ```text
//! χ(m) = ½ mᵀAm − bᵀm + c,    A = Σ_m⁻¹ + Gᵀ Σ_d⁻¹ G
//! ```
//!
//! which this crate exploits twice: χ and ∇χ cost one matrix-vector product
//! each ([`model::LinearModel`]), and A doubles as the ideal mass matrix for
//! the Hamiltonian dynamics ([`mass::MassMatrix`]), making trajectories
//! near-circular even for ill-conditioned posteriors.
//!
//! ## Getting started
//!
//! ```rust
//! use linear_hmc::mass::{MassKind, MassMatrix};
//! use linear_hmc::model::{LinearModel, Observations, Prior};
//! use linear_hmc::sampler::{Sampler, Settings};
//! use linear_hmc::sink::SampleSink;
//! use ndarray::{arr1, arr2};
//!
//! // One parameter observed directly: posterior mean d/2 = 1, variance 1/2.
//! let prior = Prior::new(arr1(&[0.0]), arr1(&[1.0]))?;
//! let observations = Observations::with_uniform_std(arr1(&[2.0]), 1.0)?;
//! let forward = arr2(&[[1.0]]);
//! let model = LinearModel::from_parts(&prior, &observations, &forward)?;
//!
//! let settings = Settings {
//!     proposals: 5000,
//!     seed: Some(7),
//!     ..Settings::default()
//! };
//! let mass = MassMatrix::build(
//!     model.quadratic(),
//!     settings.gravity,
//!     MassKind::Full,
//!     settings.correlated_momenta,
//!     settings.general_kinetic,
//! )?;
//!
//! let path = std::env::temp_dir().join("linear-hmc-doc-samples.txt");
//! let sink = SampleSink::create(&path, model.dim(), settings.proposals)?;
//! let sampler = Sampler::new(&model, &mass, &prior, settings, sink, None)?;
//! let (chain, summary) = sampler.run()?;
//!
//! let mean = chain.column(0).mean().unwrap();
//! assert!((mean - 1.0).abs() < 0.1);
//! assert!(summary.accepted > 0);
//! # Ok::<(), linear_hmc::Error>(())
//! ```
//!
//! The accompanying binary wires the same pipeline to whitespace-ASCII
//! input files and the `OUTPUT/samples.txt` / `OUTPUT/trajectory.txt`
//! record format; see `linear-hmc --help`.
//!
//! ## Features
//! - Full, diagonal, or identity mass matrix, with Cholesky-correlated
//!   momentum proposals
//! - Evaluate-before-propagate acceptance that skips the integrator on
//!   rejected proposals
//! - No-U-turn early termination of leap-frog trajectories
//! - Up-front time-step adaptation from the stability bound of M⁻¹A
//! - Ergodic jitter of trajectory length and step size
//! - Seedable runs for reproducibility

pub mod config;
pub mod error;
pub mod io;
pub mod leapfrog;
pub mod linalg;
pub mod mass;
pub mod model;
pub mod random;
pub mod sampler;
pub mod sink;

pub use error::{Error, Result};
