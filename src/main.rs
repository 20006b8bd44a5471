use anyhow::{Context, Result};
use clap::Parser;

use linear_hmc::config::{Args, InputMode};
use linear_hmc::io::{read_matrix, read_prior_table, read_scalar, read_vector};
use linear_hmc::mass::MassMatrix;
use linear_hmc::model::{LinearModel, Observations, Prior};
use linear_hmc::sampler::Sampler;
use linear_hmc::sink::SampleSink;

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = args.settings()?;

    let (model, prior) = match args.input_mode()? {
        InputMode::ForwardAndData { matrix, data } => {
            let forward = read_matrix(&matrix)?;
            let observed = read_vector(&data)?;
            let prior = build_prior(&args, forward.ncols())?;
            let observations = Observations::with_uniform_std(observed, args.data_std)?;
            let model = LinearModel::from_parts(&prior, &observations, &forward)
                .context("building the posterior quadratic form")?;
            (model, prior)
        }
        InputMode::Quadratic { a, b, c } => {
            let a = read_matrix(&a)?;
            let b = read_vector(&b)?;
            let c = read_scalar(&c)?;
            let prior = build_prior(&args, a.ncols())?;
            let model = LinearModel::from_quadratic(a, b, c)
                .context("assembling the precomputed quadratic form")?;
            (model, prior)
        }
    };
    let n_params = model.dim();

    let mass = MassMatrix::build(
        model.quadratic(),
        settings.gravity,
        settings.mass_kind,
        settings.correlated_momenta,
        settings.general_kinetic,
    )
    .context("building the mass matrix")?;

    println!(
        "Sampling a linear-Gaussian posterior with {}",
        if settings.hmc {
            "Hamiltonian Monte Carlo"
        } else {
            "Metropolis-Hastings"
        }
    );
    println!("\t parameters: {}", n_params);
    println!("\t proposals:  {}", settings.proposals);
    if settings.hmc {
        println!(
            "\t trajectory: {} steps of {} (jitter {})",
            settings.n_steps,
            settings.time_step,
            if settings.ergodic { "on" } else { "off" }
        );
        if settings.test_before {
            println!("\t - evaluating the Hamiltonian before propagation");
        }
    }

    let sink = SampleSink::create(&args.output_samples, n_params, settings.proposals)?;
    let sampler = Sampler::new(
        &model,
        &mass,
        &prior,
        settings,
        sink,
        Some(args.output_trajectory.clone()),
    )?;
    let (_, summary) = sampler.run_progress()?;

    println!(
        "accepted {} of {} proposals, {} u-turn terminations",
        summary.accepted, summary.proposals, summary.uturns
    );
    println!("samples written to {}", args.output_samples.display());
    Ok(())
}

fn build_prior(args: &Args, n_params: usize) -> Result<Prior> {
    let prior = match &args.prior_file {
        Some(path) => {
            let (means, stds) = read_prior_table(path)?;
            if means.len() != n_params {
                anyhow::bail!(
                    "prior file {} has {} parameters but the problem has {}",
                    path.display(),
                    means.len(),
                    n_params
                );
            }
            Prior::new(means, stds)?
        }
        None => Prior::broadcast(args.prior_mean, args.prior_std, n_params)?,
    };
    Ok(prior)
}
