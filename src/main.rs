//! Main executable for molbo

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use nalgebra::DMatrix;
use std::path::PathBuf;
use std::sync::Arc;

use molbo::evaluator::lj::LennardJones;
use molbo::evaluator::Evaluator;
use molbo::internals::ZMatrix;
use molbo::io::{load_system, parse_xyz, write_xyz};
use molbo::molecule::{ConstructionOptions, Molecule};
use molbo::search::{optimize_system, BuildOptions};

/// Command-line arguments for the application
#[derive(Parser, Debug)]
#[clap(
    name = "molbo",
    version = molbo::VERSION,
    about = "Bayesian optimization of molecular geometries"
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search for low-energy geometries of a system
    Optimize {
        /// JSON system file with the molecule, optional internals and domain
        #[clap(long, short, value_parser)]
        input: PathBuf,

        /// Number of surrogate-guided iterations
        #[clap(long, default_value_t = 100)]
        max_iter: usize,

        /// Write a JSON run report to this path
        #[clap(long, value_parser)]
        report: Option<PathBuf>,

        /// Acquisition function (EI, LCB, MPI)
        #[clap(long, default_value = "EI")]
        acquisition: String,

        /// Batch strategy (sequential, random, local_penalization)
        #[clap(long, default_value = "random")]
        strategy: String,

        /// Points evaluated per iteration
        #[clap(long, default_value_t = 1)]
        batch_size: usize,

        /// Size of the initial random design (defaults to the batch size)
        #[clap(long)]
        initial_design: Option<usize>,

        /// Treat the objective as noiseless
        #[clap(long)]
        exact: bool,

        /// Score trial geometries as proposed, without local relaxation
        #[clap(long)]
        no_reoptimize: bool,

        /// Seed for reproducible runs
        #[clap(long)]
        seed: Option<u64>,

        /// Write the best geometry found as an XYZ file
        #[clap(long, value_parser)]
        out: Option<PathBuf>,
    },

    /// Evaluate the energy of a geometry
    Energy {
        /// XYZ geometry file
        #[clap(long, short, value_parser)]
        input: PathBuf,

        /// Evaluator to use (lj)
        #[clap(long, default_value = "lj")]
        evaluator: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Optimize {
            input,
            max_iter,
            report,
            acquisition,
            strategy,
            batch_size,
            initial_design,
            exact,
            no_reoptimize,
            seed,
            out,
        } => {
            info!("Loading system: {}", input.display());
            let system = load_system(&input)
                .with_context(|| format!("Failed to load system file: {}", input.display()))?;

            let internals = system
                .internals
                .clone()
                .map(ZMatrix::new)
                .transpose()
                .context("Invalid internal coordinate topology")?;

            let mut options = BuildOptions::default();
            options.acquisition = acquisition
                .parse()
                .with_context(|| format!("Invalid acquisition type: {}", acquisition))?;
            options.batch_strategy = strategy
                .parse()
                .with_context(|| format!("Invalid batch strategy: {}", strategy))?;
            options.batch_size = batch_size;
            options.initial_design = initial_design;
            options.exact_feval = exact;
            options.reoptimize = !no_reoptimize;
            options.seed = seed;

            info!(
                "Running {} iterations over a {}-dimensional domain",
                max_iter,
                system.domain.dim()
            );
            let optimizer = optimize_system(
                &system.molecule,
                system.domain.clone(),
                internals.clone(),
                max_iter,
                report.as_deref(),
                options,
            )?;

            match (optimizer.x_best(), optimizer.fx_best()) {
                (Some(x), Some(energy)) => {
                    let coords: Vec<String> = x.iter().map(|v| format!("{:.6}", v)).collect();
                    println!("best energy: {:.6}", energy);
                    println!("best coordinates: [{}]", coords.join(", "));

                    if let Some(out_path) = out {
                        let molecule = Molecule::construct(
                            &system.molecule,
                            internals,
                            &ConstructionOptions::default(),
                        )?;
                        let use_internals = molecule.has_internals();
                        let trial = DMatrix::from_fn(1, x.len(), |_, j| x[j]);
                        let best_coords = molecule
                            .displaced_coordinates(&trial, use_internals, false)?
                            .remove(0);
                        let best = molecule.modify(&best_coords)?;

                        info!("Writing best geometry to {}", out_path.display());
                        write_xyz(
                            &out_path,
                            &format!("energy {:.6}", energy),
                            &best.atoms,
                        )?;
                    }
                }
                _ => warn!("No evaluations were performed"),
            }

            if let Some(report_path) = report {
                info!("Report written to {}", report_path.display());
            }

            info!("Optimization completed successfully");
        }

        Commands::Energy { input, evaluator } => {
            let chosen: Arc<dyn Evaluator> = match evaluator.to_lowercase().as_str() {
                "lj" | "lennard-jones" => Arc::new(LennardJones::default()),
                _ => {
                    warn!("Unknown evaluator: {}. Using Lennard-Jones instead.", evaluator);
                    Arc::new(LennardJones::default())
                }
            };

            info!("Loading geometry: {}", input.display());
            let spec = parse_xyz(&input)
                .with_context(|| format!("Failed to parse geometry file: {}", input.display()))?;
            let molecule = Molecule::construct(&spec, None, &ConstructionOptions::default())?;

            let energy = molecule.energy(chosen.as_ref())?;
            println!("{} energy: {:.6}", chosen.name(), energy);
        }
    }

    Ok(())
}
