//! Bayesian geometry search: wiring molecules and evaluators into the
//! optimizer
//!
//! Three entry points, layered strictly top-down:
//! [`optimize_system`] builds and runs, [`build_optimizer`] constructs a
//! ready optimizer from a molecule specification, and [`energy_objective`]
//! turns a molecule plus an evaluator into the function the optimizer
//! minimizes.

use nalgebra::{DMatrix, DVector};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::bayesian::acquisition::AcquisitionType;
use crate::bayesian::domain::{Constraint, Domain};
use crate::bayesian::{BayesConfig, BayesError, BayesianOptimization, BatchStrategy};
use crate::evaluator::lj::LennardJones;
use crate::evaluator::{Evaluator, EvaluatorError};
use crate::internals::ZMatrix;
use crate::molecule::{ConstructionOptions, Molecule, MoleculeError, MoleculeSpec};
use crate::optimization::OptimizationError;

/// Errors from the search layer and its collaborators
#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Molecule(#[from] MoleculeError),

    #[error(transparent)]
    Evaluation(#[from] EvaluatorError),

    #[error(transparent)]
    Optimization(#[from] OptimizationError),

    #[error(transparent)]
    Optimizer(#[from] BayesError),
}

/// Options accepted by [`build_optimizer`] and [`optimize_system`]
pub struct BuildOptions {
    /// Energy evaluator; `None` selects the Lennard-Jones default
    pub evaluator: Option<Arc<dyn Evaluator>>,

    /// Interpret trial vectors in internal coordinates. `None` means "use
    /// internals exactly when the molecule carries an internal coordinate
    /// system".
    pub use_internals: Option<bool>,

    /// Locally relax every trial geometry before scoring it
    pub reoptimize: bool,

    /// Acquisition function used to score candidates
    pub acquisition: AcquisitionType,

    /// How each iteration's batch is assembled
    pub batch_strategy: BatchStrategy,

    /// Points evaluated per iteration
    pub batch_size: usize,

    /// Size of the initial random design; `None` means one point per batch
    /// slot, i.e. equal to `batch_size`
    pub initial_design: Option<usize>,

    /// Treat the objective as noiseless
    pub exact_feval: bool,

    /// Inequality constraints on the domain, satisfied when non-positive
    pub constraints: Vec<Constraint>,

    /// Size of the random candidate pool the acquisition is optimized over
    pub acquisition_samples: usize,

    /// Seed for reproducible runs
    pub seed: Option<u64>,

    /// Forwarded verbatim to molecule construction
    pub construction: ConstructionOptions,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            evaluator: None,
            use_internals: None,
            reoptimize: true,
            acquisition: AcquisitionType::ExpectedImprovement,
            batch_strategy: BatchStrategy::Random,
            batch_size: 1,
            initial_design: None,
            exact_feval: false,
            constraints: Vec::new(),
            acquisition_samples: 1000,
            seed: None,
            construction: ConstructionOptions::default(),
        }
    }
}

/// Build the objective function for a geometry search.
///
/// The returned closure maps a batch of trial coordinate vectors (one per
/// row) to their energies. Trial vectors are absolute coordinate states in
/// the chosen coordinate system, not shifts from the molecule's current
/// geometry. With `reoptimize` each trial geometry is locally relaxed under
/// the evaluator before scoring; without it the whole displaced batch is
/// scored in one evaluator call.
///
/// Any displacement, relaxation or evaluation failure propagates; no
/// penalty value is ever substituted.
pub fn energy_objective(
    molecule: Molecule,
    evaluator: Arc<dyn Evaluator>,
    use_internals: bool,
    reoptimize: bool,
) -> impl Fn(&DMatrix<f64>) -> Result<DVector<f64>, SearchError> + Send + Sync {
    move |trials: &DMatrix<f64>| {
        let displaced = molecule.displaced_coordinates(trials, use_internals, false)?;

        if reoptimize {
            let mut energies = Vec::with_capacity(displaced.len());
            for coords in &displaced {
                let relaxed = molecule.modify(coords)?.optimize(evaluator.as_ref())?;
                energies.push(relaxed.energy(evaluator.as_ref())?);
            }
            Ok(DVector::from_vec(energies))
        } else {
            Ok(molecule.energies(&displaced, evaluator.as_ref())?)
        }
    }
}

/// Construct a molecule from its specification and wrap it in a ready,
/// unstarted optimizer.
///
/// Configuration problems (malformed molecule specification, invalid
/// domain, inconsistent options) fail here; no objective evaluation
/// happens until the optimizer runs.
pub fn build_optimizer(
    spec: &MoleculeSpec,
    domain: Domain,
    internals: Option<ZMatrix>,
    options: BuildOptions,
) -> Result<BayesianOptimization, SearchError> {
    let molecule = Molecule::construct(spec, internals, &options.construction)?;

    let use_internals = options
        .use_internals
        .unwrap_or_else(|| molecule.has_internals());
    if use_internals && !molecule.has_internals() {
        return Err(MoleculeError::NoInternals.into());
    }

    let evaluator = options
        .evaluator
        .unwrap_or_else(|| Arc::new(LennardJones::default()));
    let objective = energy_objective(molecule, evaluator, use_internals, options.reoptimize);

    let config = BayesConfig {
        acquisition: options.acquisition,
        batch_strategy: options.batch_strategy,
        batch_size: options.batch_size,
        initial_design: options.initial_design.unwrap_or(options.batch_size),
        exact_feval: options.exact_feval,
        acquisition_samples: options.acquisition_samples,
        seed: options.seed,
    };

    let optimizer = BayesianOptimization::new(
        Box::new(move |x| objective(x).map_err(Into::into)),
        domain,
        options.constraints,
        config,
    )?;
    Ok(optimizer)
}

/// Build an optimizer, run it, optionally persist a report, and hand the
/// run optimizer back for inspection.
///
/// A report file is written only when `report_path` is given. Every failure,
/// whether from an objective evaluation mid-run or from writing the report,
/// propagates unchanged.
pub fn optimize_system(
    spec: &MoleculeSpec,
    domain: Domain,
    internals: Option<ZMatrix>,
    max_iter: usize,
    report_path: Option<&Path>,
    options: BuildOptions,
) -> Result<BayesianOptimization, SearchError> {
    let mut optimizer = build_optimizer(spec, domain, internals, options)?;
    optimizer.run_optimization(max_iter)?;

    if let Some(path) = report_path {
        optimizer.save_report(path)?;
    }

    Ok(optimizer)
}
