//! Bayesian optimization over a bounded search domain
//!
//! [`BayesianOptimization`] owns the full search state: the objective, the
//! domain and constraints, the observation history the surrogate is fitted
//! to, and the random generator. One instance drives one run; nothing is
//! shared or reused across runs.

pub mod acquisition;
pub mod domain;
pub mod surrogate;

use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::bayesian::acquisition::AcquisitionType;
use crate::bayesian::domain::{Constraint, Domain, DomainError};
use crate::bayesian::surrogate::{GaussianProcess, SurrogateError};

/// Boxed error type objective functions are allowed to fail with
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The function being minimized: each input row is one candidate point, the
/// output vector is positionally aligned with the rows.
pub type ObjectiveFn = Box<dyn Fn(&DMatrix<f64>) -> Result<DVector<f64>, BoxError> + Send + Sync>;

/// Errors that can occur while configuring or running the optimizer
#[derive(Error, Debug)]
pub enum BayesError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("objective evaluation failed: {0}")]
    Objective(BoxError),

    #[error("objective returned {actual} values for {expected} points")]
    ObjectiveShape { expected: usize, actual: usize },

    #[error("objective returned a non-finite value")]
    NonFiniteObjective,

    #[error("no feasible point found after {0} attempts")]
    InfeasibleDomain(usize),

    #[error("optimizer has no observations")]
    NoObservations,

    #[error(transparent)]
    Surrogate(#[from] SurrogateError),

    #[error("failed to write report: {0}")]
    Report(#[source] std::io::Error),

    #[error("failed to serialize report: {0}")]
    ReportFormat(#[from] serde_json::Error),
}

/// Failure to parse a batch strategy name
#[derive(Error, Debug)]
#[error("unknown batch strategy: {0} (expected sequential, random or local_penalization)")]
pub struct ParseBatchStrategyError(pub String);

/// How a batch of candidate points is assembled each iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchStrategy {
    /// One acquisition-optimal point per iteration, ignoring the batch size
    Sequential,

    /// The acquisition-optimal point plus uniform random fill
    #[default]
    Random,

    /// Greedy selection with a distance penalty around already-chosen points
    LocalPenalization,
}

impl FromStr for BatchStrategy {
    type Err = ParseBatchStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(BatchStrategy::Sequential),
            "random" => Ok(BatchStrategy::Random),
            "local_penalization" => Ok(BatchStrategy::LocalPenalization),
            _ => Err(ParseBatchStrategyError(s.to_string())),
        }
    }
}

impl fmt::Display for BatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchStrategy::Sequential => "sequential",
            BatchStrategy::Random => "random",
            BatchStrategy::LocalPenalization => "local_penalization",
        };
        write!(f, "{}", name)
    }
}

/// Configuration of a [`BayesianOptimization`] run
#[derive(Debug, Clone)]
pub struct BayesConfig {
    /// Acquisition function used to score candidates
    pub acquisition: AcquisitionType,

    /// How each iteration's batch is assembled
    pub batch_strategy: BatchStrategy,

    /// Points evaluated per iteration
    pub batch_size: usize,

    /// Random points evaluated before surrogate-guided search begins
    pub initial_design: usize,

    /// Treat the objective as noiseless
    pub exact_feval: bool,

    /// Size of the random candidate pool the acquisition is optimized over
    pub acquisition_samples: usize,

    /// Seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for BayesConfig {
    fn default() -> Self {
        Self {
            acquisition: AcquisitionType::ExpectedImprovement,
            batch_strategy: BatchStrategy::Random,
            batch_size: 1,
            initial_design: 1,
            exact_feval: false,
            acquisition_samples: 1000,
            seed: None,
        }
    }
}

/// Serializable summary of a finished (or partial) run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Library name and version
    pub library: String,

    /// Acquisition function name
    pub acquisition: String,

    /// Batch strategy name
    pub batch_strategy: String,

    /// Search-space dimension
    pub dimension: usize,

    /// Points evaluated per iteration
    pub batch_size: usize,

    /// Size of the initial random design
    pub initial_design: usize,

    /// Whether the objective was treated as noiseless
    pub exact_feval: bool,

    /// Iterations performed
    pub iterations: usize,

    /// Total objective evaluations, initial design included
    pub evaluations: usize,

    /// Best point found, if any evaluation happened
    pub best_x: Option<Vec<f64>>,

    /// Best objective value found, if any evaluation happened
    pub best_energy: Option<f64>,

    /// Best-so-far value after each iteration
    pub trace: Vec<f64>,
}

/// A configured Bayesian minimizer over a bounded domain
pub struct BayesianOptimization {
    objective: ObjectiveFn,
    domain: Domain,
    constraints: Vec<Constraint>,
    config: BayesConfig,
    rng: StdRng,

    xs: Vec<DVector<f64>>,
    ys: Vec<f64>,
    best: Option<(DVector<f64>, f64)>,
    iterations: usize,
    trace: Vec<f64>,
}

// Rejection-sampling attempts allowed per requested feasible point.
const FEASIBLE_ATTEMPTS_PER_POINT: usize = 1000;

impl BayesianOptimization {
    /// Validate the configuration and build an unstarted optimizer.
    ///
    /// No objective evaluation happens here.
    pub fn new(
        objective: ObjectiveFn,
        domain: Domain,
        constraints: Vec<Constraint>,
        config: BayesConfig,
    ) -> Result<Self, BayesError> {
        domain.validate()?;
        if config.batch_size == 0 {
            return Err(BayesError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        if config.initial_design == 0 {
            return Err(BayesError::InvalidConfig(
                "initial design must be at least 1".to_string(),
            ));
        }
        if config.acquisition_samples < config.batch_size {
            return Err(BayesError::InvalidConfig(format!(
                "candidate pool ({}) is smaller than the batch size ({})",
                config.acquisition_samples, config.batch_size
            )));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            objective,
            domain,
            constraints,
            config,
            rng,
            xs: Vec::new(),
            ys: Vec::new(),
            best: None,
            iterations: 0,
            trace: Vec::new(),
        })
    }

    /// Run up to `max_iter` surrogate-guided iterations.
    ///
    /// The first call evaluates the initial random design before iterating,
    /// so `max_iter == 0` still scores the initial design and nothing else.
    pub fn run_optimization(&mut self, max_iter: usize) -> Result<(), BayesError> {
        if self.xs.is_empty() {
            let design = self.sample_feasible(self.config.initial_design)?;
            debug!("evaluating initial design of {} points", design.len());
            self.evaluate_batch(design)?;
        }

        for _ in 0..max_iter {
            let surrogate = self.fit_surrogate()?;
            let batch = self.select_batch(&surrogate)?;
            self.evaluate_batch(batch)?;

            self.iterations += 1;
            let best = self.fx_best().ok_or(BayesError::NoObservations)?;
            self.trace.push(best);
            info!(
                "iteration {}: {} evaluations, best energy {:.6}",
                self.iterations,
                self.ys.len(),
                best
            );
        }

        Ok(())
    }

    /// Best point found so far
    pub fn x_best(&self) -> Option<&DVector<f64>> {
        self.best.as_ref().map(|(x, _)| x)
    }

    /// Best objective value found so far
    pub fn fx_best(&self) -> Option<f64> {
        self.best.as_ref().map(|(_, y)| *y)
    }

    /// All evaluated points, in evaluation order
    pub fn observations(&self) -> (&[DVector<f64>], &[f64]) {
        (&self.xs, &self.ys)
    }

    /// Total number of objective evaluations so far
    pub fn evaluation_count(&self) -> usize {
        self.ys.len()
    }

    /// Number of surrogate-guided iterations performed
    pub fn iterations_run(&self) -> usize {
        self.iterations
    }

    /// The search domain
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// The run configuration
    pub fn config(&self) -> &BayesConfig {
        &self.config
    }

    /// Summarize the run so far
    pub fn report(&self) -> RunReport {
        RunReport {
            library: format!("molbo {}", env!("CARGO_PKG_VERSION")),
            acquisition: self.config.acquisition.to_string(),
            batch_strategy: self.config.batch_strategy.to_string(),
            dimension: self.domain.dim(),
            batch_size: self.config.batch_size,
            initial_design: self.config.initial_design,
            exact_feval: self.config.exact_feval,
            iterations: self.iterations,
            evaluations: self.ys.len(),
            best_x: self.x_best().map(|x| x.iter().copied().collect()),
            best_energy: self.fx_best(),
            trace: self.trace.clone(),
        }
    }

    /// Write the run report as JSON to the given path
    pub fn save_report(&self, path: &Path) -> Result<(), BayesError> {
        let file = File::create(path).map_err(BayesError::Report)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.report())?;
        Ok(())
    }

    fn noise_level(&self) -> f64 {
        if self.config.exact_feval {
            1e-10
        } else {
            1e-3
        }
    }

    fn fit_surrogate(&self) -> Result<GaussianProcess, BayesError> {
        Ok(GaussianProcess::fit(&self.xs, &self.ys, self.noise_level())?)
    }

    /// Draw `count` feasible points by rejection sampling
    fn sample_feasible(&mut self, count: usize) -> Result<Vec<DVector<f64>>, BayesError> {
        let max_attempts = count.saturating_mul(FEASIBLE_ATTEMPTS_PER_POINT);
        let mut points = Vec::with_capacity(count);
        let mut attempts = 0;

        while points.len() < count {
            if attempts >= max_attempts {
                return Err(BayesError::InfeasibleDomain(attempts));
            }
            attempts += 1;

            let x = self.domain.sample(&mut self.rng);
            if self.constraints.iter().all(|c| c.satisfied(&x)) {
                points.push(x);
            }
        }

        Ok(points)
    }

    /// Pick the next batch of points from a random feasible candidate pool
    fn select_batch(
        &mut self,
        surrogate: &GaussianProcess,
    ) -> Result<Vec<DVector<f64>>, BayesError> {
        let best_y = self.fx_best().ok_or(BayesError::NoObservations)?;
        let pool = self.sample_feasible(self.config.acquisition_samples)?;
        let scores: Vec<f64> = pool
            .iter()
            .map(|x| {
                let (mean, variance) = surrogate.predict(x);
                self.config.acquisition.score(mean, variance, best_y)
            })
            .collect();

        let batch = match self.config.batch_strategy {
            BatchStrategy::Sequential => vec![pool[argmax(&scores)].clone()],
            BatchStrategy::Random => {
                let mut batch = vec![pool[argmax(&scores)].clone()];
                batch.extend(self.sample_feasible(self.config.batch_size - 1)?);
                batch
            }
            BatchStrategy::LocalPenalization => {
                let length_scale = surrogate.length_scale();
                let mut chosen: Vec<usize> = Vec::with_capacity(self.config.batch_size);

                for _ in 0..self.config.batch_size {
                    let mut best_idx = None;
                    let mut best_score = f64::NEG_INFINITY;

                    for (i, x) in pool.iter().enumerate() {
                        if chosen.contains(&i) {
                            continue;
                        }
                        let penalty: f64 = chosen
                            .iter()
                            .map(|&j| {
                                let d2 = (x - &pool[j]).norm_squared();
                                1.0 - (-d2 / (2.0 * length_scale * length_scale)).exp()
                            })
                            .product();
                        let score = scores[i] * penalty;
                        if best_idx.is_none() || score > best_score {
                            best_idx = Some(i);
                            best_score = score;
                        }
                    }

                    if let Some(i) = best_idx {
                        chosen.push(i);
                    }
                }

                chosen.into_iter().map(|i| pool[i].clone()).collect()
            }
        };

        Ok(batch)
    }

    /// Evaluate a batch with a single objective call and record the results
    fn evaluate_batch(&mut self, points: Vec<DVector<f64>>) -> Result<(), BayesError> {
        let n = points.len();
        let d = self.domain.dim();
        let x = DMatrix::from_fn(n, d, |i, j| points[i][j]);

        let y = (self.objective)(&x).map_err(BayesError::Objective)?;
        if y.len() != n {
            return Err(BayesError::ObjectiveShape {
                expected: n,
                actual: y.len(),
            });
        }

        for (point, &value) in points.into_iter().zip(y.iter()) {
            if !value.is_finite() {
                return Err(BayesError::NonFiniteObjective);
            }
            let improved = self.best.as_ref().map_or(true, |(_, b)| value < *b);
            if improved {
                self.best = Some((point.clone(), value));
            }
            self.xs.push(point);
            self.ys.push(value);
        }

        Ok(())
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
