//! molbo: Bayesian optimization of molecular geometries
//!
//! This library searches for low-energy molecular geometries by fitting a
//! Gaussian-process surrogate to evaluated trial structures and letting an
//! acquisition function decide where to evaluate next. Trial coordinates
//! can be Cartesian or internal (Z-matrix) values, and every trial geometry
//! can optionally be locally relaxed before scoring.

pub mod atom;
pub mod bayesian;
pub mod evaluator;
pub mod internals;
pub mod io;
pub mod math;
pub mod molecule;
pub mod optimization;
pub mod search;

// Re-export commonly used types and functions
pub use atom::{Atom, Element};
pub use bayesian::acquisition::AcquisitionType;
pub use bayesian::domain::{Bounds, Constraint, Domain, Variable};
pub use bayesian::{BayesConfig, BayesianOptimization, BatchStrategy, RunReport};
pub use evaluator::harmonic::HarmonicWell;
pub use evaluator::lj::LennardJones;
pub use evaluator::Evaluator;
pub use internals::{ZMatrix, ZRow};
pub use molecule::{ConstructionOptions, Molecule, MoleculeSpec};
pub use search::{build_optimizer, energy_objective, optimize_system, BuildOptions};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
