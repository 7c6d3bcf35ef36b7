//! Geometry optimization for molecular structures

pub mod local;

use thiserror::Error;

/// Errors that can occur during geometry optimization
#[derive(Error, Debug)]
pub enum OptimizationError {
    #[error("optimization failed to converge within {0} iterations")]
    FailedToConverge(usize),

    #[error(transparent)]
    Molecule(#[from] crate::molecule::MoleculeError),

    #[error(transparent)]
    Evaluation(#[from] crate::evaluator::EvaluatorError),
}
