//! Energy evaluators for molecular geometries

pub mod harmonic;
pub mod lj;

use rayon::prelude::*;
use thiserror::Error;

use crate::molecule::Molecule;

/// Errors that can occur during energy evaluation
#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("atoms {0} and {1} coincide")]
    CoincidentAtoms(usize, usize),

    #[error("evaluator expects {expected} atoms, molecule has {actual}")]
    AtomCountMismatch { expected: usize, actual: usize },

    #[error("energy diverged to a non-finite value")]
    NonFinite,
}

/// Anything that can score a molecular geometry with a scalar energy.
///
/// The `Send + Sync` bounds enable parallel batch evaluation with rayon.
pub trait Evaluator: Send + Sync {
    /// Get the name of the evaluator
    fn name(&self) -> &'static str;

    /// Energy of a single geometry
    fn energy(&self, molecule: &Molecule) -> Result<f64, EvaluatorError>;

    /// Energies of many geometries in one call, aligned with the input
    /// order. The default evaluates points in parallel.
    fn energies(&self, molecules: &[Molecule]) -> Result<Vec<f64>, EvaluatorError> {
        molecules.par_iter().map(|m| self.energy(m)).collect()
    }
}
