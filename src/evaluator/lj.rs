//! Lennard-Jones 12-6 pair potential

use crate::evaluator::{Evaluator, EvaluatorError};
use crate::molecule::Molecule;

/// Parameters for the Lennard-Jones evaluator
#[derive(Debug, Clone)]
pub struct LennardJonesParams {
    /// Well depth (in kcal/mol), shared across all pairs
    pub well_depth: f64,

    /// Pairs beyond this distance (in Angstroms) contribute nothing
    pub cutoff: f64,
}

impl Default for LennardJonesParams {
    fn default() -> Self {
        Self {
            well_depth: 0.238, // argon-argon, kcal/mol
            cutoff: 12.0,
        }
    }
}

/// 12-6 Lennard-Jones potential with Lorentz combining of per-element
/// van der Waals radii: the pair minimum sits at the sum of the radii.
#[derive(Debug, Clone, Default)]
pub struct LennardJones {
    pub params: LennardJonesParams,
}

// 2^(1/6), the ratio between the pair minimum distance and sigma.
const R_MIN_OVER_SIGMA: f64 = 1.122_462_048_309_373;

impl LennardJones {
    /// Create a new evaluator with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new evaluator with custom parameters
    pub fn with_params(params: LennardJonesParams) -> Self {
        Self { params }
    }
}

impl Evaluator for LennardJones {
    fn name(&self) -> &'static str {
        "lennard-jones"
    }

    fn energy(&self, molecule: &Molecule) -> Result<f64, EvaluatorError> {
        let mut energy = 0.0;

        for i in 0..molecule.atoms.len() {
            for j in (i + 1)..molecule.atoms.len() {
                let a = &molecule.atoms[i];
                let b = &molecule.atoms[j];

                let r = a.distance(b);
                if r < 1e-9 {
                    return Err(EvaluatorError::CoincidentAtoms(i, j));
                }
                if r > self.params.cutoff {
                    continue;
                }

                let r_min = a.element.vdw_radius() + b.element.vdw_radius();
                let sigma = r_min / R_MIN_OVER_SIGMA;
                let sr6 = (sigma / r).powi(6);
                energy += 4.0 * self.params.well_depth * (sr6 * sr6 - sr6);
            }
        }

        if !energy.is_finite() {
            return Err(EvaluatorError::NonFinite);
        }
        Ok(energy)
    }
}
