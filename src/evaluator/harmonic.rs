//! Harmonic restraint toward a reference geometry

use nalgebra::Vector3;

use crate::evaluator::{Evaluator, EvaluatorError};
use crate::molecule::Molecule;

/// Quadratic single-minimum potential: the energy is the force constant
/// times the summed squared displacement of every atom from a fixed
/// reference geometry.
///
/// The reference is frame-dependent, so this evaluator is meant for
/// Cartesian searches and for exercising optimizers on a surface whose
/// minimum is known exactly.
#[derive(Debug, Clone)]
pub struct HarmonicWell {
    reference: Vec<Vector3<f64>>,
    /// Force constant (in kcal/mol per squared Angstrom)
    pub force_constant: f64,
}

impl HarmonicWell {
    /// Restrain toward an explicit reference geometry
    pub fn new(reference: Vec<Vector3<f64>>, force_constant: f64) -> Self {
        Self {
            reference,
            force_constant,
        }
    }

    /// Restrain toward the molecule's current geometry
    pub fn centered_on(molecule: &Molecule, force_constant: f64) -> Self {
        Self::new(molecule.positions(), force_constant)
    }

    /// The reference geometry
    pub fn reference(&self) -> &[Vector3<f64>] {
        &self.reference
    }
}

impl Evaluator for HarmonicWell {
    fn name(&self) -> &'static str {
        "harmonic-well"
    }

    fn energy(&self, molecule: &Molecule) -> Result<f64, EvaluatorError> {
        if molecule.atoms.len() != self.reference.len() {
            return Err(EvaluatorError::AtomCountMismatch {
                expected: self.reference.len(),
                actual: molecule.atoms.len(),
            });
        }

        let energy = self.force_constant
            * molecule
                .atoms
                .iter()
                .zip(&self.reference)
                .map(|(atom, target)| (atom.position - target).norm_squared())
                .sum::<f64>();

        Ok(energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::{AtomSpec, ConstructionOptions, MoleculeSpec};
    use assert_approx_eq::assert_approx_eq;

    fn single_argon(x: f64) -> Molecule {
        let spec = MoleculeSpec {
            name: String::new(),
            atoms: vec![AtomSpec {
                element: "Ar".to_string(),
                position: [x, 0.0, 0.0],
            }],
        };
        Molecule::construct(&spec, None, &ConstructionOptions::default()).unwrap()
    }

    #[test]
    fn test_zero_at_reference() {
        let molecule = single_argon(1.5);
        let well = HarmonicWell::centered_on(&molecule, 2.0);
        assert_approx_eq!(well.energy(&molecule).unwrap(), 0.0, 1e-12);
    }

    #[test]
    fn test_quadratic_growth() {
        let well = HarmonicWell::centered_on(&single_argon(0.0), 2.0);
        assert_approx_eq!(well.energy(&single_argon(1.0)).unwrap(), 2.0, 1e-12);
        assert_approx_eq!(well.energy(&single_argon(2.0)).unwrap(), 8.0, 1e-12);
    }

    #[test]
    fn test_atom_count_mismatch() {
        let well = HarmonicWell::new(vec![Vector3::zeros(), Vector3::zeros()], 1.0);
        assert!(matches!(
            well.energy(&single_argon(0.0)),
            Err(EvaluatorError::AtomCountMismatch { expected: 2, actual: 1 })
        ));
    }
}
