//! Molecule representation and related functionality
//!
//! A [`Molecule`] couples a fixed set of atoms with an optional internal
//! coordinate system. All geometry-changing operations are non-mutating:
//! [`Molecule::modify`] and [`Molecule::optimize`] return new instances, so
//! a base molecule can serve as the immutable anchor of a search while the
//! optimizer probes arbitrary trial geometries around it.

use nalgebra::{DMatrix, DVector, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::atom::{Atom, Element};
use crate::evaluator::{Evaluator, EvaluatorError};
use crate::internals::{InternalsError, ZMatrix};
use crate::optimization::local::LocalOptimizer;
use crate::optimization::OptimizationError;

/// One Cartesian geometry: a position per atom
pub type CoordinateSet = Vec<Vector3<f64>>;

/// Errors that can occur when working with molecules
#[derive(Error, Debug)]
pub enum MoleculeError {
    #[error("molecule has no atoms")]
    Empty,

    #[error("unknown element symbol: {0}")]
    UnknownElement(String),

    #[error("internal coordinate system covers {expected} atoms, molecule has {actual}")]
    InternalsMismatch { expected: usize, actual: usize },

    #[error("coordinate vector has length {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("atoms {0} and {1} are closer than the minimum separation {2}")]
    TooClose(usize, usize, f64),

    #[error("molecule has no internal coordinate system")]
    NoInternals,

    #[error(transparent)]
    Internals(#[from] InternalsError),

    #[error(transparent)]
    Evaluation(#[from] EvaluatorError),
}

/// Declarative description of one atom in a [`MoleculeSpec`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomSpec {
    /// Chemical symbol, e.g. "Ar" or "O"
    pub element: String,

    /// Cartesian position (in Angstroms)
    pub position: [f64; 3],
}

/// Declarative description of a molecule, as read from input files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoleculeSpec {
    /// Display name
    #[serde(default)]
    pub name: String,

    /// Atoms with their initial geometry
    pub atoms: Vec<AtomSpec>,
}

/// Options forwarded verbatim to [`Molecule::construct`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstructionOptions {
    /// Translate the initial geometry so its centroid sits at the origin
    #[serde(default)]
    pub recenter: bool,

    /// Reject geometries with any atom pair closer than this (in Angstroms)
    #[serde(default)]
    pub min_separation: Option<f64>,
}

/// A molecule: atoms plus an optional internal coordinate system
#[derive(Debug, Clone)]
pub struct Molecule {
    /// Display name
    pub name: String,

    /// Atoms with their current geometry
    pub atoms: Vec<Atom>,

    internals: Option<ZMatrix>,
}

impl Molecule {
    /// Build a molecule from its specification.
    ///
    /// Validation happens here, not at evaluation time: unknown elements,
    /// empty atom lists, an internal coordinate system that does not cover
    /// the atom count, and (when requested) overlapping atoms all fail
    /// immediately.
    pub fn construct(
        spec: &MoleculeSpec,
        internals: Option<ZMatrix>,
        options: &ConstructionOptions,
    ) -> Result<Self, MoleculeError> {
        if spec.atoms.is_empty() {
            return Err(MoleculeError::Empty);
        }

        let mut atoms = Vec::with_capacity(spec.atoms.len());
        for atom_spec in &spec.atoms {
            let element = Element::from_symbol(&atom_spec.element)
                .ok_or_else(|| MoleculeError::UnknownElement(atom_spec.element.clone()))?;
            let [x, y, z] = atom_spec.position;
            atoms.push(Atom::new(element, Vector3::new(x, y, z)));
        }

        if let Some(zm) = &internals {
            if zm.atom_count() != atoms.len() {
                return Err(MoleculeError::InternalsMismatch {
                    expected: zm.atom_count(),
                    actual: atoms.len(),
                });
            }
        }

        if options.recenter {
            let centroid =
                atoms.iter().fold(Vector3::zeros(), |acc, a| acc + a.position) / atoms.len() as f64;
            for atom in &mut atoms {
                atom.position -= centroid;
            }
        }

        if let Some(min) = options.min_separation {
            for i in 0..atoms.len() {
                for j in (i + 1)..atoms.len() {
                    if atoms[i].distance(&atoms[j]) < min {
                        return Err(MoleculeError::TooClose(i, j, min));
                    }
                }
            }
        }

        Ok(Self {
            name: spec.name.clone(),
            atoms,
            internals,
        })
    }

    /// Whether this molecule carries an internal coordinate system
    pub fn has_internals(&self) -> bool {
        self.internals.is_some()
    }

    /// The internal coordinate system, if any
    pub fn internals(&self) -> Option<&ZMatrix> {
        self.internals.as_ref()
    }

    /// Current atom positions
    pub fn positions(&self) -> CoordinateSet {
        self.atoms.iter().map(|a| a.position).collect()
    }

    /// Dimension of the coordinate vector in the chosen coordinate system
    pub fn coordinate_dim(&self, use_internals: bool) -> Result<usize, MoleculeError> {
        if use_internals {
            Ok(self
                .internals
                .as_ref()
                .ok_or(MoleculeError::NoInternals)?
                .dof())
        } else {
            Ok(3 * self.atoms.len())
        }
    }

    /// The current geometry as a flat coordinate vector: internal values, or
    /// Cartesian positions atom by atom
    pub fn coordinate_vector(&self, use_internals: bool) -> Result<DVector<f64>, MoleculeError> {
        if use_internals {
            let zm = self.internals.as_ref().ok_or(MoleculeError::NoInternals)?;
            Ok(zm.values(&self.positions())?)
        } else {
            let mut flat = Vec::with_capacity(3 * self.atoms.len());
            for atom in &self.atoms {
                flat.extend_from_slice(&[atom.position.x, atom.position.y, atom.position.z]);
            }
            Ok(DVector::from_vec(flat))
        }
    }

    /// Turn a batch of trial coordinate vectors (one per matrix row) into
    /// Cartesian coordinate sets.
    ///
    /// With `shift` false each row is an absolute coordinate state; with
    /// `shift` true each row is added to the molecule's current coordinate
    /// vector first. Rows must match the dimension of the chosen coordinate
    /// system.
    pub fn displaced_coordinates(
        &self,
        trials: &DMatrix<f64>,
        use_internals: bool,
        shift: bool,
    ) -> Result<Vec<CoordinateSet>, MoleculeError> {
        let dim = self.coordinate_dim(use_internals)?;
        if trials.ncols() != dim {
            return Err(MoleculeError::DimensionMismatch {
                expected: dim,
                actual: trials.ncols(),
            });
        }

        let base = if shift {
            Some(self.coordinate_vector(use_internals)?)
        } else {
            None
        };

        let mut sets = Vec::with_capacity(trials.nrows());
        for i in 0..trials.nrows() {
            let mut v: DVector<f64> = trials.row(i).transpose();
            if let Some(base) = &base {
                v += base;
            }

            let coords = if use_internals {
                let zm = self.internals.as_ref().ok_or(MoleculeError::NoInternals)?;
                zm.to_cartesian(&v)?
            } else {
                (0..self.atoms.len())
                    .map(|a| Vector3::new(v[3 * a], v[3 * a + 1], v[3 * a + 2]))
                    .collect()
            };
            sets.push(coords);
        }

        Ok(sets)
    }

    /// A copy of this molecule with the given Cartesian geometry
    pub fn modify(&self, coords: &[Vector3<f64>]) -> Result<Molecule, MoleculeError> {
        if coords.len() != self.atoms.len() {
            return Err(MoleculeError::DimensionMismatch {
                expected: self.atoms.len(),
                actual: coords.len(),
            });
        }

        let mut molecule = self.clone();
        for (atom, position) in molecule.atoms.iter_mut().zip(coords) {
            atom.position = *position;
        }
        Ok(molecule)
    }

    /// Locally relax this geometry under the given evaluator, returning the
    /// relaxed copy
    pub fn optimize(&self, evaluator: &dyn Evaluator) -> Result<Molecule, OptimizationError> {
        let (relaxed, _) = LocalOptimizer::default().minimize(self, evaluator)?;
        Ok(relaxed)
    }

    /// Energy of the current geometry under the given evaluator
    pub fn energy(&self, evaluator: &dyn Evaluator) -> Result<f64, EvaluatorError> {
        evaluator.energy(self)
    }

    /// Energies of a batch of geometries under the given evaluator, aligned
    /// with the input order
    pub fn energies(
        &self,
        sets: &[CoordinateSet],
        evaluator: &dyn Evaluator,
    ) -> Result<DVector<f64>, MoleculeError> {
        let molecules = sets
            .iter()
            .map(|coords| self.modify(coords))
            .collect::<Result<Vec<_>, _>>()?;
        let energies = evaluator.energies(&molecules)?;
        Ok(DVector::from_vec(energies))
    }

    /// Geometric center of the molecule
    pub fn center(&self) -> Result<Vector3<f64>, MoleculeError> {
        if self.atoms.is_empty() {
            return Err(MoleculeError::Empty);
        }

        let sum = self
            .atoms
            .iter()
            .fold(Vector3::zeros(), |acc, atom| acc + atom.position);
        Ok(sum / self.atoms.len() as f64)
    }
}
