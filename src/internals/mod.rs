//! Internal (Z-matrix) coordinate systems
//!
//! A [`ZMatrix`] describes each atom after the first by a bond length to an
//! earlier atom, plus an angle and a dihedral once enough reference atoms
//! exist. It converts both ways: measuring internal values from Cartesian
//! positions, and rebuilding Cartesian positions from internal values by
//! sequential placement in a canonical frame. Pairwise energies are
//! invariant under the rigid motion between the original and canonical
//! frames, so the round trip is exact in internal-coordinate space.

use nalgebra::{DVector, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from building or applying an internal coordinate system
#[derive(Error, Debug)]
pub enum InternalsError {
    #[error("atom {atom}: reference atom {reference} does not precede it")]
    ForwardReference { atom: usize, reference: usize },

    #[error("atom {atom}: expected references ({expected})")]
    WrongArity { atom: usize, expected: &'static str },

    #[error("atom {atom}: duplicate reference atoms")]
    DuplicateReference { atom: usize },

    #[error("coordinate vector has length {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("coordinate set has {actual} atoms, expected {expected}")]
    AtomCountMismatch { expected: usize, actual: usize },

    #[error("atom {atom}: bond length {value} is not positive")]
    NonPositiveBond { atom: usize, value: f64 },

    #[error("atom {atom}: reference atoms are degenerate (coincident or collinear)")]
    DegenerateReference { atom: usize },
}

/// Reference atoms for one Z-matrix row.
///
/// Row 0 has no references, row 1 a bond only, row 2 a bond and an angle,
/// every later row all three. All references point at strictly earlier rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZRow {
    /// Bond-length reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond: Option<usize>,

    /// Angle reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<usize>,

    /// Dihedral reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dihedral: Option<usize>,
}

/// A validated Z-matrix topology covering every atom of a molecule
#[derive(Debug, Clone, PartialEq)]
pub struct ZMatrix {
    rows: Vec<ZRow>,
}

// Reference geometry below this threshold cannot define a frame.
const DEGENERACY_EPS: f64 = 1e-10;

impl ZMatrix {
    /// Validate and build a Z-matrix from per-atom reference rows.
    pub fn new(rows: Vec<ZRow>) -> Result<Self, InternalsError> {
        for (i, row) in rows.iter().enumerate() {
            let expected: &'static str = match i {
                0 => "none",
                1 => "bond",
                2 => "bond, angle",
                _ => "bond, angle, dihedral",
            };

            let arity_ok = match i {
                0 => row.bond.is_none() && row.angle.is_none() && row.dihedral.is_none(),
                1 => row.bond.is_some() && row.angle.is_none() && row.dihedral.is_none(),
                2 => row.bond.is_some() && row.angle.is_some() && row.dihedral.is_none(),
                _ => row.bond.is_some() && row.angle.is_some() && row.dihedral.is_some(),
            };
            if !arity_ok {
                return Err(InternalsError::WrongArity { atom: i, expected });
            }

            let refs: Vec<usize> = [row.bond, row.angle, row.dihedral]
                .into_iter()
                .flatten()
                .collect();
            for &r in &refs {
                if r >= i {
                    return Err(InternalsError::ForwardReference {
                        atom: i,
                        reference: r,
                    });
                }
            }
            for a in 0..refs.len() {
                for b in (a + 1)..refs.len() {
                    if refs[a] == refs[b] {
                        return Err(InternalsError::DuplicateReference { atom: i });
                    }
                }
            }
        }

        Ok(Self { rows })
    }

    /// A sequential chain topology: atom i bonded to i-1, angle to i-2,
    /// dihedral to i-3. The usual choice for small near-linear systems.
    pub fn chain(atom_count: usize) -> Self {
        let rows = (0..atom_count)
            .map(|i| ZRow {
                bond: if i >= 1 { Some(i - 1) } else { None },
                angle: if i >= 2 { Some(i - 2) } else { None },
                dihedral: if i >= 3 { Some(i - 3) } else { None },
            })
            .collect();

        Self { rows }
    }

    /// Number of atoms this topology covers
    pub fn atom_count(&self) -> usize {
        self.rows.len()
    }

    /// Internal degrees of freedom (3N-6 for N >= 3)
    pub fn dof(&self) -> usize {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, _)| i.min(3))
            .sum()
    }

    /// Per-atom reference rows
    pub fn rows(&self) -> &[ZRow] {
        &self.rows
    }

    /// Measure internal coordinate values from Cartesian positions.
    ///
    /// Values are ordered per atom: bond (Angstroms), then angle and
    /// dihedral (radians) where defined.
    pub fn values(&self, positions: &[Vector3<f64>]) -> Result<DVector<f64>, InternalsError> {
        if positions.len() != self.rows.len() {
            return Err(InternalsError::AtomCountMismatch {
                expected: self.rows.len(),
                actual: positions.len(),
            });
        }

        let mut values = Vec::with_capacity(self.dof());
        for (i, row) in self.rows.iter().enumerate().skip(1) {
            let b = row.bond.unwrap_or(0);
            let v = positions[i] - positions[b];
            let r = v.norm();
            if r < DEGENERACY_EPS {
                return Err(InternalsError::DegenerateReference { atom: i });
            }
            values.push(r);

            if let Some(a) = row.angle {
                let u = positions[a] - positions[b];
                let un = u.norm();
                if un < DEGENERACY_EPS {
                    return Err(InternalsError::DegenerateReference { atom: i });
                }
                let cos = (v.dot(&u) / (r * un)).clamp(-1.0, 1.0);
                values.push(cos.acos());
            }

            if let Some(d) = row.dihedral {
                let a = row.angle.unwrap_or(0);
                let (_, m, n) =
                    dihedral_frame(&positions[b], &positions[a], &positions[d], i)?;
                values.push(v.dot(&n).atan2(v.dot(&m)));
            }
        }

        Ok(DVector::from_vec(values))
    }

    /// Rebuild Cartesian positions from internal coordinate values.
    ///
    /// Atoms are placed sequentially in a canonical frame: the first atom at
    /// the origin, the second along +x from its bond reference, and later
    /// atoms by bond length, angle and dihedral relative to already-placed
    /// references.
    pub fn to_cartesian(&self, values: &DVector<f64>) -> Result<Vec<Vector3<f64>>, InternalsError> {
        if values.len() != self.dof() {
            return Err(InternalsError::DimensionMismatch {
                expected: self.dof(),
                actual: values.len(),
            });
        }

        let mut positions: Vec<Vector3<f64>> = Vec::with_capacity(self.rows.len());
        let mut next = 0usize;

        for (i, row) in self.rows.iter().enumerate() {
            if i == 0 {
                positions.push(Vector3::zeros());
                continue;
            }

            let r = values[next];
            next += 1;
            if r <= 0.0 {
                return Err(InternalsError::NonPositiveBond { atom: i, value: r });
            }
            let b = positions[row.bond.unwrap_or(0)];

            if i == 1 {
                positions.push(b + r * Vector3::x());
                continue;
            }

            let theta = values[next];
            next += 1;
            let a = positions[row.angle.unwrap_or(0)];

            let (bc, m, n) = if let Some(d) = row.dihedral {
                dihedral_frame(&b, &a, &positions[d], i)?
            } else {
                // Second atom placed with an angle only: any frame
                // perpendicular to the bond axis works.
                let ab = b - a;
                let norm = ab.norm();
                if norm < DEGENERACY_EPS {
                    return Err(InternalsError::DegenerateReference { atom: i });
                }
                let bc = ab / norm;
                let n = any_perpendicular(&bc);
                let m = bc.cross(&n);
                (bc, m, n)
            };

            let phi = if row.dihedral.is_some() {
                let phi = values[next];
                next += 1;
                phi
            } else {
                0.0
            };

            let position = b - r * theta.cos() * bc
                + r * theta.sin() * phi.cos() * m
                + r * theta.sin() * phi.sin() * n;
            positions.push(position);
        }

        Ok(positions)
    }
}

/// Orthonormal frame for measuring and placing dihedrals around the
/// bond reference `b`, with angle reference `a` and dihedral reference `d`.
fn dihedral_frame(
    b: &Vector3<f64>,
    a: &Vector3<f64>,
    d: &Vector3<f64>,
    atom: usize,
) -> Result<(Vector3<f64>, Vector3<f64>, Vector3<f64>), InternalsError> {
    let ab = b - a;
    let norm = ab.norm();
    if norm < DEGENERACY_EPS {
        return Err(InternalsError::DegenerateReference { atom });
    }
    let bc = ab / norm;

    let plane = (a - d).cross(&bc);
    let plane_norm = plane.norm();
    if plane_norm < DEGENERACY_EPS {
        return Err(InternalsError::DegenerateReference { atom });
    }
    let n = plane / plane_norm;
    let m = bc.cross(&n);

    Ok((bc, m, n))
}

/// A unit vector perpendicular to `v`, chosen along the axis `v` is least
/// aligned with.
fn any_perpendicular(v: &Vector3<f64>) -> Vector3<f64> {
    let axis = if v.x.abs() <= v.y.abs() && v.x.abs() <= v.z.abs() {
        Vector3::x()
    } else if v.y.abs() <= v.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };

    v.cross(&axis).normalize()
}
