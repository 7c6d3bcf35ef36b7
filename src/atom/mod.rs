//! Atom representation and related functionality

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chemical elements understood by the built-in evaluators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    Hydrogen,   // H
    Helium,     // He
    Carbon,     // C
    Nitrogen,   // N
    Oxygen,     // O
    Fluorine,   // F
    Neon,       // Ne
    Phosphorus, // P
    Sulfur,     // S
    Chlorine,   // Cl
    Argon,      // Ar
}

impl Element {
    /// Parse an element from its chemical symbol (case-insensitive)
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "H" => Some(Element::Hydrogen),
            "HE" => Some(Element::Helium),
            "C" => Some(Element::Carbon),
            "N" => Some(Element::Nitrogen),
            "O" => Some(Element::Oxygen),
            "F" => Some(Element::Fluorine),
            "NE" => Some(Element::Neon),
            "P" => Some(Element::Phosphorus),
            "S" => Some(Element::Sulfur),
            "CL" => Some(Element::Chlorine),
            "AR" => Some(Element::Argon),
            _ => None,
        }
    }

    /// Chemical symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Element::Hydrogen => "H",
            Element::Helium => "He",
            Element::Carbon => "C",
            Element::Nitrogen => "N",
            Element::Oxygen => "O",
            Element::Fluorine => "F",
            Element::Neon => "Ne",
            Element::Phosphorus => "P",
            Element::Sulfur => "S",
            Element::Chlorine => "Cl",
            Element::Argon => "Ar",
        }
    }

    /// Atomic mass in unified atomic mass units
    pub fn mass(&self) -> f64 {
        match self {
            Element::Hydrogen => 1.008,
            Element::Helium => 4.0026,
            Element::Carbon => 12.011,
            Element::Nitrogen => 14.007,
            Element::Oxygen => 15.999,
            Element::Fluorine => 18.998,
            Element::Neon => 20.180,
            Element::Phosphorus => 30.974,
            Element::Sulfur => 32.06,
            Element::Chlorine => 35.45,
            Element::Argon => 39.948,
        }
    }

    /// Covalent radius in Angstroms
    pub fn covalent_radius(&self) -> f64 {
        match self {
            Element::Hydrogen => 0.31,
            Element::Helium => 0.28,
            Element::Carbon => 0.76,
            Element::Nitrogen => 0.71,
            Element::Oxygen => 0.66,
            Element::Fluorine => 0.57,
            Element::Neon => 0.58,
            Element::Phosphorus => 1.07,
            Element::Sulfur => 1.05,
            Element::Chlorine => 1.02,
            Element::Argon => 1.06,
        }
    }

    /// Van der Waals radius in Angstroms
    pub fn vdw_radius(&self) -> f64 {
        match self {
            Element::Hydrogen => 1.20,
            Element::Helium => 1.40,
            Element::Carbon => 1.70,
            Element::Nitrogen => 1.55,
            Element::Oxygen => 1.52,
            Element::Fluorine => 1.47,
            Element::Neon => 1.54,
            Element::Phosphorus => 1.80,
            Element::Sulfur => 1.80,
            Element::Chlorine => 1.75,
            Element::Argon => 1.88,
        }
    }
}

/// An atom in 3D space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// Chemical element
    pub element: Element,

    /// Cartesian position (in Angstroms)
    pub position: Vector3<f64>,
}

impl Atom {
    /// Create a new atom
    pub fn new(element: Element, position: Vector3<f64>) -> Self {
        Self { element, position }
    }

    /// Distance to another atom
    pub fn distance(&self, other: &Atom) -> f64 {
        (self.position - other.position).norm()
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({:.4}, {:.4}, {:.4})",
            self.element.symbol(),
            self.position.x,
            self.position.y,
            self.position.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_element_symbol_round_trip() {
        for element in [
            Element::Hydrogen,
            Element::Carbon,
            Element::Oxygen,
            Element::Chlorine,
            Element::Argon,
        ] {
            assert_eq!(Element::from_symbol(element.symbol()), Some(element));
        }
    }

    #[test]
    fn test_element_symbol_case_insensitive() {
        assert_eq!(Element::from_symbol("ar"), Some(Element::Argon));
        assert_eq!(Element::from_symbol(" cl "), Some(Element::Chlorine));
        assert_eq!(Element::from_symbol("Xx"), None);
    }

    #[test]
    fn test_element_radii() {
        assert_eq!(Element::Argon.vdw_radius(), 1.88);
        assert_eq!(Element::Hydrogen.vdw_radius(), 1.20);
        assert!(Element::Carbon.covalent_radius() > Element::Hydrogen.covalent_radius());
    }

    #[test]
    fn test_atom_distance() {
        let a = Atom::new(Element::Argon, Vector3::new(0.0, 0.0, 0.0));
        let b = Atom::new(Element::Argon, Vector3::new(1.0, 1.0, 1.0));

        assert!((a.distance(&b) - 3.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_atom_display() {
        let atom = Atom::new(Element::Oxygen, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(format!("{}", atom), "O(1.0000, 2.0000, 3.0000)");
    }
}
