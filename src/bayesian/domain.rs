//! Search domains and constraints for the Bayesian optimizer

use nalgebra::DVector;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from an invalid search domain
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("domain has no variables")]
    Empty,

    #[error("variable {name}: lower bound {lower} is not below upper bound {upper}")]
    InvertedBounds {
        name: String,
        lower: f64,
        upper: f64,
    },

    #[error("variable {name}: no discrete choices")]
    NoChoices { name: String },
}

/// Admissible values of one search dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Bounds {
    /// A closed interval
    Continuous { lower: f64, upper: f64 },

    /// A finite set of admissible values
    Discrete { choices: Vec<f64> },
}

/// One named search dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub bounds: Bounds,
}

/// The bounded space candidate coordinate vectors are proposed from.
///
/// Serializes as a bare list of variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain {
    variables: Vec<Variable>,
}

impl Domain {
    /// Build a domain from named variables
    pub fn new(variables: Vec<Variable>) -> Self {
        Self { variables }
    }

    /// A purely continuous domain with autogenerated variable names
    pub fn continuous(bounds: &[(f64, f64)]) -> Self {
        let variables = bounds
            .iter()
            .enumerate()
            .map(|(i, &(lower, upper))| Variable {
                name: format!("x{}", i),
                bounds: Bounds::Continuous { lower, upper },
            })
            .collect();
        Self { variables }
    }

    /// Number of dimensions
    pub fn dim(&self) -> usize {
        self.variables.len()
    }

    /// The variables, in coordinate order
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Check that every variable is well formed
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.variables.is_empty() {
            return Err(DomainError::Empty);
        }

        for variable in &self.variables {
            match &variable.bounds {
                Bounds::Continuous { lower, upper } => {
                    if !(lower < upper) {
                        return Err(DomainError::InvertedBounds {
                            name: variable.name.clone(),
                            lower: *lower,
                            upper: *upper,
                        });
                    }
                }
                Bounds::Discrete { choices } => {
                    if choices.is_empty() {
                        return Err(DomainError::NoChoices {
                            name: variable.name.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Draw a uniform sample from the domain
    pub fn sample<R: Rng>(&self, rng: &mut R) -> DVector<f64> {
        DVector::from_iterator(
            self.variables.len(),
            self.variables.iter().map(|v| match &v.bounds {
                Bounds::Continuous { lower, upper } => lower + (upper - lower) * rng.gen::<f64>(),
                Bounds::Discrete { choices } => choices[rng.gen_range(0..choices.len())],
            }),
        )
    }

    /// Whether a point lies inside the domain
    pub fn contains(&self, x: &DVector<f64>) -> bool {
        if x.len() != self.variables.len() {
            return false;
        }

        self.variables.iter().zip(x.iter()).all(|(v, &value)| {
            match &v.bounds {
                Bounds::Continuous { lower, upper } => value >= *lower && value <= *upper,
                Bounds::Discrete { choices } => {
                    choices.iter().any(|&c| (c - value).abs() < 1e-12)
                }
            }
        })
    }
}

/// A named inequality constraint on the domain, satisfied when its value is
/// non-positive.
pub struct Constraint {
    name: String,
    f: Box<dyn Fn(&DVector<f64>) -> f64 + Send + Sync>,
}

impl Constraint {
    /// Wrap a constraint function; `f(x) <= 0` means feasible.
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&DVector<f64>) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }

    /// Constraint name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw constraint value at a point
    pub fn evaluate(&self, x: &DVector<f64>) -> f64 {
        (self.f)(x)
    }

    /// Whether the point is feasible under this constraint
    pub fn satisfied(&self, x: &DVector<f64>) -> bool {
        self.evaluate(x) <= 0.0
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_validate_rejects_empty() {
        assert!(matches!(
            Domain::new(vec![]).validate(),
            Err(DomainError::Empty)
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let domain = Domain::continuous(&[(1.0, 1.0)]);
        assert!(matches!(
            domain.validate(),
            Err(DomainError::InvertedBounds { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_choices() {
        let domain = Domain::new(vec![Variable {
            name: "kind".to_string(),
            bounds: Bounds::Discrete { choices: vec![] },
        }]);
        assert!(matches!(domain.validate(), Err(DomainError::NoChoices { .. })));
    }

    #[test]
    fn test_samples_stay_inside() {
        let domain = Domain::new(vec![
            Variable {
                name: "r".to_string(),
                bounds: Bounds::Continuous { lower: 2.0, upper: 5.0 },
            },
            Variable {
                name: "kind".to_string(),
                bounds: Bounds::Discrete { choices: vec![-1.0, 0.0, 1.0] },
            },
        ]);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let x = domain.sample(&mut rng);
            assert!(domain.contains(&x));
        }
    }

    #[test]
    fn test_contains_rejects_wrong_dimension() {
        let domain = Domain::continuous(&[(0.0, 1.0)]);
        assert!(!domain.contains(&DVector::from_vec(vec![0.5, 0.5])));
    }

    #[test]
    fn test_constraint_feasibility() {
        let c = Constraint::new("x0 below zero", |x: &DVector<f64>| x[0]);
        assert!(c.satisfied(&DVector::from_vec(vec![-0.5])));
        assert!(!c.satisfied(&DVector::from_vec(vec![0.5])));
    }
}
