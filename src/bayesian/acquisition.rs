//! Acquisition functions for picking the next points to evaluate

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::math::{normal_cdf, normal_pdf};

/// Failure to parse an acquisition name
#[derive(Error, Debug)]
#[error("unknown acquisition type: {0} (expected EI, LCB or MPI)")]
pub struct ParseAcquisitionError(pub String);

/// Strategy used to score candidate points from the surrogate posterior.
///
/// All scores are "larger is better" for a minimization problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionType {
    /// Expected improvement over the incumbent
    #[default]
    ExpectedImprovement,

    /// Negated lower confidence bound
    LowerConfidenceBound,

    /// Maximum probability of improvement
    ProbabilityOfImprovement,
}

// Exploration weight for the confidence-bound criterion.
const LCB_KAPPA: f64 = 2.0;

impl AcquisitionType {
    /// Score a candidate from its posterior mean and variance, given the
    /// best (lowest) objective value observed so far.
    pub fn score(&self, mean: f64, variance: f64, best: f64) -> f64 {
        let sigma = variance.max(0.0).sqrt();

        match self {
            AcquisitionType::ExpectedImprovement => {
                if sigma < 1e-12 {
                    return (best - mean).max(0.0);
                }
                let z = (best - mean) / sigma;
                (best - mean) * normal_cdf(z) + sigma * normal_pdf(z)
            }
            AcquisitionType::ProbabilityOfImprovement => {
                if sigma < 1e-12 {
                    return if mean < best { 1.0 } else { 0.0 };
                }
                normal_cdf((best - mean) / sigma)
            }
            AcquisitionType::LowerConfidenceBound => -(mean - LCB_KAPPA * sigma),
        }
    }
}

impl FromStr for AcquisitionType {
    type Err = ParseAcquisitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EI" => Ok(AcquisitionType::ExpectedImprovement),
            "LCB" => Ok(AcquisitionType::LowerConfidenceBound),
            "MPI" => Ok(AcquisitionType::ProbabilityOfImprovement),
            _ => Err(ParseAcquisitionError(s.to_string())),
        }
    }
}

impl fmt::Display for AcquisitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcquisitionType::ExpectedImprovement => "EI",
            AcquisitionType::LowerConfidenceBound => "LCB",
            AcquisitionType::ProbabilityOfImprovement => "MPI",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_parse_round_trip() {
        for name in ["EI", "LCB", "MPI"] {
            let parsed: AcquisitionType = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert!("UCB".parse::<AcquisitionType>().is_err());
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            "ei".parse::<AcquisitionType>().unwrap(),
            AcquisitionType::ExpectedImprovement
        );
    }

    #[test]
    fn test_expected_improvement_non_negative() {
        let ei = AcquisitionType::ExpectedImprovement;
        assert!(ei.score(5.0, 1.0, 0.0) >= 0.0);
        assert!(ei.score(-5.0, 1.0, 0.0) > 0.0);
    }

    #[test]
    fn test_expected_improvement_rewards_uncertainty() {
        let ei = AcquisitionType::ExpectedImprovement;
        // Same mean as the incumbent: only variance creates value.
        assert!(ei.score(0.0, 4.0, 0.0) > ei.score(0.0, 1.0, 0.0));
        assert_approx_eq!(ei.score(0.0, 0.0, 0.0), 0.0, 1e-12);
    }

    #[test]
    fn test_probability_of_improvement_bounds() {
        let mpi = AcquisitionType::ProbabilityOfImprovement;
        let p = mpi.score(1.0, 1.0, 0.0);
        assert!(p > 0.0 && p < 0.5);
        assert_approx_eq!(mpi.score(0.0, 1.0, 0.0), 0.5, 1e-9);
    }

    #[test]
    fn test_lcb_prefers_low_mean_and_high_variance() {
        let lcb = AcquisitionType::LowerConfidenceBound;
        assert!(lcb.score(0.0, 1.0, 0.0) > lcb.score(1.0, 1.0, 0.0));
        assert!(lcb.score(0.0, 4.0, 0.0) > lcb.score(0.0, 1.0, 0.0));
    }
}
