//! Local geometry relaxation using gradient-based methods
//!
//! This module implements L-BFGS minimization of a molecule's energy over
//! its Cartesian coordinates, with finite-difference gradients supplied by
//! the evaluator.

use log::debug;
use nalgebra::{DVector, Vector3};
use rayon::prelude::*;

use crate::evaluator::Evaluator;
use crate::molecule::Molecule;
use crate::optimization::OptimizationError;

/// Parameters for local geometry relaxation
#[derive(Debug, Clone)]
pub struct LocalOptimizerParams {
    /// Step size for finite difference gradient computation (in Angstroms)
    pub gradient_step: f64,

    /// Initial step size for line search
    pub initial_step: f64,

    /// Convergence tolerance for energy change (in kcal/mol)
    pub energy_tolerance: f64,

    /// Convergence tolerance for the gradient norm
    pub gradient_tolerance: f64,

    /// Maximum number of iterations
    pub max_iterations: usize,

    /// Armijo parameter for line search (c1)
    pub armijo_c1: f64,

    /// Step reduction factor during backtracking
    pub step_shrink: f64,
}

impl Default for LocalOptimizerParams {
    fn default() -> Self {
        Self {
            gradient_step: 1e-4,
            initial_step: 0.1,
            energy_tolerance: 1e-8,
            gradient_tolerance: 1e-5,
            max_iterations: 200,
            armijo_c1: 1e-4,
            step_shrink: 0.5,
        }
    }
}

/// Local geometry optimizer using the L-BFGS method
#[derive(Debug, Clone, Default)]
pub struct LocalOptimizer {
    pub params: LocalOptimizerParams,
}

impl LocalOptimizer {
    /// Create a new local optimizer with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new local optimizer with custom parameters
    pub fn with_params(params: LocalOptimizerParams) -> Self {
        Self { params }
    }

    /// Relax the molecule's geometry under the given evaluator.
    ///
    /// Returns the relaxed molecule and its energy. Failing to reach either
    /// tolerance within the iteration cap is an error, not a silent partial
    /// result.
    pub fn minimize(
        &self,
        molecule: &Molecule,
        evaluator: &dyn Evaluator,
    ) -> Result<(Molecule, f64), OptimizationError> {
        let mut x = flatten(&molecule.positions());
        let mut energy = self.energy_at(molecule, evaluator, &x)?;

        // L-BFGS history
        let m = 10;
        let mut s_history: Vec<DVector<f64>> = Vec::with_capacity(m);
        let mut y_history: Vec<DVector<f64>> = Vec::with_capacity(m);
        let mut rho_history: Vec<f64> = Vec::with_capacity(m);

        for iter in 0..self.params.max_iterations {
            let grad = self.gradient(molecule, evaluator, &x)?;

            let grad_norm = grad.norm();
            if grad_norm < self.params.gradient_tolerance {
                debug!("converged on gradient norm after {} iterations", iter);
                let relaxed = molecule.modify(&unflatten(&x))?;
                return Ok((relaxed, energy));
            }

            let direction = lbfgs_direction(&grad, &s_history, &y_history, &rho_history);

            let (step, new_energy) =
                self.line_search(molecule, evaluator, &x, &direction, energy, &grad)?;

            if step < 1e-12 {
                // No acceptable step along the search direction.
                return Err(OptimizationError::FailedToConverge(iter));
            }

            let new_x = &x + step * &direction;
            let new_grad = self.gradient(molecule, evaluator, &new_x)?;

            let s = &new_x - &x;
            let y = &new_grad - &grad;
            let sy = s.dot(&y);
            if sy > 1e-10 {
                if s_history.len() >= m {
                    s_history.remove(0);
                    y_history.remove(0);
                    rho_history.remove(0);
                }
                s_history.push(s);
                y_history.push(y);
                rho_history.push(1.0 / sy);
            }

            let energy_change = (energy - new_energy).abs();
            x = new_x;
            energy = new_energy;

            if energy_change < self.params.energy_tolerance {
                debug!("converged on energy change after {} iterations", iter + 1);
                let relaxed = molecule.modify(&unflatten(&x))?;
                return Ok((relaxed, energy));
            }
        }

        Err(OptimizationError::FailedToConverge(
            self.params.max_iterations,
        ))
    }

    fn energy_at(
        &self,
        molecule: &Molecule,
        evaluator: &dyn Evaluator,
        x: &DVector<f64>,
    ) -> Result<f64, OptimizationError> {
        let trial = molecule.modify(&unflatten(x))?;
        Ok(evaluator.energy(&trial)?)
    }

    /// Central-difference gradient, one component per coordinate, computed
    /// in parallel.
    fn gradient(
        &self,
        molecule: &Molecule,
        evaluator: &dyn Evaluator,
        x: &DVector<f64>,
    ) -> Result<DVector<f64>, OptimizationError> {
        let h = self.params.gradient_step;

        let components = (0..x.len())
            .into_par_iter()
            .map(|i| {
                let mut forward = x.clone();
                forward[i] += h;
                let mut backward = x.clone();
                backward[i] -= h;

                let high = self.energy_at(molecule, evaluator, &forward)?;
                let low = self.energy_at(molecule, evaluator, &backward)?;
                Ok((high - low) / (2.0 * h))
            })
            .collect::<Result<Vec<f64>, OptimizationError>>()?;

        Ok(DVector::from_vec(components))
    }

    /// Backtracking line search with the Armijo condition
    fn line_search(
        &self,
        molecule: &Molecule,
        evaluator: &dyn Evaluator,
        x: &DVector<f64>,
        direction: &DVector<f64>,
        current_energy: f64,
        grad: &DVector<f64>,
    ) -> Result<(f64, f64), OptimizationError> {
        let mut step = self.params.initial_step;
        let c1 = self.params.armijo_c1;

        let directional_derivative = grad.dot(direction);
        if directional_derivative >= 0.0 {
            return Ok((0.0, current_energy));
        }

        for _ in 0..30 {
            let probe = x + step * direction;
            let energy = self.energy_at(molecule, evaluator, &probe)?;

            if energy <= current_energy + c1 * step * directional_derivative {
                return Ok((step, energy));
            }

            step *= self.params.step_shrink;
        }

        Ok((0.0, current_energy))
    }
}

/// L-BFGS two-loop recursion to compute the search direction
fn lbfgs_direction(
    grad: &DVector<f64>,
    s_history: &[DVector<f64>],
    y_history: &[DVector<f64>],
    rho_history: &[f64],
) -> DVector<f64> {
    if s_history.is_empty() {
        return -grad.clone();
    }

    let k = s_history.len();
    let mut q = grad.clone();
    let mut alpha = vec![0.0; k];

    for i in (0..k).rev() {
        alpha[i] = rho_history[i] * s_history[i].dot(&q);
        q -= alpha[i] * &y_history[i];
    }

    let gamma = s_history[k - 1].dot(&y_history[k - 1]) / y_history[k - 1].dot(&y_history[k - 1]);
    let mut r = gamma * q;

    for i in 0..k {
        let beta = rho_history[i] * y_history[i].dot(&r);
        r += (alpha[i] - beta) * &s_history[i];
    }

    -r
}

fn flatten(positions: &[Vector3<f64>]) -> DVector<f64> {
    let mut flat = Vec::with_capacity(3 * positions.len());
    for p in positions {
        flat.extend_from_slice(&[p.x, p.y, p.z]);
    }
    DVector::from_vec(flat)
}

fn unflatten(x: &DVector<f64>) -> Vec<Vector3<f64>> {
    (0..x.len() / 3)
        .map(|i| Vector3::new(x[3 * i], x[3 * i + 1], x[3 * i + 2]))
        .collect()
}
