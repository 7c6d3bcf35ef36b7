//! Gaussian-process surrogate model
//!
//! A Kriging-style surrogate: constant (zero) trend on standardized targets
//! with a squared-exponential correlation kernel. The length scale is picked
//! by log marginal likelihood over a small grid around the median-distance
//! heuristic, which is robust enough for the modest sample sizes a geometry
//! search accumulates.

use log::debug;
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use thiserror::Error;

use crate::math::median;

/// Errors from fitting or querying the surrogate
#[derive(Error, Debug)]
pub enum SurrogateError {
    #[error("cannot fit a surrogate to an empty sample")]
    NoData,

    #[error("sample contains non-finite values")]
    NonFinite,

    #[error("kernel matrix is not positive definite")]
    IllConditioned,
}

/// A fitted Gaussian process over observed (x, y) pairs
pub struct GaussianProcess {
    x_train: Vec<DVector<f64>>,
    alpha: DVector<f64>,
    chol: Cholesky<f64, Dyn>,
    length_scale: f64,
    noise: f64,
    y_mean: f64,
    y_std: f64,
}

// Length scales tried relative to the median pairwise distance.
const SCALE_GRID: [f64; 5] = [0.25, 0.5, 1.0, 2.0, 4.0];

impl GaussianProcess {
    /// Fit the surrogate to observations. `noise` is the target variance on
    /// the standardized scale; pass something tiny for noiseless objectives.
    pub fn fit(
        xs: &[DVector<f64>],
        ys: &[f64],
        noise: f64,
    ) -> Result<Self, SurrogateError> {
        let n = xs.len();
        if n == 0 || ys.len() != n {
            return Err(SurrogateError::NoData);
        }
        if ys.iter().any(|y| !y.is_finite())
            || xs.iter().any(|x| x.iter().any(|v| !v.is_finite()))
        {
            return Err(SurrogateError::NonFinite);
        }

        let y_mean = ys.iter().sum::<f64>() / n as f64;
        let variance = ys.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>() / n as f64;
        let y_std = if variance.sqrt() > 1e-12 {
            variance.sqrt()
        } else {
            1.0
        };
        let z = DVector::from_iterator(n, ys.iter().map(|y| (y - y_mean) / y_std));

        let mut distances = Vec::with_capacity(n * (n - 1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                distances.push((&xs[i] - &xs[j]).norm());
            }
        }
        let pivot = match median(&distances) {
            Some(m) if m > 1e-12 => m,
            _ => 1.0,
        };

        let mut best: Option<(f64, f64, Cholesky<f64, Dyn>, DVector<f64>)> = None;
        for scale in SCALE_GRID {
            let length_scale = pivot * scale;
            let kernel = kernel_matrix(xs, length_scale, noise);
            let Some(chol) = factorize(kernel) else {
                continue;
            };

            let alpha = chol.solve(&z);
            let log_det: f64 = chol.l().diagonal().iter().map(|d| d.ln()).sum();
            let lml = -0.5 * z.dot(&alpha)
                - log_det
                - 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln();

            if best.as_ref().map_or(true, |(b, ..)| lml > *b) {
                best = Some((lml, length_scale, chol, alpha));
            }
        }

        let (lml, length_scale, chol, alpha) = best.ok_or(SurrogateError::IllConditioned)?;
        debug!(
            "surrogate fitted: n={}, length scale {:.4}, log marginal likelihood {:.4}",
            n, length_scale, lml
        );

        Ok(Self {
            x_train: xs.to_vec(),
            alpha,
            chol,
            length_scale,
            noise,
            y_mean,
            y_std,
        })
    }

    /// Posterior mean and variance at a point, on the original target scale
    pub fn predict(&self, x: &DVector<f64>) -> (f64, f64) {
        let k = DVector::from_iterator(
            self.x_train.len(),
            self.x_train
                .iter()
                .map(|xi| squared_exponential(x, xi, self.length_scale)),
        );

        let mean_z = k.dot(&self.alpha);
        let v = self.chol.solve(&k);
        let var_z = (1.0 - k.dot(&v)).max(1e-12);

        (
            self.y_mean + self.y_std * mean_z,
            var_z * self.y_std * self.y_std,
        )
    }

    /// The fitted kernel length scale
    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    /// The noise level the surrogate was fitted with
    pub fn noise(&self) -> f64 {
        self.noise
    }
}

fn squared_exponential(a: &DVector<f64>, b: &DVector<f64>, length_scale: f64) -> f64 {
    let d2 = (a - b).norm_squared();
    (-d2 / (2.0 * length_scale * length_scale)).exp()
}

fn kernel_matrix(xs: &[DVector<f64>], length_scale: f64, noise: f64) -> DMatrix<f64> {
    let n = xs.len();
    let mut k = DMatrix::from_fn(n, n, |i, j| {
        squared_exponential(&xs[i], &xs[j], length_scale)
    });
    for i in 0..n {
        k[(i, i)] += noise;
    }
    k
}

/// Cholesky factorization with escalating jitter on near-singular kernels
fn factorize(kernel: DMatrix<f64>) -> Option<Cholesky<f64, Dyn>> {
    if let Some(chol) = Cholesky::new(kernel.clone()) {
        return Some(chol);
    }

    let n = kernel.nrows();
    let mut jitter = 1e-10;
    while jitter <= 1e-2 {
        let mut bumped = kernel.clone();
        for i in 0..n {
            bumped[(i, i)] += jitter;
        }
        if let Some(chol) = Cholesky::new(bumped) {
            return Some(chol);
        }
        jitter *= 10.0;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn sample_1d(xs: &[f64], f: impl Fn(f64) -> f64) -> (Vec<DVector<f64>>, Vec<f64>) {
        let points: Vec<DVector<f64>> = xs.iter().map(|&x| DVector::from_vec(vec![x])).collect();
        let values = xs.iter().map(|&x| f(x)).collect();
        (points, values)
    }

    #[test]
    fn test_fit_rejects_empty_sample() {
        assert!(matches!(
            GaussianProcess::fit(&[], &[], 1e-10),
            Err(SurrogateError::NoData)
        ));
    }

    #[test]
    fn test_fit_rejects_non_finite() {
        let (xs, _) = sample_1d(&[0.0, 1.0], |x| x);
        assert!(matches!(
            GaussianProcess::fit(&xs, &[0.0, f64::NAN], 1e-10),
            Err(SurrogateError::NonFinite)
        ));
    }

    #[test]
    fn test_interpolates_noiseless_sample() {
        let (xs, ys) = sample_1d(&[0.0, 0.5, 1.0, 1.5, 2.0], |x| (x - 1.0) * (x - 1.0));
        let gp = GaussianProcess::fit(&xs, &ys, 1e-10).unwrap();

        for (x, y) in xs.iter().zip(&ys) {
            let (mean, var) = gp.predict(x);
            assert_approx_eq!(mean, *y, 1e-4);
            assert!(var < 1e-4);
        }
    }

    #[test]
    fn test_variance_grows_away_from_data() {
        let (xs, ys) = sample_1d(&[0.0, 1.0], |x| x);
        let gp = GaussianProcess::fit(&xs, &ys, 1e-10).unwrap();

        let (_, var_near) = gp.predict(&DVector::from_vec(vec![0.5]));
        let (_, var_far) = gp.predict(&DVector::from_vec(vec![10.0]));
        assert!(var_far > var_near);
    }

    #[test]
    fn test_single_observation() {
        let (xs, ys) = sample_1d(&[1.0], |_| 3.0);
        let gp = GaussianProcess::fit(&xs, &ys, 1e-10).unwrap();

        let (mean, _) = gp.predict(&DVector::from_vec(vec![1.0]));
        assert_approx_eq!(mean, 3.0, 1e-6);
    }
}
