//! Logistic distributions and logistic mixtures
//!
//! The submission format of the mixture platform is a weighted mixture of
//! logistic distributions on the normalized scale. Fitting that mixture to
//! samples is delegated to a [`MixtureFitter`]; this module only provides the
//! distribution math the rest of the crate needs (CDF, quantile, sampling).

use crate::error::{ensure_finite, Error, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Smallest scale a fitted component may have before clipping
const MIN_FITTED_SCALE: f64 = 1e-9;

/// Logistic distribution parameters, `scale > 0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    loc: f64,
    scale: f64,
}

impl LogisticParams {
    /// Create parameters, rejecting non-finite values and non-positive scale
    pub fn new(loc: f64, scale: f64) -> Result<Self> {
        ensure_finite(loc, "logistic loc")?;
        ensure_finite(scale, "logistic scale")?;
        if scale <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "logistic scale must be positive, got {}",
                scale
            )));
        }
        Ok(Self { loc, scale })
    }

    pub fn loc(&self) -> f64 {
        self.loc
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Cumulative probability at `x`
    pub fn cdf(&self, x: f64) -> f64 {
        1.0 / (1.0 + (-(x - self.loc) / self.scale).exp())
    }

    /// Inverse CDF; `p` is expected in (0, 1)
    pub fn quantile(&self, p: f64) -> f64 {
        self.loc + self.scale * (p / (1.0 - p)).ln()
    }

    /// Draw one value by inverse-transform sampling
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.quantile(open_unit(rng))
    }
}

/// Uniform draw on the open interval (0, 1)
pub(crate) fn open_unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(f64::MIN_POSITIVE..1.0)
}

/// Weighted mixture of logistic components
///
/// Weights are expected to sum to 1 but only non-negativity and a positive
/// total are enforced; sampling normalizes implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureParams {
    components: Vec<LogisticParams>,
    weights: Vec<f64>,
}

impl MixtureParams {
    pub fn new(components: Vec<LogisticParams>, weights: Vec<f64>) -> Result<Self> {
        if components.is_empty() {
            return Err(Error::InvalidInput("mixture needs at least one component".to_string()));
        }
        if components.len() != weights.len() {
            return Err(Error::InvalidInput(format!(
                "mixture has {} components but {} weights",
                components.len(),
                weights.len()
            )));
        }
        for &w in &weights {
            ensure_finite(w, "mixture weight")?;
            if w < 0.0 {
                return Err(Error::InvalidInput(format!("mixture weight {} is negative", w)));
            }
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(Error::InvalidInput("mixture weights sum to zero".to_string()));
        }
        Ok(Self {
            components,
            weights,
        })
    }

    pub fn components(&self) -> &[LogisticParams] {
        &self.components
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Mixture CDF at `x`
    pub fn cdf(&self, x: f64) -> f64 {
        let total: f64 = self.weights.iter().sum();
        self.components
            .iter()
            .zip(&self.weights)
            .map(|(c, w)| w * c.cdf(x))
            .sum::<f64>()
            / total
    }

    /// One draw from the mixture
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        Ok(self.sample_n(rng, 1)?[0])
    }

    /// Draw `n` values from the mixture
    pub fn sample_n<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Result<Vec<f64>> {
        let picker = WeightedIndex::new(&self.weights)
            .map_err(|e| Error::InvalidInput(format!("mixture weights: {}", e)))?;
        Ok((0..n)
            .map(|_| self.components[picker.sample(rng)].sample(rng))
            .collect())
    }
}

/// Fits a logistic mixture to normalized samples
///
/// The optimizer behind this seam is external; implementations only have to
/// honor the output contract of [`MixtureParams`].
pub trait MixtureFitter {
    /// Fit a mixture, using at most `samples_for_fit` of the given samples
    fn fit(&self, normalized_samples: &[f64], samples_for_fit: usize) -> Result<MixtureParams>;
}

/// Single-component fitter matching the first two moments
///
/// `loc` is the sample mean and `scale = sd * sqrt(3) / pi`, the logistic with
/// the same variance. Useful when no optimizer is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentFitter;

impl MixtureFitter for MomentFitter {
    fn fit(&self, normalized_samples: &[f64], samples_for_fit: usize) -> Result<MixtureParams> {
        let thinned = thin_samples(normalized_samples, samples_for_fit);
        if thinned.is_empty() {
            return Err(Error::InvalidInput("cannot fit a mixture to zero samples".to_string()));
        }
        let n = thinned.len() as f64;
        let mean = thinned.iter().sum::<f64>() / n;
        let variance = thinned.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let scale = (variance.sqrt() * 3f64.sqrt() / PI).max(MIN_FITTED_SCALE);
        MixtureParams::new(vec![LogisticParams::new(mean, scale)?], vec![1.0])
    }
}

/// Evenly strided subset of at most `limit` samples
pub fn thin_samples(samples: &[f64], limit: usize) -> Vec<f64> {
    if limit == 0 || samples.len() <= limit {
        return samples.to_vec();
    }
    let stride = samples.len() as f64 / limit as f64;
    (0..limit)
        .map(|i| samples[((i as f64) * stride) as usize])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_logistic_rejects_degenerate_scale() {
        assert!(LogisticParams::new(0.0, 0.0).is_err());
        assert!(LogisticParams::new(0.0, -1.0).is_err());
        assert!(LogisticParams::new(f64::NAN, 1.0).is_err());
        assert!(LogisticParams::new(0.0, 0.5).is_ok());
    }

    #[test]
    fn test_logistic_cdf_and_quantile_agree() {
        let d = LogisticParams::new(0.3, 0.05).unwrap();
        assert!((d.cdf(0.3) - 0.5).abs() < 1e-12);
        for p in [0.01, 0.2, 0.5, 0.9, 0.999] {
            assert!((d.cdf(d.quantile(p)) - p).abs() < 1e-9);
        }
    }

    #[test]
    fn test_logistic_cdf_saturates_without_nan() {
        let d = LogisticParams::new(0.0, 0.01).unwrap();
        assert_eq!(d.cdf(-100.0), 0.0);
        assert_eq!(d.cdf(100.0), 1.0);
    }

    #[test]
    fn test_logistic_sample_median() {
        let d = LogisticParams::new(2.0, 0.5).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut draws: Vec<f64> = (0..4001).map(|_| d.sample(&mut rng)).collect();
        draws.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let median = draws[2000];
        assert!((median - 2.0).abs() < 0.1, "median was {}", median);
        assert!(draws.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_mixture_validation() {
        let c = LogisticParams::new(0.5, 0.1).unwrap();
        assert!(MixtureParams::new(vec![], vec![]).is_err());
        assert!(MixtureParams::new(vec![c], vec![0.5, 0.5]).is_err());
        assert!(MixtureParams::new(vec![c], vec![-1.0]).is_err());
        assert!(MixtureParams::new(vec![c], vec![0.0]).is_err());
        assert!(MixtureParams::new(vec![c, c], vec![0.4, 0.6]).is_ok());
    }

    #[test]
    fn test_mixture_sampling_respects_weights() {
        let low = LogisticParams::new(0.1, 0.01).unwrap();
        let high = LogisticParams::new(0.9, 0.01).unwrap();
        let mixture = MixtureParams::new(vec![low, high], vec![0.25, 0.75]).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let draws = mixture.sample_n(&mut rng, 8000).unwrap();
        let above = draws.iter().filter(|&&x| x > 0.5).count() as f64 / 8000.0;
        assert!((above - 0.75).abs() < 0.03, "fraction above was {}", above);
        assert!((mixture.cdf(0.5) - 0.25).abs() < 1e-6);

        let single = MixtureParams::new(vec![high], vec![1.0]).unwrap();
        let x = single.sample(&mut rng).unwrap();
        assert!((x - 0.9).abs() < 0.2);
    }

    #[test]
    fn test_moment_fitter_recovers_location() {
        let truth = LogisticParams::new(0.4, 0.08).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let samples: Vec<f64> = (0..6000).map(|_| truth.sample(&mut rng)).collect();
        let fitted = MomentFitter.fit(&samples, 5000).unwrap();
        assert_eq!(fitted.components().len(), 1);
        assert_eq!(fitted.weights(), &[1.0]);
        let c = fitted.components()[0];
        assert!((c.loc() - 0.4).abs() < 0.02, "loc {}", c.loc());
        assert!((c.scale() - 0.08).abs() < 0.02, "scale {}", c.scale());
    }

    #[test]
    fn test_moment_fitter_constant_samples() {
        let fitted = MomentFitter.fit(&[0.3; 10], 5000).unwrap();
        let c = fitted.components()[0];
        assert!((c.loc() - 0.3).abs() < 1e-12);
        assert!(c.scale() > 0.0 && c.scale() < 1e-6);
    }

    #[test]
    fn test_moment_fitter_rejects_empty() {
        assert!(matches!(MomentFitter.fit(&[], 10), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_thin_samples() {
        let samples: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert_eq!(thin_samples(&samples, 20).len(), 10);
        assert_eq!(thin_samples(&samples, 0).len(), 10);
        assert_eq!(thin_samples(&samples, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }
}
