//! Piecewise-linear CDFs as exchanged with the CDF platform
//!
//! A distribution is a pair of coordinate arrays: `xs` weakly ascending and
//! `ys` the cumulative probability at each `x`. Sampling inverts the CDF with
//! linear interpolation inside the bracketing segment.

use crate::error::{ensure_finite, Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default number of points when building a CDF from samples
pub const DEFAULT_CDF_LENGTH: usize = 100;

/// Piecewise-linear CDF, `{"xs": [...], "ys": [...]}` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CdfPoints")]
pub struct Cdf {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

/// Unvalidated wire shape
#[derive(Deserialize)]
struct CdfPoints {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl TryFrom<CdfPoints> for Cdf {
    type Error = Error;

    fn try_from(points: CdfPoints) -> Result<Self> {
        Cdf::new(points.xs, points.ys)
    }
}

impl Cdf {
    /// Create a CDF, validating shape and monotonicity
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
        if xs.is_empty() {
            return Err(Error::InvalidInput("cdf needs at least one point".to_string()));
        }
        if xs.len() != ys.len() {
            return Err(Error::InvalidInput(format!(
                "cdf has {} xs but {} ys",
                xs.len(),
                ys.len()
            )));
        }
        for (&x, &y) in xs.iter().zip(&ys) {
            ensure_finite(x, "cdf x")?;
            ensure_finite(y, "cdf y")?;
            if !(0.0..=1.0).contains(&y) {
                return Err(Error::InvalidInput(format!("cdf y {} is outside [0, 1]", y)));
            }
        }
        if xs.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::InvalidInput("cdf xs must be ascending".to_string()));
        }
        if ys.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::InvalidInput("cdf ys must be ascending".to_string()));
        }
        Ok(Self { xs, ys })
    }

    /// Empirical CDF of `samples` evaluated at `length` evenly spaced points
    /// from the sample minimum to the sample maximum
    pub fn from_samples(samples: &[f64], length: usize) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::InvalidInput("cannot build a cdf from zero samples".to_string()));
        }
        if length < 2 {
            return Err(Error::InvalidInput(format!(
                "cdf length must be at least 2, got {}",
                length
            )));
        }
        let mut sorted = samples
            .iter()
            .map(|&s| ensure_finite(s, "sample"))
            .collect::<Result<Vec<_>>>()?;
        sorted.sort_by(f64::total_cmp);

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let step = (max - min) / (length - 1) as f64;
        let mut xs: Vec<f64> = (0..length).map(|k| min + step * k as f64).collect();
        xs[length - 1] = max;

        let n = sorted.len() as f64;
        let ys = xs
            .iter()
            .map(|&x| sorted.partition_point(|&s| s <= x) as f64 / n)
            .collect();

        Self::new(xs, ys)
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Invert the CDF at uniform draw `u`
    ///
    /// Finds the first point with `ys[i] > u` and interpolates between it and
    /// the previous point. Before the first point the first `x` is returned;
    /// past the last recorded probability the last `x` is returned.
    pub fn sample_with_uniform(&self, u: f64) -> f64 {
        let i = self.ys.partition_point(|&y| y <= u);
        if i == 0 {
            return self.xs[0];
        }
        if i == self.ys.len() {
            return self.xs[i - 1];
        }
        let (x0, x1) = (self.xs[i - 1], self.xs[i]);
        let (y0, y1) = (self.ys[i - 1], self.ys[i]);
        // Defensive: the search already gives ys[i] > u >= ys[i-1]
        if y1 == y0 {
            return x0;
        }
        let w = (u - y0) / (y1 - y0);
        x1 * w + x0 * (1.0 - w)
    }

    /// Value at cumulative probability `q`
    pub fn quantile(&self, q: f64) -> Result<f64> {
        ensure_finite(q, "quantile")?;
        if !(0.0..=1.0).contains(&q) {
            return Err(Error::InvalidInput(format!("quantile {} is outside [0, 1]", q)));
        }
        Ok(self.sample_with_uniform(q))
    }

    /// Draw one value
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sample_with_uniform(rng.gen::<f64>())
    }

    /// Draw `n` values
    pub fn sample_n<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn three_point() -> Cdf {
        Cdf::new(vec![0.0, 1.0, 2.0], vec![0.2, 0.6, 1.0]).unwrap()
    }

    #[test]
    fn test_inverse_mapping() {
        let cdf = three_point();
        assert_eq!(cdf.sample_with_uniform(0.1), 0.0);
        assert!((cdf.sample_with_uniform(0.4) - 0.5).abs() < 1e-12);
        assert!((cdf.sample_with_uniform(0.8) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_last_value_past_final_probability() {
        let cdf = Cdf::new(vec![0.0, 1.0, 2.0], vec![0.2, 0.6, 0.9]).unwrap();
        assert_eq!(cdf.sample_with_uniform(0.95), 2.0);
        assert_eq!(three_point().sample_with_uniform(1.0), 2.0);
    }

    #[test]
    fn test_plateau_is_skipped_for_next_rising_segment() {
        let cdf = Cdf::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 0.5, 0.5, 1.0]).unwrap();
        assert!((cdf.sample_with_uniform(0.5) - 2.0).abs() < 1e-12);
        assert!((cdf.sample_with_uniform(0.25) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_validation() {
        assert!(Cdf::new(vec![], vec![]).is_err());
        assert!(Cdf::new(vec![0.0, 1.0], vec![0.5]).is_err());
        assert!(Cdf::new(vec![1.0, 0.0], vec![0.2, 0.4]).is_err());
        assert!(Cdf::new(vec![0.0, 1.0], vec![0.6, 0.4]).is_err());
        assert!(Cdf::new(vec![0.0, 1.0], vec![0.2, 1.4]).is_err());
        assert!(Cdf::new(vec![0.0, f64::NAN], vec![0.2, 0.4]).is_err());
    }

    #[test]
    fn test_from_samples() {
        let samples: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let cdf = Cdf::from_samples(&samples, 10).unwrap();
        assert_eq!(cdf.len(), 10);
        assert_eq!(cdf.xs()[0], 1.0);
        assert_eq!(cdf.xs()[9], 10.0);
        assert!((cdf.ys()[0] - 0.1).abs() < 1e-12);
        assert_eq!(cdf.ys()[9], 1.0);
    }

    #[test]
    fn test_from_constant_samples() {
        let cdf = Cdf::from_samples(&[4.0; 20], 5).unwrap();
        assert!(cdf.xs().iter().all(|&x| x == 4.0));
        assert!(cdf.ys().iter().all(|&y| y == 1.0));
        assert_eq!(cdf.sample_with_uniform(0.3), 4.0);
    }

    #[test]
    fn test_from_samples_rejects_bad_input() {
        assert!(Cdf::from_samples(&[], 10).is_err());
        assert!(Cdf::from_samples(&[1.0, 2.0], 1).is_err());
        assert!(Cdf::from_samples(&[1.0, f64::INFINITY], 10).is_err());
    }

    #[test]
    fn test_sampling_stays_in_support() {
        let cdf = three_point();
        let mut rng = StdRng::seed_from_u64(5);
        let draws = cdf.sample_n(&mut rng, 2000);
        assert!(draws.iter().all(|&x| (0.0..=2.0).contains(&x)));
        let at_start = draws.iter().filter(|&&x| x == 0.0).count() as f64 / 2000.0;
        assert!((at_start - 0.2).abs() < 0.04, "start fraction {}", at_start);
    }

    #[test]
    fn test_quantile_bounds() {
        let cdf = three_point();
        assert!((cdf.quantile(0.4).unwrap() - 0.5).abs() < 1e-12);
        assert!(cdf.quantile(1.5).is_err());
        assert!(cdf.quantile(f64::NAN).is_err());
    }

    #[test]
    fn test_wire_format_validated() {
        let cdf: Cdf = serde_json::from_str(r#"{"xs": [0, 1, 2], "ys": [0.2, 0.6, 1.0]}"#).unwrap();
        assert_eq!(cdf, three_point());
        let json = serde_json::to_value(&cdf).unwrap();
        assert_eq!(json["xs"][2], 2.0);
        assert!(serde_json::from_str::<Cdf>(r#"{"xs": [2, 1], "ys": [0.2, 0.6]}"#).is_err());
    }
}
