//! Approximate sampling of the community prediction
//!
//! The platform only reports a coarse histogram of the aggregate prediction
//! over the question range plus the probability mass outside it. The sampler
//! draws from a categorical over the buckets for in-range mass and from a
//! narrow half-logistic just beyond each edge for the tails.

use crate::error::{ensure_finite, Error, Result};
use crate::logistic::LogisticParams;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::debug;

/// Scale of the half-logistic placing out-of-range samples near the range edge
pub const OUTSIDE_RANGE_SCALE: f64 = 0.02;

/// Tolerance on `p_below + p_above <= 1` for values read from the API
const TAIL_SUM_TOLERANCE: f64 = 1e-9;

/// Bucket densities over the normalized range plus out-of-range masses
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityHistogram {
    densities: Vec<f64>,
    p_below: f64,
    p_above: f64,
}

impl CommunityHistogram {
    /// Create a histogram
    ///
    /// Densities need not sum to 1. An empty or all-zero histogram is accepted
    /// here and rejected when a sampler is built from it.
    pub fn new(densities: Vec<f64>, p_below: f64, p_above: f64) -> Result<Self> {
        for &d in &densities {
            ensure_finite(d, "bucket density")?;
            if d < 0.0 {
                return Err(Error::InvalidInput(format!("bucket density {} is negative", d)));
            }
        }
        ensure_finite(p_below, "p_below")?;
        ensure_finite(p_above, "p_above")?;
        if p_below < 0.0 || p_above < 0.0 || p_below + p_above > 1.0 + TAIL_SUM_TOLERANCE {
            return Err(Error::InvalidInput(format!(
                "tail masses must be non-negative with sum <= 1, got below {} above {}",
                p_below, p_above
            )));
        }
        Ok(Self {
            densities,
            p_below,
            p_above,
        })
    }

    /// Build from `prediction_histogram` triples `[x, y, density]` and the
    /// latest community `low`/`high` percentiles
    pub fn from_api(triples: &[[f64; 3]], low: f64, high: f64) -> Result<Self> {
        let densities = triples.iter().map(|t| t[2]).collect();
        Self::new(densities, low, 1.0 - high)
    }

    pub fn densities(&self) -> &[f64] {
        &self.densities
    }

    pub fn bucket_count(&self) -> usize {
        self.densities.len()
    }

    pub fn p_below(&self) -> f64 {
        self.p_below
    }

    pub fn p_above(&self) -> f64 {
        self.p_above
    }

    /// Mass inside the question range
    pub fn p_in_range(&self) -> f64 {
        (1.0 - self.p_below - self.p_above).max(0.0)
    }

    /// Whether any bucket carries density
    pub fn has_predictions(&self) -> bool {
        self.densities.iter().any(|&d| d > 0.0)
    }
}

/// Where a community sample lands relative to the question range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Below,
    InRange,
    Above,
}

const REGIONS: [Region; 3] = [Region::Below, Region::InRange, Region::Above];

/// Draws normalized samples from a [`CommunityHistogram`]
#[derive(Debug, Clone)]
pub struct CommunitySampler {
    buckets: WeightedIndex<f64>,
    bucket_count: usize,
    regions: WeightedIndex<f64>,
    tail: LogisticParams,
}

impl CommunitySampler {
    /// Build a sampler; fails with `Precondition` when no bucket has density
    pub fn new(histogram: &CommunityHistogram) -> Result<Self> {
        if !histogram.has_predictions() {
            return Err(Error::Precondition(format!(
                "community histogram has {} buckets and no density",
                histogram.bucket_count()
            )));
        }
        let buckets = WeightedIndex::new(histogram.densities())
            .map_err(|e| Error::Precondition(format!("community histogram: {}", e)))?;
        let regions = WeightedIndex::new([
            histogram.p_below(),
            histogram.p_in_range(),
            histogram.p_above(),
        ])
        .map_err(|e| Error::InvalidInput(format!("community tail masses: {}", e)))?;
        let tail = LogisticParams::new(0.0, OUTSIDE_RANGE_SCALE)?;

        debug!(
            buckets = histogram.bucket_count(),
            p_below = histogram.p_below(),
            p_above = histogram.p_above(),
            "Built community sampler"
        );

        Ok(Self {
            buckets,
            bucket_count: histogram.bucket_count(),
            regions,
            tail,
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// One sample on the normalized scale
    pub fn sample_normalized<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match REGIONS[self.regions.sample(rng)] {
            Region::Below => -self.tail.sample(rng).abs(),
            Region::InRange => self.buckets.sample(rng) as f64 / self.bucket_count as f64,
            Region::Above => 1.0 + self.tail.sample(rng).abs(),
        }
    }

    /// `n` samples on the normalized scale
    pub fn sample_n<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.sample_normalized(rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_single_nonzero_bucket_always_zero() {
        let histogram = CommunityHistogram::from_api(&[[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]], 0.0, 1.0)
            .unwrap();
        let sampler = CommunitySampler::new(&histogram).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10_000 {
            assert_eq!(sampler.sample_normalized(&mut rng), 0.0);
        }
    }

    #[test]
    fn test_empty_or_zero_histogram_is_precondition() {
        let empty = CommunityHistogram::new(vec![], 0.0, 0.0).unwrap();
        assert!(matches!(CommunitySampler::new(&empty), Err(Error::Precondition(_))));
        let zeros = CommunityHistogram::new(vec![0.0; 5], 0.1, 0.1).unwrap();
        assert!(matches!(CommunitySampler::new(&zeros), Err(Error::Precondition(_))));
    }

    #[test]
    fn test_histogram_validation() {
        assert!(CommunityHistogram::new(vec![1.0, -0.5], 0.0, 0.0).is_err());
        assert!(CommunityHistogram::new(vec![1.0, f64::NAN], 0.0, 0.0).is_err());
        assert!(CommunityHistogram::new(vec![1.0], 0.7, 0.5).is_err());
        assert!(CommunityHistogram::new(vec![1.0], -0.1, 0.0).is_err());
        assert!(CommunityHistogram::new(vec![1.0], 0.5, 0.5).is_ok());
    }

    #[test]
    fn test_tail_masses_from_percentiles() {
        let histogram = CommunityHistogram::from_api(&[[0.0, 0.0, 2.0]], 0.1, 0.75).unwrap();
        assert_eq!(histogram.p_below(), 0.1);
        assert!((histogram.p_above() - 0.25).abs() < 1e-12);
        assert!((histogram.p_in_range() - 0.65).abs() < 1e-12);
    }

    #[test]
    fn test_region_frequencies_and_placement() {
        let histogram = CommunityHistogram::new(vec![1.0; 10], 0.2, 0.3).unwrap();
        let sampler = CommunitySampler::new(&histogram).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let draws = sampler.sample_n(&mut rng, 10_000);

        let below = draws.iter().filter(|&&x| x < 0.0).count() as f64 / 10_000.0;
        let above = draws.iter().filter(|&&x| x >= 1.0).count() as f64 / 10_000.0;
        assert!((below - 0.2).abs() < 0.02, "below fraction {}", below);
        assert!((above - 0.3).abs() < 0.02, "above fraction {}", above);

        for &x in &draws {
            if (0.0..1.0).contains(&x) {
                // In-range draws sit on bucket left edges
                assert!(((x * 10.0).round() - x * 10.0).abs() < 1e-9);
            } else {
                // Tails are narrow: the bulk stays close to the edge
                assert!(x > -2.0 && x < 3.0, "tail sample {}", x);
            }
        }
    }

    #[test]
    fn test_bucket_weights_respected() {
        let histogram = CommunityHistogram::new(vec![3.0, 1.0], 0.0, 0.0).unwrap();
        let sampler = CommunitySampler::new(&histogram).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let draws = sampler.sample_n(&mut rng, 8000);
        let first = draws.iter().filter(|&&x| x == 0.0).count() as f64 / 8000.0;
        assert!((first - 0.75).abs() < 0.03, "first bucket fraction {}", first);
        assert!(draws.iter().all(|&x| x == 0.0 || x == 0.5));
    }
}
