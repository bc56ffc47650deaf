//! Summary statistics over sample sets

use crate::error::{ensure_finite, Error, Result};
use serde::{Deserialize, Serialize};

/// Which tail(s) to cut when computing central bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutSide {
    #[default]
    Both,
    Lower,
    Upper,
}

/// Quantile of sorted data with linear interpolation between order statistics
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Bounds enclosing the central `percent_kept` of the samples
///
/// With [`CutSide::Both`] half of the excluded mass is cut from each tail;
/// `Lower`/`Upper` cut it all from one side and keep the extreme on the other.
pub fn central_quantiles(samples: &[f64], percent_kept: f64, side: CutSide) -> Result<(f64, f64)> {
    ensure_finite(percent_kept, "percent_kept")?;
    if !(0.0..=1.0).contains(&percent_kept) {
        return Err(Error::InvalidInput(format!(
            "percent_kept {} is outside [0, 1]",
            percent_kept
        )));
    }
    if samples.is_empty() {
        return Err(Error::InvalidInput("no samples to summarize".to_string()));
    }
    let mut sorted = samples
        .iter()
        .map(|&s| ensure_finite(s, "sample"))
        .collect::<Result<Vec<_>>>()?;
    sorted.sort_by(f64::total_cmp);

    let cut = 1.0 - percent_kept;
    let (lower_q, upper_q) = match side {
        CutSide::Both => (cut / 2.0, 1.0 - cut / 2.0),
        CutSide::Lower => (cut, 1.0),
        CutSide::Upper => (0.0, 1.0 - cut),
    };
    Ok((quantile_sorted(&sorted, lower_q), quantile_sorted(&sorted, upper_q)))
}

/// Bounds enclosing the central mass of every series at once
pub fn central_quantiles_all(
    series: &[Vec<f64>],
    percent_kept: f64,
    side: CutSide,
) -> Result<(f64, f64)> {
    let mut bounds: Option<(f64, f64)> = None;
    for samples in series {
        let (lo, hi) = central_quantiles(samples, percent_kept, side)?;
        bounds = Some(match bounds {
            Some((blo, bhi)) => (blo.min(lo), bhi.max(hi)),
            None => (lo, hi),
        });
    }
    bounds.ok_or_else(|| Error::InvalidInput("no series to summarize".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_to_hundred() -> Vec<f64> {
        (0..=100).map(|i| i as f64).collect()
    }

    #[test]
    fn test_both_sides() {
        let (lo, hi) = central_quantiles(&zero_to_hundred(), 0.9, CutSide::Both).unwrap();
        assert!((lo - 5.0).abs() < 1e-9);
        assert!((hi - 95.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_side() {
        let (lo, hi) = central_quantiles(&zero_to_hundred(), 0.9, CutSide::Lower).unwrap();
        assert!((lo - 10.0).abs() < 1e-9);
        assert_eq!(hi, 100.0);
        let (lo, hi) = central_quantiles(&zero_to_hundred(), 0.9, CutSide::Upper).unwrap();
        assert_eq!(lo, 0.0);
        assert!((hi - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolates_between_order_statistics() {
        let (lo, hi) = central_quantiles(&[4.0, 1.0, 2.0, 3.0], 0.5, CutSide::Both).unwrap();
        assert!((lo - 1.75).abs() < 1e-12);
        assert!((hi - 3.25).abs() < 1e-12);
    }

    #[test]
    fn test_union_over_series() {
        let a = vec![0.0, 10.0];
        let b = vec![5.0, 20.0];
        let (lo, hi) = central_quantiles_all(&[a, b], 1.0, CutSide::Both).unwrap();
        assert_eq!((lo, hi), (0.0, 20.0));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(central_quantiles(&[], 0.9, CutSide::Both).is_err());
        assert!(central_quantiles(&[1.0], 1.5, CutSide::Both).is_err());
        assert!(central_quantiles(&[f64::NAN], 0.9, CutSide::Both).is_err());
        assert!(central_quantiles_all(&[], 0.9, CutSide::Both).is_err());
    }
}
