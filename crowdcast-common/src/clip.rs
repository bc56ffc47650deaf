//! Clipping of fitted logistic parameters for submission
//!
//! The mixture platform rejects predictions whose logistic components fall
//! outside numeric tolerances it does not document. The limits below were
//! found from observed API rejections, not from a published contract, and
//! may need to move if the platform's validation changes. They are kept
//! overridable through [`ClipLimits`] for that reason.
//!
//! `low`/`high` are not a truncation of the forecaster's belief. They only
//! satisfy the platform's acceptance rules for the support of each
//! submitted logistic.

use crate::error::{ensure_finite, Error, Result};
use crate::logistic::LogisticParams;
use crate::submission::SubmissionLogisticParams;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Observed API ceiling on a component's location
pub const MAX_LOC: f64 = 3.0;
/// Smallest accepted component scale
pub const MIN_SCALE: f64 = 0.01;
/// Observed API ceiling on a component's scale
pub const MAX_SCALE: f64 = 10.0;
/// Floor on `low` when the low tail is open
pub const MIN_OPEN_LOW: f64 = 0.01;
/// Ceiling on `high` when the high tail is open
pub const MAX_OPEN_HIGH: f64 = 0.99;
/// Required distance between `high` and `low`
pub const MIN_LOW_HIGH_GAP: f64 = 0.01;

/// Whether probability mass may fall below/above the question range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpenTails {
    pub low_open: bool,
    pub high_open: bool,
}

impl OpenTails {
    pub fn new(low_open: bool, high_open: bool) -> Self {
        Self {
            low_open,
            high_open,
        }
    }

    /// Parse from the platform's `possibilities.low/high` markers (`"tail"` means open)
    pub fn from_markers(low: Option<&str>, high: Option<&str>) -> Self {
        Self::new(low == Some("tail"), high == Some("tail"))
    }
}

/// Numeric tolerances applied to every submitted component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipLimits {
    pub max_loc: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub min_open_low: f64,
    pub max_open_high: f64,
    pub min_gap: f64,
}

impl Default for ClipLimits {
    fn default() -> Self {
        Self {
            max_loc: MAX_LOC,
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
            min_open_low: MIN_OPEN_LOW,
            max_open_high: MAX_OPEN_HIGH,
            min_gap: MIN_LOW_HIGH_GAP,
        }
    }
}

impl ClipLimits {
    /// Check internal consistency of overridden limits
    pub fn validate(&self) -> Result<()> {
        for (value, name) in [
            (self.max_loc, "max_loc"),
            (self.min_scale, "min_scale"),
            (self.max_scale, "max_scale"),
            (self.min_open_low, "min_open_low"),
            (self.max_open_high, "max_open_high"),
            (self.min_gap, "min_gap"),
        ] {
            ensure_finite(value, name)?;
        }
        if self.min_scale <= 0.0 || self.max_scale < self.min_scale {
            return Err(Error::Config(format!(
                "scale limits must satisfy 0 < min_scale <= max_scale, got [{}, {}]",
                self.min_scale, self.max_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.min_open_low) || !(0.0..=1.0).contains(&self.max_open_high) {
            return Err(Error::Config(
                "min_open_low and max_open_high must lie in [0, 1]".to_string(),
            ));
        }
        if self.min_gap < 0.0 {
            return Err(Error::Config("min_gap must not be negative".to_string()));
        }
        Ok(())
    }
}

/// Clamps fitted components into what the platform accepts
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributionClipper {
    limits: ClipLimits,
}

impl DistributionClipper {
    pub fn new(limits: ClipLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ClipLimits {
        &self.limits
    }

    /// Clip one normalized component for a question with the given tails
    ///
    /// `loc` has a ceiling but no floor. `low`/`high` are evaluated on the
    /// CDF of the clipped component.
    pub fn clip(&self, params: &LogisticParams, tails: OpenTails) -> SubmissionLogisticParams {
        let limits = &self.limits;
        let loc = params.loc().min(limits.max_loc);
        let scale = params.scale().clamp(limits.min_scale, limits.max_scale);
        let clipped = LogisticParams::new(loc, scale).unwrap_or(*params);

        let low = if tails.low_open {
            clipped.cdf(0.0).max(limits.min_open_low)
        } else {
            0.0
        };

        let high = if tails.high_open {
            clipped
                .cdf(1.0)
                .min(limits.max_open_high)
                .max(low + limits.min_gap)
        } else {
            1.0
        };

        if loc != params.loc() || scale != params.scale() {
            debug!(
                loc = params.loc(),
                scale = params.scale(),
                clipped_loc = loc,
                clipped_scale = scale,
                "Clipped logistic component to API limits"
            );
        }

        SubmissionLogisticParams::from_parts(clipped, low, high)
    }
}
