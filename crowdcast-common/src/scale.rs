//! Scale transforms between a question's true scale and the normalized scale
//!
//! Forecasting platforms accept and report distributions on a normalized
//! [0, 1] scale regardless of the question's native units. Three transforms
//! are supported:
//! - Linear: affine map of `[min, max]` onto `[0, 1]`
//! - Logarithmic: log map parameterized by the platform's `deriv_ratio`
//! - Date: whole days since `date_min` divided by the day span
//!
//! Values outside the question range map outside `[0, 1]`. That is expected:
//! open-tailed questions carry probability mass beyond the range.

use crate::error::{ensure_finite, Error, Result};
use crate::logistic::{LogisticParams, MixtureParams};
use crate::submission::{Submission, SubmissionLogisticParams};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Lower bound on the logarithm argument of the log transform.
///
/// Values far enough below `min` would otherwise produce a non-positive
/// argument; flooring maps them to a large negative normalized value instead
/// of NaN. The value matches what the reference platform tolerates.
pub const LOG_ARGUMENT_FLOOR: f64 = 1e-9;

/// Largest day offset accepted when denormalizing dates (beyond chrono's range)
const MAX_DAY_OFFSET: f64 = 1.0e8;

/// Axis hint for plotting true-scale samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotAxis {
    /// Plain numeric axis
    Continuous,
    /// Base-10 logarithmic axis
    Log10,
    /// Calendar axis
    Date,
}

/// Mapping between true-scale values and the normalized scale
///
/// `denormalize(normalize(x)) == x` for every `x` strictly inside the range,
/// within floating-point tolerance (exact to the day for dates).
pub trait ScaleTransform {
    /// True-scale value type (`f64` or `NaiveDate`)
    type Value;

    /// Map a true-scale value onto the normalized scale
    fn normalize(&self, value: &Self::Value) -> Result<f64>;

    /// Map a normalized value back onto the true scale
    fn denormalize(&self, normalized: f64) -> Result<Self::Value>;

    /// Elementwise `normalize`
    fn normalize_all(&self, values: &[Self::Value]) -> Result<Vec<f64>> {
        values.iter().map(|v| self.normalize(v)).collect()
    }

    /// Elementwise `denormalize`
    fn denormalize_all(&self, normalized: &[f64]) -> Result<Vec<Self::Value>> {
        normalized.iter().map(|&y| self.denormalize(y)).collect()
    }

    /// Axis on which true-scale samples should be plotted
    fn axis(&self) -> PlotAxis;
}

/// Numeric question range, `max > min`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuestionRange {
    min: f64,
    max: f64,
}

impl QuestionRange {
    /// Create a range, rejecting zero or negative width
    pub fn new(min: f64, max: f64) -> Result<Self> {
        ensure_finite(min, "range min")?;
        ensure_finite(max, "range max")?;
        if max <= min {
            return Err(Error::InvalidInput(format!(
                "range max ({}) must exceed min ({})",
                max, min
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// `max - min`, always positive
    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// Date question range expressed in whole days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    date_min: NaiveDate,
    date_max: NaiveDate,
    day_span: i64,
}

impl DateRange {
    /// Create a date range, rejecting a zero or negative day span
    pub fn new(date_min: NaiveDate, date_max: NaiveDate) -> Result<Self> {
        let day_span = (date_max - date_min).num_days();
        if day_span <= 0 {
            return Err(Error::InvalidInput(format!(
                "date range {} .. {} must span at least one day",
                date_min, date_max
            )));
        }
        Ok(Self {
            date_min,
            date_max,
            day_span,
        })
    }

    pub fn date_min(&self) -> NaiveDate {
        self.date_min
    }

    pub fn date_max(&self) -> NaiveDate {
        self.date_max
    }

    pub fn day_span(&self) -> i64 {
        self.day_span
    }
}

/// Affine transform for linear questions
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearScale {
    range: QuestionRange,
}

impl LinearScale {
    pub fn new(range: QuestionRange) -> Self {
        Self { range }
    }

    pub fn range(&self) -> &QuestionRange {
        &self.range
    }

    /// Logistic parameters on the true scale from normalized submission params
    ///
    /// `low`/`high` are API acceptance bounds and have no true-scale meaning,
    /// so they are dropped.
    pub fn true_scale_logistic(
        &self,
        params: &SubmissionLogisticParams,
    ) -> Result<LogisticParams> {
        let width = self.range.width();
        LogisticParams::new(
            params.loc() * width + self.range.min(),
            params.scale() * width,
        )
    }

    /// Mixture on the true scale from a normalized submission
    pub fn true_scale_mixture(&self, submission: &Submission) -> Result<MixtureParams> {
        let components = submission
            .components()
            .iter()
            .map(|c| self.true_scale_logistic(c))
            .collect::<Result<Vec<_>>>()?;
        MixtureParams::new(components, submission.weights().to_vec())
    }
}

impl ScaleTransform for LinearScale {
    type Value = f64;

    fn normalize(&self, value: &f64) -> Result<f64> {
        let x = ensure_finite(*value, "sample")?;
        Ok((x - self.range.min()) / self.range.width())
    }

    fn denormalize(&self, normalized: f64) -> Result<f64> {
        let y = ensure_finite(normalized, "normalized sample")?;
        Ok(self.range.min() + self.range.width() * y)
    }

    fn axis(&self) -> PlotAxis {
        PlotAxis::Continuous
    }
}

/// Logarithmic transform parameterized by `deriv_ratio`
///
/// `deriv_ratio` is the ratio between the density derivative at the top and
/// bottom of the range, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogScale {
    range: QuestionRange,
    deriv_ratio: f64,
}

impl LogScale {
    /// Create a log transform; `deriv_ratio` must be positive and not 1
    pub fn new(range: QuestionRange, deriv_ratio: f64) -> Result<Self> {
        ensure_finite(deriv_ratio, "deriv_ratio")?;
        if deriv_ratio <= 0.0 || deriv_ratio == 1.0 {
            return Err(Error::InvalidInput(format!(
                "deriv_ratio must be positive and not 1, got {}",
                deriv_ratio
            )));
        }
        Ok(Self { range, deriv_ratio })
    }

    pub fn range(&self) -> &QuestionRange {
        &self.range
    }

    pub fn deriv_ratio(&self) -> f64 {
        self.deriv_ratio
    }
}

impl ScaleTransform for LogScale {
    type Value = f64;

    fn normalize(&self, value: &f64) -> Result<f64> {
        let x = ensure_finite(*value, "sample")?;
        let shifted = x - self.range.min();
        let scaled = shifted * (self.deriv_ratio - 1.0) / self.range.width();
        let argument = (1.0 + scaled).max(LOG_ARGUMENT_FLOOR);
        Ok(argument.log(self.deriv_ratio))
    }

    fn denormalize(&self, normalized: f64) -> Result<f64> {
        let y = ensure_finite(normalized, "normalized sample")?;
        let deriv_term = (self.deriv_ratio.powf(y) - 1.0) / (self.deriv_ratio - 1.0);
        ensure_finite(self.range.min() + self.range.width() * deriv_term, "denormalized sample")
    }

    fn axis(&self) -> PlotAxis {
        PlotAxis::Log10
    }
}

/// Day-count transform for date questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateScale {
    range: DateRange,
}

impl DateScale {
    pub fn new(range: DateRange) -> Self {
        Self { range }
    }

    pub fn range(&self) -> &DateRange {
        &self.range
    }
}

impl ScaleTransform for DateScale {
    type Value = NaiveDate;

    fn normalize(&self, value: &NaiveDate) -> Result<f64> {
        let days = (*value - self.range.date_min()).num_days();
        Ok(days as f64 / self.range.day_span() as f64)
    }

    fn denormalize(&self, normalized: f64) -> Result<NaiveDate> {
        let y = ensure_finite(normalized, "normalized sample")?;
        // Half-day ties go to the even day
        let offset = (self.range.day_span() as f64 * y).round_ties_even();
        if offset.abs() > MAX_DAY_OFFSET {
            return Err(Error::InvalidInput(format!(
                "normalized value {} is too far outside the date range",
                y
            )));
        }
        self.range
            .date_min()
            .checked_add_signed(Duration::days(offset as i64))
            .ok_or_else(|| {
                Error::InvalidInput(format!("normalized value {} has no calendar date", y))
            })
    }

    fn axis(&self) -> PlotAxis {
        PlotAxis::Date
    }
}

/// True-scale value produced by a [`Scale`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrueValue {
    Number(f64),
    Date(NaiveDate),
}

impl TrueValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TrueValue::Number(x) => Some(*x),
            TrueValue::Date(_) => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            TrueValue::Date(d) => Some(*d),
            TrueValue::Number(_) => None,
        }
    }
}

/// Transform chosen once when a continuous question is constructed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Scale {
    Linear(LinearScale),
    Logarithmic(LogScale),
    Date(DateScale),
}

impl Scale {
    /// Denormalize into whichever value type this scale produces
    pub fn denormalize_value(&self, normalized: f64) -> Result<TrueValue> {
        match self {
            Scale::Linear(s) => s.denormalize(normalized).map(TrueValue::Number),
            Scale::Logarithmic(s) => s.denormalize(normalized).map(TrueValue::Number),
            Scale::Date(s) => s.denormalize(normalized).map(TrueValue::Date),
        }
    }

    pub fn axis(&self) -> PlotAxis {
        match self {
            Scale::Linear(s) => s.axis(),
            Scale::Logarithmic(s) => s.axis(),
            Scale::Date(s) => s.axis(),
        }
    }

    /// Short name used in logs and error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Scale::Linear(_) => "linear",
            Scale::Logarithmic(_) => "logarithmic",
            Scale::Date(_) => "date",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn linear(min: f64, max: f64) -> LinearScale {
        LinearScale::new(QuestionRange::new(min, max).unwrap())
    }

    fn log(min: f64, max: f64, ratio: f64) -> LogScale {
        LogScale::new(QuestionRange::new(min, max).unwrap(), ratio).unwrap()
    }

    #[test]
    fn test_linear_endpoints_and_midpoint() {
        let scale = linear(10.0, 30.0);
        assert_eq!(scale.normalize(&10.0).unwrap(), 0.0);
        assert_eq!(scale.normalize(&30.0).unwrap(), 1.0);
        assert_eq!(scale.normalize(&20.0).unwrap(), 0.5);
        assert_eq!(scale.denormalize(0.25).unwrap(), 15.0);
    }

    #[test]
    fn test_linear_out_of_range_leaves_unit_interval() {
        let scale = linear(0.0, 10.0);
        assert!(scale.normalize(&-5.0).unwrap() < 0.0);
        assert!(scale.normalize(&15.0).unwrap() > 1.0);
    }

    #[test]
    fn test_linear_round_trip() {
        let scale = linear(-3.5, 120.0);
        for i in 1..100 {
            let x = -3.5 + 123.5 * (i as f64) / 100.0;
            let back = scale.denormalize(scale.normalize(&x).unwrap()).unwrap();
            assert!((back - x).abs() < 1e-6, "round trip failed for {}", x);
        }
    }

    #[test]
    fn test_log_endpoints() {
        let scale = log(0.0, 100.0, 10.0);
        assert_eq!(scale.normalize(&0.0).unwrap(), 0.0);
        assert_eq!(scale.normalize(&100.0).unwrap(), 1.0);
    }

    #[test]
    fn test_log_round_trip_both_ratio_directions() {
        for ratio in [10.0, 1000.0, 0.2] {
            let scale = log(1.0, 500.0, ratio);
            for i in 1..50 {
                let x = 1.0 + 499.0 * (i as f64) / 50.0;
                let back = scale.denormalize(scale.normalize(&x).unwrap()).unwrap();
                assert!(
                    (back - x).abs() < 1e-6,
                    "ratio {}: round trip {} -> {}",
                    ratio,
                    x,
                    back
                );
            }
        }
    }

    #[test]
    fn test_log_floor_keeps_far_low_values_finite() {
        let scale = log(0.0, 100.0, 10.0);
        // 1 + (-50 * 9 / 100) = -3.5, floored to 1e-9
        let y = scale.normalize(&-50.0).unwrap();
        assert!(y.is_finite());
        assert!((y - LOG_ARGUMENT_FLOOR.log10()).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_is_monotonic() {
        let lin = linear(0.0, 10.0);
        let lg = log(0.0, 10.0, 50.0);
        let lg_inv = log(0.0, 10.0, 0.1);
        let xs: Vec<f64> = (0..=40).map(|i| -1.0 + 0.3 * i as f64).collect();
        for w in xs.windows(2) {
            assert!(lin.normalize(&w[0]).unwrap() < lin.normalize(&w[1]).unwrap());
            assert!(lg.normalize(&w[0]).unwrap() <= lg.normalize(&w[1]).unwrap());
            assert!(lg_inv.normalize(&w[0]).unwrap() <= lg_inv.normalize(&w[1]).unwrap());
        }

        let dates = DateScale::new(DateRange::new(date(2020, 1, 1), date(2020, 3, 1)).unwrap());
        let mut prev = f64::NEG_INFINITY;
        for offset in 0..90 {
            let d = date(2019, 12, 15) + Duration::days(offset);
            let y = dates.normalize(&d).unwrap();
            assert!(y > prev);
            prev = y;
        }
    }

    #[test]
    fn test_date_midpoint() {
        let scale = DateScale::new(DateRange::new(date(2020, 1, 1), date(2020, 1, 11)).unwrap());
        assert_eq!(scale.range().day_span(), 10);
        assert_eq!(scale.normalize(&date(2020, 1, 6)).unwrap(), 0.5);
        assert_eq!(scale.denormalize(0.5).unwrap(), date(2020, 1, 6));
    }

    #[test]
    fn test_date_half_day_ties_round_to_even() {
        let scale = DateScale::new(DateRange::new(date(2020, 1, 1), date(2020, 1, 11)).unwrap());
        assert_eq!(scale.denormalize(0.25).unwrap(), date(2020, 1, 3));
        assert_eq!(scale.denormalize(0.75).unwrap(), date(2020, 1, 9));
        assert_eq!(scale.denormalize(-0.25).unwrap(), date(2019, 12, 30));
    }

    #[test]
    fn test_date_round_trip_exact() {
        let scale = DateScale::new(DateRange::new(date(2021, 6, 1), date(2024, 2, 29)).unwrap());
        let mut d = date(2021, 6, 2);
        while d < date(2024, 2, 29) {
            let back = scale.denormalize(scale.normalize(&d).unwrap()).unwrap();
            assert_eq!(back, d);
            d = d + Duration::days(7);
        }
    }

    #[test]
    fn test_date_elementwise() {
        let scale = DateScale::new(DateRange::new(date(2020, 1, 1), date(2020, 1, 11)).unwrap());
        let ys = scale
            .normalize_all(&[date(2020, 1, 1), date(2020, 1, 11), date(2019, 12, 31)])
            .unwrap();
        assert_eq!(ys, vec![0.0, 1.0, -0.1]);
        let ds = scale.denormalize_all(&[0.0, 0.2, 1.0]).unwrap();
        assert_eq!(ds, vec![date(2020, 1, 1), date(2020, 1, 3), date(2020, 1, 11)]);
    }

    #[test]
    fn test_degenerate_ranges_rejected() {
        assert!(matches!(QuestionRange::new(5.0, 5.0), Err(Error::InvalidInput(_))));
        assert!(matches!(QuestionRange::new(5.0, 1.0), Err(Error::InvalidInput(_))));
        assert!(QuestionRange::new(f64::NAN, 1.0).is_err());
        assert!(DateRange::new(date(2020, 1, 1), date(2020, 1, 1)).is_err());
        let range = QuestionRange::new(0.0, 1.0).unwrap();
        assert!(LogScale::new(range, 1.0).is_err());
        assert!(LogScale::new(range, 0.0).is_err());
        assert!(LogScale::new(range, -2.0).is_err());
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let scale = linear(0.0, 1.0);
        assert!(scale.normalize(&f64::NAN).is_err());
        assert!(scale.denormalize(f64::INFINITY).is_err());
        let dates = DateScale::new(DateRange::new(date(2020, 1, 1), date(2020, 1, 11)).unwrap());
        assert!(dates.denormalize(f64::NAN).is_err());
        assert!(dates.denormalize(1.0e12).is_err());
    }

    #[test]
    fn test_scale_enum_dispatch() {
        let scale = Scale::Date(DateScale::new(
            DateRange::new(date(2020, 1, 1), date(2020, 1, 11)).unwrap(),
        ));
        assert_eq!(scale.axis(), PlotAxis::Date);
        assert_eq!(scale.kind_name(), "date");
        let value = scale.denormalize_value(0.5).unwrap();
        assert_eq!(value.as_date(), Some(date(2020, 1, 6)));
        assert_eq!(value.as_number(), None);

        let scale = Scale::Logarithmic(log(0.0, 100.0, 10.0));
        assert_eq!(scale.axis(), PlotAxis::Log10);
        let value = scale.denormalize_value(1.0).unwrap();
        assert!((value.as_number().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_true_scale_logistic() {
        let scale = linear(10.0, 30.0);
        let params = SubmissionLogisticParams::new(0.5, 0.1, 0.0, 1.0).unwrap();
        let true_params = scale.true_scale_logistic(&params).unwrap();
        assert!((true_params.loc() - 20.0).abs() < 1e-12);
        assert!((true_params.scale() - 2.0).abs() < 1e-12);
    }
}
