//! Building mixture-platform submissions from true-scale samples
//!
//! Pipeline: recognize the sample container, normalize through the question's
//! scale, fit a logistic mixture (external [`MixtureFitter`]), clip every
//! component with [`DistributionClipper`], then format plain-`f64` API fields.

use crate::clip::{DistributionClipper, OpenTails};
use crate::error::{ensure_finite, Error, Result};
use crate::logistic::{LogisticParams, MixtureFitter, MixtureParams};
use crate::scale::{Scale, ScaleTransform};
use crate::time::parse_api_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Default number of normalized samples handed to the fitter
pub const DEFAULT_SAMPLES_FOR_FIT: usize = 5000;

/// `kind` tag of one logistic component in the API payload
pub const LOGISTIC_KIND: &str = "logistic";
/// `kind` tag of a mixture prediction in the API payload
pub const MIXTURE_KIND: &str = "multi";

/// A logistic component clipped for submission
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubmissionLogisticParams {
    params: LogisticParams,
    low: f64,
    high: f64,
}

impl SubmissionLogisticParams {
    pub fn new(loc: f64, scale: f64, low: f64, high: f64) -> Result<Self> {
        let params = LogisticParams::new(loc, scale)?;
        ensure_finite(low, "low")?;
        ensure_finite(high, "high")?;
        Ok(Self::from_parts(params, low, high))
    }

    pub(crate) fn from_parts(params: LogisticParams, low: f64, high: f64) -> Self {
        Self { params, low, high }
    }

    pub fn loc(&self) -> f64 {
        self.params.loc()
    }

    pub fn scale(&self) -> f64 {
        self.params.scale()
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn logistic(&self) -> &LogisticParams {
        &self.params
    }
}

/// Clipped components paired with their original mixture weights
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    components: Vec<SubmissionLogisticParams>,
    weights: Vec<f64>,
}

impl Submission {
    pub fn new(components: Vec<SubmissionLogisticParams>, weights: Vec<f64>) -> Result<Self> {
        if components.len() != weights.len() {
            return Err(Error::InvalidInput(format!(
                "submission has {} components but {} weights",
                components.len(),
                weights.len()
            )));
        }
        Ok(Self {
            components,
            weights,
        })
    }

    pub fn components(&self) -> &[SubmissionLogisticParams] {
        &self.components
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Normalized mixture of the clipped components (for sampling a submission)
    pub fn mixture(&self) -> Result<MixtureParams> {
        MixtureParams::new(
            self.components.iter().map(|c| *c.logistic()).collect(),
            self.weights.clone(),
        )
    }

    /// API representation: `{"kind": "multi", "d": [...]}`
    pub fn to_prediction(&self) -> Result<MixturePrediction> {
        let d = self
            .components
            .iter()
            .zip(&self.weights)
            .map(|(c, &w)| format_logistic_for_api(c, w))
            .collect::<Result<Vec<_>>>()?;
        Ok(MixturePrediction {
            kind: MIXTURE_KIND.to_string(),
            d,
        })
    }

    /// Full request body for the predict endpoint
    pub fn to_request(&self) -> Result<PredictionRequest<MixturePrediction>> {
        Ok(PredictionRequest::new(self.to_prediction()?))
    }

    /// Rebuild a submission from components previously returned by the API
    pub fn from_api_entries(entries: &[LogisticEntry]) -> Result<Self> {
        let components = entries
            .iter()
            .map(|e| SubmissionLogisticParams::new(e.x0, e.s, e.low, e.high))
            .collect::<Result<Vec<_>>>()?;
        let weights = entries.iter().map(|e| e.w).collect();
        Self::new(components, weights)
    }
}

/// One logistic component as the API expects it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticEntry {
    #[serde(default = "logistic_kind")]
    pub kind: String,
    pub x0: f64,
    pub s: f64,
    pub w: f64,
    pub low: f64,
    pub high: f64,
}

fn logistic_kind() -> String {
    LOGISTIC_KIND.to_string()
}

/// Mixture prediction body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixturePrediction {
    pub kind: String,
    pub d: Vec<LogisticEntry>,
}

/// Envelope posted to the predict endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest<P> {
    pub prediction: P,
    pub void: bool,
}

impl<P> PredictionRequest<P> {
    pub fn new(prediction: P) -> Self {
        Self {
            prediction,
            void: false,
        }
    }
}

impl PredictionRequest<f64> {
    /// Binary-question request; `p` must be a probability
    pub fn binary(p: f64) -> Result<Self> {
        ensure_finite(p, "probability")?;
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::InvalidInput(format!("probability {} is outside [0, 1]", p)));
        }
        Ok(Self::new(p))
    }
}

/// Body of a binary-question prediction
pub type BinaryPrediction = PredictionRequest<f64>;

/// Format one component as plain floating-point API fields
///
/// Non-finite values would serialize as `null` and be rejected remotely, so
/// they are refused here.
pub fn format_logistic_for_api(
    params: &SubmissionLogisticParams,
    weight: f64,
) -> Result<LogisticEntry> {
    Ok(LogisticEntry {
        kind: LOGISTIC_KIND.to_string(),
        x0: ensure_finite(params.loc(), "x0")?,
        s: ensure_finite(params.scale(), "s")?,
        w: ensure_finite(weight, "w")?,
        low: ensure_finite(params.low(), "low")?,
        high: ensure_finite(params.high(), "high")?,
    })
}

/// Recognized containers of true-scale samples
#[derive(Debug, Clone, PartialEq)]
pub enum SampleSet {
    Values(Vec<f64>),
    Dates(Vec<NaiveDate>),
}

impl SampleSet {
    pub fn len(&self) -> usize {
        match self {
            SampleSet::Values(v) => v.len(),
            SampleSet::Dates(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            SampleSet::Values(_) => "numeric",
            SampleSet::Dates(_) => "date",
        }
    }

    /// Interpret a JSON document as a sample container
    ///
    /// Accepts an array of numbers or an array of `YYYY-MM-DD` strings.
    /// Anything else is a `TypeMismatch`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let items = value.as_array().ok_or_else(|| {
            Error::TypeMismatch(format!("expected an array of samples, got {}", json_kind(value)))
        })?;
        let first = items
            .first()
            .ok_or_else(|| Error::InvalidInput("sample array is empty".to_string()))?;

        match first {
            Value::Number(_) => items
                .iter()
                .map(|v| {
                    v.as_f64().ok_or_else(|| {
                        Error::TypeMismatch(format!(
                            "numeric sample array contains {}",
                            json_kind(v)
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(SampleSet::Values),
            Value::String(_) => items
                .iter()
                .map(|v| match v.as_str() {
                    Some(s) => parse_api_date(s)
                        .map_err(|_| Error::TypeMismatch(format!("'{}' is not a date sample", s))),
                    None => Err(Error::TypeMismatch(format!(
                        "date sample array contains {}",
                        json_kind(v)
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(SampleSet::Dates),
            other => Err(Error::TypeMismatch(format!(
                "samples must be numbers or dates, got {}",
                json_kind(other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Normalize a sample set through the scale that accepts its container kind
pub fn normalize_samples(scale: &Scale, samples: &SampleSet) -> Result<Vec<f64>> {
    if samples.is_empty() {
        return Err(Error::InvalidInput("no samples to normalize".to_string()));
    }
    match (scale, samples) {
        (Scale::Linear(s), SampleSet::Values(v)) => s.normalize_all(v),
        (Scale::Logarithmic(s), SampleSet::Values(v)) => s.normalize_all(v),
        (Scale::Date(s), SampleSet::Dates(d)) => s.normalize_all(d),
        (scale, samples) => Err(Error::TypeMismatch(format!(
            "{} question cannot take {} samples",
            scale.kind_name(),
            samples.kind_name()
        ))),
    }
}

/// Converts fitted mixtures or raw samples into platform submissions
#[derive(Debug, Clone)]
pub struct SubmissionBuilder<F> {
    fitter: F,
    clipper: DistributionClipper,
    samples_for_fit: usize,
}

impl<F: MixtureFitter> SubmissionBuilder<F> {
    pub fn new(fitter: F) -> Self {
        Self {
            fitter,
            clipper: DistributionClipper::default(),
            samples_for_fit: DEFAULT_SAMPLES_FOR_FIT,
        }
    }

    pub fn with_clipper(mut self, clipper: DistributionClipper) -> Self {
        self.clipper = clipper;
        self
    }

    /// More samples fit better but slower
    pub fn with_samples_for_fit(mut self, samples_for_fit: usize) -> Self {
        self.samples_for_fit = samples_for_fit;
        self
    }

    /// Clip every component of a normalized mixture, keeping its weights
    pub fn from_mixture(&self, mixture: &MixtureParams, tails: OpenTails) -> Result<Submission> {
        let components = mixture
            .components()
            .iter()
            .map(|c| self.clipper.clip(c, tails))
            .collect();
        Submission::new(components, mixture.weights().to_vec())
    }

    /// Normalize, fit and clip a true-scale sample set
    pub fn from_samples(
        &self,
        scale: &Scale,
        tails: OpenTails,
        samples: &SampleSet,
    ) -> Result<Submission> {
        let normalized = normalize_samples(scale, samples)?;
        let mixture = self.fitter.fit(&normalized, self.samples_for_fit)?;
        debug!(
            samples = samples.len(),
            components = mixture.components().len(),
            scale = scale.kind_name(),
            "Fitted logistic mixture for submission"
        );
        self.from_mixture(&mixture, tails)
    }
}
