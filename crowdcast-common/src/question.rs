//! Typed question model built from the platform's question JSON
//!
//! Fields the crate works with are parsed once at construction (timestamps,
//! scale, tails, histogram). The raw document is kept for [`Question::field`]
//! lookups of anything else the API returns; names absent from the document
//! are an `UnknownField` error.

use crate::clip::OpenTails;
use crate::community::{CommunityHistogram, CommunitySampler};
use crate::error::{Error, Result};
use crate::logistic::{MixtureFitter, MixtureParams};
use crate::scale::{DateRange, DateScale, LinearScale, LogScale, QuestionRange, Scale, TrueValue};
use crate::submission::{
    BinaryPrediction, LogisticEntry, PredictionRequest, SampleSet, Submission, SubmissionBuilder,
};
use crate::time::{from_unix_seconds, parse_api_date, parse_api_timestamp};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// `possibilities.type` of questions that take no predictions
pub const DISCUSSION_TYPE: &str = "discussion";

/// `possibilities.type` of a raw question document, if present
pub fn question_type(data: &Value) -> Option<&str> {
    data.get("possibilities")?.get("type")?.as_str()
}

#[derive(Debug, Clone, Deserialize)]
struct RawQuestion {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    page_url: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    resolution: Option<f64>,
    #[serde(default)]
    created_time: Option<String>,
    #[serde(default)]
    publish_time: Option<String>,
    #[serde(default)]
    close_time: Option<String>,
    #[serde(default)]
    resolve_time: Option<String>,
    #[serde(default)]
    last_activity_time: Option<String>,
    #[serde(default)]
    possibilities: Option<Possibilities>,
    #[serde(default)]
    prediction_histogram: Option<Vec<[f64; 3]>>,
    #[serde(default)]
    prediction_timeseries: Option<Vec<TimeseriesEntry>>,
    #[serde(default)]
    my_predictions: Option<OwnPredictions>,
}

#[derive(Debug, Clone, Deserialize)]
struct Possibilities {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    scale: Option<ScaleBounds>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    low: Option<Value>,
    #[serde(default)]
    high: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScaleBounds {
    min: Value,
    max: Value,
    #[serde(default = "unit_ratio")]
    deriv_ratio: f64,
}

fn unit_ratio() -> f64 {
    1.0
}

/// One point of the community prediction history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeseriesEntry {
    pub t: f64,
    #[serde(default)]
    pub community_prediction: Option<Value>,
    #[serde(default)]
    pub distribution: Option<Value>,
}

/// Rough community percentiles of a continuous question
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommunityPercentiles {
    pub low: f64,
    #[serde(default)]
    pub q1: Option<f64>,
    #[serde(default)]
    pub q2: Option<f64>,
    #[serde(default)]
    pub q3: Option<f64>,
    pub high: f64,
}

impl TimeseriesEntry {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        from_unix_seconds(self.t)
    }

    /// Percentiles when the entry belongs to a continuous question
    pub fn percentiles(&self) -> Option<CommunityPercentiles> {
        self.community_prediction
            .as_ref()
            .and_then(|v| CommunityPercentiles::deserialize(v).ok())
    }

    /// Average community probability when the entry belongs to a binary question
    pub fn average(&self) -> Option<f64> {
        self.distribution.as_ref()?.get("avg")?.as_f64()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OwnPredictions {
    #[serde(default)]
    predictions: Vec<OwnPrediction>,
}

/// One of the authenticated user's past predictions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnPrediction {
    /// Unix seconds
    pub t: f64,
    /// Binary probability
    #[serde(default)]
    pub x: Option<f64>,
    /// Continuous mixture components
    #[serde(default)]
    pub d: Option<Vec<LogisticEntry>>,
}

impl OwnPrediction {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        from_unix_seconds(self.t)
    }
}

/// Fields shared by every question kind
#[derive(Debug, Clone)]
pub struct QuestionInfo {
    pub id: u64,
    pub title: String,
    pub url: Option<String>,
    pub page_url: Option<String>,
    pub status: Option<String>,
    pub resolution: Option<f64>,
    pub created_time: Option<DateTime<Utc>>,
    pub publish_time: Option<DateTime<Utc>>,
    pub close_time: Option<DateTime<Utc>>,
    pub resolve_time: Option<DateTime<Utc>>,
    pub last_activity_time: Option<DateTime<Utc>>,
    /// Caller-assigned name used in models and summaries
    pub name: Option<String>,
    raw: Value,
}

fn parse_optional_time(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value.map(parse_api_timestamp).transpose()
}

impl QuestionInfo {
    fn from_raw(raw_question: &RawQuestion, raw: Value, name: Option<String>) -> Result<Self> {
        Ok(Self {
            id: raw_question.id,
            title: raw_question.title.clone(),
            url: raw_question.url.clone(),
            page_url: raw_question.page_url.clone(),
            status: raw_question.status.clone(),
            resolution: raw_question.resolution,
            created_time: parse_optional_time(raw_question.created_time.as_deref())?,
            publish_time: parse_optional_time(raw_question.publish_time.as_deref())?,
            close_time: parse_optional_time(raw_question.close_time.as_deref())?,
            resolve_time: parse_optional_time(raw_question.resolve_time.as_deref())?,
            last_activity_time: parse_optional_time(raw_question.last_activity_time.as_deref())?,
            name,
            raw,
        })
    }

    /// Raw value of any field of the question document
    pub fn field(&self, name: &str) -> Result<&Value> {
        self.raw.get(name).ok_or_else(|| {
            Error::UnknownField(format!("'{}' is not a field of question {}", name, self.id))
        })
    }

    /// The question document as received
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl fmt::Display for QuestionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// One-row summary for listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionSummary {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub title: String,
    pub resolve_time: Option<DateTime<Utc>>,
}

/// A question, typed by the kind of prediction it accepts
#[derive(Debug, Clone)]
pub enum Question {
    Binary(BinaryQuestion),
    Continuous(ContinuousQuestion),
}

impl Question {
    /// Build a typed question from the API's question document
    pub fn from_json(data: Value, name: Option<String>) -> Result<Self> {
        let raw_question = RawQuestion::deserialize(&data)?;
        let possibilities = raw_question.possibilities.clone().ok_or_else(|| {
            Error::UnsupportedQuestionType(format!(
                "question {} has no possibilities",
                raw_question.id
            ))
        })?;

        match possibilities.kind.as_str() {
            "binary" => Ok(Question::Binary(BinaryQuestion::from_raw(
                &raw_question,
                data,
                name,
            )?)),
            "continuous" => Ok(Question::Continuous(ContinuousQuestion::from_raw(
                &raw_question,
                &possibilities,
                data,
                name,
            )?)),
            other => Err(Error::UnsupportedQuestionType(format!(
                "question {} has type '{}'",
                raw_question.id, other
            ))),
        }
    }

    pub fn info(&self) -> &QuestionInfo {
        match self {
            Question::Binary(q) => &q.info,
            Question::Continuous(q) => &q.info,
        }
    }

    pub fn id(&self) -> u64 {
        self.info().id
    }

    pub fn field(&self, name: &str) -> Result<&Value> {
        self.info().field(name)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Question::Binary(_) => "binary",
            Question::Continuous(_) => "continuous",
        }
    }

    pub fn as_continuous(&self) -> Option<&ContinuousQuestion> {
        match self {
            Question::Continuous(q) => Some(q),
            Question::Binary(_) => None,
        }
    }

    pub fn as_binary(&self) -> Option<&BinaryQuestion> {
        match self {
            Question::Binary(q) => Some(q),
            Question::Continuous(_) => None,
        }
    }

    pub fn summary(&self) -> QuestionSummary {
        let info = self.info();
        QuestionSummary {
            id: info.id,
            name: info.name.clone(),
            title: info.title.clone(),
            resolve_time: info.resolve_time,
        }
    }

    /// Replace this question's data with a freshly fetched document
    ///
    /// The name survives; cached samplers are dropped with the old data.
    pub fn refresh(&mut self, data: Value) -> Result<()> {
        let name = self.info().name.clone();
        let refreshed = Question::from_json(data, name)?;
        if refreshed.id() != self.id() {
            return Err(Error::InvalidInput(format!(
                "refresh of question {} returned question {}",
                self.id(),
                refreshed.id()
            )));
        }
        *self = refreshed;
        Ok(())
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.info(), f)
    }
}

/// A prediction scored with the Brier score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPrediction {
    /// Unix seconds of the prediction
    pub time: f64,
    pub prediction: f64,
    pub resolution: f64,
    /// `(resolution - prediction)^2`; 0 is best, 0.25 is chance
    pub score: f64,
    pub question_name: String,
}

impl ScoredPrediction {
    /// When the prediction was made
    pub fn made_at(&self) -> Option<DateTime<Utc>> {
        from_unix_seconds(self.time)
    }
}

/// A yes/no question
#[derive(Debug, Clone)]
pub struct BinaryQuestion {
    info: QuestionInfo,
    timeseries: Vec<TimeseriesEntry>,
    own_predictions: Vec<OwnPrediction>,
}

impl BinaryQuestion {
    fn from_raw(raw_question: &RawQuestion, data: Value, name: Option<String>) -> Result<Self> {
        Ok(Self {
            info: QuestionInfo::from_raw(raw_question, data, name)?,
            timeseries: raw_question.prediction_timeseries.clone().unwrap_or_default(),
            own_predictions: raw_question
                .my_predictions
                .clone()
                .unwrap_or_default()
                .predictions,
        })
    }

    pub fn info(&self) -> &QuestionInfo {
        &self.info
    }

    pub fn own_predictions(&self) -> &[OwnPrediction] {
        &self.own_predictions
    }

    /// Latest community average probability
    pub fn community_average(&self) -> Option<f64> {
        self.timeseries.last().and_then(TimeseriesEntry::average)
    }

    /// Brier-score one prediction against a resolution in [0, 1]
    pub fn score_prediction(&self, prediction: &OwnPrediction, resolution: f64) -> Result<ScoredPrediction> {
        let p = prediction.x.ok_or_else(|| {
            Error::InvalidInput(format!(
                "prediction at {} on question {} has no probability",
                prediction.t, self.info.id
            ))
        })?;
        Ok(ScoredPrediction {
            time: prediction.t,
            prediction: p,
            resolution,
            score: (resolution - p).powi(2),
            question_name: self.info.to_string(),
        })
    }

    /// Score every own prediction against the resolution, or against the
    /// latest community average while the question is unresolved
    pub fn score_my_predictions(&self) -> Result<Vec<ScoredPrediction>> {
        let resolution = match self.info.resolution {
            Some(r) => r,
            None => self.community_average().ok_or_else(|| {
                Error::Precondition(format!(
                    "question {} is unresolved and has no community average",
                    self.info.id
                ))
            })?,
        };
        self.own_predictions
            .iter()
            .map(|p| self.score_prediction(p, resolution))
            .collect()
    }

    /// Request body predicting probability `p`
    pub fn prediction_request(&self, p: f64) -> Result<BinaryPrediction> {
        PredictionRequest::binary(p)
    }
}

/// A question answered with a distribution over a numeric or date range
#[derive(Debug, Clone)]
pub struct ContinuousQuestion {
    info: QuestionInfo,
    scale: Scale,
    tails: OpenTails,
    histogram: Option<CommunityHistogram>,
    latest_percentiles: Option<CommunityPercentiles>,
    own_predictions: Vec<OwnPrediction>,
    sampler: OnceCell<CommunitySampler>,
}

fn bound_as_f64(value: &Value, which: &str, id: u64) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        Error::Parse(format!("question {} scale {} is not a number: {}", id, which, value))
    })
}

fn bound_as_date(value: &Value, which: &str, id: u64) -> Result<chrono::NaiveDate> {
    let text = value.as_str().ok_or_else(|| {
        Error::Parse(format!("question {} date scale {} is not a string: {}", id, which, value))
    })?;
    parse_api_date(text)
}

/// Pick the transform once from the scale bounds and format
fn build_scale(possibilities: &Possibilities, id: u64) -> Result<Scale> {
    let bounds = possibilities
        .scale
        .as_ref()
        .ok_or_else(|| Error::Parse(format!("continuous question {} has no scale", id)))?;
    let is_date = possibilities.format.as_deref() == Some("date");

    if bounds.deriv_ratio != 1.0 {
        if is_date {
            return Err(Error::UnsupportedScale(format!(
                "question {} is a logarithmic date question",
                id
            )));
        }
        let range = QuestionRange::new(
            bound_as_f64(&bounds.min, "min", id)?,
            bound_as_f64(&bounds.max, "max", id)?,
        )?;
        return Ok(Scale::Logarithmic(LogScale::new(range, bounds.deriv_ratio)?));
    }

    if is_date {
        let range = DateRange::new(
            bound_as_date(&bounds.min, "min", id)?,
            bound_as_date(&bounds.max, "max", id)?,
        )?;
        return Ok(Scale::Date(DateScale::new(range)));
    }

    let range = QuestionRange::new(
        bound_as_f64(&bounds.min, "min", id)?,
        bound_as_f64(&bounds.max, "max", id)?,
    )?;
    Ok(Scale::Linear(LinearScale::new(range)))
}

impl ContinuousQuestion {
    fn from_raw(
        raw_question: &RawQuestion,
        possibilities: &Possibilities,
        data: Value,
        name: Option<String>,
    ) -> Result<Self> {
        let id = raw_question.id;
        let scale = build_scale(possibilities, id)?;
        let tails = OpenTails::from_markers(
            possibilities.low.as_ref().and_then(Value::as_str),
            possibilities.high.as_ref().and_then(Value::as_str),
        );

        let latest_percentiles = raw_question
            .prediction_timeseries
            .as_ref()
            .and_then(|ts| ts.last())
            .and_then(TimeseriesEntry::percentiles);

        let histogram = match &raw_question.prediction_histogram {
            Some(triples) => {
                let (low, high) = match latest_percentiles {
                    Some(p) => (p.low, p.high),
                    None => {
                        debug!(question_id = id, "No community percentiles; assuming no tail mass");
                        (0.0, 1.0)
                    }
                };
                Some(CommunityHistogram::from_api(triples, low, high)?)
            }
            None => None,
        };

        Ok(Self {
            info: QuestionInfo::from_raw(raw_question, data, name)?,
            scale,
            tails,
            histogram,
            latest_percentiles,
            own_predictions: raw_question
                .my_predictions
                .clone()
                .unwrap_or_default()
                .predictions,
            sampler: OnceCell::new(),
        })
    }

    /// Build directly from parts, without a question document
    pub fn from_parts(
        id: u64,
        title: impl Into<String>,
        scale: Scale,
        tails: OpenTails,
        histogram: Option<CommunityHistogram>,
    ) -> Self {
        Self {
            info: QuestionInfo {
                id,
                title: title.into(),
                url: None,
                page_url: None,
                status: None,
                resolution: None,
                created_time: None,
                publish_time: None,
                close_time: None,
                resolve_time: None,
                last_activity_time: None,
                name: None,
                raw: Value::Null,
            },
            scale,
            tails,
            histogram,
            latest_percentiles: None,
            own_predictions: Vec::new(),
            sampler: OnceCell::new(),
        }
    }

    pub fn info(&self) -> &QuestionInfo {
        &self.info
    }

    pub fn scale(&self) -> &Scale {
        &self.scale
    }

    pub fn tails(&self) -> OpenTails {
        self.tails
    }

    /// May probability mass fall below the range?
    pub fn low_open(&self) -> bool {
        self.tails.low_open
    }

    /// May probability mass fall above the range?
    pub fn high_open(&self) -> bool {
        self.tails.high_open
    }

    pub fn histogram(&self) -> Option<&CommunityHistogram> {
        self.histogram.as_ref()
    }

    pub fn latest_percentiles(&self) -> Option<CommunityPercentiles> {
        self.latest_percentiles
    }

    pub fn has_predictions(&self) -> bool {
        self.histogram
            .as_ref()
            .map_or(false, CommunityHistogram::has_predictions)
    }

    /// Replace the community histogram, dropping the cached sampler
    pub fn refresh_histogram(&mut self, histogram: Option<CommunityHistogram>) {
        self.histogram = histogram;
        self.sampler = OnceCell::new();
        debug!(question_id = self.info.id, "Reset community sampler");
    }

    /// Sampler over the current histogram, built on first use
    pub fn community_sampler(&self) -> Result<&CommunitySampler> {
        let histogram = self.histogram.as_ref().ok_or_else(|| {
            Error::Precondition(format!("question {} has no community histogram", self.info.id))
        })?;
        self.sampler
            .get_or_try_init(|| CommunitySampler::new(histogram))
    }

    /// One community sample on the normalized scale
    pub fn sample_normalized_community<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        Ok(self.community_sampler()?.sample_normalized(rng))
    }

    /// One community sample on the question's true scale
    pub fn sample_community<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<TrueValue> {
        let normalized = self.sample_normalized_community(rng)?;
        self.scale.denormalize_value(normalized)
    }

    /// `n` community samples on the question's true scale
    pub fn sample_community_n<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Result<Vec<TrueValue>> {
        let sampler = self.community_sampler()?;
        (0..n)
            .map(|_| self.scale.denormalize_value(sampler.sample_normalized(rng)))
            .collect()
    }

    /// Clip a fitted normalized mixture for this question
    pub fn submission_from_mixture<F: MixtureFitter>(
        &self,
        builder: &SubmissionBuilder<F>,
        mixture: &MixtureParams,
    ) -> Result<Submission> {
        builder.from_mixture(mixture, self.tails)
    }

    /// Normalize, fit and clip true-scale samples for this question
    pub fn submission_from_samples<F: MixtureFitter>(
        &self,
        builder: &SubmissionBuilder<F>,
        samples: &SampleSet,
    ) -> Result<Submission> {
        builder.from_samples(&self.scale, self.tails, samples)
    }

    /// The most recent own prediction, if any
    pub fn latest_submission(&self) -> Result<Option<Submission>> {
        match self.own_predictions.last().and_then(|p| p.d.as_ref()) {
            Some(entries) => Submission::from_api_entries(entries).map(Some),
            None => Ok(None),
        }
    }

    /// True-scale mixture of a submission; linear questions only
    pub fn true_scale_mixture(&self, submission: &Submission) -> Result<MixtureParams> {
        match &self.scale {
            Scale::Linear(s) => s.true_scale_mixture(submission),
            other => Err(Error::UnsupportedScale(format!(
                "true-scale mixtures need a linear question, question {} is {}",
                self.info.id,
                other.kind_name()
            ))),
        }
    }
}
