//! # crowdcast common library
//!
//! Translation between forecast representations:
//! - Scale transforms between a question's true scale and the normalized scale
//! - Community prediction sampling from platform histograms
//! - Logistic-mixture submissions, clipped to the platform's limits
//! - Piecewise-linear CDF construction and sampling
//! - Typed question model, configuration loading, errors

pub mod cdf;
pub mod clip;
pub mod community;
pub mod config;
pub mod error;
pub mod logistic;
pub mod question;
pub mod scale;
pub mod stats;
pub mod submission;
pub mod time;

pub use cdf::Cdf;
pub use clip::{ClipLimits, DistributionClipper, OpenTails};
pub use community::{CommunityHistogram, CommunitySampler};
pub use error::{Error, Result};
pub use logistic::{LogisticParams, MixtureFitter, MixtureParams, MomentFitter};
pub use question::{BinaryQuestion, ContinuousQuestion, Question};
pub use scale::{Scale, ScaleTransform, TrueValue};
pub use submission::{SampleSet, Submission, SubmissionBuilder, SubmissionLogisticParams};
