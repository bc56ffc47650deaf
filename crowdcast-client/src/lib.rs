//! # crowdcast client
//!
//! Network boundary of crowdcast: question fetch and listings from the
//! question platform, aggregate CDFs from the CDF platform.

pub mod cdf_client;
pub mod error;
pub mod pagination;
pub mod questions_client;
pub mod repository;

pub use cdf_client::{CdfClient, CdfQuestion};
pub use error::{ClientError, Result};
pub use pagination::{PlayerStatus, QuestionQuery, QuestionStatus};
pub use questions_client::QuestionsClient;
pub use repository::QuestionRepository;
