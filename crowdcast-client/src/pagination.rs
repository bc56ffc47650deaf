//! Question listings across pages
//!
//! The listing endpoint returns 20 questions per page. Pages are fetched in
//! order until `max_pages` is reached or the API answers with its
//! `{"detail": "Invalid page."}` sentinel.

use crate::error::{ClientError, Result};
use crate::repository::QuestionRepository;
use clap::ValueEnum;
use crowdcast_common::question::{question_type, DISCUSSION_TYPE};
use crowdcast_common::Question;
use serde_json::Value;
use tracing::{debug, info};

/// Body the listing endpoint returns past the last page
pub const INVALID_PAGE_DETAIL: &str = "Invalid page.";

/// Question lifecycle filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum QuestionStatus {
    #[default]
    All,
    Upcoming,
    Open,
    Closed,
    Resolved,
    Discussion,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::All => "all",
            QuestionStatus::Upcoming => "upcoming",
            QuestionStatus::Open => "open",
            QuestionStatus::Closed => "closed",
            QuestionStatus::Resolved => "resolved",
            QuestionStatus::Discussion => "discussion",
        }
    }
}

/// The user's relation to listed questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PlayerStatus {
    #[default]
    Any,
    Predicted,
    NotPredicted,
    Author,
    Interested,
    Private,
}

impl PlayerStatus {
    /// API parameter taking the user id, for filters that need one
    fn user_parameter(&self) -> Option<&'static str> {
        match self {
            PlayerStatus::Predicted => Some("guessed_by"),
            PlayerStatus::NotPredicted => Some("not_guessed_by"),
            PlayerStatus::Author => Some("author"),
            PlayerStatus::Interested => Some("upvoted_by"),
            PlayerStatus::Any | PlayerStatus::Private => None,
        }
    }
}

/// Filters of a question listing
#[derive(Debug, Clone, Default)]
pub struct QuestionQuery {
    pub status: QuestionStatus,
    pub player: PlayerStatus,
    /// Category slug
    pub category: Option<String>,
    pub user_id: Option<u64>,
}

impl QuestionQuery {
    /// Query string without the page parameter
    pub fn query_string(&self) -> Result<String> {
        let mut params = vec![
            format!("status={}", self.status.as_str()),
            "order_by=-publish_time".to_string(),
        ];

        if self.player == PlayerStatus::Private {
            params.push("access=private".to_string());
        } else if let Some(parameter) = self.player.user_parameter() {
            let user_id = self.user_id.ok_or_else(|| {
                ClientError::MissingUserId(format!(
                    "player filter '{}' needs api.user_id",
                    parameter
                ))
            })?;
            params.push(format!("{}={}", parameter, user_id));
        }

        if let Some(category) = &self.category {
            params.push(format!("search=cat:{}", category));
        }

        Ok(params.join("&"))
    }
}

/// One listing page, or the past-the-end sentinel
#[derive(Debug, Clone, PartialEq)]
pub enum PageResponse {
    Page(Vec<Value>),
    InvalidPage,
}

impl PageResponse {
    pub fn from_json(body: &Value) -> Result<Self> {
        if body.get("detail").and_then(Value::as_str) == Some(INVALID_PAGE_DETAIL) {
            return Ok(PageResponse::InvalidPage);
        }
        body.get("results")
            .and_then(Value::as_array)
            .map(|results| PageResponse::Page(results.clone()))
            .ok_or_else(|| ClientError::ParseError("listing page has no results array".to_string()))
    }
}

/// Raw question documents from up to `max_pages` pages
pub async fn fetch_question_pages<R>(
    repo: &R,
    query: &QuestionQuery,
    max_pages: u32,
    include_discussion: bool,
) -> Result<Vec<Value>>
where
    R: QuestionRepository + ?Sized,
{
    let mut questions = Vec::new();
    for page in 1..=max_pages {
        match repo.questions_page(query, page).await? {
            PageResponse::Page(results) => {
                debug!(page, count = results.len(), "Fetched listing page");
                questions.extend(results);
            }
            PageResponse::InvalidPage => {
                debug!(page, "Listing ended before max_pages");
                break;
            }
        }
    }

    if !include_discussion {
        questions.retain(|q| question_type(q) != Some(DISCUSSION_TYPE));
    }

    info!(count = questions.len(), "Listed questions");
    Ok(questions)
}

/// Typed questions from up to `max_pages` pages, discussion questions excluded
pub async fn fetch_questions<R>(repo: &R, query: &QuestionQuery, max_pages: u32) -> Result<Vec<Question>>
where
    R: QuestionRepository + ?Sized,
{
    fetch_question_pages(repo, query, max_pages, false)
        .await?
        .into_iter()
        .map(|data| Question::from_json(data, None).map_err(ClientError::from))
        .collect()
}
