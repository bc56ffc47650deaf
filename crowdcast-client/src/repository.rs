//! Source of question documents
//!
//! The core never talks to the network. Anything that can hand over question
//! JSON and listing pages implements [`QuestionRepository`]; the HTTP client
//! is one implementation, tests use in-memory fakes.

use crate::error::{ClientError, Result};
use crate::pagination::{PageResponse, QuestionQuery};
use async_trait::async_trait;
use crowdcast_common::Question;
use serde_json::Value;
use tracing::debug;

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Raw document of one question
    async fn question_json(&self, id: u64) -> Result<Value>;

    /// One page of a question listing (1-indexed)
    async fn questions_page(&self, query: &QuestionQuery, page: u32) -> Result<PageResponse>;
}

/// Fetch and type a question
pub async fn get_question<R>(repo: &R, id: u64, name: Option<String>) -> Result<Question>
where
    R: QuestionRepository + ?Sized,
{
    let data = repo.question_json(id).await?;
    if data.get("possibilities").map_or(true, Value::is_null) {
        return Err(ClientError::NotFound(format!(
            "no question with id {} (check the API domain)",
            id
        )));
    }
    let question = Question::from_json(data, name)?;
    debug!(question_id = id, kind = question.kind_name(), "Loaded question");
    Ok(question)
}

/// Refetch a question whose data may have changed
pub async fn refresh_question<R>(repo: &R, question: &mut Question) -> Result<()>
where
    R: QuestionRepository + ?Sized,
{
    let data = repo.question_json(question.id()).await?;
    question.refresh(data)?;
    Ok(())
}
