//! HTTP client for the question platform
//!
//! Anonymous read access only: question documents and listings. Submission
//! needs an authenticated session and is left to the caller; the client only
//! names the endpoint a request body belongs to.

use crate::error::{ClientError, Result};
use crate::pagination::{PageResponse, QuestionQuery};
use crate::repository::QuestionRepository;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = concat!("crowdcast/", env!("CARGO_PKG_VERSION"));

/// Question platform API client
pub struct QuestionsClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl QuestionsClient {
    /// `base_url` is the API root, e.g. `https://www.metaculus.com/api2`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn question_url(&self, id: u64) -> String {
        format!("{}/questions/{}/", self.base_url, id)
    }

    /// Endpoint a prediction request body is posted to
    pub fn predict_url(&self, id: u64) -> String {
        format!("{}/questions/{}/predict/", self.base_url, id)
    }

    pub fn page_url(&self, query: &QuestionQuery, page: u32) -> Result<String> {
        Ok(format!(
            "{}/questions/?{}&page={}",
            self.base_url,
            query.query_string()?,
            page
        ))
    }

    async fn get_json(&self, url: &str) -> Result<(reqwest::StatusCode, Value)> {
        tracing::debug!(url = %url, "Querying question API");

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                ClientError::ParseError(e.to_string())
            } else {
                ClientError::ApiError(status.as_u16(), text.clone())
            }
        })?;
        Ok((status, body))
    }
}

#[async_trait]
impl QuestionRepository for QuestionsClient {
    async fn question_json(&self, id: u64) -> Result<Value> {
        let (status, body) = self.get_json(&self.question_url(id)).await?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(format!("question {}", id)));
        }
        if !status.is_success() {
            return Err(ClientError::ApiError(status.as_u16(), body.to_string()));
        }

        tracing::info!(question_id = id, "Retrieved question");
        Ok(body)
    }

    async fn questions_page(&self, query: &QuestionQuery, page: u32) -> Result<PageResponse> {
        let (status, body) = self.get_json(&self.page_url(query, page)?).await?;

        // Past the last page the API answers 404 with the sentinel body
        let parsed = PageResponse::from_json(&body);
        match parsed {
            Ok(PageResponse::InvalidPage) => Ok(PageResponse::InvalidPage),
            _ if !status.is_success() => {
                Err(ClientError::ApiError(status.as_u16(), body.to_string()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{PlayerStatus, QuestionStatus};

    fn client() -> QuestionsClient {
        QuestionsClient::new("https://www.metaculus.com/api2/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(client.base_url(), "https://www.metaculus.com/api2");
        assert_eq!(
            client.question_url(3961),
            "https://www.metaculus.com/api2/questions/3961/"
        );
        assert_eq!(
            client.predict_url(3961),
            "https://www.metaculus.com/api2/questions/3961/predict/"
        );
    }

    #[test]
    fn test_page_url() {
        let query = QuestionQuery {
            status: QuestionStatus::Resolved,
            player: PlayerStatus::Predicted,
            category: None,
            user_id: Some(5),
        };
        assert_eq!(
            client().page_url(&query, 2).unwrap(),
            "https://www.metaculus.com/api2/questions/?status=resolved&order_by=-publish_time&guessed_by=5&page=2"
        );
    }
}
