//! Client for the CDF platform's GraphQL API
//!
//! A question ("measurable") carries its latest aggregate as a float CDF.
//! Reads are anonymous; the measurement mutation is only built, never sent.

use crate::error::{ClientError, Result};
use crowdcast_common::Cdf;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const USER_AGENT: &str = concat!("crowdcast/", env!("CARGO_PKG_VERSION"));

/// Base of human-facing question URLs
pub const QUESTION_SITE_URL: &str = "https://www.foretold.io";

const MEASURABLE_QUERY: &str = r#"query ($measurableId: String!) {
    measurable(id: $measurableId) {
        id
        channelId
        previousAggregate {
            value {
                floatCdf {
                    xs
                    ys
                }
            }
        }
    }
}"#;

const MEASUREMENT_MUTATION: &str = r#"mutation measurementCreate($input: MeasurementCreateInput!) {
    measurementCreate(input: $input) {
        id
    }
}"#;

/// GraphQL request body
#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest<V> {
    pub variables: V,
    pub query: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurableVariables {
    pub measurable_id: String,
}

/// Body of the measurable lookup for `measurable_id`
pub fn measurable_request(measurable_id: &str) -> GraphqlRequest<MeasurableVariables> {
    GraphqlRequest {
        variables: MeasurableVariables {
            measurable_id: measurable_id.to_string(),
        },
        query: MEASURABLE_QUERY,
    }
}

/// Body of a competitive measurement submitting `cdf` to `measurable_id`
pub fn measurement_request(measurable_id: &str, cdf: &Cdf) -> GraphqlRequest<Value> {
    GraphqlRequest {
        variables: json!({
            "input": {
                "measurableId": measurable_id,
                "competitorType": "COMPETITIVE",
                "value": {"floatCdf": cdf},
            }
        }),
        query: MEASUREMENT_MUTATION,
    }
}

#[derive(Debug, Deserialize)]
struct MeasurableResponse {
    data: Option<MeasurableData>,
}

#[derive(Debug, Deserialize)]
struct MeasurableData {
    measurable: Option<Measurable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Measurable {
    id: String,
    channel_id: String,
    previous_aggregate: Option<Aggregate>,
}

#[derive(Debug, Deserialize)]
struct Aggregate {
    value: AggregateValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregateValue {
    float_cdf: Cdf,
}

/// A measurable with its latest aggregate distribution
#[derive(Debug, Clone, PartialEq)]
pub struct CdfQuestion {
    id: String,
    channel_id: String,
    cdf: Cdf,
}

impl CdfQuestion {
    /// Extract a question from a GraphQL response body
    pub fn from_response(measurable_id: &str, body: &Value) -> Result<Self> {
        let load_error =
            || ClientError::ParseError(format!("error loading distribution {}", measurable_id));

        let response = MeasurableResponse::deserialize(body).map_err(|_| load_error())?;
        let measurable = response
            .data
            .and_then(|d| d.measurable)
            .ok_or_else(|| ClientError::NotFound(format!("measurable {}", measurable_id)))?;
        let aggregate = measurable.previous_aggregate.ok_or_else(load_error)?;

        Ok(Self {
            id: measurable.id,
            channel_id: measurable.channel_id,
            cdf: aggregate.value.float_cdf,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn cdf(&self) -> &Cdf {
        &self.cdf
    }

    pub fn url(&self) -> String {
        format!("{}/c/{}/m/{}", QUESTION_SITE_URL, self.channel_id, self.id)
    }

    /// One draw from the aggregate distribution
    pub fn sample_community<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.cdf.sample(rng)
    }
}

/// CDF platform API client
pub struct CdfClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl CdfClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: endpoint.to_string(),
        })
    }

    /// Fetch a measurable and its latest aggregate CDF
    pub async fn get_question(&self, measurable_id: &str) -> Result<CdfQuestion> {
        tracing::debug!(measurable_id = %measurable_id, endpoint = %self.endpoint, "Querying CDF API");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&measurable_request(measurable_id))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::ApiError(status.as_u16(), error_text));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))?;
        let question = CdfQuestion::from_response(measurable_id, &body)?;

        tracing::info!(
            measurable_id = %measurable_id,
            points = question.cdf().len(),
            "Retrieved aggregate CDF"
        );
        Ok(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn response() -> Value {
        json!({
            "data": {
                "measurable": {
                    "id": "cf86da3f-c257-4787-b526-3ef3cb670cb4",
                    "channelId": "4ef7c0bb-7c3f-4dd4-9fdc-f3d0cf12c8c1",
                    "previousAggregate": {
                        "value": {"floatCdf": {"xs": [0, 1, 2], "ys": [0.2, 0.6, 1.0]}}
                    }
                }
            }
        })
    }

    #[test]
    fn test_from_response() {
        let q = CdfQuestion::from_response("cf86", &response()).unwrap();
        assert_eq!(q.cdf().xs(), &[0.0, 1.0, 2.0]);
        assert_eq!(
            q.url(),
            "https://www.foretold.io/c/4ef7c0bb-7c3f-4dd4-9fdc-f3d0cf12c8c1/m/cf86da3f-c257-4787-b526-3ef3cb670cb4"
        );
        let mut rng = StdRng::seed_from_u64(0);
        let x = q.sample_community(&mut rng);
        assert!((0.0..=2.0).contains(&x));
    }

    #[test]
    fn test_missing_pieces() {
        let missing = json!({"data": {"measurable": null}});
        assert!(matches!(
            CdfQuestion::from_response("x", &missing),
            Err(ClientError::NotFound(_))
        ));

        let no_aggregate = json!({"data": {"measurable": {"id": "x", "channelId": "c", "previousAggregate": null}}});
        assert!(matches!(
            CdfQuestion::from_response("x", &no_aggregate),
            Err(ClientError::ParseError(_))
        ));

        let bad_cdf = json!({"data": {"measurable": {"id": "x", "channelId": "c",
            "previousAggregate": {"value": {"floatCdf": {"xs": [2, 1], "ys": [0.1, 0.2]}}}}}});
        assert!(CdfQuestion::from_response("x", &bad_cdf).is_err());
    }

    #[test]
    fn test_request_bodies() {
        let body = serde_json::to_value(measurable_request("abc")).unwrap();
        assert_eq!(body["variables"]["measurableId"], "abc");
        assert!(body["query"].as_str().unwrap().contains("floatCdf"));

        let cdf = Cdf::new(vec![0.0, 1.0], vec![0.5, 1.0]).unwrap();
        let body = serde_json::to_value(measurement_request("abc", &cdf)).unwrap();
        assert_eq!(body["variables"]["input"]["value"]["floatCdf"]["ys"][0], 0.5);
        assert_eq!(body["variables"]["input"]["competitorType"], "COMPETITIVE");
    }
}
