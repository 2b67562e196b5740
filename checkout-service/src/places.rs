use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

pub const TEXT_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";

#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("Missing query or API key")]
    MissingQueryOrKey,

    #[error("places search failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl IntoResponse for PlacesError {
    fn into_response(self) -> Response {
        match self {
            Self::MissingQueryOrKey => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": self.to_string() }))).into_response()
            }
            Self::Upstream(e) => {
                error!("Google Places request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to fetch Google Places data" })),
                )
                    .into_response()
            }
        }
    }
}

pub struct PlacesClient {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl PlacesClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            endpoint: endpoint.into(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Passes the upstream JSON through untouched, whatever its `status` field says.
    pub async fn text_search(&self, query: &str) -> Result<Value, PlacesError> {
        let query = normalize_query(query);
        let (Some(api_key), false) = (self.api_key.as_deref(), query.is_empty()) else {
            return Err(PlacesError::MissingQueryOrKey);
        };

        debug!("Searching places for '{}'", query);
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("query", query.as_str()), ("key", api_key)])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn blank_query_or_missing_key_is_rejected() {
        let with_key = PlacesClient::new(reqwest::Client::new(), Some("k".to_string()), TEXT_SEARCH_URL);
        assert!(matches!(with_key.text_search("   ").await, Err(PlacesError::MissingQueryOrKey)));

        let without_key = PlacesClient::new(reqwest::Client::new(), Some(" ".to_string()), TEXT_SEARCH_URL);
        assert!(!without_key.has_api_key());
        assert!(matches!(without_key.text_search("padaria").await, Err(PlacesError::MissingQueryOrKey)));
    }

    #[tokio::test]
    async fn query_is_normalized_and_result_passed_through() {
        let server = MockServer::start().await;
        let body = json!({ "status": "OK", "results": [{ "name": "Padaria Central", "formatted_address": "Rua B, 20" }] });
        Mock::given(method("GET"))
            .and(path("/textsearch/json"))
            .and(query_param("query", "padaria central sp"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let client = PlacesClient::new(
            reqwest::Client::new(),
            Some("secret".to_string()),
            format!("{}/textsearch/json", server.uri()),
        );
        assert_eq!(client.text_search("  padaria   central\tsp ").await.unwrap(), body);
    }

    #[tokio::test]
    async fn upstream_error_maps_to_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = PlacesClient::new(reqwest::Client::new(), Some("secret".to_string()), server.uri());
        let err = client.text_search("padaria").await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
