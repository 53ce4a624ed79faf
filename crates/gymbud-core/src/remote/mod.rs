//! Client for the backend's RPC and edge-function surface.
//!
//! Every endpoint answers with `{ "ok": true, "data": ... }` or
//! `{ "ok": false, "error": { "code": ..., "message": ... } }`. A non-2xx
//! status and `ok: false` are handled the same way.

mod types;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ClientConfig;
use crate::models::RecordId;
use crate::sync::PullSnapshot;
use crate::util::{compact_text, is_http_url, normalize_text_option};

pub use types::{
    CreatePlanRequest, CreateSessionRequest, CreatedPlan, CreatedSession, Exercise,
};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid backend configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Backend HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message}")]
    Api {
        code: Option<String>,
        message: String,
    },
    #[error("Invalid backend payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: Option<bool>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<EnvelopeError>,
    // Some gateways reply with a bare `{ "message": ... }`.
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnvelopeError {
    Detailed {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    Plain(String),
}

/// Authenticated client for the backend.
#[derive(Clone)]
pub struct RpcClient {
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    client: Client,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RpcClient")
            .field("base_url", &self.base_url)
            .field("anon_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        access_token: Option<String>,
    ) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let anon_key = normalize_text_option(Some(anon_key.into())).ok_or_else(|| {
            RemoteError::InvalidConfiguration("anon key must not be empty".to_string())
        })?;

        Ok(Self {
            base_url,
            anon_key,
            access_token: normalize_text_option(access_token),
            client: Client::builder()
                .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
                .build()?,
        })
    }

    /// Build a client from resolved configuration.
    pub fn from_config(config: &ClientConfig) -> RemoteResult<Self> {
        let base_url = config.api_base_url.clone().ok_or_else(|| {
            RemoteError::InvalidConfiguration("api_base_url is not configured".to_string())
        })?;
        let anon_key = config.anon_key.clone().ok_or_else(|| {
            RemoteError::InvalidConfiguration("anon_key is not configured".to_string())
        })?;
        Self::new(base_url, anon_key, config.access_token.clone())
    }

    /// Call a database RPC.
    pub async fn rpc<A: Serialize + Sync, T: DeserializeOwned>(
        &self,
        name: &str,
        args: &A,
    ) -> RemoteResult<T> {
        self.post(&format!("/rest/v1/rpc/{name}"), args).await
    }

    /// Invoke an edge function.
    pub async fn function<A: Serialize + Sync, T: DeserializeOwned>(
        &self,
        name: &str,
        body: &A,
    ) -> RemoteResult<T> {
        self.post(&format!("/functions/v1/{name}"), body).await
    }

    async fn post<A: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &A,
    ) -> RemoteResult<T> {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        tracing::debug!("POST {}{}", self.base_url, path);

        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        parse_envelope(status, &text)
    }

    pub async fn search_exercises(&self, query: &str, limit: usize) -> RemoteResult<Vec<Exercise>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.rpc("search_exercises", &json!({ "q": query, "limit": limit }))
            .await
    }

    pub async fn get_exercise(&self, id: &RecordId) -> RemoteResult<Option<Exercise>> {
        self.rpc("get_exercise", &json!({ "exercise_id": id })).await
    }

    pub async fn create_plan(&self, request: &CreatePlanRequest) -> RemoteResult<CreatedPlan> {
        self.function("create-plan", request).await
    }

    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> RemoteResult<CreatedSession> {
        self.function("create-session", request).await
    }

    /// Fetch rows changed since `cursor`.
    pub async fn pull(&self, cursor: Option<&str>) -> RemoteResult<PullSnapshot> {
        self.function("sync-pull", &json!({ "cursor": cursor })).await
    }
}

/// Decode an envelope, treating non-2xx and `ok: false` alike.
pub fn parse_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> RemoteResult<T> {
    let envelope = serde_json::from_str::<Envelope>(body).ok();

    let succeeded = status.is_success()
        && envelope
            .as_ref()
            .is_some_and(|envelope| envelope.ok.unwrap_or(false));

    if !succeeded {
        return Err(api_error(status, envelope, body));
    }

    let data = envelope.and_then(|envelope| envelope.data).unwrap_or(Value::Null);
    serde_json::from_value(data).map_err(|error| RemoteError::InvalidPayload(error.to_string()))
}

fn api_error(status: StatusCode, envelope: Option<Envelope>, body: &str) -> RemoteError {
    let (code, message) = match envelope {
        Some(Envelope {
            error: Some(EnvelopeError::Detailed { code, message }),
            ..
        }) => (code, message),
        Some(Envelope {
            error: Some(EnvelopeError::Plain(message)),
            ..
        }) => (None, Some(message)),
        Some(Envelope { message, .. }) => (None, message),
        None => (None, None),
    };

    let message = normalize_text_option(message).unwrap_or_else(|| {
        if status.is_success() {
            let trimmed = compact_text(body);
            if trimmed.is_empty() {
                "Backend returned an empty response".to_string()
            } else {
                format!("Unexpected backend response: {trimmed}")
            }
        } else {
            format!("HTTP {}", status.as_u16())
        }
    });

    RemoteError::Api { code, message }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_envelope_returns_data() {
        let value: Vec<u32> =
            parse_envelope(StatusCode::OK, r#"{"ok":true,"data":[1,2,3]}"#).unwrap();
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[test]
    fn parse_envelope_ok_false_is_failure_even_with_200() {
        let err = parse_envelope::<Value>(
            StatusCode::OK,
            r#"{"ok":false,"error":{"code":"forbidden","message":"Not your session"}}"#,
        )
        .unwrap_err();

        match err {
            RemoteError::Api { code, message } => {
                assert_eq!(code.as_deref(), Some("forbidden"));
                assert_eq!(message, "Not your session");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn parse_envelope_non_2xx_uses_error_message() {
        let err = parse_envelope::<Value>(
            StatusCode::UNAUTHORIZED,
            r#"{"ok":true,"error":{"message":"JWT expired"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "JWT expired");
    }

    #[test]
    fn parse_envelope_non_2xx_without_message_reports_status() {
        let err =
            parse_envelope::<Value>(StatusCode::BAD_GATEWAY, "<html>oops</html>").unwrap_err();
        assert_eq!(err.to_string(), "HTTP 502");

        let err = parse_envelope::<Value>(StatusCode::NOT_FOUND, r#"{"ok":false}"#).unwrap_err();
        assert_eq!(err.to_string(), "HTTP 404");
    }

    #[test]
    fn parse_envelope_accepts_plain_error_strings() {
        let err = parse_envelope::<Value>(
            StatusCode::BAD_REQUEST,
            r#"{"ok":false,"error":"limit must be positive"}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "limit must be positive");
    }

    #[test]
    fn parse_envelope_rejects_mismatched_data() {
        let err = parse_envelope::<Vec<u32>>(StatusCode::OK, r#"{"ok":true,"data":"nope"}"#)
            .unwrap_err();
        assert!(matches!(err, RemoteError::InvalidPayload(_)));
    }

    #[test]
    fn client_rejects_invalid_configuration() {
        assert!(RpcClient::new("", "anon", None).is_err());
        assert!(RpcClient::new("api.example.com", "anon", None).is_err());
        assert!(RpcClient::new("https://api.example.com", "  ", None).is_err());
    }

    #[test]
    fn client_debug_redacts_keys() {
        let client =
            RpcClient::new("https://api.example.com/", "anon-secret", Some("jwt".into())).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("anon-secret"));
        assert!(!debug.contains("jwt"));
        assert!(debug.contains("https://api.example.com"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn search_exercises_posts_to_rpc_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/rpc/search_exercises")
            .match_header("apikey", "anon")
            .match_header("authorization", "Bearer user-jwt")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ok":true,"data":[{"id":"ex-1","name":"Back squat","muscle_group":"legs"}]}"#,
            )
            .create_async()
            .await;

        let client = RpcClient::new(server.url(), "anon", Some("user-jwt".into())).unwrap();
        let exercises = client.search_exercises("squat", 5).await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            exercises,
            vec![Exercise {
                id: RecordId::from("ex-1"),
                name: "Back squat".into(),
                muscle_group: Some("legs".into()),
                equipment: None,
            }]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_exercise_sends_id_and_maps_missing_to_none() {
        let mut server = mockito::Server::new_async().await;
        let found = server
            .mock("POST", "/rest/v1/rpc/get_exercise")
            .match_body(mockito::Matcher::Json(json!({ "exercise_id": "ex-1" })))
            .with_status(200)
            .with_body(
                r#"{"ok":true,"data":{"id":"ex-1","name":"Deadlift","equipment":"barbell"}}"#,
            )
            .create_async()
            .await;
        let missing = server
            .mock("POST", "/rest/v1/rpc/get_exercise")
            .match_body(mockito::Matcher::Json(json!({ "exercise_id": "ex-404" })))
            .with_status(200)
            .with_body(r#"{"ok":true,"data":null}"#)
            .create_async()
            .await;

        let client = RpcClient::new(server.url(), "anon", None).unwrap();
        let exercise = client.get_exercise(&RecordId::from("ex-1")).await.unwrap();
        let absent = client.get_exercise(&RecordId::from("ex-404")).await.unwrap();

        found.assert_async().await;
        missing.assert_async().await;
        assert_eq!(
            exercise,
            Some(Exercise {
                id: RecordId::from("ex-1"),
                name: "Deadlift".into(),
                muscle_group: None,
                equipment: Some("barbell".into()),
            })
        );
        assert_eq!(absent, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_plan_posts_to_function() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/functions/v1/create-plan")
            .match_header("authorization", "Bearer anon")
            .match_body(mockito::Matcher::Json(json!({ "goal": "strength", "days_per_week": 3 })))
            .with_status(201)
            .with_body(r#"{"ok":true,"data":{"plan_id":"p-9"}}"#)
            .create_async()
            .await;

        let client = RpcClient::new(server.url(), "anon", None).unwrap();
        let created = client
            .create_plan(&CreatePlanRequest {
                goal: "strength".into(),
                days_per_week: 3,
                start_date: None,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            created,
            CreatedPlan {
                plan_id: RecordId::from("p-9")
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blank_search_skips_request() {
        let client = RpcClient::new("http://127.0.0.1:9", "anon", None).unwrap();
        assert!(client.search_exercises("   ", 5).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_session_surfaces_api_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/functions/v1/create-session")
            .with_status(403)
            .with_body(
                r#"{"ok":false,"error":{"code":"plan_locked","message":"Plan is archived"}}"#,
            )
            .create_async()
            .await;

        let client = RpcClient::new(server.url(), "anon", None).unwrap();
        let err = client
            .create_session(&CreateSessionRequest {
                plan_id: Some(RecordId::from("p-1")),
                date: "2024-01-03".parse().unwrap(),
                is_baseline: false,
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Plan is archived");
    }
}
