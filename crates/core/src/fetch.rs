// crates/core/src/fetch.rs
//! Status endpoint access: the `StatusFetcher` seam and its HTTP implementation.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ConfigError, FetchError};
use crate::types::{JobFamily, JobSnapshot};

/// Message reported when the endpoint answers 404 without a usable body.
pub const NOT_FOUND_MESSAGE: &str = "Job not found";

const MAX_ERROR_BODY: usize = 500;

/// Returns the current snapshot of a job.
///
/// Implementations report an expired or unknown job as
/// [`FetchError::NotFound`] so it is treated as terminal, not retried.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch_status(&self, family: JobFamily, job_id: &str)
        -> Result<JobSnapshot, FetchError>;
}

/// `GET {base_url}/{family}/status/{job_id}` with a bearer token.
pub struct HttpStatusFetcher {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpStatusFetcher {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn status_url(&self, family: JobFamily, job_id: &str) -> String {
        format!(
            "{}/{}/status/{}",
            self.config.base_url,
            family.as_path(),
            urlencoding::encode(job_id)
        )
    }
}

#[async_trait]
impl StatusFetcher for HttpStatusFetcher {
    async fn fetch_status(
        &self,
        family: JobFamily,
        job_id: &str,
    ) -> Result<JobSnapshot, FetchError> {
        let url = self.status_url(family, job_id);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status == StatusCode::NOT_FOUND {
            let message = not_found_message(&body);
            tracing::debug!(%job_id, %family, %message, "status endpoint: job not found");
            return Err(FetchError::NotFound { message });
        }

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let snippet: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: snippet,
            });
        }

        decode_snapshot(&body, job_id)
    }
}

/// Decode a status body that is either the snapshot itself or `{ "data": snapshot }`.
/// A missing job id is filled in from the request.
pub fn decode_snapshot(body: &[u8], job_id: &str) -> Result<JobSnapshot, FetchError> {
    let value: Value = serde_json::from_slice(body)?;
    let inner = match value {
        Value::Object(mut map) if !map.contains_key("status") && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    let mut snapshot: JobSnapshot = serde_json::from_value(inner)?;
    if snapshot.job_id.is_empty() {
        snapshot.job_id = job_id.to_string();
    }
    Ok(snapshot)
}

/// The server's `message` (or `error`) from a 404 body, else the default.
fn not_found_message(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"].iter().find_map(|key| {
                v.get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| NOT_FOUND_MESSAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_bare_snapshot() {
        let body = br#"{"jobId":"q-1","status":"active","progress":55}"#;
        let snap = decode_snapshot(body, "q-1").unwrap();
        assert_eq!(snap.status, JobStatus::Active);
        assert_eq!(snap.progress.unwrap().percent(), Some(55.0));
    }

    #[test]
    fn test_decode_wrapped_snapshot() {
        let body = br#"{"success":true,"data":{"status":"completed","result":{"quizId":"abc"}}}"#;
        let snap = decode_snapshot(body, "q-2").unwrap();
        assert_eq!(snap.job_id, "q-2");
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.result, Some(serde_json::json!({"quizId": "abc"})));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_snapshot(b"<html>502</html>", "x"),
            Err(FetchError::Decode(_))
        ));
        assert!(matches!(
            decode_snapshot(br#"{"data":{"state":"done"}}"#, "x"),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn test_not_found_message_from_body() {
        assert_eq!(not_found_message(b""), NOT_FOUND_MESSAGE);
        assert_eq!(not_found_message(br#"{"message":""}"#), NOT_FOUND_MESSAGE);
        assert_eq!(
            not_found_message(br#"{"message":"Job q-9 expired"}"#),
            "Job q-9 expired"
        );
        assert_eq!(
            not_found_message(br#"{"error":"No such job"}"#),
            "No such job"
        );
    }

    #[test]
    fn test_status_url_encodes_job_id() {
        let config = ClientConfig::new("http://localhost:3000/api/").unwrap();
        let fetcher = HttpStatusFetcher::new(config).unwrap();
        assert_eq!(
            fetcher.status_url(JobFamily::Flashcard, "a b/c"),
            "http://localhost:3000/api/flashcard/status/a%20b%2Fc"
        );
    }
}
