//! Backend HTTP client for prompts and feedback
//!
//! Each call is a single bearer-authenticated POST. No retries; the caller
//! decides what a failure means.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TransportError;
use crate::message::Feedback;

pub const QUERY_PATH: &str = "/api/v1/query";
pub const FEEDBACK_PATH: &str = "/api/v1/feedback";

/// Decoded reply to a prompt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Answer {
    pub answer: String,
}

/// Whatever the feedback endpoint sent back (`null` for an empty body)
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackAck(pub serde_json::Value);

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_prompt(
        &self,
        token: &str,
        prompt: &str,
        user_id: Option<&str>,
    ) -> Result<Answer, TransportError>;

    async fn send_feedback(
        &self,
        token: &str,
        message_id: &str,
        kind: Feedback,
    ) -> Result<FeedbackAck, TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    http: reqwest::Client,
    include_user_id: bool,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// `base_url` is expected without a trailing slash
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            include_user_id: true,
            timeout: None,
        }
    }

    /// Whether `user_id` goes into the query body
    pub fn with_user_id(mut self, include: bool) -> Self {
        self.include_user_id = include;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<String, TransportError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(body);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(TransportError::Request)?;
        let status = response.status();
        let text = response.text().await.map_err(TransportError::Request)?;

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send_prompt(
        &self,
        token: &str,
        prompt: &str,
        user_id: Option<&str>,
    ) -> Result<Answer, TransportError> {
        let request = QueryRequest {
            query: prompt,
            user_id: user_id.filter(|_| self.include_user_id),
        };
        let body = self.post(QUERY_PATH, token, &request).await?;
        decode_answer(&body)
    }

    async fn send_feedback(
        &self,
        token: &str,
        message_id: &str,
        kind: Feedback,
    ) -> Result<FeedbackAck, TransportError> {
        let request = FeedbackRequest {
            message_id,
            feedback: kind,
        };
        let body = self.post(FEEDBACK_PATH, token, &request).await?;
        Ok(decode_ack(&body))
    }
}

/// Decode a query reply, rejecting bodies without a string `answer`
pub fn decode_answer(body: &str) -> Result<Answer, TransportError> {
    serde_json::from_str(body).map_err(|e| TransportError::MalformedResponse(e.to_string()))
}

fn decode_ack(body: &str) -> FeedbackAck {
    if body.trim().is_empty() {
        return FeedbackAck(serde_json::Value::Null);
    }
    FeedbackAck(
        serde_json::from_str(body).unwrap_or_else(|_| serde_json::Value::String(body.to_string())),
    )
}

// ═══════════════════════════════════════════════════════════════
// API Types
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct FeedbackRequest<'a> {
    message_id: &'a str,
    feedback: Feedback,
}
