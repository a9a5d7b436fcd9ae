use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;

use super::error::PollError;
use super::snapshot::{StatusSnapshot, SubjectId, SubjectKind};

/// Source of status snapshots for one subject kind
#[async_trait]
pub trait StatusFetcher<S>: Send + Sync {
    /// Resource collection used to derive cache keys
    fn collection(&self) -> &str;

    async fn fetch(&self, subject: &SubjectId) -> Result<S, PollError>;
}

/// reqwest client for `GET <base>/<collection>/{subject}/poll[?token=…]`
#[derive(Clone)]
pub struct HttpStatusFetcher {
    client: Client,
    base_url: String,
    kind: SubjectKind,
    token: Option<String>,
}

impl HttpStatusFetcher {
    pub fn new(client: Client, base_url: impl Into<String>, kind: SubjectKind) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            kind,
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Build a client with the request timeout the fetcher relies on
    pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(120))
            .build()
    }

    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    /// Poll endpoint for `subject`. The subject is pushed as a single
    /// percent-encoded path segment, so `/`, `?` and `#` stay inside it.
    pub fn poll_url(&self, subject: &SubjectId) -> Result<Url, PollError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PollError::Network(format!("Invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PollError::Network("Base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(self.kind.collection())
            .push(subject.as_str())
            .push("poll");
        Ok(url)
    }
}

#[async_trait]
impl StatusFetcher<StatusSnapshot> for HttpStatusFetcher {
    fn collection(&self) -> &str {
        self.kind.collection()
    }

    async fn fetch(&self, subject: &SubjectId) -> Result<StatusSnapshot, PollError> {
        let url = self.poll_url(subject)?;
        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.query(&[("token", token)]);
        }

        let response = request.send().await.map_err(|e| {
            tracing::debug!(url = %url, error = %e, "Status request failed");
            PollError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(
                url = %url,
                status = status.as_u16(),
                "Status endpoint returned error"
            );
            return Err(PollError::Status(status.as_u16()));
        }

        // Decode failures become `Malformed`, a timeout mid-body stays `Timeout`
        let body: serde_json::Value = response.json().await.map_err(PollError::from)?;

        Ok(self.kind.decode(body)?)
    }
}
