//! HTTP client for the document endpoints.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use thiserror::Error;

use crate::models::{CreateDocumentRequest, DocumentRecord, Session};
use crate::util::{compact_text, is_http_url};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(8_000);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Timeout to contact the server.")]
    Timeout,
    #[error("Error to contact the server.")]
    Server { status: u16 },
    /// A non-5xx failure; the display text is the response body.
    #[error("{body}")]
    Rejected { status: u16, body: String },
    #[error("{0}")]
    Transport(String),
    #[error("Invalid server response: {0}")]
    Decode(String),
    #[error("Invalid API configuration: {0}")]
    InvalidConfiguration(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Message recorded on the document cache.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Map a response status and body to the error it represents.
///
/// 2xx is success. 5xx collapses to a fixed message. Anything else surfaces
/// the body text as-is, or a status line when the body is empty.
pub fn classify_response(status: u16, body: &str) -> ApiResult<()> {
    match status {
        200..=299 => Ok(()),
        500..=u16::MAX => Err(ApiError::Server { status }),
        _ if body.trim().is_empty() => Err(ApiError::Rejected {
            status,
            body: format!("Request failed with HTTP {status}"),
        }),
        _ => Err(ApiError::Rejected {
            status,
            body: body.to_string(),
        }),
    }
}

/// Remote document operations used by the sync orchestrator.
#[allow(async_fn_in_trait)]
pub trait DocumentApi {
    /// `GET /documents`
    async fn fetch_documents(&self) -> ApiResult<Vec<DocumentRecord>>;

    /// `POST /documents`
    async fn create_document(&self, request: &CreateDocumentRequest) -> ApiResult<()>;
}

/// [`DocumentApi`] over reqwest with `Basic` auth.
#[derive(Debug, Clone)]
pub struct HttpDocumentApi {
    base_url: String,
    session: Session,
    client: reqwest::Client,
}

impl HttpDocumentApi {
    pub fn new(base_url: impl Into<String>, session: Session) -> ApiResult<Self> {
        Self::with_timeout(base_url, session, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        session: Session,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let base_url = normalize_base_url(&base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| {
                ApiError::InvalidConfiguration(format!("Failed to construct HTTP client: {error}"))
            })?;
        Ok(Self {
            base_url,
            session,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    fn documents_url(&self) -> String {
        format!("{}/documents", self.base_url)
    }
}

impl DocumentApi for HttpDocumentApi {
    async fn fetch_documents(&self) -> ApiResult<Vec<DocumentRecord>> {
        let response = self
            .client
            .get(self.documents_url())
            .header(AUTHORIZATION, self.session.authorization_header())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        classify_response(status, &body)?;

        serde_json::from_str(&body).map_err(|error| {
            tracing::debug!("Undecodable document list: {}", compact_text(&body));
            ApiError::Decode(error.to_string())
        })
    }

    async fn create_document(&self, request: &CreateDocumentRequest) -> ApiResult<()> {
        let response = self
            .client
            .post(self.documents_url())
            .header(AUTHORIZATION, self.session.authorization_header())
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        classify_response(status, &body)
    }
}

fn normalize_base_url(raw: &str) -> ApiResult<String> {
    let base = raw.trim().trim_end_matches('/').to_string();
    if base.is_empty() {
        return Err(ApiError::InvalidConfiguration(
            "API base URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(&base) {
        return Err(ApiError::InvalidConfiguration(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(base)
}
