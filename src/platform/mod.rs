//! HTTP client for the hosted backend: auth, Postgres REST gateway and
//! object storage. Every call carries the project's public key in the
//! `apikey` header and a bearer token that row-level security evaluates.

pub mod auth;
pub mod rest;
pub mod storage;

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::AppConfig;

pub use auth::{Session, SessionRefresher, SessionUser, SignUpOutcome};

/// Postgres error code for insufficient privilege, raised by RLS checks.
pub const CODE_INSUFFICIENT_PRIVILEGE: &str = "42501";
/// Gateway code returned when a single-row request matched nothing.
const CODE_NO_ROWS: &str = "PGRST116";

const ERROR_PREVIEW_LIMIT: usize = 500;

/// Failure of a platform call, classified into the categories the pages
/// react to differently.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    PermissionDenied {
        code: Option<String>,
        message: String,
    },

    #[error("{message}")]
    SessionExpired { message: String },

    #[error("{message}")]
    Api {
        code: Option<String>,
        message: String,
    },

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl PlatformError {
    /// Classify a non-success response from status code and error body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| preview(body, status));
        let code = parsed.as_ref().and_then(error_code);
        let lowered = message.to_lowercase();

        if status == StatusCode::UNAUTHORIZED
            || lowered.contains("jwt expired")
            || lowered.contains("invalid jwt")
            || lowered.contains("refresh token")
        {
            return PlatformError::SessionExpired { message };
        }

        if code.as_deref() == Some(CODE_INSUFFICIENT_PRIVILEGE)
            || lowered.contains("row-level security")
            || status == StatusCode::FORBIDDEN
        {
            return PlatformError::PermissionDenied { code, message };
        }

        if status == StatusCode::NOT_FOUND
            || code.as_deref() == Some(CODE_NO_ROWS)
            || lowered.contains("not found")
        {
            return PlatformError::NotFound { message };
        }

        PlatformError::Api {
            code,
            message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound { .. })
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, PlatformError::SessionExpired { .. })
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            PlatformError::PermissionDenied { code, .. } | PlatformError::Api { code, .. } => {
                code.as_deref()
            }
            _ => None,
        }
    }
}

fn error_message(body: &Value) -> Option<String> {
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn error_code(body: &Value) -> Option<String> {
    ["code", "error_code"]
        .iter()
        .find_map(|key| match body.get(*key) {
            Some(Value::String(code)) => Some(code.clone()),
            Some(Value::Number(code)) => Some(code.to_string()),
            _ => None,
        })
}

fn preview(body: &str, status: StatusCode) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("request failed with status {status}");
    }
    match trimmed.char_indices().nth(ERROR_PREVIEW_LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Shared, cheaply clonable handle to the platform endpoints.
#[derive(Clone)]
pub struct PlatformClient {
    http: Client,
    base_url: String,
    anon_key: String,
}

impl PlatformClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("pictionary/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build platform HTTP client")?;

        Ok(Self {
            http,
            base_url: config.supabase_url.clone(),
            anon_key: config.anon_key.clone(),
        })
    }

    /// Bind the client to a caller's access token, or to the public key
    /// when the caller is anonymous.
    pub fn scoped(&self, access_token: Option<&str>) -> ScopedClient {
        let bearer = access_token.unwrap_or(&self.anon_key).to_string();
        ScopedClient {
            client: self.clone(),
            bearer,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }
}

/// A [`PlatformClient`] acting on behalf of one caller.
#[derive(Clone)]
pub struct ScopedClient {
    client: PlatformClient,
    bearer: String,
}

impl ScopedClient {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, path, &self.bearer)
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, PlatformError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(PlatformError::from_response(status, &body));
    }
    Ok(serde_json::from_str(&body)?)
}

async fn expect_success(response: Response) -> Result<(), PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await?;
    Err(PlatformError::from_response(status, &body))
}
