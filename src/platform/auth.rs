use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{PlatformClient, PlatformError, expect_success, read_json};

/// Session persisted in the auth cookie.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) at which the access token stops being accepted.
    pub expires_at: i64,
    pub user: SessionUser,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

impl Session {
    pub fn expires_within(&self, seconds: i64) -> bool {
        self.expires_at - Utc::now().timestamp() <= seconds
    }
}

/// Exchanges a refresh token for a new session.
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<Session, PlatformError>;
}

#[async_trait]
impl SessionRefresher for PlatformClient {
    async fn refresh(&self, refresh_token: &str) -> Result<Session, PlatformError> {
        self.refresh_session(refresh_token).await
    }
}

/// Result of a sign-up: projects without email confirmation hand out a
/// session immediately, others only acknowledge the account.
#[derive(Debug)]
pub enum SignUpOutcome {
    Session(Session),
    PendingConfirmation(SessionUser),
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: SessionUser,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + token.expires_in.unwrap_or(3600));
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user,
        }
    }
}

impl PlatformClient {
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, PlatformError> {
        let response = self
            .request(
                Method::POST,
                "/auth/v1/token?grant_type=password",
                &self.anon_key,
            )
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = read_json(response).await?;
        Ok(token.into())
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<SignUpOutcome, PlatformError> {
        let response = self
            .request(Method::POST, "/auth/v1/signup", &self.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "username": username },
            }))
            .send()
            .await?;
        let body: Value = read_json(response).await?;
        parse_sign_up(body)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, PlatformError> {
        let response = self
            .request(
                Method::POST,
                "/auth/v1/token?grant_type=refresh_token",
                &self.anon_key,
            )
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let token: TokenResponse = read_json(response).await?;
        Ok(token.into())
    }

    /// Validate an access token against the auth server.
    pub async fn get_user(&self, access_token: &str) -> Result<SessionUser, PlatformError> {
        let response = self
            .request(Method::GET, "/auth/v1/user", access_token)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), PlatformError> {
        let response = self
            .request(Method::POST, "/auth/v1/logout", access_token)
            .send()
            .await?;
        expect_success(response).await
    }
}

fn parse_sign_up(body: Value) -> Result<SignUpOutcome, PlatformError> {
    if body.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(body)?;
        return Ok(SignUpOutcome::Session(token.into()));
    }

    let user = match body.get("user") {
        Some(user) if !user.is_null() => serde_json::from_value(user.clone())?,
        _ => serde_json::from_value(body)?,
    };
    Ok(SignUpOutcome::PendingConfirmation(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_up_with_autoconfirm_yields_session() {
        let body = json!({
            "access_token": "access",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "expires_at": 1_900_000_000,
            "token_type": "bearer",
            "user": { "id": "8d0fd2b3-9ca7-4a41-a5e4-6d2f2a6f1c10", "email": "ada@example.com" }
        });

        match parse_sign_up(body).expect("parse") {
            SignUpOutcome::Session(session) => {
                assert_eq!(session.access_token, "access");
                assert_eq!(session.expires_at, 1_900_000_000);
                assert_eq!(session.user.email.as_deref(), Some("ada@example.com"));
            }
            other => panic!("expected session, got {other:?}"),
        }
    }

    #[test]
    fn sign_up_with_confirmation_yields_user_only() {
        let body = json!({
            "id": "8d0fd2b3-9ca7-4a41-a5e4-6d2f2a6f1c10",
            "email": "ada@example.com",
            "confirmation_sent_at": "2024-05-01T10:00:00Z"
        });

        match parse_sign_up(body).expect("parse") {
            SignUpOutcome::PendingConfirmation(user) => {
                assert_eq!(user.id.to_string(), "8d0fd2b3-9ca7-4a41-a5e4-6d2f2a6f1c10");
            }
            other => panic!("expected pending confirmation, got {other:?}"),
        }
    }

    #[test]
    fn missing_expiry_defaults_to_an_hour() {
        let token = TokenResponse {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: None,
            expires_at: None,
            user: SessionUser {
                id: Uuid::new_v4(),
                email: None,
            },
        };
        let session: Session = token.into();
        assert!(!session.expires_within(3000));
        assert!(session.expires_within(3700));
    }
}
