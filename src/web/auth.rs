use axum::{
    Json,
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    pins::{PinStore, UserRecord},
    platform::{PlatformError, SignUpOutcome},
    web::{
        AppState,
        responses::json_error,
        session::{MaybeSession, removal_cookie, session_cookie},
        templates::{LoginMode, LoginView, render_login_page},
    },
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Serialize)]
pub struct SessionStatus {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub expires_at: i64,
}

type PageError = (StatusCode, Html<String>);

pub async fn login_page() -> Html<String> {
    Html(render_login_page(LoginMode::SignIn, &LoginView::default()))
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), PageError> {
    let email = form.email.trim();
    let sign_in_error = |message: &str| {
        login_error(
            LoginMode::SignIn,
            &LoginView {
                email,
                error: Some(message),
                ..LoginView::default()
            },
        )
    };

    if let Err(message) = validate_credentials(email, &form.password) {
        return Err(sign_in_error(message));
    }

    let session = match state
        .platform()
        .sign_in_with_password(email, &form.password)
        .await
    {
        Ok(session) => session,
        Err(err) => {
            warn!(?err, "sign in rejected");
            return Err(sign_in_error(&auth_failure_message(&err)));
        }
    };

    let cookie = session_cookie(state.cookie_name(), &session).map_err(|err| {
        error!(?err, "failed to encode session cookie");
        sign_in_error("Could not start your session. Please try again.")
    })?;
    info!(user_id = %session.user.id, "user signed in");
    Ok((jar.add(cookie), Redirect::to("/")))
}

pub async fn process_signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response, PageError> {
    let email = form.email.trim();
    let username = form.username.trim();
    let first_name = form.first_name.trim();
    let last_name = form.last_name.trim();
    let view = |error: Option<&str>, notice: Option<&str>| {
        render_login_page(
            LoginMode::SignUp,
            &LoginView {
                email,
                username,
                first_name,
                last_name,
                error,
                notice,
            },
        )
    };
    let reject = |message: &str| (StatusCode::BAD_REQUEST, Html(view(Some(message), None)));

    if let Err(message) = validate_credentials(email, &form.password) {
        return Err(reject(message));
    }
    if username.is_empty() || first_name.is_empty() || last_name.is_empty() {
        return Err(reject(
            "Username, first name, and last name are required for sign up.",
        ));
    }

    let outcome = state
        .platform()
        .sign_up(email, &form.password, username)
        .await
        .map_err(|err| {
            warn!(?err, "sign up rejected");
            reject(&auth_failure_message(&err))
        })?;

    let (user_id, session) = match outcome {
        SignUpOutcome::Session(session) => (session.user.id, Some(session)),
        SignUpOutcome::PendingConfirmation(user) => (user.id, None),
    };

    let record = UserRecord {
        id: user_id,
        username: username.to_string(),
        first_name: Some(first_name.to_string()),
        last_name: Some(last_name.to_string()),
    };
    let client = state.client_for(session.as_ref());
    if let Err(err) = client.insert_user(&record).await {
        error!(?err, %user_id, "failed to insert users row after sign up");
        return Err(reject(&format!(
            "Registration partially failed: {err}. Please contact support."
        )));
    }
    info!(%user_id, confirmed = session.is_some(), "user registered");

    match session {
        Some(session) => {
            let cookie = session_cookie(state.cookie_name(), &session).map_err(|err| {
                error!(?err, %user_id, "failed to encode session cookie");
                reject("Account created, but signing in failed. Please sign in.")
            })?;
            Ok((jar.add(cookie), Redirect::to("/finish-profile")).into_response())
        }
        None => Ok(Html(view(
            None,
            Some("Registration successful! Please check your email to verify your account."),
        ))
        .into_response()),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    if let Some(session) = session {
        if let Err(err) = state.platform().sign_out(&session.access_token).await {
            warn!(?err, user_id = %session.user.id, "platform sign out failed");
        }
    }

    let jar = jar.remove(removal_cookie(state.cookie_name()));
    (jar, Redirect::to("/login"))
}

/// Lets open pages find out whether the server still accepts their session.
pub async fn session_status(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Response {
    let Some(session) = session else {
        return json_error(StatusCode::UNAUTHORIZED, "Not signed in").into_response();
    };

    match state.platform().get_user(&session.access_token).await {
        Ok(user) => Json(SessionStatus {
            user_id: user.id,
            email: user.email,
            expires_at: session.expires_at,
        })
        .into_response(),
        Err(err) if err.is_session_expired() => {
            json_error(StatusCode::UNAUTHORIZED, "Session expired").into_response()
        }
        Err(err) => {
            error!(?err, "failed to verify session");
            json_error(StatusCode::BAD_GATEWAY, "Could not verify session").into_response()
        }
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(), &'static str> {
    if email.is_empty() || password.is_empty() {
        return Err("Email and password are required");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 6 characters");
    }
    if !looks_like_email(email) {
        return Err("Please enter a valid email address");
    }
    Ok(())
}

/// `local@domain.tld` with no whitespace.
pub fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

fn auth_failure_message(err: &PlatformError) -> String {
    match err {
        PlatformError::Transport(_) | PlatformError::Decode(_) => {
            "An error occurred. Please try again.".to_string()
        }
        other => other.to_string(),
    }
}

fn login_error(mode: LoginMode, view: &LoginView<'_>) -> PageError {
    (
        StatusCode::UNAUTHORIZED,
        Html(render_login_page(mode, view)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(looks_like_email("mira@example.com"));
        assert!(looks_like_email("a.b+c@mail.example.org"));
        assert!(!looks_like_email("mira@example"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("mira@.com"));
        assert!(!looks_like_email("mi ra@example.com"));
        assert!(!looks_like_email("mira@@example.com"));
    }

    #[test]
    fn credential_rules() {
        assert_eq!(
            validate_credentials("", "secret"),
            Err("Email and password are required")
        );
        assert_eq!(
            validate_credentials("mira@example.com", "12345"),
            Err("Password must be at least 6 characters")
        );
        assert_eq!(
            validate_credentials("mira", "123456"),
            Err("Please enter a valid email address")
        );
        assert_eq!(validate_credentials("mira@example.com", "123456"), Ok(()));
    }

    #[test]
    fn platform_message_is_shown_for_rejections() {
        let err = PlatformError::Api {
            code: Some("invalid_credentials".to_string()),
            message: "Invalid login credentials".to_string(),
        };
        assert_eq!(auth_failure_message(&err), "Invalid login credentials");
    }
}
