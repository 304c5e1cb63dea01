use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{
    Engine,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use cookie::time::Duration as CookieDuration;
use tracing::{error, info, warn};

use crate::{platform::Session, web::AppState};

pub const SESSION_TTL_DAYS: i64 = 30;
/// Access tokens this close to expiry are refreshed before the request runs.
pub const REFRESH_MARGIN_SECS: i64 = 60;

const ENCODED_PREFIX: &str = "base64-";

/// Serialize a session into the cookie value format shared with the
/// platform's browser clients: `base64-<base64url(json)>`.
pub fn encode_session(session: &Session) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(session)?;
    Ok(format!("{ENCODED_PREFIX}{}", URL_SAFE_NO_PAD.encode(json)))
}

/// Parse a cookie value. Plain JSON values are accepted too.
pub fn decode_session(value: &str) -> Option<Session> {
    let value = value.trim();
    match value.strip_prefix(ENCODED_PREFIX) {
        Some(encoded) => {
            let bytes = URL_SAFE_NO_PAD
                .decode(encoded)
                .or_else(|_| URL_SAFE.decode(encoded))
                .ok()?;
            serde_json::from_slice(&bytes).ok()
        }
        None => serde_json::from_str(value).ok(),
    }
}

pub fn session_cookie(
    name: &str,
    session: &Session,
) -> Result<Cookie<'static>, serde_json::Error> {
    let mut cookie = Cookie::new(name.to_string(), encode_session(session)?);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::days(SESSION_TTL_DAYS));
    Ok(cookie)
}

pub fn removal_cookie(name: &str) -> Cookie<'static> {
    let mut removal = Cookie::new(name.to_string(), "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));
    removal
}

/// How the access gate treats a path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Access {
    /// Anonymous visitors are sent to `/login`.
    SignedIn,
    /// Signed-in visitors are sent to `/`.
    GuestOnly,
    Open,
}

pub fn access_for(path: &str) -> Access {
    match path {
        "/" | "/profile" | "/create" | "/finish-profile" => Access::SignedIn,
        "/login" => Access::GuestOnly,
        _ => Access::Open,
    }
}

/// The caller's session as resolved by [`session_gate`], if any.
#[derive(Clone, Debug, Default)]
pub struct MaybeSession(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<MaybeSession>()
            .cloned()
            .unwrap_or_default())
    }
}

/// A signed-in caller. Anonymous requests are redirected to `/login`.
#[derive(Clone, Debug)]
pub struct AuthSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<MaybeSession>()
            .and_then(|current| current.0.clone())
            .map(AuthSession)
            .ok_or_else(|| Redirect::to("/login"))
    }
}

/// Resolve the session cookie, refresh it when it is about to expire, and
/// apply the per-path redirect rules before the handler runs.
pub async fn session_gate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let (session, jar) = resolve_session(&state, jar).await;

    match access_for(request.uri().path()) {
        Access::SignedIn if session.is_none() => {
            return (jar, Redirect::to("/login")).into_response();
        }
        Access::GuestOnly if session.is_some() => {
            return (jar, Redirect::to("/")).into_response();
        }
        _ => {}
    }

    request.extensions_mut().insert(MaybeSession(session));
    let response = next.run(request).await;

    // A session cookie written by the handler (sign in, sign up, logout)
    // supersedes whatever the gate decided for the incoming one.
    if sets_cookie(&response, state.cookie_name()) {
        return response;
    }
    (jar, response).into_response()
}

async fn resolve_session(state: &AppState, jar: CookieJar) -> (Option<Session>, CookieJar) {
    let cookie_name = state.cookie_name();
    let Some(value) = jar.get(cookie_name).map(|cookie| cookie.value().to_string()) else {
        return (None, jar);
    };

    let current = match decode_session(&value) {
        Some(current) => current,
        None => {
            warn!("discarding unreadable session cookie");
            return (None, jar.remove(removal_cookie(cookie_name)));
        }
    };
    if !current.expires_within(REFRESH_MARGIN_SECS) {
        return (Some(current), jar);
    }

    let refreshed = match state.refresher().refresh(&current.refresh_token).await {
        Ok(refreshed) => refreshed,
        Err(err) => {
            warn!(?err, user_id = %current.user.id, "session refresh failed");
            return (None, jar.remove(removal_cookie(cookie_name)));
        }
    };
    match session_cookie(cookie_name, &refreshed) {
        Ok(cookie) => {
            info!(user_id = %refreshed.user.id, "session refreshed");
            (Some(refreshed), jar.add(cookie))
        }
        Err(err) => {
            error!(?err, user_id = %refreshed.user.id, "failed to encode refreshed session");
            (None, jar.remove(removal_cookie(cookie_name)))
        }
    }
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split_once('='))
        .any(|(key, _)| key.trim() == name)
}
