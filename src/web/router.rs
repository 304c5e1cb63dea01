use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    pins::upload::MAX_IMAGE_BYTES,
    web::{AppState, auth, feed, pins, profile, session},
};

/// Room for an avatar plus a cover image and the text fields around them.
const MAX_FORM_BYTES: usize = 2 * MAX_IMAGE_BYTES + 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(feed::home_page))
        .route("/api/feed", get(feed::feed_layout))
        .route("/login", get(auth::login_page).post(auth::process_login))
        .route("/signup", post(auth::process_signup))
        .route("/logout", post(auth::logout))
        .route("/api/session", get(auth::session_status))
        .route("/create", get(pins::create_page).post(pins::submit_pin))
        .route("/pin/:id", get(pins::pin_page))
        .route("/pin/:id/delete", post(pins::remove_pin))
        .route(
            "/profile",
            get(profile::profile_page).post(profile::update_profile),
        )
        .route(
            "/finish-profile",
            get(profile::finish_profile_page).post(profile::submit_finish_profile),
        )
        .route("/healthz", get(healthz))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_gate,
        ))
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use tower::ServiceExt;

    use crate::{
        config::test_config,
        platform::{Session, SessionUser},
        web::session::encode_session,
    };

    fn app() -> Router {
        let state = AppState::new(test_config()).expect("state");
        build_router(state)
    }

    fn session_header(expires_at: i64) -> String {
        let session = Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            user: SessionUser {
                id: uuid::Uuid::from_u128(9),
                email: None,
            },
        };
        format!(
            "sb-abcd-auth-token={}",
            encode_session(&session).expect("encode")
        )
    }

    fn location(response: &axum::response::Response) -> Option<&str> {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    #[tokio::test]
    async fn healthz_is_open() {
        let response = app()
            .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn anonymous_home_redirects_to_login() {
        for path in ["/", "/profile", "/create", "/finish-profile"] {
            let response = app()
                .oneshot(Request::get(path).body(Body::empty()).expect("request"))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
            assert_eq!(location(&response), Some("/login"), "{path}");
        }
    }

    #[tokio::test]
    async fn login_page_renders_for_guests() {
        let response = app()
            .oneshot(Request::get("/login").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn signed_in_visitor_is_sent_home_from_login() {
        let response = app()
            .oneshot(
                Request::get("/login")
                    .header(header::COOKIE, session_header(4_000_000_000))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/"));
    }

    #[tokio::test]
    async fn unreadable_cookie_is_cleared() {
        let response = app()
            .oneshot(
                Request::get("/")
                    .header(header::COOKIE, "sb-abcd-auth-token=base64-notjson")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(location(&response), Some("/login"));
        let cleared = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| value.starts_with("sb-abcd-auth-token=;"));
        assert!(cleared);
    }

    #[tokio::test]
    async fn session_status_requires_session() {
        let response = app()
            .oneshot(
                Request::get("/api/session")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
