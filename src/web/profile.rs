use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::{error, warn};

use crate::{
    pins::{
        feed::{display_name, load_user_pins, resolve_avatar},
        layout::DEFAULT_COLUMNS,
        profile::{Account, ProfileEdit, ProfileError, find_profile, load_account, save_profile},
        upload::MAX_IMAGE_BYTES,
    },
    platform::{ScopedClient, Session},
    web::{
        AppState,
        feed::{GRID_STYLES, render_grid},
        session::AuthSession,
        templates::{PageLayout, SESSION_CHECK_SCRIPT, error_banner, escape_html, render_page},
        uploads::{FileFieldConfig, UploadOutcome, read_upload_form},
    },
};

const PROFILE_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png"];

pub async fn profile_page(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Response {
    let client = state.client_for(Some(&session));
    render_profile(&state, &client, &session, None).await
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    multipart: Multipart,
) -> Response {
    let client = state.client_for(Some(&session));
    let fields = [
        FileFieldConfig::new("avatar", "Avatar", PROFILE_IMAGE_TYPES, MAX_IMAGE_BYTES),
        FileFieldConfig::new("cover", "Cover image", PROFILE_IMAGE_TYPES, MAX_IMAGE_BYTES),
    ];
    let form = match read_upload_form(multipart, &fields).await {
        Ok(form) => form,
        Err(err) => {
            warn!(?err, "rejected profile form");
            return render_profile(&state, &client, &session, Some(err.message())).await;
        }
    };

    match store_profile(&state, &client, &session, form).await {
        Ok(()) => Redirect::to("/profile").into_response(),
        Err(err) if err.is_session_expired() => Redirect::to("/login").into_response(),
        Err(err) => render_profile(&state, &client, &session, Some(&err.to_string())).await,
    }
}

pub async fn finish_profile_page(AuthSession(_session): AuthSession) -> Html<String> {
    Html(render_finish_profile(None, ""))
}

pub async fn submit_finish_profile(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    multipart: Multipart,
) -> Result<Redirect, (StatusCode, Html<String>)> {
    let client = state.client_for(Some(&session));
    let fields = [FileFieldConfig::new(
        "avatar",
        "Avatar",
        PROFILE_IMAGE_TYPES,
        MAX_IMAGE_BYTES,
    )];
    let form = read_upload_form(multipart, &fields).await.map_err(|err| {
        warn!(?err, "rejected finish-profile form");
        (
            StatusCode::BAD_REQUEST,
            Html(render_finish_profile(Some(err.message()), "")),
        )
    })?;
    let description = form.text("description").to_string();

    match store_profile(&state, &client, &session, form).await {
        Ok(()) => Ok(Redirect::to("/")),
        Err(err) if err.is_session_expired() => Ok(Redirect::to("/login")),
        Err(err) => Err((
            StatusCode::BAD_REQUEST,
            Html(render_finish_profile(Some(&err.to_string()), &description)),
        )),
    }
}

async fn store_profile(
    state: &AppState,
    client: &ScopedClient,
    session: &Session,
    mut form: UploadOutcome,
) -> Result<(), ProfileError> {
    let user_id = session.user.id;
    let current = find_profile(client, user_id)
        .await
        .map_err(ProfileError::Load)?;

    let edit = ProfileEdit {
        description: form.text("description").to_string(),
        avatar: form.take_file("avatar"),
        cover: form.take_file("cover"),
    };
    save_profile(client, client, state.bucket(), user_id, current.as_ref(), edit).await?;
    Ok(())
}

async fn render_profile(
    state: &AppState,
    client: &ScopedClient,
    session: &Session,
    form_error: Option<&str>,
) -> Response {
    let account = match load_account(client, session.user.id).await {
        Ok(account) => account,
        Err(ProfileError::MissingProfile) => return Redirect::to("/finish-profile").into_response(),
        Err(err) if err.is_session_expired() => return Redirect::to("/login").into_response(),
        Err(err @ ProfileError::MissingUser) => {
            error!(user_id = %session.user.id, "signed-in user has no users row");
            return message_response(StatusCode::NOT_FOUND, &err.to_string());
        }
        Err(err) => {
            error!(?err, user_id = %session.user.id, "failed to load profile");
            return message_response(StatusCode::BAD_GATEWAY, &err.to_string());
        }
    };

    let mut banners = Vec::new();
    if let Some(message) = form_error {
        banners.push(error_banner(message));
    }
    if let Err(err) = state.ensure_storage(client).await {
        banners.push(error_banner(&err.to_string()));
    }

    let pins_html = match load_user_pins(client, client, state.bucket(), session.user.id).await {
        Ok(pins) if pins.is_empty() => {
            r#"<p class="empty">You haven't created any pins yet. <a href="/create">Create one</a>.</p>"#
                .to_string()
        }
        Ok(pins) => format!(
            r#"<div class="masonry">{}</div>"#,
            render_grid(&pins, DEFAULT_COLUMNS)
        ),
        Err(err) => {
            error!(?err, user_id = %session.user.id, "failed to load user pins");
            error_banner("Error loading your pins.")
        }
    };

    Html(render_profile_page(
        client,
        state.bucket(),
        &account,
        &banners.concat(),
        &pins_html,
    ))
    .into_response()
}

fn render_profile_page(
    client: &ScopedClient,
    bucket: &str,
    account: &Account,
    banners: &str,
    pins_html: &str,
) -> String {
    let Account { user, profile } = account;
    let name = display_name(user).unwrap_or_else(|| "Unknown User".to_string());
    let full_name = [user.first_name.as_deref(), user.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let avatar = resolve_avatar(client, bucket, profile.avatar_url.as_deref());
    let cover_style = profile
        .cover_image_url
        .as_deref()
        .map(|url| format!(r#" style="background-image: url('{}')""#, escape_html(url)))
        .unwrap_or_default();
    let description = profile.description.as_deref().unwrap_or_default();

    let body = format!(
        r#"        {banners}
        <section class="profile-header">
            <div class="cover"{cover_style}></div>
            <img class="profile-avatar" src="{avatar}" alt="">
            <h1>{full_name}</h1>
            <p class="handle">@{name}</p>
            <p class="bio">{bio}</p>
            <details class="edit-profile">
                <summary>Edit profile</summary>
                <form method="post" action="/profile" enctype="multipart/form-data">
                    <label for="description">About</label>
                    <textarea id="description" name="description">{bio}</textarea>
                    <label for="avatar">Avatar (JPEG or PNG)</label>
                    <input id="avatar" type="file" name="avatar" accept="image/jpeg,image/png">
                    <label for="cover">Cover image (JPEG or PNG)</label>
                    <input id="cover" type="file" name="cover" accept="image/jpeg,image/png">
                    <button type="submit">Save</button>
                </form>
            </details>
        </section>
        <h2 class="section-title">Created</h2>
        {pins_html}"#,
        avatar = escape_html(&avatar),
        full_name = escape_html(&full_name),
        name = escape_html(&name),
        bio = escape_html(description),
    );

    render_page(
        PageLayout::new("Profile | Pictionary", body)
            .with_nav("", true)
            .with_style(GRID_STYLES)
            .with_style(PROFILE_STYLES)
            .with_script(SESSION_CHECK_SCRIPT),
    )
}

const PROFILE_STYLES: &str = r#"
        .profile-header { text-align: center; margin-bottom: 2rem; }
        .cover { height: 220px; border-radius: 24px; background: #efefef center / cover no-repeat; }
        .profile-avatar { width: 120px; height: 120px; margin-top: -60px; border-radius: 50%; border: 4px solid #ffffff; object-fit: cover; background: #ffffff; }
        .profile-header h1 { margin: 0.5rem 0 0; }
        .handle { color: #5f5f5f; margin: 0.25rem 0; }
        .bio { max-width: 540px; margin: 0.75rem auto; }
        .edit-profile { max-width: 540px; margin: 1rem auto 0; text-align: left; }
        .edit-profile summary { cursor: pointer; font-weight: 700; text-align: center; }
        .edit-profile button { margin-top: 1rem; }
        .section-title { text-align: center; }
"#;

fn render_finish_profile(error: Option<&str>, description: &str) -> String {
    let banner = error.map(error_banner).unwrap_or_default();
    let body = format!(
        r#"        {banner}
        <section class="panel">
            <h1>Finish your profile</h1>
            <p>Tell people a little about yourself and pick a profile picture.</p>
            <form method="post" action="/finish-profile" enctype="multipart/form-data">
                <label for="description">About</label>
                <textarea id="description" name="description">{description}</textarea>
                <label for="avatar">Avatar (JPEG or PNG)</label>
                <input id="avatar" type="file" name="avatar" accept="image/jpeg,image/png">
                <button type="submit">Save and continue</button>
            </form>
        </section>"#,
        description = escape_html(description),
    );

    render_page(
        PageLayout::new("Finish profile | Pictionary", body)
            .with_nav("", true)
            .with_style("        form button { margin-top: 1.5rem; }")
            .with_script(SESSION_CHECK_SCRIPT),
    )
}

fn message_response(status: StatusCode, message: &str) -> Response {
    let body = format!(
        r#"        <section class="panel">
            <h1>Profile unavailable</h1>
            <p>{}</p>
        </section>"#,
        escape_html(message)
    );
    (
        status,
        Html(render_page(
            PageLayout::new("Profile | Pictionary", body).with_nav("", true),
        )),
    )
        .into_response()
}
