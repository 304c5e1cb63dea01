use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    pins::{
        feed::{FeedItem, load_pin},
        upload::{MAX_IMAGE_BYTES, PinDraft, create_pin, delete_pin},
    },
    platform::Session,
    web::{
        AppState,
        session::{AuthSession, MaybeSession},
        templates::{PageLayout, SESSION_CHECK_SCRIPT, error_banner, escape_html, render_page},
        uploads::{FileFieldConfig, read_upload_form},
    },
};

const IMAGE_TYPES: &[&str] = &["image/*"];

type PageError = (StatusCode, Html<String>);

#[derive(Default)]
struct CreateForm<'a> {
    title: &'a str,
    description: &'a str,
    is_public: bool,
}

pub async fn create_page(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Html<String> {
    let client = state.client_for(Some(&session));
    let storage_error = state
        .ensure_storage(&client)
        .await
        .err()
        .map(|err| err.to_string());

    Html(render_create_page(
        storage_error.as_deref(),
        &CreateForm {
            is_public: true,
            ..CreateForm::default()
        },
    ))
}

pub async fn submit_pin(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    multipart: Multipart,
) -> Result<Redirect, PageError> {
    let fields = [FileFieldConfig::new(
        "file",
        "Image",
        IMAGE_TYPES,
        MAX_IMAGE_BYTES,
    )];
    let mut form = read_upload_form(multipart, &fields).await.map_err(|err| {
        warn!(?err, "rejected pin upload form");
        create_error(err.message(), &CreateForm::default())
    })?;

    let title = form.text("title").to_string();
    let description = form.text("description").to_string();
    let is_public = form.flag("is_public");
    let echo = CreateForm {
        title: &title,
        description: &description,
        is_public,
    };

    let client = state.client_for(Some(&session));
    if let Err(err) = state.ensure_storage(&client).await {
        return Err(create_error(&err.to_string(), &echo));
    }

    let draft = PinDraft {
        file: form.take_file("file"),
        title: title.clone(),
        description: description.clone(),
        is_public,
    };

    match create_pin(&client, &client, state.bucket(), session.user.id, draft).await {
        Ok(row) => {
            info!(image_id = %row.id, user_id = %session.user.id, "pin published");
            Ok(Redirect::to("/"))
        }
        Err(err) if err.is_session_expired() => Err((
            StatusCode::UNAUTHORIZED,
            Html(render_create_page(
                Some("Your session has expired. Please sign in again."),
                &echo,
            )),
        )),
        Err(err) => Err(create_error(&err.user_message(), &echo)),
    }
}

pub async fn pin_page(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return not_found(session.as_ref());
    };

    let client = state.client_for(session.as_ref());
    match load_pin(&client, &client, state.bucket(), id).await {
        Ok(Some(pin)) => Html(render_pin_page(&pin, session.as_ref(), None)).into_response(),
        Ok(None) => not_found(session.as_ref()),
        Err(err) if err.is_session_expired() => Redirect::to("/login").into_response(),
        Err(err) => {
            error!(?err, %id, "failed to load pin");
            (
                StatusCode::BAD_GATEWAY,
                Html(render_message_page(
                    "Error",
                    "Could not load this pin. Please try again later.",
                    session.is_some(),
                )),
            )
                .into_response()
        }
    }
}

pub async fn remove_pin(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return not_found(Some(&session));
    };

    let client = state.client_for(Some(&session));
    let pin = match load_pin(&client, &client, state.bucket(), id).await {
        Ok(Some(pin)) => pin,
        Ok(None) => return not_found(Some(&session)),
        Err(err) if err.is_session_expired() => return Redirect::to("/login").into_response(),
        Err(err) => {
            error!(?err, %id, "failed to load pin for deletion");
            return (
                StatusCode::BAD_GATEWAY,
                Html(render_message_page(
                    "Error",
                    "Could not load this pin. Please try again later.",
                    true,
                )),
            )
                .into_response();
        }
    };

    if pin.owner_id != session.user.id {
        warn!(%id, user_id = %session.user.id, "refusing to delete another user's pin");
        return (
            StatusCode::FORBIDDEN,
            Html(render_pin_page(
                &pin,
                Some(&session),
                Some("You can only delete your own pins."),
            )),
        )
            .into_response();
    }

    match delete_pin(&client, &client, state.bucket(), pin.id, &pin.storage_path).await {
        Ok(()) => {
            info!(%id, user_id = %session.user.id, "pin deleted");
            Redirect::to("/").into_response()
        }
        Err(err) if err.is_session_expired() => Redirect::to("/login").into_response(),
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Html(render_pin_page(&pin, Some(&session), Some(&err.user_message()))),
        )
            .into_response(),
    }
}

fn create_error(message: &str, form: &CreateForm<'_>) -> PageError {
    (
        StatusCode::BAD_REQUEST,
        Html(render_create_page(Some(message), form)),
    )
}

fn not_found(session: Option<&Session>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(render_message_page(
            "Pin not found",
            "This pin does not exist or has been removed.",
            session.is_some(),
        )),
    )
        .into_response()
}

fn render_create_page(error: Option<&str>, form: &CreateForm<'_>) -> String {
    let banner = error.map(error_banner).unwrap_or_default();
    let disabled = if error.is_some_and(|message| message.starts_with("Storage setup error")
        || message.starts_with("Database table"))
    {
        " disabled"
    } else {
        ""
    };
    let checked = if form.is_public { " checked" } else { "" };

    let body = format!(
        r#"        {banner}
        <section class="panel">
            <h1>Create Pin</h1>
            <form method="post" action="/create" enctype="multipart/form-data">
                <label for="file">Image</label>
                <input id="file" type="file" name="file" accept="image/*" required>
                <img id="preview" class="preview" alt="" hidden>
                <label for="title">Title</label>
                <input id="title" type="text" name="title" value="{title}" placeholder="Add a title" required>
                <label for="description">Description</label>
                <textarea id="description" name="description" placeholder="Tell everyone what your Pin is about">{description}</textarea>
                <label class="inline"><input type="checkbox" name="is_public" value="true"{checked}> Public</label>
                <button type="submit"{disabled}>Publish</button>
            </form>
        </section>"#,
        title = escape_html(form.title),
        description = escape_html(form.description),
    );

    render_page(
        PageLayout::new("Create Pin | Pictionary", body)
            .with_nav("", true)
            .with_style(CREATE_STYLES)
            .with_script(PREVIEW_SCRIPT)
            .with_script(SESSION_CHECK_SCRIPT),
    )
}

const CREATE_STYLES: &str = r#"
        .preview { display: block; max-width: 100%; max-height: 320px; margin-top: 1rem; border-radius: 16px; }
        label.inline { display: flex; align-items: center; gap: 0.5rem; }
        form button { margin-top: 1.5rem; }
        button:disabled { opacity: 0.5; cursor: not-allowed; }
"#;

const PREVIEW_SCRIPT: &str = r#"
(function () {
    var input = document.getElementById('file');
    var preview = document.getElementById('preview');
    if (!input || !preview) { return; }
    input.addEventListener('change', function () {
        var file = input.files && input.files[0];
        if (!file) { preview.hidden = true; return; }
        preview.src = URL.createObjectURL(file);
        preview.hidden = false;
    });
})();
"#;

fn render_pin_page(pin: &FeedItem, session: Option<&Session>, error: Option<&str>) -> String {
    let banner = error.map(error_banner).unwrap_or_default();
    let is_owner = session.is_some_and(|session| session.user.id == pin.owner_id);
    let delete_form = if is_owner {
        format!(
            r#"<form method="post" action="/pin/{id}/delete" onsubmit="return confirm('Delete this pin?');">
                    <button type="submit">Delete</button>
                </form>"#,
            id = pin.id
        )
    } else {
        String::new()
    };
    let description = if pin.description.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="pin-description">{}</p>"#, escape_html(&pin.description))
    };

    let body = format!(
        r#"        {banner}
        <article class="pin-detail">
            <img class="pin-image" src="{src}" alt="{alt}">
            <div class="pin-info">
                <h1>{title}</h1>
                {description}
                <div class="pin-owner"><img class="avatar" src="{avatar}" alt=""><span>{owner}</span></div>
                {delete_form}
                <a class="nav-link" href="/">Back to feed</a>
            </div>
        </article>"#,
        src = escape_html(&pin.image_url),
        alt = escape_html(&pin.alt),
        title = escape_html(&pin.title),
        avatar = escape_html(&pin.avatar_url),
        owner = escape_html(&pin.display_name),
    );

    render_page(
        PageLayout::new(&pin.title, body)
            .with_nav("", session.is_some())
            .with_style(PIN_STYLES),
    )
}

const PIN_STYLES: &str = r#"
        .pin-detail { max-width: 1016px; margin: 0 auto; display: flex; flex-wrap: wrap; border-radius: 32px; overflow: hidden; box-shadow: 0 8px 32px rgba(0, 0, 0, 0.1); }
        .pin-image { flex: 1 1 360px; max-width: 100%; object-fit: cover; }
        .pin-info { flex: 1 1 320px; padding: 2rem; display: flex; flex-direction: column; gap: 1rem; }
        .pin-info h1 { margin: 0; }
        .pin-owner { display: flex; align-items: center; gap: 0.6rem; font-weight: 600; }
        .avatar { width: 48px; height: 48px; border-radius: 50%; object-fit: cover; }
"#;

fn render_message_page(heading: &str, message: &str, signed_in: bool) -> String {
    let body = format!(
        r#"        <section class="panel">
            <h1>{heading}</h1>
            <p>{message}</p>
            <a class="nav-link" href="/">Back to feed</a>
        </section>"#,
        heading = escape_html(heading),
        message = escape_html(message),
    );
    render_page(PageLayout::new(heading, body).with_nav("", signed_in))
}
