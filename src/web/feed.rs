use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    pins::{
        feed::{FeedItem, load_feed},
        layout::{assign_columns, column_count},
        search::filter_items,
    },
    web::{
        AppState,
        responses::json_error,
        session::{AuthSession, MaybeSession},
        templates::{PageLayout, SESSION_CHECK_SCRIPT, error_banner, escape_html, render_page},
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct FeedLayout {
    pub columns: usize,
    pub count: usize,
    pub html: String,
}

pub async fn home_page(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(query): Query<FeedQuery>,
) -> Result<Html<String>, Redirect> {
    let term = query.q.unwrap_or_default();
    let client = state.client_for(Some(&session));

    let (grid_html, columns, notice) = match load_feed(&client, &client, state.bucket()).await {
        Ok(items) => {
            let items = filter_items(&items, &term);
            let columns = column_count(query.width);
            let notice = empty_notice(&items, &term);
            (render_grid(&items, columns), columns, notice)
        }
        Err(err) if err.is_session_expired() => return Err(Redirect::to("/login")),
        Err(err) => {
            error!(?err, "failed to load feed");
            (
                String::new(),
                column_count(None),
                error_banner("Error loading pins. Please try again later."),
            )
        }
    };

    let body = format!(
        r#"        {notice}
        <div id="masonry" class="masonry" data-columns="{columns}" data-query="{query}">
{grid_html}
        </div>"#,
        query = escape_html(&term),
    );

    Ok(Html(render_page(
        PageLayout::new("Pictionary", body)
            .with_nav(&term, true)
            .with_style(GRID_STYLES)
            .with_script(MASONRY_SCRIPT)
            .with_script(SESSION_CHECK_SCRIPT),
    )))
}

/// Grid markup for the caller's viewport width, used when the page script
/// notices a breakpoint change.
pub async fn feed_layout(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Query(query): Query<FeedQuery>,
) -> Response {
    let client = state.client_for(session.as_ref());
    let items = match load_feed(&client, &client, state.bucket()).await {
        Ok(items) => items,
        Err(err) if err.is_session_expired() => {
            return json_error(StatusCode::UNAUTHORIZED, "Session expired").into_response();
        }
        Err(err) => {
            error!(?err, "failed to load feed layout");
            return json_error(StatusCode::BAD_GATEWAY, "Error loading pins").into_response();
        }
    };

    let items = filter_items(&items, query.q.as_deref().unwrap_or_default());
    let columns = column_count(query.width);
    Json(FeedLayout {
        columns,
        count: items.len(),
        html: render_grid(&items, columns),
    })
    .into_response()
}

fn empty_notice(items: &[FeedItem], term: &str) -> String {
    if !items.is_empty() {
        return String::new();
    }
    if term.trim().is_empty() {
        r#"<p class="empty">No pins yet. <a href="/create">Create the first one</a>.</p>"#
            .to_string()
    } else {
        format!(
            r#"<p class="empty">No pins match "{}".</p>"#,
            escape_html(term.trim())
        )
    }
}

pub fn render_grid(items: &[FeedItem], columns: usize) -> String {
    assign_columns(items, columns)
        .iter()
        .map(|column| {
            let cards = column.iter().map(render_card).collect::<String>();
            format!(r#"            <div class="masonry-column">{cards}</div>"#)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_card(item: &FeedItem) -> String {
    format!(
        r#"<a class="pin-card" href="/pin/{id}">
                <img src="{src}" alt="{alt}" style="height: {height}px" loading="lazy">
                <span class="pin-overlay">
                    <span class="pin-title">{title}</span>
                    <span class="pin-owner"><img class="avatar" src="{avatar}" alt="">{owner}</span>
                </span>
            </a>"#,
        id = item.id,
        src = escape_html(&item.image_url),
        alt = escape_html(&item.alt),
        height = item.height,
        title = escape_html(&item.title),
        avatar = escape_html(&item.avatar_url),
        owner = escape_html(&item.display_name),
    )
}

pub const GRID_STYLES: &str = r#"
        .masonry { display: flex; gap: 16px; align-items: flex-start; }
        .masonry-column { flex: 1; display: flex; flex-direction: column; gap: 16px; min-width: 0; }
        .pin-card { position: relative; display: block; border-radius: 16px; overflow: hidden; background: #efefef; }
        .pin-card > img { display: block; width: 100%; object-fit: cover; }
        .pin-overlay { position: absolute; inset: 0; display: flex; flex-direction: column; justify-content: flex-end; gap: 0.4rem; padding: 0.9rem; background: linear-gradient(transparent 55%, rgba(0, 0, 0, 0.55)); color: #ffffff; opacity: 0; transition: opacity 0.15s ease; }
        .pin-card:hover .pin-overlay { opacity: 1; }
        .pin-title { font-weight: 700; }
        .pin-owner { display: flex; align-items: center; gap: 0.4rem; font-size: 0.85rem; }
        .avatar { width: 28px; height: 28px; border-radius: 50%; object-fit: cover; }
        .empty { text-align: center; color: #5f5f5f; margin-top: 3rem; }
"#;

/// Re-requests the grid when a resize crosses a column breakpoint.
const MASONRY_SCRIPT: &str = r#"
(function () {
    var grid = document.getElementById('masonry');
    if (!grid) { return; }
    function columnsFor(width) {
        if (width < 640) { return 1; }
        if (width < 768) { return 2; }
        if (width < 1024) { return 3; }
        if (width < 1280) { return 4; }
        return 5;
    }
    function relayout() {
        var width = window.innerWidth;
        if (String(columnsFor(width)) === grid.dataset.columns) { return; }
        var params = new URLSearchParams({ width: String(width), q: grid.dataset.query || '' });
        fetch('/api/feed?' + params.toString(), { credentials: 'same-origin' })
            .then(function (response) {
                if (response.status === 401) {
                    window.location.href = '/login';
                    return null;
                }
                return response.ok ? response.json() : null;
            })
            .then(function (layout) {
                if (!layout) { return; }
                grid.innerHTML = layout.html;
                grid.dataset.columns = String(layout.columns);
            })
            .catch(function () {});
    }
    var timer = null;
    window.addEventListener('resize', function () {
        clearTimeout(timer);
        timer = setTimeout(relayout, 250);
    });
    relayout();
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(title: &str) -> FeedItem {
        FeedItem {
            id: Uuid::new_v4(),
            image_url: "https://abcd.supabase.co/storage/v1/object/public/images/1.png".to_string(),
            alt: title.to_string(),
            title: title.to_string(),
            description: String::new(),
            display_name: "mira".to_string(),
            avatar_url: "https://example.com/a.png".to_string(),
            height: 300,
            storage_path: "1.png".to_string(),
            owner_id: Uuid::nil(),
        }
    }

    #[test]
    fn grid_has_one_column_block_per_column() {
        let items = vec![item("a"), item("b"), item("c")];
        let html = render_grid(&items, 2);
        assert_eq!(html.matches(r#"class="masonry-column""#).count(), 2);
        assert_eq!(html.matches(r#"class="pin-card""#).count(), 3);
    }

    #[test]
    fn card_escapes_user_text() {
        let html = render_card(&item("<script>alert(1)</script>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("height: 300px"));
    }

    #[test]
    fn empty_states() {
        assert!(empty_notice(&[], "").contains("No pins yet"));
        assert!(empty_notice(&[], " cats ").contains(r#"No pins match "cats""#));
        assert!(empty_notice(&[item("a")], "a").is_empty());
    }
}
