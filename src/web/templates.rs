use std::borrow::Cow;

use chrono::{Datelike, Utc};

const PAGE_BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #ffffff; color: #111111; }
        a { color: inherit; }
        .top-nav { position: sticky; top: 0; z-index: 10; display: flex; align-items: center; gap: 0.75rem; padding: 0.75rem 1.25rem; background: #ffffff; border-bottom: 1px solid #efefef; }
        .brand { color: #e60023; font-weight: 800; font-size: 1.35rem; text-decoration: none; }
        .nav-link { padding: 0.6rem 1rem; border-radius: 999px; text-decoration: none; font-weight: 600; }
        .nav-link:hover { background: #efefef; }
        .nav-link.primary { background: #111111; color: #ffffff; }
        .search { flex: 1; display: flex; }
        .search input { width: 100%; padding: 0.75rem 1.1rem; border-radius: 999px; border: none; background: #efefef; font-size: 1rem; box-sizing: border-box; }
        .search input:focus { outline: 3px solid rgba(0, 132, 255, 0.4); }
        .nav-form { margin: 0; }
        .nav-form button { background: transparent; color: #111111; padding: 0.6rem 1rem; }
        .nav-form button:hover { background: #efefef; }
        main { padding: 1.5rem; box-sizing: border-box; }
        .panel { max-width: 640px; margin: 0 auto; background: #ffffff; border-radius: 24px; padding: 2rem; box-shadow: 0 8px 32px rgba(0, 0, 0, 0.1); box-sizing: border-box; }
        label { display: block; margin: 1rem 0 0.4rem; font-weight: 600; }
        input[type="text"], input[type="email"], input[type="password"], textarea { width: 100%; padding: 0.8rem; border-radius: 16px; border: 2px solid #cdcdcd; font-size: 1rem; box-sizing: border-box; font-family: inherit; }
        textarea { min-height: 6rem; resize: vertical; }
        button { padding: 0.75rem 1.25rem; border: none; border-radius: 999px; background: #e60023; color: #ffffff; font-weight: 700; font-size: 1rem; cursor: pointer; }
        button:hover { background: #ad081b; }
        button.secondary { background: #efefef; color: #111111; }
        .error-box { margin: 0 auto 1rem; max-width: 640px; padding: 0.9rem 1.1rem; border-radius: 16px; background: #fde8ea; color: #9b0015; }
        .notice-box { margin: 0 auto 1rem; max-width: 640px; padding: 0.9rem 1.1rem; border-radius: 16px; background: #e7f6ec; color: #14532d; }
        .app-footer { margin: 3rem 0 1.5rem; text-align: center; font-size: 0.85rem; color: #767676; }
"#;

/// Top bar shown on every page except the login screen.
pub struct NavBar<'a> {
    pub search_term: &'a str,
    pub signed_in: bool,
}

pub struct PageLayout<'a> {
    pub meta_title: &'a str,
    pub nav: Option<NavBar<'a>>,
    pub body_html: Cow<'a, str>,
    pub extra_style_blocks: Vec<Cow<'a, str>>,
    pub body_scripts: Vec<Cow<'a, str>>,
}

impl<'a> PageLayout<'a> {
    pub fn new(meta_title: &'a str, body_html: impl Into<Cow<'a, str>>) -> Self {
        Self {
            meta_title,
            nav: None,
            body_html: body_html.into(),
            extra_style_blocks: Vec::new(),
            body_scripts: Vec::new(),
        }
    }

    pub fn with_nav(mut self, search_term: &'a str, signed_in: bool) -> Self {
        self.nav = Some(NavBar {
            search_term,
            signed_in,
        });
        self
    }

    pub fn with_style(mut self, block: impl Into<Cow<'a, str>>) -> Self {
        self.extra_style_blocks.push(block.into());
        self
    }

    pub fn with_script(mut self, script: impl Into<Cow<'a, str>>) -> Self {
        self.body_scripts.push(script.into());
        self
    }
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        meta_title,
        nav,
        body_html,
        extra_style_blocks,
        body_scripts,
    } = layout;

    let nav_html = nav.map(render_nav).unwrap_or_default();

    let styles = std::iter::once(Cow::Borrowed(PAGE_BASE_STYLES))
        .chain(extra_style_blocks)
        .map(|block| block.into_owned())
        .collect::<Vec<_>>()
        .join("\n");

    let scripts = body_scripts
        .into_iter()
        .map(|script| format!("<script>{script}</script>"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{meta_title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
{styles}
    </style>
</head>
<body>
{nav_html}
    <main>
{body_html}
        {footer}
    </main>
{scripts}
</body>
</html>"#,
        meta_title = escape_html(meta_title),
        footer = render_footer(),
    )
}

fn render_nav(nav: NavBar<'_>) -> String {
    let account_links = if nav.signed_in {
        r#"<a class="nav-link primary" href="/create">Create</a>
        <a class="nav-link" href="/profile">Profile</a>
        <form class="nav-form" method="post" action="/logout"><button type="submit">Log out</button></form>"#
    } else {
        r#"<a class="nav-link primary" href="/login">Log in</a>"#
    };

    format!(
        r#"    <nav class="top-nav">
        <a class="brand" href="/">Pictionary</a>
        <a class="nav-link" href="/">Home</a>
        <form class="search" method="get" action="/">
            <input type="search" name="q" value="{term}" placeholder="Search pins" aria-label="Search pins">
        </form>
        {account_links}
    </nav>"#,
        term = escape_html(nav.search_term),
    )
}

/// Which form the login page opens with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoginMode {
    SignIn,
    SignUp,
}

/// Prefilled values and feedback for the login page.
#[derive(Debug, Default)]
pub struct LoginView<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub error: Option<&'a str>,
    pub notice: Option<&'a str>,
}

pub fn render_login_page(mode: LoginMode, view: &LoginView<'_>) -> String {
    let (signin_hidden, signup_hidden) = match mode {
        LoginMode::SignIn => ("", " hidden"),
        LoginMode::SignUp => (" hidden", ""),
    };
    let feedback = [
        view.error.map(error_banner),
        view.notice.map(notice_banner),
    ]
    .into_iter()
    .flatten()
    .collect::<String>();

    let body = format!(
        r##"        <section class="panel auth-panel">
            <h1>Welcome to Pictionary</h1>
            <p class="tagline">Find new ideas to try</p>
            {feedback}
            <form id="signin-form" class="auth-form{signin_hidden}" method="post" action="/login">
                <label for="signin-email">Email</label>
                <input id="signin-email" type="email" name="email" value="{email}" required>
                <label for="signin-password">Password</label>
                <input id="signin-password" type="password" name="password" minlength="6" required>
                <button type="submit">Log in</button>
                <p class="switch">Not on Pictionary yet? <a href="#" data-show="signup-form">Sign up</a></p>
            </form>
            <form id="signup-form" class="auth-form{signup_hidden}" method="post" action="/signup">
                <label for="signup-email">Email</label>
                <input id="signup-email" type="email" name="email" value="{email}" required>
                <label for="signup-password">Password</label>
                <input id="signup-password" type="password" name="password" minlength="6" required>
                <label for="signup-username">Username</label>
                <input id="signup-username" type="text" name="username" value="{username}" required>
                <label for="signup-first">First name</label>
                <input id="signup-first" type="text" name="first_name" value="{first_name}" required>
                <label for="signup-last">Last name</label>
                <input id="signup-last" type="text" name="last_name" value="{last_name}" required>
                <button type="submit">Continue</button>
                <p class="switch">Already a member? <a href="#" data-show="signin-form">Log in</a></p>
            </form>
        </section>"##,
        email = escape_html(view.email),
        username = escape_html(view.username),
        first_name = escape_html(view.first_name),
        last_name = escape_html(view.last_name),
    );

    render_page(
        PageLayout::new("Log in | Pictionary", body)
            .with_style(LOGIN_STYLES)
            .with_script(LOGIN_SCRIPT),
    )
}

const LOGIN_STYLES: &str = r#"
        main { min-height: 90vh; display: flex; flex-direction: column; justify-content: center; background: linear-gradient(135deg, #fff0f2, #f5f5f5); }
        .auth-panel { max-width: 420px; text-align: center; }
        .auth-panel h1 { margin: 0; font-size: 1.8rem; }
        .tagline { color: #5f5f5f; margin: 0.5rem 0 1.5rem; }
        .auth-form { text-align: left; }
        .auth-form button { width: 100%; margin-top: 1.5rem; }
        .switch { text-align: center; font-size: 0.9rem; }
        .hidden { display: none; }
"#;

const LOGIN_SCRIPT: &str = r#"
document.querySelectorAll('[data-show]').forEach(function (link) {
    link.addEventListener('click', function (event) {
        event.preventDefault();
        document.querySelectorAll('.auth-form').forEach(function (form) {
            form.classList.toggle('hidden', form.id !== link.dataset.show);
        });
    });
});
"#;

/// Sends the user back to `/login` once the server no longer accepts their
/// session. Runs when the tab becomes visible again and on focus, at most
/// once every 10 seconds for the latter.
pub const SESSION_CHECK_SCRIPT: &str = r#"
(function () {
    var lastFocusCheck = 0;
    function checkSession() {
        fetch('/api/session', { credentials: 'same-origin', cache: 'no-store' })
            .then(function (response) {
                if (response.status === 401) {
                    window.location.href = '/login';
                }
            })
            .catch(function () {});
    }
    document.addEventListener('visibilitychange', function () {
        if (document.visibilityState === 'visible') {
            setTimeout(checkSession, 300);
        }
    });
    window.addEventListener('focus', function () {
        var now = Date.now();
        if (now - lastFocusCheck > 10000) {
            lastFocusCheck = now;
            checkSession();
        }
    });
})();
"#;

pub fn error_banner(message: &str) -> String {
    format!(
        r#"<div class="error-box" role="alert">{}</div>"#,
        escape_html(message)
    )
}

pub fn notice_banner(message: &str) -> String {
    format!(
        r#"<div class="notice-box">{}</div>"#,
        escape_html(message)
    )
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(r#"<footer class="app-footer">© {current_year} Pictionary</footer>"#)
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn nav_keeps_search_term_escaped() {
        let html = render_page(PageLayout::new("Home", "<p>hi</p>").with_nav("<b>cats", true));
        assert!(html.contains(r#"value="&lt;b&gt;cats""#));
        assert!(html.contains(r#"action="/logout""#));
    }

    #[test]
    fn login_page_opens_requested_form() {
        let html = render_login_page(
            LoginMode::SignUp,
            &LoginView {
                error: Some("Username is required"),
                ..LoginView::default()
            },
        );
        assert!(html.contains(r#"class="auth-form hidden" method="post" action="/login""#));
        assert!(html.contains(r#"class="auth-form" method="post" action="/signup""#));
        assert!(html.contains("Username is required"));
    }
}
