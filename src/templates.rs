//! HTML pages bundled into the binary.
//!
//! Pages are plain HTML with `{{name}}` placeholders. Every substituted value is
//! escaped unless it is markup produced here.

use axum::response::Html;

use crate::db::DbUser;

const LAYOUT: &str = include_str!("../templates/layout.html");
const INDEX: &str = include_str!("../templates/index.html");
const LOGIN: &str = include_str!("../templates/login.html");
const SIGNUP: &str = include_str!("../templates/signup.html");
const PREDICTION: &str = include_str!("../templates/prediction.html");
const LEARNING: &str = include_str!("../templates/learning.html");

pub enum Page<'a> {
    Index { user: Option<&'a DbUser> },
    Login { error: Option<&'a str> },
    Signup { error: Option<&'a str> },
    Prediction,
    Learning { user: &'a DbUser },
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Substitute placeholders in one left-to-right pass; inserted values are never rescanned.
/// Unknown placeholders are left as written.
fn fill(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &after[..close];
        match vars.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..open + 2 + close + 2]),
        }
        rest = &after[close + 2..];
    }
    out.push_str(rest);
    out
}

fn nav(logged_in: bool) -> String {
    let links: &[(&str, &str)] = if logged_in {
        &[
            ("/", "Home"),
            ("/dashboard", "Dashboard"),
            ("/prediction", "Prediction"),
            ("/learning", "Learning"),
            ("/logout", "Log out"),
        ]
    } else {
        &[("/", "Home"), ("/login", "Log in"), ("/signup", "Sign up")]
    };
    links
        .iter()
        .map(|(href, label)| format!(r#"<a href="{href}">{label}</a>"#))
        .collect()
}

fn user_block(user: Option<&DbUser>) -> String {
    let Some(user) = user else {
        return r#"<p><a href="/login">Log in</a> or <a href="/signup">create an account</a> to run predictions.</p>"#
            .to_string();
    };
    let optional = |v: &Option<String>| v.as_deref().map(escape).unwrap_or_else(|| "-".into());
    format!(
        r#"<section class="card">
  <h2>Welcome, {username}</h2>
  <table>
    <tr><th>Username</th><td>{username}</td></tr>
    <tr><th>Mobile</th><td>{mobile}</td></tr>
    <tr><th>Full name</th><td>{full_name}</td></tr>
    <tr><th>Email</th><td>{email}</td></tr>
    <tr><th>Member since</th><td>{created}</td></tr>
  </table>
  <p><a href="/prediction">Go to predictions</a></p>
</section>"#,
        username = escape(&user.username),
        mobile = escape(&user.mobile),
        full_name = optional(&user.full_name),
        email = optional(&user.email),
        created = user.created_at.format("%Y-%m-%d"),
    )
}

pub fn render(page: Page<'_>) -> Html<String> {
    let (title, logged_in, content) = match page {
        Page::Index { user } => (
            "Home",
            user.is_some(),
            fill(INDEX, &[("user_block", user_block(user))]),
        ),
        Page::Login { error } => (
            "Log in",
            false,
            fill(LOGIN, &[("error", escape(error.unwrap_or_default()))]),
        ),
        Page::Signup { error } => (
            "Sign up",
            false,
            fill(SIGNUP, &[("error", escape(error.unwrap_or_default()))]),
        ),
        Page::Prediction => ("Prediction", true, PREDICTION.to_string()),
        Page::Learning { user } => (
            "Learning",
            true,
            fill(LEARNING, &[("username", escape(&user.username))]),
        ),
    };

    Html(fill(
        LAYOUT,
        &[
            ("title", title.to_string()),
            ("nav", nav(logged_in)),
            ("content", content),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user() -> DbUser {
        DbUser {
            id: 1,
            username: "<alice>".into(),
            password: String::new(),
            mobile: "555".into(),
            full_name: None,
            email: Some("a@example.com".into()),
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<b a="x">&'"#), "&lt;b a=&quot;x&quot;&gt;&amp;&#x27;");
    }

    #[test]
    fn login_error_is_rendered() {
        let Html(body) = render(Page::Login {
            error: Some("Invalid credentials."),
        });
        assert!(body.contains("Invalid credentials."));
        assert!(body.contains("<title>Log in"));
        assert!(!body.contains("{{"));
    }

    #[test]
    fn index_shows_escaped_user() {
        let u = user();
        let Html(body) = render(Page::Index { user: Some(&u) });
        assert!(body.contains("Welcome, &lt;alice&gt;"));
        assert!(body.contains("a@example.com"));
        assert!(body.contains(r#"href="/logout""#));
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let mut u = user();
        u.username = "{{nav}}{{title}}".into();
        let Html(body) = render(Page::Learning { user: &u });
        assert!(body.contains("Welcome, {{nav}}{{title}}"));
        assert_eq!(body.matches(r#"href="/logout""#).count(), 1);
    }

    #[test]
    fn fill_leaves_unknown_and_unterminated_placeholders() {
        let vars = [("a", "{{b}}".to_string())];
        assert_eq!(fill("x{{a}}y{{b}}z{{c", &vars), "x{{b}}y{{b}}z{{c");
    }

    #[test]
    fn anonymous_index_links_to_login() {
        let Html(body) = render(Page::Index { user: None });
        assert!(body.contains(r#"href="/signup""#));
        assert!(!body.contains("Log out"));
    }
}
