use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::session::{end_session, start_session};
use crate::auth::{hash_password, verify_password};
use crate::db::NewUser;
use crate::error::StockError;
use crate::router::StockcastState;
use crate::templates::{Page, render};

const INVALID_CREDENTIALS: &str = "Invalid credentials.";
const MISSING_FIELDS: &str = "All fields are required.";

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub mobile: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Trimmed value, or `None` when absent or blank.
fn filled(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn signup_form() -> Response {
    render(Page::Signup { error: None }).into_response()
}

/// POST /signup -> create the account and send the visitor to the login page.
pub async fn signup(
    State(state): State<StockcastState>,
    Form(form): Form<SignupForm>,
) -> Result<Response, StockError> {
    let (Some(username), Some(password), Some(mobile)) = (
        filled(form.username),
        form.password.filter(|p| !p.is_empty()),
        filled(form.mobile),
    ) else {
        return Ok(render(Page::Signup {
            error: Some(MISSING_FIELDS),
        })
        .into_response());
    };

    if state.users.find_by_username(&username).await?.is_some() {
        return Ok(render(Page::Signup {
            error: Some("Username already exists."),
        })
        .into_response());
    }

    let iterations = state.password_iterations;
    let hashed = tokio::task::spawn_blocking(move || hash_password(&password, iterations))
        .await
        .map_err(|e| StockError::Io(std::io::Error::other(e)))??;

    let new_user = NewUser {
        username: username.clone(),
        password: hashed,
        mobile,
        full_name: filled(form.full_name),
        email: filled(form.email),
    };

    match state.users.create(new_user).await {
        Ok(id) => {
            info!(id, username = %username, "user signed up");
            Ok(Redirect::to("/login").into_response())
        }
        Err(e @ (StockError::UsernameTaken | StockError::EmailTaken)) => {
            let message = e.to_string();
            Ok(render(Page::Signup {
                error: Some(&message),
            })
            .into_response())
        }
        Err(e) => Err(e),
    }
}

pub async fn login_form() -> Response {
    render(Page::Login { error: None }).into_response()
}

/// POST /login -> start a session on matching credentials.
pub async fn login(
    State(state): State<StockcastState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, StockError> {
    let invalid = || {
        render(Page::Login {
            error: Some(INVALID_CREDENTIALS),
        })
        .into_response()
    };

    let (Some(username), Some(password)) = (filled(form.username), form.password) else {
        return Ok(invalid());
    };
    let Some(user) = state.users.find_by_username(&username).await? else {
        warn!(username = %username, "login for unknown user");
        return Ok(invalid());
    };

    let stored = user.password.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .unwrap_or(false);
    if !matches {
        warn!(username = %username, "login with wrong password");
        return Ok(invalid());
    }

    state.users.touch_last_login(user.id, Utc::now()).await?;
    info!(id = user.id, username = %username, "user logged in");

    let jar = start_session(jar, &user.username, state.secure_cookie);
    Ok((jar, Redirect::to("/")).into_response())
}

/// GET /logout -> drop the session cookie.
pub async fn logout(jar: PrivateCookieJar) -> Response {
    (end_session(jar), Redirect::to("/")).into_response()
}
