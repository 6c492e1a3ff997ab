use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use sha2::{Digest, Sha512};
use time::Duration;
use tracing::warn;

pub const SESSION_COOKIE: &str = "session";

const SESSION_TTL: Duration = Duration::days(7);

/// Derive the cookie encryption key from the configured secret.
/// An empty secret yields a random key, so sessions end with the process.
pub fn session_key(secret: &str) -> Key {
    if secret.is_empty() {
        warn!("no secret_key configured; using a random session key");
        return Key::generate();
    }
    // Key::from takes the full 64-byte master key
    let master = Sha512::digest(secret.as_bytes());
    Key::from(master.as_slice())
}

/// Attach a session for `username` to the jar.
pub fn start_session(jar: PrivateCookieJar, username: &str, secure: bool) -> PrivateCookieJar {
    jar.add(
        Cookie::build(Cookie::new(SESSION_COOKIE, username.to_string()))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(SESSION_TTL)
            .build(),
    )
}

pub fn end_session(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/").build())
}

pub fn session_username(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty())
}

/// Username of a logged-in visitor; anonymous requests are sent to `/login`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OptionalUser(user) = OptionalUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        user.map(CurrentUser)
            .ok_or_else(|| Redirect::to("/login").into_response())
    }
}

/// Username of the visitor if a valid session cookie is present.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<String>);

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::<Key>::from_request_parts(parts, state).await?;
        Ok(OptionalUser(session_username(&jar)))
    }
}
