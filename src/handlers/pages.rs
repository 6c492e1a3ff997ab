use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};

use crate::auth::{CurrentUser, OptionalUser};
use crate::error::StockError;
use crate::router::StockcastState;
use crate::templates::{Page, render};

/// GET / -> home page, with account details when logged in.
pub async fn home(
    State(state): State<StockcastState>,
    OptionalUser(username): OptionalUser,
) -> Result<Response, StockError> {
    let user = match username {
        Some(name) => state.users.find_by_username(&name).await?,
        None => None,
    };
    Ok(render(Page::Index {
        user: user.as_ref(),
    })
    .into_response())
}

/// GET /dashboard -> account details; the session must still map to a user row.
pub async fn dashboard(
    State(state): State<StockcastState>,
    CurrentUser(username): CurrentUser,
) -> Result<Response, StockError> {
    let Some(user) = state.users.find_by_username(&username).await? else {
        return Ok(Redirect::to("/login").into_response());
    };
    Ok(render(Page::Index { user: Some(&user) }).into_response())
}

pub async fn prediction(CurrentUser(_): CurrentUser) -> Response {
    render(Page::Prediction).into_response()
}

pub async fn learning(
    State(state): State<StockcastState>,
    CurrentUser(username): CurrentUser,
) -> Result<Response, StockError> {
    let Some(user) = state.users.find_by_username(&username).await? else {
        return Ok(Redirect::to("/login").into_response());
    };
    Ok(render(Page::Learning { user: &user }).into_response())
}
