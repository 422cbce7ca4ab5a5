use lambda_http::{http::HeaderMap, http::StatusCode, Body, Response};

use crate::error::{ApiError, ApiResult};
use crate::gate::{self, Policy};
use crate::password;
use crate::response;
use crate::token;
use crate::types::{present, LoginRequest, Role, UserRequest, UserView};
use crate::users;
use crate::AppState;

/// POST /api/auth/login: accepts a username or an email in `username`.
pub async fn login(state: &AppState, body: &[u8]) -> ApiResult<Response<Body>> {
    let req: LoginRequest = response::parse_body(body)?;

    let (Some(login), Some(password)) = (
        present(&req.username),
        req.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::validation(
            "Email/Username and password are required",
        ));
    };

    tracing::info!("Login attempt for {}", login);

    let Some(user) = state.store.find_user_by_login(login).await? else {
        return Err(ApiError::Unauthenticated(
            "Invalid email/username or password".to_string(),
        ));
    };

    if !password::verify_password(password, &user.password_hash).await? {
        tracing::warn!("Wrong password for user {}", user.id);
        return Err(ApiError::Unauthenticated(
            "Invalid email/username or password".to_string(),
        ));
    }

    let token = state.tokens.issue(&user.id)?;
    let cookie = state
        .tokens
        .session_cookie(&token, state.config.cookie_secure);

    tracing::info!("Login successful for user {} ({})", user.id, user.role);

    let mut resp = response::data(StatusCode::OK, state.origin(), &UserView::from(&user))?;
    resp.headers_mut().insert(
        "Cache-Control",
        lambda_http::http::HeaderValue::from_static("no-store"),
    );
    response::with_cookie(resp, &cookie)
}

/// POST /api/auth/signup: self-service accounts always start as `user`.
pub async fn signup(state: &AppState, body: &[u8]) -> ApiResult<Response<Body>> {
    let req: UserRequest = response::parse_body(body)?;
    let user = users::insert_new_user(state, &req, Role::User).await?;

    let token = state.tokens.issue(&user.id)?;
    let cookie = state
        .tokens
        .session_cookie(&token, state.config.cookie_secure);

    let resp = response::data(StatusCode::CREATED, state.origin(), &UserView::from(&user))?;
    response::with_cookie(resp, &cookie)
}

/// POST /api/auth/logout
pub async fn logout(state: &AppState) -> ApiResult<Response<Body>> {
    let resp = response::message(StatusCode::OK, state.origin(), "Logged out")?;
    response::with_cookie(resp, &token::clearing_cookie(state.config.cookie_secure))
}

/// GET /api/auth/me
pub async fn me(state: &AppState, headers: &HeaderMap) -> ApiResult<Response<Body>> {
    let user = gate::authorize(state, headers, Policy::Authenticated).await?;
    response::data(StatusCode::OK, state.origin(), &UserView::from(&user))
}
