use chrono::Utc;
use lambda_http::{http::HeaderMap, http::StatusCode, Body, Response};

use crate::error::{ApiError, ApiResult};
use crate::gate::{self, Policy};
use crate::password;
use crate::response;
use crate::types::{present, Role, User, UserRequest, UserView};
use crate::AppState;

/// Build and persist a new user. Used by public signup (always `Role::User`)
/// and by admin creation (requested role).
pub async fn insert_new_user(state: &AppState, req: &UserRequest, role: Role) -> ApiResult<User> {
    let (Some(name), Some(email), Some(username), Some(password)) = (
        present(&req.name),
        present(&req.email),
        present(&req.username),
        req.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::validation("Please provide all required fields"));
    };

    ensure_unique(state, email, username, None).await?;

    let now = Utc::now();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        username: username.to_string(),
        password_hash: password::hash_password(password).await?,
        role,
        created_at: now,
        updated_at: now,
    };
    state.store.put_user(&user).await?;

    tracing::info!("Created user {} ({}) with role {}", user.id, user.username, user.role);
    Ok(user)
}

/// Email and username are unique across users. `except` skips the user
/// being updated.
async fn ensure_unique(
    state: &AppState,
    email: &str,
    username: &str,
    except: Option<&str>,
) -> ApiResult<()> {
    let is_other = |user: &User| Some(user.id.as_str()) != except;

    if let Some(existing) = state.store.find_user_by_email(email).await? {
        if is_other(&existing) {
            let message = if except.is_some() {
                "Email already in use by another user"
            } else {
                "Email already in use"
            };
            return Err(ApiError::validation(message));
        }
    }

    if let Some(existing) = state.store.find_user_by_username(username).await? {
        if is_other(&existing) {
            let message = if except.is_some() {
                "Username already taken by another user"
            } else {
                "Username already taken"
            };
            return Err(ApiError::validation(message));
        }
    }

    Ok(())
}

async fn load_user(state: &AppState, user_id: &str) -> ApiResult<User> {
    state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// GET /api/users
pub async fn list_users(state: &AppState, headers: &HeaderMap) -> ApiResult<Response<Body>> {
    gate::authorize(state, headers, Policy::Admin).await?;

    let users: Vec<UserView> = state.store.list_users().await?.iter().map(UserView::from).collect();
    response::data(StatusCode::OK, state.origin(), &users)
}

/// POST /api/users
pub async fn create_user(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> ApiResult<Response<Body>> {
    gate::authorize(state, headers, Policy::Admin).await?;

    let req: UserRequest = response::parse_body(body)?;
    let role = Role::from_request(req.role.as_deref(), req.is_admin)?.unwrap_or_default();
    let user = insert_new_user(state, &req, role).await?;

    response::data(StatusCode::CREATED, state.origin(), &UserView::from(&user))
}

/// PUT /api/users/{id}: name, email and username are required; password and
/// role are optional.
pub async fn replace_user(
    state: &AppState,
    headers: &HeaderMap,
    user_id: &str,
    body: &[u8],
) -> ApiResult<Response<Body>> {
    gate::authorize(state, headers, Policy::Admin).await?;
    let mut user = load_user(state, user_id).await?;

    let req: UserRequest = response::parse_body(body)?;
    let (Some(name), Some(email), Some(username)) =
        (present(&req.name), present(&req.email), present(&req.username))
    else {
        return Err(ApiError::validation("Please provide name, email, and username"));
    };
    ensure_unique(state, email, username, Some(user_id)).await?;

    user.name = name.to_string();
    user.email = email.to_string();
    user.username = username.to_string();
    apply_credentials(&mut user, &req).await?;
    save(state, user).await
}

/// PATCH /api/users/{id}: only the provided fields change.
pub async fn patch_user(
    state: &AppState,
    headers: &HeaderMap,
    user_id: &str,
    body: &[u8],
) -> ApiResult<Response<Body>> {
    gate::authorize(state, headers, Policy::Admin).await?;
    let mut user = load_user(state, user_id).await?;

    let req: UserRequest = response::parse_body(body)?;
    if req.is_empty() {
        return Err(ApiError::validation("No update data provided"));
    }

    let blank = |field: &Option<String>| field.is_some() && present(field).is_none();
    if blank(&req.name) || blank(&req.email) || blank(&req.username) {
        return Err(ApiError::validation("Name, email, and username cannot be empty"));
    }

    let email = present(&req.email).unwrap_or(user.email.as_str()).to_string();
    let username = present(&req.username).unwrap_or(user.username.as_str()).to_string();
    ensure_unique(state, &email, &username, Some(user_id)).await?;

    if let Some(name) = present(&req.name) {
        user.name = name.to_string();
    }
    user.email = email;
    user.username = username;
    apply_credentials(&mut user, &req).await?;
    save(state, user).await
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    state: &AppState,
    headers: &HeaderMap,
    user_id: &str,
) -> ApiResult<Response<Body>> {
    let admin = gate::authorize(state, headers, Policy::Admin).await?;

    if !state.store.delete_user(user_id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!("User {} deleted by {}", user_id, admin.id);
    response::message(StatusCode::OK, state.origin(), "User deleted successfully")
}

/// Role and password changes shared by PUT and PATCH.
async fn apply_credentials(user: &mut User, req: &UserRequest) -> ApiResult<()> {
    if let Some(role) = Role::from_request(req.role.as_deref(), req.is_admin)? {
        user.role = role;
    }
    if let Some(password) = req.password.as_deref().filter(|p| !p.is_empty()) {
        user.password_hash = password::hash_password(password).await?;
    }
    Ok(())
}

async fn save(state: &AppState, mut user: User) -> ApiResult<Response<Body>> {
    user.updated_at = Utc::now();
    state.store.put_user(&user).await?;

    tracing::info!("Updated user {} (role {})", user.id, user.role);
    response::data(StatusCode::OK, state.origin(), &UserView::from(&user))
}
