use lambda_http::http::HeaderMap;

use crate::error::{ApiError, ApiResult};
use crate::token;
use crate::types::{Role, User};
use crate::AppState;

/// Which roles a protected operation accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Admin,
    EnumeratorOrAdmin,
    Authenticated,
}

impl Policy {
    pub fn allows(&self, role: Role) -> bool {
        match self {
            Policy::Admin => role == Role::Admin,
            Policy::EnumeratorOrAdmin => matches!(role, Role::Enumerator | Role::Admin),
            Policy::Authenticated => true,
        }
    }

    fn denial(&self) -> &'static str {
        match self {
            Policy::Admin => "Admin access required",
            Policy::EnumeratorOrAdmin => "Enumerator or admin access required",
            Policy::Authenticated => "Not authorized",
        }
    }
}

/// Run the gate: token → claims → user → effective role → policy.
///
/// 401 when the token is missing, invalid, expired, or names a user that no
/// longer exists; 403 when the user's role is outside the policy.
pub async fn authorize(state: &AppState, headers: &HeaderMap, policy: Policy) -> ApiResult<User> {
    let token = token::token_from_headers(headers)
        .ok_or_else(|| ApiError::Unauthenticated("Not authenticated".to_string()))?;

    let claims = state.tokens.verify(&token).map_err(|e| {
        tracing::warn!("Rejected token: {}", e);
        ApiError::Unauthenticated("Invalid or expired token".to_string())
    })?;

    let user = state.store.get_user(&claims.id).await?.ok_or_else(|| {
        tracing::warn!("Token names unknown user {}", claims.id);
        ApiError::Unauthenticated("User not found".to_string())
    })?;

    if !policy.allows(user.role) {
        tracing::warn!(
            "User {} with role {} denied by {:?} policy",
            user.id,
            user.role,
            policy
        );
        return Err(ApiError::Forbidden(policy.denial().to_string()));
    }

    Ok(user)
}

/// Optional identity for public endpoints: the caller's user id when a valid
/// token is present. Token problems are ignored, never reported.
pub fn identify(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let token = token::token_from_headers(headers)?;
    match state.tokens.verify(&token) {
        Ok(claims) => Some(claims.id),
        Err(e) => {
            tracing::debug!("Ignoring unusable token on public endpoint: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::{MemoryStore, Store};
    use chrono::Utc;
    use lambda_http::http::{HeaderValue, StatusCode};
    use std::sync::Arc;

    async fn state_with_users() -> Arc<AppState> {
        let config = Config::from_lookup(|name| match name {
            "JWT_SECRET" => Some("gate-secret".to_string()),
            _ => None,
        })
        .unwrap();
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        for (id, role) in [
            ("user-1", Role::User),
            ("enum-1", Role::Enumerator),
            ("admin-1", Role::Admin),
        ] {
            store
                .put_user(&User {
                    id: id.into(),
                    name: id.into(),
                    email: format!("{}@example.org", id),
                    username: id.into(),
                    password_hash: String::new(),
                    role,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }
        AppState::new(config, store).unwrap()
    }

    fn cookie_for(state: &AppState, user_id: &str) -> HeaderMap {
        let token = state.tokens.issue(user_id).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "Cookie",
            HeaderValue::from_str(&format!("token={}", token)).unwrap(),
        );
        headers
    }

    async fn status_of(state: &AppState, headers: &HeaderMap, policy: Policy) -> StatusCode {
        match authorize(state, headers, policy).await {
            Ok(_) => StatusCode::OK,
            Err(e) => e.status(),
        }
    }

    #[test]
    fn test_policy_table() {
        assert!(Policy::Admin.allows(Role::Admin));
        assert!(!Policy::Admin.allows(Role::Enumerator));
        assert!(!Policy::Admin.allows(Role::User));
        assert!(Policy::EnumeratorOrAdmin.allows(Role::Enumerator));
        assert!(Policy::EnumeratorOrAdmin.allows(Role::Admin));
        assert!(!Policy::EnumeratorOrAdmin.allows(Role::User));
        assert!(Policy::Authenticated.allows(Role::User));
    }

    #[tokio::test]
    async fn test_missing_or_bad_token_is_401() {
        let state = state_with_users().await;

        let empty = HeaderMap::new();
        assert_eq!(status_of(&state, &empty, Policy::Authenticated).await, StatusCode::UNAUTHORIZED);

        let mut tampered = HeaderMap::new();
        tampered.insert("Cookie", HeaderValue::from_static("token=abc.def.ghi"));
        assert_eq!(status_of(&state, &tampered, Policy::Admin).await, StatusCode::UNAUTHORIZED);

        let ghost = cookie_for(&state, "deleted-user");
        assert_eq!(status_of(&state, &ghost, Policy::Authenticated).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_role_checks() {
        let state = state_with_users().await;
        let user = cookie_for(&state, "user-1");
        let enumerator = cookie_for(&state, "enum-1");
        let admin = cookie_for(&state, "admin-1");

        assert_eq!(status_of(&state, &user, Policy::Admin).await, StatusCode::FORBIDDEN);
        assert_eq!(status_of(&state, &enumerator, Policy::Admin).await, StatusCode::FORBIDDEN);
        assert_eq!(status_of(&state, &user, Policy::EnumeratorOrAdmin).await, StatusCode::FORBIDDEN);
        assert_eq!(status_of(&state, &enumerator, Policy::EnumeratorOrAdmin).await, StatusCode::OK);
        assert_eq!(status_of(&state, &admin, Policy::EnumeratorOrAdmin).await, StatusCode::OK);
        assert_eq!(status_of(&state, &admin, Policy::Admin).await, StatusCode::OK);
        assert_eq!(status_of(&state, &user, Policy::Authenticated).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_expired_token_is_401() {
        let state = state_with_users().await;
        let stale = state
            .tokens
            .issue_at("admin-1", Utc::now() - chrono::Duration::days(31))
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "Cookie",
            HeaderValue::from_str(&format!("token={}", stale)).unwrap(),
        );

        let err = authorize(&state, &headers, Policy::Admin).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Invalid or expired token");
        assert_eq!(identify(&state, &headers), None);
    }

    #[tokio::test]
    async fn test_identify_ignores_bad_tokens() {
        let state = state_with_users().await;
        assert_eq!(identify(&state, &cookie_for(&state, "user-1")).as_deref(), Some("user-1"));

        let mut bad = HeaderMap::new();
        bad.insert("Cookie", HeaderValue::from_static("token=nonsense"));
        assert_eq!(identify(&state, &bad), None);
        assert_eq!(identify(&state, &HeaderMap::new()), None);
    }
}
