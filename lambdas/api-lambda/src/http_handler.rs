use civic_shared::{
    auth,
    error::{ApiError, ApiResult},
    problems, queries, response, users, AppState,
};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, Response,
};
use std::sync::Arc;

/// Main Lambda handler - routes `/api/...` requests and turns every failure
/// into the JSON envelope.
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    tracing::info!(
        "API invoked - Method: {} Path: {}",
        event.method(),
        event.uri().path()
    );

    match route(&event, &state).await {
        Ok(resp) => {
            tracing::info!("Responded {}", resp.status().as_u16());
            Ok(resp)
        }
        Err(e) => e.into_response(state.origin()),
    }
}

async fn route(event: &Request, state: &AppState) -> ApiResult<Response<Body>> {
    let method = event.method();
    let headers = event.headers();
    let body: &[u8] = event.body();
    let path = event.uri().path();
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // Handle CORS preflight
    if *method == Method::OPTIONS {
        return response::preflight(state.origin());
    }

    match (method, parts.as_slice()) {
        // --- AUTH ---
        // POST /api/auth/login
        (&Method::POST, ["api", "auth", "login"]) => auth::login(state, body).await,
        (_, ["api", "auth", "login"]) => not_allowed(method, &["POST"]),
        // POST /api/auth/signup
        (&Method::POST, ["api", "auth", "signup"]) => auth::signup(state, body).await,
        (_, ["api", "auth", "signup"]) => not_allowed(method, &["POST"]),
        // POST /api/auth/logout
        (&Method::POST, ["api", "auth", "logout"]) => auth::logout(state).await,
        (_, ["api", "auth", "logout"]) => not_allowed(method, &["POST"]),
        // GET /api/auth/me
        (&Method::GET, ["api", "auth", "me"]) => auth::me(state, headers).await,
        (_, ["api", "auth", "me"]) => not_allowed(method, &["GET"]),

        // --- USERS (admin) ---
        (&Method::GET, ["api", "users"]) => users::list_users(state, headers).await,
        (&Method::POST, ["api", "users"]) => users::create_user(state, headers, body).await,
        (_, ["api", "users"]) => not_allowed(method, &["GET", "POST"]),
        (&Method::PUT, ["api", "users", user_id]) => {
            users::replace_user(state, headers, user_id, body).await
        }
        (&Method::PATCH, ["api", "users", user_id]) => {
            users::patch_user(state, headers, user_id, body).await
        }
        (&Method::DELETE, ["api", "users", user_id]) => {
            users::delete_user(state, headers, user_id).await
        }
        (_, ["api", "users", _]) => not_allowed(method, &["PUT", "PATCH", "DELETE"]),

        // --- PROBLEMS ---
        // POST /api/problems - public, owner attached when signed in
        (&Method::POST, ["api", "problems"]) => {
            problems::create_problem(state, headers, body).await
        }
        // GET /api/problems - caller's own reports
        (&Method::GET, ["api", "problems"]) => problems::list_my_problems(state, headers).await,
        (_, ["api", "problems"]) => not_allowed(method, &["GET", "POST"]),
        (&Method::GET, ["api", "admin", "problems"]) => {
            problems::list_all_problems(state, headers).await
        }
        (_, ["api", "admin", "problems"]) => not_allowed(method, &["GET"]),
        (&Method::PATCH, ["api", "admin", "problems", problem_id]) => {
            problems::update_problem(state, headers, problem_id, body).await
        }
        (_, ["api", "admin", "problems", _]) => not_allowed(method, &["PATCH"]),

        // --- QUERIES ---
        (&Method::POST, ["api", "queries"]) => queries::create_query(state, headers, body).await,
        // GET /api/queries[?my=true]
        (&Method::GET, ["api", "queries"]) => {
            let mine = event
                .uri()
                .query()
                .is_some_and(|q| q.split('&').any(|pair| pair == "my=true"));
            queries::list_queries(state, headers, mine).await
        }
        (_, ["api", "queries"]) => not_allowed(method, &["GET", "POST"]),
        (&Method::PATCH, ["api", "admin", "queries", query_id]) => {
            queries::update_query(state, headers, query_id, body).await
        }
        (_, ["api", "admin", "queries", _]) => not_allowed(method, &["PATCH"]),

        _ => {
            tracing::warn!("No route matched - Method: {} Path: {}", method, path);
            Err(ApiError::NotFound("Not found".to_string()))
        }
    }
}

fn not_allowed(method: &Method, allow: &'static [&'static str]) -> ApiResult<Response<Body>> {
    Err(ApiError::MethodNotAllowed {
        method: method.to_string(),
        allow,
    })
}
