use chrono::Utc;
use lambda_http::{http::HeaderMap, http::StatusCode, Body, Response};

use crate::error::{ApiError, ApiResult};
use crate::gate::{self, Policy};
use crate::response;
use crate::types::{CreateProblemRequest, UpdateProblemRequest};
use crate::AppState;

/// POST /api/problems - open to everyone. A signed-in reporter becomes the
/// owner; a bad or missing token just means an ownerless report.
pub async fn create_problem(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> ApiResult<Response<Body>> {
    let req: CreateProblemRequest = response::parse_body(body)?;
    let owner = gate::identify(state, headers);
    let problem = req.into_problem(owner, Utc::now())?;

    state.store.put_problem(&problem).await?;
    tracing::info!(
        "Problem {} reported (owner: {})",
        problem.id,
        problem.user.as_deref().unwrap_or("none")
    );

    response::data(StatusCode::CREATED, state.origin(), &problem)
}

/// GET /api/problems - the caller's own reports
pub async fn list_my_problems(state: &AppState, headers: &HeaderMap) -> ApiResult<Response<Body>> {
    let user = gate::authorize(state, headers, Policy::Authenticated).await?;
    let problems = state.store.list_problems(Some(&user.id)).await?;
    response::data(StatusCode::OK, state.origin(), &problems)
}

/// GET /api/admin/problems
pub async fn list_all_problems(state: &AppState, headers: &HeaderMap) -> ApiResult<Response<Body>> {
    gate::authorize(state, headers, Policy::Admin).await?;
    let problems = state.store.list_problems(None).await?;
    response::data(StatusCode::OK, state.origin(), &problems)
}

/// PATCH /api/admin/problems/{id} - status and/or admin notes
pub async fn update_problem(
    state: &AppState,
    headers: &HeaderMap,
    problem_id: &str,
    body: &[u8],
) -> ApiResult<Response<Body>> {
    let admin = gate::authorize(state, headers, Policy::Admin).await?;
    let req: UpdateProblemRequest = response::parse_body(body)?;

    let mut problem = state
        .store
        .get_problem(problem_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Problem not found".to_string()))?;

    req.apply(&mut problem, Utc::now())?;
    state.store.put_problem(&problem).await?;

    tracing::info!(
        "Problem {} set to {} by {}",
        problem.id,
        problem.status.as_str(),
        admin.id
    );
    response::data(StatusCode::OK, state.origin(), &problem)
}
