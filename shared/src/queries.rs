use chrono::Utc;
use lambda_http::{http::HeaderMap, http::StatusCode, Body, Response};
use std::collections::HashMap;

use crate::error::{ApiError, ApiResult};
use crate::gate::{self, Policy};
use crate::response;
use crate::types::{Collector, CreateQueryRequest, Query, QueryView, UpdateQueryRequest, User};
use crate::AppState;

/// POST /api/queries - enumerators and admins only. The gate runs before the
/// body is looked at, so a rejected caller never persists anything.
pub async fn create_query(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> ApiResult<Response<Body>> {
    let collector = gate::authorize(state, headers, Policy::EnumeratorOrAdmin).await?;

    let req: CreateQueryRequest = response::parse_body(body)?;
    let query = req.into_query(&collector.id, Utc::now())?;
    state.store.put_query(&query).await?;

    tracing::info!(
        "Query {} ({}, {}) collected by {}",
        query.id,
        query.category.as_str(),
        query.urgency.as_str(),
        collector.id
    );

    let view = QueryView {
        collected_by: Collector::resolve(&query.collected_by, Some(&collector)),
        query,
    };
    response::data(StatusCode::CREATED, state.origin(), &view)
}

/// GET /api/queries - every query for admins; with `mine`, only the ones the
/// caller collected (enumerators and admins).
pub async fn list_queries(
    state: &AppState,
    headers: &HeaderMap,
    mine: bool,
) -> ApiResult<Response<Body>> {
    let policy = if mine {
        Policy::EnumeratorOrAdmin
    } else {
        Policy::Admin
    };
    let user = gate::authorize(state, headers, policy).await?;

    let queries = state
        .store
        .list_queries(mine.then_some(user.id.as_str()))
        .await?;
    let views = populate(state, queries).await?;

    response::data(StatusCode::OK, state.origin(), &views)
}

/// PATCH /api/admin/queries/{id} - status and/or admin notes
pub async fn update_query(
    state: &AppState,
    headers: &HeaderMap,
    query_id: &str,
    body: &[u8],
) -> ApiResult<Response<Body>> {
    let admin = gate::authorize(state, headers, Policy::Admin).await?;
    let req: UpdateQueryRequest = response::parse_body(body)?;

    let mut query = state
        .store
        .get_query(query_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Query not found".to_string()))?;

    req.apply(&mut query, Utc::now())?;
    state.store.put_query(&query).await?;

    tracing::info!(
        "Query {} set to {} by {}",
        query.id,
        query.status.as_str(),
        admin.id
    );

    let collector = state.store.get_user(&query.collected_by).await?;
    let view = QueryView {
        collected_by: Collector::resolve(&query.collected_by, collector.as_ref()),
        query,
    };
    response::data(StatusCode::OK, state.origin(), &view)
}

/// Attach collector summaries, loading each distinct collector once.
async fn populate(state: &AppState, queries: Vec<Query>) -> ApiResult<Vec<QueryView>> {
    let mut collectors: HashMap<String, Option<User>> = HashMap::new();
    for query in &queries {
        if !collectors.contains_key(&query.collected_by) {
            let user = state.store.get_user(&query.collected_by).await?;
            collectors.insert(query.collected_by.clone(), user);
        }
    }

    Ok(queries
        .into_iter()
        .map(|query| {
            let user = collectors.get(&query.collected_by).and_then(Option::as_ref);
            QueryView {
                collected_by: Collector::resolve(&query.collected_by, user),
                query,
            }
        })
        .collect())
}
