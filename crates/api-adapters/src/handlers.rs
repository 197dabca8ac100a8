//! # Handlers
//!
//! Thin adapters between axum extractors and the services in `AppContext`.
//! Rejected bodies, path segments and query strings surface as `ApiError`
//! validation failures.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::{AdCompletion, AdsConfigUpdate, ChapterUpsert, NewWork, WorkPatch};
use serde::Deserialize;
use serde_json::{json, Value};
use services::AppContext;

use crate::error::ApiResult;
use crate::metrics::HttpMetrics;

/// State shared by every route.
#[derive(Clone)]
pub struct ApiState {
    pub ctx: Arc<AppContext>,
    pub metrics: Arc<HttpMetrics>,
}

impl ApiState {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            metrics: Arc::new(HttpMetrics::new()),
        }
    }
}

// ── Works ───────────────────────────────────────────────────────────────────

/// Every manga then every novel, rebuilt from the store.
pub async fn list_works(State(state): State<ApiState>) -> ApiResult<Response> {
    let works = state.ctx.aggregate.rebuild().await?;
    Ok(Json(works.as_slice()).into_response())
}

pub async fn get_work(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Response> {
    let Path(id) = id?;
    let work = state.ctx.works.get(id).await?;
    Ok(Json(work).into_response())
}

pub async fn create_work(
    State(state): State<ApiState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body?;
    let work = state.ctx.works.create(NewWork::try_from(body)?).await?;
    Ok(Json(json!({ "success": true, "id": work.id })).into_response())
}

pub async fn update_work(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let Path(id) = id?;
    let Json(body) = body?;
    state.ctx.works.update(id, WorkPatch::try_from(body)?).await?;
    Ok(success())
}

pub async fn delete_work(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Response> {
    let Path(id) = id?;
    state.ctx.works.delete(id).await?;
    Ok(success())
}

// ── Chapters ────────────────────────────────────────────────────────────────

pub async fn list_chapters(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Response> {
    let Path(id) = id?;
    let chapters = state.ctx.chapters.list_for_work(id).await?;
    Ok(Json(chapters).into_response())
}

pub async fn upsert_chapter(
    State(state): State<ApiState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<ChapterUpsert>, JsonRejection>,
) -> ApiResult<Response> {
    let Path(id) = id?;
    let Json(request) = body?;
    state.ctx.chapters.upsert(id, request).await?;
    Ok(success())
}

pub async fn delete_chapter(
    State(state): State<ApiState>,
    ids: Result<Path<(i64, String)>, PathRejection>,
) -> ApiResult<Response> {
    let Path((id, chapter_id)) = ids?;
    state.ctx.chapters.delete(id, &chapter_id).await?;
    Ok(success())
}

#[derive(Debug, Deserialize)]
pub struct ReaderQuery {
    user: Option<String>,
}

/// Checks the ad gate for logging only, then serves the chapter.
pub async fn read_chapter(
    State(state): State<ApiState>,
    keys: Result<Path<(String, String)>, PathRejection>,
    query: Result<Query<ReaderQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Path((work_key, chapter_id)) = keys?;
    let Query(query) = query?;
    let user = query.user.as_deref().unwrap_or("guest");
    state.ctx.ad_gate.check_completion(user, &work_key, &chapter_id);
    let chapter = state.ctx.chapters.fetch(&work_key, &chapter_id).await?;
    Ok(Json(chapter).into_response())
}

pub async fn read_chapter_direct(
    State(state): State<ApiState>,
    keys: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Response> {
    let Path((work_key, chapter_id)) = keys?;
    let chapter = state.ctx.chapters.fetch(&work_key, &chapter_id).await?;
    Ok(Json(chapter).into_response())
}

// ── Ads ─────────────────────────────────────────────────────────────────────

pub async fn get_ads_config(State(state): State<ApiState>) -> ApiResult<Response> {
    let config = state.ctx.ads.current().await?;
    Ok(Json(config).into_response())
}

pub async fn update_ads_config(
    State(state): State<ApiState>,
    body: Result<Json<AdsConfigUpdate>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(update) = body?;
    let config = state.ctx.ads.update(update).await?;
    Ok(Json(json!({ "success": true, "config": config })).into_response())
}

/// Always answers with success; a body that does not parse is treated like
/// one with every field missing.
pub async fn ads_complete(
    State(state): State<ApiState>,
    body: Result<Json<AdCompletion>, JsonRejection>,
) -> Response {
    let report = match body {
        Ok(Json(report)) => report,
        Err(rejection) => {
            tracing::info!(error = %rejection.body_text(), "unreadable ad completion report");
            AdCompletion::default()
        }
    };
    let outcome = state.ctx.ad_gate.record_completion(report).await;
    Json(json!({ "success": true, "message": outcome.message() })).into_response()
}

// ── Users ───────────────────────────────────────────────────────────────────

pub async fn register_guest(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());
    let user = state.ctx.users.register_guest(user_agent).await?;
    Ok(Json(json!({ "success": true, "user": user })).into_response())
}

pub async fn list_users(State(state): State<ApiState>) -> ApiResult<Response> {
    let users = state.ctx.users.list().await?;
    Ok(Json(users).into_response())
}

pub async fn delete_user(
    State(state): State<ApiState>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Response> {
    let Path(id) = id?;
    state.ctx.users.delete(&id).await?;
    Ok(success())
}

// ── Metrics ─────────────────────────────────────────────────────────────────

pub async fn metrics(State(state): State<ApiState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn success() -> Response {
    Json(json!({ "success": true })).into_response()
}
