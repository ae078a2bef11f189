use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use iot_domain::error::{Error, Result};
use iot_domain::json_extract::ValidatedJson;
use iot_domain::page::PageMetadata;
use serde::Deserialize;
use uuid::Uuid;

use crate::model::Downlink;
use crate::service::Backup;
use crate::state::AppState;

fn bearer(headers: &HeaderMap) -> Result<String> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::Authentication)?;
    raw.strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or(Error::Authentication)
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn create(
    State(state): State<AppState>,
    Path(thing_id): Path<Uuid>,
    headers: HeaderMap,
    ValidatedJson(downlinks): ValidatedJson<Vec<Downlink>>,
) -> Result<(StatusCode, Json<Vec<Downlink>>)> {
    let token = bearer(&headers)?;
    let saved = state.service.create(&token, thing_id, downlinks).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn list_by_thing(
    State(state): State<AppState>,
    Path(thing_id): Path<Uuid>,
    headers: HeaderMap,
    Query(page): Query<PageMetadata>,
) -> Result<Json<iot_domain::page::Page<Downlink>>> {
    let token = bearer(&headers)?;
    let page = state.service.list_by_thing(&token, thing_id, page).await?;
    Ok(Json(page))
}

pub async fn list_by_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    headers: HeaderMap,
    Query(page): Query<PageMetadata>,
) -> Result<Json<iot_domain::page::Page<Downlink>>> {
    let token = bearer(&headers)?;
    let page = state.service.list_by_group(&token, group_id, page).await?;
    Ok(Json(page))
}

pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Downlink>> {
    let token = bearer(&headers)?;
    Ok(Json(state.service.view(&token, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    ValidatedJson(mut downlink): ValidatedJson<Downlink>,
) -> Result<Json<Downlink>> {
    let token = bearer(&headers)?;
    downlink.id = id;
    Ok(Json(state.service.update(&token, downlink).await?))
}

#[derive(Deserialize)]
pub struct RemoveRequest {
    downlink_ids: Vec<Uuid>,
}

pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<RemoveRequest>,
) -> Result<StatusCode> {
    let token = bearer(&headers)?;
    state.service.remove(&token, body.downlink_ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn backup(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Backup>> {
    let token = bearer(&headers)?;
    Ok(Json(state.service.backup(&token).await?))
}

pub async fn restore(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<Backup>,
) -> Result<(StatusCode, Json<Vec<Downlink>>)> {
    let token = bearer(&headers)?;
    let saved = state.service.restore(&token, body).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}
