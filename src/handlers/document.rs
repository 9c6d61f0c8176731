//! Document handlers: list, read, create, update, delete. Each is one collection call;
//! responses echo what the collection returned.

use crate::document::{DocumentId, FindOptions};
use crate::error::AppError;
use crate::state::ResourceState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

fn parse_count(params: &HashMap<String, String>, key: &str) -> Result<Option<u64>, AppError> {
    match params.get(key) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", key))),
    }
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    match body {
        Ok(Json(v)) => Ok(v),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(AppError::PayloadTooLarge(rejection.body_text()))
        }
        Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
    }
}

pub async fn list(
    State(state): State<ResourceState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Value>>, AppError> {
    let opts = FindOptions {
        skip: parse_count(&params, "skip")?,
        limit: parse_count(&params, "limit")?,
    };
    let docs = state.collection.find(opts).await?;
    Ok(Json(docs))
}

pub async fn read(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
) -> Result<Json<Option<Value>>, AppError> {
    let id = DocumentId::parse(&id)?;
    let doc = state.collection.find_one(&id).await?;
    Ok(Json(doc))
}

pub async fn create(
    State(state): State<ResourceState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let body = json_body(body)?;
    let parsed = state.schema.parse(&body)?;
    let result = state.collection.insert_one(parsed).await?;
    Ok(Json(result))
}

pub async fn update(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Option<Value>>, AppError> {
    let id = DocumentId::parse(&id)?;
    let body = json_body(body)?;
    let parsed = state.schema.parse(&body)?;
    let before = state.collection.find_one_and_update(&id, parsed).await?;
    Ok(Json(before))
}

pub async fn delete(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
) -> Result<Json<Option<Value>>, AppError> {
    let id = DocumentId::parse(&id)?;
    let deleted = state.collection.find_one_and_delete(&id).await?;
    Ok(Json(deleted))
}
