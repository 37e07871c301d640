use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::{
    db::Upsert,
    error::{AppError, AppResult},
    models::{parse_item_id, Item, ItemInput, INVALID_ITEM_ID},
    AppState,
};

/// A segment that doesn't even decode (e.g. `%FF`) is just another bad id.
fn item_id(raw: Result<Path<String>, PathRejection>) -> AppResult<i32> {
    let Path(raw) = raw.map_err(|_| AppError::BadRequest(INVALID_ITEM_ID.to_string()))?;
    parse_item_id(&raw)
}

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_items(State(state): State<AppState>) -> AppResult<Json<Vec<Item>>> {
    let start = Instant::now();
    let items = state.store.list_all().await?;

    info!(
        count = items.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "Listed items"
    );

    Ok(Json(items))
}

// ── Create or merge ───────────────────────────────────────────────────────────

/// Adds to an existing item of the same name (200) or creates one (201).
pub async fn create_item(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Item>)> {
    let input = ItemInput::from_body(&body)?;

    let start = Instant::now();
    let outcome = state.store.create_or_merge(&input.name, input.quantity).await?;
    let elapsed_ms = start.elapsed().as_millis();

    let (status, item) = match outcome {
        Upsert::Created(item) => {
            info!(id = item.id, name = %item.name, quantity = item.quantity, elapsed_ms, "Created item");
            (StatusCode::CREATED, item)
        }
        Upsert::Merged(item) => {
            info!(
                id = item.id,
                name = %item.name,
                added = input.quantity,
                quantity = item.quantity,
                elapsed_ms,
                "Merged into existing item"
            );
            (StatusCode::OK, item)
        }
    };

    Ok((status, Json(item)))
}

// ── Get by ID ─────────────────────────────────────────────────────────────────

pub async fn get_item(
    State(state): State<AppState>,
    raw_id: Result<Path<String>, PathRejection>,
) -> AppResult<Json<Item>> {
    let id = item_id(raw_id)?;
    let item = state
        .store
        .get_by_id(id)
        .await?
        .ok_or_else(AppError::item_not_found)?;

    info!(id, "Fetched item");
    Ok(Json(item))
}

// ── Update ────────────────────────────────────────────────────────────────────

/// Full replace of name and quantity.
pub async fn update_item(
    State(state): State<AppState>,
    raw_id: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> AppResult<Json<Item>> {
    let id = item_id(raw_id)?;
    let input = ItemInput::from_body(&body)?;

    let item = state
        .store
        .update(id, &input.name, input.quantity)
        .await?
        .ok_or_else(AppError::item_not_found)?;

    info!(id, name = %item.name, quantity = item.quantity, "Updated item");
    Ok(Json(item))
}

// ── Delete ────────────────────────────────────────────────────────────────────

pub async fn delete_item(
    State(state): State<AppState>,
    raw_id: Result<Path<String>, PathRejection>,
) -> AppResult<StatusCode> {
    let id = item_id(raw_id)?;

    if !state.store.delete(id).await? {
        return Err(AppError::item_not_found());
    }

    info!(id, "Deleted item");
    Ok(StatusCode::NO_CONTENT)
}
