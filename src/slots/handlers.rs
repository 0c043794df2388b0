use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    day::Day,
    error::ServiceError,
    slots::{
        dto::{DayView, ItemPatch, RemovedResponse, SetTimeRequest},
        repo_types::ItemData,
        schedule::{MealItem, SlotId},
    },
    state::AppState,
};

pub fn slot_routes() -> Router<AppState> {
    Router::new()
        .route("/week", get(get_week))
        .route("/days/:day", get(get_day))
        .route("/days/:day/cleanup", post(cleanup_placeholders))
        .route(
            "/days/:day/slots/:slot_id/items",
            post(add_item).delete(delete_all_items),
        )
        .route(
            "/days/:day/slots/:slot_id/items/:item_id",
            put(update_item).delete(delete_item),
        )
        .route("/days/:day/slots/:slot_id/time", put(set_time))
}

fn parse_day(raw: &str) -> Result<Day, ServiceError> {
    raw.parse()
}

fn parse_slot(day: &str, slot_id: i64) -> Result<(Day, SlotId), ServiceError> {
    Ok((parse_day(day)?, SlotId::try_from(slot_id)?))
}

#[instrument(skip(state))]
pub async fn get_week(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<DayView>>, ServiceError> {
    let week = state.scheduler.get_week(user_id).await?;
    Ok(Json(
        week.iter()
            .map(|(day, slots)| DayView::new(*day, slots))
            .collect(),
    ))
}

#[instrument(skip(state))]
pub async fn get_day(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(day): Path<String>,
) -> Result<Json<DayView>, ServiceError> {
    let day = parse_day(&day)?;
    let slots = state.scheduler.get_day(user_id, day).await?;
    Ok(Json(DayView::new(day, &slots)))
}

#[instrument(skip(state, body))]
pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((day, slot_id)): Path<(String, i64)>,
    Json(body): Json<ItemData>,
) -> Result<(StatusCode, Json<MealItem>), ServiceError> {
    let (day, slot) = parse_slot(&day, slot_id)?;
    let item = state.scheduler.add_item(user_id, day, slot, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state, body))]
pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((day, slot_id, item_id)): Path<(String, i64, Uuid)>,
    Json(body): Json<ItemPatch>,
) -> Result<Json<MealItem>, ServiceError> {
    let (day, slot) = parse_slot(&day, slot_id)?;
    let item = state
        .scheduler
        .update_item(user_id, day, slot, item_id, body)
        .await?;
    Ok(Json(item))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((day, slot_id, item_id)): Path<(String, i64, Uuid)>,
) -> Result<StatusCode, ServiceError> {
    let (day, slot) = parse_slot(&day, slot_id)?;
    state
        .scheduler
        .delete_item(user_id, day, slot, item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn delete_all_items(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((day, slot_id)): Path<(String, i64)>,
) -> Result<Json<RemovedResponse>, ServiceError> {
    let (day, slot) = parse_slot(&day, slot_id)?;
    let removed = state.scheduler.delete_all_items(user_id, day, slot).await?;
    Ok(Json(RemovedResponse { removed }))
}

#[instrument(skip(state))]
pub async fn set_time(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((day, slot_id)): Path<(String, i64)>,
    Json(body): Json<SetTimeRequest>,
) -> Result<StatusCode, ServiceError> {
    let (day, slot) = parse_slot(&day, slot_id)?;
    state
        .scheduler
        .set_time(user_id, day, slot, body.time)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn cleanup_placeholders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(day): Path<String>,
) -> Result<Json<RemovedResponse>, ServiceError> {
    let day = parse_day(&day)?;
    let removed = state
        .scheduler
        .cleanup_duplicate_placeholders(user_id, day)
        .await?;
    Ok(Json(RemovedResponse { removed }))
}
