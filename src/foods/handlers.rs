use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::ServiceError,
    foods::{
        dto::{FoodPatch, FoodRef, FoodSource, FoodView, SearchQuery},
        repo_types::FoodData,
    },
    state::AppState,
};

pub fn food_routes() -> Router<AppState> {
    Router::new()
        .route("/foods", get(list_foods).post(add_custom_food))
        .route("/foods/search", get(search_foods))
        .route("/foods/at/:index", put(update_food_at).delete(delete_food_at))
        .route("/foods/:source/:id", put(update_food).delete(delete_food))
}

#[instrument(skip(state))]
pub async fn list_foods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<FoodView>>, ServiceError> {
    Ok(Json(state.catalog.list_effective(user_id).await?))
}

#[instrument(skip(state))]
pub async fn search_foods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<FoodView>>, ServiceError> {
    Ok(Json(state.catalog.search(&query.q, user_id).await?))
}

#[instrument(skip(state, body))]
pub async fn add_custom_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<FoodData>,
) -> Result<(StatusCode, Json<FoodView>), ServiceError> {
    let view = state.catalog.add_custom(user_id, body).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state, body))]
pub async fn update_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((source, id)): Path<(String, Uuid)>,
    Json(body): Json<FoodPatch>,
) -> Result<Json<FoodView>, ServiceError> {
    let target = FoodRef {
        source: source.parse::<FoodSource>()?,
        id,
    };
    Ok(Json(state.catalog.update(user_id, target, body).await?))
}

#[instrument(skip(state))]
pub async fn delete_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((source, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ServiceError> {
    let target = FoodRef {
        source: source.parse::<FoodSource>()?,
        id,
    };
    state.catalog.delete(user_id, target).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Index-addressed edit against the current `GET /foods` ordering.
#[instrument(skip(state, body))]
pub async fn update_food_at(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(index): Path<usize>,
    Json(body): Json<FoodPatch>,
) -> Result<Json<FoodView>, ServiceError> {
    Ok(Json(state.catalog.update_at(user_id, index, body).await?))
}

#[instrument(skip(state))]
pub async fn delete_food_at(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(index): Path<usize>,
) -> Result<StatusCode, ServiceError> {
    state.catalog.delete_at(user_id, index).await?;
    Ok(StatusCode::NO_CONTENT)
}
