use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser, day::Day, error::ServiceError, state::AppState,
    targets::repo_types::MacroTargets,
};

pub fn target_routes() -> Router<AppState> {
    Router::new()
        .route("/week/targets", get(get_week_targets))
        .route("/days/:day/targets", get(get_targets).put(save_targets))
}

#[derive(Debug, Serialize)]
pub struct DayTargets {
    pub day: Day,
    #[serde(flatten)]
    pub targets: MacroTargets,
}

#[instrument(skip(state))]
pub async fn get_week_targets(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<DayTargets>>, ServiceError> {
    let week = state.targets.get_week(user_id).await?;
    Ok(Json(
        week.into_iter()
            .map(|(day, targets)| DayTargets { day, targets })
            .collect(),
    ))
}

#[instrument(skip(state))]
pub async fn get_targets(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(day): Path<String>,
) -> Result<Json<MacroTargets>, ServiceError> {
    let day: Day = day.parse()?;
    Ok(Json(state.targets.get(user_id, day).await?))
}

#[instrument(skip(state, body))]
pub async fn save_targets(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(day): Path<String>,
    Json(body): Json<MacroTargets>,
) -> Result<Json<MacroTargets>, ServiceError> {
    let day: Day = day.parse()?;
    Ok(Json(state.targets.save(user_id, day, body).await?))
}
