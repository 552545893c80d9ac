//! Station endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    response::IntoResponse,
    routing::{delete, get},
};
use envmon_types::{Base, Station};
use serde::Deserialize;
use tracing::{info, instrument};

use super::{AppError, ListParams, json_body, paged, parse_id};
use crate::state::AppState;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stations", get(list_stations).post(upsert_station))
        .route("/stations/{station_id}", delete(delete_station))
}

/// Body of `POST /stations`.
#[derive(Debug, Default, Deserialize)]
pub struct StationPayload {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub altitude: Option<f64>,
}

impl From<StationPayload> for Station {
    fn from(payload: StationPayload) -> Self {
        Station {
            base: Base::new(payload.id.unwrap_or(0)),
            name: payload.name,
            lat: payload.lat,
            lng: payload.lng,
            altitude: payload.altitude,
        }
    }
}

#[instrument(skip_all)]
async fn list_stations(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let page = state.stations.get(&params.page()).await?;
    Ok(paged(page))
}

#[instrument(skip_all)]
async fn upsert_station(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StationPayload>, JsonRejection>,
) -> Result<Json<Station>, AppError> {
    let station = Station::from(json_body(payload)?);

    let saved = state.stations.upsert(&station).await?;
    info!("Saved station {}", saved.base.id);
    Ok(Json(saved))
}

#[instrument(skip_all, fields(station_id = %station_id))]
async fn delete_station(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<String>,
) -> Result<Json<()>, AppError> {
    let id = parse_id(&station_id, "station_id")?;

    state.stations.delete(id).await?;
    info!("Deleted station {}", id);
    Ok(Json(()))
}
