//! Sensor endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    response::IntoResponse,
    routing::{delete, get},
};
use envmon_store::SensorQuery;
use envmon_types::{Base, Sensor, SensorPosition};
use serde::Deserialize;
use tracing::{info, instrument};

use super::{AppError, ListParams, json_body, paged, parse_id};
use crate::state::AppState;

pub(super) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sensors", get(list_sensors).post(upsert_sensor))
        .route("/sensors/{sensor_id}", delete(delete_sensor))
}

/// Query parameters for `GET /sensors`.
#[derive(Debug, Default, Deserialize)]
pub struct SensorListParams {
    pub station_id: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl SensorListParams {
    /// Build the store query. A malformed `station_id` is rejected, paging
    /// values are lenient.
    pub fn to_query(&self) -> Result<SensorQuery, AppError> {
        let page = ListParams {
            offset: self.offset.clone(),
            limit: self.limit.clone(),
        }
        .page();

        let mut query = SensorQuery {
            station_id: None,
            limit: page.limit,
            offset: page.offset,
        };
        if let Some(raw) = self.station_id.as_deref() {
            query = query.station(parse_id(raw, "station_id")?);
        }
        Ok(query)
    }
}

/// Body of `POST /sensors`.
///
/// Every field is optional on the wire; a missing `id` (or `0`) creates a new
/// sensor. Unknown fields such as timestamps sent back by clients are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct SensorPayload {
    pub id: Option<i64>,
    pub station_id: Option<i64>,
    pub position: Option<String>,
    pub tag: Option<String>,
    pub name: Option<String>,
    pub group: Option<String>,
    pub unit: Option<String>,
}

impl SensorPayload {
    pub fn into_sensor(self) -> Result<Sensor, AppError> {
        let position = match self.position.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) => Some(
                name.parse::<SensorPosition>()
                    .map_err(|e| AppError::BadRequest(e.to_string()))?,
            ),
        };

        Ok(Sensor {
            base: Base::new(self.id.unwrap_or(0)),
            station_id: self.station_id.unwrap_or(0),
            position,
            tag: self.tag.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            group: self.group.unwrap_or_default(),
            unit: self.unit.unwrap_or_default(),
        })
    }
}

#[instrument(skip_all)]
async fn list_sensors(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SensorListParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let query = params.to_query()?;

    let page = state.sensors.get(&query).await?;
    Ok(paged(page))
}

#[instrument(skip_all)]
async fn upsert_sensor(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SensorPayload>, JsonRejection>,
) -> Result<Json<Sensor>, AppError> {
    let sensor = json_body(payload)?.into_sensor()?;

    let saved = state.sensors.upsert(&sensor).await?;
    info!("Saved sensor {} on station {}", saved.base.id, saved.station_id);
    Ok(Json(saved))
}

#[instrument(skip_all, fields(sensor_id = %sensor_id))]
async fn delete_sensor(
    State(state): State<Arc<AppState>>,
    Path(sensor_id): Path<String>,
) -> Result<Json<()>, AppError> {
    let id = parse_id(&sensor_id, "sensor_id")?;

    state.sensors.delete(id).await?;
    info!("Deleted sensor {}", id);
    Ok(Json(()))
}
