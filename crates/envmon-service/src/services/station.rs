use envmon_store::PageQuery;
use envmon_types::{Page, Station};
use tracing::debug;

use super::{Result, ServiceError, SharedStore};

/// Station listing, upsert and removal.
#[derive(Clone)]
pub struct StationService {
    store: SharedStore,
}

impl StationService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, query: &PageQuery) -> Result<Page<Station>> {
        let store = self.store.lock().await;
        let items = store.query_stations(query)?;
        let total = store.count_stations()?;
        debug!("Loaded {} of {} stations", items.len(), total);
        Ok(Page::new(items, total))
    }

    /// Insert or update a station keyed by its id.
    ///
    /// Coordinates are optional, but when present they must be finite and
    /// within the usual latitude and longitude ranges.
    pub async fn upsert(&self, station: &Station) -> Result<Station> {
        validate_coordinate("lat", station.lat, 90.0)?;
        validate_coordinate("lng", station.lng, 180.0)?;
        if let Some(altitude) = station.altitude
            && !altitude.is_finite()
        {
            return Err(ServiceError::Invalid("altitude must be a number".to_string()));
        }
        if station.base.id < 0 {
            return Err(ServiceError::Invalid("invalid station id".to_string()));
        }

        let store = self.store.lock().await;
        Ok(store.upsert_station(station)?)
    }

    /// Remove a station. Stations that still own sensors are kept.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let store = self.store.lock().await;
        store.delete_station(id)?;
        Ok(())
    }
}

fn validate_coordinate(field: &str, value: Option<f64>, bound: f64) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v.abs() > bound => Err(ServiceError::Invalid(format!(
            "{} must be between -{} and {}",
            field, bound, bound
        ))),
        _ => Ok(()),
    }
}
