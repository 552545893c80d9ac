use envmon_store::SensorQuery;
use envmon_types::{Page, Sensor};
use tracing::debug;

use super::{Result, ServiceError, SharedStore};

/// Sensor listing, upsert and removal.
#[derive(Clone)]
pub struct SensorService {
    store: SharedStore,
}

impl SensorService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// One page of sensors plus the size of the whole filtered set.
    pub async fn get(&self, query: &SensorQuery) -> Result<Page<Sensor>> {
        let store = self.store.lock().await;
        let items = store.query_sensors(query)?;
        let total = store.count_sensors(query)?;
        debug!("Loaded {} of {} sensors", items.len(), total);
        Ok(Page::new(items, total))
    }

    /// Insert or update a sensor keyed by its id.
    pub async fn upsert(&self, sensor: &Sensor) -> Result<Sensor> {
        if sensor.station_id <= 0 {
            return Err(ServiceError::Invalid(
                "station_id must be a positive integer".to_string(),
            ));
        }
        if sensor.base.id < 0 {
            return Err(ServiceError::Invalid("invalid sensor id".to_string()));
        }

        let store = self.store.lock().await;
        Ok(store.upsert_sensor(sensor)?)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let store = self.store.lock().await;
        store.delete_sensor(id)?;
        Ok(())
    }
}
