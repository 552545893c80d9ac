//! Query builders for listings.
//!
//! This module provides fluent query builders for filtering and paginating
//! stored entities. [`SensorQuery`] adds a station filter on top of the plain
//! offset/limit paging offered by [`PageQuery`].
//!
//! Every query only sees live rows (soft-deleted rows are skipped) and
//! orders results by `id` ascending so that pages are stable.
//!
//! # Example
//!
//! ```
//! use envmon_store::{Store, SensorQuery};
//!
//! let store = Store::open_in_memory()?;
//!
//! let query = SensorQuery::new()
//!     .station(3)
//!     .limit(10)
//!     .offset(20);
//!
//! let sensors = store.query_sensors(&query)?;
//! let total = store.count_sensors(&query)?;
//! assert!(sensors.is_empty());
//! assert_eq!(total, 0);
//! # Ok::<(), envmon_store::Error>(())
//! ```

/// Fluent query builder for sensors.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SensorQuery {
    /// Filter by owning station.
    pub station_id: Option<i64>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

impl SensorQuery {
    /// Create a query matching every live sensor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only include sensors of the given station.
    pub fn station(mut self, station_id: i64) -> Self {
        self.station_id = Some(station_id);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<i64>) {
        let mut conditions = vec!["deleted_at IS NULL"];
        let mut params = Vec::new();

        if let Some(station_id) = self.station_id {
            conditions.push("station_id = ?");
            params.push(station_id);
        }

        (format!("WHERE {}", conditions.join(" AND ")), params)
    }

    /// Build the full SQL query for the current page.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        format!(
            "SELECT id, station_id, position, tag, name, sensor_group, unit, created_at, updated_at \
             FROM sensors {} ORDER BY id ASC{}",
            where_clause,
            pagination_clause(self.limit, self.offset)
        )
    }

    /// Build the SQL counting every match, ignoring pagination.
    pub(crate) fn build_count_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        format!("SELECT COUNT(*) FROM sensors {}", where_clause)
    }
}

/// Plain offset/limit paging, used for stations and accounts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

impl PageQuery {
    /// Create a query matching every live row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Build the full SQL for the given table and column list.
    pub(crate) fn build_sql(&self, table: &str, columns: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE deleted_at IS NULL ORDER BY id ASC{}",
            columns,
            table,
            pagination_clause(self.limit, self.offset)
        )
    }
}

/// SQLite requires a LIMIT before OFFSET; `-1` means unbounded.
fn pagination_clause(limit: Option<u32>, offset: Option<u32>) -> String {
    match (limit, offset) {
        (None, None) => String::new(),
        (Some(limit), None) => format!(" LIMIT {}", limit),
        (Some(limit), Some(offset)) => format!(" LIMIT {} OFFSET {}", limit, offset),
        (None, Some(offset)) => format!(" LIMIT -1 OFFSET {}", offset),
    }
}
