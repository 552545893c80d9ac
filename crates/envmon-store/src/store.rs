//! Main store implementation.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use time::OffsetDateTime;
use tracing::{debug, info};

use envmon_types::{Account, Base, Sensor, SensorPosition, Station};

use crate::error::{Error, Result, conflict_on_constraint};
use crate::models::StoredAccount;
use crate::queries::{PageQuery, SensorQuery};
use crate::schema;

const SENSOR_COLUMNS: &str =
    "id, station_id, position, tag, name, sensor_group, unit, created_at, updated_at";
const STATION_COLUMNS: &str = "id, name, lat, lng, altitude, created_at, updated_at";
const ACCOUNT_COLUMNS: &str = "id, username, token, created_at, updated_at";

/// SQLite-based store for dashboard entities.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// `None` asks SQLite to assign the next id.
fn id_param(base: &Base) -> Option<i64> {
    if base.is_new() { None } else { Some(base.id) }
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let secs: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn base_from_row(row: &Row<'_>, created_idx: usize) -> rusqlite::Result<Base> {
    Ok(Base {
        id: row.get(0)?,
        created_at: timestamp(row, created_idx)?,
        updated_at: timestamp(row, created_idx + 1)?,
    })
}

fn sensor_from_row(row: &Row<'_>) -> rusqlite::Result<Sensor> {
    let code: i64 = row.get(2)?;
    let position = SensorPosition::from_code(code)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(e)))?;

    Ok(Sensor {
        base: base_from_row(row, 7)?,
        station_id: row.get(1)?,
        position,
        tag: row.get(3)?,
        name: row.get(4)?,
        group: row.get(5)?,
        unit: row.get(6)?,
    })
}

fn station_from_row(row: &Row<'_>) -> rusqlite::Result<Station> {
    Ok(Station {
        base: base_from_row(row, 5)?,
        name: row.get(1)?,
        lat: row.get(2)?,
        lng: row.get(3)?,
        altitude: row.get(4)?,
    })
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        base: base_from_row(row, 3)?,
        username: row.get(1)?,
        token: row.get(2)?,
    })
}

// Sensor operations
impl Store {
    /// Query one page of sensors.
    pub fn query_sensors(&self, query: &SensorQuery) -> Result<Vec<Sensor>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let sensors = stmt
            .query_map(params_from_iter(params.iter()), sensor_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sensors)
    }

    /// Count every sensor matching the query's filters, ignoring paging.
    pub fn count_sensors(&self, query: &SensorQuery) -> Result<u64> {
        let sql = query.build_count_sql();
        let (_, params) = query.build_where();

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;

        Ok(count as u64)
    }

    /// Get a live sensor by ID.
    pub fn get_sensor(&self, id: i64) -> Result<Option<Sensor>> {
        let sql = format!(
            "SELECT {} FROM sensors WHERE id = ?1 AND deleted_at IS NULL",
            SENSOR_COLUMNS
        );
        let sensor = self
            .conn
            .query_row(&sql, [id], sensor_from_row)
            .optional()?;
        Ok(sensor)
    }

    /// Insert or update a sensor keyed by its ID.
    ///
    /// A zero ID inserts with a fresh ID. A non-zero ID updates the row with
    /// that ID, inserting it if it does not exist yet (a previously deleted
    /// row is restored). Returns the stored row.
    pub fn upsert_sensor(&self, sensor: &Sensor) -> Result<Sensor> {
        let id = id_param(&sensor.base);

        self.conn.execute(
            "INSERT INTO sensors (id, station_id, position, tag, name, sensor_group, unit,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(id) DO UPDATE SET
                station_id = excluded.station_id,
                position = excluded.position,
                tag = excluded.tag,
                name = excluded.name,
                sensor_group = excluded.sensor_group,
                unit = excluded.unit,
                updated_at = excluded.updated_at,
                deleted_at = NULL",
            params![
                id,
                sensor.station_id,
                sensor.position.map_or(0, SensorPosition::code),
                sensor.tag,
                sensor.name,
                sensor.group,
                sensor.unit,
                now(),
            ],
        )?;

        let id = id.unwrap_or_else(|| self.conn.last_insert_rowid());
        self.get_sensor(id)?
            .ok_or(Error::NotFound { entity: "sensor", id })
    }

    /// Soft-delete a sensor.
    pub fn delete_sensor(&self, id: i64) -> Result<()> {
        let now = now();
        let affected = self.conn.execute(
            "UPDATE sensors SET deleted_at = ?2, updated_at = ?2
             WHERE id = ?1 AND deleted_at IS NULL",
            params![id, now],
        )?;

        if affected == 0 {
            return Err(Error::NotFound { entity: "sensor", id });
        }
        Ok(())
    }
}

// Station operations
impl Store {
    /// Query one page of stations.
    pub fn query_stations(&self, query: &PageQuery) -> Result<Vec<Station>> {
        let sql = query.build_sql("stations", STATION_COLUMNS);
        debug!("Executing query: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let stations = stmt
            .query_map([], station_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(stations)
    }

    /// Count every live station.
    pub fn count_stations(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM stations WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Get a live station by ID.
    pub fn get_station(&self, id: i64) -> Result<Option<Station>> {
        let sql = format!(
            "SELECT {} FROM stations WHERE id = ?1 AND deleted_at IS NULL",
            STATION_COLUMNS
        );
        let station = self
            .conn
            .query_row(&sql, [id], station_from_row)
            .optional()?;
        Ok(station)
    }

    /// Insert or update a station keyed by its ID.
    ///
    /// Same ID semantics as [`Store::upsert_sensor`].
    pub fn upsert_station(&self, station: &Station) -> Result<Station> {
        let id = id_param(&station.base);

        self.conn.execute(
            "INSERT INTO stations (id, name, lat, lng, altitude, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                lat = excluded.lat,
                lng = excluded.lng,
                altitude = excluded.altitude,
                updated_at = excluded.updated_at,
                deleted_at = NULL",
            params![
                id,
                station.name,
                station.lat,
                station.lng,
                station.altitude,
                now(),
            ],
        )?;

        let id = id.unwrap_or_else(|| self.conn.last_insert_rowid());
        self.get_station(id)?
            .ok_or(Error::NotFound {
                entity: "station",
                id,
            })
    }

    /// Soft-delete a station.
    ///
    /// Fails with [`Error::Conflict`] while live sensors still reference it.
    pub fn delete_station(&self, id: i64) -> Result<()> {
        let sensors = self.count_sensors(&SensorQuery::new().station(id))?;
        if sensors > 0 {
            return Err(Error::Conflict(format!(
                "station {} still has {} sensor(s)",
                id, sensors
            )));
        }

        let now = now();
        let affected = self.conn.execute(
            "UPDATE stations SET deleted_at = ?2, updated_at = ?2
             WHERE id = ?1 AND deleted_at IS NULL",
            params![id, now],
        )?;

        if affected == 0 {
            return Err(Error::NotFound {
                entity: "station",
                id,
            });
        }
        Ok(())
    }
}

// Account operations
impl Store {
    /// Query one page of accounts.
    pub fn query_accounts(&self, query: &PageQuery) -> Result<Vec<Account>> {
        let sql = query.build_sql("accounts", ACCOUNT_COLUMNS);
        debug!("Executing query: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let accounts = stmt
            .query_map([], account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    /// Count every live account.
    pub fn count_accounts(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Get a live account by ID.
    pub fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE id = ?1 AND deleted_at IS NULL",
            ACCOUNT_COLUMNS
        );
        let account = self
            .conn
            .query_row(&sql, [id], account_from_row)
            .optional()?;
        Ok(account)
    }

    /// Find the live account owning an API token.
    pub fn find_account_by_token(&self, token: &str) -> Result<Option<Account>> {
        if token.is_empty() {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {} FROM accounts WHERE token = ?1 AND deleted_at IS NULL",
            ACCOUNT_COLUMNS
        );
        let account = self
            .conn
            .query_row(&sql, [token], account_from_row)
            .optional()?;
        Ok(account)
    }

    /// Look up an account and its password hash by username (case-insensitive).
    pub fn find_credentials(&self, username: &str) -> Result<Option<StoredAccount>> {
        let sql = format!(
            "SELECT {}, password_hash FROM accounts
             WHERE username = ?1 COLLATE NOCASE AND deleted_at IS NULL",
            ACCOUNT_COLUMNS
        );
        let stored = self
            .conn
            .query_row(&sql, [username], |row| {
                Ok(StoredAccount {
                    account: account_from_row(row)?,
                    password_hash: row.get(5)?,
                })
            })
            .optional()?;
        Ok(stored)
    }

    /// Insert or update an account keyed by its ID.
    ///
    /// On insert the account's token is stored as given. On update the token
    /// is left untouched; use [`Store::set_token`] to rotate it. The password
    /// hash is only written when provided.
    ///
    /// Fails with [`Error::Conflict`] if another live account already uses
    /// the username.
    pub fn upsert_account(&self, account: &Account, password_hash: Option<&str>) -> Result<Account> {
        let id = id_param(&account.base);

        self.conn
            .execute(
                "INSERT INTO accounts (id, username, password_hash, token, created_at, updated_at)
                 VALUES (?1, ?2, COALESCE(?3, ''), ?4, ?5, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    username = excluded.username,
                    password_hash = COALESCE(?3, accounts.password_hash),
                    updated_at = excluded.updated_at,
                    deleted_at = NULL",
                params![id, account.username, password_hash, account.token, now()],
            )
            .map_err(|e| {
                conflict_on_constraint(
                    e,
                    format!("username {} is already taken", account.username),
                )
            })?;

        let id = id.unwrap_or_else(|| self.conn.last_insert_rowid());
        self.get_account(id)?
            .ok_or(Error::NotFound {
                entity: "account",
                id,
            })
    }

    /// Replace an account's API token.
    pub fn set_token(&self, id: i64, token: &str) -> Result<Account> {
        self.update_account_column(id, "token", token)
    }

    /// Replace an account's password hash.
    pub fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<Account> {
        self.update_account_column(id, "password_hash", password_hash)
    }

    fn update_account_column(&self, id: i64, column: &'static str, value: &str) -> Result<Account> {
        let sql = format!(
            "UPDATE accounts SET {} = ?2, updated_at = ?3
             WHERE id = ?1 AND deleted_at IS NULL",
            column
        );
        let affected = self.conn.execute(&sql, params![id, value, now()])?;

        if affected == 0 {
            return Err(Error::NotFound {
                entity: "account",
                id,
            });
        }
        self.get_account(id)?
            .ok_or(Error::NotFound {
                entity: "account",
                id,
            })
    }

    /// Soft-delete an account. Its token stops authenticating immediately.
    pub fn delete_account(&self, id: i64) -> Result<()> {
        let now = now();
        let affected = self.conn.execute(
            "UPDATE accounts SET deleted_at = ?2, updated_at = ?2
             WHERE id = ?1 AND deleted_at IS NULL",
            params![id, now],
        )?;

        if affected == 0 {
            return Err(Error::NotFound {
                entity: "account",
                id,
            });
        }
        Ok(())
    }
}
