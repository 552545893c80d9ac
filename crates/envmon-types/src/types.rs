//! Core types for the monitoring dashboard domain.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

use crate::error::{ParseError, ParseResult};

/// Physical mounting position of a sensor on its station.
///
/// Positions are persisted as integer codes and exchanged over the API as
/// lowercase names. A code of `0` is reserved for "no position".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SensorPosition {
    /// Mounted above the board (also accepted as `up`).
    Top = 1,
    /// Mounted between boards (also accepted as `mid`).
    Middle = 2,
    /// Mounted below the board (also accepted as `down`).
    Bottom = 3,
}

impl SensorPosition {
    /// All positions in code order.
    pub const ALL: [SensorPosition; 3] = [
        SensorPosition::Top,
        SensorPosition::Middle,
        SensorPosition::Bottom,
    ];

    /// Integer code used for storage.
    #[must_use]
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SensorPosition::Top => "top",
            SensorPosition::Middle => "middle",
            SensorPosition::Bottom => "bottom",
        }
    }

    /// Resolve a position from its name, ignoring case and surrounding
    /// whitespace.
    ///
    /// # Examples
    ///
    /// ```
    /// use envmon_types::SensorPosition;
    ///
    /// assert_eq!(SensorPosition::from_name("TOP"), Some(SensorPosition::Top));
    /// assert_eq!(SensorPosition::from_name("down"), Some(SensorPosition::Bottom));
    /// assert_eq!(SensorPosition::from_name("sideways"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "top" | "up" => Some(SensorPosition::Top),
            "middle" | "mid" => Some(SensorPosition::Middle),
            "bottom" | "down" => Some(SensorPosition::Bottom),
            _ => None,
        }
    }

    /// Decode an optional stored code. `0` maps to no position.
    pub fn from_code(code: i64) -> ParseResult<Option<Self>> {
        if code == 0 {
            return Ok(None);
        }
        Self::try_from(code).map(Some)
    }
}

impl TryFrom<i64> for SensorPosition {
    type Error = ParseError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(SensorPosition::Top),
            2 => Ok(SensorPosition::Middle),
            3 => Ok(SensorPosition::Bottom),
            _ => Err(ParseError::UnknownPositionCode(code)),
        }
    }
}

impl FromStr for SensorPosition {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ParseError::UnknownPosition(s.to_string()))
    }
}

impl fmt::Display for SensorPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(feature = "serde")]
impl Serialize for SensorPosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for SensorPosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Fields shared by every persisted entity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Base {
    /// Primary key. `0` means "not yet assigned".
    pub id: i64,
    /// When the row was first inserted.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub created_at: OffsetDateTime,
    /// When the row was last written.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub updated_at: OffsetDateTime,
}

impl Base {
    /// Create a base for an entity about to be written.
    ///
    /// Timestamps are placeholders; the store assigns the real values.
    pub fn new(id: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the entity still needs an identifier from the store.
    pub fn is_new(&self) -> bool {
        self.id == 0
    }
}

impl Default for Base {
    fn default() -> Self {
        Self::new(0)
    }
}

/// A sensor mounted on a station.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sensor {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub base: Base,
    /// Owning station.
    pub station_id: i64,
    /// Mounting position, if known.
    pub position: Option<SensorPosition>,
    /// Free-form tag.
    pub tag: String,
    /// Display name.
    pub name: String,
    /// Logical group (e.g. "air", "soil").
    pub group: String,
    /// Measurement unit.
    pub unit: String,
}

/// A monitoring station.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Station {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub base: Base,
    pub name: Option<String>,
    /// Latitude in degrees.
    pub lat: Option<f64>,
    /// Longitude in degrees.
    pub lng: Option<f64>,
    /// Altitude in meters.
    pub altitude: Option<f64>,
}

/// A dashboard account.
///
/// Credentials never leave the store; only the API token is exposed, and
/// only to the account's owner.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Account {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub base: Base,
    pub username: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "String::is_empty")
    )]
    pub token: String,
}

impl Account {
    /// Copy of this account without its API token.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            token: String::new(),
            ..self.clone()
        }
    }
}

/// One page of a listing together with the size of the whole matching set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of matching rows, ignoring offset and limit.
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    /// Map every item, keeping the total.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}
