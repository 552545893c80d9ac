//! Domain types for the environmental monitoring dashboard.
//!
//! This crate provides the entities shared by the store and the HTTP
//! service: sensors, stations, accounts, and the paging wrapper used by
//! every listing.
//!
//! # Example
//!
//! ```
//! use envmon_types::{Sensor, SensorPosition};
//!
//! let position: SensorPosition = "Top".parse().unwrap();
//! assert_eq!(position.name(), "top");
//!
//! let sensor = Sensor {
//!     station_id: 1,
//!     position: Some(position),
//!     ..Default::default()
//! };
//! assert!(sensor.base.is_new());
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{Account, Base, Page, Sensor, SensorPosition, Station};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_casing(name: &'static str) -> impl Strategy<Value = String> {
        proptest::collection::vec(any::<bool>(), name.len()).prop_map(move |upper| {
            name.chars()
                .zip(upper)
                .map(|(c, u)| if u { c.to_ascii_uppercase() } else { c })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn position_lookup_ignores_case(
            casing in prop_oneof![any_casing("top"), any_casing("middle"), any_casing("bottom")],
        ) {
            let resolved = SensorPosition::from_name(&casing);
            prop_assert!(resolved.is_some());
            prop_assert_eq!(
                resolved.map(|p| p.name().to_string()),
                Some(casing.to_lowercase())
            );
        }

        #[test]
        fn position_code_round_trips(position in prop::sample::select(SensorPosition::ALL.to_vec())) {
            prop_assert_eq!(SensorPosition::from_code(position.code()), Ok(Some(position)));
        }

        #[test]
        fn unknown_names_never_resolve(name in "[a-z]{1,12}") {
            let known = ["top", "up", "middle", "mid", "bottom", "down"];
            prop_assume!(!known.contains(&name.as_str()));
            prop_assert_eq!(SensorPosition::from_name(&name), None);
        }
    }
}
