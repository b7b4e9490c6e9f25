//! Core library for the skycast weather app.
//!
//! This crate defines:
//! - The authoritative client state store and its persistence mirroring
//! - The durable key→JSON storage gateway (file-backed and in-memory)
//! - The time-of-day theme scheduler
//! - The async city lookup client and configuration handling
//!
//! It is used by `skycast-cli`, but can also be reused by other frontends.

pub mod config;
pub mod lookup;
pub mod model;
pub mod storage;
pub mod store;
pub mod theme;

pub use config::Config;
pub use lookup::{CityLookup, HttpCityLookup, LookupError};
pub use model::{TemperatureUnit, WeatherCondition, WeatherRecord, fahrenheit_from_celsius};
pub use storage::{FileStorage, MemoryStorage, StorageGateway};
pub use store::{Subscription, WeatherState, WeatherStore};
pub use theme::{Theme, ThemeScheduler};
