use serde::{Deserialize, Serialize};

/// Weather snapshot for a single city, as served by the city directory API.
///
/// Values are canonical metric: temperature in Celsius, wind speed in km/h.
/// Records are immutable once fetched; a later lookup for the same city
/// produces a fresh record rather than mutating an old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    /// Stable city identifier, unique per city.
    pub id: i64,
    pub city: String,
    /// Degrees Celsius. Unit preference only affects display, never storage.
    pub temperature: f64,
    /// Free-form condition label, e.g. "Sunny" or "Partly Cloudy".
    pub weather: String,
    /// Relative humidity, 0–100.
    pub humidity: u8,
    /// Wind speed in km/h.
    pub wind_speed: f64,
    pub lat: f64,
    pub lon: f64,
}

impl WeatherRecord {
    /// Categorize the free-form `weather` label.
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_label(&self.weather)
    }
}

/// Condition categories recognized by the app; anything else falls back to
/// [`WeatherCondition::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherCondition {
    Sunny,
    Cloudy,
    Rainy,
    PartlyCloudy,
    Unknown,
}

impl WeatherCondition {
    /// Parse a condition label case-insensitively.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "sunny" => Self::Sunny,
            "cloudy" => Self::Cloudy,
            "rainy" => Self::Rainy,
            "partly cloudy" => Self::PartlyCloudy,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sunny => "Sunny",
            Self::Cloudy => "Cloudy",
            Self::Rainy => "Rainy",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Unknown => "Unknown",
        }
    }

    /// Single-character marker for terminal output.
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Sunny => "☀",
            Self::Cloudy => "☁",
            Self::Rainy => "🌧",
            Self::PartlyCloudy => "⛅",
            Self::Unknown => "?",
        }
    }
}

/// Display unit for temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn from_celsius_flag(use_celsius: bool) -> Self {
        if use_celsius { Self::Celsius } else { Self::Fahrenheit }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

/// Convert a stored Celsius temperature to whole-degree Fahrenheit.
///
/// Fahrenheit is rounded to the nearest integer; Celsius display uses the
/// stored value as-is, so there is no Celsius counterpart to this function.
pub fn fahrenheit_from_celsius(celsius: f64) -> i64 {
    (celsius * 9.0 / 5.0 + 32.0).round() as i64
}
