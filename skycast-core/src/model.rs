use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A resolved place. Identity is the coordinate pair; the name is for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    latitude: f64,
    longitude: f64,
    display_name: String,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, display_name: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            display_name: display_name.into(),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_same_place(&self, other: &Location) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

pub fn coordinate_label(lat: f64, lon: f64) -> String {
    format!("{lat:.4}, {lon:.4}")
}

const PRESSURE_GAUGE_MIN_HPA: f64 = 950.0;
const PRESSURE_GAUGE_MAX_HPA: f64 = 1050.0;
const WIND_GAUGE_MAX_KMH: f64 = 100.0;

/// Point-in-time reading, in metric units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub timestamp: DateTime<Utc>,
    pub temperature_c: f64,
    pub feels_like_c: Option<f64>,
    pub humidity_pct: u8,
    pub pressure_hpa: f64,
    pub wind_speed_ms: f64,
    pub condition_code: u16,
    pub description: String,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

impl WeatherSnapshot {
    pub fn wind_speed_kmh(&self) -> f64 {
        self.wind_speed_ms * 3.6
    }

    /// Position of the pressure on a 950..1050 hPa gauge, as a percentage.
    pub fn pressure_gauge_pct(&self) -> f64 {
        gauge_pct(
            self.pressure_hpa - PRESSURE_GAUGE_MIN_HPA,
            PRESSURE_GAUGE_MAX_HPA - PRESSURE_GAUGE_MIN_HPA,
        )
    }

    /// Position of the wind speed on a 0..100 km/h gauge, as a percentage.
    pub fn wind_gauge_pct(&self) -> f64 {
        gauge_pct(self.wind_speed_kmh(), WIND_GAUGE_MAX_KMH)
    }

    pub fn condition_group(&self) -> ConditionGroup {
        ConditionGroup::from_code(self.condition_code)
    }
}

fn gauge_pct(value: f64, span: f64) -> f64 {
    (value / span * 100.0).clamp(0.0, 100.0)
}

/// Coarse condition buckets, keyed off the provider's condition code ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionGroup {
    Thunderstorm,
    Drizzle,
    Rain,
    Snow,
    Atmosphere,
    Clear,
    Clouds,
    Unknown,
}

impl ConditionGroup {
    pub fn from_code(code: u16) -> Self {
        match code {
            200..=299 => Self::Thunderstorm,
            300..=399 => Self::Drizzle,
            500..=599 => Self::Rain,
            600..=699 => Self::Snow,
            700..=799 => Self::Atmosphere,
            800 => Self::Clear,
            801..=899 => Self::Clouds,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Thunderstorm => "Thunderstorm",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Atmosphere => "Mist",
            Self::Clear => "Clear",
            Self::Clouds => "Clouds",
            Self::Unknown => "Unknown",
        }
    }
}

/// Multi-point forecast, strictly increasing in timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub city_name: Option<String>,
    pub country: Option<String>,
    pub utc_offset_secs: Option<i32>,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub entries: Vec<WeatherSnapshot>,
}

/// Air quality index as reported by the provider, 1 (good) to 5 (very poor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Aqi(u8);

impl Aqi {
    pub fn new(value: u8) -> Option<Self> {
        (1..=5).contains(&value).then_some(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            1 => "Good",
            2 => "Fair",
            3 => "Moderate",
            4 => "Poor",
            _ => "Very Poor",
        }
    }
}

impl TryFrom<u8> for Aqi {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Aqi::new(value).ok_or_else(|| format!("aqi {value} outside 1..=5"))
    }
}

impl From<Aqi> for u8 {
    fn from(aqi: Aqi) -> Self {
        aqi.0
    }
}

/// Pollutant concentrations in µg/m³.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutionComponents {
    pub pm2_5: f64,
    pub pm10: f64,
    pub co: f64,
    pub no: f64,
    pub no2: f64,
    pub o3: f64,
    pub so2: f64,
    pub nh3: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutionSample {
    pub timestamp: DateTime<Utc>,
    pub aqi: Aqi,
    pub components: PollutionComponents,
}

/// Hourly air-quality forecast, strictly increasing in timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutionSeries {
    pub samples: Vec<PollutionSample>,
}

/// Validated input for a historical lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub city: String,
    pub country_code: String,
    pub date: NaiveDate,
}

/// Hourly readings for one 24 hour window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalWindow {
    /// The queried place, as typed (the history endpoint looks it up by name).
    pub location: String,
    pub country_code: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub samples: Vec<WeatherSnapshot>,
}

/// Tag for a batch of fetches issued for one location selection.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RequestEpoch(u64);

impl RequestEpoch {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}
