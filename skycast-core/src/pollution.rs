//! Air-quality forecast and its alignment with the weather forecast.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::{
    error::WeatherError,
    model::{ForecastSeries, PollutionSample, PollutionSeries, WeatherSnapshot},
    provider::WeatherProvider,
};

/// Half of the provider's three hour forecast step.
pub const DEFAULT_CORRELATION_TOLERANCE: Duration = Duration::from_secs(90 * 60);

#[derive(Debug, Clone)]
pub struct PollutionFetcher {
    provider: Arc<dyn WeatherProvider>,
}

impl PollutionFetcher {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    /// Only ever called with resolved coordinates.
    pub async fn fetch(&self, lat: f64, lon: f64) -> Result<PollutionSeries, WeatherError> {
        let series = self
            .provider
            .air_pollution_forecast(lat, lon)
            .await
            .map_err(WeatherError::from_fetch)?;

        debug!(lat, lon, samples = series.samples.len(), "air pollution fetched");
        Ok(series)
    }
}

/// A pollution sample paired with the forecast entry closest to it in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelatedSample<'a> {
    pub timestamp: DateTime<Utc>,
    pub pollution: &'a PollutionSample,
    pub weather: Option<&'a WeatherSnapshot>,
}

/// Pair every pollution sample with the nearest forecast entry by timestamp.
///
/// Entries farther than `tolerance` are not paired (`weather` is `None`);
/// on an exact tie the earlier forecast entry wins. Both inputs must be
/// time-ascending, which the provider layer guarantees.
pub fn correlate_by_timestamp<'a>(
    pollution: &'a PollutionSeries,
    forecast: &'a ForecastSeries,
    tolerance: Duration,
) -> Vec<CorrelatedSample<'a>> {
    let tolerance_secs = i64::try_from(tolerance.as_secs()).unwrap_or(i64::MAX);
    let entries = &forecast.entries;
    let mut cursor = 0;

    pollution
        .samples
        .iter()
        .map(|sample| {
            let ts = sample.timestamp.timestamp();
            // Advance while the next entry is strictly closer; ties stay on the earlier one.
            while cursor + 1 < entries.len()
                && distance(&entries[cursor + 1], ts) < distance(&entries[cursor], ts)
            {
                cursor += 1;
            }

            let weather = entries
                .get(cursor)
                .filter(|entry| distance(entry, ts) <= tolerance_secs);

            CorrelatedSample {
                timestamp: sample.timestamp,
                pollution: sample,
                weather,
            }
        })
        .collect()
}

fn distance(entry: &WeatherSnapshot, ts: i64) -> i64 {
    (entry.timestamp.timestamp() - ts).abs()
}
