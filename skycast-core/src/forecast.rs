//! Forecast retrieval and the hourly/daily views derived from it.
//!
//! The views are pure functions over an already fetched [`ForecastSeries`]:
//! they never touch the network and can be recomputed freely.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

use crate::{
    error::WeatherError,
    model::{ForecastSeries, Location, WeatherSnapshot},
    provider::WeatherProvider,
};

#[derive(Debug, Clone)]
pub struct ForecastFetcher {
    provider: Arc<dyn WeatherProvider>,
}

impl ForecastFetcher {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    pub async fn fetch(&self, location: &Location) -> Result<ForecastSeries, WeatherError> {
        let series = self
            .provider
            .forecast(location.latitude(), location.longitude())
            .await
            .map_err(WeatherError::from_fetch)?;

        debug!(
            place = location.display_name(),
            entries = series.entries.len(),
            "forecast fetched"
        );
        Ok(series)
    }
}

/// Leading `n` entries, or all of them when the series is shorter.
pub fn hourly_view(series: &ForecastSeries, n: usize) -> &[WeatherSnapshot] {
    let len = series.entries.len().min(n);
    &series.entries[..len]
}

/// One entry per calendar date: the one whose slot time equals `anchor`.
///
/// Slot times are read on the provider's clock (UTC). Dates for which the
/// provider never emitted the anchor slot are simply absent.
pub fn daily_view(series: &ForecastSeries, anchor: NaiveTime) -> Vec<&WeatherSnapshot> {
    let mut last_date: Option<NaiveDate> = None;
    let mut days = Vec::new();

    for entry in &series.entries {
        let slot = entry.timestamp.naive_utc();
        if slot.time() != anchor || last_date == Some(slot.date()) {
            continue;
        }
        last_date = Some(slot.date());
        days.push(entry);
    }

    days
}

#[cfg(test)]
pub(crate) fn noon() -> NaiveTime {
    NaiveTime::MIN + chrono::Duration::hours(12)
}

impl ForecastSeries {
    pub fn hourly(&self, n: usize) -> &[WeatherSnapshot] {
        hourly_view(self, n)
    }

    pub fn daily(&self, anchor: NaiveTime) -> Vec<&WeatherSnapshot> {
        daily_view(self, anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::snapshot_at;
    use crate::testing::SERIES_START;

    fn series(timestamps: &[i64]) -> ForecastSeries {
        ForecastSeries {
            city_name: Some("Amman".into()),
            country: Some("JO".into()),
            utc_offset_secs: Some(10_800),
            sunrise: None,
            sunset: None,
            entries: timestamps
                .iter()
                .enumerate()
                .map(|(i, ts)| snapshot_at(*ts, i as f64))
                .collect(),
        }
    }

    fn three_hourly(count: i64, start: i64) -> ForecastSeries {
        let ts: Vec<i64> = (0..count).map(|i| start + i * 3 * 3600).collect();
        series(&ts)
    }

    #[test]
    fn hourly_view_takes_prefix_in_order() {
        let s = three_hourly(40, SERIES_START);
        let hourly = hourly_view(&s, 12);

        assert_eq!(hourly.len(), 12);
        assert_eq!(hourly, &s.entries[..12]);
    }

    #[test]
    fn hourly_view_returns_everything_for_short_series() {
        let s = three_hourly(5, SERIES_START);
        assert_eq!(hourly_view(&s, 12).len(), 5);
        assert!(hourly_view(&three_hourly(0, SERIES_START), 12).is_empty());
    }

    #[test]
    fn hourly_view_is_idempotent() {
        let s = three_hourly(40, SERIES_START);
        assert_eq!(hourly_view(&s, 7), hourly_view(&s, 7));
        assert_eq!(s.hourly(7), hourly_view(&s, 7));
    }

    #[test]
    fn daily_view_keeps_one_noon_entry_per_day() {
        // 40 three-hour steps from 03:00 cover five noons.
        let s = three_hourly(40, SERIES_START + 3 * 3600);
        let daily = daily_view(&s, noon());

        assert_eq!(daily.len(), 5);
        for pair in daily.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
            assert_ne!(
                pair[0].timestamp.date_naive(),
                pair[1].timestamp.date_naive()
            );
        }
        assert!(daily
            .iter()
            .all(|e| e.timestamp.naive_utc().time() == noon()));
    }

    #[test]
    fn daily_view_skips_dates_without_anchor_slot() {
        // Offsets of 1h never land on noon.
        let s = three_hourly(16, SERIES_START + 3600);
        assert!(daily_view(&s, noon()).is_empty());
    }

    #[test]
    fn daily_view_leaves_gaps_for_missing_dates() {
        let noon_day1 = SERIES_START + 12 * 3600;
        let s = series(&[noon_day1, noon_day1 + 86_400, noon_day1 + 3 * 86_400]);
        let daily = daily_view(&s, noon());

        assert_eq!(daily.len(), 3);
        assert_eq!(
            daily[2].timestamp.date_naive() - daily[1].timestamp.date_naive(),
            chrono::Duration::days(2)
        );
    }

    #[test]
    fn custom_anchor_is_honoured() {
        let s = three_hourly(16, SERIES_START);
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let daily = s.daily(nine);

        assert_eq!(daily.len(), 2);
        assert!(daily.iter().all(|e| e.timestamp.naive_utc().time() == nine));
    }
}
