use std::sync::Arc;

use chrono::{DateTime, Duration, Local, LocalResult, NaiveDate, TimeZone, Utc};
use tracing::debug;

use crate::{
    error::WeatherError,
    model::{HistoricalWindow, HistoryQuery},
    provider::WeatherProvider,
};

pub const WINDOW_SECS: i64 = 86_400;

/// Hourly readings for one calendar day in the past.
#[derive(Debug, Clone)]
pub struct HistoricalRangeFetcher {
    provider: Arc<dyn WeatherProvider>,
}

impl HistoricalRangeFetcher {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    /// Window starts at local midnight of `date` in this process's time zone.
    pub async fn fetch(
        &self,
        city: &str,
        country_code: &str,
        date: &str,
    ) -> Result<HistoricalWindow, WeatherError> {
        self.fetch_in(city, country_code, date, &Local).await
    }

    pub async fn fetch_in<Tz: TimeZone>(
        &self,
        city: &str,
        country_code: &str,
        date: &str,
        tz: &Tz,
    ) -> Result<HistoricalWindow, WeatherError> {
        let query = HistoryQuery::parse(city, country_code, date)?;
        let (start, end) = day_window(query.date, tz);
        self.fetch_window(query, start, end).await
    }

    pub(crate) async fn fetch_window(
        &self,
        query: HistoryQuery,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HistoricalWindow, WeatherError> {
        debug!(city = %query.city, country = %query.country_code, %start, %end, "fetching history");

        let samples = self
            .provider
            .history(&query, start, end)
            .await
            .map_err(WeatherError::from_fetch)?;

        Ok(HistoricalWindow {
            location: query.city,
            country_code: query.country_code,
            start,
            end,
            samples,
        })
    }
}

impl HistoryQuery {
    /// Validates the three user-supplied fields; the date is `YYYY-MM-DD`.
    pub fn parse(city: &str, country_code: &str, date: &str) -> Result<Self, WeatherError> {
        let (city, country_code, date) = (city.trim(), country_code.trim(), date.trim());
        if city.is_empty() || country_code.is_empty() || date.is_empty() {
            return Err(WeatherError::InvalidInput(
                "Please enter city, country, and date".to_string(),
            ));
        }

        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
            WeatherError::InvalidInput(format!("date '{date}' is not YYYY-MM-DD: {e}"))
        })?;

        Ok(Self {
            city: city.to_string(),
            country_code: country_code.to_string(),
            date,
        })
    }
}

/// `[midnight, midnight + 24h)` for `date` in `tz`, in UTC.
///
/// The window length is fixed at 86 400 s even across DST changes. When
/// midnight does not exist locally the window starts at the first valid
/// instant of that date.
pub fn day_window<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = date.and_time(chrono::NaiveTime::MIN);

    let start = match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => first_valid_instant(date, tz),
    };

    (start, start + Duration::seconds(WINDOW_SECS))
}

fn first_valid_instant<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    (1..=24 * 60)
        .map(|m| midnight + Duration::minutes(m))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        // Unreachable for real zones: no gap spans a whole day.
        .unwrap_or_else(|| midnight.and_utc())
}
