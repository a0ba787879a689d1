//! Plain-text rendering of pipeline results.

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use skycast_core::{
    ForecastSeries, HistoricalWindow, Location, PollutionSeries, WeatherSnapshot,
    correlate_by_timestamp, pollution::DEFAULT_CORRELATION_TOLERANCE,
};

const GAUGE_WIDTH: usize = 10;

/// The city's offset from UTC when the provider reported one, UTC otherwise.
pub fn zone(utc_offset_secs: Option<i32>) -> FixedOffset {
    utc_offset_secs
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

fn clock(ts: DateTime<Utc>, tz: &FixedOffset) -> String {
    ts.with_timezone(tz).format("%H:%M").to_string()
}

fn gauge(pct: f64) -> String {
    let filled = ((pct / 100.0) * GAUGE_WIDTH as f64).round() as usize;
    let filled = filled.min(GAUGE_WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(GAUGE_WIDTH - filled))
}

pub fn current(location: &Location, snapshot: &WeatherSnapshot, tz: &FixedOffset) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", location.display_name());
    let _ = writeln!(
        out,
        "  {:.1}°C  {} ({})",
        snapshot.temperature_c,
        snapshot.description,
        snapshot.condition_group().label()
    );
    if let Some(feels_like) = snapshot.feels_like_c {
        let _ = writeln!(out, "  feels like {feels_like:.1}°C");
    }
    let _ = writeln!(out, "  humidity {}%", snapshot.humidity_pct);
    let _ = writeln!(
        out,
        "  pressure {:>6.0} hPa  {}",
        snapshot.pressure_hpa,
        gauge(snapshot.pressure_gauge_pct())
    );
    let _ = writeln!(
        out,
        "  wind     {:>6.1} km/h {}",
        snapshot.wind_speed_kmh(),
        gauge(snapshot.wind_gauge_pct())
    );
    if let (Some(sunrise), Some(sunset)) = (snapshot.sunrise, snapshot.sunset) {
        let _ = writeln!(
            out,
            "  sunrise {}  sunset {}",
            clock(sunrise, tz),
            clock(sunset, tz)
        );
    }
    out
}

pub fn hourly(entries: &[WeatherSnapshot], tz: &FixedOffset) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "{}  {:>6.1}°C  {}",
            entry.timestamp.with_timezone(tz).format("%a %H:%M"),
            entry.temperature_c,
            entry.description
        );
    }
    out
}

pub fn daily(entries: &[&WeatherSnapshot], tz: &FixedOffset) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "{}  {:>6.1}°C  {}",
            entry.timestamp.with_timezone(tz).format("%a %d %b"),
            entry.temperature_c,
            entry.condition_group().label()
        );
    }
    out
}

/// Air quality per hour, with the nearest forecast temperature when one is close enough.
pub fn air_quality(
    pollution: &PollutionSeries,
    forecast: Option<&ForecastSeries>,
    tz: &FixedOffset,
) -> String {
    let mut out = String::new();
    let empty = ForecastSeries {
        city_name: None,
        country: None,
        utc_offset_secs: None,
        sunrise: None,
        sunset: None,
        entries: Vec::new(),
    };
    let forecast = forecast.unwrap_or(&empty);

    for row in correlate_by_timestamp(pollution, forecast, DEFAULT_CORRELATION_TOLERANCE) {
        let c = &row.pollution.components;
        let _ = write!(
            out,
            "{}  AQI {} ({:<9})  PM2.5 {:>6.1}  PM10 {:>6.1}  O3 {:>6.1}  NO2 {:>6.1}",
            row.timestamp.with_timezone(tz).format("%a %H:%M"),
            row.pollution.aqi.value(),
            row.pollution.aqi.label(),
            c.pm2_5,
            c.pm10,
            c.o3,
            c.no2
        );
        if let Some(weather) = row.weather {
            let _ = write!(out, "  {:.1}°C", weather.temperature_c);
        }
        out.push('\n');
    }
    out
}

pub fn history(window: &HistoricalWindow) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}, {}  {} .. {} (UTC)",
        window.location,
        window.country_code,
        window.start.format("%Y-%m-%d %H:%M"),
        window.end.format("%Y-%m-%d %H:%M")
    );
    for sample in &window.samples {
        let _ = writeln!(
            out,
            "{}  {:>6.1}°C  {:>3}%  {}",
            sample.timestamp.format("%H:%M"),
            sample.temperature_c,
            sample.humidity_pct,
            sample.description
        );
    }
    out
}
