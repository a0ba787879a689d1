//! Core library for the `skycast` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over the weather provider and its OpenWeather client
//! - Shared domain models (locations, snapshots, forecast and pollution series)
//! - The fetchers and the aggregation controller that ties them to one location
//!
//! It is used by `skycast-cli`, but the controller can drive any other front end.

pub mod config;
pub mod controller;
pub mod current;
pub mod error;
pub mod forecast;
pub mod historical;
pub mod model;
pub mod pollution;
pub mod provider;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use controller::{
    AggregateSnapshot, AggregationController, ControllerSettings, LoadStatus, Section, View,
};
pub use current::CurrentConditionsFetcher;
pub use error::{ErrorKind, WeatherError};
pub use forecast::{ForecastFetcher, daily_view, hourly_view};
pub use historical::HistoricalRangeFetcher;
pub use model::{
    Aqi, ConditionGroup, ForecastSeries, HistoricalWindow, HistoryQuery, Location,
    PollutionComponents, PollutionSample, PollutionSeries, RequestEpoch, WeatherSnapshot,
};
pub use pollution::{CorrelatedSample, PollutionFetcher, correlate_by_timestamp};
pub use provider::{
    CurrentReport, Endpoints, ProviderError, WeatherProvider, provider_from_config,
};
pub use resolver::LocationResolver;
