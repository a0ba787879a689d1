use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use inquire::{Password, Text};
use skycast_core::{
    AggregateSnapshot, AggregationController, Config, ControllerSettings, LoadStatus, Section,
    View, WeatherError, WeatherProvider, provider_from_config,
};
use tracing::debug;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "skycast",
    version,
    about = "Current weather, forecast and air quality from OpenWeather"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Where to look. A city name, or device-style coordinates.
#[derive(Debug, Args)]
pub struct Place {
    /// City name; defaults to the configured city.
    pub city: Option<String>,

    #[arg(long, requires = "lon", conflicts_with = "city", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Print the full snapshot as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key and default city.
    Configure,

    /// Current conditions.
    Current(Place),

    /// Hourly forecast, or one entry per day with `--daily`.
    Forecast {
        #[command(flatten)]
        place: Place,

        /// Number of forecast entries to show; defaults to the configured count.
        #[arg(long)]
        hours: Option<usize>,

        #[arg(long)]
        daily: bool,
    },

    /// Air-quality forecast.
    Pollution(Place),

    /// Hourly readings for one past day.
    History {
        city: String,

        /// ISO country code, e.g. JO.
        country: String,

        /// YYYY-MM-DD
        date: String,

        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Current(place) => {
                let config = Config::load()?;
                let snapshot = load(&config, &place, View::Weather).await?;
                if place.json {
                    return print_json(&snapshot);
                }
                if let (Some(location), Some(current)) = (&snapshot.location, &snapshot.current) {
                    let tz = render::zone(offset_of(&snapshot));
                    print!("{}", render::current(location, current, &tz));
                }
                Ok(())
            }
            Command::Forecast {
                place,
                hours,
                daily,
            } => {
                let config = Config::load()?;
                let anchor = config.daily_anchor()?;
                let snapshot = load(&config, &place, View::Weather).await?;
                if place.json {
                    return print_json(&snapshot);
                }
                let Some(forecast) = &snapshot.forecast else {
                    return Ok(());
                };
                let tz = render::zone(forecast.utc_offset_secs);
                if let Some(location) = &snapshot.location {
                    println!("{}", location.display_name());
                }
                if daily {
                    print!("{}", render::daily(&forecast.daily(anchor), &tz));
                } else {
                    let n = hours.unwrap_or_else(|| config.hourly_count());
                    print!("{}", render::hourly(forecast.hourly(n), &tz));
                }
                Ok(())
            }
            Command::Pollution(place) => {
                let config = Config::load()?;
                let snapshot = load(&config, &place, View::AirQuality).await?;
                if place.json {
                    return print_json(&snapshot);
                }
                match &snapshot.pollution {
                    Section::Ready(series) => {
                        if let Some(location) = &snapshot.location {
                            println!("{}", location.display_name());
                        }
                        let tz = render::zone(offset_of(&snapshot));
                        print!(
                            "{}",
                            render::air_quality(series, snapshot.forecast.as_ref(), &tz)
                        );
                        Ok(())
                    }
                    Section::Failed(err) => Err(err.clone().into()),
                    Section::Idle | Section::Loading => Ok(()),
                }
            }
            Command::History {
                city,
                country,
                date,
                json,
            } => {
                let config = Config::load()?;
                let controller = spawn(&config, View::Weather)?;
                controller.query_history(&city, &country, &date);
                let snapshot = controller.history_settled().await;
                controller.shutdown().await;

                match &snapshot.history {
                    Section::Ready(window) if json => {
                        println!("{}", serde_json::to_string_pretty(window)?);
                        Ok(())
                    }
                    Section::Ready(window) => {
                        print!("{}", render::history(window));
                        Ok(())
                    }
                    Section::Failed(err) => Err(err.clone().into()),
                    Section::Idle | Section::Loading => Ok(()),
                }
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key);

    let city = Text::new("Default city:")
        .with_default(config.default_city())
        .prompt()
        .context("Failed to read default city")?;
    config.default_city = Some(city.trim().to_string()).filter(|c| !c.is_empty());

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn spawn(config: &Config, view: View) -> Result<AggregationController, WeatherError> {
    let provider: Arc<dyn WeatherProvider> = provider_from_config(config)?;
    let settings = ControllerSettings {
        initial_view: view,
        ..ControllerSettings::from_config(config)
    };
    Ok(AggregationController::spawn(provider, settings))
}

/// Drive one selection to completion and hand back what was published.
async fn load(config: &Config, place: &Place, view: View) -> anyhow::Result<AggregateSnapshot> {
    let controller = spawn(config, view)?;

    match (place.lat, place.lon) {
        (Some(lat), Some(lon)) => controller.select_coordinates(lat, lon),
        _ => {
            let city = place.city.as_deref().unwrap_or(config.default_city());
            debug!(city, "searching");
            controller.search_city(city);
        }
    }

    let snapshot = controller.settled().await;
    controller.shutdown().await;

    if let (LoadStatus::Failed, Some(err)) = (snapshot.status, &snapshot.error) {
        return Err(err.clone().into());
    }
    Ok(snapshot)
}

fn offset_of(snapshot: &AggregateSnapshot) -> Option<i32> {
    snapshot.forecast.as_ref().and_then(|f| f.utc_offset_secs)
}

fn print_json(snapshot: &AggregateSnapshot) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(snapshot)?);
    Ok(())
}
