//! Owns the active location and everything fetched for it.
//!
//! The controller is an actor: a single task holds all mutable state,
//! commands arrive over a channel, fetches run as separate tasks and report
//! back tagged with the [`RequestEpoch`] they were issued under. Consumers
//! observe an immutable [`AggregateSnapshot`] through a `watch` channel.
//!
//! Only results for the current epoch are ever published ("last location
//! wins"). Superseded fetches are not aborted; their results are dropped
//! when they arrive.

use std::{future::Future, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    config::{Config, DEFAULT_FETCH_TIMEOUT_SECS},
    current::CurrentConditionsFetcher,
    error::WeatherError,
    forecast::ForecastFetcher,
    historical::{HistoricalRangeFetcher, day_window},
    model::{
        ForecastSeries, HistoricalWindow, HistoryQuery, Location, PollutionSeries, RequestEpoch,
        WeatherSnapshot,
    },
    pollution::PollutionFetcher,
    provider::WeatherProvider,
    resolver::{LocationResolver, validate_city_name, validate_coordinates},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Which consumer view is active; decides whether pollution is required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Weather,
    AirQuality,
}

impl View {
    pub fn requires_pollution(self) -> bool {
        matches!(self, View::AirQuality)
    }
}

/// State of a secondary sub-view. Failures here never affect [`LoadStatus`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Section<T> {
    #[default]
    Idle,
    Loading,
    Ready(T),
    Failed(WeatherError),
}

impl<T> Section<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&WeatherError> {
        match self {
            Section::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Section::Loading)
    }

    fn from_result(result: Result<T, WeatherError>) -> Self {
        match result {
            Ok(value) => Section::Ready(value),
            Err(err) => Section::Failed(err),
        }
    }
}

/// Everything a consumer may render, as of one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub epoch: RequestEpoch,
    pub status: LoadStatus,
    pub view: View,
    pub location: Option<Location>,
    pub current: Option<WeatherSnapshot>,
    pub forecast: Option<ForecastSeries>,
    pub pollution: Section<PollutionSeries>,
    pub history: Section<HistoricalWindow>,
    /// The failure behind `LoadStatus::Failed`, one per failed selection.
    pub error: Option<WeatherError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub fetch_timeout: Duration,
    pub initial_view: View,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            initial_view: View::Weather,
        }
    }
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetch_timeout: config.fetch_timeout(),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
enum Command {
    SelectCoordinates { latitude: f64, longitude: f64 },
    SearchCity(String),
    SelectView(View),
    Refresh,
    QueryHistory {
        city: String,
        country_code: String,
        date: String,
    },
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
enum Outcome {
    Resolved(Result<Location, WeatherError>),
    Current(Result<WeatherSnapshot, WeatherError>),
    Forecast(Result<ForecastSeries, WeatherError>),
    Pollution(Result<PollutionSeries, WeatherError>),
}

#[derive(Debug)]
enum Completion {
    Location {
        epoch: RequestEpoch,
        outcome: Outcome,
    },
    History {
        seq: RequestEpoch,
        result: Result<HistoricalWindow, WeatherError>,
    },
}

/// Handle to the running pipeline. Dropping it stops the actor.
#[derive(Debug)]
pub struct AggregationController {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<AggregateSnapshot>,
    task: JoinHandle<()>,
}

impl AggregationController {
    /// Start the actor on the current tokio runtime.
    pub fn spawn(provider: Arc<dyn WeatherProvider>, settings: ControllerSettings) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (completions, completion_rx) = mpsc::unbounded_channel();
        let initial = AggregateSnapshot {
            view: settings.initial_view,
            ..AggregateSnapshot::default()
        };
        let (publisher, state) = watch::channel(initial.clone());

        let pipeline = Pipeline {
            resolver: LocationResolver::new(provider.clone()),
            current: CurrentConditionsFetcher::new(provider.clone()),
            forecast: ForecastFetcher::new(provider.clone()),
            pollution: PollutionFetcher::new(provider.clone()),
            historical: HistoricalRangeFetcher::new(provider),
            timeout: settings.fetch_timeout,
            history_seq: RequestEpoch::default(),
            pending: Pending::default(),
            published: initial,
            publisher,
            completions,
        };

        let task = tokio::spawn(pipeline.run(command_rx, completion_rx));

        Self {
            commands,
            state,
            task,
        }
    }

    /// Geolocation callback: device coordinates become the active location.
    pub fn select_coordinates(&self, latitude: f64, longitude: f64) {
        self.send(Command::SelectCoordinates {
            latitude,
            longitude,
        });
    }

    pub fn search_city(&self, name: &str) {
        self.send(Command::SearchCity(name.to_string()));
    }

    pub fn select_view(&self, view: View) {
        self.send(Command::SelectView(view));
    }

    /// Fetch again for the active location, without resolving it again.
    pub fn refresh(&self) {
        self.send(Command::Refresh);
    }

    pub fn query_history(&self, city: &str, country_code: &str, date: &str) {
        self.send(Command::QueryHistory {
            city: city.to_string(),
            country_code: country_code.to_string(),
            date: date.to_string(),
        });
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AggregateSnapshot> {
        self.state.clone()
    }

    /// Wait until the active selection has left `Loading`.
    ///
    /// Call after issuing a command; commands are applied in order, so the
    /// first non-loading state observed belongs to the latest command.
    pub async fn settled(&self) -> AggregateSnapshot {
        self.wait_for(|s| s.status != LoadStatus::Loading && !s.pollution.is_loading())
            .await
    }

    pub async fn history_settled(&self) -> AggregateSnapshot {
        self.wait_for(|s| !s.history.is_loading()).await
    }

    async fn wait_for(&self, done: impl FnMut(&AggregateSnapshot) -> bool) -> AggregateSnapshot {
        self.flush().await;
        let mut rx = self.state.clone();
        match rx.wait_for(done).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Resolves once every command sent before it has been applied.
    async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx));
        let _ = rx.await;
    }

    /// Stop accepting commands and wait for the actor to finish.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            warn!(error = %e, "aggregation task ended abnormally");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("aggregation task is gone; command dropped");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Pending {
    resolution: bool,
    current: bool,
    forecast: bool,
    pollution: bool,
}

impl Pending {
    fn primary(&self) -> bool {
        self.resolution || self.current || self.forecast
    }
}

struct Pipeline {
    resolver: LocationResolver,
    current: CurrentConditionsFetcher,
    forecast: ForecastFetcher,
    pollution: PollutionFetcher,
    historical: HistoricalRangeFetcher,
    timeout: Duration,
    history_seq: RequestEpoch,
    pending: Pending,
    published: AggregateSnapshot,
    publisher: watch::Sender<AggregateSnapshot>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl Pipeline {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                // The pipeline keeps its own sender, so this channel never closes.
                Some(completion) = completions.recv() => self.handle_completion(completion),
            }
        }
        debug!("aggregation task stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SelectCoordinates {
                latitude,
                longitude,
            } => {
                self.begin_selection();
                match validate_coordinates(latitude, longitude) {
                    Ok(()) => {
                        let resolver = self.resolver.clone();
                        let timeout = self.timeout;
                        self.pending.resolution = true;
                        self.spawn_location(async move {
                            Outcome::Resolved(
                                with_timeout(
                                    timeout,
                                    resolver.resolve_by_coordinates(latitude, longitude),
                                )
                                .await,
                            )
                        });
                    }
                    Err(err) => self.fail(err),
                }
            }
            Command::SearchCity(name) => {
                self.begin_selection();
                match validate_city_name(&name) {
                    Ok(city) => {
                        let city = city.to_string();
                        let resolver = self.resolver.clone();
                        let timeout = self.timeout;
                        self.pending.resolution = true;
                        self.spawn_location(async move {
                            Outcome::Resolved(
                                with_timeout(timeout, resolver.resolve_by_name(&city)).await,
                            )
                        });
                    }
                    Err(err) => self.fail(err),
                }
            }
            Command::Refresh => match self.published.location.clone() {
                Some(location) => {
                    self.begin_selection();
                    self.published.location = Some(location.clone());
                    self.fan_out(&location);
                }
                None => debug!("refresh ignored: no active location"),
            },
            Command::SelectView(view) => {
                self.published.view = view;
                self.ensure_pollution();
                self.settle();
            }
            Command::QueryHistory {
                city,
                country_code,
                date,
            } => self.query_history(&city, &country_code, &date),
            Command::Flush(done) => {
                let _ = done.send(());
                return;
            }
        }
        self.publish();
    }

    /// New epoch: everything bound to the previous location is superseded.
    fn begin_selection(&mut self) {
        let epoch = self.published.epoch.next();
        info!(epoch = epoch.value(), "location selection started");

        self.pending = Pending::default();
        self.published = AggregateSnapshot {
            epoch,
            status: LoadStatus::Loading,
            view: self.published.view,
            history: std::mem::take(&mut self.published.history),
            ..AggregateSnapshot::default()
        };
    }

    /// Primary and (when the view needs it) secondary fetches, concurrently.
    fn fan_out(&mut self, location: &Location) {
        let timeout = self.timeout;

        let current = self.current.clone();
        let target = location.clone();
        self.pending.current = true;
        self.spawn_location(async move {
            Outcome::Current(with_timeout(timeout, current.fetch(&target)).await)
        });

        let forecast = self.forecast.clone();
        let target = location.clone();
        self.pending.forecast = true;
        self.spawn_location(async move {
            Outcome::Forecast(with_timeout(timeout, forecast.fetch(&target)).await)
        });

        self.ensure_pollution();
    }

    /// Pollution is secondary: it is issued under the current epoch and
    /// never moves the selection back to `Loading`.
    fn ensure_pollution(&mut self) {
        if !self.published.view.requires_pollution()
            || !matches!(self.published.pollution, Section::Idle)
        {
            return;
        }
        let Some(location) = self.published.location.as_ref() else {
            return;
        };

        let (lat, lon) = (location.latitude(), location.longitude());
        let pollution = self.pollution.clone();
        let timeout = self.timeout;
        self.pending.pollution = true;
        self.published.pollution = Section::Loading;
        self.spawn_location(async move {
            Outcome::Pollution(with_timeout(timeout, pollution.fetch(lat, lon)).await)
        });
    }

    fn query_history(&mut self, city: &str, country_code: &str, date: &str) {
        self.history_seq = self.history_seq.next();
        let seq = self.history_seq;

        let query = match HistoryQuery::parse(city, country_code, date) {
            Ok(query) => query,
            Err(err) => {
                self.published.history = Section::Failed(err);
                return;
            }
        };

        // Midnight in this process's time zone.
        let (start, end) = day_window(query.date, &chrono::Local);
        let historical = self.historical.clone();
        let timeout = self.timeout;
        let tx = self.completions.clone();
        self.published.history = Section::Loading;

        tokio::spawn(async move {
            let result = with_timeout(timeout, historical.fetch_window(query, start, end)).await;
            let _ = tx.send(Completion::History { seq, result });
        });
    }

    /// Run a fetch tagged with the current epoch.
    fn spawn_location<F>(&self, fetch: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let epoch = self.published.epoch;
        let tx = self.completions.clone();

        tokio::spawn(async move {
            let outcome = fetch.await;
            let _ = tx.send(Completion::Location { epoch, outcome });
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Location { epoch, outcome } => {
                if epoch != self.published.epoch {
                    debug!(
                        stale = epoch.value(),
                        current = self.published.epoch.value(),
                        "discarding superseded result"
                    );
                    return;
                }
                self.apply(outcome);
            }
            Completion::History { seq, result } => {
                if seq != self.history_seq {
                    debug!(stale = seq.value(), "discarding superseded history result");
                    return;
                }
                self.published.history = Section::from_result(result);
            }
        }
        self.publish();
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Resolved(result) => {
                self.pending.resolution = false;
                match result {
                    Ok(location) => {
                        info!(place = location.display_name(), "location resolved");
                        self.published.location = Some(location.clone());
                        self.fan_out(&location);
                    }
                    Err(err) => self.fail(err),
                }
            }
            Outcome::Current(result) => {
                self.pending.current = false;
                match result {
                    Ok(snapshot) => self.published.current = Some(snapshot),
                    Err(err) => self.fail(err),
                }
            }
            Outcome::Forecast(result) => {
                self.pending.forecast = false;
                match result {
                    Ok(series) => self.published.forecast = Some(series),
                    Err(err) => self.fail(err),
                }
            }
            Outcome::Pollution(result) => {
                self.pending.pollution = false;
                if let Err(err) = &result {
                    warn!(error = %err, "air pollution unavailable");
                }
                self.published.pollution = Section::from_result(result);
            }
        }

        self.settle();
    }

    /// `Loading` becomes `Ready` once nothing the active view needs is outstanding.
    fn settle(&mut self) {
        let waiting_on_pollution =
            self.published.view.requires_pollution() && self.pending.pollution;
        if self.published.status == LoadStatus::Loading
            && !self.pending.primary()
            && !waiting_on_pollution
        {
            self.published.status = LoadStatus::Ready;
            info!(epoch = self.published.epoch.value(), "selection ready");
        }
    }

    /// A primary failure. Only the first one of a selection is reported.
    fn fail(&mut self, err: WeatherError) {
        if self.published.status == LoadStatus::Failed {
            debug!(error = %err, "further primary failure suppressed");
            return;
        }
        warn!(error = %err, "selection failed");
        self.published.status = LoadStatus::Failed;
        self.published.error = Some(err);
    }

    fn publish(&self) {
        self.publisher.send_replace(self.published.clone());
    }
}

async fn with_timeout<T>(
    limit: Duration,
    fetch: impl Future<Output = Result<T, WeatherError>>,
) -> Result<T, WeatherError> {
    tokio::time::timeout(limit, fetch)
        .await
        .unwrap_or_else(|_| Err(WeatherError::timeout(limit)))
}
