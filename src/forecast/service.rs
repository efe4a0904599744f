//! End-to-end forecasting: fetch, aggregate, normalize, load or train,
//! predict, backtest.

use tracing::{debug, info, warn};

use super::aggregate::{aggregate, AggregatedSeries};
use super::backend::{
    ForecastBackend, LinearBackend, ModelKind, SeasonalBackend, TrainedModel,
};
use super::outliers::{winsorize, DEFAULT_Z_THRESHOLD};
use super::report::{backtest, ForecastOutcome, ForecastReport, Metrics};
use crate::config::ForecastConfig;
use crate::errors::{ForecastError, Result};
use crate::ledger::Frequency;
use crate::storage::{ModelStore, TransactionSource};

/// Largest horizon a request may ask for.
pub const MAX_PERIODS: usize = 365;

/// A validated forecasting request.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    periods: usize,
    frequency: Frequency,
    model_kind: ModelKind,
    model_name: Option<String>,
    retrain: bool,
}

impl ForecastRequest {
    pub fn new(periods: usize, frequency: Frequency, model_kind: ModelKind) -> Result<Self> {
        if periods == 0 || periods > MAX_PERIODS {
            return Err(ForecastError::InvalidHorizon(
                i64::try_from(periods).unwrap_or(i64::MAX),
            ));
        }
        Ok(Self {
            periods,
            frequency,
            model_kind,
            model_name: None,
            retrain: false,
        })
    }

    /// Validates raw parameters, e.g. from a command line.
    pub fn parse(periods: &str, frequency: &str, model: &str) -> Result<Self> {
        let periods: i64 = periods.trim().parse().map_err(|_| {
            ForecastError::InvalidInput(format!("periods must be an integer, got `{}`", periods))
        })?;
        if periods < 1 || periods > MAX_PERIODS as i64 {
            return Err(ForecastError::InvalidHorizon(periods));
        }
        let frequency = Frequency::parse(frequency)?;
        let model_kind = ModelKind::parse(model)?;
        Self::new(periods as usize, frequency, model_kind)
    }

    pub fn from_config(config: &ForecastConfig) -> Result<Self> {
        Self::new(
            config.default_periods as usize,
            Frequency::parse(&config.default_frequency)?,
            ModelKind::parse(&config.default_model)?,
        )
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    /// Ignore any stored model and fit a fresh one.
    pub fn with_retrain(mut self, retrain: bool) -> Self {
        self.retrain = retrain;
        self
    }

    pub fn periods(&self) -> usize {
        self.periods
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn model_kind(&self) -> ModelKind {
        self.model_kind
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    pub fn retrain(&self) -> bool {
        self.retrain
    }
}

pub struct ForecastService<S> {
    store: S,
    seasonal: SeasonalBackend,
    linear: LinearBackend,
    z_threshold: f64,
}

impl<S: ModelStore> ForecastService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            seasonal: SeasonalBackend::default(),
            linear: LinearBackend::new(),
            z_threshold: DEFAULT_Z_THRESHOLD,
        }
    }

    pub fn from_config(store: S, config: &ForecastConfig) -> Self {
        Self::new(store)
            .with_seasonal(SeasonalBackend::new(config.primary_enabled))
            .with_z_threshold(config.outlier_z_threshold)
    }

    pub fn with_seasonal(mut self, seasonal: SeasonalBackend) -> Self {
        self.seasonal = seasonal;
        self
    }

    pub fn with_z_threshold(mut self, z_threshold: f64) -> Self {
        self.z_threshold = z_threshold;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one request. Empty sources produce [`ForecastOutcome::NoData`]
    /// without touching the model store.
    pub fn run<T>(&self, source: &T, request: &ForecastRequest) -> Result<ForecastOutcome>
    where
        T: TransactionSource + ?Sized,
    {
        let records = source.fetch_all()?;
        info!(records = records.len(), "fetched expense records");
        if records.is_empty() {
            info!("no expense data available; skipping training");
            return Ok(ForecastOutcome::NoData);
        }

        let series = aggregate(&records, request.frequency())?;
        let normalized = winsorize(&series, self.z_threshold)?;

        let (backend, degraded) = self.resolve_backend(request.model_kind());
        let model_name = request
            .model_name()
            .map(str::to_string)
            .unwrap_or_else(|| backend.kind().default_model_name());

        let (model, trained) = self.load_or_train(backend, &model_name, &normalized, request)?;
        let forecast = model.predict(request.periods(), request.frequency())?;
        let metrics = if trained {
            backtest(&normalized, &forecast)
        } else {
            Metrics::default()
        };

        info!(
            model = %model_name,
            backend = %backend.kind(),
            rows = forecast.len(),
            mae = ?metrics.mae,
            degraded,
            "forecast ready"
        );
        Ok(ForecastOutcome::Forecast(ForecastReport {
            forecast,
            metrics,
            backend: backend.kind(),
            model_name,
            degraded,
            trained,
        }))
    }

    fn resolve_backend(&self, requested: ModelKind) -> (&dyn ForecastBackend, bool) {
        match requested {
            ModelKind::Seasonal if self.seasonal.is_available() => {
                (&self.seasonal as &dyn ForecastBackend, false)
            }
            ModelKind::Seasonal => {
                warn!("seasonal backend unavailable; falling back to linear model");
                (&self.linear as &dyn ForecastBackend, true)
            }
            ModelKind::Linear => (&self.linear as &dyn ForecastBackend, false),
        }
    }

    fn load_or_train(
        &self,
        backend: &dyn ForecastBackend,
        name: &str,
        series: &AggregatedSeries,
        request: &ForecastRequest,
    ) -> Result<(TrainedModel, bool)> {
        if !request.retrain() {
            match self.store.load(name, backend.kind())? {
                Some(model)
                    if model.kind() == backend.kind()
                        && model.frequency() == request.frequency() =>
                {
                    info!(model = name, "loaded stored model");
                    return Ok((model, false));
                }
                Some(model) => {
                    info!(
                        model = name,
                        stored_kind = %model.kind(),
                        stored_frequency = %model.frequency(),
                        "stored model does not match request; retraining"
                    );
                }
                None => debug!(model = name, "no stored model"),
            }
        }

        let model = backend.train(series)?;
        self.store.save(name, &model)?;
        info!(
            model = name,
            periods = series.len(),
            "trained and saved model"
        );
        Ok((model, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_valid_parameters() {
        let request = ForecastRequest::parse("30", "W", "lr").unwrap();
        assert_eq!(request.periods(), 30);
        assert_eq!(request.frequency(), Frequency::Week);
        assert_eq!(request.model_kind(), ModelKind::Linear);
        assert_eq!(request.model_name(), None);
        assert!(!request.retrain());
    }

    #[test]
    fn parse_rejects_out_of_range_periods() {
        assert!(matches!(
            ForecastRequest::parse("0", "D", "lr"),
            Err(ForecastError::InvalidHorizon(0))
        ));
        assert!(matches!(
            ForecastRequest::parse("-3", "D", "lr"),
            Err(ForecastError::InvalidHorizon(-3))
        ));
        assert!(matches!(
            ForecastRequest::parse("366", "D", "lr"),
            Err(ForecastError::InvalidHorizon(366))
        ));
        assert!(matches!(
            ForecastRequest::parse("ten", "D", "lr"),
            Err(ForecastError::InvalidInput(_))
        ));
    }

    #[test]
    fn parse_rejects_unknown_codes() {
        assert!(matches!(
            ForecastRequest::parse("7", "H", "lr"),
            Err(ForecastError::InvalidFrequency(_))
        ));
        assert!(matches!(
            ForecastRequest::parse("7", "D", "arima"),
            Err(ForecastError::UnknownModel(_))
        ));
    }

    #[test]
    fn defaults_come_from_config() {
        let request = ForecastRequest::from_config(&ForecastConfig::default()).unwrap();
        assert_eq!(request.periods(), 7);
        assert_eq!(request.frequency(), Frequency::Day);
        assert_eq!(request.model_kind(), ModelKind::Linear);
    }

    #[test]
    fn builder_sets_name_and_retrain() {
        let request = ForecastRequest::new(5, Frequency::MonthStart, ModelKind::Seasonal)
            .unwrap()
            .with_model_name("household")
            .with_retrain(true);
        assert_eq!(request.model_name(), Some("household"));
        assert!(request.retrain());
    }
}
