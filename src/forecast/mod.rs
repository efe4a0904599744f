//! The forecasting pipeline: aggregation, outlier clipping, model backends,
//! the request orchestrator and its response shapes.

pub mod aggregate;
pub mod backend;
pub mod outliers;
pub mod report;
pub mod service;

pub use aggregate::{aggregate, AggregatedSeries, SeriesPoint};
pub use backend::{
    ForecastBackend, ForecastRow, LinearBackend, ModelKind, SeasonalBackend, TrainedModel,
};
pub use outliers::{winsorize, DEFAULT_Z_THRESHOLD};
pub use report::{backtest, ForecastOutcome, ForecastReport, ForecastResponse, Metrics};
pub use service::{ForecastRequest, ForecastService, MAX_PERIODS};
