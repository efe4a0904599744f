#![doc(test(attr(deny(warnings))))]

//! Spend Forecast turns a log of expenses into per-period spending
//! forecasts, with a seasonal-trend model and a linear fallback.

pub mod config;
pub mod errors;
pub mod forecast;
pub mod ledger;
pub mod storage;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Spend Forecast tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init();
    }
}
