/// Compile-time build metadata produced by `build.rs`.
#[derive(Debug, Clone, Copy)]
pub struct BuildMetadata {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_status: &'static str,
    pub timestamp: &'static str,
    pub profile: &'static str,
    pub seasonal_engine: &'static str,
}

/// Returns the statically-embedded build metadata.
pub fn current() -> BuildMetadata {
    BuildMetadata {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("SPEND_FORECAST_BUILD_HASH").unwrap_or("unknown"),
        git_status: option_env!("SPEND_FORECAST_BUILD_STATUS").unwrap_or("unknown"),
        timestamp: option_env!("SPEND_FORECAST_BUILD_TIMESTAMP").unwrap_or("unknown"),
        profile: option_env!("SPEND_FORECAST_BUILD_PROFILE").unwrap_or("unknown"),
        seasonal_engine: option_env!("SPEND_FORECAST_BUILD_SEASONAL").unwrap_or("unknown"),
    }
}

impl BuildMetadata {
    pub fn summary(&self) -> String {
        format!(
            "spend_forecast {} ({} {}, {} build, seasonal engine {}, built {})",
            self.version,
            self.git_hash,
            self.git_status,
            self.profile,
            self.seasonal_engine,
            self.timestamp
        )
    }
}
