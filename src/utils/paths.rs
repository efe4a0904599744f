use dirs::home_dir;
use std::{
    env,
    path::{Path, PathBuf},
};

const DEFAULT_DIR_NAME: &str = ".spend_forecast";
const HOME_ENV: &str = "SPEND_FORECAST_HOME";
const MODEL_DIR_ENV: &str = "SPEND_FORECAST_MODEL_DIR";
const MODELS_DIR: &str = "models";
const BACKUP_DIR: &str = "backups";
const CONFIG_DIR: &str = "config";
const CONFIG_FILE: &str = "config.json";
const EXPENSES_FILE: &str = "expenses.json";

/// Resolves every on-disk location used by the application.
pub struct PathResolver;

impl PathResolver {
    /// Application data directory: `SPEND_FORECAST_HOME`, else `~/.spend_forecast`.
    pub fn base_dir() -> PathBuf {
        if let Some(custom) = env::var_os(HOME_ENV) {
            return PathBuf::from(custom);
        }
        home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR_NAME)
    }

    pub fn resolve_base(custom: Option<PathBuf>) -> PathBuf {
        custom.unwrap_or_else(Self::base_dir)
    }

    /// Model artifacts live under `SPEND_FORECAST_MODEL_DIR` when set.
    pub fn models_dir_in(base: &Path) -> PathBuf {
        match env::var_os(MODEL_DIR_ENV) {
            Some(custom) => PathBuf::from(custom),
            None => base.join(MODELS_DIR),
        }
    }

    pub fn backup_dir_in(base: &Path) -> PathBuf {
        base.join(BACKUP_DIR)
    }

    pub fn config_dir_in(base: &Path) -> PathBuf {
        base.join(CONFIG_DIR)
    }

    pub fn config_file_in(base: &Path) -> PathBuf {
        Self::config_dir_in(base).join(CONFIG_FILE)
    }

    pub fn expenses_file_in(base: &Path) -> PathBuf {
        base.join(EXPENSES_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted_at_base() {
        let base = PathBuf::from("/tmp/spend");
        assert_eq!(
            PathResolver::config_file_in(&base),
            base.join("config").join("config.json")
        );
        assert_eq!(PathResolver::expenses_file_in(&base), base.join("expenses.json"));
        assert_eq!(PathResolver::backup_dir_in(&base), base.join("backups"));
    }

    #[test]
    fn explicit_base_wins_over_environment() {
        let custom = PathBuf::from("/srv/forecast");
        assert_eq!(PathResolver::resolve_base(Some(custom.clone())), custom);
    }
}
