use std::path::PathBuf;

use crate::adaptive::config::env_var;
use crate::adaptive::{AdaptiveConfig, RankerConfig};
use crate::logging::LogSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub logging: LogSettings,
    pub adaptive: AdaptiveConfig,
    pub ranker: RankerConfig,
    /// Directory for the JSON file store; in-memory when unset.
    pub store_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(env_var)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let store_dir = lookup("TUTOR_STORE_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            logging: LogSettings::from_lookup(&lookup),
            adaptive: AdaptiveConfig::from_lookup(&lookup),
            ranker: RankerConfig::from_lookup(&lookup),
            store_dir,
        }
    }
}
