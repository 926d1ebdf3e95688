use serde::{Deserialize, Serialize};

use crate::adaptive::error::{AdaptiveError, AdaptiveResult};
use crate::adaptive::sanitize::{in_unit_interval, is_invalid};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub adjustment_rate: f64,
    pub min_difficulty: f64,
    pub max_difficulty: f64,
    pub expected_response_seconds: f64,
    pub mastery_threshold: f64,
    pub completed_threshold: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            adjustment_rate: 0.1,
            min_difficulty: 0.1,
            max_difficulty: 1.0,
            expected_response_seconds: 30.0,
            mastery_threshold: 0.9,
            completed_threshold: 0.7,
        }
    }
}

impl AdaptiveConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_var)
    }

    /// Defaults overridden by any `TUTOR_*` keys `lookup` resolves.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_f64 = |key: &str| parse_f64(lookup(key));
        let mut config = Self::default();

        if let Some(val) = env_f64("TUTOR_ADJUSTMENT_RATE") {
            config.adjustment_rate = val;
        }
        if let Some(val) = env_f64("TUTOR_MIN_DIFFICULTY") {
            config.min_difficulty = val;
        }
        if let Some(val) = env_f64("TUTOR_MAX_DIFFICULTY") {
            config.max_difficulty = val;
        }
        if let Some(val) = env_f64("TUTOR_EXPECTED_RESPONSE_SECONDS") {
            config.expected_response_seconds = val;
        }
        if let Some(val) = env_f64("TUTOR_MASTERY_THRESHOLD") {
            config.mastery_threshold = val;
        }
        if let Some(val) = env_f64("TUTOR_COMPLETED_THRESHOLD") {
            config.completed_threshold = val;
        }

        config
    }

    pub fn validate(&self) -> AdaptiveResult<()> {
        if !in_unit_interval(self.min_difficulty) || !in_unit_interval(self.max_difficulty) {
            return Err(AdaptiveError::config(format!(
                "difficulty bounds must be within [0, 1], got [{}, {}]",
                self.min_difficulty, self.max_difficulty
            )));
        }
        if self.min_difficulty > self.max_difficulty {
            return Err(AdaptiveError::config(format!(
                "min_difficulty ({}) > max_difficulty ({})",
                self.min_difficulty, self.max_difficulty
            )));
        }
        if is_invalid(self.adjustment_rate) || self.adjustment_rate < 0.0 {
            return Err(AdaptiveError::config(format!(
                "adjustment_rate must be non-negative, got {}",
                self.adjustment_rate
            )));
        }
        if is_invalid(self.expected_response_seconds) || self.expected_response_seconds <= 0.0 {
            return Err(AdaptiveError::config(format!(
                "expected_response_seconds must be positive, got {}",
                self.expected_response_seconds
            )));
        }
        if !in_unit_interval(self.mastery_threshold) || !in_unit_interval(self.completed_threshold) {
            return Err(AdaptiveError::config("status thresholds must be within [0, 1]"));
        }
        if self.completed_threshold > self.mastery_threshold {
            return Err(AdaptiveError::config(format!(
                "completed_threshold ({}) > mastery_threshold ({})",
                self.completed_threshold, self.mastery_threshold
            )));
        }
        Ok(())
    }

    pub fn clamp_difficulty(&self, value: f64) -> f64 {
        value.clamp(self.min_difficulty, self.max_difficulty)
    }
}

/// How the "popular" cut-off is chosen for the popularity bonus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum PopularityThreshold {
    /// 75th percentile of the candidate pool being ranked.
    #[default]
    TopQuartile,
    Fixed(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    pub accessibility_window: f64,
    pub gap_threshold: f64,
    pub unseen_objective_priority: f64,
    pub rating_threshold: f64,
    pub rating_bonus: f64,
    pub popularity_threshold: PopularityThreshold,
    pub popularity_bonus: f64,
    pub style_bonus: f64,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            accessibility_window: 0.2,
            gap_threshold: 0.6,
            unseen_objective_priority: 0.5,
            rating_threshold: 4.0,
            rating_bonus: 0.1,
            popularity_threshold: PopularityThreshold::TopQuartile,
            popularity_bonus: 0.05,
            style_bonus: 0.1,
        }
    }
}

impl RankerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_var)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_f64 = |key: &str| parse_f64(lookup(key));
        let mut config = Self::default();

        if let Some(val) = env_f64("TUTOR_ACCESSIBILITY_WINDOW") {
            config.accessibility_window = val;
        }
        if let Some(val) = env_f64("TUTOR_POPULARITY_THRESHOLD") {
            config.popularity_threshold = PopularityThreshold::Fixed(val);
        }

        config
    }

    pub fn validate(&self) -> AdaptiveResult<()> {
        if is_invalid(self.accessibility_window) || self.accessibility_window < 0.0 {
            return Err(AdaptiveError::config(format!(
                "accessibility_window must be non-negative, got {}",
                self.accessibility_window
            )));
        }
        if !in_unit_interval(self.gap_threshold) {
            return Err(AdaptiveError::config("gap_threshold must be within [0, 1]"));
        }
        if let PopularityThreshold::Fixed(v) = self.popularity_threshold {
            if is_invalid(v) {
                return Err(AdaptiveError::config("popularity threshold must be finite"));
            }
        }
        let bonuses = [
            self.unseen_objective_priority,
            self.rating_threshold,
            self.rating_bonus,
            self.popularity_bonus,
            self.style_bonus,
        ];
        if bonuses.iter().any(|&b| is_invalid(b)) {
            return Err(AdaptiveError::config("ranker weights must be finite"));
        }
        Ok(())
    }
}

pub(crate) fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_f64(value: Option<String>) -> Option<f64> {
    value.and_then(|v| v.trim().parse::<f64>().ok())
}
