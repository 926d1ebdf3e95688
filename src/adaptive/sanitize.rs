//! Input Validation
//!
//! Precondition checks run before any state is touched.
//!
//! - Finite / unit-interval checks for scalar inputs
//! - Interaction validation
//! - Student state validation

use crate::adaptive::error::{AdaptiveError, AdaptiveResult};
use crate::adaptive::types::{Interaction, MasteryRecord, StudentState};

/// True when the value is NaN or infinite.
pub fn is_invalid(value: f64) -> bool {
    value.is_nan() || value.is_infinite()
}

pub fn in_unit_interval(value: f64) -> bool {
    !is_invalid(value) && (0.0..=1.0).contains(&value)
}

pub fn validate_interaction(interaction: &Interaction) -> AdaptiveResult<()> {
    if interaction.objective_id.trim().is_empty() {
        return Err(AdaptiveError::interaction("objective_id must not be empty"));
    }
    if interaction.attempts_count < 1 {
        return Err(AdaptiveError::interaction(format!(
            "attempts_count must be >= 1, got {}",
            interaction.attempts_count
        )));
    }
    if let Some(rt) = interaction.response_time_seconds {
        if is_invalid(rt) || rt < 0.0 {
            return Err(AdaptiveError::interaction(format!(
                "response_time_seconds must be a non-negative finite number, got {rt}"
            )));
        }
    }
    if let Some(difficulty) = interaction.difficulty_at_time {
        if !in_unit_interval(difficulty) {
            return Err(AdaptiveError::interaction(format!(
                "difficulty_at_time must be within [0, 1], got {difficulty}"
            )));
        }
    }
    if let Some(confidence) = interaction.confidence_level {
        if !in_unit_interval(confidence) {
            return Err(AdaptiveError::interaction(format!(
                "confidence_level must be within [0, 1], got {confidence}"
            )));
        }
    }
    Ok(())
}

pub fn validate_state(state: &StudentState) -> AdaptiveResult<()> {
    let scalars = [
        ("difficulty_level", state.difficulty_level),
        ("knowledge_level", state.knowledge_level),
        ("engagement_score", state.engagement_score),
    ];
    for (name, value) in scalars {
        if !in_unit_interval(value) {
            return Err(AdaptiveError::state(format!(
                "{name} must be within [0, 1], got {value}"
            )));
        }
    }
    for (objective_id, record) in &state.mastery {
        validate_record(record)
            .map_err(|msg| AdaptiveError::state(format!("objective {objective_id}: {msg}")))?;
    }
    Ok(())
}

fn validate_record(record: &MasteryRecord) -> Result<(), String> {
    if !in_unit_interval(record.mastery_level) {
        return Err(format!("mastery_level out of range: {}", record.mastery_level));
    }
    if !in_unit_interval(record.average_score) {
        return Err(format!("average_score out of range: {}", record.average_score));
    }
    if is_invalid(record.time_spent_minutes) || record.time_spent_minutes < 0.0 {
        return Err(format!(
            "time_spent_minutes must be non-negative: {}",
            record.time_spent_minutes
        ));
    }
    let optional = [record.best_score, record.last_score];
    if optional.iter().flatten().any(|&v| !in_unit_interval(v)) {
        return Err("best_score/last_score out of range".to_string());
    }
    Ok(())
}
