//! Student model updates
//!
//! Turns one graded interaction into new difficulty, knowledge, engagement
//! and mastery values. Every function here is pure; `update_student` validates
//! its inputs first and returns a fresh state rather than mutating in place.

use chrono::{DateTime, Utc};

use crate::adaptive::config::AdaptiveConfig;
use crate::adaptive::error::AdaptiveResult;
use crate::adaptive::mastery::mastery_update;
use crate::adaptive::sanitize::{validate_interaction, validate_state};
use crate::adaptive::types::{Interaction, MasteryRecord, StudentState, UpdateSummary};

const HIGH_PERFORMANCE: f64 = 0.8;
const LOW_PERFORMANCE: f64 = 0.4;
const ATTEMPT_PENALTY: f64 = 0.1;
const HINT_PENALTY: f64 = 0.1;
const SLOW_PENALTY: f64 = 0.1;
const SLOW_FACTOR: f64 = 3.0;

const FAST_TIME_FACTOR: f64 = 1.5;
const SLOW_TIME_FACTOR: f64 = 0.5;
const TIME_ADJUSTMENT: f64 = 0.02;
const HINT_ADJUSTMENT: f64 = 0.01;

const KNOWLEDGE_GAIN_RATE: f64 = 0.05;

const MAX_TIME_RATIO: f64 = 2.0;
const HINT_ENGAGEMENT: f64 = 0.8;
const REVISION_BASE: f64 = 0.6;
const REVISION_STEP: f64 = 0.1;
const REVISION_CAP: f64 = 0.9;
const ENGAGEMENT_SMOOTHING: f64 = 0.1;

/// Score in [0, 1] for one interaction, after attempt/hint/slowness penalties.
pub fn performance_score(interaction: &Interaction, config: &AdaptiveConfig) -> f64 {
    let mut score: f64 = if interaction.is_correct { 1.0 } else { 0.0 };

    if interaction.attempts_count > 1 {
        let penalty = (interaction.attempts_count - 1) as f64 * ATTEMPT_PENALTY;
        score = (score - penalty).max(0.0);
    }

    if interaction.hint_used {
        score = (score - HINT_PENALTY).max(0.0);
    }

    if let Some(rt) = interaction.effective_response_time() {
        if rt > config.expected_response_seconds * SLOW_FACTOR {
            score = (score - SLOW_PENALTY).max(0.0);
        }
    }

    score.clamp(0.0, 1.0)
}

/// Difficulty change actually applied once the new level is clamped.
pub fn difficulty_adjustment(
    state: &StudentState,
    interaction: &Interaction,
    config: &AdaptiveConfig,
) -> f64 {
    let score = performance_score(interaction, config);

    let mut delta = if score > HIGH_PERFORMANCE {
        config.adjustment_rate
    } else if score < LOW_PERFORMANCE {
        -config.adjustment_rate
    } else {
        0.0
    };

    if let Some(rt) = interaction.effective_response_time() {
        let time_factor = config.expected_response_seconds / rt;
        if time_factor > FAST_TIME_FACTOR {
            delta += TIME_ADJUSTMENT;
        } else if time_factor < SLOW_TIME_FACTOR {
            delta -= TIME_ADJUSTMENT;
        }
    }

    if interaction.hint_used {
        delta -= HINT_ADJUSTMENT;
    }

    let current = state.difficulty_level;
    config.clamp_difficulty(current + delta) - current
}

/// Raw knowledge gain; proportional to performance and item difficulty.
pub fn knowledge_update(
    state: &StudentState,
    interaction: &Interaction,
    config: &AdaptiveConfig,
) -> f64 {
    let difficulty = interaction
        .difficulty_at_time
        .unwrap_or(state.difficulty_level);
    performance_score(interaction, config) * difficulty * KNOWLEDGE_GAIN_RATE
}

/// Engagement signals present on this interaction, in a fixed order:
/// response pacing, confidence, hint seeking, answer revision.
pub fn engagement_signals(interaction: &Interaction, config: &AdaptiveConfig) -> Vec<f64> {
    let mut signals = Vec::with_capacity(4);

    if let Some(rt) = interaction.effective_response_time() {
        let ratio = (rt / config.expected_response_seconds).min(MAX_TIME_RATIO);
        signals.push(1.0 - (1.0 - ratio).abs());
    }
    if let Some(confidence) = interaction.confidence_level {
        signals.push(confidence);
    }
    if interaction.hint_used {
        signals.push(HINT_ENGAGEMENT);
    }
    if interaction.revision_count > 0 {
        let revision = REVISION_BASE + interaction.revision_count as f64 * REVISION_STEP;
        signals.push(revision.min(REVISION_CAP));
    }

    signals
}

/// Raw engagement change: a small step towards the mean of the signals.
pub fn engagement_update(
    state: &StudentState,
    interaction: &Interaction,
    config: &AdaptiveConfig,
) -> f64 {
    let signals = engagement_signals(interaction, config);
    if signals.is_empty() {
        return 0.0;
    }
    let target = signals.iter().sum::<f64>() / signals.len() as f64;
    (target - state.engagement_score) * ENGAGEMENT_SMOOTHING
}

pub fn update_student(
    state: &StudentState,
    interaction: &Interaction,
    config: &AdaptiveConfig,
) -> AdaptiveResult<(StudentState, UpdateSummary)> {
    update_student_at(state, interaction, config, Utc::now())
}

/// Same as [`update_student`] with an explicit clock for review scheduling.
pub fn update_student_at(
    state: &StudentState,
    interaction: &Interaction,
    config: &AdaptiveConfig,
    now: DateTime<Utc>,
) -> AdaptiveResult<(StudentState, UpdateSummary)> {
    config.validate()?;
    validate_interaction(interaction)?;
    validate_state(state)?;

    let score = performance_score(interaction, config);
    let mut next = state.clone();

    let difficulty_delta = difficulty_adjustment(state, interaction, config);
    next.difficulty_level = config.clamp_difficulty(state.difficulty_level + difficulty_delta);

    let knowledge_gain = knowledge_update(state, interaction, config);
    next.knowledge_level = (state.knowledge_level + knowledge_gain).clamp(0.0, 1.0);

    let engagement_step = engagement_update(state, interaction, config);
    next.engagement_score = (state.engagement_score + engagement_step).clamp(0.0, 1.0);

    let time_spent_minutes = interaction.response_time_seconds.unwrap_or(0.0) / 60.0;
    let previous = state
        .mastery
        .get(&interaction.objective_id)
        .cloned()
        .unwrap_or_else(MasteryRecord::new);
    let record = mastery_update(&previous, score, time_spent_minutes, config, now);

    let summary = UpdateSummary {
        objective_id: interaction.objective_id.clone(),
        performance_score: score,
        difficulty_delta: next.difficulty_level - state.difficulty_level,
        knowledge_delta: next.knowledge_level - state.knowledge_level,
        engagement_delta: next.engagement_score - state.engagement_score,
        mastery_delta: record.mastery_level - previous.mastery_level,
        new_status: record.status,
        new_difficulty_level: next.difficulty_level,
    };

    next.mastery.insert(interaction.objective_id.clone(), record);
    Ok((next, summary))
}
