//! Session analysis
//!
//! Summaries computed when a learning session closes: efficiency metrics,
//! observed patterns, follow-up suggestions, estimated knowledge gain and the
//! difficulty to start the next session at. Also engagement snapshots and
//! per-subject history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::adaptive::types::StudentState;

const DEFAULT_ENGAGEMENT_RATING: f64 = 0.5;
const MAX_SESSION_GAIN: f64 = 0.1;
const IMPROVEMENT_BONUS_WEIGHT: f64 = 0.5;
const TREND_WINDOW: usize = 3;

const NEUTRAL_ENGAGEMENT: f64 = 0.5;
const HIGH_FOCUS: f64 = 0.8;
const LOW_FOCUS: f64 = 0.4;
const MAX_HELP_REQUESTS: u32 = 3;
const MAX_FRUSTRATION_INDICATORS: u32 = 2;

const FAVORITE_SUBJECTS: usize = 3;
const CHALLENGING_SUBJECTS: usize = 3;
const CHALLENGING_BELOW: f64 = 60.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionStats {
    pub questions_attempted: u32,
    pub questions_correct: u32,
    pub hints_used: u32,
    pub duration_minutes: Option<f64>,
    pub difficulty_start: Option<f64>,
    pub difficulty_end: Option<f64>,
    pub engagement_score: Option<f64>,
}

impl SessionStats {
    /// Percentage of attempted questions answered correctly.
    pub fn accuracy(&self) -> f64 {
        if self.questions_attempted == 0 {
            return 0.0;
        }
        self.questions_correct as f64 / self.questions_attempted as f64 * 100.0
    }

    pub fn record_answer(&mut self, is_correct: bool, hint_used: bool) {
        self.questions_attempted += 1;
        if is_correct {
            self.questions_correct += 1;
        }
        if hint_used {
            self.hints_used += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub efficiency: f64,
    pub persistence: f64,
    pub improvement: f64,
    pub engagement_rating: f64,
    pub time_efficiency: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPatterns {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub preferences: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTrend {
    Improving,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub accuracy: f64,
    pub metrics: SessionMetrics,
    pub patterns: LearningPatterns,
    pub recommendations: Vec<String>,
    pub knowledge_gained: f64,
    pub optimal_difficulty: f64,
}

/// Engagement observed over one session. Scores are in [0, 1] except
/// `active_time_percentage`, which is 0-100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementSnapshot {
    pub focus_score: Option<f64>,
    pub active_time_percentage: Option<f64>,
    pub motivation_score: Option<f64>,
    pub confidence_level: Option<f64>,
    pub help_requests: u32,
    pub frustration_indicators: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementPatterns {
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
}

/// One past session's subject and accuracy percentage, as kept in the
/// learning history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectResult {
    pub subject_area: Option<String>,
    pub accuracy: Option<f64>,
}

pub fn session_metrics(stats: &SessionStats) -> SessionMetrics {
    let attempted = stats.questions_attempted.max(1) as f64;
    let efficiency = if stats.questions_attempted > 0 {
        stats.accuracy() / attempted
    } else {
        0.0
    };
    let improvement = match (stats.difficulty_start, stats.difficulty_end) {
        (Some(start), Some(end)) => end - start,
        _ => 0.0,
    };
    let duration = stats.duration_minutes.unwrap_or(1.0).max(1.0);

    SessionMetrics {
        efficiency,
        persistence: 1.0 - stats.hints_used as f64 / attempted,
        improvement,
        engagement_rating: stats.engagement_score.unwrap_or(DEFAULT_ENGAGEMENT_RATING),
        time_efficiency: stats.questions_attempted as f64 / duration,
    }
}

pub fn learning_patterns(stats: &SessionStats) -> LearningPatterns {
    let mut patterns = LearningPatterns::default();
    let accuracy = stats.accuracy();

    if stats.questions_attempted > 0 {
        if accuracy > 80.0 {
            patterns.strengths.push("High accuracy".to_string());
        } else if accuracy < 50.0 {
            patterns
                .weaknesses
                .push("Low accuracy - consider reviewing concepts".to_string());
        }
    }

    if let Some(duration) = stats.duration_minutes.filter(|&d| d > 0.0) {
        if stats.questions_attempted > 0 {
            let per_question = duration / stats.questions_attempted as f64;
            if per_question < 1.0 {
                patterns.preferences.push("Fast-paced learning".to_string());
            } else if per_question > 5.0 {
                patterns
                    .preferences
                    .push("Thoughtful, deliberate approach".to_string());
            }
        }
    }

    if stats.hints_used == 0 {
        patterns
            .strengths
            .push("Independent problem solving".to_string());
    } else if stats.hints_used as f64 > stats.questions_attempted as f64 / 2.0 {
        patterns
            .preferences
            .push("Benefits from guidance and hints".to_string());
    }

    patterns
}

pub fn session_recommendations(stats: &SessionStats) -> Vec<String> {
    let mut recommendations = Vec::new();

    if stats.questions_attempted > 0 && stats.accuracy() < 60.0 {
        recommendations.push("Review the fundamental concepts before continuing".to_string());
        recommendations.push("Consider working through additional practice problems".to_string());
    }

    match stats.duration_minutes {
        Some(d) if d > 0.0 && d < 10.0 => {
            recommendations.push("Consider taking more time to think through problems".to_string())
        }
        Some(d) if d > 60.0 => {
            recommendations.push("Try shorter, more focused study sessions".to_string())
        }
        _ => {}
    }

    if stats.engagement_score.is_some_and(|e| e < 0.4) {
        recommendations.push("Try different types of content to maintain interest".to_string());
        recommendations.push("Take breaks to maintain focus".to_string());
    }

    recommendations
}

/// Estimated knowledge gained in the session, capped per session.
pub fn knowledge_gain(stats: &SessionStats) -> f64 {
    if stats.questions_attempted == 0 || stats.questions_correct == 0 {
        return 0.0;
    }
    let Some(start) = stats.difficulty_start else {
        return 0.0;
    };

    let mut gain = stats.questions_correct as f64 / 100.0 * start;
    if let Some(end) = stats.difficulty_end {
        gain += (end - start) * IMPROVEMENT_BONUS_WEIGHT;
    }
    gain.min(MAX_SESSION_GAIN)
}

pub fn optimal_difficulty(state: &StudentState, stats: &SessionStats) -> f64 {
    let current = state.difficulty_level;
    if stats.questions_attempted == 0 {
        return current;
    }
    let accuracy = stats.accuracy();
    if accuracy > 85.0 {
        (current + 0.1).min(1.0)
    } else if accuracy < 50.0 {
        (current - 0.1).max(0.1)
    } else {
        current
    }
}

/// `recent_accuracies` is newest first. Compares the latest three sessions
/// with the three before them; zero and non-finite entries are not counted.
pub fn performance_trend(recent_accuracies: &[f64]) -> PerformanceTrend {
    let recent_accuracies: Vec<f64> = recent_accuracies
        .iter()
        .copied()
        .filter(|a| a.is_finite() && *a > 0.0)
        .collect();
    if recent_accuracies.len() < TREND_WINDOW {
        return PerformanceTrend::InsufficientData;
    }
    let recent = &recent_accuracies[..TREND_WINDOW];
    let earlier_end = recent_accuracies.len().min(TREND_WINDOW * 2);
    let earlier = &recent_accuracies[TREND_WINDOW..earlier_end];
    if earlier.is_empty() {
        return PerformanceTrend::InsufficientData;
    }

    if mean(recent) > mean(earlier) {
        PerformanceTrend::Improving
    } else {
        PerformanceTrend::Stable
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of whichever components were observed, or neutral when none were.
pub fn overall_engagement(snapshot: &EngagementSnapshot) -> f64 {
    let components: Vec<f64> = [
        snapshot.focus_score,
        snapshot.active_time_percentage.map(|p| p / 100.0),
        snapshot.motivation_score,
        snapshot.confidence_level,
    ]
    .into_iter()
    .flatten()
    .collect();

    if components.is_empty() {
        NEUTRAL_ENGAGEMENT
    } else {
        mean(&components)
    }
}

/// A focus score of zero counts as unmeasured.
pub fn engagement_patterns(snapshot: &EngagementSnapshot) -> EngagementPatterns {
    let mut patterns = EngagementPatterns::default();

    match snapshot.focus_score.filter(|&f| f > 0.0) {
        Some(focus) if focus > HIGH_FOCUS => {
            patterns.strengths.push("High focus and attention".to_string());
        }
        Some(focus) if focus < LOW_FOCUS => {
            patterns.concerns.push("Low focus levels".to_string());
            patterns
                .recommendations
                .push("Consider shorter session durations".to_string());
        }
        _ => {}
    }

    if snapshot.help_requests > MAX_HELP_REQUESTS {
        patterns
            .concerns
            .push("Frequent help requests - content may be too difficult".to_string());
        patterns
            .recommendations
            .push("Adjust difficulty level or provide more scaffolding".to_string());
    }

    if snapshot.frustration_indicators > MAX_FRUSTRATION_INDICATORS {
        patterns.concerns.push("Signs of frustration detected".to_string());
        patterns
            .recommendations
            .push("Provide encouragement and adjust pacing".to_string());
    }

    patterns
}

/// Mean accuracy per subject, skipping sessions with no subject or no
/// positive accuracy.
fn subject_means(history: &[SubjectResult]) -> Vec<(String, f64)> {
    let mut by_subject: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for result in history {
        let subject = result.subject_area.as_deref().map(str::trim).unwrap_or("");
        match result.accuracy {
            Some(accuracy) if !subject.is_empty() && accuracy.is_finite() && accuracy > 0.0 => {
                by_subject.entry(subject).or_default().push(accuracy);
            }
            _ => {}
        }
    }
    by_subject
        .into_iter()
        .map(|(subject, scores)| (subject.to_string(), mean(&scores)))
        .collect()
}

/// Best three subjects by mean accuracy, best first.
pub fn favorite_subjects(history: &[SubjectResult]) -> Vec<String> {
    let mut means = subject_means(history);
    means.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    means
        .into_iter()
        .take(FAVORITE_SUBJECTS)
        .map(|(subject, _)| subject)
        .collect()
}

/// Up to three subjects averaging below 60% accuracy, weakest first.
pub fn challenging_subjects(history: &[SubjectResult]) -> Vec<String> {
    let mut means: Vec<(String, f64)> = subject_means(history)
        .into_iter()
        .filter(|(_, avg)| *avg < CHALLENGING_BELOW)
        .collect();
    means.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    means
        .into_iter()
        .take(CHALLENGING_SUBJECTS)
        .map(|(subject, _)| subject)
        .collect()
}

pub fn summarize_session(state: &StudentState, stats: &SessionStats) -> SessionSummary {
    SessionSummary {
        accuracy: stats.accuracy(),
        metrics: session_metrics(stats),
        patterns: learning_patterns(stats),
        recommendations: session_recommendations(stats),
        knowledge_gained: knowledge_gain(stats),
        optimal_difficulty: optimal_difficulty(state, stats),
    }
}
