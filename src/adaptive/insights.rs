use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adaptive::ranker::within_window;
use crate::adaptive::session::PerformanceTrend;
use crate::adaptive::types::{Candidate, ContentType, ObjectiveId, StudentState};

const LOW_DIFFICULTY: f64 = 0.3;
const HIGH_DIFFICULTY: f64 = 0.8;
const LOW_ENGAGEMENT: f64 = 0.4;
const HIGH_KNOWLEDGE: f64 = 0.7;

const REVIEW_SESSION_PRIORITY: f64 = 0.7;
const CHALLENGE_PRIORITY: f64 = 0.8;

const QUESTION_WINDOW: f64 = 0.3;
const DEFAULT_QUESTION_DIFFICULTY: f64 = 0.5;
const FALLBACK_QUESTIONS: usize = 5;

pub const REVIEW_SESSION_ID: &str = "activity:review_session";
pub const CHALLENGE_EXERCISE_ID: &str = "activity:challenge_exercise";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Difficulty,
    Engagement,
    Knowledge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightAction {
    ReviewBasics,
    AdvanceDifficulty,
    AdjustPacing,
    ExploreAdvanced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub action: InsightAction,
    pub message: String,
}

impl Insight {
    fn new(kind: InsightKind, action: InsightAction, message: &str) -> Self {
        Self {
            kind,
            action,
            message: message.to_string(),
        }
    }
}

/// Threshold-based nudges derived from the student's current scalars.
pub fn adaptive_insights(state: &StudentState) -> Vec<Insight> {
    let mut insights = Vec::new();

    if state.difficulty_level < LOW_DIFFICULTY {
        insights.push(Insight::new(
            InsightKind::Difficulty,
            InsightAction::ReviewBasics,
            "Consider reviewing fundamental concepts before advancing",
        ));
    } else if state.difficulty_level > HIGH_DIFFICULTY {
        insights.push(Insight::new(
            InsightKind::Difficulty,
            InsightAction::AdvanceDifficulty,
            "You're ready for more challenging material!",
        ));
    }

    if state.engagement_score < LOW_ENGAGEMENT {
        insights.push(Insight::new(
            InsightKind::Engagement,
            InsightAction::AdjustPacing,
            "Try shorter study sessions or different content types",
        ));
    }

    if state.knowledge_level > HIGH_KNOWLEDGE {
        insights.push(Insight::new(
            InsightKind::Knowledge,
            InsightAction::ExploreAdvanced,
            "Great progress! Consider exploring advanced topics",
        ));
    }

    insights
}

/// Activities to mix into the candidate pool. A review session is always
/// offered; a challenge only when recent sessions show improvement.
pub fn activity_candidates(trend: PerformanceTrend) -> Vec<Candidate> {
    let mut activities = vec![Candidate::new(REVIEW_SESSION_ID, ContentType::ReviewSession)
        .with_base_priority(REVIEW_SESSION_PRIORITY)];

    if trend == PerformanceTrend::Improving {
        activities.push(
            Candidate::new(CHALLENGE_EXERCISE_ID, ContentType::ChallengeExercise)
                .with_base_priority(CHALLENGE_PRIORITY),
        );
    }

    activities
}

/// Objectives whose review date has passed, earliest first.
pub fn due_for_review(state: &StudentState, now: DateTime<Utc>) -> Vec<ObjectiveId> {
    let mut due: Vec<(DateTime<Utc>, &ObjectiveId)> = state
        .mastery
        .iter()
        .filter(|(_, record)| record.is_due(now))
        .filter_map(|(id, record)| record.next_review_date.map(|at| (at, id)))
        .collect();
    due.sort();
    due.into_iter().map(|(_, id)| id.clone()).collect()
}

/// A quiz question; unrated questions sit at medium difficulty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub difficulty: Option<f64>,
}

impl Question {
    pub fn difficulty(&self) -> f64 {
        self.difficulty
            .filter(|d| d.is_finite())
            .unwrap_or(DEFAULT_QUESTION_DIFFICULTY)
    }
}

/// Questions within 0.3 of `difficulty_level`, in input order. Falls back to
/// the first five when none are that close.
pub fn filter_questions_by_difficulty(questions: &[Question], difficulty_level: f64) -> Vec<Question> {
    let close: Vec<Question> = questions
        .iter()
        .filter(|q| within_window(q.difficulty(), difficulty_level, QUESTION_WINDOW))
        .cloned()
        .collect();
    if close.is_empty() {
        questions.iter().take(FALLBACK_QUESTIONS).cloned().collect()
    } else {
        close
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::types::MasteryRecord;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_low_difficulty_low_engagement() {
        let state = StudentState {
            difficulty_level: 0.2,
            engagement_score: 0.3,
            ..Default::default()
        };
        let actions: Vec<InsightAction> = adaptive_insights(&state).iter().map(|i| i.action).collect();
        assert_eq!(actions, vec![InsightAction::ReviewBasics, InsightAction::AdjustPacing]);
    }

    #[test]
    fn test_advanced_student() {
        let state = StudentState {
            difficulty_level: 0.9,
            knowledge_level: 0.75,
            ..Default::default()
        };
        let actions: Vec<InsightAction> = adaptive_insights(&state).iter().map(|i| i.action).collect();
        assert_eq!(
            actions,
            vec![InsightAction::AdvanceDifficulty, InsightAction::ExploreAdvanced]
        );
    }

    #[test]
    fn test_default_student_has_no_insights() {
        assert!(adaptive_insights(&StudentState::default()).is_empty());
    }

    #[test]
    fn test_challenge_only_when_improving() {
        assert_eq!(activity_candidates(PerformanceTrend::Stable).len(), 1);
        let improving = activity_candidates(PerformanceTrend::Improving);
        assert_eq!(improving.len(), 2);
        assert_eq!(improving[1].content_type, ContentType::ChallengeExercise);
    }

    #[test]
    fn test_due_for_review_order() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut state = StudentState::default();
        for (id, offset) in [("late", -1), ("later", -3), ("future", 2)] {
            state.mastery.insert(
                id.to_string(),
                MasteryRecord {
                    next_review_date: Some(now + Duration::days(offset)),
                    ..Default::default()
                },
            );
        }
        state.mastery.insert("never".to_string(), MasteryRecord::default());
        assert_eq!(due_for_review(&state, now), vec!["later", "late"]);
    }

    fn question(id: &str, difficulty: Option<f64>) -> Question {
        Question {
            id: id.to_string(),
            difficulty,
        }
    }

    #[test]
    fn test_filter_questions_by_difficulty() {
        let questions = vec![
            question("easy", Some(0.1)),
            question("unrated", None),
            question("edge", Some(0.6)),
            question("hard", Some(0.95)),
        ];
        let ids: Vec<String> = filter_questions_by_difficulty(&questions, 0.3)
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec!["easy", "unrated", "edge"]);
    }

    #[test]
    fn test_filter_questions_falls_back_to_first_five() {
        let questions: Vec<Question> = (0..7).map(|i| question(&format!("q{i}"), Some(0.95))).collect();
        let kept = filter_questions_by_difficulty(&questions, 0.1);
        assert_eq!(kept.len(), 5);
        assert_eq!(kept[0].id, "q0");
        assert!(filter_questions_by_difficulty(&[], 0.5).is_empty());
    }
}
