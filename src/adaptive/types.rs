use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ObjectiveId = String;
pub type CandidateId = String;

pub const DEFAULT_DIFFICULTY: f64 = 0.5;
pub const DEFAULT_KNOWLEDGE: f64 = 0.0;
pub const DEFAULT_ENGAGEMENT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStyle {
    Visual,
    Auditory,
    Kinesthetic,
    ReadingWriting,
}

impl LearningStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visual => "visual",
            Self::Auditory => "auditory",
            Self::Kinesthetic => "kinesthetic",
            Self::ReadingWriting => "reading_writing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Lesson,
    Exercise,
    Quiz,
    Video,
    Article,
    Interactive,
    Assessment,
    Game,
    ReviewSession,
    ChallengeExercise,
}

impl ContentType {
    /// Learning styles this kind of material naturally serves.
    pub fn natural_styles(&self) -> &'static [LearningStyle] {
        match self {
            Self::Video => &[LearningStyle::Visual, LearningStyle::Auditory],
            Self::Interactive => &[LearningStyle::Visual, LearningStyle::Kinesthetic],
            Self::Game | Self::Exercise | Self::ChallengeExercise => &[LearningStyle::Kinesthetic],
            Self::Article | Self::Lesson => &[LearningStyle::ReadingWriting],
            Self::Quiz | Self::Assessment | Self::ReviewSession => &[],
        }
    }

    pub fn is_activity(&self) -> bool {
        matches!(self, Self::ReviewSession | Self::ChallengeExercise)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Mastered,
}

impl MasteryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Mastered => "mastered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryRecord {
    pub mastery_level: f64,
    pub attempts_count: u32,
    pub average_score: f64,
    pub best_score: Option<f64>,
    pub last_score: Option<f64>,
    pub time_spent_minutes: f64,
    pub status: MasteryStatus,
    pub review_interval_days: u32,
    pub next_review_date: Option<DateTime<Utc>>,
    pub first_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub mastered_at: Option<DateTime<Utc>>,
}

impl Default for MasteryRecord {
    fn default() -> Self {
        Self {
            mastery_level: 0.0,
            attempts_count: 0,
            average_score: 0.0,
            best_score: None,
            last_score: None,
            time_spent_minutes: 0.0,
            status: MasteryStatus::NotStarted,
            review_interval_days: 1,
            next_review_date: None,
            first_attempt_at: None,
            last_attempt_at: None,
            mastered_at: None,
        }
    }
}

impl MasteryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mastered(&self) -> bool {
        self.status == MasteryStatus::Mastered
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentState {
    pub difficulty_level: f64,
    pub knowledge_level: f64,
    pub engagement_score: f64,
    pub mastery: BTreeMap<ObjectiveId, MasteryRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_style: Option<LearningStyle>,
}

impl Default for StudentState {
    fn default() -> Self {
        Self {
            difficulty_level: DEFAULT_DIFFICULTY,
            knowledge_level: DEFAULT_KNOWLEDGE,
            engagement_score: DEFAULT_ENGAGEMENT,
            mastery: BTreeMap::new(),
            learning_style: None,
        }
    }
}

impl StudentState {
    pub fn with_learning_style(mut self, style: LearningStyle) -> Self {
        self.learning_style = Some(style);
        self
    }

    pub fn mastery_for(&self, objective_id: &str) -> Option<&MasteryRecord> {
        self.mastery.get(objective_id)
    }
}

/// One graded event. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub objective_id: ObjectiveId,
    pub is_correct: bool,
    #[serde(default)]
    pub response_time_seconds: Option<f64>,
    #[serde(default)]
    pub hint_used: bool,
    #[serde(default = "default_attempts")]
    pub attempts_count: u32,
    /// Difficulty of the item when it was answered; the student's current
    /// difficulty is used when absent.
    #[serde(default)]
    pub difficulty_at_time: Option<f64>,
    #[serde(default)]
    pub confidence_level: Option<f64>,
    #[serde(default)]
    pub revision_count: u32,
}

fn default_attempts() -> u32 {
    1
}

impl Interaction {
    pub fn new(objective_id: impl Into<ObjectiveId>, is_correct: bool) -> Self {
        Self {
            objective_id: objective_id.into(),
            is_correct,
            response_time_seconds: None,
            hint_used: false,
            attempts_count: 1,
            difficulty_at_time: None,
            confidence_level: None,
            revision_count: 0,
        }
    }

    pub fn with_response_time(mut self, seconds: f64) -> Self {
        self.response_time_seconds = Some(seconds);
        self
    }

    pub fn with_hint(mut self) -> Self {
        self.hint_used = true;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts_count = attempts;
        self
    }

    pub fn with_difficulty(mut self, difficulty: f64) -> Self {
        self.difficulty_at_time = Some(difficulty);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence_level = Some(confidence);
        self
    }

    pub fn with_revisions(mut self, revisions: u32) -> Self {
        self.revision_count = revisions;
        self
    }

    /// Response time treated as present only when positive.
    pub fn effective_response_time(&self) -> Option<f64> {
        self.response_time_seconds.filter(|&rt| rt > 0.0)
    }
}

/// A content item or activity offered for recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    #[serde(default)]
    pub difficulty_score: Option<f64>,
    #[serde(default)]
    pub objective_ids: BTreeSet<ObjectiveId>,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub rating: Option<f64>,
    pub content_type: ContentType,
    /// Preset urgency added on top of the computed priority.
    #[serde(default)]
    pub base_priority: f64,
}

impl Candidate {
    pub fn new(id: impl Into<CandidateId>, content_type: ContentType) -> Self {
        Self {
            id: id.into(),
            difficulty_score: None,
            objective_ids: BTreeSet::new(),
            popularity: 0.0,
            rating: None,
            content_type,
            base_priority: 0.0,
        }
    }

    pub fn with_difficulty(mut self, difficulty: f64) -> Self {
        self.difficulty_score = Some(difficulty);
        self
    }

    pub fn with_objectives<I, S>(mut self, objectives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ObjectiveId>,
    {
        self.objective_ids = objectives.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = popularity;
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_base_priority(mut self, base_priority: f64) -> Self {
        self.base_priority = base_priority;
        self
    }
}

/// What one `update_student` call changed. Deltas are post-clamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub objective_id: ObjectiveId,
    pub performance_score: f64,
    pub difficulty_delta: f64,
    pub knowledge_delta: f64,
    pub engagement_delta: f64,
    pub mastery_delta: f64,
    pub new_status: MasteryStatus,
    pub new_difficulty_level: f64,
}
