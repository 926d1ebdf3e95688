use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::adaptive::insights::{activity_candidates, adaptive_insights, due_for_review, Insight};
use crate::adaptive::session::{performance_trend, summarize_session, SessionStats, SessionSummary};
use crate::adaptive::{
    rank, update_student_at, AdaptiveConfig, AdaptiveError, Candidate, Interaction, ObjectiveId,
    RankedCandidate, RankerConfig, StudentState, UpdateSummary,
};
use crate::services::text_generation::{build_tutor_prompt, ContentKind, GenerationError, TextGenerator};
use crate::store::{StoreError, StudentStateRepository};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Adaptive(#[from] AdaptiveError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub state: StudentState,
    pub summary: UpdateSummary,
    pub insights: Vec<Insight>,
}

/// Runs the adaptive core against a repository. Updates for one student are
/// serialised; different students proceed independently.
pub struct TutorService<R> {
    repo: R,
    adaptive: AdaptiveConfig,
    ranker: RankerConfig,
    student_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<R: StudentStateRepository> TutorService<R> {
    pub fn new(repo: R, adaptive: AdaptiveConfig, ranker: RankerConfig) -> Result<Self, AdaptiveError> {
        adaptive.validate()?;
        ranker.validate()?;
        Ok(Self {
            repo,
            adaptive,
            ranker,
            student_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_defaults(repo: R) -> Self {
        Self {
            repo,
            adaptive: AdaptiveConfig::default(),
            ranker: RankerConfig::default(),
            student_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn adaptive_config(&self) -> &AdaptiveConfig {
        &self.adaptive
    }

    fn student_lock(&self, student_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.student_locks.lock();
        Arc::clone(locks.entry(student_id.to_string()).or_default())
    }

    /// Drops the map entry when only the map and `lock` still hold it. Other
    /// callers clone under the map mutex, so none can be mid-acquire here.
    fn release_student_lock(&self, student_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.student_locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(student_id);
        }
    }

    pub fn state(&self, student_id: &str) -> Result<StudentState, ServiceError> {
        Ok(self.repo.load_or_default(student_id)?)
    }

    pub fn record_interaction(
        &self,
        student_id: &str,
        interaction: &Interaction,
    ) -> Result<UpdateOutcome, ServiceError> {
        self.record_interaction_at(student_id, interaction, Utc::now())
    }

    pub fn record_interaction_at(
        &self,
        student_id: &str,
        interaction: &Interaction,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, ServiceError> {
        let lock = self.student_lock(student_id);
        let result = {
            let _guard = lock.lock();
            self.apply_interaction(student_id, interaction, now)
        };
        self.release_student_lock(student_id, lock);
        result
    }

    fn apply_interaction(
        &self,
        student_id: &str,
        interaction: &Interaction,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, ServiceError> {
        let current = self.repo.load_or_default(student_id)?;
        let (state, summary) = match update_student_at(&current, interaction, &self.adaptive, now) {
            Ok(updated) => updated,
            Err(err) => {
                warn!(student_id, objective_id = %interaction.objective_id, error = %err, "interaction rejected");
                return Err(err.into());
            }
        };
        self.repo.save(student_id, &state)?;

        debug!(
            student_id,
            objective_id = %summary.objective_id,
            performance = summary.performance_score,
            difficulty = state.difficulty_level,
            knowledge = state.knowledge_level,
            engagement = state.engagement_score,
            status = summary.new_status.as_str(),
            "student model updated"
        );

        let insights = adaptive_insights(&state);
        Ok(UpdateOutcome {
            state,
            summary,
            insights,
        })
    }

    pub fn recommend(
        &self,
        student_id: &str,
        candidates: &[Candidate],
        limit: usize,
    ) -> Result<Vec<RankedCandidate>, ServiceError> {
        let state = self.repo.load_or_default(student_id)?;
        let ranked = rank(&state, candidates, limit, &self.ranker);
        debug!(student_id, pool = candidates.len(), returned = ranked.len(), "ranked recommendations");
        Ok(ranked)
    }

    /// Like [`recommend`](Self::recommend) with a review session, and a
    /// challenge when `recent_accuracies` (newest first) are improving, mixed
    /// into the pool. Activities already in `candidates` are replaced.
    pub fn recommend_with_activities(
        &self,
        student_id: &str,
        candidates: &[Candidate],
        recent_accuracies: &[f64],
        limit: usize,
    ) -> Result<Vec<RankedCandidate>, ServiceError> {
        let mut pool: Vec<Candidate> = candidates
            .iter()
            .filter(|c| !c.content_type.is_activity())
            .cloned()
            .collect();
        pool.extend(activity_candidates(performance_trend(recent_accuracies)));
        self.recommend(student_id, &pool, limit)
    }

    pub fn insights(&self, student_id: &str) -> Result<Vec<Insight>, ServiceError> {
        Ok(adaptive_insights(&self.repo.load_or_default(student_id)?))
    }

    pub fn due_reviews(&self, student_id: &str, now: DateTime<Utc>) -> Result<Vec<ObjectiveId>, ServiceError> {
        Ok(due_for_review(&self.repo.load_or_default(student_id)?, now))
    }

    pub fn close_session(&self, student_id: &str, stats: &SessionStats) -> Result<SessionSummary, ServiceError> {
        let state = self.repo.load_or_default(student_id)?;
        Ok(summarize_session(&state, stats))
    }

    pub fn tutor_prompt(
        &self,
        student_id: &str,
        subject: Option<&str>,
        kind: ContentKind,
        request: &str,
    ) -> Result<String, ServiceError> {
        let state = self.repo.load_or_default(student_id)?;
        Ok(build_tutor_prompt(&state, subject, kind, request))
    }

    pub async fn generate_for_student<G: TextGenerator>(
        &self,
        generator: &G,
        student_id: &str,
        subject: Option<&str>,
        kind: ContentKind,
        request: &str,
    ) -> Result<String, ServiceError> {
        let prompt = self.tutor_prompt(student_id, subject, kind, request)?;
        match generator.generate(&prompt, kind).await {
            Ok(text) => Ok(text),
            Err(err) => {
                warn!(student_id, kind = kind.as_str(), error = %err, "content generation failed");
                Err(err.into())
            }
        }
    }
}
