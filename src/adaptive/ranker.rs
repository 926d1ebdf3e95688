//! Recommendation ranking
//!
//! Stateless scoring pass over a candidate pool. Candidates close to the
//! student's difficulty are preferred; knowledge gaps, ratings, popularity and
//! learning-style fit raise priority. Ordering is fully deterministic.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::adaptive::config::{PopularityThreshold, RankerConfig};
use crate::adaptive::types::{Candidate, StudentState};

const TOP_QUARTILE: f64 = 0.75;
/// Slack for window edges, so 0.55 is within 0.2 of 0.35.
const WINDOW_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub priority: f64,
    pub accessible: bool,
}

pub(crate) fn within_window(value: f64, center: f64, window: f64) -> bool {
    (value - center).abs() <= window + WINDOW_EPSILON
}

pub fn accessible(candidate: &Candidate, state: &StudentState, config: &RankerConfig) -> bool {
    match candidate.difficulty_score {
        None => true,
        Some(difficulty) => within_window(difficulty, state.difficulty_level, config.accessibility_window),
    }
}

/// Popularity a candidate has to exceed to earn the popularity bonus.
pub fn popularity_cutoff(candidates: &[Candidate], config: &RankerConfig) -> f64 {
    match config.popularity_threshold {
        PopularityThreshold::Fixed(value) => value,
        PopularityThreshold::TopQuartile => {
            let mut values: Vec<f64> = candidates
                .iter()
                .map(|c| c.popularity)
                .filter(|p| p.is_finite())
                .collect();
            percentile(&mut values, TOP_QUARTILE).unwrap_or(f64::INFINITY)
        }
    }
}

/// Linear-interpolated percentile; `None` for an empty slice.
fn percentile(values: &mut [f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(values[lower] + (values[upper] - values[lower]) * frac)
}

/// Sum of `1 - mastery` over the candidate's weak objectives; objectives the
/// student has never attempted count as a fixed gap.
pub fn knowledge_gap(candidate: &Candidate, state: &StudentState, config: &RankerConfig) -> f64 {
    candidate
        .objective_ids
        .iter()
        .map(|objective_id| match state.mastery_for(objective_id) {
            Some(record) if record.mastery_level < config.gap_threshold => {
                1.0 - record.mastery_level
            }
            Some(_) => 0.0,
            None => config.unseen_objective_priority,
        })
        .sum()
}

pub fn style_match(candidate: &Candidate, state: &StudentState) -> bool {
    state
        .learning_style
        .is_some_and(|style| candidate.content_type.natural_styles().contains(&style))
}

pub fn priority(
    candidate: &Candidate,
    state: &StudentState,
    config: &RankerConfig,
    popularity_cutoff: f64,
) -> f64 {
    let mut score = candidate.base_priority + knowledge_gap(candidate, state, config);

    if candidate.rating.is_some_and(|r| r >= config.rating_threshold) {
        score += config.rating_bonus;
    }
    if candidate.popularity > popularity_cutoff {
        score += config.popularity_bonus;
    }
    if style_match(candidate, state) {
        score += config.style_bonus;
    }

    score
}

fn by_priority_then_id(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.priority
        .total_cmp(&a.priority)
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
}

/// Scores and orders candidates. When fewer than `limit` are within the
/// difficulty window the window is dropped, so up to `limit` items come back
/// whenever the pool has them.
pub fn rank(
    state: &StudentState,
    candidates: &[Candidate],
    limit: usize,
    config: &RankerConfig,
) -> Vec<RankedCandidate> {
    if limit == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let cutoff = popularity_cutoff(candidates, config);
    let scored: Vec<RankedCandidate> = candidates
        .iter()
        .map(|candidate| RankedCandidate {
            priority: priority(candidate, state, config, cutoff),
            accessible: accessible(candidate, state, config),
            candidate: candidate.clone(),
        })
        .collect();

    let accessible_count = scored.iter().filter(|r| r.accessible).count();
    let mut pool: Vec<RankedCandidate> = if accessible_count >= limit {
        scored.into_iter().filter(|r| r.accessible).collect()
    } else {
        scored
    };

    pool.sort_by(by_priority_then_id);
    pool.truncate(limit);
    pool
}

pub fn rank_candidates(state: &StudentState, candidates: &[Candidate], limit: usize) -> Vec<Candidate> {
    rank(state, candidates, limit, &RankerConfig::default())
        .into_iter()
        .map(|r| r.candidate)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::types::{ContentType, LearningStyle, MasteryRecord};

    fn state_with(objective: &str, mastery: f64) -> StudentState {
        let mut state = StudentState::default();
        state.mastery.insert(
            objective.to_string(),
            MasteryRecord {
                mastery_level: mastery,
                attempts_count: 1,
                ..Default::default()
            },
        );
        state
    }

    #[test]
    fn test_accessible_window() {
        let state = StudentState::default();
        let config = RankerConfig::default();
        assert!(accessible(&Candidate::new("a", ContentType::Quiz), &state, &config));
        assert!(accessible(
            &Candidate::new("b", ContentType::Quiz).with_difficulty(0.65),
            &state,
            &config
        ));
        assert!(!accessible(
            &Candidate::new("c", ContentType::Quiz).with_difficulty(0.75),
            &state,
            &config
        ));
    }

    #[test]
    fn test_knowledge_gap_contributions() {
        let state = state_with("weak", 0.2);
        let config = RankerConfig::default();
        let candidate =
            Candidate::new("x", ContentType::Lesson).with_objectives(["weak", "unseen"]);
        assert!((knowledge_gap(&candidate, &state, &config) - 1.3).abs() < 1e-12);

        let strong = state_with("strong", 0.8);
        let candidate = Candidate::new("y", ContentType::Lesson).with_objectives(["strong"]);
        assert_eq!(knowledge_gap(&candidate, &strong, &config), 0.0);
    }

    #[test]
    fn test_bonuses() {
        let state = StudentState::default().with_learning_style(LearningStyle::Visual);
        let config = RankerConfig::default();
        let candidate = Candidate::new("v", ContentType::Video)
            .with_rating(4.5)
            .with_popularity(500.0);
        let p = priority(&candidate, &state, &config, 100.0);
        assert!((p - 0.25).abs() < 1e-12);

        let plain = Candidate::new("t", ContentType::Quiz).with_rating(3.9);
        assert_eq!(priority(&plain, &state, &config, 100.0), 0.0);
    }

    #[test]
    fn test_bonus_boundaries() {
        let state = StudentState::default();
        let config = RankerConfig::default();

        let rated = Candidate::new("r", ContentType::Quiz).with_rating(4.0);
        assert!((priority(&rated, &state, &config, 100.0) - 0.1).abs() < 1e-12);

        let at_cutoff = Candidate::new("p", ContentType::Quiz).with_popularity(100.0);
        assert_eq!(priority(&at_cutoff, &state, &config, 100.0), 0.0);
        let above = Candidate::new("q", ContentType::Quiz).with_popularity(100.5);
        assert!((priority(&above, &state, &config, 100.0) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_window_edge_is_inclusive() {
        let state = StudentState {
            difficulty_level: 0.35,
            ..Default::default()
        };
        let config = RankerConfig::default();
        assert!(accessible(
            &Candidate::new("edge", ContentType::Quiz).with_difficulty(0.55),
            &state,
            &config
        ));
        assert!(accessible(
            &Candidate::new("low", ContentType::Quiz).with_difficulty(0.15),
            &state,
            &config
        ));
        assert!(!accessible(
            &Candidate::new("far", ContentType::Quiz).with_difficulty(0.56),
            &state,
            &config
        ));
    }

    #[test]
    fn test_top_quartile_cutoff() {
        let config = RankerConfig::default();
        let pool: Vec<Candidate> = [10.0, 20.0, 30.0, 40.0, 50.0]
            .iter()
            .enumerate()
            .map(|(i, &p)| Candidate::new(i.to_string(), ContentType::Quiz).with_popularity(p))
            .collect();
        assert_eq!(popularity_cutoff(&pool, &config), 40.0);
        assert_eq!(popularity_cutoff(&[], &config), f64::INFINITY);
    }

    #[test]
    fn test_ties_break_by_id() {
        let state = StudentState::default();
        let pool = vec![
            Candidate::new("c", ContentType::Quiz),
            Candidate::new("a", ContentType::Quiz),
            Candidate::new("b", ContentType::Quiz),
        ];
        let ids: Vec<String> = rank_candidates(&state, &pool, 3).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_zero_limit() {
        let pool = vec![Candidate::new("a", ContentType::Quiz)];
        assert!(rank_candidates(&StudentState::default(), &pool, 0).is_empty());
    }

    #[test]
    fn test_strict_window_when_enough_accessible() {
        let state = StudentState::default();
        let pool = vec![
            Candidate::new("far", ContentType::Quiz)
                .with_difficulty(0.95)
                .with_objectives(["gap"]),
            Candidate::new("near1", ContentType::Quiz).with_difficulty(0.5),
            Candidate::new("near2", ContentType::Quiz).with_difficulty(0.6),
        ];
        let ranked = rank(&state, &pool, 2, &RankerConfig::default());
        assert!(ranked.iter().all(|r| r.accessible));
        assert_eq!(ranked.len(), 2);
    }
}
