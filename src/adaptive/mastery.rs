//! Per-objective mastery tracking
//!
//! Weighted-average mastery estimate that blends the latest score with
//! short-term consistency, then smooths against the previous level. Status is
//! re-derived from the current level on every update, and mastered objectives
//! are scheduled for review on a doubling/halving interval.

use chrono::{DateTime, Duration, Utc};

use crate::adaptive::config::AdaptiveConfig;
use crate::adaptive::types::{MasteryRecord, MasteryStatus};

const CONSISTENCY_WEIGHT: f64 = 0.7;
const SMOOTHING_NEW_WEIGHT: f64 = 0.3;
const GOOD_REVIEW_SCORE: f64 = 0.8;
const MAX_REVIEW_INTERVAL_DAYS: u32 = 30;
const MIN_REVIEW_INTERVAL_DAYS: u32 = 1;
const UNMASTERED_REVIEW_DAYS: i64 = 1;

/// Checked in order: mastered, completed, in progress, not started.
pub fn derive_status(mastery_level: f64, attempts_count: u32, config: &AdaptiveConfig) -> MasteryStatus {
    if mastery_level >= config.mastery_threshold {
        MasteryStatus::Mastered
    } else if mastery_level >= config.completed_threshold {
        MasteryStatus::Completed
    } else if attempts_count > 0 {
        MasteryStatus::InProgress
    } else {
        MasteryStatus::NotStarted
    }
}

/// New mastery level for one scored attempt, given the record *after* its
/// counters and running average have absorbed that attempt.
pub fn smoothed_mastery(previous_level: f64, counted: &MasteryRecord, performance_score: f64) -> f64 {
    let consistency = if counted.attempts_count > 1 {
        ((counted.average_score + performance_score) / 2.0).min(1.0)
    } else {
        performance_score
    };
    let instantaneous = performance_score + CONSISTENCY_WEIGHT * (consistency - performance_score);

    let level = if previous_level > 0.0 {
        previous_level + SMOOTHING_NEW_WEIGHT * (instantaneous - previous_level)
    } else {
        instantaneous
    };
    level.clamp(0.0, 1.0)
}

/// Applies one scored attempt to a mastery record and returns the new record.
pub fn mastery_update(
    record: &MasteryRecord,
    performance_score: f64,
    time_spent_minutes: f64,
    config: &AdaptiveConfig,
    now: DateTime<Utc>,
) -> MasteryRecord {
    let score = performance_score.clamp(0.0, 1.0);
    let mut next = record.clone();

    next.attempts_count = record.attempts_count.saturating_add(1);
    next.time_spent_minutes = record.time_spent_minutes + time_spent_minutes.max(0.0);
    next.last_score = Some(score);
    next.last_attempt_at = Some(now);
    next.best_score = Some(record.best_score.map_or(score, |best| best.max(score)));

    let n = next.attempts_count as f64;
    next.average_score = ((record.average_score * (n - 1.0) + score) / n).clamp(0.0, 1.0);

    next.mastery_level = smoothed_mastery(record.mastery_level, &next, score);

    if next.first_attempt_at.is_none() {
        next.first_attempt_at = Some(now);
    }

    next.status = derive_status(next.mastery_level, next.attempts_count, config);
    if next.status == MasteryStatus::Mastered && next.mastered_at.is_none() {
        next.mastered_at = Some(now);
    }

    schedule_review(&mut next, now);
    next
}

/// Mastered records double their interval after a good score and halve it
/// otherwise; everything else comes back tomorrow.
pub fn schedule_review(record: &mut MasteryRecord, now: DateTime<Utc>) {
    if record.is_mastered() {
        let base = record.review_interval_days.max(MIN_REVIEW_INTERVAL_DAYS);
        record.review_interval_days = if record.last_score.is_some_and(|s| s >= GOOD_REVIEW_SCORE) {
            base.saturating_mul(2).min(MAX_REVIEW_INTERVAL_DAYS)
        } else {
            (base / 2).max(MIN_REVIEW_INTERVAL_DAYS)
        };
        record.next_review_date = Some(now + Duration::days(record.review_interval_days as i64));
    } else {
        record.next_review_date = Some(now + Duration::days(UNMASTERED_REVIEW_DAYS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn config() -> AdaptiveConfig {
        AdaptiveConfig::default()
    }

    #[test]
    fn test_cold_start_takes_score_directly() {
        let record = MasteryRecord::new();
        let updated = mastery_update(&record, 0.9, 0.5, &config(), now());
        assert_eq!(updated.mastery_level, 0.9);
        assert_eq!(updated.attempts_count, 1);
        assert_eq!(updated.average_score, 0.9);
        assert_eq!(updated.best_score, Some(0.9));
        assert_eq!(updated.status, MasteryStatus::Mastered);
    }

    #[test]
    fn test_smoothing_after_first_attempt() {
        let first = mastery_update(&MasteryRecord::new(), 0.5, 0.0, &config(), now());
        let second = mastery_update(&first, 1.0, 0.0, &config(), now());
        // avg = 0.75, consistency = 0.875, inst = 0.9125, level = 0.5*0.7 + 0.9125*0.3
        let expected = 0.5 * 0.7 + 0.9125 * 0.3;
        assert!((second.mastery_level - expected).abs() < 1e-9);
        assert_eq!(second.attempts_count, 2);
        assert!((second.average_score - 0.75).abs() < 1e-12);
        assert_eq!(second.best_score, Some(1.0));
    }

    #[test]
    fn test_status_thresholds() {
        let c = config();
        assert_eq!(derive_status(0.95, 3, &c), MasteryStatus::Mastered);
        assert_eq!(derive_status(0.9, 3, &c), MasteryStatus::Mastered);
        assert_eq!(derive_status(0.75, 3, &c), MasteryStatus::Completed);
        assert_eq!(derive_status(0.7, 3, &c), MasteryStatus::Completed);
        assert_eq!(derive_status(0.69, 3, &c), MasteryStatus::InProgress);
        assert_eq!(derive_status(0.2, 1, &c), MasteryStatus::InProgress);
        assert_eq!(derive_status(0.0, 0, &c), MasteryStatus::NotStarted);
    }

    #[test]
    fn test_status_regresses_with_level() {
        let mut record = mastery_update(&MasteryRecord::new(), 1.0, 0.0, &config(), now());
        assert_eq!(record.status, MasteryStatus::Mastered);
        for _ in 0..5 {
            record = mastery_update(&record, 0.0, 0.0, &config(), now());
        }
        assert!(record.mastery_level < 0.7);
        assert_eq!(record.status, MasteryStatus::InProgress);
        assert!(record.mastered_at.is_some());
    }

    #[test]
    fn test_mastered_at_set_once() {
        let first_time = now();
        let record = mastery_update(&MasteryRecord::new(), 1.0, 0.0, &config(), first_time);
        let later = first_time + Duration::hours(5);
        let again = mastery_update(&record, 1.0, 0.0, &config(), later);
        assert_eq!(again.mastered_at, Some(first_time));
        assert_eq!(again.first_attempt_at, Some(first_time));
        assert_eq!(again.last_attempt_at, Some(later));
    }

    #[test]
    fn test_review_interval_doubles_and_caps() {
        let mut record = mastery_update(&MasteryRecord::new(), 1.0, 0.0, &config(), now());
        assert_eq!(record.review_interval_days, 2);
        assert_eq!(record.next_review_date, Some(now() + Duration::days(2)));
        for _ in 0..10 {
            record = mastery_update(&record, 1.0, 0.0, &config(), now());
        }
        assert_eq!(record.review_interval_days, 30);
    }

    #[test]
    fn test_review_interval_halves_on_weak_score() {
        let mut record = MasteryRecord {
            mastery_level: 0.99,
            attempts_count: 10,
            average_score: 1.0,
            review_interval_days: 16,
            ..Default::default()
        };
        record = mastery_update(&record, 0.75, 0.0, &config(), now());
        assert!(record.is_mastered());
        assert_eq!(record.review_interval_days, 8);
    }

    #[test]
    fn test_unmastered_review_tomorrow() {
        let record = mastery_update(&MasteryRecord::new(), 0.3, 0.0, &config(), now());
        assert_eq!(record.next_review_date, Some(now() + Duration::days(1)));
        assert_eq!(record.review_interval_days, 1);
    }

    #[test]
    fn test_time_spent_accumulates() {
        let a = mastery_update(&MasteryRecord::new(), 1.0, 0.5, &config(), now());
        let b = mastery_update(&a, 1.0, 0.25, &config(), now());
        assert!((b.time_spent_minutes - 0.75).abs() < 1e-12);
    }
}
