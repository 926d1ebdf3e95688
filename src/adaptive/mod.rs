//! Adaptive core - student model and recommendation ranking
//!
//! Contains:
//! - Student model updates (difficulty, knowledge, engagement)
//! - Mastery tracking with spaced review
//! - Recommendation ranking
//! - Threshold insights and session analysis

pub mod config;
pub mod error;
pub mod insights;
pub mod mastery;
pub mod ranker;
pub mod sanitize;
pub mod session;
pub mod student_model;
pub mod types;

pub use config::{AdaptiveConfig, PopularityThreshold, RankerConfig};
pub use error::{AdaptiveError, AdaptiveResult};
pub use mastery::{derive_status, mastery_update};
pub use ranker::{rank, rank_candidates, RankedCandidate};
pub use student_model::{
    difficulty_adjustment, engagement_update, knowledge_update, performance_score,
    update_student, update_student_at,
};
pub use types::*;
