pub mod simulation;
pub mod text_generation;
pub mod tutor;

pub use tutor::{ServiceError, TutorService, UpdateOutcome};
