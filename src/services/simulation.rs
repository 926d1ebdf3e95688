//! Scripted runs of the tutor: replay recorded interactions for a set of
//! students, then rank a shared candidate pool for each of them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::adaptive::insights::Insight;
use crate::adaptive::session::{challenging_subjects, favorite_subjects, SubjectResult};
use crate::adaptive::{Candidate, Interaction, RankedCandidate, StudentState, UpdateSummary};
use crate::services::tutor::{ServiceError, TutorService};
use crate::store::StudentStateRepository;

const DEFAULT_LIMIT: usize = 5;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("student {student_id}: {source}")]
    Student {
        student_id: String,
        #[source]
        source: ServiceError,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub students: Vec<StudentScript>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub include_activities: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentScript {
    pub student_id: String,
    #[serde(default)]
    pub initial_state: Option<StudentState>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    /// Session accuracies, newest first, used to decide on a challenge activity.
    #[serde(default)]
    pub recent_accuracies: Vec<f64>,
    #[serde(default)]
    pub subject_history: Vec<SubjectResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub students: Vec<StudentReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentReport {
    pub student_id: String,
    pub updates: Vec<UpdateSummary>,
    pub rejected: Vec<String>,
    pub final_state: StudentState,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<RankedCandidate>,
    pub favorite_subjects: Vec<String>,
    pub challenging_subjects: Vec<String>,
}

pub fn parse_script(json: &str) -> Result<Script, ScriptError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_script(path: impl AsRef<Path>) -> Result<Script, ScriptError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_script(&raw)
}

/// Invalid interactions are reported and skipped; repository failures abort
/// the run.
pub fn run_script<R: StudentStateRepository>(
    script: &Script,
    service: &TutorService<R>,
) -> Result<Report, ScriptError> {
    let mut students = Vec::with_capacity(script.students.len());
    for student in &script.students {
        let report = run_student(script, student, service).map_err(|source| ScriptError::Student {
            student_id: student.student_id.clone(),
            source,
        })?;
        info!(
            student_id = %report.student_id,
            updates = report.updates.len(),
            rejected = report.rejected.len(),
            "script student finished"
        );
        students.push(report);
    }
    Ok(Report { students })
}

fn run_student<R: StudentStateRepository>(
    script: &Script,
    student: &StudentScript,
    service: &TutorService<R>,
) -> Result<StudentReport, ServiceError> {
    let id = student.student_id.as_str();
    if let Some(initial) = &student.initial_state {
        service.repository().save(id, initial)?;
    }

    let mut updates = Vec::new();
    let mut rejected = Vec::new();
    for interaction in &student.interactions {
        match service.record_interaction(id, interaction) {
            Ok(outcome) => updates.push(outcome.summary),
            Err(ServiceError::Adaptive(err)) => rejected.push(err.to_string()),
            Err(err) => return Err(err),
        }
    }

    let recommendations = if script.include_activities {
        service.recommend_with_activities(id, &script.candidates, &student.recent_accuracies, script.limit)?
    } else {
        service.recommend(id, &script.candidates, script.limit)?
    };

    Ok(StudentReport {
        student_id: student.student_id.clone(),
        updates,
        rejected,
        final_state: service.state(id)?,
        insights: service.insights(id)?,
        recommendations,
        favorite_subjects: favorite_subjects(&student.subject_history),
        challenging_subjects: challenging_subjects(&student.subject_history),
    })
}
