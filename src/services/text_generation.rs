use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::adaptive::types::StudentState;

const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_MAX_RETRIES: usize = 3;
const BASE_BACKOFF_MS: u64 = 200;

const BEGINNER_BELOW: f64 = 0.3;
const INTERMEDIATE_BELOW: f64 = 0.7;
const LOW_ENGAGEMENT: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Lesson,
    Quiz,
    Chat,
    Explanation,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lesson => "lesson",
            Self::Quiz => "quiz",
            Self::Chat => "chat",
            Self::Explanation => "explanation",
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation not configured: {0}")]
    NotConfigured(&'static str),
    #[error("text generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider error: {message}")]
    Provider { retryable: bool, message: String },
    #[error("empty response")]
    EmptyResponse,
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Provider { retryable, .. } => *retryable,
            Self::NotConfigured(_) | Self::EmptyResponse => false,
        }
    }
}

/// The one call the tutor makes into an external text-generation service.
pub trait TextGenerator: Send + Sync {
    fn generate(
        &self,
        prompt: &str,
        kind: ContentKind,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_backoff: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: Duration::from_millis(BASE_BACKOFF_MS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_u64 = |key: &str| parse_u64(lookup(key));
        let mut policy = Self::default();
        if let Some(ms) = env_u64("TUTOR_GENERATION_TIMEOUT_MS") {
            policy.timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = env_u64("TUTOR_GENERATION_MAX_RETRIES") {
            policy.max_retries = retries as usize;
        }
        policy
    }

    fn backoff(&self, retry: usize) -> Duration {
        self.base_backoff.saturating_mul(1u32 << retry.min(16))
    }
}

/// Wraps a generator with a per-call timeout and exponential backoff on
/// retryable failures. Blank responses are rejected.
#[derive(Debug, Clone)]
pub struct RetryingGenerator<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn attempt(&self, prompt: &str, kind: ContentKind) -> Result<String, GenerationError> {
        match timeout(self.policy.timeout, self.inner.generate(prompt, kind)).await {
            Err(_) => Err(GenerationError::Timeout(self.policy.timeout)),
            Ok(Ok(text)) if text.trim().is_empty() => Err(GenerationError::EmptyResponse),
            Ok(result) => result,
        }
    }
}

impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    async fn generate(&self, prompt: &str, kind: ContentKind) -> Result<String, GenerationError> {
        let mut retry = 0;
        loop {
            match self.attempt(prompt, kind).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && retry < self.policy.max_retries => {
                    warn!(retry, kind = kind.as_str(), error = %err, "text generation failed, retrying");
                    sleep(self.policy.backoff(retry)).await;
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

pub fn level_description(difficulty: f64) -> &'static str {
    if difficulty < BEGINNER_BELOW {
        "beginner"
    } else if difficulty < INTERMEDIATE_BELOW {
        "intermediate"
    } else {
        "advanced"
    }
}

/// Renders the student's adaptive context ahead of the request so the
/// generator can pitch its answer at the right level.
pub fn build_tutor_prompt(
    state: &StudentState,
    subject: Option<&str>,
    kind: ContentKind,
    request: &str,
) -> String {
    let mut prompt = String::from(
        "You are an AI tutor that provides personalized, engaging, and educational responses.\n\
         You should:\n\
         - Be encouraging and supportive\n\
         - Explain concepts clearly with examples\n\
         - Ask follow-up questions to check understanding",
    );

    if let Some(subject) = subject.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str(&format!("\n- Focus on {subject} topics and concepts"));
    }

    let level = level_description(state.difficulty_level);
    prompt.push_str(&format!(
        "\n- Adjust explanations for {level} level (difficulty: {:.2})",
        state.difficulty_level
    ));
    match level {
        "beginner" => prompt.push_str("\n- Use simple language and lots of examples"),
        "advanced" => prompt.push_str("\n- Use precise terminology and in-depth analysis"),
        _ => prompt.push_str("\n- Balance simplicity with depth"),
    }

    if let Some(style) = state.learning_style {
        prompt.push_str(&format!("\n- Adapt to {} learning style", style.as_str()));
    }
    if state.engagement_score < LOW_ENGAGEMENT {
        prompt.push_str("\n- Keep it short and interactive to rebuild interest");
    }

    prompt.push_str(&format!("\n\nTask ({}): {}", kind.as_str(), request.trim()));
    prompt
}

fn parse_u64(value: Option<String>) -> Option<u64> {
    value?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::types::LearningStyle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
        retryable: bool,
    }

    impl TextGenerator for Flaky {
        async fn generate(&self, prompt: &str, _kind: ContentKind) -> Result<String, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(GenerationError::Provider {
                    retryable: self.retryable,
                    message: "503".to_string(),
                });
            }
            Ok(format!("echo: {prompt}"))
        }
    }

    struct Blank;

    impl TextGenerator for Blank {
        async fn generate(&self, _prompt: &str, _kind: ContentKind) -> Result<String, GenerationError> {
            Ok("   ".to_string())
        }
    }

    struct Slow;

    impl TextGenerator for Slow {
        async fn generate(&self, _prompt: &str, _kind: ContentKind) -> Result<String, GenerationError> {
            sleep(Duration::from_millis(200)).await;
            Ok("late".to_string())
        }
    }

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_backoff: Duration::from_millis(1),
            timeout: Duration::from_millis(50),
        }
    }

    fn flaky(failures: usize, retryable: bool) -> Flaky {
        Flaky {
            failures,
            calls: AtomicUsize::new(0),
            retryable,
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let generator = RetryingGenerator::new(flaky(2, true), fast_policy(3));
        let text = generator.generate("hi", ContentKind::Chat).await.unwrap();
        assert_eq!(text, "echo: hi");
        assert_eq!(generator.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let generator = RetryingGenerator::new(flaky(10, true), fast_policy(2));
        let err = generator.generate("hi", ContentKind::Quiz).await.unwrap_err();
        assert!(matches!(err, GenerationError::Provider { .. }));
        assert_eq!(generator.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let generator = RetryingGenerator::new(flaky(1, false), fast_policy(3));
        assert!(generator.generate("hi", ContentKind::Lesson).await.is_err());
        assert_eq!(generator.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_response_rejected() {
        let generator = RetryingGenerator::new(Blank, fast_policy(3));
        let err = generator.generate("hi", ContentKind::Explanation).await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_timeout() {
        let generator = RetryingGenerator::new(Slow, fast_policy(0));
        let err = generator.generate("hi", ContentKind::Chat).await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
    }

    #[test]
    fn test_policy_from_lookup() {
        let policy = RetryPolicy::from_lookup(|key| match key {
            "TUTOR_GENERATION_TIMEOUT_MS" => Some("1500".to_string()),
            "TUTOR_GENERATION_MAX_RETRIES" => Some("x".to_string()),
            _ => None,
        });
        assert_eq!(policy.timeout, Duration::from_millis(1500));
        assert_eq!(policy.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(policy.base_backoff, Duration::from_millis(BASE_BACKOFF_MS));
    }

    #[test]
    fn test_level_description() {
        assert_eq!(level_description(0.1), "beginner");
        assert_eq!(level_description(0.5), "intermediate");
        assert_eq!(level_description(0.7), "advanced");
    }

    #[test]
    fn test_prompt_includes_context() {
        let state = StudentState {
            difficulty_level: 0.2,
            engagement_score: 0.3,
            ..Default::default()
        }
        .with_learning_style(LearningStyle::Visual);
        let prompt = build_tutor_prompt(&state, Some("fractions"), ContentKind::Explanation, "Why?");
        assert!(prompt.contains("Focus on fractions"));
        assert!(prompt.contains("beginner level"));
        assert!(prompt.contains("visual learning style"));
        assert!(prompt.contains("rebuild interest"));
        assert!(prompt.ends_with("Task (explanation): Why?"));
    }
}
