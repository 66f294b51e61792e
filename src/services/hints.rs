use crate::llm::LlmClient;
use crate::types::{AppError, Result, Upstream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

const TUTOR_SYSTEM_PROMPT: &str = r#"You are an expert JavaScript algorithms tutor helping students learn data structures and algorithms.

Your role:
- Analyze the user's code and determine what type of help they need
- Provide helpful hints without giving away the complete solution
- Explain concepts clearly for beginners
- Guide students through problem-solving step by step
- Focus on JavaScript syntax and best practices

Analysis guidelines:
- Empty or minimal code: focus on concepts and getting started
- Syntax errors: help with JavaScript syntax
- Structure present but wrong logic: guide through algorithmic thinking
- Code runs but fails tests: help with debugging and edge cases
- Code close to correct: give final optimization hints

Reply with a single JSON object with these fields:
  "hint": string, concise but informative
  "explanation": string
  "code_snippet": string or null, only when needed for understanding
  "next_steps": array of strings
  "confidence_score": number between 0.1 and 1.0
  "detected_issue_type": string or null, e.g. "missing base case", "syntax error", "wrong approach", "concept understanding"
Adjust your language to the student's difficulty level."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct HintRequest {
    pub user_code: String,
    pub exercise_description: String,
    pub test_cases: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub difficulty_level: Difficulty,
    #[serde(default)]
    pub previous_hints: Vec<HintResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HintResponse {
    pub hint: String,
    pub explanation: String,
    #[serde(default)]
    pub code_snippet: Option<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    pub confidence_score: f64,
    #[serde(default)]
    pub detected_issue_type: Option<String>,
}

/// Generates tutoring hints through an [`LlmClient`].
pub struct HintService {
    llm: Arc<dyn LlmClient>,
}

impl HintService {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    pub async fn generate(&self, request: &HintRequest) -> Result<HintResponse> {
        if request.exercise_description.trim().is_empty() {
            return Err(AppError::Validation(
                "exercise_description must not be empty".to_string(),
            ));
        }

        let prompt = build_prompt(request)?;
        let raw = self
            .llm
            .generate_with_system(TUTOR_SYSTEM_PROMPT, &prompt)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Hint generation failed"))?;

        let mut hint = parse_hint(&raw)?;
        hint.confidence_score = hint.confidence_score.clamp(0.1, 1.0);

        tracing::info!(
            confidence = hint.confidence_score,
            issue = hint.detected_issue_type.as_deref().unwrap_or("unknown"),
            "Hint generated"
        );
        Ok(hint)
    }
}

fn build_prompt(request: &HintRequest) -> Result<String> {
    let mut prompt = format!(
        "Exercise: {}\n\n\
         User's current code:\n```javascript\n{}\n```\n\n\
         Test cases that need to pass:\n```javascript\n{}\n```\n\n\
         Student difficulty level: {}\n\
         Previous hints given: {}\n",
        request.exercise_description,
        request.user_code,
        request.test_cases,
        request.difficulty_level.as_str(),
        request.previous_hints.len(),
    );

    if !request.previous_hints.is_empty() {
        let previous = request
            .previous_hints
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to encode previous hints: {}", e)))?;
        prompt.push_str(&format!("Previous hints were: {}\n", previous.join("; ")));
    }

    if let Some(error) = request.error.as_deref().filter(|e| !e.trim().is_empty()) {
        prompt.push_str(&format!(
            "\nRunning the user code resulted in an error: {error}\n"
        ));
    }

    prompt.push_str(
        "\nPlease provide a helpful hint that guides the student without giving away the complete solution.",
    );
    Ok(prompt)
}

/// Parses the model reply, tolerating a surrounding Markdown code fence.
fn parse_hint(raw: &str) -> Result<HintResponse> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim()).map_err(|e| AppError::Upstream {
        service: Upstream::Llm,
        message: format!("Unparseable hint reply: {}", e),
        timed_out: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct CannedLlm {
        reply: String,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl CannedLlm {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
            self.prompts
                .lock()
                .push((system.to_string(), prompt.to_string()));
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    fn request() -> HintRequest {
        HintRequest {
            user_code: "function sum(a) { return a }".to_string(),
            exercise_description: "Sum an array".to_string(),
            test_cases: "sum([1,2]) === 3".to_string(),
            error: Some("TypeError: a.reduce is not a function".to_string()),
            difficulty_level: Difficulty::Intermediate,
            previous_hints: Vec::new(),
        }
    }

    const REPLY: &str = r#"{"hint":"Loop over the array","explanation":"You return the array itself","next_steps":["Use reduce"],"confidence_score":0.8,"detected_issue_type":"wrong approach"}"#;

    #[tokio::test]
    async fn test_generate_hint() {
        let llm = CannedLlm::new(REPLY);
        let service = HintService::new(llm.clone());

        let hint = service.generate(&request()).await.unwrap();

        assert_eq!(hint.hint, "Loop over the array");
        assert_eq!(hint.next_steps, ["Use reduce"]);
        assert_eq!(hint.code_snippet, None);

        let prompts = llm.prompts.lock();
        let (system, prompt) = &prompts[0];
        assert!(system.contains("JavaScript algorithms tutor"));
        assert!(prompt.contains("Exercise: Sum an array"));
        assert!(prompt.contains("Student difficulty level: intermediate"));
        assert!(prompt.contains("resulted in an error: TypeError"));
    }

    #[tokio::test]
    async fn test_fenced_reply_and_confidence_clamp() {
        let reply = "```json\n{\"hint\":\"h\",\"explanation\":\"e\",\"next_steps\":[],\"confidence_score\":3.5}\n```";
        let service = HintService::new(CannedLlm::new(reply));

        let hint = service.generate(&request()).await.unwrap();

        assert_eq!(hint.hint, "h");
        assert_eq!(hint.confidence_score, 1.0);
    }

    #[tokio::test]
    async fn test_garbage_reply_is_upstream_error() {
        let service = HintService::new(CannedLlm::new("I think you should try harder"));

        let err = service.generate(&request()).await.unwrap_err();

        assert_eq!(err.status(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_previous_hints_are_included() {
        let llm = CannedLlm::new(REPLY);
        let service = HintService::new(llm.clone());
        let mut req = request();
        req.previous_hints = vec![parse_hint(REPLY).unwrap()];

        service.generate(&req).await.unwrap();

        let prompts = llm.prompts.lock();
        assert!(prompts[0].1.contains("Previous hints given: 1"));
        assert!(prompts[0].1.contains("Previous hints were: {\"hint\":\"Loop over the array\""));
    }

    #[tokio::test]
    async fn test_empty_exercise_is_rejected() {
        let llm = CannedLlm::new(REPLY);
        let service = HintService::new(llm.clone());
        let mut req = request();
        req.exercise_description = "  ".to_string();

        assert!(matches!(
            service.generate(&req).await,
            Err(AppError::Validation(_))
        ));
        assert!(llm.prompts.lock().is_empty());
    }
}
