use crate::types::{AppError, Result, Upstream};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CodeFile {
    #[serde(default)]
    pub name: String,
    pub content: String,
}

/// Execution request forwarded to Piston.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CodeRequest {
    pub language: String,
    pub version: String,
    pub files: Vec<CodeFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

impl CodeRequest {
    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(AppError::Validation("language must not be empty".to_string()));
        }
        if self.version.trim().is_empty() {
            return Err(AppError::Validation("version must not be empty".to_string()));
        }
        if self.files.is_empty() {
            return Err(AppError::Validation(
                "at least one file is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// One stage (compile or run) of a Piston job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CodeStage {
    pub stdout: String,
    pub stderr: String,
    pub output: String,
    pub code: Option<i64>,
    pub signal: Option<String>,
    pub message: Option<String>,
    pub status: Option<String>,
    pub memory: Option<i64>,
    pub cpu_time: Option<i64>,
    pub wall_time: Option<i64>,
}

/// Structured view of a runtime error read from stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CodeError {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub message: Option<String>,
    /// Source line the caret points into.
    pub error_snippet: Option<String>,
    pub pointer: Option<String>,
    pub location: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CodeResponse {
    #[serde(default)]
    pub compile: Option<CodeStage>,
    #[serde(default)]
    pub run: Option<CodeStage>,
    #[serde(default)]
    pub error: Option<CodeError>,
}

/// Submission location, e.g. `(/box/submission/main.js:3:7)` or
/// `/piston/jobs/<id>/main.js:3`.
const LOCATION_PATTERN: &str =
    r"(?:/box/submission|/piston/jobs/[\w-]+)/([\w.-]+:(\d+)(?::(\d+))?)";
const POINTER_PATTERN: &str = r"(?m)^(\s*\^+)\s*$";
const ERROR_PATTERN: &str = r"(?m)^(?P<type>\w+(?:Error|Exception)): (?P<message>.+)$";

/// Extracts error type, message, caret pointer and location from stderr.
pub struct StderrParser {
    location: Regex,
    pointer: Regex,
    error: Regex,
}

impl StderrParser {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| AppError::Internal(format!("Invalid stderr pattern: {}", e)))
        };

        Ok(Self {
            location: compile(LOCATION_PATTERN)?,
            pointer: compile(POINTER_PATTERN)?,
            error: compile(ERROR_PATTERN)?,
        })
    }

    pub fn parse(&self, stderr: &str) -> CodeError {
        let mut error = CodeError::default();

        if let Some(caps) = self.location.captures(stderr) {
            error.location = caps.get(1).map(|m| m.as_str().to_string());
            error.line = caps.get(2).and_then(|m| m.as_str().parse().ok());
            error.column = caps.get(3).and_then(|m| m.as_str().parse().ok());
        }

        if let Some(pointer) = self.pointer.captures(stderr).and_then(|caps| caps.get(1)) {
            error.pointer = Some(pointer.as_str().to_string());
            error.error_snippet = stderr[..pointer.start()]
                .lines()
                .next_back()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string);
        }

        if let Some(caps) = self.error.captures(stderr) {
            error.error_type = caps.name("type").map(|m| m.as_str().to_string());
            error.message = caps.name("message").map(|m| m.as_str().trim().to_string());
        }

        error
    }
}

/// Client for a Piston code-execution endpoint.
pub struct PistonClient {
    client: Client,
    url: String,
    parser: StderrParser,
}

impl PistonClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            parser: StderrParser::new()?,
        })
    }

    /// Runs the submission. A non-empty `run.stderr` is parsed into `error`.
    ///
    /// Never retried; a timeout surfaces as 504.
    #[tracing::instrument(skip_all, fields(language = %request.language, version = %request.version))]
    pub async fn execute(&self, request: &CodeRequest) -> Result<CodeResponse> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::upstream(Upstream::Piston, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "Piston returned an error");
            return Err(AppError::Upstream {
                service: Upstream::Piston,
                message: format!("Piston returned {status}: {body}"),
                timed_out: false,
            });
        }

        let mut result: CodeResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream(Upstream::Piston, e))?;

        result.error = result
            .run
            .as_ref()
            .filter(|run| !run.stderr.is_empty())
            .map(|run| self.parser.parse(&run.stderr));

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NODE_STDERR: &str = "/piston/jobs/8f1c-42ab/main.js:3\n    console.log(totl);\n                ^\n\nReferenceError: totl is not defined\n    at Object.<anonymous> (/piston/jobs/8f1c-42ab/main.js:3:17)\n";

    fn parse_error(stderr: &str) -> CodeError {
        StderrParser::new().unwrap().parse(stderr)
    }

    fn request() -> CodeRequest {
        CodeRequest {
            language: "javascript".to_string(),
            version: "18.15.0".to_string(),
            files: vec![CodeFile {
                name: "main.js".to_string(),
                content: "console.log(1 + 1)".to_string(),
            }],
            stdin: None,
            args: None,
        }
    }

    #[test]
    fn test_parse_node_reference_error() {
        let error = parse_error(NODE_STDERR);

        assert_eq!(error.error_type.as_deref(), Some("ReferenceError"));
        assert_eq!(error.message.as_deref(), Some("totl is not defined"));
        assert_eq!(error.location.as_deref(), Some("main.js:3"));
        assert_eq!(error.line, Some(3));
        assert_eq!(error.column, None);
        assert_eq!(error.pointer.as_deref(), Some("                ^"));
        assert_eq!(
            error.error_snippet.as_deref(),
            Some("    console.log(totl);")
        );
    }

    #[test]
    fn test_parse_location_with_column() {
        let error = parse_error("TypeError: x is not a function\n    at f (/box/submission/main.js:12:5)");

        assert_eq!(error.error_type.as_deref(), Some("TypeError"));
        assert_eq!(error.location.as_deref(), Some("main.js:12:5"));
        assert_eq!(error.line, Some(12));
        assert_eq!(error.column, Some(5));
        assert_eq!(error.pointer, None);
    }

    #[test]
    fn test_parse_unstructured_stderr() {
        assert_eq!(parse_error("warning: something odd"), CodeError::default());
    }

    #[test]
    fn test_validate_request() {
        assert!(request().validate().is_ok());
        let mut empty = request();
        empty.files.clear();
        assert!(matches!(empty.validate(), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_execute_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/execute"))
            .and(body_json(json!({
                "language": "javascript",
                "version": "18.15.0",
                "files": [{"name": "main.js", "content": "console.log(1 + 1)"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "language": "javascript",
                "version": "18.15.0",
                "run": {"stdout": "2\n", "stderr": "", "code": 0, "signal": null, "output": "2\n"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PistonClient::new(
            &format!("{}/api/v2/execute", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        let response = client.execute(&request()).await.unwrap();

        let run = response.run.unwrap();
        assert_eq!(run.stdout, "2\n");
        assert_eq!(run.code, Some(0));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_execute_parses_stderr() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "run": {"stdout": "", "stderr": NODE_STDERR, "code": 1, "signal": null, "output": NODE_STDERR}
            })))
            .mount(&server)
            .await;

        let client = PistonClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let response = client.execute(&request()).await.unwrap();

        let error = response.error.unwrap();
        assert_eq!(error.error_type.as_deref(), Some("ReferenceError"));
    }

    #[tokio::test]
    async fn test_execute_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let client = PistonClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = client.execute(&request()).await.unwrap_err();

        assert_eq!(err.status(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = PistonClient::new(&server.uri(), Duration::from_millis(200)).unwrap();
        let err = client.execute(&request()).await.unwrap_err();

        assert_eq!(err.status(), axum::http::StatusCode::GATEWAY_TIMEOUT);
    }
}
