//! Chat-completions integration for work log summaries.
//!
//! Turns computed sessions and parallel-work windows into a prompt and asks
//! an OpenAI-compatible endpoint (`DeepSeek` or `OpenAI`) for a prose summary.
//! The summary only reads engine output; it never feeds back into it.

use std::fmt::{self, Write};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wl_core::{OverlapWindow, SessionsByProject, is_parallel};

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DURATION_NOTE: &str = "Durations are wall-clock spans between first and last commit.";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a technical writing assistant. Using the git commit \
records provided, write a structured work summary in Markdown.

Include:
1. A short overview of the work (3-5 sentences)
2. Main changes, grouped by module or project
3. Statistics (commits, lines changed, files touched)
4. Notable technical improvements

If work sessions are listed, add a timeline of the sessions (start, end, commit count) and the \
gaps between them. If parallel work windows are listed, mark them clearly: parallel time must \
not be added up when estimating the time actually spent.";

const PER_PROJECT_ESTIMATE: &str =
    "\nAlso estimate the time invested per project from commit density and continuity, and list each project's main output.";

/// LLM client errors.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provided API key was invalid.
    #[error("invalid API key: {reason}")]
    InvalidApiKey { reason: &'static str },
    /// Sampling temperature outside the accepted range.
    #[error("temperature must be between 0.0 and 2.0, got {value}")]
    InvalidTemperature { value: f32 },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("API error: {message}")]
    Api { message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Chat-completions provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    DeepSeek,
    OpenAi,
}

impl Provider {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DeepSeek => "deepseek",
            Self::OpenAi => "openai",
        }
    }

    #[must_use]
    pub const fn default_endpoint(&self) -> &'static str {
        match self {
            Self::DeepSeek => "https://api.deepseek.com/v1/chat/completions",
            Self::OpenAi => "https://api.openai.com/v1/chat/completions",
        }
    }

    #[must_use]
    pub const fn default_model(&self) -> &'static str {
        match self {
            Self::DeepSeek => "deepseek-chat",
            Self::OpenAi => "gpt-4o-mini",
        }
    }

    /// Conventional environment variable holding the provider's API key.
    #[must_use]
    pub const fn api_key_env(&self) -> &'static str {
        match self {
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deepseek" => Ok(Self::DeepSeek),
            "openai" => Ok(Self::OpenAi),
            _ => Err(format!("invalid provider: {s}")),
        }
    }
}

/// Chat-completions API client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or whitespace-only, or if
    /// the HTTP client fails to build.
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();

        if api_key.is_empty() {
            return Err(LlmError::InvalidApiKey {
                reason: "API key cannot be empty",
            });
        }
        if api_key.trim().is_empty() {
            return Err(LlmError::InvalidApiKey {
                reason: "API key cannot be whitespace-only",
            });
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(LlmError::ClientBuild)?;

        Ok(Self {
            http,
            api_key,
            endpoint: endpoint.into(),
        })
    }

    /// Ask the model for a work summary.
    pub async fn summarize(&self, input: &SummaryRequest) -> Result<String, LlmError> {
        input.validate()?;

        let request = ChatRequest {
            model: input.model.clone(),
            messages: build_messages(input),
            temperature: input.temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(parse_api_error(&body).unwrap_or_else(|| LlmError::Api {
                message: format!("status {status}: {body}"),
            }));
        }

        parse_chat_response(&body)
    }
}

/// Input for a summary request.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub model: String,
    pub temperature: f32,
    /// Replaces the built-in system prompt when set.
    pub system_prompt: Option<String>,
    /// Restrict the summary to one author.
    pub author: Option<String>,
    /// Rendered commit/session context, see [`build_context`].
    pub context: String,
}

impl SummaryRequest {
    fn validate(&self) -> Result<(), LlmError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(LlmError::InvalidTemperature {
                value: self.temperature,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn build_messages(input: &SummaryRequest) -> Vec<Message> {
    let mut system = input
        .system_prompt
        .clone()
        .unwrap_or_else(|| format!("{DEFAULT_SYSTEM_PROMPT}{PER_PROJECT_ESTIMATE}"));

    let user = if let Some(author) = &input.author {
        let _ = write!(
            system,
            "\nOnly summarize commits whose author name or email contains \"{author}\", \
             and state \"Author: {author}\" at the top of the summary."
        );
        format!(
            "Write a work summary for {author} from the following commit records:\n\n{}",
            input.context
        )
    } else {
        format!(
            "Write a work summary from the following commit records:\n\n{}",
            input.context
        )
    };

    vec![
        Message {
            role: "system",
            content: system,
        },
        Message {
            role: "user",
            content: user,
        },
    ]
}

fn parse_chat_response(body: &str) -> Result<String, LlmError> {
    let payload: ChatResponse =
        serde_json::from_str(body).map_err(|err| LlmError::InvalidResponse(err.to_string()))?;
    let text = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(LlmError::InvalidResponse(
            "missing message content".to_string(),
        ));
    }
    Ok(text)
}

fn parse_api_error(body: &str) -> Option<LlmError> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        error: ErrorDetails,
    }

    #[derive(Deserialize)]
    struct ErrorDetails {
        message: String,
    }

    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .map(|payload| LlmError::Api {
            message: payload.error.message,
        })
}

/// Render sessions and parallel-work windows as prompt context.
///
/// Parallel windows come first so the model sees them before the
/// per-project detail.
pub fn build_context(
    sessions_by_project: &SessionsByProject,
    windows: &[OverlapWindow<'_>],
) -> String {
    let mut lines = Vec::new();

    if !windows.is_empty() {
        let total: i64 = windows.iter().map(|w| w.duration().num_minutes()).sum();
        lines.push("# Parallel work across projects".to_string());
        lines.push(format!(
            "{} parallel windows, about {total} minutes of overlap in total",
            windows.len()
        ));
        for (idx, window) in windows.iter().enumerate() {
            let projects: Vec<&str> = window.project_ids.iter().copied().collect();
            lines.push(format!(
                "- window {}: {} ~ {} ({} minutes, projects: {})",
                idx + 1,
                window.start.to_rfc3339(),
                window.end.to_rfc3339(),
                window.duration().num_minutes(),
                projects.join(", ")
            ));
        }
        lines.push(String::new());
    }

    for (project_id, sessions) in sessions_by_project {
        if sessions.is_empty() {
            continue;
        }
        lines.push(format!("# Project: {project_id}"));
        let total: i64 = sessions.iter().map(|s| s.duration().num_minutes()).sum();
        lines.push(format!(
            "Work sessions: {}, about {total} minutes in total",
            sessions.len()
        ));
        for (idx, session) in sessions.iter().enumerate() {
            let marker = if is_parallel(session, windows) {
                " [parallel]"
            } else {
                ""
            };
            lines.push(format!(
                "- session {}: {} ~ {} ({} minutes, {} commits){marker}",
                idx + 1,
                session.start.to_rfc3339(),
                session.end.to_rfc3339(),
                session.duration().num_minutes(),
                session.commit_count()
            ));
        }
        for session in sessions {
            for commit in &session.commits {
                lines.push(format!(
                    "- [{}] {} {}",
                    commit.short_sha(),
                    commit.timestamp.to_rfc3339(),
                    commit.message
                ));
                lines.push(format!(
                    "  stats: +{} -{}, {} files",
                    commit.stats.insertions, commit.stats.deletions, commit.stats.files_changed
                ));
            }
        }
        lines.push(String::new());
    }

    lines.push(DURATION_NOTE.to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wl_core::{Commit, DiffStats, SessionConfig, build_sessions_by_project, detect_overlaps};

    fn commit(project: &str, sha: &str, hour: u32, minute: u32) -> Commit {
        Commit {
            project_id: project.to_string(),
            sha: sha.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 29, hour, minute, 0).unwrap(),
            author_key: "Dev <dev@example.com>".to_string(),
            message: format!("change {sha}"),
            stats: DiffStats {
                files_changed: 2,
                insertions: 12,
                deletions: 3,
            },
        }
    }

    fn request(author: Option<&str>) -> SummaryRequest {
        SummaryRequest {
            model: "deepseek-chat".to_string(),
            temperature: 0.3,
            system_prompt: None,
            author: author.map(String::from),
            context: "context body".to_string(),
        }
    }

    #[test]
    fn client_rejects_empty_api_key() {
        assert!(matches!(
            Client::new("", Provider::DeepSeek.default_endpoint()),
            Err(LlmError::InvalidApiKey { .. })
        ));
    }

    #[test]
    fn client_rejects_whitespace_api_key() {
        assert!(matches!(
            Client::new("   ", Provider::DeepSeek.default_endpoint()),
            Err(LlmError::InvalidApiKey { .. })
        ));
    }

    #[test]
    fn client_debug_redacts_api_key() {
        let client = Client::new("secret-key", Provider::OpenAi.default_endpoint()).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn provider_parses_and_displays() {
        assert_eq!("openai".parse::<Provider>(), Ok(Provider::OpenAi));
        assert_eq!("deepseek".parse::<Provider>(), Ok(Provider::DeepSeek));
        assert!("claude".parse::<Provider>().is_err());
        assert_eq!(Provider::default().to_string(), "deepseek");
        assert_eq!(Provider::OpenAi.default_model(), "gpt-4o-mini");
    }

    #[test]
    fn request_rejects_out_of_range_temperature() {
        let mut input = request(None);
        input.temperature = 2.5;
        assert!(matches!(
            input.validate(),
            Err(LlmError::InvalidTemperature { .. })
        ));
        input.temperature = 0.0;
        assert!(input.validate().is_ok());
    }

    #[test]
    fn messages_use_default_prompt_without_author() {
        let messages = build_messages(&request(None));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("parallel time must not be added up"));
        assert!(messages[0].content.contains("time invested per project"));
        assert!(messages[1].content.ends_with("context body"));
    }

    #[test]
    fn messages_scope_to_author() {
        let messages = build_messages(&request(Some("ada")));
        assert!(messages[0].content.contains("Author: ada"));
        assert!(messages[1].content.starts_with("Write a work summary for ada"));
    }

    #[test]
    fn custom_system_prompt_replaces_default() {
        let mut input = request(None);
        input.system_prompt = Some("Be brief.".to_string());
        let messages = build_messages(&input);
        assert_eq!(messages[0].content, "Be brief.");
    }

    #[test]
    fn parse_chat_response_trims_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Done.\n"}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "Done.");
    }

    #[test]
    fn parse_chat_response_rejects_empty_choices() {
        let err = parse_chat_response(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn parse_api_error_extracts_message() {
        let err = parse_api_error(r#"{"error":{"message":"bad key","type":"auth"}}"#).unwrap();
        assert_eq!(err.to_string(), "API error: bad key");
        assert!(parse_api_error("oops").is_none());
    }

    #[test]
    fn context_lists_windows_then_projects() {
        let commits = vec![
            commit("api", "aaaaaaaa1", 9, 0),
            commit("api", "aaaaaaaa2", 10, 0),
            commit("web", "bbbbbbbb1", 9, 30),
            commit("web", "bbbbbbbb2", 10, 30),
        ];
        let sessions =
            build_sessions_by_project(commits, &SessionConfig::from_minutes(60).unwrap()).unwrap();
        let windows = detect_overlaps(&sessions).unwrap();
        let context = build_context(&sessions, &windows);

        let parallel_at = context.find("# Parallel work across projects").unwrap();
        let project_at = context.find("# Project: api").unwrap();
        assert!(parallel_at < project_at);
        assert!(context.contains("1 parallel windows, about 30 minutes of overlap in total"));
        assert!(context.contains("projects: api, web"));
        assert!(context.contains("(60 minutes, 2 commits) [parallel]"));
        assert!(context.contains("- [aaaaaaaa] 2025-01-29T09:00:00+00:00 change aaaaaaaa1"));
        assert!(context.contains("stats: +12 -3, 2 files"));
    }

    #[test]
    fn context_without_windows_has_no_parallel_section() {
        let commits = vec![commit("api", "a1", 9, 0)];
        let sessions =
            build_sessions_by_project(commits, &SessionConfig::from_minutes(60).unwrap()).unwrap();
        let context = build_context(&sessions, &[]);
        assert!(!context.contains("Parallel"));
        assert!(context.contains("Work sessions: 1, about 0 minutes in total"));
    }
}
