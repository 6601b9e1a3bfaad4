//! Chat-completion client and reply parsing.
//!
//! The orchestrator talks to the model through the [`CompletionClient`]
//! trait so the HTTP implementation can be swapped for a scripted one.

use crate::{
    config::Config,
    error::{Error, Result},
    template::Prompt,
};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User input
    User,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Message author role
    pub role: Role,
    /// Message text
    pub content: String,
}

/// Body of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    /// Builds the two-message request for a rendered prompt.
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: Prompt) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: prompt.system,
                },
                ChatMessage {
                    role: Role::User,
                    content: prompt.user,
                },
            ],
        }
    }

    /// Returns the content of the first message with the given role.
    #[must_use]
    pub fn message(&self, role: Role) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == role)
            .map(|m| m.content.as_str())
    }
}

/// A service that turns a completion request into reply text.
pub trait CompletionClient {
    /// Sends the request and returns the raw reply text.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the reply is unusable.
    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Blocking client for OpenAI-compatible chat-completion endpoints.
pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiClient {
    /// Creates a client from the endpoint settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("cursor-rulegen/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_http(http, config))
    }

    fn with_http(http: Client, config: &Config) -> Self {
        Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url),
            api_key: config.api_key.clone(),
        }
    }

    /// Endpoint the requests are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl CompletionClient for OpenAiClient {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, model = %request.model))]
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        debug!("Completion endpoint answered {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(Error::api(status.as_u16(), api_error_message(&body)));
        }

        reply_text(&body)
    }
}

/// Extracts the `error.message` field of an API error body, if present.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Extracts the first choice's message text from a response body.
///
/// A `null` content is treated as an empty reply.
fn reply_text(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::api(0, format!("invalid response body: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| Error::api(0, "response contained no choices"))
}

/// The two sections extracted from a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    /// Content for the rules file
    pub rules: String,
    /// Content for the missing-features file, absent if the reply never
    /// named that file
    pub missing_features: Option<String>,
}

/// Splits a model reply into its rules and missing-features sections.
///
/// The reply is split once on the first occurrence of `missing_marker`.
/// In the first part, the line holding the first case-insensitive
/// occurrence of `rules_marker` is cut from its start through the last
/// occurrence of the marker on that line; the remainder is trimmed. The
/// second part, if any, is trimmed. Both markers must be non-empty.
#[must_use]
pub fn parse_reply(text: &str, rules_marker: &str, missing_marker: &str) -> CompletionResult {
    let (head, tail) = match text.split_once(missing_marker) {
        Some((head, tail)) => (head, Some(tail)),
        None => (text, None),
    };

    CompletionResult {
        rules: strip_label(head, rules_marker).trim().to_string(),
        missing_features: tail.map(|t| t.trim().to_string()),
    }
}

/// Characters that end a line for label stripping.
const LINE_TERMINATORS: [char; 4] = ['\n', '\r', '\u{2028}', '\u{2029}'];

fn strip_label(text: &str, marker: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let haystack = text.to_ascii_lowercase();
    let needle = marker.to_ascii_lowercase();

    let Some(first) = haystack.find(&needle) else {
        return text.to_string();
    };

    let line_start = text[..first]
        .char_indices()
        .rev()
        .find(|(_, c)| LINE_TERMINATORS.contains(c))
        .map_or(0, |(i, c)| i + c.len_utf8());
    let line_end = text[first..]
        .find(LINE_TERMINATORS)
        .map_or(text.len(), |i| first + i);

    // Cut through the last occurrence on that line.
    let last = haystack[first..line_end]
        .rfind(&needle)
        .map_or(first, |i| first + i);

    let mut stripped = String::with_capacity(text.len());
    stripped.push_str(&text[..line_start]);
    stripped.push_str(&text[last + needle.len()..]);
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    const RULES: &str = ".cursor/rules";
    const MISSING: &str = ".cursor/missing-features.md";

    #[test]
    fn test_parse_reply_with_both_sections() {
        let reply = "### 1. .cursor/rules\n- Use TypeScript\n- Prefer hooks\n\n### 2. .cursor/missing-features.md\n- No tests\n- No CI\n";
        let result = parse_reply(reply, RULES, MISSING);

        assert_eq!(result.rules, "- Use TypeScript\n- Prefer hooks\n\n### 2.");
        assert_eq!(result.missing_features.as_deref(), Some("- No tests\n- No CI"));
        assert!(!result.rules.contains(RULES));
    }

    #[test]
    fn test_parse_reply_plain_labels() {
        let reply = "  .cursor/rules\nrule one\n.cursor/missing-features.md\nfeature one\n  ";
        let result = parse_reply(reply, RULES, MISSING);

        assert_eq!(result.rules, "rule one");
        assert_eq!(result.missing_features.as_deref(), Some("feature one"));
    }

    #[test]
    fn test_parse_reply_rules_label_case_insensitive() {
        let reply = "**.CURSOR/RULES**\nalways lint\n.cursor/missing-features.md\nnothing";
        let result = parse_reply(reply, RULES, MISSING);

        assert_eq!(result.rules, "**\nalways lint");
    }

    #[test]
    fn test_parse_reply_keeps_preamble_lines() {
        let reply = "Here you go.\n\nFile: .cursor/rules\nbody\n.cursor/missing-features.md\nmissing";
        let result = parse_reply(reply, RULES, MISSING);

        assert_eq!(result.rules, "Here you go.\n\n\nbody");
    }

    #[test]
    fn test_parse_reply_label_repeated_on_line() {
        let reply = "## .cursor/rules (see .cursor/RULES)\nbody\n.cursor/missing-features.md\nm";
        let result = parse_reply(reply, RULES, MISSING);

        assert_eq!(result.rules, ")\nbody");
    }

    #[test]
    fn test_parse_reply_label_on_later_line_is_kept() {
        let reply = "## .cursor/rules\nsee .cursor/rules for details";
        let result = parse_reply(reply, RULES, MISSING);

        assert_eq!(result.rules, "see .cursor/rules for details");
    }

    #[test]
    fn test_parse_reply_unicode_line_separator() {
        let reply = "intro\u{2028}File: .cursor/rules\u{2029}body";
        let result = parse_reply(reply, RULES, MISSING);

        assert_eq!(result.rules, "intro\u{2028}\u{2029}body");
    }

    #[test]
    fn test_parse_reply_without_second_marker() {
        let reply = "\n1. .cursor/rules\n  rule a\n  rule b\n\n";
        let result = parse_reply(reply, RULES, MISSING);

        assert_eq!(result.rules, "rule a\n  rule b");
        assert_eq!(result.missing_features, None);
    }

    #[test]
    fn test_parse_reply_without_any_marker() {
        let reply = "  just some text  \n";
        let result = parse_reply(reply, RULES, MISSING);

        assert_eq!(result.rules, "just some text");
        assert_eq!(result.missing_features, None);
    }

    #[test]
    fn test_parse_reply_second_marker_is_case_sensitive() {
        let reply = ".cursor/rules\nrules\n.CURSOR/MISSING-FEATURES.MD\nmissing";
        let result = parse_reply(reply, RULES, MISSING);

        assert_eq!(result.missing_features, None);
        assert!(result.rules.contains(".CURSOR/MISSING-FEATURES.MD"));
    }

    #[test]
    fn test_parse_reply_splits_only_once() {
        let reply = ".cursor/rules\nr\n.cursor/missing-features.md\nfirst\n.cursor/missing-features.md\nsecond";
        let result = parse_reply(reply, RULES, MISSING);

        assert_eq!(
            result.missing_features.as_deref(),
            Some("first\n.cursor/missing-features.md\nsecond")
        );
    }

    #[test]
    fn test_parse_reply_empty() {
        let result = parse_reply("", RULES, MISSING);

        assert_eq!(result.rules, "");
        assert_eq!(result.missing_features, None);
    }

    #[test]
    fn test_reply_text_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}},{"message":{"content":"other"}}]}"#;
        assert_eq!(reply_text(body).unwrap(), "hello");
    }

    #[test]
    fn test_reply_text_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(reply_text(body).unwrap(), "");
    }

    #[test]
    fn test_reply_text_no_choices() {
        let err = reply_text(r#"{"choices":[]}"#).unwrap_err();
        assert!(err.is_network());
        assert!(err.to_string().contains("no choices"));
    }

    #[test]
    fn test_reply_text_invalid_json() {
        assert!(reply_text("<html>bad gateway</html>").is_err());
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(api_error_message(body), "Incorrect API key provided");
        assert_eq!(api_error_message("  upstream down \n"), "upstream down");
    }

    #[test]
    fn test_request_serialization() {
        let request = CompletionRequest::new(
            "gpt-4o",
            Prompt {
                system: "sys".to_string(),
                user: "usr".to_string(),
            },
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "usr"}
                ]
            })
        );
        assert_eq!(request.message(Role::User), Some("usr"));
    }

    #[test]
    fn test_client_endpoint() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = Config::builder()
            .root_dir(temp.path())
            .api_key("sk-test")
            .base_url("http://localhost:9999/v1/")
            .build()
            .unwrap();

        let client = OpenAiClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9999/v1/chat/completions");
        assert!(!format!("{client:?}").contains("sk-test"));
    }

    /// Answers one HTTP request with a canned response.
    ///
    /// Returns the base URL to point the client at and a handle yielding the
    /// raw request that was received.
    fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut raw = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some((_, value)) = line
                    .split_once(':')
                    .filter(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                {
                    content_length = value.trim().parse().unwrap();
                }
                raw.push_str(&line);
                if line == "\r\n" {
                    break;
                }
            }

            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();
            raw.push_str(&String::from_utf8(request_body).unwrap());

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            reader.get_mut().write_all(response.as_bytes()).unwrap();
            raw
        });

        (base_url, handle)
    }

    fn local_client(temp: &assert_fs::TempDir, base_url: &str) -> OpenAiClient {
        let config = Config::builder()
            .root_dir(temp.path())
            .api_key("sk-test")
            .base_url(base_url)
            .build()
            .unwrap();
        let http = Client::builder().no_proxy().build().unwrap();
        OpenAiClient::with_http(http, &config)
    }

    fn sample_request() -> CompletionRequest {
        CompletionRequest::new(
            "gpt-4o",
            Prompt {
                system: "You write rules.".to_string(),
                user: "--- FILE: a.rs ---\nfn a() {}\n\n".to_string(),
            },
        )
    }

    #[test]
    fn test_client_posts_chat_completion() {
        let temp = assert_fs::TempDir::new().unwrap();
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"generated rules"}}]}"#,
        );
        let client = local_client(&temp, &base_url);
        let request = sample_request();

        let reply = client.complete(&request).unwrap();
        assert_eq!(reply, "generated rules");

        let raw = server.join().unwrap();
        assert!(raw.starts_with("POST /v1/chat/completions HTTP/1.1\r\n"));
        assert!(
            raw.to_ascii_lowercase()
                .contains("\r\nauthorization: bearer sk-test\r\n")
        );
        assert!(
            raw.to_ascii_lowercase()
                .contains("\r\ncontent-type: application/json\r\n")
        );

        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body, serde_json::to_value(&request).unwrap());
    }

    #[test]
    fn test_client_maps_error_status() {
        let temp = assert_fs::TempDir::new().unwrap();
        let (base_url, server) = serve_once(
            "401 Unauthorized",
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
        );
        let client = local_client(&temp, &base_url);

        let err = client.complete(&sample_request()).unwrap_err();
        assert!(matches!(
            err,
            Error::Api { status: 401, ref message } if message == "Incorrect API key provided"
        ));

        let raw = server.join().unwrap();
        assert!(raw.starts_with("POST /v1/chat/completions HTTP/1.1\r\n"));
    }
}
