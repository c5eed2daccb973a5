//! Gemini streaming chat for the back-office job assistant.
//!
//! The session keeps the conversation history and builds requests; the worker
//! owns the HTTP client and forwards streamed text chunks to the UI. With no
//! API key configured the assistant stays disabled.

use anyhow::{Result, anyhow};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::json;

/// System prompt establishing the GIS-manager analyst persona.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert AI assistant for a GIS Manager at a \
utility construction company. Your role is to analyze and answer questions about completed \
field jobs. You have been provided with the latest job data in JSON format. Be concise, \
accurate, and professional.";

/// Who said a line in the transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

/// One transcript entry shown in the chat panel.
#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Clone, Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Clone, Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

/// Conversation state for one assistant session.
pub struct AssistantSession {
    api_key: String,
    model: String,
    history: Vec<Content>,
}

impl AssistantSession {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            history: vec![],
        }
    }

    /// Chat is enabled only when a credential is configured.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Drop the conversation, e.g. when the job dataset changes.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Opening message that pushes the current job list as context.
    pub fn context_prompt(jobs_json: &str) -> String {
        format!(
            "Here is the current job data for your context: {jobs_json}. \
             Now, please greet the user and offer to help with analyzing this data."
        )
    }

    /// Record a user turn before sending it.
    pub fn push_user(&mut self, text: &str) {
        self.history.push(Content {
            role: "user",
            parts: vec![Part { text: text.into() }],
        });
    }

    /// Record the model's full reply once streaming finishes.
    pub fn push_model(&mut self, text: &str) {
        self.history.push(Content {
            role: "model",
            parts: vec![Part { text: text.into() }],
        });
    }

    /// Roll back the optimistic user turn after a failed request.
    pub fn rollback_last_user(&mut self) {
        if self.history.last().map(|c| c.role) == Some("user") {
            self.history.pop();
        }
    }

    fn url(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.model, self.api_key
        )
    }

    /// Start a streaming completion over the current history.
    pub async fn begin_stream(&self, http: &Client) -> Result<SseTextStream> {
        if !self.is_configured() {
            return Err(anyhow!("assistant API key is not configured"));
        }
        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": self.history,
        });
        let resp = http
            .post(self.url())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(SseTextStream::new(resp))
    }
}

/// Incremental reader over a Gemini SSE response body.
pub struct SseTextStream {
    resp: Response,
    buf: String,
}

impl SseTextStream {
    fn new(resp: Response) -> Self {
        Self {
            resp,
            buf: String::new(),
        }
    }

    /// Next text chunk, or None when the stream is exhausted.
    pub async fn next_text(&mut self) -> Result<Option<String>> {
        loop {
            while let Some(line) = take_line(&mut self.buf) {
                if let Some(text) = chunk_text(&line) {
                    return Ok(Some(text));
                }
            }
            match self.resp.chunk().await? {
                Some(bytes) => self.buf.push_str(&String::from_utf8_lossy(&bytes)),
                None => return Ok(None),
            }
        }
    }
}

/// Pop one complete line off the buffer, if any.
fn take_line(buf: &mut String) -> Option<String> {
    let pos = buf.find('\n')?;
    let line = buf[..pos].trim_end_matches('\r').to_string();
    buf.drain(..=pos);
    Some(line)
}

/// Extract the text payload from one SSE data line, ignoring everything else.
fn chunk_text(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
    let v: serde_json::Value = serde_json::from_str(payload.trim()).ok()?;
    let parts = v["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect();
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_line_only_returns_complete_lines() {
        let mut buf = String::from("data: one\ndata: tw");
        assert_eq!(take_line(&mut buf).as_deref(), Some("data: one"));
        assert_eq!(take_line(&mut buf), None);
        buf.push_str("o\r\n");
        assert_eq!(take_line(&mut buf).as_deref(), Some("data: two"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_chunk_text_extracts_candidate_parts() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"Hello, "},{"text":"manager."}]}}]}"#;
        assert_eq!(chunk_text(line).as_deref(), Some("Hello, manager."));
    }

    #[test]
    fn test_chunk_text_ignores_noise() {
        assert!(chunk_text("").is_none());
        assert!(chunk_text(": keep-alive").is_none());
        assert!(chunk_text("data: {}").is_none());
        assert!(chunk_text("data: not-json").is_none());
    }

    #[test]
    fn test_session_configuration_and_rollback() {
        let mut session = AssistantSession::new("".into(), "gemini-2.5-flash".into());
        assert!(!session.is_configured());

        let mut session = AssistantSession::new("key".into(), "gemini-2.5-flash".into());
        assert!(session.is_configured());
        session.push_user("How many jobs were approved?");
        assert_eq!(session.history.len(), 1);
        session.rollback_last_user();
        assert!(session.history.is_empty());
        // Rolling back with a model turn on top is a no-op.
        session.push_user("q");
        session.push_model("a");
        session.rollback_last_user();
        assert_eq!(session.history.len(), 2);
    }
}
