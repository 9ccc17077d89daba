//! AI session summarization
//!
//! Wraps the OpenAI chat-completions API for the summarize endpoint. One
//! outbound round trip per request; no retries and no caching.

use serde::Deserialize;
use serde_json::json;

use crate::config::Config;

/// Client for the summarization model
#[derive(Clone)]
pub struct SessionSummarizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl SessionSummarizer {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            base_url: config.openai_base_url.clone(),
        }
    }

    /// Check if summarization is configured
    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Summarize session notes or a chat log into Markdown
    pub async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        if !self.is_enabled() {
            return Err(SummarizeError::NotConfigured);
        }

        let prompt = build_prompt(text);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.5,
        });

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(SummarizeError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Summarization request rejected");
            return Err(SummarizeError::Upstream(status.as_u16()));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|_| SummarizeError::MalformedResponse)?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(SummarizeError::MalformedResponse)
    }
}

/// Role and output format for the model
fn build_prompt(text: &str) -> String {
    format!(
        "You are a helpful assistant for a mentorship platform called MentorHub.\n\
         Your task is to summarize the following session notes or chat log.\n\
         The summary should be concise (2-3 sentences).\n\
         After the summary, provide a clear, bulleted list of actionable \"Next Steps\" \
         for the mentee based on the text.\n\
         Format your entire response in Markdown.\n\n\
         Here is the text to summarize:\n\
         ---\n\
         {}\n\
         ---",
        text
    )
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    #[error("Summarization is not configured")]
    NotConfigured,
    #[error("Summarization request failed: {0}")]
    Request(reqwest::Error),
    #[error("Summarization service returned status {0}")]
    Upstream(u16),
    #[error("Malformed summarization response")]
    MalformedResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config(base_url: &str, api_key: &str) -> Config {
        Config {
            bind_address: "127.0.0.1:0".into(),
            client_origin: "http://localhost:3000".into(),
            database_url: "postgres://test".into(),
            database_max_connections: 1,
            jwt_secret: "test-jwt-secret-must-be-at-least-32-characters".into(),
            jwt_expiry_hours: 24,
            cloudinary_cloud_name: String::new(),
            cloudinary_api_key: String::new(),
            cloudinary_api_secret: String::new(),
            openai_api_key: api_key.into(),
            openai_model: "gpt-3.5-turbo".into(),
            openai_base_url: base_url.into(),
        }
    }

    #[test]
    fn test_prompt_includes_text() {
        let prompt = build_prompt("we discussed ownership and borrowing");
        assert!(prompt.contains("we discussed ownership and borrowing"));
        assert!(prompt.contains("Next Steps"));
    }

    #[tokio::test]
    async fn test_not_configured() {
        let summarizer = SessionSummarizer::new(&test_config("http://localhost", ""));
        let result = summarizer.summarize("text").await;
        assert!(matches!(result, Err(SummarizeError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_summarize_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r###"{"choices":[{"message":{"role":"assistant","content":"## Summary\nGreat session."}}]}"###,
            )
            .create_async()
            .await;

        let summarizer = SessionSummarizer::new(&test_config(&server.url(), "sk-test"));
        let summary = summarizer.summarize("session notes").await.unwrap();

        assert_eq!(summary, "## Summary\nGreat session.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("upstream broke")
            .create_async()
            .await;

        let summarizer = SessionSummarizer::new(&test_config(&server.url(), "sk-test"));
        let result = summarizer.summarize("session notes").await;

        assert!(matches!(result, Err(SummarizeError::Upstream(500))));
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let summarizer = SessionSummarizer::new(&test_config(&server.url(), "sk-test"));
        let result = summarizer.summarize("session notes").await;

        assert!(matches!(result, Err(SummarizeError::MalformedResponse)));
    }
}
