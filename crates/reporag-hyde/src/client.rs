//! OpenAI-compatible chat completions client (Groq by default).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use reporag_core::config::HydeSettings;
use reporag_core::error::{Error, Result};
use reporag_core::traits::AnswerGenerator;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionsClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            http,
            url: completions_url(base_url),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
        })
    }

    pub fn from_settings(settings: &HydeSettings) -> Result<Self> {
        let key = settings
            .api_key
            .as_deref()
            .ok_or_else(|| Error::InvalidConfig("hyde.api_key is not set".into()))?;
        Self::new(
            &settings.base_url,
            key,
            &settings.model,
            settings.temperature,
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
}

#[async_trait]
impl AnswerGenerator for ChatCompletionsClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let req = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            max_tokens,
            temperature: self.temperature,
        };
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(Error::generation)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Generation(format!("chat API returned {status}: {body}")));
        }

        let body: ChatResponse = resp.json().await.map_err(Error::generation)?;
        let answer = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if answer.is_empty() {
            return Err(Error::Generation("chat API returned no content".into()));
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        assert_eq!(
            completions_url("https://api.groq.com/openai/"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert_eq!(
            completions_url("http://localhost:8080"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn request_serializes_openai_shape() {
        let req = ChatRequest {
            model: "llama-3.3-70b-versatile",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            max_tokens: 150,
            temperature: 0.3,
        };
        let v = serde_json::to_value(&req).expect("json");
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["max_tokens"], 150);
    }

    #[test]
    fn response_tolerates_null_content() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let body: ChatResponse = serde_json::from_str(raw).expect("parse");
        assert!(body.choices[0].message.content.is_none());
    }
}
