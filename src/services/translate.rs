//! HTTP client for the translation service.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{DubError, Result};

use super::{poll_until, PollConfig, Translator};

pub struct HttpTranslator {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    backend: String,
    poll: PollConfig,
}

impl HttpTranslator {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            backend: "deepl".to_string(),
            poll: PollConfig::default(),
        }
    }

    /// Select the translation backend the service should use.
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    async fn submit(&self, text: &str, target_lang: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/translation/text", self.base_url))
            .query(&[
                ("text", text),
                ("target_language", target_lang),
                ("translator", self.backend.as_str()),
            ])
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DubError::Translation(format!(
                "Submit failed ({status}): {body}"
            )));
        }

        let parsed: SubmitResponse = serde_json::from_str(&body)?;
        Ok(parsed.task_id)
    }

    async fn check_status(&self, task_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .post(format!("{}/tasks/status", self.base_url))
            .query(&[("task_id", task_id)])
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DubError::Translation(format!(
                "Status check failed ({status}): {body}"
            )));
        }

        let parsed: TaskStatusResponse = serde_json::from_str(&body)?;
        match parsed.status.as_str() {
            "SUCCESS" => {
                let text = parsed
                    .result
                    .and_then(|r| r.result)
                    .ok_or_else(|| DubError::Translation("Result has no text".to_string()))?;
                Ok(Some(text))
            }
            "FAILURE" => Err(DubError::Translation(format!(
                "Remote task {task_id} failed"
            ))),
            other => {
                debug!("Translation task {task_id} status: {other}");
                Ok(None)
            }
        }
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Deserialize)]
struct TaskStatusResponse {
    status: String,
    result: Option<TranslationTaskResult>,
}

#[derive(Deserialize)]
struct TranslationTaskResult {
    result: Option<String>,
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        let task_id = self.submit(text, target_lang).await?;
        info!("Translation task {task_id} submitted ({} chars)", text.len());

        poll_until(&self.poll, || DubError::TranslationTimeout, || {
            self.check_status(&task_id)
        })
        .await
    }

    fn name(&self) -> &'static str {
        "http-translator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translator_defaults() {
        let client = HttpTranslator::new("http://trans.local/", "user", "pass");
        assert_eq!(client.base_url, "http://trans.local");
        assert_eq!(client.backend, "deepl");
    }

    #[test]
    fn test_with_backend() {
        let client = HttpTranslator::new("http://trans.local", "user", "pass").with_backend("google");
        assert_eq!(client.backend, "google");
    }

    #[test]
    fn test_status_response_parsing() {
        let body = r#"{"status": "SUCCESS", "result": {"result": "hola mundo"}}"#;
        let parsed: TaskStatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, "SUCCESS");
        assert_eq!(parsed.result.unwrap().result.unwrap(), "hola mundo");
    }
}
