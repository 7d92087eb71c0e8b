//! Speech-synthesis client (ElevenLabs-style API).
//!
//! Unlike transcription and translation this is a single round trip: text in,
//! encoded audio bytes out.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{DubError, Result};

use super::Synthesizer;

const DEFAULT_API_URL: &str = "https://api.elevenlabs.io";

pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_API_URL.to_string(),
            api_key,
        }
    }

    /// Point the client at a different endpoint (e.g. a proxy).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Strip characters that trip up synthesis engines: backslashes, control
/// characters, and paragraph breaks (collapsed to a single space).
pub fn sanitize_text(text: &str) -> String {
    text.replace("\n\n", " ")
        .chars()
        .filter(|c| *c != '\\' && (!c.is_control() || *c == '\n'))
        .collect()
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        let text = sanitize_text(text);
        debug!("Synthesizing {} chars with voice {voice_id}", text.len());

        let response = self
            .client
            .post(format!("{}/v1/text-to-speech/{voice_id}", self.base_url))
            .header("xi-api-key", &self.api_key)
            .json(&SynthesisRequest { text: &text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DubError::Synthesis(format!(
                "Synthesis API error ({status}): {body}"
            )));
        }

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(DubError::SynthesisEmptyAudio);
        }

        info!("Synthesized {} bytes with voice {voice_id}", bytes.len());
        Ok(bytes)
    }

    fn name(&self) -> &'static str {
        "elevenlabs"
    }
}
