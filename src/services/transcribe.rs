//! HTTP client for the transcription service.
//!
//! The service is whisperx-shaped: audio is submitted as a multipart upload
//! and a task id comes back per file; task status is polled until the
//! transcript is ready. With diarization off, all cues land in the service's
//! "unknown" speaker bucket.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{DubError, Result};
use crate::fragment::RawFragment;

use super::{poll_until, PollConfig, Transcriber};

pub struct HttpTranscriber {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    poll: PollConfig,
}

impl HttpTranscriber {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Upload the audio file; returns the remote task id.
    async fn submit(&self, audio: &Path) -> Result<String> {
        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let bytes = fs::read(audio).await?;
        let form = Form::new().part(
            "files",
            Part::bytes(bytes).file_name(file_name.clone()).mime_str("audio/wav")?,
        );

        let response = self
            .client
            .post(format!("{}/transcribe/files", self.base_url))
            .query(&[
                ("language", "unknown"),
                ("model_size", "medium"),
                ("diarize", "false"),
                ("device", "cuda"),
                ("batch_size", "4"),
                ("compute_type", "float32"),
                ("interpolate_method", "nearest"),
                ("min_speakers", "1"),
                ("max_speakers", "10"),
                ("return_type", "segments"),
            ])
            .basic_auth(&self.username, Some(&self.password))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DubError::Transcription(format!(
                "Submit failed ({status}): {body}"
            )));
        }

        // One task id per uploaded file, keyed by its name.
        let task_ids: HashMap<String, String> = serde_json::from_str(&body)?;
        task_ids.get(&file_name).cloned().ok_or_else(|| {
            DubError::Transcription(format!("No task id returned for {file_name}"))
        })
    }

    async fn check_status(&self, task_id: &str) -> Result<Option<Vec<RawFragment>>> {
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
            return Err(DubError::Transcription(format!(
                "Status check failed ({status}): {body}"
            )));
        }

        let parsed: TaskStatusResponse = serde_json::from_str(&body)?;
        match parsed.status.as_str() {
            "SUCCESS" => {
                let speakers = parsed
                    .result
                    .and_then(|r| r.speakers)
                    .ok_or_else(|| DubError::Transcription("Result has no speakers".to_string()))?;
                let segments = speakers.into_iter().flat_map(|(_, v)| v);

                let fragments = segments
                    .map(|s| RawFragment::new(s.start, s.end, s.text))
                    .collect();
                Ok(Some(fragments))
            }
            "FAILURE" => Err(DubError::Transcription(format!(
                "Remote task {task_id} failed"
            ))),
            other => {
                debug!("Transcription task {task_id} status: {other}");
                Ok(None)
            }
        }
    }
}

#[derive(Deserialize)]
struct TaskStatusResponse {
    status: String,
    result: Option<TranscriptionTaskResult>,
}

#[derive(Deserialize)]
struct TranscriptionTaskResult {
    speakers: Option<HashMap<String, Vec<SpeakerSegment>>>,
}

#[derive(Deserialize)]
struct SpeakerSegment {
    start: f64,
    end: f64,
    text: String,
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<Vec<RawFragment>> {
        let task_id = self.submit(audio).await?;
        info!("Transcription task {task_id} submitted");

        let mut fragments = poll_until(&self.poll, || DubError::TranscriptionTimeout, || {
            self.check_status(&task_id)
        })
        .await?;

        // Flattening the speaker buckets loses ordering between buckets;
        // restore chronological order by cue start.
        fragments.sort_by(|a, b| a.start.total_cmp(&b.start));

        info!("Transcription task {task_id} returned {} cues", fragments.len());
        Ok(fragments)
    }

    fn name(&self) -> &'static str {
        "http-transcriber"
    }
}
