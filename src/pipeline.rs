//! The two pipeline job types.
//!
//! An external orchestrator schedules these as detached background jobs:
//! source processing (extract audio, transcribe into fragments) runs once per
//! project, localization processing (translate, synthesize, combine, remux)
//! runs once per target language. Errors never escape a job boundary; they
//! are logged with job context and folded into a terminal [`JobStatus`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{DubError, Result};
use crate::fragment::{RawFragment, TranslatedFragment};
use crate::media::{
    check_ffmpeg, check_ffprobe, extract_audio, extract_preview, merge_audio_and_video,
    probe_duration,
};
use crate::reassemble::{Reassembler, RESULT_NAME};
use crate::services::{Synthesizer, Transcriber, Translator};
use crate::storage::{CleanupGuard, JobStorage};

/// Terminal and transitional states a job reports back through the
/// persistence collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Processing,
    Processed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Created => write!(f, "created"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Processed => write!(f, "processed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What a finished source job hands back to the caller for persistence.
#[derive(Debug)]
pub struct SourceOutput {
    /// Transcribed cue fragments, ordered by start time.
    pub fragments: Vec<RawFragment>,
    /// Blob name of the preview frame in the project namespace.
    pub preview_name: String,
    /// Full path of the preview frame.
    pub preview_path: PathBuf,
}

/// What a finished localization job hands back to the caller for persistence.
#[derive(Debug)]
pub struct LocalizationOutput {
    /// Translated cue records, in original fragment order.
    pub records: Vec<TranslatedFragment>,
    /// Blob name of the dubbed video in the job namespace.
    pub result_name: String,
    /// Full path of the dubbed video.
    pub result_path: PathBuf,
}

/// Outcome of a job run at the orchestrator boundary.
#[derive(Debug)]
pub struct JobOutcome<T> {
    pub status: JobStatus,
    pub output: Option<T>,
}

/// Callback invoked with (job id, status) on every job state transition, so
/// the persistence collaborator can record `processing` when a job starts and
/// the terminal status when it ends.
pub type StatusHook = Box<dyn Fn(&str, JobStatus) + Send + Sync>;

pub struct DubPipeline {
    transcriber: Box<dyn Transcriber>,
    translator: Box<dyn Translator>,
    synthesizer: Box<dyn Synthesizer>,
    storage_root: PathBuf,
    max_video_duration_secs: f64,
    concurrency: usize,
    show_progress: bool,
    status_hook: Option<StatusHook>,
}

impl DubPipeline {
    pub fn new(
        transcriber: Box<dyn Transcriber>,
        translator: Box<dyn Translator>,
        synthesizer: Box<dyn Synthesizer>,
        config: &Config,
    ) -> Self {
        Self {
            transcriber,
            translator,
            synthesizer,
            storage_root: config.storage_root.clone(),
            max_video_duration_secs: config.max_video_duration_secs,
            concurrency: config.concurrency,
            show_progress: true,
            status_hook: None,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_status_hook(mut self, hook: StatusHook) -> Self {
        self.status_hook = Some(hook);
        self
    }

    fn report(&self, job_id: &str, status: JobStatus) {
        if let Some(hook) = &self.status_hook {
            hook(job_id, status);
        }
    }

    /// Source processing: gate the video, grab a preview frame, pull the
    /// audio, transcribe it into ordered caption fragments. The interim WAV
    /// is deleted either way; the preview frame outlives the job.
    pub async fn process_source(&self, project_id: &str, video: &Path) -> Result<SourceOutput> {
        check_ffmpeg()?;
        check_ffprobe()?;

        if !video.exists() {
            return Err(DubError::InputRejected(format!(
                "Video not found: {}",
                video.display()
            )));
        }

        let duration = probe_duration(video)?;
        if duration > self.max_video_duration_secs {
            return Err(DubError::InputRejected(format!(
                "Video is {duration:.0}s long, maximum is {:.0}s",
                self.max_video_duration_secs
            )));
        }

        let storage = JobStorage::open(&self.storage_root, project_id)?;

        let preview_name = "preview.png".to_string();
        let preview_path = storage.path_unchecked(&preview_name);
        extract_preview(video, &preview_path)?;

        let wav_name = format!("{}.wav", Uuid::new_v4());
        let mut guard = CleanupGuard::new(&storage);
        guard.register(wav_name.clone());

        extract_audio(video, &storage.path_unchecked(&wav_name))?;

        let fragments = self
            .transcriber
            .transcribe(&storage.path(&wav_name)?)
            .await?;

        info!(
            "Project {project_id}: transcribed {duration:.1}s of audio into {} fragments",
            fragments.len()
        );
        Ok(SourceOutput {
            fragments,
            preview_name,
            preview_path,
        })
    }

    /// Localization processing: translate, synthesize, combine, and remux the
    /// dubbed track onto the original video. Per-fragment clips and the
    /// combined track are released whether or not the job succeeds; only the
    /// dubbed video outlives the job.
    pub async fn process_localization(
        &self,
        localization_id: &str,
        fragments: &[RawFragment],
        target_lang: &str,
        voice_id: &str,
        video: &Path,
    ) -> Result<LocalizationOutput> {
        let storage = JobStorage::open(&self.storage_root, localization_id)?;
        let reassembler = Reassembler::new(&storage)
            .with_concurrency(self.concurrency)
            .with_progress(self.show_progress);

        let mut guard = CleanupGuard::new(&storage);
        for index in 0..fragments.len() {
            guard.register(reassembler.clip_name(index));
        }
        guard.register(RESULT_NAME);

        let records = reassembler
            .translate(fragments, self.translator.as_ref(), target_lang)
            .await?;
        let synthesized = reassembler
            .synthesize(&records, self.synthesizer.as_ref(), voice_id)
            .await?;
        let audio_name = reassembler.combine(&synthesized)?;

        let ext = video
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let result_name = format!("{}.{ext}", Uuid::new_v4());
        let result_path = storage.path_unchecked(&result_name);
        merge_audio_and_video(video, &storage.path(&audio_name)?, &result_path)?;

        Ok(LocalizationOutput {
            records,
            result_name,
            result_path,
        })
    }

    /// Job boundary for localization processing: errors become a terminal
    /// `failed` status instead of propagating to the detached caller.
    pub async fn run_localization_job(
        &self,
        localization_id: &str,
        fragments: &[RawFragment],
        target_lang: &str,
        voice_id: &str,
        video: &Path,
    ) -> JobOutcome<LocalizationOutput> {
        info!("Start processing localization {localization_id}");
        self.report(localization_id, JobStatus::Processing);

        let outcome = match self
            .process_localization(localization_id, fragments, target_lang, voice_id, video)
            .await
        {
            Ok(output) => {
                info!("Localization {localization_id} successfully processed");
                JobOutcome {
                    status: JobStatus::Processed,
                    output: Some(output),
                }
            }
            Err(e) => {
                error!("Error while processing localization {localization_id}: {e}");
                JobOutcome {
                    status: JobStatus::Failed,
                    output: None,
                }
            }
        };

        self.report(localization_id, outcome.status);
        outcome
    }

    /// Job boundary for source processing.
    pub async fn run_source_job(&self, project_id: &str, video: &Path) -> JobOutcome<SourceOutput> {
        info!("Start processing project {project_id}");
        self.report(project_id, JobStatus::Processing);

        let outcome = match self.process_source(project_id, video).await {
            Ok(output) => {
                info!("Project {project_id} source successfully processed");
                JobOutcome {
                    status: JobStatus::Processed,
                    output: Some(output),
                }
            }
            Err(e) => {
                error!("Error while processing project {project_id}: {e}");
                JobOutcome {
                    status: JobStatus::Failed,
                    output: None,
                }
            }
        };

        self.report(project_id, outcome.status);
        outcome
    }
}
