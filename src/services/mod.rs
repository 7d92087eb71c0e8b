//! External service collaborators.
//!
//! Clients are constructed explicitly and handed to the pipeline; nothing in
//! here is process-global. Transcription and translation follow a
//! submit-then-poll protocol, synthesis is a single round trip.

pub mod synthesize;
pub mod transcribe;
pub mod translate;

pub use synthesize::ElevenLabsSynthesizer;
pub use transcribe::HttpTranscriber;
pub use translate::HttpTranslator;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{DubError, Result};
use crate::fragment::RawFragment;

/// Speech-to-text collaborator. Returns ordered, non-overlapping cues.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<Vec<RawFragment>>;
    fn name(&self) -> &'static str;
}

/// Text translation collaborator. One call per fragment.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// Speech-synthesis collaborator. Synchronous request/response, raw bytes out.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>>;
    fn name(&self) -> &'static str;
}

/// Polling behavior for submit-then-poll services.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the first status check.
    pub initial_delay: Duration,
    /// Cap for the exponentially growing delay.
    pub max_delay: Duration,
    /// Overall deadline; a job still running past it is a timeout failure.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            timeout: Duration::from_secs(15 * 60),
        }
    }
}

/// Poll `check` until it yields a result, with bounded exponential backoff.
///
/// `check` returns `Ok(None)` while the remote job is still running. Hitting
/// the overall deadline yields `timeout_err()` instead of blocking forever.
pub(crate) async fn poll_until<T, F, Fut>(
    config: &PollConfig,
    timeout_err: fn() -> DubError,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + config.timeout;
    let mut delay = config.initial_delay;

    loop {
        if Instant::now() >= deadline {
            return Err(timeout_err());
        }
        tokio::time::sleep(delay.min(deadline - Instant::now())).await;

        if let Some(value) = check().await? {
            return Ok(value);
        }

        debug!("Remote job still running, next check in {:?}", delay);
        delay = (delay * 2).min(config.max_delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_poll(timeout_ms: u64) -> PollConfig {
        PollConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test]
    async fn test_poll_until_returns_first_success() {
        let calls = AtomicUsize::new(0);
        let result = poll_until(&fast_poll(1_000), || DubError::TranslationTimeout, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n >= 2 {
                    Ok(Some("done"))
                } else {
                    Ok(None)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_times_out() {
        let result: Result<()> = poll_until(&fast_poll(20), || DubError::TranscriptionTimeout, || async {
            Ok(None)
        })
        .await;

        assert!(matches!(result, Err(DubError::TranscriptionTimeout)));
    }

    #[tokio::test]
    async fn test_poll_until_propagates_check_errors() {
        let result: Result<()> = poll_until(&fast_poll(1_000), || DubError::TranslationTimeout, || async {
            Err(DubError::Translation("boom".to_string()))
        })
        .await;

        assert!(matches!(result, Err(DubError::Translation(_))));
    }
}
