//! Leading/trailing silence removal for synthesized clips.
//!
//! Synthesis engines pad their output with dead air; before a clip is fitted
//! into its cue window that padding has to go, otherwise it eats into the
//! window and shifts every computed silence length.

use tracing::debug;

use crate::error::{DubError, Result};

use super::AudioBuffer;

/// Configuration for silence trimming.
#[derive(Debug, Clone)]
pub struct TrimConfig {
    /// Level below which a run of samples counts as silence, in dBFS.
    pub silence_threshold_db: f64,

    /// Minimum silence run length, in milliseconds. Doubles as the analysis
    /// window size, so trim boundaries land on window edges.
    pub min_silence_ms: u64,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            silence_threshold_db: -50.0,
            min_silence_ms: 10,
        }
    }
}

/// RMS level of a sample window in dBFS. An all-zero window is -inf.
fn rms_dbfs(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return f64::NEG_INFINITY;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = s as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let rms = (sum_squares / samples.len() as f64).sqrt();
    if rms == 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * rms.log10()
    }
}

/// Strip leading and trailing silence from a clip.
///
/// The buffer is scanned in consecutive `min_silence_ms` windows; the result
/// spans from the first window above the threshold through the last one,
/// inclusive. Re-trimming a trimmed buffer returns it unchanged.
///
/// An entirely silent (or empty) clip is an error: the caller must never end
/// up with a zero-length or untouched full-length clip in the track.
pub fn trim_silence(buffer: &AudioBuffer, config: &TrimConfig) -> Result<AudioBuffer> {
    let window = ((config.min_silence_ms as f64 / 1000.0) * buffer.sample_rate as f64) as usize;
    let window = window.max(1);

    let mut first_nonsilent: Option<usize> = None;
    let mut last_nonsilent_end = 0usize;

    let mut pos = 0;
    while pos < buffer.samples.len() {
        let end = (pos + window).min(buffer.samples.len());
        if rms_dbfs(&buffer.samples[pos..end]) >= config.silence_threshold_db {
            if first_nonsilent.is_none() {
                first_nonsilent = Some(pos);
            }
            last_nonsilent_end = end;
        }
        pos = end;
    }

    let Some(start) = first_nonsilent else {
        return Err(DubError::SynthesisEmptyAudio);
    };

    debug!(
        "Trimmed clip to samples {}..{} of {}",
        start,
        last_nonsilent_end,
        buffer.samples.len()
    );

    Ok(AudioBuffer::new(
        buffer.samples[start..last_nonsilent_end].to_vec(),
        buffer.sample_rate,
    ))
}
