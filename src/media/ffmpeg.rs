//! Shell-level media tooling on top of ffmpeg/ffprobe.
//!
//! Every operation checks both the exit status and, where a file is produced,
//! that the output actually exists; a missing output is fatal even when the
//! tool exited cleanly.

use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::error::{DubError, Result};

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    let output = Command::new("ffmpeg").arg("-version").output().map_err(|e| {
        DubError::MediaTool(format!(
            "FFmpeg not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
        ))
    })?;

    if !output.status.success() {
        return Err(DubError::MediaTool("FFmpeg check failed".to_string()));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe() -> Result<()> {
    let output = Command::new("ffprobe").arg("-version").output().map_err(|e| {
        DubError::MediaTool(format!(
            "FFprobe not found. Please install FFmpeg (includes FFprobe). Error: {e}"
        ))
    })?;

    if !output.status.success() {
        return Err(DubError::MediaTool("FFprobe check failed".to_string()));
    }

    debug!("FFprobe is available");
    Ok(())
}

/// Container duration in seconds, via ffprobe.
pub fn probe_duration(input: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .output()
        .map_err(|e| DubError::MediaTool(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DubError::MediaTool(format!("FFprobe failed: {stderr}")));
    }

    let duration_str = String::from_utf8_lossy(&output.stdout);
    duration_str.trim().parse().map_err(|e| {
        DubError::MediaTool(format!(
            "Failed to parse duration '{}': {e}",
            duration_str.trim()
        ))
    })
}

/// Extract the full-length audio track from a video file.
pub fn extract_audio(video: &Path, output: &Path) -> Result<()> {
    if !video.exists() {
        return Err(DubError::MediaTool(format!(
            "Input video not found: {}",
            video.display()
        )));
    }

    info!("Extracting audio from {}", video.display());

    let status = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(video)
        .arg(output)
        .status()
        .map_err(|e| DubError::MediaTool(format!("Failed to run FFmpeg: {e}")))?;

    if !status.success() || !output.exists() {
        return Err(DubError::MediaTool(format!(
            "Could not extract audio from video {}",
            video.display()
        )));
    }

    Ok(())
}

/// Grab a single preview frame one second into the video.
pub fn extract_preview(video: &Path, output: &Path) -> Result<()> {
    let status = Command::new("ffmpeg")
        .args(["-y", "-ss", "00:00:01.00", "-i"])
        .arg(video)
        .args(["-vframes", "1"])
        .arg(output)
        .status()
        .map_err(|e| DubError::MediaTool(format!("Failed to run FFmpeg: {e}")))?;

    if !status.success() || !output.exists() {
        return Err(DubError::MediaTool(format!(
            "Could not make preview from video {}",
            video.display()
        )));
    }

    Ok(())
}

/// Transcode any audio file to mono 16-bit PCM WAV at the given rate.
pub fn decode_to_wav(input: &Path, output: &Path, sample_rate: u32) -> Result<()> {
    if !input.exists() {
        return Err(DubError::MediaTool(format!(
            "Audio file not found: {}",
            input.display()
        )));
    }

    let status = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(input)
        .args(["-acodec", "pcm_s16le", "-ar"])
        .arg(sample_rate.to_string())
        .args(["-ac", "1"])
        .arg(output)
        .status()
        .map_err(|e| DubError::MediaTool(format!("Failed to run FFmpeg: {e}")))?;

    if !status.success() || !output.exists() {
        return Err(DubError::MediaTool(format!(
            "Could not decode {} to WAV",
            input.display()
        )));
    }

    Ok(())
}

/// Overlay a dubbed track onto the original video.
///
/// The dub is tempo-adjusted by `audio_duration / video_duration` so it spans
/// exactly the video length, boosted, and mixed over the original audio kept
/// as a quiet ambient bed. The video stream is copied untouched.
pub fn merge_audio_and_video(video: &Path, audio: &Path, output: &Path) -> Result<()> {
    let audio_ratio = probe_duration(audio)? / probe_duration(video)?;

    info!(
        "Merging {} onto {} (tempo ratio {:.4})",
        audio.display(),
        video.display(),
        audio_ratio
    );

    let filter = format!(
        "amovie={}:loop=0,asetpts=N/SR/TB,volume=5.0,atempo={audio_ratio}[dub];\
         [0:a]volume=0.05[bed];[bed][dub]amix[mix]",
        audio.display()
    );

    let status = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(video)
        .args(["-filter_complex", &filter])
        .args(["-map", "0:v", "-map", "[mix]", "-c:v", "copy", "-ac", "2", "-shortest"])
        .arg(output)
        .status()
        .map_err(|e| DubError::MediaTool(format!("Failed to run FFmpeg: {e}")))?;

    if !status.success() || !output.exists() {
        return Err(DubError::MediaTool(format!(
            "Could not replace audio in video {}",
            video.display()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ffmpeg_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_check_ffmpeg() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }
        assert!(check_ffmpeg().is_ok());
    }

    #[test]
    fn test_probe_duration_missing_file() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }
        assert!(probe_duration(Path::new("/nonexistent/video.mp4")).is_err());
    }

    #[test]
    fn test_extract_audio_missing_input() {
        let result = extract_audio(
            Path::new("/nonexistent/video.mp4"),
            Path::new("/tmp/out.wav"),
        );
        assert!(matches!(result, Err(DubError::MediaTool(_))));
    }

    #[test]
    fn test_decode_missing_input() {
        let result = decode_to_wav(
            Path::new("/nonexistent/clip.mp3"),
            Path::new("/tmp/out.wav"),
            48_000,
        );
        assert!(matches!(result, Err(DubError::MediaTool(_))));
    }
}
