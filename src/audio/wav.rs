//! WAV I/O for decoded clips and the reassembled track.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::error::{DubError, Result};
use crate::media;

use super::AudioBuffer;

/// Read a WAV file into a mono buffer. Multi-channel input is downmixed by
/// averaging each frame.
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    let raw: Vec<i16> = match spec.sample_format {
        SampleFormat::Int => reader
            .into_samples::<i16>()
            .collect::<hound::Result<_>>()?,
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| (v * i16::MAX as f32) as i16))
            .collect::<hound::Result<_>>()?,
    };

    let samples = if spec.channels <= 1 {
        raw
    } else {
        raw.chunks(spec.channels as usize)
            .map(|frame| {
                let sum: i64 = frame.iter().map(|&s| s as i64).sum();
                (sum / frame.len() as i64) as i16
            })
            .collect()
    };

    debug!(
        "Read {} samples at {} Hz from {}",
        samples.len(),
        spec.sample_rate,
        path.display()
    );

    Ok(AudioBuffer::new(samples, spec.sample_rate))
}

/// Write a buffer as mono 16-bit PCM WAV.
pub fn write_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in &buffer.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    debug!(
        "Wrote {} samples ({:.2}s) to {}",
        buffer.len(),
        buffer.duration_secs(),
        path.display()
    );

    Ok(())
}

/// Load a synthesized clip at the given sample rate.
///
/// A WAV file already at the target rate is read directly; anything else
/// (mp3 clips from the synthesis service, off-rate WAVs) goes through an
/// ffmpeg transcode into a scratch file first.
pub fn load_clip(path: &Path, sample_rate: u32) -> Result<AudioBuffer> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));

    if is_wav {
        let buffer = read_wav(path)?;
        if buffer.sample_rate == sample_rate {
            return Ok(buffer);
        }
    }

    let scratch = tempfile::Builder::new()
        .suffix(".wav")
        .tempfile()
        .map_err(|e| DubError::Storage(format!("Failed to create scratch file: {e}")))?;
    media::decode_to_wav(path, scratch.path(), sample_rate)?;
    read_wav(scratch.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::TRACK_SAMPLE_RATE;

    #[test]
    fn test_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");

        let buffer = AudioBuffer::new(vec![0, 100, -100, 32_000], TRACK_SAMPLE_RATE);
        write_wav(&buffer, &path).unwrap();

        let read = read_wav(&path).unwrap();
        assert_eq!(read, buffer);
    }

    #[test]
    fn test_load_clip_reads_matching_wav_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");

        let buffer = AudioBuffer::new(vec![5; 960], TRACK_SAMPLE_RATE);
        write_wav(&buffer, &path).unwrap();

        let loaded = load_clip(&path, TRACK_SAMPLE_RATE).unwrap();
        assert_eq!(loaded, buffer);
    }

    #[test]
    fn test_read_truncated_wav_is_error_not_silence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");

        let buffer = AudioBuffer::new(vec![6_000; 4_800], TRACK_SAMPLE_RATE);
        write_wav(&buffer, &path).unwrap();

        // Cut the data chunk short; the header still promises 4800 samples.
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 1_000]).unwrap();

        assert!(read_wav(&path).is_err());
    }

    #[test]
    fn test_read_missing_wav_is_error() {
        let result = read_wav(Path::new("/nonexistent/clip.wav"));
        assert!(result.is_err());
    }
}
