pub mod trim;
pub mod wav;

pub use trim::{trim_silence, TrimConfig};
pub use wav::{load_clip, read_wav, write_wav};

/// Sample rate of the reassembled output track.
pub const TRACK_SAMPLE_RATE: u32 = 48_000;

/// A decoded mono audio buffer of signed 16-bit PCM samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A buffer of pure silence.
    ///
    /// The sample count is truncated, not rounded; silence lengths derived
    /// from fractional cue times err on the short side.
    pub fn silence(duration_secs: f64, sample_rate: u32) -> Self {
        let count = (duration_secs.max(0.0) * sample_rate as f64) as usize;
        Self {
            samples: vec![0; count],
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Append another buffer's samples. Both buffers must share a sample rate.
    pub fn append(&mut self, other: &AudioBuffer) {
        debug_assert_eq!(self.sample_rate, other.sample_rate);
        self.samples.extend_from_slice(&other.samples);
    }

    /// Extend with silence up to an absolute sample position. A buffer
    /// already at or past the target is left untouched.
    pub fn pad_to(&mut self, target_len: usize) {
        if self.samples.len() < target_len {
            self.samples.resize(target_len, 0);
        }
    }

    /// The sample index of an absolute time offset, truncated.
    pub fn sample_at(seconds: f64, sample_rate: u32) -> usize {
        (seconds.max(0.0) * sample_rate as f64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_duration() {
        let buf = AudioBuffer::silence(0.5, 48_000);
        assert_eq!(buf.len(), 24_000);
        assert!((buf.duration_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_silence_truncates_fractional_samples() {
        // 1.0000104s at 48kHz is 48000.5 samples; truncation keeps 48000.
        let buf = AudioBuffer::silence(48_000.5 / 48_000.0, 48_000);
        assert_eq!(buf.len(), 48_000);
    }

    #[test]
    fn test_negative_silence_is_empty() {
        let buf = AudioBuffer::silence(-1.0, 48_000);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_append() {
        let mut a = AudioBuffer::new(vec![1, 2, 3], 48_000);
        let b = AudioBuffer::new(vec![4, 5], 48_000);
        a.append(&b);
        assert_eq!(a.samples, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_pad_to() {
        let mut a = AudioBuffer::new(vec![7; 10], 1_000);
        a.pad_to(15);
        assert_eq!(a.len(), 15);
        assert_eq!(&a.samples[10..], &[0; 5]);

        // past the target: untouched
        a.pad_to(5);
        assert_eq!(a.len(), 15);
    }

    #[test]
    fn test_sample_at_truncates() {
        assert_eq!(AudioBuffer::sample_at(0.5, 48_000), 24_000);
        assert_eq!(AudioBuffer::sample_at(48_000.5 / 48_000.0, 48_000), 48_000);
    }
}
