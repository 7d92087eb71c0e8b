//! Caption fragments as they move through the pipeline.
//!
//! Each stage produces a new value instead of mutating the previous one:
//! transcription yields [`RawFragment`], translation turns it into a
//! [`TranslatedFragment`], and synthesis attaches the stored clip name as a
//! [`SynthesizedFragment`]. Timing fields always carry the original cue times
//! from the source transcription.

use serde::{Deserialize, Serialize};

/// One timed unit of source-language speech, as parsed from transcription.
///
/// Invariants inherited from the transcription service: `start < end`, the
/// sequence is ordered by `start`, and cues do not overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFragment {
    /// Cue start, seconds from the beginning of the video.
    pub start: f64,
    /// Cue end, seconds from the beginning of the video.
    pub end: f64,
    pub text: String,
}

/// A fragment whose text has been translated to the target language.
///
/// This is also the record shape the caller persists per localization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedFragment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A translated fragment whose speech has been synthesized and stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedFragment {
    pub start: f64,
    pub end: f64,
    /// Name of the clip blob in the job's storage namespace.
    pub clip_name: String,
}

impl RawFragment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// The cue window in seconds.
    pub fn window(&self) -> f64 {
        self.end - self.start
    }

    pub fn with_translation(&self, text: String) -> TranslatedFragment {
        TranslatedFragment {
            start: self.start,
            end: self.end,
            text,
        }
    }
}

impl TranslatedFragment {
    pub fn window(&self) -> f64 {
        self.end - self.start
    }

    pub fn with_clip(&self, clip_name: String) -> SynthesizedFragment {
        SynthesizedFragment {
            start: self.start,
            end: self.end,
            clip_name,
        }
    }
}

impl SynthesizedFragment {
    pub fn window(&self) -> f64 {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window() {
        let frag = RawFragment::new(1.5, 4.0, "hello");
        assert!((frag.window() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stage_transitions_keep_timing() {
        let raw = RawFragment::new(0.5, 2.0, "hello");
        let translated = raw.with_translation("hola".to_string());
        assert_eq!(translated.start, raw.start);
        assert_eq!(translated.end, raw.end);
        assert_eq!(translated.text, "hola");

        let synthesized = translated.with_clip("frag_0.mp3".to_string());
        assert_eq!(synthesized.start, raw.start);
        assert_eq!(synthesized.end, raw.end);
        assert_eq!(synthesized.clip_name, "frag_0.mp3");
    }

    #[test]
    fn test_translated_fragment_serializes_as_record() {
        let frag = TranslatedFragment {
            start: 1.0,
            end: 3.0,
            text: "hola".to_string(),
        };
        let json = serde_json::to_value(&frag).unwrap();
        assert_eq!(json["text"], "hola");
        assert_eq!(json["start"], 1.0);
        assert_eq!(json["end"], 3.0);
    }
}
