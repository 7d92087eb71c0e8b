//! Fragment reassembly: translate, synthesize, and recombine timed speech
//! fragments into one continuous track whose cues land on the original
//! subtitle times.
//!
//! Synthesized clips almost never match their cue window exactly. The combine
//! stage reconciles that: clips that finish early are padded with silence up
//! to their cue end, clips that overrun are kept at natural length (speech
//! intelligibility wins over strict timing), and each fragment is re-anchored
//! to its absolute cue start so an overrun never shifts the cues after it.

use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::audio::{load_clip, trim_silence, write_wav, AudioBuffer, TrimConfig, TRACK_SAMPLE_RATE};
use crate::error::{DubError, Result};
use crate::fragment::{RawFragment, SynthesizedFragment, TranslatedFragment};
use crate::services::{Synthesizer, Translator};
use crate::storage::JobStorage;

/// Name of the combined track blob within the job namespace.
pub const RESULT_NAME: &str = "result.wav";

pub struct Reassembler<'a> {
    storage: &'a JobStorage,
    trim: TrimConfig,
    concurrency: usize,
    clip_ext: String,
    show_progress: bool,
}

impl<'a> Reassembler<'a> {
    pub fn new(storage: &'a JobStorage) -> Self {
        Self {
            storage,
            trim: TrimConfig::default(),
            concurrency: 4,
            clip_ext: "mp3".to_string(),
            show_progress: true,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_trim_config(mut self, trim: TrimConfig) -> Self {
        self.trim = trim;
        self
    }

    /// Extension of the stored per-fragment clips (what the synthesis
    /// service actually emits).
    pub fn with_clip_format(mut self, ext: impl Into<String>) -> Self {
        self.clip_ext = ext.into();
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Blob name of the clip for one fragment index.
    pub fn clip_name(&self, index: usize) -> String {
        format!("frag_{index}.{}", self.clip_ext)
    }

    fn stage_progress(&self, len: usize, msg: &'static str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(msg);
        Some(pb)
    }

    /// Translate every fragment's text to the target language.
    ///
    /// Fragments are independent, so this fans out up to the configured
    /// concurrency; results are written back by fragment index, never by
    /// completion order. Any failed fragment fails the stage.
    pub async fn translate(
        &self,
        fragments: &[RawFragment],
        translator: &dyn Translator,
        target_lang: &str,
    ) -> Result<Vec<TranslatedFragment>> {
        info!(
            "Translating {} fragments to {target_lang} with {}",
            fragments.len(),
            translator.name()
        );

        let pb = self.stage_progress(fragments.len(), "Translating");
        let semaphore = Semaphore::new(self.concurrency);

        let mut futures = FuturesUnordered::new();
        for (index, fragment) in fragments.iter().enumerate() {
            let sem = &semaphore;
            let pb = pb.as_ref();
            futures.push(async move {
                let _permit = sem.acquire().await.map_err(|_| {
                    DubError::Translation("Translation pool closed".to_string())
                })?;
                debug!("Translating fragment {index}");
                let text = translator.translate(&fragment.text, target_lang).await?;
                if let Some(pb) = pb {
                    pb.inc(1);
                }
                Ok::<_, DubError>((index, text))
            });
        }

        let mut slots: Vec<Option<String>> = vec![None; fragments.len()];
        while let Some(result) = futures.next().await {
            let (index, text) = result?;
            slots[index] = Some(text);
        }
        drop(futures);

        if let Some(pb) = pb {
            pb.finish_with_message("Translation complete");
        }

        Ok(fragments
            .iter()
            .zip(slots)
            .map(|(fragment, text)| {
                // Every slot is filled once all futures resolved successfully.
                fragment.with_translation(text.unwrap_or_default())
            })
            .collect())
    }

    /// Synthesize speech for every fragment and store each clip under its
    /// per-index blob name. Any failed fragment fails the stage; there is no
    /// partial-track output.
    pub async fn synthesize(
        &self,
        fragments: &[TranslatedFragment],
        synthesizer: &dyn Synthesizer,
        voice_id: &str,
    ) -> Result<Vec<SynthesizedFragment>> {
        info!(
            "Synthesizing {} fragments with voice {voice_id} via {}",
            fragments.len(),
            synthesizer.name()
        );

        let pb = self.stage_progress(fragments.len(), "Synthesizing");
        let semaphore = Semaphore::new(self.concurrency);

        let mut futures = FuturesUnordered::new();
        for (index, fragment) in fragments.iter().enumerate() {
            let sem = &semaphore;
            let pb = pb.as_ref();
            futures.push(async move {
                let _permit = sem.acquire().await.map_err(|_| {
                    DubError::Synthesis("Synthesis pool closed".to_string())
                })?;
                debug!("Synthesizing fragment {index}");
                let bytes = synthesizer.synthesize(&fragment.text, voice_id).await?;
                if let Some(pb) = pb {
                    pb.inc(1);
                }
                Ok::<_, DubError>((index, bytes))
            });
        }

        let mut slots: Vec<Option<Vec<u8>>> = vec![None; fragments.len()];
        while let Some(result) = futures.next().await {
            let (index, bytes) = result?;
            slots[index] = Some(bytes);
        }
        drop(futures);

        if let Some(pb) = pb {
            pb.finish_with_message("Synthesis complete");
        }

        let mut synthesized = Vec::with_capacity(fragments.len());
        for (index, (fragment, bytes)) in fragments.iter().zip(slots).enumerate() {
            let name = self.clip_name(index);
            self.storage.put(&bytes.unwrap_or_default(), &name)?;
            synthesized.push(fragment.with_clip(name));
        }

        Ok(synthesized)
    }

    /// Combine all stored clips into the final track and export it as
    /// lossless WAV under [`RESULT_NAME`]. Returns the blob name.
    ///
    /// Per fragment, in order: load, trim silence, anchor to the absolute cue
    /// start (inserting silence if the track is short of it), append, then
    /// pad with silence up to the cue end if the clip finished early. A clip
    /// that overruns its window is never truncated; the next fragment simply
    /// starts as soon as it can.
    pub fn combine(&self, fragments: &[SynthesizedFragment]) -> Result<String> {
        if fragments.is_empty() {
            return Err(DubError::InputRejected(
                "No fragments to combine".to_string(),
            ));
        }

        info!("Combining {} fragments at {} Hz", fragments.len(), TRACK_SAMPLE_RATE);

        // Cue targets are fixed in the sample domain up front (truncated once
        // per absolute cue time), so fractional silence lengths can never
        // accumulate into sample drift across fragments.
        let mut track = AudioBuffer::new(Vec::new(), TRACK_SAMPLE_RATE);
        for (index, fragment) in fragments.iter().enumerate() {
            let path = self
                .storage
                .path(&fragment.clip_name)
                .map_err(|_| DubError::MissingFragmentAudio(index))?;

            let clip = load_clip(&path, TRACK_SAMPLE_RATE)?;
            let clip = trim_silence(&clip, &self.trim)?;

            let cue_start = AudioBuffer::sample_at(fragment.start, TRACK_SAMPLE_RATE);
            if track.len() > cue_start {
                debug!(
                    "Fragment {index} cue at {:.3}s starts late at {:.3}s",
                    fragment.start,
                    track.duration_secs()
                );
            }
            track.pad_to(cue_start);

            track.append(&clip);
            track.pad_to(AudioBuffer::sample_at(fragment.end, TRACK_SAMPLE_RATE));

            debug!(
                "Fragment {index}: window {:.3}s, clip {:.3}s",
                fragment.window(),
                clip.duration_secs()
            );
        }

        write_wav(&track, &self.storage.path_unchecked(RESULT_NAME))?;
        info!(
            "Combined track: {:.2}s written to {RESULT_NAME}",
            track.duration_secs()
        );
        Ok(RESULT_NAME.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::read_wav;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockTranslator {
        delay_by_index: bool,
        calls: AtomicUsize,
    }

    impl MockTranslator {
        /// Later fragments finish first, to exercise out-of-order completion.
        fn reversed() -> Self {
            Self {
                delay_by_index: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Translator for MockTranslator {
        async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_by_index {
                tokio::time::sleep(Duration::from_millis(40u64.saturating_sub(call as u64 * 10)))
                    .await;
            }
            Ok(format!("{target_lang}:{text}"))
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    struct FailingTranslator;

    #[async_trait]
    impl Translator for FailingTranslator {
        async fn translate(&self, _text: &str, _target_lang: &str) -> Result<String> {
            Err(DubError::Translation("mock failure".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing-mock"
        }
    }

    /// Emits WAV clips of a fixed length with silence padding on both ends.
    struct MockSynthesizer {
        tone_secs: f64,
    }

    #[async_trait]
    impl Synthesizer for MockSynthesizer {
        async fn synthesize(&self, _text: &str, _voice_id: &str) -> Result<Vec<u8>> {
            Ok(tone_clip_bytes(0.1, self.tone_secs, 0.1))
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    fn tone_samples(duration_secs: f64) -> Vec<i16> {
        let count = (duration_secs * TRACK_SAMPLE_RATE as f64) as usize;
        (0..count)
            .map(|i| if i % 2 == 0 { 8_000 } else { -8_000 })
            .collect()
    }

    fn tone_clip_bytes(lead: f64, tone: f64, tail: f64) -> Vec<u8> {
        let mut samples = vec![0i16; (lead * TRACK_SAMPLE_RATE as f64) as usize];
        samples.extend(tone_samples(tone));
        samples.extend(vec![0i16; (tail * TRACK_SAMPLE_RATE as f64) as usize]);
        let buffer = AudioBuffer::new(samples, TRACK_SAMPLE_RATE);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_wav(&buffer, &path).unwrap();
        std::fs::read(&path).unwrap()
    }

    fn store_tone_clip(storage: &JobStorage, name: &str, tone: f64) {
        storage.put(&tone_clip_bytes(0.0, tone, 0.0), name).unwrap();
    }

    fn secs(samples: usize) -> f64 {
        samples as f64 / TRACK_SAMPLE_RATE as f64
    }

    #[tokio::test]
    async fn test_translate_writes_back_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JobStorage::open(dir.path(), "job").unwrap();
        let reassembler = Reassembler::new(&storage).with_progress(false).with_concurrency(4);

        let fragments = vec![
            RawFragment::new(0.0, 1.0, "one"),
            RawFragment::new(1.0, 2.0, "two"),
            RawFragment::new(2.0, 3.0, "three"),
        ];

        let translator = MockTranslator::reversed();
        let translated = reassembler.translate(&fragments, &translator, "es").await.unwrap();

        assert_eq!(translated.len(), 3);
        assert_eq!(translated[0].text, "es:one");
        assert_eq!(translated[1].text, "es:two");
        assert_eq!(translated[2].text, "es:three");
        assert_eq!(translated[1].start, 1.0);
        assert_eq!(translated[1].end, 2.0);
    }

    #[tokio::test]
    async fn test_translate_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JobStorage::open(dir.path(), "job").unwrap();
        let reassembler = Reassembler::new(&storage).with_progress(false);

        let fragments = vec![RawFragment::new(0.0, 1.0, "one")];
        let result = reassembler.translate(&fragments, &FailingTranslator, "es").await;
        assert!(matches!(result, Err(DubError::Translation(_))));
    }

    #[tokio::test]
    async fn test_synthesize_stores_clip_per_index() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JobStorage::open(dir.path(), "job").unwrap();
        let reassembler = Reassembler::new(&storage).with_progress(false).with_clip_format("wav");

        let fragments = vec![
            RawFragment::new(0.0, 1.0, "one").with_translation("uno".to_string()),
            RawFragment::new(1.0, 2.0, "two").with_translation("dos".to_string()),
        ];

        let synthesizer = MockSynthesizer { tone_secs: 0.5 };
        let synthesized = reassembler.synthesize(&fragments, &synthesizer, "voice").await.unwrap();

        assert_eq!(synthesized.len(), 2);
        assert_eq!(synthesized[0].clip_name, "frag_0.wav");
        assert_eq!(synthesized[1].clip_name, "frag_1.wav");
        assert!(storage.contains("frag_0.wav"));
        assert!(storage.contains("frag_1.wav"));
    }

    #[test]
    fn test_combine_pads_early_clip_to_cue_window() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JobStorage::open(dir.path(), "job").unwrap();
        let reassembler = Reassembler::new(&storage).with_progress(false).with_clip_format("wav");

        // 1.2s clip in a 2.0s window: 0.8s of padding expected.
        store_tone_clip(&storage, "frag_0.wav", 1.2);
        let fragments = vec![SynthesizedFragment {
            start: 1.0,
            end: 3.0,
            clip_name: "frag_0.wav".to_string(),
        }];

        reassembler.combine(&fragments).unwrap();
        let track = read_wav(&storage.path(RESULT_NAME).unwrap()).unwrap();
        assert!((track.duration_secs() - 3.0).abs() < secs(2));
    }

    #[test]
    fn test_combine_never_truncates_overrun() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JobStorage::open(dir.path(), "job").unwrap();
        let reassembler = Reassembler::new(&storage).with_progress(false).with_clip_format("wav");

        // 2.5s clip in a 2.0s window: track runs to 1.0 + 2.5 = 3.5s.
        store_tone_clip(&storage, "frag_0.wav", 2.5);
        let fragments = vec![SynthesizedFragment {
            start: 1.0,
            end: 3.0,
            clip_name: "frag_0.wav".to_string(),
        }];

        reassembler.combine(&fragments).unwrap();
        let track = read_wav(&storage.path(RESULT_NAME).unwrap()).unwrap();
        assert!((track.duration_secs() - 3.5).abs() < secs(2));
    }

    #[test]
    fn test_combine_missing_clip_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JobStorage::open(dir.path(), "job").unwrap();
        let reassembler = Reassembler::new(&storage).with_progress(false).with_clip_format("wav");

        store_tone_clip(&storage, "frag_0.wav", 0.5);
        let fragments = vec![
            SynthesizedFragment {
                start: 0.0,
                end: 1.0,
                clip_name: "frag_0.wav".to_string(),
            },
            SynthesizedFragment {
                start: 1.0,
                end: 2.0,
                clip_name: "frag_1.wav".to_string(),
            },
        ];

        let result = reassembler.combine(&fragments);
        assert!(matches!(result, Err(DubError::MissingFragmentAudio(1))));
    }

    #[test]
    fn test_combine_all_silent_clip_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JobStorage::open(dir.path(), "job").unwrap();
        let reassembler = Reassembler::new(&storage).with_progress(false).with_clip_format("wav");

        let silent = AudioBuffer::silence(1.0, TRACK_SAMPLE_RATE);
        let path = dir.path().join("silent.wav");
        write_wav(&silent, &path).unwrap();
        storage.put(&std::fs::read(&path).unwrap(), "frag_0.wav").unwrap();

        let fragments = vec![SynthesizedFragment {
            start: 0.0,
            end: 1.0,
            clip_name: "frag_0.wav".to_string(),
        }];

        let result = reassembler.combine(&fragments);
        assert!(matches!(result, Err(DubError::SynthesisEmptyAudio)));
    }

    #[test]
    fn test_combine_empty_fragment_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JobStorage::open(dir.path(), "job").unwrap();
        let reassembler = Reassembler::new(&storage).with_progress(false);

        let result = reassembler.combine(&[]);
        assert!(matches!(result, Err(DubError::InputRejected(_))));
    }
}
