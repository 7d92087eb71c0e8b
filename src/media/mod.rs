pub mod ffmpeg;

pub use ffmpeg::{
    check_ffmpeg, check_ffprobe, decode_to_wav, extract_audio, extract_preview,
    merge_audio_and_video, probe_duration,
};
