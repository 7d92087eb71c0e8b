pub mod audio;
pub mod config;
pub mod error;
pub mod fragment;
pub mod media;
pub mod pipeline;
pub mod reassemble;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{DubError, Result};
pub use fragment::{RawFragment, SynthesizedFragment, TranslatedFragment};
pub use pipeline::{DubPipeline, JobOutcome, JobStatus, LocalizationOutput, SourceOutput};
pub use reassemble::{Reassembler, RESULT_NAME};
