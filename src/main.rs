use anyhow::{Context, Result};
use clap::Parser;
use redub::config::Config;
use redub::pipeline::{DubPipeline, JobStatus};
use redub::services::{ElevenLabsSynthesizer, HttpTranscriber, HttpTranslator};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "redub")]
#[command(version, about = "Dub a video into another language")]
#[command(
    long_about = "Transcribe a video's speech, translate it, synthesize target-language speech and remux a retimed dub track onto the original video."
)]
struct Cli {
    /// Input video file
    input: PathBuf,

    /// Target language code (e.g. es, ja)
    #[arg(short, long)]
    lang: String,

    /// Voice identifier for speech synthesis
    #[arg(long)]
    voice: String,

    /// Output video file (defaults to <input>.<lang>.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn derive_output_path(input: &PathBuf, lang: &str) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    let mut output = input.clone();
    output.set_file_name(format!("{}.{lang}.{ext}", stem.to_string_lossy()));
    output
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let output = cli
        .output
        .unwrap_or_else(|| derive_output_path(&cli.input, &cli.lang));

    info!("Input:    {}", cli.input.display());
    info!("Output:   {}", output.display());
    info!("Language: {}", cli.lang);
    info!("Voice:    {}", cli.voice);

    let poll = config.poll_config();
    let transcriber = HttpTranscriber::new(
        config.transcription_url.clone().unwrap_or_default(),
        config.service_username.clone().unwrap_or_default(),
        config.service_password.clone().unwrap_or_default(),
    )
    .with_poll_config(poll.clone());
    let translator = HttpTranslator::new(
        config.translation_url.clone().unwrap_or_default(),
        config.service_username.clone().unwrap_or_default(),
        config.service_password.clone().unwrap_or_default(),
    )
    .with_poll_config(poll);
    let synthesizer =
        ElevenLabsSynthesizer::new(config.synthesis_api_key.clone().unwrap_or_default());

    let pipeline = DubPipeline::new(
        Box::new(transcriber),
        Box::new(translator),
        Box::new(synthesizer),
        &config,
    );

    let project_id = Uuid::new_v4().to_string();
    let source = pipeline.run_source_job(&project_id, &cli.input).await;
    let source = match (source.status, source.output) {
        (JobStatus::Processed, Some(source)) => source,
        _ => anyhow::bail!("Source processing failed; see log for details"),
    };
    info!("Preview frame: {}", source.preview_path.display());

    let localization_id = Uuid::new_v4().to_string();
    let outcome = pipeline
        .run_localization_job(
            &localization_id,
            &source.fragments,
            &cli.lang,
            &cli.voice,
            &cli.input,
        )
        .await;
    let result = match (outcome.status, outcome.output) {
        (JobStatus::Processed, Some(result)) => result,
        _ => anyhow::bail!("Localization processing failed; see log for details"),
    };

    std::fs::copy(&result.result_path, &output).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            result.result_path.display(),
            output.display()
        )
    })?;

    println!();
    println!("Dub complete");
    println!("  Output:    {}", output.display());
    println!("  Fragments: {}", result.records.len());
    println!("  Language:  {}", cli.lang);

    Ok(())
}
