//! Local Whisper transcription via whisper-rs (whisper.cpp bindings).
//!
//! Loads a GGML model once and reuses the context for every clip. Inference
//! is CPU-bound, so each call runs on the blocking thread pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use typewisp_audio::convert::resample_linear;
use typewisp_audio::RecordedAudio;
use typewisp_core::error::TranscriptionError;

use crate::{Segment, TranscriptionAdapter, TranscriptionResult};

const WHISPER_SAMPLE_RATE: u32 = 16000;

/// Whisper transcriber backed by a loaded whisper.cpp context.
pub struct WhisperTranscriber {
    ctx: Arc<WhisperContext>,
    model_path: String,
}

impl WhisperTranscriber {
    /// Load a GGML model file.
    ///
    /// # Errors
    /// `TranscriptionError::ModelUnavailable` if the file is missing or fails
    /// to load.
    pub fn load(model_path: &str) -> Result<Self, TranscriptionError> {
        if !Path::new(model_path).exists() {
            return Err(TranscriptionError::ModelUnavailable(format!(
                "Whisper model file not found: {model_path}"
            )));
        }

        tracing::info!(model = %model_path, "Loading Whisper model");
        let ctx = WhisperContext::new_with_params(model_path, WhisperContextParameters::default())
            .map_err(|e| {
                TranscriptionError::ModelUnavailable(format!("Failed to load Whisper model: {e}"))
            })?;
        tracing::info!("Whisper model loaded successfully");

        Ok(Self {
            ctx: Arc::new(ctx),
            model_path: model_path.to_string(),
        })
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }
}

fn run_inference(
    ctx: &WhisperContext,
    samples: &[f32],
    language: Option<&str>,
) -> Result<Vec<Segment>, TranscriptionError> {
    let other = |what: &str, e: whisper_rs::WhisperError| {
        TranscriptionError::Other(format!("{what}: {e}"))
    };

    let mut state = ctx
        .create_state()
        .map_err(|e| other("Failed to create Whisper state", e))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(language);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    state
        .full(params, samples)
        .map_err(|e| other("Whisper inference failed", e))?;

    let n_segments = state
        .full_n_segments()
        .map_err(|e| other("Failed to get segment count", e))?;

    let mut segments = Vec::with_capacity(n_segments.max(0) as usize);
    for i in 0..n_segments {
        let text = state
            .full_get_segment_text(i)
            .map_err(|e| TranscriptionError::Malformed(format!("segment {i} text: {e}")))?;
        // Timestamps are in centiseconds.
        let t0 = state.full_get_segment_t0(i).map_err(|e| other("segment t0", e))?;
        let t1 = state.full_get_segment_t1(i).map_err(|e| other("segment t1", e))?;
        segments.push(Segment {
            start: t0 as f32 / 100.0,
            end: t1 as f32 / 100.0,
            text: text.trim().to_string(),
        });
    }
    Ok(segments)
}

#[async_trait]
impl TranscriptionAdapter for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio: RecordedAudio,
        language: Option<String>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        if audio.sample_rate == 0 {
            return Err(TranscriptionError::Malformed(
                "sample rate must be greater than 0".into(),
            ));
        }

        let samples = resample_linear(&audio.samples, audio.sample_rate, WHISPER_SAMPLE_RATE);
        let duration_secs = samples.len() as f32 / WHISPER_SAMPLE_RATE as f32;
        tracing::debug!(samples = samples.len(), duration_secs, "Starting Whisper transcription");

        let ctx = Arc::clone(&self.ctx);
        let lang = language.clone();
        let segments = tokio::task::spawn_blocking(move || {
            run_inference(&ctx, &samples, lang.as_deref())
        })
        .await
        .map_err(|e| TranscriptionError::Other(format!("Whisper task failed: {e}")))??;

        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        tracing::info!(segments = segments.len(), text_len = text.len(), "Transcription complete");

        Ok(TranscriptionResult {
            text,
            segments,
            language,
            duration_secs,
        })
    }
}
