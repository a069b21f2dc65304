//! Microphone capture plus speech-to-text over an OpenAI-compatible
//! `/audio/transcriptions` endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use jarvis_core::collaborators::{CaptureError, UtteranceSource};
use jarvis_native_utils::audio::{TRANSCRIPTION_SAMPLE_RATE, encode_wav, resample};
use jarvis_native_utils::recorder::{PhraseRecorder, RecordError, Recording};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Raises the flag when the capture future is dropped, so an abandoned
/// recording stops instead of holding the microphone.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct MicrophoneSource {
    recorder: Arc<PhraseRecorder>,
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl MicrophoneSource {
    pub fn new(recorder: PhraseRecorder, base_url: &str, api_key: SecretString, model: String) -> Self {
        Self {
            recorder: Arc::new(recorder),
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    async fn record(&self) -> Result<Option<Recording>, CaptureError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(cancel.clone());
        let recorder = self.recorder.clone();

        tokio::task::spawn_blocking(move || recorder.record_phrase(&cancel))
            .await
            .map_err(|e| CaptureError::DeviceLost(format!("recorder task failed: {e}")))?
            .map_err(capture_error)
    }

    async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        let file = Part::bytes(wav)
            .file_name("speech.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", file);

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?
            .error_for_status()
            .context("Transcription backend returned an error status")?
            .json::<TranscriptionResponse>()
            .await
            .context("Failed to decode transcription response")?;

        Ok(resp.text)
    }
}

#[async_trait]
impl UtteranceSource for MicrophoneSource {
    async fn capture(&self) -> Result<String, CaptureError> {
        let Some(recording) = self.record().await? else {
            return Err(CaptureError::NoSpeechDetected);
        };
        tracing::debug!(
            "Captured {:.1}s of audio",
            recording.samples.len() as f32 / recording.sample_rate as f32
        );

        let wav = prepare_upload(&recording)
            .map_err(|e| CaptureError::ServiceUnavailable(format!("could not encode audio: {e:#}")))?;
        let text = self
            .transcribe(wav)
            .await
            .map_err(|e| CaptureError::ServiceUnavailable(format!("{e:#}")))?;

        transcript_or_no_speech(&text)
    }
}

fn prepare_upload(recording: &Recording) -> Result<Vec<u8>> {
    let samples = resample(&recording.samples, recording.sample_rate, TRANSCRIPTION_SAMPLE_RATE)?;
    Ok(encode_wav(&samples, TRANSCRIPTION_SAMPLE_RATE)?)
}

// Any recorder failure means the microphone cannot be used until restart.
fn capture_error(err: RecordError) -> CaptureError {
    CaptureError::DeviceLost(err.to_string())
}

// Silence sometimes comes back as a lone "." or "...".
fn transcript_or_no_speech(text: &str) -> Result<String, CaptureError> {
    let text = text.trim();
    if !text.chars().any(char::is_alphanumeric) {
        Err(CaptureError::NoSpeechDetected)
    } else {
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_errors_end_capture() {
        assert_eq!(
            capture_error(RecordError::NoDevice("none".into())),
            CaptureError::DeviceLost("no input device available: none".into())
        );
        assert!(matches!(
            capture_error(RecordError::Stream("busy".into())),
            CaptureError::DeviceLost(_)
        ));
    }

    #[test]
    fn blank_transcript_is_no_speech() {
        assert_eq!(
            transcript_or_no_speech("  \n"),
            Err(CaptureError::NoSpeechDetected)
        );
        assert_eq!(
            transcript_or_no_speech(" ... "),
            Err(CaptureError::NoSpeechDetected)
        );
        assert_eq!(
            transcript_or_no_speech(" Open YouTube. "),
            Ok("Open YouTube.".to_string())
        );
    }

    #[test]
    fn upload_is_a_16khz_wav() -> Result<()> {
        let recording = Recording {
            samples: vec![0.1; 48_000],
            sample_rate: 48_000,
        };
        let wav = prepare_upload(&recording)?;
        let reader = hound::WavReader::new(std::io::Cursor::new(wav))?;
        assert_eq!(reader.spec().sample_rate, TRANSCRIPTION_SAMPLE_RATE);
        assert_eq!(reader.len(), 16_000);
        Ok(())
    }

    #[test]
    fn response_text_is_read() -> Result<()> {
        let resp: TranscriptionResponse = serde_json::from_str(r#"{"text": "play jazz"}"#)?;
        assert_eq!(resp.text, "play jazz");
        Ok(())
    }

    #[test]
    fn cancel_flag_is_raised_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        drop(CancelOnDrop(flag.clone()));
        assert!(flag.load(Ordering::SeqCst));
    }
}
