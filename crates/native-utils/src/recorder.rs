//! Captures one spoken phrase from the microphone.
//!
//! The recorder calibrates against ambient noise, waits for the level to rise
//! above the calibrated threshold, and stops after a pause or when the phrase
//! limit is reached. While nobody speaks it keeps waiting, recalibrating now and
//! then. Everything here blocks the calling thread.

use crate::audio::{rms, shared_buffer, to_mono};
use crate::device::get_or_default_input;
use cpal::traits::{DeviceTrait, StreamTrait};
use ringbuf::traits::{Consumer, Producer, Split};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const AMBIENT_CALIBRATION: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(20);
const BUFFER_SECONDS: usize = 2;
/// Threshold floor, so a dead-silent room does not turn every click into speech.
const MIN_ENERGY: f32 = 0.01;
const ENERGY_RATIO: f32 = 1.5;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("no input device available: {0}")]
    NoDevice(String),
    #[error("input device disconnected: {0}")]
    DeviceLost(String),
    #[error("input stream failed: {0}")]
    Stream(String),
}

/// A captured phrase, mono, at the device's sample rate.
#[derive(Debug, Clone)]
pub struct Recording {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Splits a stream of samples into one phrase, using an energy threshold.
#[derive(Debug)]
pub struct PhraseDetector {
    threshold: f32,
    frame_len: usize,
    pause_len: usize,
    limit_len: usize,
    started: bool,
    silent_run: usize,
    phrase: Vec<f32>,
}

impl PhraseDetector {
    pub fn new(threshold: f32, sample_rate: u32, pause: Duration, limit: Duration) -> Self {
        let per_second = sample_rate as f32;
        Self {
            threshold,
            // 10ms frames
            frame_len: (sample_rate as usize / 100).max(1),
            pause_len: (pause.as_secs_f32() * per_second) as usize,
            limit_len: (limit.as_secs_f32() * per_second) as usize,
            started: false,
            silent_run: 0,
            phrase: Vec::new(),
        }
    }

    pub fn started(&self) -> bool {
        self.started
    }

    /// Feeds more samples. Returns `true` once the phrase is complete.
    pub fn feed(&mut self, samples: &[f32]) -> bool {
        for frame in samples.chunks(self.frame_len) {
            let loud = rms(frame) >= self.threshold;
            if !self.started {
                if !loud {
                    continue;
                }
                self.started = true;
            }

            self.phrase.extend_from_slice(frame);
            if loud {
                self.silent_run = 0;
            } else {
                self.silent_run += frame.len();
            }

            if self.silent_run >= self.pause_len || self.phrase.len() >= self.limit_len {
                self.phrase.truncate(self.limit_len);
                return true;
            }
        }
        false
    }

    /// The phrase heard so far, or `None` if speech never started.
    pub fn finish(self) -> Option<Vec<f32>> {
        self.started.then_some(self.phrase)
    }
}

/// Records phrases from a named (or the default) input device.
#[derive(Debug, Clone)]
pub struct PhraseRecorder {
    device_name: Option<String>,
    /// Quiet time after which the ambient threshold is measured again.
    pub recalibrate_after: Duration,
    /// Silence that ends a phrase.
    pub pause: Duration,
    pub phrase_limit: Duration,
}

impl PhraseRecorder {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            recalibrate_after: Duration::from_secs(10),
            pause: Duration::from_millis(800),
            phrase_limit: Duration::from_secs(5),
        }
    }

    /// Blocks until a phrase has been captured. `Ok(None)` means `cancel` was
    /// raised first.
    pub fn record_phrase(&self, cancel: &AtomicBool) -> Result<Option<Recording>, RecordError> {
        let device = get_or_default_input(self.device_name.as_deref())
            .map_err(|e| RecordError::NoDevice(format!("{e:#}")))?;
        let supported = device
            .default_input_config()
            .map_err(|e| RecordError::NoDevice(e.to_string()))?;
        let config = supported.config();
        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0;
        tracing::debug!("Recording with {:?}", config);

        let (mut producer, mut consumer) =
            shared_buffer(sample_rate as usize * BUFFER_SECONDS).split();
        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = lost.clone();

        let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let mono = to_mono(data, channels);
            let pushed = producer.push_slice(&mono);
            if pushed < mono.len() {
                tracing::trace!("Dropped {} samples, buffer full", mono.len() - pushed);
            }
        };
        let error_fn = move |err: cpal::StreamError| {
            tracing::error!("An error occurred on input stream: {}", err);
            if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                lost_flag.store(true, Ordering::SeqCst);
            }
        };

        let stream = device
            .build_input_stream(&config, input_data_fn, error_fn, None)
            .map_err(|e| match e {
                cpal::BuildStreamError::DeviceNotAvailable => {
                    RecordError::DeviceLost(e.to_string())
                }
                other => RecordError::Stream(other.to_string()),
            })?;
        stream.play().map_err(|e| match e {
            cpal::PlayStreamError::DeviceNotAvailable => RecordError::DeviceLost(e.to_string()),
            other => RecordError::Stream(other.to_string()),
        })?;

        let mut scratch = vec![0.0f32; sample_rate as usize / 10];
        let poll = |block: &mut Vec<f32>| {
            if cancel.load(Ordering::SeqCst) {
                tracing::debug!("Recording cancelled");
                return Ok(false);
            }
            std::thread::sleep(POLL_INTERVAL);
            if lost.load(Ordering::SeqCst) {
                return Err(RecordError::DeviceLost(
                    "input device is no longer available".into(),
                ));
            }
            loop {
                let n = consumer.pop_slice(&mut scratch);
                if n == 0 {
                    break;
                }
                block.extend_from_slice(&scratch[..n]);
            }
            Ok(true)
        };

        let phrase = self.listen(sample_rate, poll)?;
        drop(stream);

        Ok(phrase.map(|samples| Recording {
            samples,
            sample_rate,
        }))
    }

    /// Calibrates, then waits for one phrase. `poll` appends the next block of
    /// samples and returns `false` to cancel.
    fn listen<F>(&self, sample_rate: u32, mut poll: F) -> Result<Option<Vec<f32>>, RecordError>
    where
        F: FnMut(&mut Vec<f32>) -> Result<bool, RecordError>,
    {
        let calibration_len = samples_in(AMBIENT_CALIBRATION, sample_rate);
        let quiet_len = samples_in(self.recalibrate_after, sample_rate).max(1);

        let mut ambient = Vec::new();
        while ambient.len() < calibration_len {
            if !poll(&mut ambient)? {
                return Ok(None);
            }
        }
        let new_detector = |ambient: &[f32]| {
            let threshold = (rms(ambient) * ENERGY_RATIO).max(MIN_ENERGY);
            tracing::debug!("Energy threshold {:.4}", threshold);
            PhraseDetector::new(threshold, sample_rate, self.pause, self.phrase_limit)
        };

        let mut detector = new_detector(&ambient);
        ambient.clear();
        let mut block = Vec::new();
        loop {
            block.clear();
            if !poll(&mut block)? {
                return Ok(None);
            }
            if detector.feed(&block) {
                return Ok(detector.finish());
            }
            if !detector.started() {
                ambient.extend_from_slice(&block);
                if ambient.len() >= quiet_len {
                    detector = new_detector(&ambient);
                    ambient.clear();
                }
            }
        }
    }
}

fn samples_in(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f32() * sample_rate as f32) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1_000;

    fn detector() -> PhraseDetector {
        PhraseDetector::new(0.1, RATE, Duration::from_millis(100), Duration::from_millis(500))
    }

    #[test]
    fn silence_never_starts_a_phrase() {
        let mut detector = detector();
        assert!(!detector.feed(&[0.01; 2_000]));
        assert!(detector.finish().is_none());
    }

    #[test]
    fn pause_after_speech_completes_the_phrase() {
        let mut detector = detector();
        assert!(!detector.feed(&[0.0; 50]));
        assert!(!detector.feed(&[0.5; 200]));
        assert!(detector.started());
        assert!(detector.feed(&[0.0; 100]));

        let phrase = detector.finish().expect("phrase");
        // Leading silence is not part of the phrase.
        assert_eq!(phrase.len(), 300);
        assert_eq!(phrase[0], 0.5);
    }

    #[test]
    fn phrase_is_cut_at_the_limit() {
        let mut detector = detector();
        assert!(detector.feed(&[0.5; 2_000]));
        assert_eq!(detector.finish().map(|p| p.len()), Some(500));
    }

    /// Hands out fixed blocks, then cancels.
    fn scripted(blocks: Vec<Vec<f32>>) -> impl FnMut(&mut Vec<f32>) -> Result<bool, RecordError> {
        let mut blocks = blocks.into_iter();
        move |into: &mut Vec<f32>| match blocks.next() {
            Some(block) => {
                into.extend_from_slice(&block);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn recorder() -> PhraseRecorder {
        PhraseRecorder {
            recalibrate_after: Duration::from_secs(2),
            ..PhraseRecorder::new(None)
        }
    }

    #[test]
    fn long_silence_keeps_listening_until_someone_speaks() {
        // One second of calibration, then twenty quiet seconds before speech.
        let mut blocks = vec![vec![0.001; 1_000]];
        blocks.extend(std::iter::repeat_n(vec![0.001; 1_000], 20));
        blocks.push(vec![0.5; 300]);
        blocks.push(vec![0.0; 1_000]);

        let phrase = recorder()
            .listen(RATE, scripted(blocks))
            .expect("listen")
            .expect("phrase");
        assert_eq!(phrase[0], 0.5);
        assert_eq!(phrase.len(), 300 + 800);
    }

    #[test]
    fn cancel_while_waiting_returns_nothing() {
        let blocks = std::iter::repeat_n(vec![0.001; 1_000], 5).collect();
        assert!(recorder().listen(RATE, scripted(blocks)).expect("listen").is_none());
    }

    #[test]
    fn recalibration_follows_a_louder_room() {
        // A steady hum that would count as speech against the first threshold
        // becomes the new ambient level once the quiet window has passed.
        let mut blocks = vec![vec![0.02; 1_000]];
        blocks.extend(std::iter::repeat_n(vec![0.025; 1_000], 2));
        blocks.extend(std::iter::repeat_n(vec![0.035; 1_000], 2));
        assert!(recorder().listen(RATE, scripted(blocks)).expect("listen").is_none());
    }

    #[test]
    fn lost_device_ends_listening() {
        let mut polls = 0;
        let poll = |into: &mut Vec<f32>| {
            polls += 1;
            if polls > 3 {
                return Err(RecordError::DeviceLost("unplugged".into()));
            }
            into.extend_from_slice(&[0.0; 500]);
            Ok(true)
        };
        assert!(matches!(
            recorder().listen(RATE, poll),
            Err(RecordError::DeviceLost(_))
        ));
    }

    #[test]
    fn short_dips_do_not_end_the_phrase() {
        let mut detector = detector();
        assert!(!detector.feed(&[0.5; 100]));
        assert!(!detector.feed(&[0.0; 50]));
        assert!(!detector.feed(&[0.5; 100]));
        assert!(detector.started());
    }
}
