//! Contracts for the external systems the core calls but does not implement.
//!
//! The runtime crate provides the real implementations (browser, process
//! launcher, speech engine, transcription service). Tests substitute mocks
//! generated by `mockall`, so the core never touches the desktop or the
//! network while under test.

use crate::registry::PlatformId;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::path::PathBuf;

/// Opens URLs in the default browser. Fire-and-forget: `false` only means the
/// hand-off itself failed.
#[cfg_attr(test, automock)]
pub trait Browser: Send + Sync {
    fn open(&self, url: &str) -> bool;
}

/// Plays the best match for a query on a video platform.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VideoPlayer: Send + Sync {
    async fn play(&self, query: &str) -> Result<()>;
}

/// Finds an installed program by name in the platform's usual locations.
#[cfg_attr(test, automock)]
pub trait ProgramLocator: Send + Sync {
    fn find(&self, name: &str, platform: PlatformId) -> Option<PathBuf>;
}

/// What to hand to the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// A resolved executable or bundle path.
    Path(PathBuf),
    /// A protocol URI opened through the OS shell.
    Uri(String),
    /// A bare program or application name, started as-is.
    Name(String),
}

/// Starts a program without waiting for it to exit.
#[cfg_attr(test, automock)]
pub trait ProgramLauncher: Send + Sync {
    fn launch(&self, target: &LaunchTarget, platform: PlatformId) -> Result<()>;
}

/// Text-to-speech. `speak` resolves when the utterance has finished or was
/// interrupted by `stop`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str) -> Result<()>;
    fn stop(&self);
}

/// The chat-completion backend used for anything no rule matched.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConversationalAgent: Send + Sync {
    async fn ask(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("no speech detected")]
    NoSpeechDetected,
    #[error("speech recognition service unavailable: {0}")]
    ServiceUnavailable(String),
    /// The input device is gone. The capture loop cannot continue.
    #[error("audio input device lost: {0}")]
    DeviceLost(String),
}

/// Blocks until one utterance has been captured and transcribed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UtteranceSource: Send + Sync {
    async fn capture(&self) -> std::result::Result<String, CaptureError>;
}
