use anyhow::{Context, Result};
use async_trait::async_trait;
use jarvis_core::collaborators::Speaker;
use jarvis_core::registry::PlatformId;
use std::process::Stdio;
use tokio::sync::Notify;

/// Words per minute.
pub const SPEECH_RATE: u32 = 150;

/// Builds the text-to-speech command for a platform.
pub fn speech_command(platform: PlatformId, rate: u32, text: &str) -> (String, Vec<String>) {
    match platform {
        PlatformId::MacOs => (
            "say".into(),
            vec!["-r".into(), rate.to_string(), text.to_string()],
        ),
        PlatformId::Linux => (
            "espeak".into(),
            vec!["-s".into(), rate.to_string(), text.to_string()],
        ),
        PlatformId::Windows => {
            let script = format!(
                "Add-Type -AssemblyName System.Speech; \
                 $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                 $s.Speak('{}')",
                text.replace('\'', "''")
            );
            (
                "powershell".into(),
                vec!["-NoProfile".into(), "-Command".into(), script],
            )
        }
    }
}

/// Speaks through the operating system's speech engine, one child process per
/// utterance.
pub struct SystemSpeaker {
    platform: PlatformId,
    interrupt: Notify,
}

impl SystemSpeaker {
    pub fn new(platform: PlatformId) -> Self {
        Self {
            platform,
            interrupt: Notify::new(),
        }
    }
}

#[async_trait]
impl Speaker for SystemSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let (program, args) = speech_command(self.platform, SPEECH_RATE, text);
        let interrupted = self.interrupt.notified();
        let mut child = tokio::process::Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {program}"))?;

        tokio::select! {
            status = child.wait() => {
                let status = status.with_context(|| format!("Failed to wait for {program}"))?;
                if !status.success() {
                    anyhow::bail!("{program} exited with {status}");
                }
            }
            _ = interrupted => {
                tracing::debug!("Speech interrupted");
                if let Err(e) = child.kill().await {
                    tracing::warn!("Could not kill {}: {}", program, e);
                }
            }
        }
        Ok(())
    }

    fn stop(&self) {
        self.interrupt.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macos_uses_say_at_the_speech_rate() {
        let (program, args) = speech_command(PlatformId::MacOs, SPEECH_RATE, "hello");
        assert_eq!(program, "say");
        assert_eq!(args, vec!["-r", "150", "hello"]);
    }

    #[test]
    fn linux_uses_espeak() {
        let (program, args) = speech_command(PlatformId::Linux, SPEECH_RATE, "hello");
        assert_eq!(program, "espeak");
        assert_eq!(args, vec!["-s", "150", "hello"]);
    }

    #[test]
    fn windows_script_escapes_quotes() {
        let (program, args) = speech_command(PlatformId::Windows, SPEECH_RATE, "it's late");
        assert_eq!(program, "powershell");
        assert!(args[2].contains("$s.Speak('it''s late')"));
    }

    #[tokio::test]
    async fn blank_text_is_not_spoken() {
        let speaker = SystemSpeaker::new(PlatformId::current());
        assert!(speaker.speak("   ").await.is_ok());
    }
}
