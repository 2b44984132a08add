//! Speech output.
//!
//! Everything the assistant says goes through a [`Speaker`]. The bundled
//! [`CommandSpeaker`] hands text to an external synthesizer such as
//! `espeak`; any other engine can be plugged in by implementing the trait.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Speech synthesis engine.
///
/// `speak` queues the utterance and returns immediately. Queued utterances
/// are spoken in order and never overlap.
pub trait Speaker: Send + Sync {
    /// Say `text` out loud.
    fn speak(&self, text: &str);
}

/// Voice parameters, on the same scale as web speech synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceProfile {
    /// Speaking rate, 1.0 is normal.
    pub rate: f32,
    /// Pitch, 1.0 is normal; lower is deeper.
    pub pitch: f32,
    /// Volume from 0.0 to 1.0.
    pub volume: f32,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl VoiceProfile {
    /// Deeper voice.
    pub fn deep() -> Self {
        Self {
            pitch: 0.8,
            ..Self::default()
        }
    }

    /// espeak arguments for this profile.
    ///
    /// espeak pitch is 0-99 with 50 as neutral, speed is words per minute
    /// with 175 as default, amplitude is 0-200 with 100 as default.
    pub fn espeak_args(&self) -> Vec<String> {
        let pitch = (self.pitch * 50.0).round().clamp(0.0, 99.0) as u32;
        let speed = (self.rate * 175.0).round().max(80.0) as u32;
        let amplitude = (self.volume * 100.0).round().clamp(0.0, 200.0) as u32;
        vec![
            "-p".to_string(),
            pitch.to_string(),
            "-s".to_string(),
            speed.to_string(),
            "-a".to_string(),
            amplitude.to_string(),
        ]
    }
}

/// Speaker that runs an espeak-compatible program per utterance.
///
/// Utterances are queued and spoken one at a time by a background task.
/// If the program cannot be started the text is logged instead, so the
/// assistant keeps working on machines without a synthesizer.
///
/// Must be created inside a tokio runtime.
pub struct CommandSpeaker {
    profile: VoiceProfile,
    queue: mpsc::UnboundedSender<String>,
}

impl CommandSpeaker {
    /// Create a speaker for `program` with the given voice.
    pub fn new(program: impl Into<String>, language: impl Into<String>, profile: VoiceProfile) -> Self {
        let (queue, utterances) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(program.into(), language.into(), profile, utterances));
        Self { profile, queue }
    }

    /// Get the voice profile.
    pub fn profile(&self) -> VoiceProfile {
        self.profile
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, text: &str) {
        debug!("Queueing speech: {}", text);
        if self.queue.send(text.to_string()).is_err() {
            info!("[speech] {}", text);
        }
    }
}

/// Speak queued utterances in order, waiting for each to finish.
async fn run_queue(
    program: String,
    language: String,
    profile: VoiceProfile,
    mut utterances: mpsc::UnboundedReceiver<String>,
) {
    let args = profile.espeak_args();

    while let Some(text) = utterances.recv().await {
        let spawned = Command::new(&program)
            .arg("-v")
            .arg(&language)
            .args(&args)
            .arg(&text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        match spawned {
            Ok(mut child) => {
                if let Err(e) = child.wait().await {
                    warn!("Speech program {} failed: {}", program, e);
                }
            }
            Err(e) => {
                warn!("Speech program {} unavailable: {}", program, e);
                info!("[speech] {}", text);
            }
        }
    }
    debug!("Speech queue closed");
}

/// Speaker that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, text: &str) {
        info!("[speech] {}", text);
    }
}

/// Time-of-day greeting for a local hour (0-23).
pub fn greeting_for_hour(hour: u32) -> &'static str {
    if hour < 12 {
        "Good morning, Sir."
    } else if hour < 16 {
        "Good afternoon, Sir."
    } else {
        "Good evening, Sir."
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Speaker;
    use parking_lot::Mutex;

    /// Speaker that remembers everything it was asked to say.
    #[derive(Debug, Default)]
    pub struct RecordingSpeaker {
        spoken: Mutex<Vec<String>>,
    }

    impl RecordingSpeaker {
        pub fn spoken(&self) -> Vec<String> {
            self.spoken.lock().clone()
        }

        pub fn last(&self) -> Option<String> {
            self.spoken.lock().last().cloned()
        }
    }

    impl Speaker for RecordingSpeaker {
        fn speak(&self, text: &str) {
            self.spoken.lock().push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_greeting_boundaries() {
        assert_eq!(greeting_for_hour(0), "Good morning, Sir.");
        assert_eq!(greeting_for_hour(11), "Good morning, Sir.");
        assert_eq!(greeting_for_hour(12), "Good afternoon, Sir.");
        assert_eq!(greeting_for_hour(15), "Good afternoon, Sir.");
        assert_eq!(greeting_for_hour(16), "Good evening, Sir.");
        assert_eq!(greeting_for_hour(23), "Good evening, Sir.");
    }

    #[test]
    fn test_espeak_args_for_deep_voice() {
        let args = VoiceProfile::deep().espeak_args();
        assert_eq!(args, vec!["-p", "40", "-s", "175", "-a", "100"]);
    }

    #[tokio::test]
    async fn test_missing_program_does_not_panic() {
        let speaker = CommandSpeaker::new(
            "definitely-not-a-speech-program",
            "en",
            VoiceProfile::default(),
        );
        speaker.speak("Hello");
        speaker.speak("Goodbye");
        tokio::task::yield_now().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_utterances_do_not_overlap() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("speech.log");
        let script = dir.path().join("fake-tts");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho start >> {log}\nsleep 0.2\necho end >> {log}\n",
                log = log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let speaker = CommandSpeaker::new(
            script.to_string_lossy(),
            "en",
            VoiceProfile::default(),
        );
        speaker.speak("Connecting to your smart cane now.");
        speaker.speak("Connection failed, please try again.");

        let lines = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let text = std::fs::read_to_string(&log).unwrap_or_default();
                let lines: Vec<String> = text.lines().map(str::to_string).collect();
                if lines.len() >= 4 {
                    return lines;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(lines, vec!["start", "end", "start", "end"]);
    }
}
