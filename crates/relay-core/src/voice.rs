//! Best-effort text-to-speech.
//!
//! Synthesis is optional: when no synthesizer is installed, or it fails, the
//! adapter returns `None` and the caller delivers the reply as text.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::SynthesisError;

/// Default text-to-speech program.
pub const DEFAULT_TTS_COMMAND: &str = "espeak-ng";

/// Default upper bound on one synthesis.
pub const DEFAULT_TTS_TIMEOUT: Duration = Duration::from_secs(20);

/// An audio file produced for one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceArtifact {
    path: PathBuf,
}

impl VoiceArtifact {
    /// Wrap an existing audio file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the audio file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the audio file once it has been delivered.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            debug!(path = %self.path.display(), error = %e, "Could not remove voice artifact");
        }
    }
}

/// Converts text to an audio artifact.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Produce audio for `text`.
    async fn synthesize(&self, text: &str) -> Result<VoiceArtifact, SynthesisError>;
}

/// Runs an espeak-compatible program: `<program> -w <out.wav> --stdin`.
///
/// The text goes in on stdin, so replies starting with `-` are never read as options.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: PathBuf,
    output_dir: PathBuf,
}

impl CommandSynthesizer {
    /// Locate `command` on `PATH`.
    pub fn locate(command: &str, output_dir: impl Into<PathBuf>) -> Result<Self, SynthesisError> {
        let program = which::which(command)
            .map_err(|e| SynthesisError::Unavailable(format!("{}: {}", command, e)))?;
        Ok(Self::new(program, output_dir))
    }

    /// Use an explicit program path.
    pub fn new(program: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<VoiceArtifact, SynthesisError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("{}.wav", uuid::Uuid::new_v4()));

        let mut child = Command::new(&self.program)
            .arg("-w")
            .arg(&path)
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that exits early reports through its status instead
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                debug!(error = %e, "Synthesizer closed stdin early");
            }
        }
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(SynthesisError::CommandFailed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if !tokio::fs::try_exists(&path).await? {
            return Err(SynthesisError::CommandFailed(format!(
                "{} produced no audio file",
                self.program.display()
            )));
        }

        Ok(VoiceArtifact::new(path))
    }
}

/// Wraps an optional synthesizer and swallows its failures.
#[derive(Clone)]
pub struct VoiceSynthesisAdapter {
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    timeout: Duration,
}

impl Default for VoiceSynthesisAdapter {
    fn default() -> Self {
        Self {
            synthesizer: None,
            timeout: DEFAULT_TTS_TIMEOUT,
        }
    }
}

impl VoiceSynthesisAdapter {
    /// Adapter using `synthesizer`.
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            synthesizer: Some(synthesizer),
            ..Self::default()
        }
    }

    /// Give up on a synthesis after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adapter that never produces audio.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Adapter backed by `command` if it is installed, otherwise disabled.
    pub fn from_command(command: &str, output_dir: impl Into<PathBuf>) -> Self {
        match CommandSynthesizer::locate(command, output_dir) {
            Ok(synth) => Self::new(Arc::new(synth)),
            Err(e) => {
                warn!(error = %e, "Voice replies disabled");
                Self::disabled()
            }
        }
    }

    /// Whether a synthesizer is configured.
    pub fn is_available(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// Audio for `text`, or `None` if synthesis is unavailable, fails or times out.
    pub async fn synthesize(&self, text: &str) -> Option<VoiceArtifact> {
        let synthesizer = self.synthesizer.as_ref()?;
        let result = tokio::time::timeout(self.timeout, synthesizer.synthesize(text))
            .await
            .unwrap_or_else(|_| Err(SynthesisError::TimedOut(self.timeout)));
        match result {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!(error = %e, "Voice synthesis failed, replying with text");
                None
            }
        }
    }
}

impl std::fmt::Debug for VoiceSynthesisAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSynthesisAdapter")
            .field("available", &self.is_available())
            .field("timeout", &self.timeout)
            .finish()
    }
}
