//! Completion sound
//!
//! Plays a sample file when one is configured and loadable; otherwise falls
//! back to a short synthesized three-tone sequence.

use std::{
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};
use tokio::{process::Command, runtime::Handle, task::JoinHandle};
use tracing::{debug, warn};

use crate::error::AudioError;

/// One scheduled tone of a synthesized sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub frequency_hz: u32,
    /// Start time relative to the first tone
    pub offset_ms: u64,
    pub duration_ms: u64,
}

/// Rising three-note chime used when no sample can be played
pub const FALLBACK_CHIME: [Tone; 3] = [
    Tone { frequency_hz: 880, offset_ms: 0, duration_ms: 150 },
    Tone { frequency_hz: 1109, offset_ms: 200, duration_ms: 150 },
    Tone { frequency_hz: 1319, offset_ms: 400, duration_ms: 300 },
];

/// Audio output used by the completion chime
pub trait AudioSink: Send + fmt::Debug {
    fn play_sample(&mut self, path: &Path) -> Result<(), AudioError>;

    fn play_tones(&mut self, tones: &[Tone]) -> Result<(), AudioError>;
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

impl AudioSink for SilentSink {
    fn play_sample(&mut self, _path: &Path) -> Result<(), AudioError> {
        Ok(())
    }

    fn play_tones(&mut self, _tones: &[Tone]) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Terminal output: samples go to an external player, tones become bell characters
#[derive(Debug, Clone)]
pub struct TerminalSink {
    /// Player command, e.g. `paplay` or `aplay`
    pub player: String,
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self {
            player: "paplay".to_string(),
        }
    }
}

impl AudioSink for TerminalSink {
    fn play_sample(&mut self, path: &Path) -> Result<(), AudioError> {
        if !path.is_file() {
            return Err(AudioError::SampleUnavailable(path.to_path_buf()));
        }
        spawn_player(&self.player, path)?;
        Ok(())
    }

    fn play_tones(&mut self, tones: &[Tone]) -> Result<(), AudioError> {
        let offsets: Vec<u64> = tones.iter().map(|t| t.offset_ms).collect();
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let start = tokio::time::Instant::now();
                    for offset in offsets {
                        tokio::time::sleep_until(start + Duration::from_millis(offset)).await;
                        ring_bell();
                    }
                });
            }
            Err(_) => ring_bell(),
        }
        Ok(())
    }
}

/// Start `player` on `path` and reap it in the background
///
/// The returned task resolves to the player's exit status once it has been waited on.
fn spawn_player(player: &str, path: &Path) -> Result<JoinHandle<Option<ExitStatus>>, AudioError> {
    let runtime = Handle::try_current().map_err(|e| AudioError::Playback(io::Error::other(e)))?;
    let mut child = Command::new(player)
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let player = player.to_string();
    Ok(runtime.spawn(async move {
        match child.wait().await {
            Ok(status) => {
                if !status.success() {
                    debug!("{} exited with {}", player, status);
                }
                Some(status)
            }
            Err(e) => {
                warn!("Failed to wait for {}: {}", player, e);
                None
            }
        }
    }))
}

fn ring_bell() {
    let mut stdout = io::stdout();
    if let Err(e) = stdout.write_all(b"\x07").and_then(|()| stdout.flush()) {
        debug!("Failed to ring terminal bell: {}", e);
    }
}

/// One-shot completion sound
#[derive(Debug)]
pub struct CompletionChime {
    sink: Box<dyn AudioSink>,
    sample: Option<PathBuf>,
    played: bool,
}

impl CompletionChime {
    pub fn new(sink: Box<dyn AudioSink>, sample: Option<PathBuf>) -> Self {
        Self {
            sink,
            sample,
            played: false,
        }
    }

    pub fn silent() -> Self {
        Self::new(Box::new(SilentSink), None)
    }

    /// Play once; later calls do nothing and return false
    pub fn play(&mut self) -> bool {
        if self.played {
            return false;
        }
        self.played = true;

        if let Some(sample) = &self.sample {
            match self.sink.play_sample(sample) {
                Ok(()) => return true,
                Err(e) => debug!("Sample playback failed, using fallback chime: {}", e),
            }
        }
        if let Err(e) = self.sink.play_tones(&FALLBACK_CHIME) {
            warn!("Fallback chime failed: {}", e);
        }
        true
    }
}
