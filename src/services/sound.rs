//! Completion sound and vibration

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use tempfile::Builder;
use tokio::process::Command;
use tracing::{debug, error, warn};

use crate::{error::AlertError, state::TimerSettings};

/// Vibration pattern in milliseconds: on, off, on, off, on
pub const COMPLETION_VIBRATION: [u64; 5] = [200, 100, 200, 100, 200];

pub const TONE_FREQUENCY_HZ: f64 = 880.0;
const TONE_SAMPLE_RATE: u32 = 22_050;
const TONE_PEAK_GAIN: f64 = 0.3;
const TONE_FLOOR_GAIN: f64 = 0.01;
const TONE_ATTACK_SECS: f64 = 0.01;
const BEEP_SECS: f64 = 0.5;
/// Start offsets of the two beeps
const BEEP_STARTS: [f64; 2] = [0.0, 0.6];

/// Plays the audible and haptic parts of a completion alert
#[async_trait]
pub trait AlertPlayer: Send + Sync {
    /// Play a named sound from the sound library
    async fn play_sound(&self, sound: &str) -> Result<(), AlertError>;

    /// Play the built-in synthesized beep
    async fn play_tone(&self) -> Result<(), AlertError>;

    fn vibrate(&self, pattern: &[u64]) -> Result<(), AlertError>;
}

/// Play the completion alert honoring the user's settings
///
/// A missing or broken sound falls back to the synthesized tone. Nothing
/// here fails the caller.
pub async fn play_completion_alert(player: &dyn AlertPlayer, settings: &TimerSettings) {
    if settings.sound_enabled {
        if let Err(e) = player.play_sound(&settings.selected_sound).await {
            warn!(
                "Sound '{}' not available ({}), playing tone instead",
                settings.selected_sound, e
            );
            if let Err(e) = player.play_tone().await {
                error!("Failed to play tone: {}", e);
            }
        }
    }

    if settings.vibration_enabled {
        match player.vibrate(&COMPLETION_VIBRATION) {
            Ok(()) => {}
            Err(AlertError::Unsupported(what)) => debug!("Skipping {}: unsupported", what),
            Err(e) => error!("Failed to vibrate: {}", e),
        }
    }
}

/// Render the two-beep fallback tone as a 16-bit mono PCM WAV file
pub fn synthesize_tone() -> Vec<u8> {
    let end = BEEP_STARTS[BEEP_STARTS.len() - 1] + BEEP_SECS;
    let sample_count = (end * f64::from(TONE_SAMPLE_RATE)).round() as usize;

    let samples: Vec<i16> = (0..sample_count)
        .map(|n| {
            let t = n as f64 / f64::from(TONE_SAMPLE_RATE);
            let gain = BEEP_STARTS
                .iter()
                .map(|start| beep_gain(t - start))
                .fold(0.0, f64::max);
            let wave = (2.0 * std::f64::consts::PI * TONE_FREQUENCY_HZ * t).sin();
            (wave * gain * f64::from(i16::MAX)) as i16
        })
        .collect();

    encode_wav(&samples, TONE_SAMPLE_RATE)
}

/// Gain envelope of a single beep: linear attack, exponential decay
fn beep_gain(t: f64) -> f64 {
    if !(0.0..BEEP_SECS).contains(&t) {
        0.0
    } else if t < TONE_ATTACK_SECS {
        TONE_PEAK_GAIN * t / TONE_ATTACK_SECS
    } else {
        let decay = (t - TONE_ATTACK_SECS) / (BEEP_SECS - TONE_ATTACK_SECS);
        TONE_PEAK_GAIN * (TONE_FLOOR_GAIN / TONE_PEAK_GAIN).powf(decay)
    }
}

fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }
    wav
}

/// Plays `<sounds_dir>/<name>.wav` through an external audio player
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    sounds_dir: PathBuf,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>, sounds_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            sounds_dir: sounds_dir.into(),
        }
    }

    /// `paplay` with the given sound library
    pub fn paplay(sounds_dir: impl Into<PathBuf>) -> Self {
        Self::new("paplay", sounds_dir)
    }

    pub fn sound_path(&self, sound: &str) -> PathBuf {
        self.sounds_dir.join(format!("{sound}.wav"))
    }

    async fn play_file(&self, path: &Path) -> Result<(), AlertError> {
        debug!("Playing {} with {}", path.display(), self.program);

        let output = Command::new(&self.program)
            .arg(path)
            .output()
            .await
            .map_err(|source| AlertError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AlertError::PlayerFailed {
                program: self.program.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AlertPlayer for CommandPlayer {
    async fn play_sound(&self, sound: &str) -> Result<(), AlertError> {
        self.play_file(&self.sound_path(sound)).await
    }

    async fn play_tone(&self) -> Result<(), AlertError> {
        let mut file = Builder::new().suffix(".wav").tempfile()?;
        file.write_all(&synthesize_tone())?;
        file.flush()?;
        // Keep the temp file alive until playback finishes
        self.play_file(file.path()).await
    }

    fn vibrate(&self, _pattern: &[u64]) -> Result<(), AlertError> {
        Err(AlertError::Unsupported("vibration"))
    }
}

/// One call made against a [`RecordingPlayer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertCall {
    Sound(String),
    Tone,
    Vibrate(Vec<u64>),
}

/// Records alert calls; can simulate a missing sound library
#[derive(Debug, Default)]
pub struct RecordingPlayer {
    calls: Mutex<Vec<AlertCall>>,
    fail_sounds: AtomicBool,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `play_sound` call fail
    pub fn fail_sounds(&self, fail: bool) {
        self.fail_sounds.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<AlertCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, call: AlertCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

#[async_trait]
impl AlertPlayer for RecordingPlayer {
    async fn play_sound(&self, sound: &str) -> Result<(), AlertError> {
        self.record(AlertCall::Sound(sound.to_string()));
        if self.fail_sounds.load(Ordering::SeqCst) {
            return Err(AlertError::PlayerFailed {
                program: "recording".to_string(),
                stderr: format!("no such sound: {sound}"),
            });
        }
        Ok(())
    }

    async fn play_tone(&self) -> Result<(), AlertError> {
        self.record(AlertCall::Tone);
        Ok(())
    }

    fn vibrate(&self, pattern: &[u64]) -> Result<(), AlertError> {
        self.record(AlertCall::Vibrate(pattern.to_vec()));
        Ok(())
    }
}
