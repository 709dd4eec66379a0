//! Text-to-speech backends.

use crate::config::SpeechConfig;
use crate::error::{BuddyError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};

/// Speaks one unit of text. May block until playback finishes.
pub trait SpeechSynthesizer: Send {
    fn speak(&mut self, text: &str) -> Result<()>;
}

impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Box<T> {
    fn speak(&mut self, text: &str) -> Result<()> {
        (**self).speak(text)
    }
}

/// `piper` piped into a raw PCM player, one pipeline per unit.
///
/// [`speak`](SpeechSynthesizer::speak) returns only after the player has
/// exited, so a flushed queue means the audio has actually been heard.
#[derive(Debug, Clone)]
pub struct PiperSynthesizer {
    config: SpeechConfig,
}

impl PiperSynthesizer {
    /// Fails when either program cannot be found.
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        for program in [&config.piper_binary, &config.player_binary] {
            if find_program(program).is_none() {
                return Err(BuddyError::Synthesis {
                    message: format!("cannot start {}: not found", program),
                });
            }
        }
        tracing::info!(
            model = %config.piper_model.display(),
            rate = config.playback_rate,
            "speech synthesizer ready"
        );
        Ok(Self {
            config: config.clone(),
        })
    }

    fn start_pipeline(&self) -> Result<(Child, Child)> {
        let config = &self.config;
        let mut piper = Command::new(&config.piper_binary)
            .arg("--model")
            .arg(&config.piper_model)
            .arg("--config")
            .arg(&config.piper_config)
            .arg("--output-raw")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BuddyError::Synthesis {
                message: format!("cannot start {}: {}", config.piper_binary, e),
            })?;

        let Some(stdout) = piper.stdout.take() else {
            reap(&mut piper);
            return Err(BuddyError::Synthesis {
                message: "piper output unavailable".to_string(),
            });
        };

        let player = Command::new(&config.player_binary)
            .args(["-q", "-f", "S16_LE", "-r"])
            .arg(config.playback_rate.to_string())
            .args(["-c", "1"])
            .stdin(Stdio::from(stdout))
            .stderr(Stdio::null())
            .spawn();
        match player {
            Ok(player) => Ok((piper, player)),
            Err(e) => {
                reap(&mut piper);
                Err(BuddyError::Synthesis {
                    message: format!("cannot start {}: {}", config.player_binary, e),
                })
            }
        }
    }
}

impl SpeechSynthesizer for PiperSynthesizer {
    fn speak(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let (mut piper, mut player) = self.start_pipeline()?;

        // piper reads one utterance per line; EOF on stdin ends the unit
        let line = text.replace('\n', " ");
        let written = match piper.stdin.take() {
            Some(mut stdin) => writeln!(stdin, "{}", line).and_then(|()| stdin.flush()),
            None => Err(std::io::Error::other("piper input unavailable")),
        };

        let piper_status = piper.wait();
        let player_status = player.wait();
        written.map_err(|e| BuddyError::Synthesis {
            message: format!("piper: {}", e),
        })?;
        check_exit(&self.config.piper_binary, piper_status)?;
        check_exit(&self.config.player_binary, player_status)
    }
}

fn check_exit(program: &str, status: std::io::Result<ExitStatus>) -> Result<()> {
    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(BuddyError::Synthesis {
            message: format!("{} exited with {}", program, status),
        }),
        Err(e) => Err(BuddyError::Synthesis {
            message: format!("{}: {}", program, e),
        }),
    }
}

/// Resolve a program name against `PATH`; names with a directory are taken as is.
fn find_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn reap(child: &mut Child) {
    if let Ok(None) = child.try_wait()
        && let Err(e) = child.kill()
    {
        tracing::warn!(pid = child.id(), error = %e, "failed to kill speech process");
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid = child.id(), error = %e, "failed to reap speech process");
    }
}

/// Records spoken text in order; optionally fails on one exact text.
#[derive(Debug, Clone, Default)]
pub struct RecordingSynthesizer {
    spoken: Arc<Mutex<Vec<String>>>,
    fail_on: Option<String>,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    /// Spoken text so far, shared across clones.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl SpeechSynthesizer for RecordingSynthesizer {
    fn speak(&mut self, text: &str) -> Result<()> {
        if self.fail_on.as_deref() == Some(text) {
            return Err(BuddyError::Synthesis {
                message: format!("refused: {}", text),
            });
        }
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
        Ok(())
    }
}
