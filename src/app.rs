//! Assistant entry points.
//!
//! Builds every collaborator from the configuration and runs the
//! conversation loop on a dedicated thread until the running flag clears
//! or the frame source ends.

#[cfg(feature = "cpal-audio")]
use crate::audio::capture::CpalFrameSource;
use crate::audio::clock::SystemClock;
use crate::audio::frame::FrameSource;
use crate::audio::vad::RmsVoiceActivity;
use crate::audio::wake::{TranscribingWakeGate, WakeGateConfig};
use crate::audio::wav::WavFrameSource;
use crate::config::Config;
use crate::conversation::machine::{
    Components, ConversationSettings, ConversationStateMachine, RunStats,
};
use crate::devices::display::CommandDisplay;
use crate::devices::led::PwmLed;
use crate::devices::sensor::HttpSensorClient;
use crate::error::{BuddyError, Result};
use crate::intent::dispatcher::IntentActionDispatcher;
use crate::intent::grammar::{Endpointing, Grammar, GrammarIntentEngine};
use crate::llm::ollama::OllamaGenerator;
use crate::speech::queue::SpeechQueue;
use crate::speech::synthesizer::PiperSynthesizer;
use crate::stt::transcriber::Transcriber;
use crate::stt::whisper::{WhisperConfig, WhisperTranscriber};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub device: Option<String>,
    pub max_listen: Option<Duration>,
    pub continuous: bool,
}

impl RunOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.audio.device = Some(device.clone());
        }
        if let Some(max_listen) = self.max_listen {
            config.capture.max_listen_ms = (max_listen.as_millis() as u64).max(1);
        }
        if self.continuous {
            config.conversation.continuous_mode = true;
        }
    }
}

/// Where the loop reads its audio from.
#[derive(Debug, Clone)]
pub enum AudioInput {
    #[cfg(feature = "cpal-audio")]
    Microphone,
    Wav(PathBuf),
}

/// Open the configured frame source.
pub fn open_source(config: &Config, input: &AudioInput) -> Result<Box<dyn FrameSource>> {
    let frame_length = config.audio.frame_length;
    let sample_rate = config.audio.sample_rate;
    match input {
        #[cfg(feature = "cpal-audio")]
        AudioInput::Microphone => {
            let source = CpalFrameSource::open(
                config.audio.device.as_deref(),
                &config.audio.mic_name_hints,
                frame_length,
                sample_rate,
            )?;
            Ok(Box::new(source))
        }
        AudioInput::Wav(path) => Ok(Box::new(WavFrameSource::open(
            path,
            frame_length,
            sample_rate,
        )?)),
    }
}

fn load_transcriber(config: &Config) -> Result<Arc<dyn Transcriber>> {
    tracing::info!(model = %config.stt.model_path.display(), "loading transcription model");
    let whisper = WhisperTranscriber::new(WhisperConfig::from(&config.stt))?;
    Ok(Arc::new(whisper))
}

/// Construct the state machine with production collaborators.
///
/// Any collaborator that fails to initialize aborts startup. HTTP clients
/// are blocking, so this must run outside the async runtime.
pub fn build_machine(
    config: &Config,
    source: Box<dyn FrameSource>,
) -> Result<ConversationStateMachine> {
    let sample_rate = config.audio.sample_rate;
    let transcriber = load_transcriber(config)?;

    let wake = TranscribingWakeGate::new(
        Arc::clone(&transcriber),
        WakeGateConfig::from_config(&config.wake, sample_rate),
    );
    let vad = RmsVoiceActivity::new(config.capture.vad_threshold, config.audio.frame_length);
    let intents = GrammarIntentEngine::new(
        Arc::clone(&transcriber),
        Grammar::from_config(&config.intent),
        Endpointing::from_config(&config.intent, config.wake.energy_threshold, sample_rate),
    );

    let speech = SpeechQueue::spawn(PiperSynthesizer::new(&config.speech)?)?;
    let dispatcher = IntentActionDispatcher::new(
        Box::new(HttpSensorClient::new(&config.sensors)?),
        Box::new(PwmLed::open(&config.led)?),
        Box::new(CommandDisplay::new(&config.display)),
        Box::new(speech.handle()),
    );
    let generator = OllamaGenerator::new(&config.llm)?;

    let parts = Components {
        source,
        wake: Box::new(wake),
        vad: Box::new(vad),
        intents: Box::new(intents),
        transcriber,
        generator: Box::new(generator),
        dispatcher,
        speech,
        clock: Arc::new(SystemClock),
    };
    Ok(ConversationStateMachine::new(
        parts,
        ConversationSettings::from_config(config),
    ))
}

/// Build and run the assistant on a background thread.
///
/// The thread owns every device handle; they are released when it returns,
/// whether the loop ended normally, on a cleared flag, or with an error.
pub fn spawn_assistant(
    config: Config,
    input: AudioInput,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<Result<RunStats>>> {
    let handle = thread::Builder::new()
        .name("conversation".to_string())
        .spawn(move || {
            let source = open_source(&config, &input)?;
            let mut machine = build_machine(&config, source)?;
            tracing::debug!(wake_phrases = ?config.wake.phrases, "assistant ready");
            let stats = machine.run(&running)?;
            tracing::info!(
                frames = stats.frames,
                wakes = stats.wakes,
                exchanges = stats.exchanges,
                "conversation loop stopped"
            );
            Ok(stats)
        })?;
    Ok(handle)
}

/// Wait for the assistant thread and surface its result.
pub fn join_assistant(handle: JoinHandle<Result<RunStats>>) -> Result<RunStats> {
    handle
        .join()
        .map_err(|_| BuddyError::Other("conversation thread panicked".to_string()))?
}

/// Speak one piece of text and wait until it has been played.
pub fn say(config: &Config, text: &str) -> Result<()> {
    let queue = SpeechQueue::spawn(PiperSynthesizer::new(&config.speech)?)?;
    queue.enqueue(text);
    queue.flush();
    Ok(())
}

/// Replay a WAV file through the assistant, blocking until it ends.
pub fn replay(config: Config, wav: &Path, running: Arc<AtomicBool>) -> Result<RunStats> {
    let handle = spawn_assistant(config, AudioInput::Wav(wav.to_path_buf()), running)?;
    join_assistant(handle)
}
