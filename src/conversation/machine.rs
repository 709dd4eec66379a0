//! The conversation loop: wake, capture, then intent or generated reply.
//!
//! One frame source drives everything. While idle each frame goes to the wake
//! gate; a trigger opens the conversation and the next step runs a whole
//! exchange synchronously. Speech output is the only work that overlaps the
//! loop, and it is drained before listening resumes.

use crate::audio::clock::Clock;
use crate::audio::frame::FrameSource;
use crate::audio::vad::VoiceActivityClassifier;
use crate::audio::wake::WakeWordGate;
use crate::capture::utterance::{CaptureLimits, capture_utterance};
use crate::config::Config;
use crate::conversation::state::{ConversationState, Phase};
use crate::error::Result;
use crate::intent::dispatcher::{DispatchOutcome, IntentActionDispatcher};
use crate::intent::matcher::{IntentEngine, match_utterance};
use crate::llm::chunker::SentenceChunker;
use crate::llm::generator::{FinishReason, GenerationLimits, ResponseGenerator, build_prompt};
use crate::speech::queue::SpeechQueue;
use crate::stt::transcriber::Transcriber;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Timing and generation settings for the loop.
#[derive(Debug, Clone)]
pub struct ConversationSettings {
    pub capture: CaptureLimits,
    pub system_prompt: String,
    pub limits: GenerationLimits,
    pub cooldown: Duration,
    /// Keep the conversation open for follow-ups until the cooldown expires.
    pub continuous_mode: bool,
}

impl ConversationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            capture: CaptureLimits::from(&config.capture),
            system_prompt: config.llm.system_prompt.clone(),
            limits: GenerationLimits::from(&config.llm),
            cooldown: Duration::from_secs(config.conversation.cooldown_secs),
            continuous_mode: config.conversation.continuous_mode,
        }
    }
}

/// Everything the loop drives.
pub struct Components {
    pub source: Box<dyn FrameSource>,
    pub wake: Box<dyn WakeWordGate>,
    pub vad: Box<dyn VoiceActivityClassifier>,
    pub intents: Box<dyn IntentEngine>,
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Box<dyn ResponseGenerator>,
    pub dispatcher: IntentActionDispatcher,
    pub speech: SpeechQueue,
    pub clock: Arc<dyn Clock>,
}

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Exchange {
    /// Capture returned no audio.
    EmptyUtterance,
    Intent {
        name: String,
        outcome: DispatchOutcome,
    },
    /// Nothing was recognized in the utterance.
    EmptyTranscript,
    Generated {
        units: usize,
        finish: FinishReason,
    },
    TranscriptionFailed,
    /// Generation failed part-way; `units` were still spoken.
    GenerationFailed {
        units: usize,
    },
}

impl Exchange {
    /// Whether the user got an answer or an action.
    fn responded(&self) -> bool {
        matches!(self, Self::Intent { .. } | Self::Generated { .. })
    }
}

/// Result of one [`ConversationStateMachine::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Idle frame without a trigger.
    Listening,
    Woke,
    Exchanged(Exchange),
    /// The conversation window closed before another exchange.
    Expired,
    /// The frame source has no more frames.
    SourceEnded,
}

/// Counters returned by [`ConversationStateMachine::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    pub wakes: u64,
    pub exchanges: u64,
}

pub struct ConversationStateMachine {
    parts: Components,
    settings: ConversationSettings,
    state: ConversationState,
}

impl ConversationStateMachine {
    pub fn new(parts: Components, settings: ConversationSettings) -> Self {
        Self {
            parts,
            settings,
            state: ConversationState::idle(),
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Advance by one idle frame or one whole exchange.
    pub fn step(&mut self) -> Result<Step> {
        match self.state.phase() {
            Phase::Idle => self.listen_for_wake(),
            Phase::Active => {
                let now = self.parts.clock.now();
                if self.state.is_expired(now) {
                    tracing::info!("conversation window expired");
                    self.state.deactivate();
                    return Ok(Step::Expired);
                }
                let exchange = self.exchange()?;
                self.parts.wake.reset();
                if !(self.settings.continuous_mode && exchange.responded()) {
                    self.state.deactivate();
                }
                tracing::info!(?exchange, phase = ?self.state.phase(), "exchange finished");
                Ok(Step::Exchanged(exchange))
            }
        }
    }

    /// Step until `running` is cleared or the source ends. The flag is checked
    /// between steps, so an exchange in progress always completes.
    pub fn run(&mut self, running: &AtomicBool) -> Result<RunStats> {
        let mut stats = RunStats::default();
        tracing::info!(
            continuous = self.settings.continuous_mode,
            cooldown_secs = self.settings.cooldown.as_secs(),
            "listening for wake word"
        );
        while running.load(Ordering::SeqCst) {
            match self.step()? {
                Step::Listening => stats.frames += 1,
                Step::Woke => {
                    stats.frames += 1;
                    stats.wakes += 1;
                }
                Step::Exchanged(_) => stats.exchanges += 1,
                Step::Expired => {}
                Step::SourceEnded => {
                    tracing::info!("audio source ended");
                    break;
                }
            }
        }
        Ok(stats)
    }

    fn listen_for_wake(&mut self) -> Result<Step> {
        let Some(frame) = self.parts.source.read()? else {
            return Ok(Step::SourceEnded);
        };
        if !self.parts.wake.process(&frame) {
            return Ok(Step::Listening);
        }
        let now = self.parts.clock.now();
        self.state.activate(now, self.settings.cooldown);
        tracing::info!("wake word detected");
        Ok(Step::Woke)
    }

    fn exchange(&mut self) -> Result<Exchange> {
        let parts = &mut self.parts;
        let captured = capture_utterance(
            &mut parts.source,
            &mut parts.vad,
            parts.clock.as_ref(),
            &self.settings.capture,
        )?;
        let utterance = captured.utterance;
        if utterance.is_empty() {
            tracing::info!("no speech captured");
            return Ok(Exchange::EmptyUtterance);
        }

        let inference = match_utterance(&mut parts.intents, &utterance);
        if let Some((name, slots)) = inference.intent() {
            let outcome = parts.dispatcher.dispatch(name, slots);
            parts.speech.flush();
            return Ok(Exchange::Intent {
                name: name.to_string(),
                outcome,
            });
        }

        let transcript = match parts.intents.take_transcript() {
            Some(transcript) => transcript,
            None => {
                tracing::debug!(frames = utterance.frame_count(), "no intent, transcribing");
                let samples = utterance.samples();
                drop(utterance);
                match parts.transcriber.transcribe(&samples) {
                    Ok(transcript) => transcript,
                    Err(e) => {
                        tracing::warn!(error = %e, "transcription failed");
                        return Ok(Exchange::TranscriptionFailed);
                    }
                }
            }
        };
        if transcript.is_empty() {
            tracing::info!("empty transcript");
            return Ok(Exchange::EmptyTranscript);
        }
        tracing::info!(transcript = %transcript.text, "heard");

        let prompt = build_prompt(&self.settings.system_prompt, &transcript.text);
        let speech = parts.speech.handle();
        let mut chunker = SentenceChunker::new();
        let mut units = 0usize;
        let result = parts
            .generator
            .generate(&prompt, &self.settings.limits, &mut |token| {
                if let Some(sentence) = chunker.push(token) {
                    speech.enqueue(sentence);
                    units += 1;
                }
            });
        if let Some(rest) = chunker.finish() {
            speech.enqueue(rest);
            units += 1;
        }
        parts.speech.flush();

        match result {
            Ok(outcome) => Ok(Exchange::Generated {
                units,
                finish: outcome.finish,
            }),
            Err(e) => {
                tracing::warn!(error = %e, units, "generation failed");
                Ok(Exchange::GenerationFailed { units })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clock::MockClock;
    use crate::audio::frame::MockFrameSource;
    use crate::audio::vad::ScriptedVad;
    use crate::audio::wake::ScriptedWakeGate;
    use crate::devices::{MockSensors, RecordingDisplay, RecordingLed};
    use crate::intent::inference::{Inference, Slots};
    use crate::intent::matcher::MockIntentEngine;
    use crate::llm::generator::MockGenerator;
    use crate::speech::synthesizer::RecordingSynthesizer;
    use crate::stt::transcriber::MockTranscriber;

    const FRAME: usize = 1600;
    const RATE: u32 = 16000;

    struct Rig {
        frames: usize,
        wake_at: Vec<usize>,
        vad: Vec<bool>,
        intents: MockIntentEngine,
        transcriber: MockTranscriber,
        generator: MockGenerator,
        continuous: bool,
        cooldown: Duration,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                frames: 40,
                wake_at: vec![0],
                vad: vec![true, true, true, false, false, false, false],
                intents: MockIntentEngine::new(FRAME),
                transcriber: MockTranscriber::new("mock").with_response(""),
                generator: MockGenerator::new(&[]),
                continuous: false,
                cooldown: Duration::from_secs(300),
            }
        }

        fn build(self) -> (ConversationStateMachine, RecordingSynthesizer, MockClock) {
            let clock = MockClock::new();
            let synth = RecordingSynthesizer::new();
            let speech = SpeechQueue::spawn(synth.clone()).unwrap();
            let dispatcher = IntentActionDispatcher::new(
                Box::new(MockSensors::new().with_reading("DHT22", "temperature_celsius", 21.5)),
                Box::new(RecordingLed::new()),
                Box::new(RecordingDisplay::new()),
                Box::new(speech.handle()),
            );
            let parts = Components {
                source: Box::new(
                    MockFrameSource::new(FRAME, RATE)
                        .with_constant(self.frames, 0)
                        .with_clock(clock.clone()),
                ),
                wake: Box::new(ScriptedWakeGate::triggering_at(self.wake_at)),
                vad: Box::new(ScriptedVad::new(FRAME, self.vad)),
                intents: Box::new(self.intents),
                transcriber: Arc::new(self.transcriber),
                generator: Box::new(self.generator),
                dispatcher,
                speech,
                clock: Arc::new(clock.clone()),
            };
            let settings = ConversationSettings {
                capture: CaptureLimits {
                    silence_threshold: Duration::from_millis(400),
                    max_listen_time: Duration::from_secs(10),
                    onset_delay: Duration::from_millis(300),
                },
                system_prompt: "You are Buddy.".to_string(),
                limits: GenerationLimits {
                    token_limit: 50,
                    stop_phrases: vec!["\n".to_string()],
                },
                cooldown: self.cooldown,
                continuous_mode: self.continuous,
            };
            (ConversationStateMachine::new(parts, settings), synth, clock)
        }
    }

    #[test]
    fn test_idle_frames_without_trigger() {
        let mut rig = Rig::new();
        rig.wake_at = vec![];
        rig.frames = 3;
        let (mut machine, _, _) = rig.build();
        assert_eq!(machine.step().unwrap(), Step::Listening);
        assert_eq!(machine.step().unwrap(), Step::Listening);
        assert_eq!(machine.step().unwrap(), Step::Listening);
        assert_eq!(machine.step().unwrap(), Step::SourceEnded);
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[test]
    fn test_wake_sets_expiry_from_cooldown() {
        let (mut machine, _, clock) = Rig::new().build();
        assert_eq!(machine.step().unwrap(), Step::Woke);
        assert_eq!(machine.phase(), Phase::Active);
        // the trigger frame advanced the clock by 0.1s
        assert_eq!(
            machine.state().expires_at(),
            Some(clock.now() + Duration::from_secs(300))
        );
    }

    #[test]
    fn test_intent_path_dispatches_and_returns_idle() {
        let mut rig = Rig::new();
        rig.intents = MockIntentEngine::new(FRAME)
            .finalizing_at(1, Inference::understood("showTemperature", Slots::new()));
        let transcriber = rig.transcriber.clone();
        let (mut machine, synth, _) = rig.build();

        machine.step().unwrap();
        let step = machine.step().unwrap();
        assert_eq!(
            step,
            Step::Exchanged(Exchange::Intent {
                name: "showTemperature".to_string(),
                outcome: DispatchOutcome::Spoke("showTemperature in inside: 21.5 °C".to_string()),
            })
        );
        assert_eq!(synth.spoken(), vec!["showTemperature in inside: 21.5 °C"]);
        assert!(transcriber.calls().is_empty());
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[test]
    fn test_generation_path_speaks_sentences_in_order() {
        let mut rig = Rig::new();
        rig.transcriber = MockTranscriber::new("mock").with_response("tell me something");
        rig.generator = MockGenerator::new(&["It", " is", " sunny", ".", " Enjoy", " it", "!"]);
        let generator = rig.generator.clone();
        let (mut machine, synth, _) = rig.build();

        machine.step().unwrap();
        let step = machine.step().unwrap();
        assert_eq!(
            step,
            Step::Exchanged(Exchange::Generated {
                units: 2,
                finish: FinishReason::Completed,
            })
        );
        assert_eq!(synth.spoken(), vec!["It is sunny.", "Enjoy it!"]);
        assert_eq!(
            generator.prompts(),
            vec!["You are Buddy.\n\nUser: tell me something\nBuddy:"]
        );
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[test]
    fn test_engine_transcript_is_not_transcribed_again() {
        let mut rig = Rig::new();
        rig.intents = MockIntentEngine::new(FRAME)
            .finalizing_at(1, Inference::not_understood())
            .with_transcript("what time is it");
        rig.generator = MockGenerator::new(&["Noon", "."]);
        let transcriber = rig.transcriber.clone();
        let generator = rig.generator.clone();
        let (mut machine, synth, _) = rig.build();

        machine.step().unwrap();
        assert!(matches!(
            machine.step().unwrap(),
            Step::Exchanged(Exchange::Generated { units: 1, .. })
        ));
        assert!(transcriber.calls().is_empty());
        assert_eq!(
            generator.prompts(),
            vec!["You are Buddy.\n\nUser: what time is it\nBuddy:"]
        );
        assert_eq!(synth.spoken(), vec!["Noon."]);
    }

    #[test]
    fn test_empty_engine_transcript_speaks_nothing() {
        let mut rig = Rig::new();
        rig.intents = MockIntentEngine::new(FRAME)
            .finalizing_at(0, Inference::not_understood())
            .with_transcript(" ");
        rig.transcriber = MockTranscriber::new("mock").with_response("should not be used");
        let transcriber = rig.transcriber.clone();
        let (mut machine, synth, _) = rig.build();

        machine.step().unwrap();
        assert_eq!(
            machine.step().unwrap(),
            Step::Exchanged(Exchange::EmptyTranscript)
        );
        assert!(transcriber.calls().is_empty());
        assert!(synth.spoken().is_empty());
    }

    #[test]
    fn test_empty_transcript_speaks_nothing() {
        let (mut machine, synth, _) = Rig::new().build();
        machine.step().unwrap();
        assert_eq!(
            machine.step().unwrap(),
            Step::Exchanged(Exchange::EmptyTranscript)
        );
        assert!(synth.spoken().is_empty());
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[test]
    fn test_empty_utterance_aborts_exchange() {
        let mut rig = Rig::new();
        rig.frames = 1;
        let intents = rig.intents.clone();
        let transcriber = rig.transcriber.clone();
        let (mut machine, _, _) = rig.build();
        assert_eq!(machine.step().unwrap(), Step::Woke);
        assert_eq!(
            machine.step().unwrap(),
            Step::Exchanged(Exchange::EmptyUtterance)
        );
        assert_eq!(intents.processed(), 0);
        assert!(transcriber.calls().is_empty());
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[test]
    fn test_transcription_failure_returns_idle() {
        let mut rig = Rig::new();
        rig.transcriber = MockTranscriber::new("mock").with_failure();
        let (mut machine, _, _) = rig.build();
        machine.step().unwrap();
        assert_eq!(
            machine.step().unwrap(),
            Step::Exchanged(Exchange::TranscriptionFailed)
        );
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[test]
    fn test_generation_failure_keeps_partial_speech() {
        let mut rig = Rig::new();
        rig.transcriber = MockTranscriber::new("mock").with_response("hello");
        rig.generator = MockGenerator::new(&["Hi", "."]).with_failure();
        let (mut machine, synth, _) = rig.build();
        machine.step().unwrap();
        assert_eq!(
            machine.step().unwrap(),
            Step::Exchanged(Exchange::GenerationFailed { units: 1 })
        );
        assert_eq!(synth.spoken(), vec!["Hi."]);
    }

    #[test]
    fn test_continuous_mode_stays_active_until_expiry() {
        let mut rig = Rig::new();
        rig.continuous = true;
        rig.cooldown = Duration::from_secs(1);
        rig.vad = vec![true, true, true, false, false, false, false];
        rig.intents = MockIntentEngine::new(FRAME)
            .finalizing_at(0, Inference::understood("setTimer", Slots::new()));
        let (mut machine, synth, _) = rig.build();

        assert_eq!(machine.step().unwrap(), Step::Woke);
        // 7 frames of 0.1s stay inside the 1s window
        assert!(matches!(machine.step().unwrap(), Step::Exchanged(_)));
        assert_eq!(machine.phase(), Phase::Active);
        // the follow-up pushes the clock past the window
        assert!(matches!(machine.step().unwrap(), Step::Exchanged(_)));
        assert_eq!(machine.step().unwrap(), Step::Expired);
        assert_eq!(machine.phase(), Phase::Idle);
        assert_eq!(
            synth.spoken(),
            vec!["Setting timer for unknown", "Setting timer for unknown"]
        );
    }

    #[test]
    fn test_run_stops_when_flag_cleared() {
        let (mut machine, _, _) = Rig::new().build();
        let running = AtomicBool::new(false);
        assert_eq!(machine.run(&running).unwrap(), RunStats::default());
    }

    #[test]
    fn test_run_until_source_ends() {
        let mut rig = Rig::new();
        rig.wake_at = vec![2];
        rig.frames = 12;
        let (mut machine, _, _) = rig.build();
        let running = AtomicBool::new(true);
        let stats = machine.run(&running).unwrap();
        assert_eq!(stats.wakes, 1);
        assert_eq!(stats.exchanges, 1);
        // 3 idle frames, 7 captured, 2 more idle
        assert_eq!(stats.frames, 5);
    }
}
