//! Whole-loop scenarios on synthetic audio.
//!
//! Audio goes through the real WAV decoder, wake gate, RMS voice activity,
//! utterance capture, grammar intent engine, sentence chunker and speech
//! queue. Only the models and devices are mocked.

use buddy::audio::clock::SystemClock;
use buddy::audio::vad::RmsVoiceActivity;
use buddy::audio::wake::{TranscribingWakeGate, WakeGateConfig};
use buddy::audio::wav::WavFrameSource;
use buddy::config::Config;
use buddy::conversation::{
    Components, ConversationSettings, ConversationStateMachine, Exchange, Phase, RunStats, Step,
};
use buddy::devices::{MockSensors, RecordingDisplay, RecordingLed};
use buddy::intent::palette::Rgb;
use buddy::intent::{DispatchOutcome, Endpointing, Grammar, GrammarIntentEngine, IntentActionDispatcher};
use buddy::llm::{FinishReason, MockGenerator};
use buddy::speech::{RecordingSynthesizer, SpeechQueue};
use buddy::stt::MockTranscriber;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

// 0.1s frames at 16kHz
const FRAME: usize = 1600;
const RATE: u32 = 16000;
const LOUD: i16 = 3000;

/// Wake phrase: half a second of speech, then enough silence to close it.
const WAKE: &[(usize, i16)] = &[(5, LOUD), (5, 0)];
/// One request: 0.4s of speech and 0.4s of silence.
const REQUEST: &[(usize, i16)] = &[(4, LOUD), (4, 0)];

/// Encode `(frames, amplitude)` runs as a 16-bit mono WAV and decode it again.
fn wav(script: &[&[(usize, i16)]]) -> WavFrameSource {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        for &(frames, amplitude) in script.iter().flat_map(|part| part.iter()) {
            for i in 0..frames * FRAME {
                let sample = if i % 2 == 0 { amplitude } else { -amplitude };
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    WavFrameSource::from_reader(Cursor::new(bytes), FRAME, RATE).unwrap()
}

fn config(continuous: bool) -> Config {
    let mut config = Config::default();
    config.audio.frame_length = FRAME;
    config.intent.frame_length = FRAME;
    config.conversation.continuous_mode = continuous;
    config
}

struct Assistant {
    machine: ConversationStateMachine,
    synth: RecordingSynthesizer,
    led: RecordingLed,
    generator: MockGenerator,
    intent_model: MockTranscriber,
    transcriber: MockTranscriber,
}

fn assistant(
    config: &Config,
    source: WavFrameSource,
    heard_by_grammar: &[&str],
    transcript: &str,
    tokens: &[&str],
) -> Assistant {
    let wake_model = MockTranscriber::new("wake").with_response("Hey, Buddy!");
    let intent_model = MockTranscriber::new("grammar")
        .with_response("")
        .with_responses(heard_by_grammar);
    let transcriber = MockTranscriber::new("whisper").with_response(transcript);
    let generator = MockGenerator::new(tokens);
    let synth = RecordingSynthesizer::new();
    let led = RecordingLed::new();

    let speech = SpeechQueue::spawn(synth.clone()).unwrap();
    let dispatcher = IntentActionDispatcher::new(
        Box::new(MockSensors::new().with_reading("DHT22", "temperature_celsius", 21.5)),
        Box::new(led.clone()),
        Box::new(RecordingDisplay::new()),
        Box::new(speech.handle()),
    );
    let parts = Components {
        source: Box::new(source),
        wake: Box::new(TranscribingWakeGate::new(
            wake_model,
            WakeGateConfig::from_config(&config.wake, RATE),
        )),
        vad: Box::new(RmsVoiceActivity::new(config.capture.vad_threshold, FRAME)),
        intents: Box::new(GrammarIntentEngine::new(
            intent_model.clone(),
            Grammar::from_config(&config.intent),
            Endpointing::from_config(&config.intent, config.wake.energy_threshold, RATE),
        )),
        transcriber: Arc::new(transcriber.clone()),
        generator: Box::new(generator.clone()),
        dispatcher,
        speech,
        clock: Arc::new(SystemClock),
    };

    Assistant {
        machine: ConversationStateMachine::new(parts, ConversationSettings::from_config(config)),
        synth,
        led,
        generator,
        intent_model,
        transcriber,
    }
}

fn step(machine: &mut ConversationStateMachine) -> Step {
    machine.step().unwrap()
}

/// Step through idle frames until something other than `Listening` happens.
fn next_event(machine: &mut ConversationStateMachine) -> Step {
    loop {
        match step(machine) {
            Step::Listening => continue,
            other => return other,
        }
    }
}

#[test]
fn test_question_is_answered_sentence_by_sentence() {
    let config = config(false);
    let source = wav(&[WAKE, REQUEST, &[(6, 0)]]);
    let tokens = ["Forty", " two", ".", " Or", " so", " they", " say", "."];
    let mut a = assistant(
        &config,
        source,
        &["What is the meaning of life?"],
        "unused",
        &tokens,
    );

    assert_eq!(next_event(&mut a.machine), Step::Woke);
    assert_eq!(a.machine.phase(), Phase::Active);

    assert_eq!(
        step(&mut a.machine),
        Step::Exchanged(Exchange::Generated {
            units: 2,
            finish: FinishReason::Completed,
        })
    );
    assert_eq!(a.synth.spoken(), vec!["Forty two.", "Or so they say."]);
    assert_eq!(a.machine.phase(), Phase::Idle);

    let prompts = a.generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].ends_with("User: What is the meaning of life?\nBuddy:"));
    // the intent engine's transcript is reused, so whisper runs once
    assert_eq!(a.intent_model.calls().len(), 1);
    assert!(a.transcriber.calls().is_empty());

    assert_eq!(next_event(&mut a.machine), Step::SourceEnded);
}

#[test]
fn test_sensor_question_is_answered_without_generation() {
    let config = config(false);
    let source = wav(&[WAKE, REQUEST]);
    let mut a = assistant(
        &config,
        source,
        &["what's the temperature in the kitchen"],
        "unused",
        &["unused"],
    );

    assert_eq!(next_event(&mut a.machine), Step::Woke);
    assert_eq!(
        step(&mut a.machine),
        Step::Exchanged(Exchange::Intent {
            name: "showTemperature".to_string(),
            outcome: DispatchOutcome::Spoke("showTemperature in kitchen: 21.5 °C".to_string()),
        })
    );
    assert_eq!(a.synth.spoken(), vec!["showTemperature in kitchen: 21.5 °C"]);
    assert!(a.transcriber.calls().is_empty());
    assert!(a.generator.prompts().is_empty());
    assert_eq!(a.machine.phase(), Phase::Idle);
}

#[test]
fn test_led_command_is_silent() {
    let config = config(false);
    let source = wav(&[WAKE, REQUEST]);
    let mut a = assistant(&config, source, &["set the leds to dark red"], "", &[]);

    assert_eq!(next_event(&mut a.machine), Step::Woke);
    assert_eq!(
        step(&mut a.machine),
        Step::Exchanged(Exchange::Intent {
            name: "changeLeds".to_string(),
            outcome: DispatchOutcome::LedSet(Rgb::new(139, 0, 0)),
        })
    );
    assert_eq!(a.led.calls(), vec![(139, 0, 0)]);
    assert!(a.synth.spoken().is_empty());
}

#[test]
fn test_wake_at_end_of_audio_aborts_exchange() {
    let config = config(false);
    let source = wav(&[WAKE]);
    let mut a = assistant(&config, source, &[], "unused", &["unused"]);

    assert_eq!(next_event(&mut a.machine), Step::Woke);
    assert_eq!(
        step(&mut a.machine),
        Step::Exchanged(Exchange::EmptyUtterance)
    );
    assert!(a.synth.spoken().is_empty());
    assert!(a.transcriber.calls().is_empty());
    assert_eq!(a.machine.phase(), Phase::Idle);
    assert_eq!(step(&mut a.machine), Step::SourceEnded);
}

#[test]
fn test_continuous_mode_takes_follow_ups_without_wake() {
    let config = config(true);
    let source = wav(&[WAKE, REQUEST, REQUEST]);
    let mut a = assistant(
        &config,
        source,
        &[
            "turn on the light in the kitchen",
            "and set a timer for five minutes",
        ],
        "",
        &[],
    );

    assert_eq!(next_event(&mut a.machine), Step::Woke);
    assert!(matches!(
        step(&mut a.machine),
        Step::Exchanged(Exchange::Intent { .. })
    ));
    assert_eq!(a.machine.phase(), Phase::Active);
    assert!(matches!(
        step(&mut a.machine),
        Step::Exchanged(Exchange::Intent { .. })
    ));
    assert_eq!(a.machine.phase(), Phase::Active);

    // audio ran out: nothing captured, conversation closes
    assert_eq!(
        step(&mut a.machine),
        Step::Exchanged(Exchange::EmptyUtterance)
    );
    assert_eq!(a.machine.phase(), Phase::Idle);
    assert_eq!(
        a.synth.spoken(),
        vec!["Turning on light in kitchen", "Setting timer for five minutes"]
    );
}

#[test]
fn test_run_reports_counts() {
    let config = config(false);
    let source = wav(&[&[(3, 0)], WAKE, REQUEST, &[(6, 0)]]);
    let mut a = assistant(&config, source, &[], "", &[]);

    let running = AtomicBool::new(true);
    let stats = a.machine.run(&running).unwrap();
    assert_eq!(
        stats,
        RunStats {
            frames: 19,
            wakes: 1,
            exchanges: 1,
        }
    );
    assert!(a.synth.spoken().is_empty());
}
