//! Intent engine contract and utterance matching.

use crate::capture::utterance::Utterance;
use crate::intent::inference::Inference;
use crate::stt::transcriber::Transcript;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Incremental speech-to-intent engine.
pub trait IntentEngine: Send {
    /// Samples per chunk passed to `process`.
    fn frame_length(&self) -> usize;

    /// Feed one chunk. Returns `true` once the engine has finalized.
    fn process(&mut self, chunk: &[i16]) -> bool;

    /// Inference for the most recent finalization.
    fn get_inference(&mut self) -> Inference;

    /// Transcript the most recent finalization was decided on, for engines
    /// that transcribe. Taking it clears it.
    fn take_transcript(&mut self) -> Option<Transcript> {
        None
    }

    /// Drop buffered audio from a previous utterance.
    fn reset(&mut self) {}
}

impl<T: IntentEngine + ?Sized> IntentEngine for Box<T> {
    fn frame_length(&self) -> usize {
        (**self).frame_length()
    }

    fn process(&mut self, chunk: &[i16]) -> bool {
        (**self).process(chunk)
    }

    fn get_inference(&mut self) -> Inference {
        (**self).get_inference()
    }

    fn take_transcript(&mut self) -> Option<Transcript> {
        (**self).take_transcript()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Run an utterance through an intent engine.
///
/// The audio is re-chunked to the engine's frame length and a trailing partial
/// chunk is dropped. The first chunk that finalizes decides the result;
/// remaining chunks are not fed.
pub fn match_utterance<E: IntentEngine + ?Sized>(engine: &mut E, utterance: &Utterance) -> Inference {
    let frame_length = engine.frame_length();
    if frame_length == 0 {
        tracing::warn!("intent engine reports zero frame length");
        return Inference::NotFinalized;
    }

    engine.reset();
    let samples = utterance.samples();
    for (index, chunk) in samples.chunks_exact(frame_length).enumerate() {
        if engine.process(chunk) {
            let inference = engine.get_inference();
            tracing::debug!(chunk = index, ?inference, "intent engine finalized");
            return inference;
        }
    }
    tracing::debug!(
        chunks = samples.len() / frame_length,
        "intent engine did not finalize"
    );
    Inference::NotFinalized
}

/// Engine that finalizes on a chosen chunk with a fixed inference.
#[derive(Debug, Clone)]
pub struct MockIntentEngine {
    frame_length: usize,
    finalize_at: Option<usize>,
    inference: Inference,
    transcript: Option<String>,
    seen: usize,
    processed: Arc<AtomicUsize>,
}

impl MockIntentEngine {
    /// Engine that never finalizes.
    pub fn new(frame_length: usize) -> Self {
        Self {
            frame_length,
            finalize_at: None,
            inference: Inference::NotFinalized,
            transcript: None,
            seen: 0,
            processed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Finalize on the zero-based chunk `index` with `inference`.
    pub fn finalizing_at(mut self, index: usize, inference: Inference) -> Self {
        self.finalize_at = Some(index);
        self.inference = inference;
        self
    }

    /// Report `text` as the transcript behind each finalization.
    pub fn with_transcript(mut self, text: &str) -> Self {
        self.transcript = Some(text.to_string());
        self
    }

    /// Total chunks processed, shared across clones.
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }
}

impl IntentEngine for MockIntentEngine {
    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn process(&mut self, _chunk: &[i16]) -> bool {
        let index = self.seen;
        self.seen += 1;
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.finalize_at == Some(index)
    }

    fn get_inference(&mut self) -> Inference {
        self.inference.clone()
    }

    fn take_transcript(&mut self) -> Option<Transcript> {
        let finalized = self.finalize_at.is_some_and(|index| self.seen > index);
        self.transcript
            .as_deref()
            .filter(|_| finalized)
            .map(Transcript::new)
    }

    fn reset(&mut self) {
        self.seen = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frame::Frame;
    use crate::intent::inference::Slots;

    /// Records chunk lengths and finalizes on the first loud chunk.
    struct LoudChunkEngine {
        lengths: Vec<usize>,
    }

    impl IntentEngine for LoudChunkEngine {
        fn frame_length(&self) -> usize {
            4
        }

        fn process(&mut self, chunk: &[i16]) -> bool {
            self.lengths.push(chunk.len());
            chunk.iter().any(|&s| s > 0)
        }

        fn get_inference(&mut self) -> Inference {
            Inference::understood(format!("chunk{}", self.lengths.len() - 1), Slots::new())
        }
    }

    fn utterance(samples: Vec<i16>) -> Utterance {
        Utterance::from_frames(vec![Frame::new(samples)], 16000)
    }

    #[test]
    fn test_rechunks_and_drops_trailing_partial() {
        let mut engine = LoudChunkEngine { lengths: Vec::new() };
        let result = match_utterance(&mut engine, &utterance(vec![0; 10]));
        assert_eq!(result, Inference::NotFinalized);
        assert_eq!(engine.lengths, vec![4, 4]);
    }

    #[test]
    fn test_first_finalization_wins() {
        let mut engine = LoudChunkEngine { lengths: Vec::new() };
        let mut samples = vec![0i16; 16];
        samples[5] = 1; // chunk 1
        samples[13] = 1; // chunk 3
        let result = match_utterance(&mut engine, &utterance(samples));
        assert_eq!(result.intent().map(|(name, _)| name), Some("chunk1"));
        assert_eq!(engine.lengths.len(), 2);
    }

    #[test]
    fn test_chunks_span_frame_boundaries() {
        let mut engine = LoudChunkEngine { lengths: Vec::new() };
        let frames = vec![Frame::new(vec![0, 0, 0]), Frame::new(vec![0, 1, 0])];
        let result = match_utterance(&mut engine, &Utterance::from_frames(frames, 16000));
        assert!(result.is_finalized());
        assert_eq!(engine.lengths, vec![4]);
    }

    #[test]
    fn test_mock_engine_finalizes_at_index() {
        let inference = Inference::understood("changeFace", Slots::new());
        let mut engine = MockIntentEngine::new(2).finalizing_at(2, inference.clone());
        let result = match_utterance(&mut engine, &utterance(vec![0; 20]));
        assert_eq!(result, inference);
        assert_eq!(engine.processed(), 3);
    }

    #[test]
    fn test_mock_engine_resets_between_utterances() {
        let inference = Inference::understood("setTimer", Slots::new());
        let mut engine = MockIntentEngine::new(2).finalizing_at(0, inference.clone());
        assert_eq!(match_utterance(&mut engine, &utterance(vec![0; 4])), inference);
        assert_eq!(match_utterance(&mut engine, &utterance(vec![0; 4])), inference);
    }

    #[test]
    fn test_never_finalizing_engine() {
        let mut engine = MockIntentEngine::new(4);
        let result = match_utterance(&mut engine, &utterance(vec![0; 12]));
        assert_eq!(result, Inference::NotFinalized);
        assert_eq!(engine.processed(), 3);
    }
}
