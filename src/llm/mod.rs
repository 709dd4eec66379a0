//! Free-form response generation.

pub mod chunker;
pub mod generator;
pub mod ollama;

pub use chunker::SentenceChunker;
pub use generator::{
    BoundedTokens, FinishReason, GenerationLimits, GenerationOutcome, MockGenerator,
    ResponseGenerator, build_prompt,
};
pub use ollama::OllamaGenerator;
