//! Ordered speech output on a single worker thread.
//!
//! Producers enqueue without blocking; the worker speaks units one at a time
//! in enqueue order. A failed unit is logged and the worker moves on.

use crate::error::Result;
use crate::speech::synthesizer::SpeechSynthesizer;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

enum Job {
    Speak(String),
    Flush(Sender<()>),
    Shutdown,
}

/// Something that accepts text to be spoken.
pub trait Speaker: Send {
    fn speak(&self, text: String);
}

/// Cloneable producer side of a [`SpeechQueue`].
#[derive(Debug, Clone)]
pub struct SpeechHandle {
    tx: Sender<Job>,
}

impl SpeechHandle {
    /// Queue a unit. Returns immediately; blank text is dropped.
    pub fn enqueue(&self, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        if self.tx.send(Job::Speak(text)).is_err() {
            tracing::warn!("speech worker gone, dropping unit");
        }
    }

    /// Block until every unit queued before this call has been spoken.
    pub fn flush(&self) {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Job::Flush(done_tx)).is_ok() && done_rx.recv().is_err() {
            tracing::warn!("speech worker stopped before flushing");
        }
    }
}

impl Speaker for SpeechHandle {
    fn speak(&self, text: String) {
        self.enqueue(text);
    }
}

/// Owns the speech worker. Dropping the queue speaks whatever is still queued,
/// then joins the worker.
pub struct SpeechQueue {
    handle: SpeechHandle,
    worker: Option<JoinHandle<()>>,
}

impl SpeechQueue {
    pub fn spawn<S: SpeechSynthesizer + 'static>(synthesizer: S) -> Result<Self> {
        let (tx, rx) = unbounded();
        let worker = thread::Builder::new()
            .name("speech".to_string())
            .spawn(move || run_worker(synthesizer, rx))?;
        Ok(Self {
            handle: SpeechHandle { tx },
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> SpeechHandle {
        self.handle.clone()
    }

    pub fn enqueue(&self, text: impl Into<String>) {
        self.handle.enqueue(text);
    }

    pub fn flush(&self) {
        self.handle.flush();
    }
}

fn run_worker<S: SpeechSynthesizer>(mut synthesizer: S, rx: Receiver<Job>) {
    let mut spoken = 0usize;
    for job in rx {
        match job {
            Job::Speak(text) => match synthesizer.speak(&text) {
                Ok(()) => {
                    spoken += 1;
                    tracing::debug!(text = %text, "spoke unit");
                }
                Err(e) => tracing::warn!(text = %text, error = %e, "speech synthesis failed"),
            },
            Job::Flush(done) => {
                if done.send(()).is_err() {
                    tracing::debug!("flush waiter went away");
                }
            }
            Job::Shutdown => break,
        }
    }
    tracing::debug!(spoken, "speech worker stopped");
}

impl Drop for SpeechQueue {
    fn drop(&mut self) {
        if self.handle.tx.send(Job::Shutdown).is_err() {
            tracing::debug!("speech worker already stopped");
        }
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!("speech worker panicked");
        }
    }
}

/// Speaker that records text instead of queueing it.
#[derive(Debug, Clone, Default)]
pub struct RecordingSpeaker {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Speaker for RecordingSpeaker {
    fn speak(&self, text: String) {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text);
        }
    }
}
