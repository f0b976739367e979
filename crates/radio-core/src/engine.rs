//! Seam to the audio pipeline (stream fetch, buffering, decoding, output).

use crate::throttle::StatusSink;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("could not open {url}: {reason}")]
    Open { url: String, reason: String },
}

/// One audio pipeline instance.  The session keeps at most one stream open.
pub trait AudioEngine {
    /// Start fetching and playing `url`.  On error nothing is left open.
    fn open(&mut self, url: &str) -> Result<(), EngineError>;

    /// Stop and release the open stream.  No-op when nothing is open.
    fn close(&mut self);

    /// Output gain in `0.0..=1.0`.
    fn set_gain(&mut self, gain: f32);

    /// Advance decoding/output by at most one unit of work without blocking.
    /// Status and error events are forwarded to `status`.  Returns `false`
    /// once the stream has ended or failed.
    fn tick(&mut self, status: &mut dyn StatusSink) -> bool;
}
