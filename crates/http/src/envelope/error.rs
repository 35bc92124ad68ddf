use thiserror::Error;

/// Invalid-state failures of an [`Envelope`](super::Envelope).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope already completed")]
    Completed,

    #[error("write sink already attached")]
    SinkAttached,
}
