use thiserror::Error;

/// Failures raised by [`Buffer`](super::Buffer) operations.
///
/// None of them is recoverable by retrying against the same buffer: the caller has to drain,
/// replace or resize the buffer first. A failing call never leaves a partial mutation behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("buffer underflow: requested {requested} byte(s) but only {remaining} remaining")]
    Underflow { requested: usize, remaining: usize },

    #[error("requested buffer size {requested} exceeds maximum allowed ({max})")]
    CapacityExceeded { requested: usize, max: usize },

    #[error("fixed buffer overflow: requested {requested} byte(s) but only {remaining} remaining")]
    Overflow { requested: usize, remaining: usize },

    #[error("range {start}..{end} out of bounds for limit {limit}")]
    OutOfBounds { start: usize, end: usize, limit: usize },
}

impl BufferError {
    pub fn underflow(requested: usize, remaining: usize) -> Self {
        Self::Underflow { requested, remaining }
    }

    pub fn capacity_exceeded(requested: usize, max: usize) -> Self {
        Self::CapacityExceeded { requested, max }
    }

    pub fn overflow(requested: usize, remaining: usize) -> Self {
        Self::Overflow { requested, remaining }
    }

    pub fn out_of_bounds(start: usize, end: usize, limit: usize) -> Self {
        Self::OutOfBounds { start, end, limit }
    }
}
