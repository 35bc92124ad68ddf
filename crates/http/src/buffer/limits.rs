//! Process-wide buffer sizing.
//!
//! The growth increment and the per-buffer ceiling are read once, on first use, either from
//! the environment or from a value installed by the application before any buffer is built.
//!
//! | variable                           | default         |
//! |------------------------------------|-----------------|
//! | `MICRO_ENVELOPE_SMALL_BUFFER_SIZE` | 16 KiB          |
//! | `MICRO_ENVELOPE_MAX_BUFFER_SIZE`   | 1000 KiB        |

use once_cell::sync::OnceCell;
use tracing::warn;

/// Default growth step of a dynamic [`Buffer`](super::Buffer).
pub const DEFAULT_SMALL_BUFFER_SIZE: usize = 16 * 1024;

/// Default ceiling of a single [`Buffer`](super::Buffer).
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1000;

const SMALL_BUFFER_SIZE_ENV: &str = "MICRO_ENVELOPE_SMALL_BUFFER_SIZE";
const MAX_BUFFER_SIZE_ENV: &str = "MICRO_ENVELOPE_MAX_BUFFER_SIZE";

static GLOBAL_LIMITS: OnceCell<BufferLimits> = OnceCell::new();

/// Growth increment and maximum capacity applied to a buffer.
///
/// Every buffer copies the limits it was built with, so installing new process-wide limits
/// never changes buffers that already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLimits {
    increment: usize,
    max: usize,
}

impl BufferLimits {
    /// Creates limits with the given growth step and ceiling. A zero increment is bumped to one.
    pub const fn new(increment: usize, max: usize) -> Self {
        let increment = if increment == 0 { 1 } else { increment };
        Self { increment, max }
    }

    #[inline]
    pub fn increment(&self) -> usize {
        self.increment
    }

    #[inline]
    pub fn max(&self) -> usize {
        self.max
    }

    /// Returns the process-wide limits, initialising them from the environment on first call.
    pub fn global() -> Self {
        *GLOBAL_LIMITS.get_or_init(Self::from_env)
    }

    /// Installs these limits as the process-wide value.
    ///
    /// Fails, handing back the limits already in effect, once any buffer has read them.
    pub fn install(self) -> Result<(), Self> {
        GLOBAL_LIMITS.set(self).map_err(|_rejected| Self::global())
    }

    /// Reads the limits from the environment, falling back to the defaults for unset or
    /// unparsable values.
    pub fn from_env() -> Self {
        let increment = read_env(SMALL_BUFFER_SIZE_ENV, DEFAULT_SMALL_BUFFER_SIZE);
        let max = read_env(MAX_BUFFER_SIZE_ENV, DEFAULT_MAX_BUFFER_SIZE);
        Self::new(increment, max)
    }
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self::new(DEFAULT_SMALL_BUFFER_SIZE, DEFAULT_MAX_BUFFER_SIZE)
    }
}

fn read_env(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|e| {
            warn!(variable = name, value = %value, cause = %e, "invalid buffer size, using default");
            default
        }),
        Err(_) => default,
    }
}
