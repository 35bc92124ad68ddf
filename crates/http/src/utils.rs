//! Utility macros shared across the crate.

/// Early-returns `Err($error)` when `$predicate` does not hold.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
///
/// ```ignore
/// ensure!(size <= limits.max(), BufferError::capacity_exceeded(size, limits.max()));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
