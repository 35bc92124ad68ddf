//! Cached `Date` header values.
//!
//! Formatting an HTTP date on every response is wasteful when the value only changes once a
//! second, so a background task refreshes a shared copy instead.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use tokio::task::JoinHandle;

const UPDATE_INTERVAL: Duration = Duration::from_millis(800);

/// Keeps the current HTTP date string up to date.
///
/// The refresh task is spawned on the current tokio runtime and aborted on drop.
#[derive(Debug)]
pub struct DateService {
    current: Arc<ArcSwap<String>>,
    handle: JoinHandle<()>,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(|| DateService::with_update_interval(UPDATE_INTERVAL));

impl DateService {
    /// The process-wide instance. First use has to happen inside a tokio runtime.
    pub fn global() -> &'static DateService {
        &DATE_SERVICE
    }

    pub fn with_update_interval(update_interval: Duration) -> Self {
        let current = Arc::new(ArcSwap::from_pointee(format_now()));
        let current_arc = Arc::clone(&current);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(update_interval).await;
                current_arc.store(Arc::new(format_now()));
            }
        });

        DateService { current, handle }
    }

    /// The current value, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
    pub fn http_date(&self) -> String {
        self.current.load().as_ref().clone()
    }
}

impl Drop for DateService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn format_now() -> String {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}
