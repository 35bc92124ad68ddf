use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

pub(crate) type ReplyListener<R> = Arc<dyn Fn(R) + Send + Sync>;

/// One-shot-or-immediate reply rendezvous.
///
/// Whichever of reply and listener arrives second triggers delivery. The listener is always
/// invoked after the slot lock has been released.
pub(crate) struct ReplySlot<R> {
    state: Mutex<ReplyState<R>>,
}

struct ReplyState<R> {
    reply: Option<R>,
    listener: Option<ReplyListener<R>>,
}

impl<R: Clone> ReplySlot<R> {
    pub(crate) fn new() -> Self {
        Self { state: Mutex::new(ReplyState { reply: None, listener: None }) }
    }

    pub(crate) fn reply(&self, reply: R) {
        let listener = {
            let mut state = self.state.lock();
            state.reply = Some(reply.clone());
            state.listener.clone()
        };

        if let Some(listener) = listener {
            listener(reply);
        }
    }

    pub(crate) fn set_listener(&self, listener: ReplyListener<R>) {
        let pending = {
            let mut state = self.state.lock();
            state.listener = Some(Arc::clone(&listener));
            state.reply.clone()
        };

        if let Some(reply) = pending {
            listener(reply);
        }
    }

    pub(crate) fn current(&self) -> Option<R> {
        self.state.lock().reply.clone()
    }
}

impl<R> fmt::Debug for ReplySlot<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ReplySlot")
            .field("replied", &state.reply.is_some())
            .field("listening", &state.listener.is_some())
            .finish()
    }
}
