//! The message envelope shared by requests and responses.
//!
//! An [`Envelope`] carries everything a message exchange needs besides its protocol specific
//! fields:
//!
//! - headers ([`Headers`], single canonical value per name)
//! - completion handlers, fired once when the exchange completes
//! - an outgoing queue that buffers writes until the transport attaches a [`WriteSink`]
//! - a read source fanning inbound chunks out to byte consumers and one read handler
//! - a reply slot pairing a reply with the listener waiting for it
//!
//! Each of those pieces sits behind its own short-lived lock, so a handler writing from one
//! worker thread never contends with the transport delivering bytes on another. User
//! callbacks always run after the lock guarding their state has been released.

mod error;
mod headers;
mod inbound;
mod message;
mod payload;
mod reply;

pub use error::EnvelopeError;
pub use headers::Headers;
pub use inbound::InboundBody;
pub use message::Message;
pub use payload::{Payload, WriteCallback, WriteSink};

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::channel::mpsc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::ensure;
use payload::Queued;
use reply::ReplySlot;

type CompletionHandler = Box<dyn FnOnce() + Send>;
type ChunkHandler = Arc<dyn Fn(Bytes) + Send + Sync>;

#[derive(Default)]
struct Outgoing {
    queue: VecDeque<Queued>,
    sink: Option<Arc<dyn WriteSink>>,
    draining: bool,
}

#[derive(Default)]
struct Inbound {
    consumers: Vec<ChunkHandler>,
    handler: Option<ChunkHandler>,
}

/// Headers, callbacks and buffered writes of one message; `R` is the type of its reply.
pub struct Envelope<R> {
    headers: RwLock<Headers>,
    completed: AtomicBool,
    completion: Mutex<Vec<CompletionHandler>>,
    outgoing: Mutex<Outgoing>,
    inbound: Mutex<Inbound>,
    reply: ReplySlot<R>,
}

impl<R: Clone> Envelope<R> {
    pub fn new() -> Self {
        Self::with_headers(Headers::new())
    }

    pub fn with_headers(headers: Headers) -> Self {
        Self {
            headers: RwLock::new(headers),
            completed: AtomicBool::new(false),
            completion: Mutex::new(Vec::new()),
            outgoing: Mutex::new(Outgoing::default()),
            inbound: Mutex::new(Inbound::default()),
            reply: ReplySlot::new(),
        }
    }

    // headers

    /// Sets `name` to `value`, replacing any previous value.
    pub fn header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        self.headers.write().insert(name, value);
        self
    }

    /// Adds `value` to `name`; an existing value becomes `"existing, value"`.
    pub fn append_header(&self, name: impl Into<String>, value: impl AsRef<str>) -> &Self {
        self.headers.write().append(name, value);
        self
    }

    pub fn header_value(&self, name: &str) -> Option<String> {
        self.headers.read().get(name).map(str::to_owned)
    }

    /// Every value of `name`, split on commas and trimmed.
    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.headers.read().get_all(name).into_iter().map(str::to_owned).collect()
    }

    pub fn remove_header(&self, name: &str) -> Option<String> {
        self.headers.write().remove(name)
    }

    /// A snapshot of the current headers.
    pub fn headers(&self) -> Headers {
        self.headers.read().clone()
    }

    // completion

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Marks the envelope completed and runs every completion handler once, in registration
    /// order, on the calling thread. Later calls do nothing.
    ///
    /// Completion also detaches the byte consumers, which ends every [`InboundBody`].
    pub fn complete(&self) {
        if self.completed.swap(true, Ordering::AcqRel) {
            return;
        }

        let handlers = mem::take(&mut *self.completion.lock());
        trace!(handlers = handlers.len(), "envelope completed");
        for handler in handlers {
            handler();
        }

        let consumers = mem::take(&mut self.inbound.lock().consumers);
        drop(consumers);
    }

    /// Registers `handler` to run on completion. Runs it right away when already completed.
    pub fn on_complete<F>(&self, handler: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut handlers = self.completion.lock();
            if !self.is_completed() {
                handlers.push(Box::new(handler));
                return self;
            }
        }
        handler();
        self
    }

    // outgoing

    pub fn write(&self, payload: impl Into<Payload>) -> Result<(), EnvelopeError> {
        self.enqueue(payload.into(), None)
    }

    /// Writes `payload` and runs `on_complete` once the transport has written it.
    pub fn write_with<F>(&self, payload: impl Into<Payload>, on_complete: F) -> Result<(), EnvelopeError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(payload.into(), Some(Box::new(on_complete)))
    }

    fn enqueue(&self, payload: Payload, on_complete: Option<WriteCallback>) -> Result<(), EnvelopeError> {
        ensure!(!self.is_completed(), EnvelopeError::Completed);

        let sink = {
            let mut outgoing = self.outgoing.lock();
            match &outgoing.sink {
                Some(sink) if !outgoing.draining => Arc::clone(sink),
                _ => {
                    outgoing.queue.push_back(Queued { payload, on_complete });
                    return Ok(());
                }
            }
        };

        sink.write(payload, on_complete);
        Ok(())
    }

    /// Installs the transport sink and flushes everything written so far into it, oldest first.
    ///
    /// Writes issued while the flush is in progress are queued behind it. A second sink is
    /// rejected.
    pub fn attach_sink<S>(&self, sink: S) -> Result<(), EnvelopeError>
    where
        S: WriteSink + 'static,
    {
        let sink: Arc<dyn WriteSink> = Arc::new(sink);
        let queued = {
            let mut outgoing = self.outgoing.lock();
            ensure!(outgoing.sink.is_none(), EnvelopeError::SinkAttached);
            outgoing.sink = Some(Arc::clone(&sink));
            outgoing.draining = true;
            outgoing.queue.len()
        };
        debug!(queued, "write sink attached");

        loop {
            let next = {
                let mut outgoing = self.outgoing.lock();
                match outgoing.queue.pop_front() {
                    Some(item) => item,
                    None => {
                        outgoing.draining = false;
                        break;
                    }
                }
            };
            sink.write(next.payload, next.on_complete);
        }
        Ok(())
    }

    pub fn has_sink(&self) -> bool {
        self.outgoing.lock().sink.is_some()
    }

    /// Number of writes waiting for a sink.
    pub fn queued(&self) -> usize {
        self.outgoing.lock().queue.len()
    }

    // inbound

    /// Sets the single read handler, replacing the previous one.
    pub fn read_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        self.inbound.lock().handler = Some(Arc::new(handler));
        self
    }

    /// Adds a low-level consumer that sees every inbound chunk before the read handler.
    ///
    /// Consumers added after completion are dropped immediately.
    pub fn add_consumer<F>(&self, consumer: F) -> &Self
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        let mut inbound = self.inbound.lock();
        if !self.is_completed() {
            inbound.consumers.push(Arc::new(consumer));
        }
        self
    }

    /// Streams the inbound chunks delivered from now on, until completion.
    pub fn subscribe(&self) -> InboundBody {
        let (sender, receiver) = mpsc::unbounded();
        self.add_consumer(move |chunk: Bytes| {
            if sender.unbounded_send(chunk).is_err() {
                trace!("inbound subscriber gone, dropping chunk");
            }
        });
        InboundBody::new(receiver)
    }

    /// Hands `chunk` to every consumer, then to the read handler.
    pub fn deliver(&self, chunk: Bytes) {
        let (consumers, handler) = {
            let inbound = self.inbound.lock();
            (inbound.consumers.clone(), inbound.handler.clone())
        };

        for consumer in &consumers {
            consumer(chunk.clone());
        }
        if let Some(handler) = handler {
            handler(chunk);
        }
    }

    // reply

    /// Stores `reply` and hands it to the reply listener, if one is registered.
    pub fn reply(&self, reply: R) {
        self.reply.reply(reply);
    }

    /// Registers the reply listener, replacing the previous one. A reply that already arrived is
    /// delivered right away.
    pub fn reply_handler<F>(&self, listener: F) -> &Self
    where
        F: Fn(R) + Send + Sync + 'static,
    {
        self.reply.set_listener(Arc::new(listener));
        self
    }

    /// The most recent reply.
    pub fn current_reply(&self) -> Option<R> {
        self.reply.current()
    }
}

impl<R: Clone> Default for Envelope<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for Envelope<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("headers", &*self.headers.read())
            .field("completed", &self.completed.load(Ordering::Relaxed))
            .field("reply", &self.reply)
            .finish_non_exhaustive()
    }
}
