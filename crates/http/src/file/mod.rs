//! Chunked asynchronous file pipeline.
//!
//! [`AsyncFile`] reads a file front to back in fixed-size chunks, handing each chunk to a read
//! handler as a [`Buffer`], and accepts any number of concurrent writes. Every write reserves
//! its byte range at submission, so writes land back to back in submission order no matter in
//! which order the underlying I/O finishes.
//!
//! Closing is deferred: [`AsyncFile::close`] without `force` only marks the file completed, and
//! the handle is released once the last outstanding write has finished.

mod channel;
mod options;

pub use channel::{BlockingFileChannel, FileChannel};
pub use options::OpenOptions;

#[cfg(test)]
pub(crate) use channel::MockFileChannel;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::AsyncWrite;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::buffer::Buffer;
use crate::envelope::{Payload, WriteCallback, WriteSink};

/// Size of the chunks handed to the read handler.
pub const READ_CHUNK_SIZE: usize = 16 * 1024;

type ReadHandler = Arc<dyn Fn(Buffer) + Send + Sync>;
type FailureHandler = Arc<dyn Fn(&io::Error) + Send + Sync>;
type CompletionHandler = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Handlers {
    read: Option<ReadHandler>,
    failure: Option<FailureHandler>,
    completion: Option<CompletionHandler>,
}

/// A file opened for chunked reads and position-reserving writes.
///
/// Cloning is cheap and every clone drives the same file.
#[derive(Clone)]
pub struct AsyncFile {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    channel: Box<dyn FileChannel>,
    position: AtomicU64,
    pending_writes: AtomicUsize,
    completed: AtomicBool,
    /// claimed by whichever of the deferred close and the last write releases the handle
    closing: AtomicBool,
    finished: AtomicBool,
    handlers: Mutex<Handlers>,
}

impl AsyncFile {
    pub async fn open(path: impl AsRef<Path>, options: OpenOptions) -> io::Result<Self> {
        let path = path.as_ref();
        let channel = BlockingFileChannel::open(path, options).await?;
        let file = Self::with_channel(path, channel);
        if options.is_append() {
            file.set_position(file.size().await?);
        }
        debug!(path = %path.display(), ?options, position = file.position(), "file opened");
        Ok(file)
    }

    /// Opens `path` for reading and starts streaming it into `handler`.
    pub async fn read<F>(path: impl AsRef<Path>, handler: F) -> io::Result<Self>
    where
        F: Fn(Buffer) + Send + Sync + 'static,
    {
        let file = Self::open(path, OpenOptions::reading()).await?;
        file.read_handler(handler);
        drop(file.read_fully());
        Ok(file)
    }

    /// Opens `path` for writing, creating it or truncating what was there.
    pub async fn overwrite(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::open(path, OpenOptions::overwriting()).await
    }

    /// Wraps an already opened channel.
    pub fn with_channel<C>(path: impl Into<PathBuf>, channel: C) -> Self
    where
        C: FileChannel + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                channel: Box::new(channel),
                position: AtomicU64::new(0),
                pending_writes: AtomicUsize::new(0),
                completed: AtomicBool::new(false),
                closing: AtomicBool::new(false),
                finished: AtomicBool::new(false),
                handlers: Mutex::new(Handlers::default()),
            }),
        }
    }

    /// Copies the whole file at `path` into `writer`, returning the byte count.
    pub async fn transfer_to<W>(path: impl AsRef<Path>, writer: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut file = tokio::fs::File::open(path).await?;
        tokio::io::copy(&mut file, writer).await
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Offset the next write will land at.
    pub fn position(&self) -> u64 {
        self.inner.position.load(Ordering::SeqCst)
    }

    pub fn set_position(&self, position: u64) -> &Self {
        self.inner.position.store(position, Ordering::SeqCst);
        self
    }

    pub fn reset(&self) -> &Self {
        self.set_position(0)
    }

    pub async fn size(&self) -> io::Result<u64> {
        self.inner.channel.size().await
    }

    pub fn pending_writes(&self) -> usize {
        self.inner.pending_writes.load(Ordering::SeqCst)
    }

    /// Whether the file has been read to the end or a deferred close was requested.
    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::SeqCst)
    }

    pub fn read_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn(Buffer) + Send + Sync + 'static,
    {
        self.inner.handlers.lock().read = Some(Arc::new(handler));
        self
    }

    pub fn failure_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn(&io::Error) + Send + Sync + 'static,
    {
        self.inner.handlers.lock().failure = Some(Arc::new(handler));
        self
    }

    /// Registers the file-level completion handler, or runs it right away when the file has
    /// already finished.
    pub fn on_complete<F>(&self, handler: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut handlers = self.inner.handlers.lock();
            if !self.inner.finished.load(Ordering::SeqCst) {
                handlers.completion = Some(Box::new(handler));
                return self;
            }
        }
        handler();
        self
    }

    /// Streams the file into the read handler, one chunk at a time from offset zero.
    ///
    /// The completion handler runs once the last chunk has been handed over; an empty file
    /// completes right away. Any failure goes to the failure handler and stops the read.
    pub fn read_fully(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = inner.read_all().await {
                warn!(path = %inner.path.display(), cause = %e, "file read failed");
                let failure = inner.handlers.lock().failure.clone();
                if let Some(handler) = failure {
                    handler(&e);
                }
            }
        })
    }

    /// Writes `data` at the current position and moves the position past it.
    pub fn write(&self, data: impl Into<Bytes>) -> JoinHandle<()> {
        self.submit(data.into(), None)
    }

    /// Like [`AsyncFile::write`], running `on_complete` once the bytes are on disk.
    ///
    /// A failed write never runs its callback.
    pub fn write_with<F>(&self, data: impl Into<Bytes>, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(data.into(), Some(Box::new(on_complete)))
    }

    /// A sink that turns envelope writes into file writes, so a message body can be attached
    /// straight to a file.
    pub fn write_sink(&self) -> impl WriteSink + 'static {
        let file = self.clone();
        move |payload: Payload, on_complete: Option<WriteCallback>| match payload {
            Payload::Data(bytes) => drop(file.submit(bytes, on_complete)),
            Payload::File(path) => {
                warn!(target_path = %file.path().display(), source = %path.display(), "file payloads can't be written into a file, skipping");
            }
        }
    }

    fn submit(&self, data: Bytes, on_complete: Option<WriteCallback>) -> JoinHandle<()> {
        let len = data.len() as u64;
        self.inner.pending_writes.fetch_add(1, Ordering::SeqCst);
        let offset = self.inner.position.fetch_add(len, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = inner.channel.write_at(offset, data).await;
            let last = inner.pending_writes.fetch_sub(1, Ordering::SeqCst) == 1;
            let closing = last && inner.completed.load(Ordering::SeqCst) && inner.claim_finish();

            match result {
                Ok(written) => {
                    trace!(offset, written, "file write done");
                    if closing {
                        inner.finish(on_complete).await;
                    } else if let Some(callback) = on_complete {
                        callback();
                    }
                }
                Err(e) => {
                    warn!(path = %inner.path.display(), offset, len, cause = %e, "file write failed");
                    if closing {
                        inner.finish(None).await;
                    }
                }
            }
        })
    }

    /// Closes the file.
    ///
    /// With `force` the handle is released immediately and no completion handler runs.
    /// Otherwise the file is marked completed and finishes as soon as no write is outstanding,
    /// which may be right now.
    pub async fn close(&self, force: bool) -> io::Result<()> {
        if force {
            debug!(path = %self.inner.path.display(), "force closing file");
            return self.inner.channel.close().await;
        }

        self.inner.completed.store(true, Ordering::SeqCst);
        if self.inner.pending_writes.load(Ordering::SeqCst) == 0 && self.inner.claim_finish() {
            self.inner.finish(None).await;
        }
        Ok(())
    }
}

impl Inner {
    async fn read_all(&self) -> io::Result<()> {
        let size = self.channel.size().await?;
        let mut offset = 0;

        while offset < size {
            let len = usize::try_from(size - offset).map_or(READ_CHUNK_SIZE, |left| left.min(READ_CHUNK_SIZE));
            let chunk = self.channel.read_at(offset, len).await?;
            if chunk.is_empty() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, format!("file ended at {offset} of {size} bytes")));
            }
            offset += chunk.len() as u64;

            let handler = self.handlers.lock().read.clone();
            if let Some(handler) = handler {
                handler(Buffer::from(&chunk[..]));
            }
        }

        trace!(path = %self.path.display(), size, "file read to the end");
        self.completed.store(true, Ordering::SeqCst);
        self.fire_completion();
        Ok(())
    }

    fn claim_finish(&self) -> bool {
        self.closing.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok()
    }

    /// Releases the handle after the last write, then runs that write's callback and the
    /// completion handler.
    async fn finish(&self, on_complete: Option<WriteCallback>) {
        if !self.finished.load(Ordering::SeqCst) {
            if let Err(e) = self.channel.close().await {
                error!(path = %self.path.display(), cause = %e, "failed to close file");
            }
        }
        if let Some(callback) = on_complete {
            callback();
        }
        self.fire_completion();
    }

    fn fire_completion(&self) {
        let handler = {
            let mut handlers = self.handlers.lock();
            if self.finished.swap(true, Ordering::SeqCst) {
                return;
            }
            handlers.completion.take()
        };
        if let Some(handler) = handler {
            handler();
        }
    }
}

impl fmt::Debug for AsyncFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFile")
            .field("path", &self.inner.path)
            .field("position", &self.position())
            .field("pending_writes", &self.pending_writes())
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}
