//! Positional file access used by [`AsyncFile`](super::AsyncFile).

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::spawn_blocking;

use super::OpenOptions;

/// Asynchronous random-access file primitive.
///
/// Reads and writes carry their own offset, so concurrent operations never share a cursor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileChannel: Send + Sync {
    async fn size(&self) -> io::Result<u64>;

    /// Reads up to `len` bytes at `offset`. An empty result means end of file.
    async fn read_at(&self, offset: u64, len: usize) -> io::Result<Bytes>;

    /// Writes all of `data` at `offset`, returning the byte count.
    async fn write_at(&self, offset: u64, data: Bytes) -> io::Result<usize>;

    async fn close(&self) -> io::Result<()>;
}

/// [`FileChannel`] over a [`std::fs::File`], running each operation on the blocking pool.
#[derive(Debug)]
pub struct BlockingFileChannel {
    file: Mutex<Option<Arc<File>>>,
}

impl BlockingFileChannel {
    pub async fn open(path: &Path, options: OpenOptions) -> io::Result<Self> {
        let path = path.to_owned();
        let options = options.to_std();
        let file = spawn_blocking(move || options.open(path)).await.map_err(io::Error::other)??;
        Ok(Self::from_std(file))
    }

    pub fn from_std(file: File) -> Self {
        Self { file: Mutex::new(Some(Arc::new(file))) }
    }

    fn handle(&self) -> io::Result<Arc<File>> {
        self.file.lock().as_ref().map(Arc::clone).ok_or_else(|| io::Error::other("file channel closed"))
    }
}

#[async_trait]
impl FileChannel for BlockingFileChannel {
    async fn size(&self) -> io::Result<u64> {
        let file = self.handle()?;
        spawn_blocking(move || file.metadata().map(|metadata| metadata.len())).await.map_err(io::Error::other)?
    }

    async fn read_at(&self, offset: u64, len: usize) -> io::Result<Bytes> {
        let file = self.handle()?;
        spawn_blocking(move || {
            let mut buf = vec![0; len];
            let read = positional_read(&file, &mut buf, offset)?;
            buf.truncate(read);
            Ok(Bytes::from(buf))
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn write_at(&self, offset: u64, data: Bytes) -> io::Result<usize> {
        let file = self.handle()?;
        spawn_blocking(move || {
            let mut written = 0;
            while written < data.len() {
                let n = positional_write(&file, &data[written..], offset + written as u64)?;
                if n == 0 {
                    return Err(io::Error::from(io::ErrorKind::WriteZero));
                }
                written += n;
            }
            Ok(written)
        })
        .await
        .map_err(io::Error::other)?
    }

    async fn close(&self) -> io::Result<()> {
        // the descriptor goes away with the last in-flight operation holding it
        self.file.lock().take();
        Ok(())
    }
}

#[cfg(unix)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(windows)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

#[cfg(unix)]
fn positional_write(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::write_at(file, buf, offset)
}

#[cfg(windows)]
fn positional_write(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_write(file, buf, offset)
}
