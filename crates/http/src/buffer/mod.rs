//! Capacity-managed byte buffer.
//!
//! [`Buffer`] is the container every other component uses to move payload bytes around. It
//! follows the classic cursor model:
//!
//! - `append*` writes at the position and advances it, growing the backing store first if the
//!   buffer is dynamic
//! - [`Buffer::flip`] turns a written buffer into a readable one (`limit = position`,
//!   `position = 0`)
//! - `read*` consumes from the position up to the limit
//! - [`Buffer::rewind`] re-reads from the start, [`Buffer::clear`] drops the backing store
//!
//! A dynamic buffer grows in steps of [`BufferLimits::increment`] and refuses to grow past
//! [`BufferLimits::max`]. A fixed buffer is allocated once and reports an overflow instead of
//! growing.

mod error;
mod limits;

pub use error::BufferError;
pub use limits::{BufferLimits, DEFAULT_MAX_BUFFER_SIZE, DEFAULT_SMALL_BUFFER_SIZE};

use std::cmp::Ordering;
use std::fmt;
use std::io;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::ensure;

/// A growable (or fixed) byte region with a read/write cursor.
///
/// A buffer is owned by one call chain at a time; it is `Send` but offers no interior
/// synchronisation.
#[derive(Clone)]
pub struct Buffer {
    store: Option<BytesMut>,
    position: usize,
    limit: usize,
    dynamic: bool,
    fixed_size: usize,
    limits: BufferLimits,
}

impl Buffer {
    /// Creates an empty dynamic buffer using the process-wide [`BufferLimits`].
    ///
    /// Nothing is allocated until the first append.
    pub fn new() -> Self {
        Self::with_limits(BufferLimits::global())
    }

    /// Creates an empty dynamic buffer with explicit limits.
    pub fn with_limits(limits: BufferLimits) -> Self {
        Self { store: None, position: 0, limit: 0, dynamic: true, fixed_size: 0, limits }
    }

    /// Creates a dynamic buffer able to take at least `at_least` bytes without growing.
    pub fn with_capacity(at_least: usize) -> Result<Self, BufferError> {
        let mut buffer = Self::new();
        buffer.ensure_capacity(at_least)?;
        Ok(buffer)
    }

    /// Creates a fixed buffer of exactly `size` bytes.
    pub fn fixed(size: usize) -> Result<Self, BufferError> {
        Self::fixed_with_limits(size, BufferLimits::global())
    }

    pub fn fixed_with_limits(size: usize, limits: BufferLimits) -> Result<Self, BufferError> {
        ensure!(size <= limits.max(), BufferError::capacity_exceeded(size, limits.max()));
        Ok(Self { store: Some(BytesMut::zeroed(size)), position: 0, limit: size, dynamic: false, fixed_size: size, limits })
    }

    /// Creates a readable buffer holding a copy of `s`.
    pub fn wrap(s: &str) -> Self {
        Self::from(s)
    }

    fn readable(store: BytesMut, limits: BufferLimits) -> Self {
        let limit = store.len();
        Self { store: Some(store), position: 0, limit, dynamic: true, fixed_size: 0, limits }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Size of the backing store, `0` when there is none.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.store.as_ref().map_or(0, BytesMut::len)
    }

    /// Bytes between the position and the limit.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    #[inline]
    pub fn limits(&self) -> BufferLimits {
        self.limits
    }

    /// The bytes between the position and the limit, without consuming them.
    pub fn as_slice(&self) -> &[u8] {
        self.store.as_deref().map_or(&[], |store| &store[self.position..self.limit])
    }

    /// Switches from writing to reading: the limit becomes the current position and the position
    /// goes back to zero.
    pub fn flip(&mut self) -> &mut Self {
        if self.store.is_some() {
            self.limit = self.position;
            self.position = 0;
        }
        self
    }

    /// Moves the position back to zero, keeping the limit.
    pub fn rewind(&mut self) -> &mut Self {
        self.position = 0;
        self
    }

    /// Drops the backing store. The next append allocates a fresh one.
    pub fn clear(&mut self) -> &mut Self {
        self.store = None;
        self.position = 0;
        self.limit = 0;
        self
    }

    /// Reads one byte.
    pub fn read(&mut self) -> Result<u8, BufferError> {
        let byte = self.as_slice().first().copied().ok_or_else(|| BufferError::underflow(1, 0))?;
        self.position += 1;
        Ok(byte)
    }

    /// Fills `dst` completely, or fails without consuming anything.
    pub fn read_into(&mut self, dst: &mut [u8]) -> Result<&mut Self, BufferError> {
        let remaining = self.remaining();
        ensure!(dst.len() <= remaining, BufferError::underflow(dst.len(), remaining));
        dst.copy_from_slice(&self.as_slice()[..dst.len()]);
        self.position += dst.len();
        Ok(self)
    }

    /// Consumes the remaining bytes as a (lossy) UTF-8 string. `None` when there is no backing
    /// store at all.
    pub fn take_string(&mut self) -> Option<String> {
        self.store.as_ref()?;
        let s = String::from_utf8_lossy(self.as_slice()).into_owned();
        self.position = self.limit;
        Some(s)
    }

    /// Copies `len` bytes starting at `start` into a new readable buffer.
    ///
    /// The range is absolute (not relative to the position) and must lie below the limit. The
    /// cursor of `self` is left exactly where it was.
    pub fn slice(&self, start: usize, len: usize) -> Result<Buffer, BufferError> {
        let end = start.checked_add(len).ok_or_else(|| BufferError::out_of_bounds(start, usize::MAX, self.limit))?;
        ensure!(end <= self.limit, BufferError::out_of_bounds(start, end, self.limit));

        let bytes = self.store.as_deref().map_or(&[][..], |store| &store[start..end]);
        Ok(Self::readable(BytesMut::from(bytes), self.limits))
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<&mut Self, BufferError> {
        self.ensure_capacity(bytes.len())?;

        let start = self.position;
        let end = start + bytes.len();
        if let Some(store) = self.store.as_mut() {
            store[start..end].copy_from_slice(bytes);
            self.position = end;
        }
        Ok(self)
    }

    pub fn append_str(&mut self, s: &str) -> Result<&mut Self, BufferError> {
        self.append(s.as_bytes())
    }

    pub fn append_byte(&mut self, byte: u8) -> Result<&mut Self, BufferError> {
        self.append(&[byte])
    }

    /// Appends the remaining bytes of `other`, consuming them from `other` on success.
    pub fn append_buffer(&mut self, other: &mut Buffer) -> Result<&mut Self, BufferError> {
        self.append(other.as_slice())?;
        other.position = other.limit;
        Ok(self)
    }

    /// Writes the remaining bytes to `writer` with a single `write` call.
    ///
    /// Returns how many bytes the writer accepted (the position advances by that much), `0`
    /// when nothing is left.
    pub fn transfer_to<W>(&mut self, writer: &mut W) -> io::Result<usize>
    where
        W: io::Write + ?Sized,
    {
        if self.is_empty() {
            return Ok(0);
        }
        let written = writer.write(self.as_slice())?;
        self.position += written;
        Ok(written)
    }

    /// Async flavour of [`Buffer::transfer_to`].
    pub async fn transfer_to_async<W>(&mut self, writer: &mut W) -> io::Result<usize>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if self.is_empty() {
            return Ok(0);
        }
        let written = writer.write(self.as_slice()).await?;
        self.position += written;
        Ok(written)
    }

    /// Converts the remaining bytes into an immutable [`Bytes`] without copying.
    pub fn freeze(self) -> Bytes {
        self.into()
    }

    fn ensure_capacity(&mut self, needed: usize) -> Result<(), BufferError> {
        let max = self.limits.max();

        if self.store.is_none() {
            let size = if self.dynamic { grown_size(0, needed, self.limits.increment()) } else { self.fixed_size };
            ensure!(size <= max, BufferError::capacity_exceeded(size, max));
            ensure!(needed <= size, BufferError::overflow(needed, size));
            self.store = Some(BytesMut::zeroed(size));
            self.position = 0;
            self.limit = size;
            return Ok(());
        }

        let remaining = self.remaining();
        if remaining >= needed {
            return Ok(());
        }
        ensure!(self.dynamic, BufferError::overflow(needed, remaining));

        let size = grown_size(self.limit, needed - remaining, self.limits.increment());
        ensure!(size <= max, BufferError::capacity_exceeded(size, max));

        let mut grown = BytesMut::zeroed(size);
        if let Some(old) = &self.store {
            grown[..self.position].copy_from_slice(&old[..self.position]);
        }
        trace!(from = self.limit, to = size, "grow buffer");
        self.store = Some(grown);
        self.limit = size;
        Ok(())
    }
}

/// `base` plus the smallest whole number of increments (at least one) covering `shortfall`.
fn grown_size(base: usize, shortfall: usize, increment: usize) -> usize {
    let steps = shortfall.div_ceil(increment).max(1);
    steps.checked_mul(increment).and_then(|grow| grow.checked_add(base)).unwrap_or(usize::MAX)
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.store {
            Some(store) => f
                .debug_struct("Buffer")
                .field("position", &self.position)
                .field("limit", &self.limit)
                .field("capacity", &store.len())
                .field("dynamic", &self.dynamic)
                .finish(),
            None => f.write_str("Buffer(<EMPTY>)"),
        }
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        Self::readable(BytesMut::from(bytes), BufferLimits::global())
    }
}

impl From<&str> for Buffer {
    fn from(s: &str) -> Self {
        Self::from(s.as_bytes())
    }
}

impl From<String> for Buffer {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<BytesMut> for Buffer {
    fn from(store: BytesMut) -> Self {
        Self::readable(store, BufferLimits::global())
    }
}

impl From<Buffer> for Bytes {
    fn from(buffer: Buffer) -> Self {
        match buffer.store {
            Some(store) => store.freeze().slice(buffer.position..buffer.limit),
            None => Bytes::new(),
        }
    }
}

impl Buf for Buffer {
    fn remaining(&self) -> usize {
        self.limit - self.position
    }

    fn chunk(&self) -> &[u8] {
        self.as_slice()
    }

    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= Buffer::remaining(self), "cannot advance past the limit");
        self.position += cnt;
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Buffer {}

impl PartialOrd for Buffer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by the remaining bytes; an empty buffer sorts first.
impl Ord for Buffer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> BufferLimits {
        BufferLimits::new(16, 64)
    }

    #[test]
    fn dynamic_growth_never_exceeds_max() {
        let mut buffer = Buffer::with_limits(small());
        assert_eq!(buffer.capacity(), 0);

        buffer.append(&[1; 10]).unwrap();
        assert_eq!(buffer.capacity(), 16);

        buffer.append(&[2; 10]).unwrap();
        assert_eq!(buffer.capacity(), 32);

        buffer.append(&[3; 30]).unwrap();
        assert_eq!(buffer.capacity(), 64);
        assert_eq!(buffer.position(), 50);

        let err = buffer.append(&[4; 20]).unwrap_err();
        assert_eq!(err, BufferError::capacity_exceeded(80, 64));

        // the failed append left everything in place
        assert_eq!(buffer.capacity(), 64);
        assert_eq!(buffer.position(), 50);
        buffer.flip();
        let mut expected = vec![1; 10];
        expected.extend_from_slice(&[2; 10]);
        expected.extend_from_slice(&[3; 30]);
        assert_eq!(buffer.as_slice(), &expected[..]);
    }

    #[test]
    fn large_append_grows_by_several_increments() {
        let mut buffer = Buffer::with_limits(small());
        buffer.append(&[7; 40]).unwrap();
        assert_eq!(buffer.capacity(), 48);
        assert_eq!(buffer.remaining(), 8);
    }

    #[test]
    fn fixed_buffer_overflows() {
        let mut buffer = Buffer::fixed_with_limits(8, small()).unwrap();
        assert!(!buffer.is_dynamic());

        buffer.append(b"hello").unwrap();
        assert_eq!(buffer.append(b"1234").unwrap_err(), BufferError::overflow(4, 3));
        buffer.append(b"123").unwrap();
        assert_eq!(buffer.append_byte(b'!').unwrap_err(), BufferError::overflow(1, 0));
        assert_eq!(buffer.capacity(), 8);
    }

    #[test]
    fn fixed_buffer_above_max_is_rejected() {
        let err = Buffer::fixed_with_limits(65, small()).unwrap_err();
        assert_eq!(err, BufferError::capacity_exceeded(65, 64));
    }

    #[test]
    fn flip_read_rewind() {
        let mut buffer = Buffer::with_limits(small());
        buffer.append_str("abc").unwrap();
        buffer.flip();

        assert_eq!(buffer.limit(), 3);
        assert_eq!(buffer.read().unwrap(), b'a');
        assert_eq!(buffer.read().unwrap(), b'b');
        assert_eq!(buffer.remaining(), 1);

        buffer.rewind();
        assert_eq!(buffer.read().unwrap(), b'a');
        assert_eq!(buffer.limit(), 3);
    }

    #[test]
    fn read_on_empty_underflows() {
        let mut buffer = Buffer::with_limits(small());
        assert_eq!(buffer.read().unwrap_err(), BufferError::underflow(1, 0));

        let mut buffer = Buffer::wrap("x");
        buffer.read().unwrap();
        assert!(matches!(buffer.read(), Err(BufferError::Underflow { .. })));

        let mut dst = [0; 4];
        let mut buffer = Buffer::wrap("abc");
        assert_eq!(buffer.read_into(&mut dst).unwrap_err(), BufferError::underflow(4, 3));
        assert_eq!(buffer.position(), 0);
    }

    #[test]
    fn slice_keeps_read_cursor() {
        let mut buffer = Buffer::wrap("hello world");
        buffer.read().unwrap();
        buffer.read().unwrap();

        let mut world = buffer.slice(6, 5).unwrap();
        assert_eq!(buffer.position(), 2);
        assert_eq!(buffer.limit(), 11);
        assert_eq!(world.take_string().as_deref(), Some("world"));

        assert!(matches!(buffer.slice(8, 5), Err(BufferError::OutOfBounds { .. })));
    }

    #[test]
    fn transfer_to_writer() {
        let mut buffer = Buffer::wrap("payload");
        let mut out = Vec::new();
        assert_eq!(buffer.transfer_to(&mut out).unwrap(), 7);
        assert_eq!(out, b"payload");
        assert_eq!(buffer.transfer_to(&mut out).unwrap(), 0);

        let mut empty = Buffer::new();
        assert_eq!(empty.transfer_to(&mut out).unwrap(), 0);
    }

    #[test]
    fn transfer_reports_partial_writes() {
        struct Trickle(Vec<u8>);

        impl io::Write for Trickle {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                let n = buf.len().min(3);
                self.0.extend_from_slice(&buf[..n]);
                Ok(n)
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut buffer = Buffer::wrap("abcdefg");
        let mut sink = Trickle(Vec::new());
        assert_eq!(buffer.transfer_to(&mut sink).unwrap(), 3);
        assert_eq!(buffer.position(), 3);
        assert_eq!(buffer.as_slice(), b"defg");
    }

    #[tokio::test]
    async fn transfer_to_async_writer() {
        let mut buffer = Buffer::wrap("async");
        let mut out: Vec<u8> = Vec::new();
        assert_eq!(buffer.transfer_to_async(&mut out).await.unwrap(), 5);
        assert_eq!(out, b"async");
    }

    #[test]
    fn ordering_puts_empty_first() {
        let empty = Buffer::new();
        let abc = Buffer::wrap("abc");
        let abd = Buffer::wrap("abd");

        assert!(empty < abc);
        assert!(abc < abd);
        assert_eq!(abc.cmp(&Buffer::wrap("abc")), Ordering::Equal);
        assert_eq!(empty, Buffer::wrap(""));
    }

    #[test]
    fn clear_drops_store_and_reallocates() {
        let mut buffer = Buffer::with_limits(small());
        buffer.append(b"abc").unwrap();
        buffer.clear();
        assert_eq!(buffer.capacity(), 0);
        assert_eq!(format!("{buffer:?}"), "Buffer(<EMPTY>)");

        buffer.append(b"de").unwrap();
        assert_eq!(buffer.capacity(), 16);

        let mut fixed = Buffer::fixed_with_limits(4, small()).unwrap();
        fixed.clear();
        fixed.append(b"wxyz").unwrap();
        assert_eq!(fixed.capacity(), 4);
    }

    #[test]
    fn freeze_keeps_remaining_bytes() {
        let mut buffer = Buffer::wrap("#frozen");
        buffer.read().unwrap();
        assert_eq!(buffer.freeze(), Bytes::from_static(b"frozen"));
        assert_eq!(Bytes::from(Buffer::new()), Bytes::new());
    }

    #[test]
    fn append_buffer_consumes_source() {
        let mut target = Buffer::with_limits(small());
        let mut source = Buffer::wrap("copy me");
        target.append_buffer(&mut source).unwrap();
        assert!(source.is_empty());
        target.flip();
        assert_eq!(target.take_string().as_deref(), Some("copy me"));
    }

    #[test]
    fn implements_buf() {
        let mut buffer = Buffer::wrap("0123456789");
        buffer.advance(4);
        assert_eq!(buffer.chunk(), b"456789");
        assert_eq!(buffer.get_u8(), b'4');
        assert_eq!(Buf::remaining(&buffer), 5);
    }
}
