use pin_project_lite::pin_project;
use std::io;
use std::num::NonZeroU64;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};

/// Publish the running total once every this many chunks.
///
/// With the usual 64KiB transport chunks that is roughly one visible update
/// per 6.4MB.
pub const DEFAULT_SAMPLING_RATE: NonZeroU64 = NonZeroU64::new(100).unwrap();

/// Shared, read-only view of a [`Sampled`] reader's published byte count.
///
/// Cheap to clone; every clone observes the same value.
#[derive(Clone, Debug, Default)]
pub struct Progress(Arc<AtomicU64>);
impl Progress {
    /// Last published byte count. Lags behind the real count by up to
    /// `rate - 1` chunks.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn publish(&self, total: u64) {
        self.0.store(total, Ordering::Relaxed);
    }
}

pin_project! {
    /// Pass-through reader counting every byte read from `inner`.
    ///
    /// The exact count advances on every chunk (every read that returned
    /// data), but the value visible through [`Progress`] is only refreshed
    /// once every `rate` chunks to keep the overhead of observers bounded.
    ///
    /// Implements both the Tokio and the `futures` flavours of `AsyncRead`,
    /// depending on what the wrapped reader implements.
    pub struct Sampled<R> {
        #[pin]
        inner: R,
        progress: Progress,
        rate: NonZeroU64,
        chunks: u64,
        total: u64,
    }
}

impl<R> Sampled<R> {
    pub fn new(inner: R, rate: NonZeroU64) -> Self {
        Self {
            inner,
            progress: Progress::default(),
            rate,
            chunks: 0,
            total: 0,
        }
    }

    /// Handle for observers (typically a progress timer).
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    /// Exact number of bytes read so far, regardless of sampling.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of non-empty reads so far.
    pub fn chunks(&self) -> u64 {
        self.chunks
    }
}

/// Shared bookkeeping for both `AsyncRead` flavours.
fn record(chunks: &mut u64, total: &mut u64, rate: NonZeroU64, progress: &Progress, bytes: usize) {
    if bytes == 0 {
        return;
    }
    *total += bytes as u64;
    *chunks += 1;
    if *chunks % rate.get() == 0 {
        progress.publish(*total);
    }
}

impl<R: tokio::io::AsyncRead> tokio::io::AsyncRead for Sampled<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        ready!(this.inner.poll_read(cx, buf))?;
        let bytes = buf.filled().len() - before;
        record(this.chunks, this.total, *this.rate, this.progress, bytes);
        Poll::Ready(Ok(()))
    }
}

impl<R: futures::io::AsyncRead> futures::io::AsyncRead for Sampled<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        let this = self.project();
        let bytes = ready!(this.inner.poll_read(cx, buf))?;
        record(this.chunks, this.total, *this.rate, this.progress, bytes);
        Poll::Ready(Ok(bytes))
    }
}
