use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::io::{AsyncRead, ReadBuf};

use hoard_core::HoardResult;

/// [`AsyncRead`] over a stream of byte chunks.
///
/// Reads smaller than a pulled chunk are served from an internal buffer.
/// Once the source ends (or fails) it is never polled again and every
/// further read reports end-of-stream.
pub struct PullReader<S> {
    source: S,
    buffer: Bytes,
    done: bool,
}

impl<S> PullReader<S>
where
    S: Stream<Item = HoardResult<Bytes>> + Unpin,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffer: Bytes::new(),
            done: false,
        }
    }
}

impl<S> AsyncRead for PullReader<S>
where
    S: Stream<Item = HoardResult<Bytes>> + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if !this.buffer.is_empty() {
                let n = buf.remaining().min(this.buffer.len());
                buf.put_slice(&this.buffer.split_to(n));
                return Poll::Ready(Ok(()));
            }
            if this.done {
                return Poll::Ready(Ok(()));
            }
            match ready!(Pin::new(&mut this.source).poll_next(cx)) {
                Some(Ok(chunk)) => this.buffer = chunk,
                Some(Err(e)) => {
                    this.done = true;
                    return Poll::Ready(Err(e.into()));
                }
                None => this.done = true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use hoard_core::HoardError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = HoardResult<Bytes>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_small_reads_do_not_lose_data() {
        let mut reader = PullReader::new(chunks(&[b"hello ", b"", b"world"]));
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = reader.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn test_never_polls_after_eof() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let source = stream::poll_fn(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(if n == 0 {
                Some(Ok::<_, HoardError>(Bytes::from_static(b"once")))
            } else {
                None
            })
        });
        let mut reader = PullReader::new(Box::pin(source));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"once");

        let before = polls.load(Ordering::SeqCst);
        let mut buf = [0u8; 8];
        for _ in 0..3 {
            assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
        }
        assert_eq!(polls.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_error_surfaces_as_hoard_error() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"ok")),
            Err(HoardError::protocol("bad frame")),
        ]);
        let mut reader = PullReader::new(source);
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.unwrap_err();
        assert!(matches!(HoardError::from(err), HoardError::ProtocolViolation(_)));
    }
}
