use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use tokio::io::AsyncWrite;

use hoard_core::HoardResult;

/// [`AsyncWrite`] over an async "push one chunk" callback.
///
/// Each `write` hands the callback exactly the bytes it was given. The push
/// runs behind the write: it is driven to completion by the next write, a
/// flush, or shutdown, and its error surfaces there.
pub struct PushWriter<F, Fut> {
    push: F,
    in_flight: Option<Pin<Box<Fut>>>,
}

impl<F, Fut> PushWriter<F, Fut>
where
    F: FnMut(Bytes) -> Fut + Unpin,
    Fut: Future<Output = HoardResult<()>>,
{
    pub fn new(push: F) -> Self {
        Self {
            push,
            in_flight: None,
        }
    }

    fn poll_in_flight(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if let Some(fut) = self.in_flight.as_mut() {
            let result = ready!(fut.as_mut().poll(cx));
            self.in_flight = None;
            result?;
        }
        Poll::Ready(Ok(()))
    }
}

impl<F, Fut> AsyncWrite for PushWriter<F, Fut>
where
    F: FnMut(Bytes) -> Fut + Unpin,
    Fut: Future<Output = HoardResult<()>>,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_in_flight(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        this.in_flight = Some(Box::pin((this.push)(Bytes::copy_from_slice(buf))));
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_in_flight(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_in_flight(cx)
    }
}
