//! Duplex pumping between local I/O and a framed transport
//!
//! ```text
//!  reader ──▶ [send pump] ──▶ sink        (chunk_size frames, sink closed at EOF)
//!  source ──▶ [recv pump] ──▶ writer
//! ```
//!
//! Both pumps run concurrently in the calling task and share a
//! cancellation token: the first failure cancels the other pump, and both are
//! always joined before [`Streamer::stream`] returns.

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use hoard_core::{HoardError, HoardResult};

use crate::chunked::read_full;

/// Client-side default frame payload size.
pub const DEFAULT_STREAM_CHUNK_SIZE: usize = 64 << 10;

/// Bytes moved by each pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamCount {
    pub read: u64,
    pub written: u64,
}

#[derive(Debug, Clone)]
pub struct Streamer {
    chunk_size: usize,
    cancel: CancellationToken,
}

impl Default for Streamer {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_CHUNK_SIZE)
    }
}

impl Streamer {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Tie this streamer to an outer token; cancelling it stops both pumps.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Read `reader` to the end, sending it through `sink` in frames of
    /// `chunk_size` bytes, then close the sink. Returns bytes read.
    pub async fn from_reader<R, Si, E>(&self, reader: R, sink: Si) -> HoardResult<u64>
    where
        R: AsyncRead + Unpin,
        Si: Sink<Bytes, Error = E> + Unpin,
        HoardError: From<E>,
    {
        cancellable(&self.cancel, self.send_pump(reader, sink)).await
    }

    /// Receive frames from `source` until it ends, writing each to `writer`.
    /// Returns bytes written.
    pub async fn to_writer<S, W>(&self, source: S, writer: W) -> HoardResult<u64>
    where
        S: Stream<Item = HoardResult<Bytes>> + Unpin,
        W: AsyncWrite + Unpin,
    {
        cancellable(&self.cancel, recv_pump(source, writer)).await
    }

    /// Run both pumps to completion, concurrently.
    pub async fn stream<R, Si, E, S, W>(
        &self,
        reader: R,
        sink: Si,
        source: S,
        writer: W,
    ) -> HoardResult<StreamCount>
    where
        R: AsyncRead + Unpin,
        Si: Sink<Bytes, Error = E> + Unpin,
        HoardError: From<E>,
        S: Stream<Item = HoardResult<Bytes>> + Unpin,
        W: AsyncWrite + Unpin,
    {
        let token = self.cancel.child_token();
        let send = async {
            let result = cancellable(&token, self.send_pump(reader, sink)).await;
            if result.is_err() {
                token.cancel();
            }
            result
        };
        let recv = async {
            let result = cancellable(&token, recv_pump(source, writer)).await;
            if result.is_err() {
                token.cancel();
            }
            result
        };

        let (sent, received) = tokio::join!(send, recv);
        match (sent, received) {
            (Ok(read), Ok(written)) => Ok(StreamCount { read, written }),
            // prefer the failure that caused the cancellation
            (Err(HoardError::Cancelled), Err(e)) | (Err(e), _) | (_, Err(e)) => {
                tracing::debug!(error = %e, "stream pump failed");
                Err(e)
            }
        }
    }

    async fn send_pump<R, Si, E>(&self, mut reader: R, mut sink: Si) -> HoardResult<u64>
    where
        R: AsyncRead + Unpin,
        Si: Sink<Bytes, Error = E> + Unpin,
        HoardError: From<E>,
    {
        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0u64;
        loop {
            let n = read_full(&mut reader, &mut buf).await?;
            if n > 0 {
                sink.send(Bytes::copy_from_slice(&buf[..n])).await?;
                total += n as u64;
            }
            if n < buf.len() {
                break;
            }
        }
        sink.close().await?;
        Ok(total)
    }
}

async fn recv_pump<S, W>(mut source: S, mut writer: W) -> HoardResult<u64>
where
    S: Stream<Item = HoardResult<Bytes>> + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = 0u64;
    while let Some(chunk) = source.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        total += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(total)
}

async fn cancellable<T>(
    token: &CancellationToken,
    pump: impl std::future::Future<Output = HoardResult<T>>,
) -> HoardResult<T> {
    // an already-cancelled token wins over a pump that is ready
    tokio::select! {
        biased;
        () = token.cancelled() => Err(HoardError::Cancelled),
        result = pump => result,
    }
}
