//! In-process client: local readers and writers on one side, the streaming
//! service on the other.
//!
//! Each call runs the client pump and the service operation concurrently in
//! the calling task, connected by a bounded channel. Whichever side fails
//! first ends the call. `put_seal` goes through [`Streamer::stream`], so an
//! outer cancellation token set with [`Client::with_streamer`] also stops it.

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{future, stream, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};

use hoard_core::{HoardError, HoardResult, Header, Plaintext};
use hoard_grant::{Grant, GrantSpec};
use hoard_stream::Streamer;

use crate::frames::PlaintextAndGrantSpec;
use crate::streaming::StreamingService;

/// Frames buffered between the client pump and the service.
const CHANNEL_DEPTH: usize = 8;

#[derive(Clone)]
pub struct Client {
    service: StreamingService,
    streamer: Streamer,
}

impl Client {
    pub fn new(service: StreamingService) -> Self {
        Self {
            service,
            streamer: Streamer::default(),
        }
    }

    pub fn with_streamer(mut self, streamer: Streamer) -> Self {
        self.streamer = streamer;
        self
    }

    pub fn service(&self) -> &StreamingService {
        &self.service
    }

    /// Store everything `reader` yields and return a grant over it.
    ///
    /// The reader is pumped to the service while the reply side waits for
    /// the grant; a failure on either side cancels the other.
    pub async fn put_seal<R>(&self, reader: R, spec: GrantSpec, head: Option<Header>) -> HoardResult<Grant>
    where
        R: AsyncRead + Unpin,
    {
        let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
        let frames = stream::once(future::ready(Ok::<_, HoardError>(PlaintextAndGrantSpec::open(spec, head))))
            .chain(rx.map(|body| Ok(PlaintextAndGrantSpec::body(body))));

        let mut grant = None;
        let reply = stream::once(self.service.put_seal(frames))
            .boxed_local()
            .map(|sealed| {
                sealed.map(|g| {
                    grant = Some(g);
                    Bytes::new()
                })
            });

        let count = self
            .streamer
            .stream(
                reader,
                tx.sink_map_err(|_| HoardError::Cancelled),
                reply,
                tokio::io::sink(),
            )
            .await?;
        tracing::debug!(bytes = count.read, "put_seal complete");
        grant.ok_or_else(|| HoardError::protocol("put_seal finished without a grant"))
    }

    /// Write the plaintext covered by `grant` to `writer`. Returns the
    /// stream's header, if it had one, and the number of body bytes written.
    pub async fn unseal_get<W>(&self, grant: &Grant, writer: W) -> HoardResult<(Option<Header>, u64)>
    where
        W: AsyncWrite + Unpin,
    {
        let (tx, rx) = mpsc::channel::<Plaintext>(CHANNEL_DEPTH);
        let mut head = None;
        let bodies = rx.filter_map(|frame| {
            if frame.head.is_some() {
                head = frame.head;
            }
            future::ready((!frame.body.is_empty()).then_some(Ok(frame.body)))
        });

        let written = {
            let recv = self.streamer.to_writer(bodies, writer);
            let serve = self
                .service
                .unseal_get(grant, tx.sink_map_err(|_| HoardError::Cancelled));
            let ((), written) = tokio::try_join!(serve, recv)?;
            written
        };
        Ok((head, written))
    }
}
