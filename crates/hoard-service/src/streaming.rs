//! Streaming operations over typed message streams.
//!
//! Every operation reads its input from a `Stream` of frames and writes its
//! output to a `Sink`, so the same service runs behind an RPC transport or
//! in process (see [`crate::client`]). Operations that return a single value
//! (`put_seal`, `seal`, `reseal`, `stat`) return it directly. Output sinks are
//! closed when an operation completes successfully.

use std::future::Future;

use bytes::Bytes;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use hoard_core::types::{clamp_chunk_size, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use hoard_core::{HoardError, HoardResult, Plaintext, RefType, Reference};
use hoard_grant::{Grant, GrantSpec};

use crate::frames::{AddressStat, PlaintextAndGrantSpec, ReferenceAndCiphertext, ReferenceAndGrantSpec};
use crate::hoard::Hoard;
use crate::link::{body_only, chunk_body, decode, decode_refs, encode_header, header_reference, link, link_nonce};

/// Result of storing one plaintext stream.
struct Stored {
    refs: Vec<Reference>,
    salt: Vec<u8>,
    length: u64,
}

#[derive(Clone)]
pub struct StreamingService {
    hoard: Hoard,
    chunk_size: usize,
}

impl StreamingService {
    pub fn new(hoard: Hoard) -> Self {
        Self {
            hoard,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Chunk size used when a stream's header does not request one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn hoard(&self) -> &Hoard {
        &self.hoard
    }

    /// Store a plaintext stream and return a grant over it.
    ///
    /// The first frame must carry the grant spec and may carry a header; the
    /// stored chunks are always gathered under one LINK object so the grant
    /// holds a single reference.
    pub async fn put_seal<S>(&self, mut recv: S) -> HoardResult<Grant>
    where
        S: Stream<Item = HoardResult<PlaintextAndGrantSpec>> + Unpin,
    {
        let first = first_frame(&mut recv).await?;
        let spec = first
            .grant_spec
            .ok_or_else(|| HoardError::protocol("grant spec expected in first message"))?;
        spec.validate()?;

        let rest = recv.map(|frame: HoardResult<PlaintextAndGrantSpec>| -> HoardResult<Bytes> {
            let frame = frame?;
            if frame.grant_spec.is_some() {
                return Err(HoardError::protocol(
                    "received multiple grant specs but there can be at most one",
                ));
            }
            body_only(frame.plaintext)
        });
        let stored = self
            .store_stream(first.plaintext, rest, |_| future::ready(Ok::<_, HoardError>(())))
            .await?;

        let nonce = link_nonce(spec.link_nonce());
        let top = link(&self.hoard, &stored.refs, &stored.salt, &nonce).await?;
        let grant = self.hoard.seal(&[top], spec)?;
        info!(
            kind = grant.spec.kind(),
            refs = stored.refs.len(),
            bytes = stored.length,
            "stored and sealed stream"
        );
        Ok(grant)
    }

    /// Unseal `grant` and stream back the plaintext it covers.
    pub async fn unseal_get<Si>(&self, grant: &Grant, mut out: Si) -> HoardResult<()>
    where
        Si: Sink<Plaintext> + Unpin,
        HoardError: From<Si::Error>,
    {
        let refs = self.hoard.unseal(grant)?;
        decode_refs(&self.hoard, &refs, self.chunk_size, &mut out).await?;
        out.close().await?;
        Ok(())
    }

    /// Delete the objects a grant refers to directly, sending each deleted
    /// address.
    ///
    /// Only the grant's top-level references are removed. For grants written
    /// by [`Self::put_seal`] that is the LINK object; the chunks behind it may
    /// be shared with other grants through deduplication and are left alone.
    pub async fn unseal_delete<Si>(&self, grant: &Grant, mut out: Si) -> HoardResult<()>
    where
        Si: Sink<Vec<u8>> + Unpin,
        HoardError: From<Si::Error>,
    {
        let refs = self.hoard.unseal(grant)?;
        let count = refs.len();
        for reference in refs {
            self.hoard.delete(&reference.address).await?;
            out.send(reference.address).await?;
        }
        info!(kind = grant.spec.kind(), deleted = count, "deleted grant objects");
        out.close().await?;
        Ok(())
    }

    /// Store a plaintext stream, sending each reference as it is created:
    /// the header's first, then one per chunk.
    pub async fn put<S, Si>(&self, mut recv: S, out: Si) -> HoardResult<()>
    where
        S: Stream<Item = HoardResult<Plaintext>> + Unpin,
        Si: Sink<Reference> + Unpin,
        HoardError: From<Si::Error>,
    {
        let first = first_frame(&mut recv).await?;
        let rest = recv.map(|frame| frame.and_then(body_only));
        let out = Mutex::new(out);
        let sink = &out;
        let stored = self
            .store_stream(first, rest, move |reference| async move {
                sink.lock().await.send(reference).await?;
                Ok::<_, HoardError>(())
            })
            .await?;
        debug!(refs = stored.refs.len(), bytes = stored.length, "stored stream");
        out.into_inner().close().await?;
        Ok(())
    }

    /// Fetch and decode each received reference.
    pub async fn get<S, Si>(&self, mut recv: S, mut out: Si) -> HoardResult<()>
    where
        S: Stream<Item = HoardResult<Reference>> + Unpin,
        Si: Sink<Plaintext> + Unpin,
        HoardError: From<Si::Error>,
    {
        while let Some(reference) = recv.next().await {
            let reference = reference?;
            let data = self.hoard.get(&reference).await?;
            decode(&self.hoard, data, reference.ref_type, self.chunk_size, &mut out).await?;
        }
        out.close().await?;
        Ok(())
    }

    /// Chunk and encrypt a plaintext stream without storing anything.
    pub async fn encrypt<S, Si>(&self, mut recv: S, out: Si) -> HoardResult<()>
    where
        S: Stream<Item = HoardResult<Plaintext>> + Unpin,
        Si: Sink<ReferenceAndCiphertext> + Unpin,
        HoardError: From<Si::Error>,
    {
        let Plaintext { head, body } = first_frame(&mut recv).await?;
        let out = Mutex::new(out);
        let (salt, chunk_size) = match &head {
            Some(head) => {
                let (reference, ciphertext) = self.hoard.encrypt(&encode_header(head)?, &head.salt)?;
                let reference = reference.with_type(RefType::Header);
                out.lock()
                    .await
                    .send(ReferenceAndCiphertext { reference, ciphertext })
                    .await?;
                (head.salt.clone(), clamp_chunk_size(head.chunk_size, self.chunk_size))
            }
            None => (Vec::new(), self.chunk_size),
        };

        let rest = recv.map(|frame| frame.and_then(body_only));
        let (hoard, salt, sink) = (&self.hoard, &salt[..], &out);
        chunk_body(body, rest, chunk_size, move |block: Bytes| async move {
            let (reference, ciphertext) = hoard.encrypt(&block, salt)?;
            sink.lock()
                .await
                .send(ReferenceAndCiphertext { reference, ciphertext })
                .await?;
            Ok::<_, HoardError>(())
        })
        .await?;
        out.into_inner().close().await?;
        Ok(())
    }

    /// Decrypt each received ciphertext and decode it. LINK members are
    /// fetched from the store.
    pub async fn decrypt<S, Si>(&self, mut recv: S, mut out: Si) -> HoardResult<()>
    where
        S: Stream<Item = HoardResult<ReferenceAndCiphertext>> + Unpin,
        Si: Sink<Plaintext> + Unpin,
        HoardError: From<Si::Error>,
    {
        while let Some(frame) = recv.next().await {
            let ReferenceAndCiphertext { reference, ciphertext } = frame?;
            let data = self.hoard.decrypt(&reference, &ciphertext)?;
            decode(&self.hoard, data, reference.ref_type, self.chunk_size, &mut out).await?;
        }
        out.close().await?;
        Ok(())
    }

    /// Store already-encrypted blobs, sending back their addresses.
    pub async fn push<S, Si>(&self, mut recv: S, mut out: Si) -> HoardResult<()>
    where
        S: Stream<Item = HoardResult<Vec<u8>>> + Unpin,
        Si: Sink<Vec<u8>> + Unpin,
        HoardError: From<Si::Error>,
    {
        while let Some(ciphertext) = recv.next().await {
            let address = self.hoard.store().put(ciphertext?).await?;
            out.send(address).await?;
        }
        out.close().await?;
        Ok(())
    }

    /// Fetch raw ciphertext for each received address.
    pub async fn pull<S, Si>(&self, mut recv: S, mut out: Si) -> HoardResult<()>
    where
        S: Stream<Item = HoardResult<Vec<u8>>> + Unpin,
        Si: Sink<Vec<u8>> + Unpin,
        HoardError: From<Si::Error>,
    {
        while let Some(address) = recv.next().await {
            let ciphertext = self.hoard.store().get(&address?).await?;
            out.send(ciphertext).await?;
        }
        out.close().await?;
        Ok(())
    }

    /// Seal a stream of references. The grant spec must arrive in the first frame
    /// and nowhere else.
    pub async fn seal<S>(&self, mut recv: S) -> HoardResult<Grant>
    where
        S: Stream<Item = HoardResult<ReferenceAndGrantSpec>> + Unpin,
    {
        let first = first_frame(&mut recv).await?;
        let spec = first
            .grant_spec
            .ok_or_else(|| HoardError::protocol("grant spec expected in first message"))?;

        let mut refs: Vec<Reference> = first.reference.into_iter().collect();
        while let Some(frame) = recv.next().await {
            let frame = frame?;
            if frame.grant_spec.is_some() {
                return Err(HoardError::protocol(
                    "received multiple grant specs but there can be at most one",
                ));
            }
            refs.extend(frame.reference);
        }
        self.hoard.seal(&refs, spec)
    }

    pub async fn unseal<Si>(&self, grant: &Grant, mut out: Si) -> HoardResult<()>
    where
        Si: Sink<Reference> + Unpin,
        HoardError: From<Si::Error>,
    {
        for reference in self.hoard.unseal(grant)? {
            out.send(reference).await?;
        }
        out.close().await?;
        Ok(())
    }

    pub async fn reseal(&self, grant: &Grant, spec: GrantSpec) -> HoardResult<Grant> {
        self.hoard.reseal(grant, spec)
    }

    pub async fn stat(&self, address: &[u8]) -> HoardResult<AddressStat> {
        let stat = self.hoard.stat(address).await?;
        Ok(AddressStat {
            address: address.to_vec(),
            location: self.hoard.store().location(address),
            stat,
        })
    }

    pub async fn delete(&self, address: &[u8]) -> HoardResult<()> {
        self.hoard.delete(address).await
    }

    /// Store the header (if any) and the chunked body of one plaintext
    /// stream, handing every new reference to `emit` in stream order.
    async fn store_stream<S, E, EFut>(&self, first: Plaintext, rest: S, emit: E) -> HoardResult<Stored>
    where
        S: Stream<Item = HoardResult<Bytes>> + Unpin,
        E: Fn(Reference) -> EFut,
        EFut: Future<Output = HoardResult<()>>,
    {
        let Plaintext { head, body } = first;
        let mut refs = Vec::new();
        let (salt, chunk_size) = match &head {
            Some(head) => {
                let reference = header_reference(&self.hoard, head).await?;
                emit(reference.clone()).await?;
                refs.push(reference);
                (head.salt.clone(), clamp_chunk_size(head.chunk_size, self.chunk_size))
            }
            None => (Vec::new(), self.chunk_size),
        };

        let collected = Mutex::new(refs);
        let (hoard, salt_ref, emit, refs_ref) = (&self.hoard, &salt[..], &emit, &collected);
        let length = chunk_body(body, rest, chunk_size, move |block: Bytes| async move {
            let reference = hoard.put(&block, salt_ref).await?;
            refs_ref.lock().await.push(reference.clone());
            emit(reference).await
        })
        .await?;

        Ok(Stored {
            refs: collected.into_inner(),
            salt,
            length,
        })
    }
}

async fn first_frame<S, T>(recv: &mut S) -> HoardResult<T>
where
    S: Stream<Item = HoardResult<T>> + Unpin,
{
    match recv.next().await {
        Some(frame) => frame,
        None => Err(HoardError::protocol("expected at least one message")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::stream;
    use hoard_core::Header;
    use hoard_secrets::SecretsManager;
    use hoard_storage::OperatorStore;
    use std::sync::Arc;

    fn service() -> StreamingService {
        let op = opendal::Operator::new(opendal::services::Memory::default())
            .expect("memory operator")
            .finish();
        let hoard = Hoard::from_backend(Arc::new(OperatorStore::new(op)), SecretsManager::noop(), 127);
        StreamingService::new(hoard).with_chunk_size(4)
    }

    type TestSink<T> = futures::sink::SinkMapErr<mpsc::UnboundedSender<T>, fn(mpsc::SendError) -> HoardError>;

    fn channel<T>() -> (TestSink<T>, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded();
        (tx.sink_map_err(cancelled as fn(mpsc::SendError) -> HoardError), rx)
    }

    fn cancelled(_: mpsc::SendError) -> HoardError {
        HoardError::Cancelled
    }

    fn frames<T>(items: Vec<T>) -> impl Stream<Item = HoardResult<T>> + Unpin {
        stream::iter(items.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn test_put_seal_requires_spec_first() {
        let svc = service();
        let err = svc
            .put_seal(frames(vec![PlaintextAndGrantSpec::body(&b"no spec"[..])]))
            .await
            .unwrap_err();
        assert!(matches!(err, HoardError::ProtocolViolation(m) if m.contains("first message")));
    }

    #[tokio::test]
    async fn test_put_seal_rejects_second_spec() {
        let svc = service();
        let err = svc
            .put_seal(frames(vec![
                PlaintextAndGrantSpec::open(GrantSpec::plaintext(), None),
                PlaintextAndGrantSpec::open(GrantSpec::plaintext(), None),
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, HoardError::ProtocolViolation(m) if m.contains("at most one")));
    }

    #[tokio::test]
    async fn test_empty_stream_is_protocol_violation() {
        let svc = service();
        let err = svc.put_seal(frames(Vec::new())).await.unwrap_err();
        assert!(matches!(err, HoardError::ProtocolViolation(_)));
        let (tx, _rx) = channel();
        let err = svc.put(frames(Vec::new()), tx).await.unwrap_err();
        assert!(matches!(err, HoardError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn test_put_seal_unseal_get() {
        let svc = service();
        let head = Header {
            salt: b"pepper".to_vec(),
            data: b"buns.txt".to_vec(),
            chunk_size: 3,
        };
        let grant = svc
            .put_seal(frames(vec![
                PlaintextAndGrantSpec::open(GrantSpec::plaintext(), Some(head.clone())),
                PlaintextAndGrantSpec::body(&b"hot "[..]),
                PlaintextAndGrantSpec::body(&b"buns"[..]),
            ]))
            .await
            .unwrap();

        let refs = svc.hoard().unseal(&grant).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].ref_type, RefType::Link);

        let (tx, rx) = channel();
        svc.unseal_get(&grant, tx).await.unwrap();
        let out: Vec<Plaintext> = rx.collect().await;
        assert_eq!(out[0].head.as_ref(), Some(&head));
        let body: Vec<u8> = out[1..].iter().flat_map(|f| f.body.to_vec()).collect();
        assert_eq!(body, b"hot buns");
    }

    #[tokio::test]
    async fn test_put_streams_refs_and_get_decodes() {
        let svc = service();
        let (tx, rx) = channel();
        svc.put(
            frames(vec![Plaintext::body(&b"0123"[..]), Plaintext::body(&b"456789"[..])]),
            tx,
        )
        .await
        .unwrap();
        let refs: Vec<Reference> = rx.collect().await;
        let sizes: Vec<_> = refs.iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![4, 4, 2]);

        let (tx, rx) = channel();
        svc.get(frames(refs), tx).await.unwrap();
        let out: Vec<Plaintext> = rx.collect().await;
        let body: Vec<u8> = out.iter().flat_map(|f| f.body.to_vec()).collect();
        assert_eq!(body, b"0123456789");
    }

    #[tokio::test]
    async fn test_header_in_later_frame_rejected() {
        let svc = service();
        let (tx, _rx) = channel();
        let err = svc
            .put(
                frames(vec![Plaintext::body(&b"data"[..]), Plaintext::header(Header::default())]),
                tx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HoardError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_without_storing() {
        let svc = service();
        let head = Header {
            salt: b"nacl".to_vec(),
            ..Header::default()
        };
        let (tx, rx) = channel();
        svc.encrypt(
            frames(vec![
                Plaintext {
                    head: Some(head.clone()),
                    body: Bytes::from_static(b"ephemeral"),
                },
            ]),
            tx,
        )
        .await
        .unwrap();
        let encrypted: Vec<ReferenceAndCiphertext> = rx.collect().await;
        assert_eq!(encrypted[0].reference.ref_type, RefType::Header);
        assert_eq!(encrypted.len(), 1 + 3);
        for frame in &encrypted {
            assert!(!svc.stat(&frame.reference.address).await.unwrap().stat.exists);
        }

        let (tx, rx) = channel();
        svc.decrypt(frames(encrypted), tx).await.unwrap();
        let out: Vec<Plaintext> = rx.collect().await;
        assert_eq!(out[0].head.as_ref(), Some(&head));
        let body: Vec<u8> = out[1..].iter().flat_map(|f| f.body.to_vec()).collect();
        assert_eq!(body, b"ephemeral");
    }

    #[tokio::test]
    async fn test_push_pull_stat_delete() {
        let svc = service();
        let (tx, rx) = channel();
        svc.push(frames(vec![b"opaque ciphertext".to_vec()]), tx).await.unwrap();
        let addresses: Vec<Vec<u8>> = rx.collect().await;
        assert_eq!(addresses.len(), 1);

        let stat = svc.stat(&addresses[0]).await.unwrap();
        assert!(stat.stat.exists);
        assert_eq!(stat.stat.size, 17);
        assert!(stat.location.starts_with("memory://"));

        let (tx, rx) = channel();
        svc.pull(frames(addresses.clone()), tx).await.unwrap();
        let blobs: Vec<Vec<u8>> = rx.collect().await;
        assert_eq!(blobs, vec![b"opaque ciphertext".to_vec()]);

        svc.delete(&addresses[0]).await.unwrap();
        assert!(!svc.stat(&addresses[0]).await.unwrap().stat.exists);
    }

    #[tokio::test]
    async fn test_seal_unseal_reseal() {
        let svc = service();
        let data = svc.hoard().put(b"sealed", b"").await.unwrap();
        let grant = svc
            .seal(frames(vec![ReferenceAndGrantSpec {
                reference: Some(data.clone()),
                grant_spec: Some(GrantSpec::plaintext()),
            }]))
            .await
            .unwrap();

        let (tx, rx) = channel();
        svc.unseal(&grant, tx).await.unwrap();
        let refs: Vec<Reference> = rx.collect().await;
        assert_eq!(refs, vec![data.clone()]);

        let resealed = svc.reseal(&grant, GrantSpec::plaintext()).await.unwrap();
        assert_eq!(svc.hoard().unseal(&resealed).unwrap(), vec![data]);
    }

    #[tokio::test]
    async fn test_seal_spec_rules() {
        let svc = service();
        let missing = svc
            .seal(frames(vec![ReferenceAndGrantSpec::default()]))
            .await
            .unwrap_err();
        assert!(matches!(missing, HoardError::ProtocolViolation(m) if m.contains("first message")));

        let spec = ReferenceAndGrantSpec {
            reference: None,
            grant_spec: Some(GrantSpec::plaintext()),
        };
        let twice = svc.seal(frames(vec![spec.clone(), spec])).await.unwrap_err();
        assert!(matches!(twice, HoardError::ProtocolViolation(m) if m.contains("at most one")));
    }

    #[tokio::test]
    async fn test_unseal_delete_removes_link_only() {
        let svc = service();
        let grant = svc
            .put_seal(frames(vec![
                PlaintextAndGrantSpec::open(GrantSpec::plaintext(), None),
                PlaintextAndGrantSpec::body(&b"keep me"[..]),
            ]))
            .await
            .unwrap();
        let top = svc.hoard().unseal(&grant).unwrap().remove(0);

        let (tx, rx) = channel();
        svc.unseal_delete(&grant, tx).await.unwrap();
        let deleted: Vec<Vec<u8>> = rx.collect().await;
        assert_eq!(deleted, vec![top.address.clone()]);
        assert!(!svc.stat(&top.address).await.unwrap().stat.exists);

        // chunk behind the link survives
        let (chunk, _) = svc.hoard().encrypt(b"keep", b"").unwrap();
        assert!(svc.stat(&chunk.address).await.unwrap().stat.exists);
    }
}
