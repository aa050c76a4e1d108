//! Chunking and the link protocol
//!
//! A plaintext stream is stored as an optional HEADER object followed by
//! fixed-size DATA chunks, all encrypted with the header's salt. The
//! resulting references are themselves encoded and stored as a LINK
//! object, so a grant only ever needs to carry one reference:
//!
//! ```text
//! grant ──▶ LINK ──┬──▶ HEADER
//!                  ├──▶ DATA[0]
//!                  ├──▶ ...
//!                  └──▶ DATA[n]
//! ```
//!
//! Decoding walks LINK objects depth first, emitting the header frame and
//! body frames in reference order.

use std::future::Future;

use bytes::Bytes;
use futures::{future, stream, Sink, SinkExt, Stream, StreamExt};
use rand::RngCore;

use hoard_core::reference::{plaintext_from_refs, refs_from_plaintext, LATEST_GRANT_VERSION};
use hoard_core::{HoardError, HoardResult, Header, Plaintext, RefType, Reference};
use hoard_stream::{copy_chunked, PullReader, PushWriter};

use crate::hoard::Hoard;

/// How many LINK objects may be nested inside one another.
pub const MAX_LINK_DEPTH: usize = 8;

/// Length of the random nonce mixed into a LINK object.
pub const LINK_NONCE_SIZE: usize = 12;

/// Nonce for a new LINK object: the caller's, when one was supplied.
pub fn link_nonce(requested: Option<&[u8]>) -> Vec<u8> {
    match requested {
        Some(nonce) if !nonce.is_empty() => nonce.to_vec(),
        _ => {
            let mut nonce = vec![0u8; LINK_NONCE_SIZE];
            rand::thread_rng().fill_bytes(&mut nonce);
            nonce
        }
    }
}

/// Store `refs` as a single LINK object encrypted with `salt`.
pub async fn link(hoard: &Hoard, refs: &[Reference], salt: &[u8], nonce: &[u8]) -> HoardResult<Reference> {
    let plaintext = plaintext_from_refs(refs, nonce)?;
    let reference = hoard.put(&plaintext, salt).await?;
    Ok(reference.with_type(RefType::Link))
}

pub fn encode_header(head: &Header) -> HoardResult<Vec<u8>> {
    Ok(serde_json::to_vec(head)?)
}

pub fn decode_header(data: &[u8]) -> HoardResult<Header> {
    serde_json::from_slice(data).map_err(|_| HoardError::Serialization("failed to decode header".into()))
}

/// Encrypt and store a header under its own salt.
pub async fn header_reference(hoard: &Hoard, head: &Header) -> HoardResult<Reference> {
    let reference = hoard.put(&encode_header(head)?, &head.salt).await?;
    Ok(reference.with_type(RefType::Header))
}

/// Body bytes of a frame that followed the first; only the first frame of a
/// stream may carry a header.
pub(crate) fn body_only(frame: Plaintext) -> HoardResult<Bytes> {
    if frame.head.is_some() {
        return Err(HoardError::protocol(
            "header is only allowed in the first message",
        ));
    }
    Ok(frame.body)
}

/// Re-chunk `first` followed by the bodies in `rest` into blocks of exactly
/// `chunk_size` bytes, handing each block to `push`. Returns the total body
/// length.
pub(crate) async fn chunk_body<S, F, Fut>(first: Bytes, rest: S, chunk_size: usize, push: F) -> HoardResult<u64>
where
    S: Stream<Item = HoardResult<Bytes>> + Unpin,
    F: FnMut(Bytes) -> Fut + Unpin,
    Fut: Future<Output = HoardResult<()>>,
{
    let bodies = stream::once(future::ready(Ok(first))).chain(rest);
    let mut reader = PullReader::new(bodies);
    let mut writer = PushWriter::new(push);
    copy_chunked(&mut reader, &mut writer, chunk_size).await
}

/// Send the plaintext held in `data` to `sink`, following LINK objects.
///
/// Header objects become a header frame; DATA is split into frames of at
/// most `chunk_size` bytes. LINK nesting beyond [`MAX_LINK_DEPTH`] is a
/// protocol violation.
pub async fn decode<Si>(
    hoard: &Hoard,
    data: Vec<u8>,
    ref_type: RefType,
    chunk_size: usize,
    sink: &mut Si,
) -> HoardResult<()>
where
    Si: Sink<Plaintext> + Unpin,
    HoardError: From<Si::Error>,
{
    let mut pending: Vec<std::vec::IntoIter<Reference>> = Vec::new();
    let mut next = Some((data, ref_type));

    loop {
        if let Some((data, ref_type)) = next.take() {
            match ref_type {
                RefType::Header => sink.send(Plaintext::header(decode_header(&data)?)).await?,
                RefType::Data => send_body(sink, Bytes::from(data), chunk_size).await?,
                RefType::Link => {
                    if pending.len() >= MAX_LINK_DEPTH {
                        return Err(HoardError::protocol(format!(
                            "links nested deeper than {MAX_LINK_DEPTH}"
                        )));
                    }
                    pending.push(refs_from_plaintext(&data, LATEST_GRANT_VERSION)?.into_iter());
                }
            }
        }

        let Some(members) = pending.last_mut() else {
            return Ok(());
        };
        match members.next() {
            Some(reference) => {
                let data = hoard.get(&reference).await?;
                next = Some((data, reference.ref_type));
            }
            None => {
                pending.pop();
            }
        }
    }
}

/// Fetch each reference and decode it in order.
pub async fn decode_refs<Si>(hoard: &Hoard, refs: &[Reference], chunk_size: usize, sink: &mut Si) -> HoardResult<()>
where
    Si: Sink<Plaintext> + Unpin,
    HoardError: From<Si::Error>,
{
    for reference in refs {
        let data = hoard.get(reference).await?;
        decode(hoard, data, reference.ref_type, chunk_size, sink).await?;
    }
    Ok(())
}

async fn send_body<Si>(sink: &mut Si, mut body: Bytes, chunk_size: usize) -> HoardResult<()>
where
    Si: Sink<Plaintext> + Unpin,
    HoardError: From<Si::Error>,
{
    let chunk_size = chunk_size.max(1);
    while !body.is_empty() {
        let frame = body.split_to(chunk_size.min(body.len()));
        sink.send(Plaintext::body(frame)).await?;
    }
    Ok(())
}
