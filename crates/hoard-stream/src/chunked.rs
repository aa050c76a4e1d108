use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use hoard_core::HoardResult;

/// Fill `buf` from `reader`, stopping early only at end-of-stream.
pub async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> HoardResult<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Copy everything from `reader` to `writer` in blocks of exactly
/// `chunk_size` bytes; only the final block may be shorter.
///
/// Each block reaches the writer as a single write, so a
/// [`crate::PushWriter`] sees one push per block regardless of how the
/// reader's source was framed. Returns the number of bytes copied.
pub async fn copy_chunked<R, W>(reader: &mut R, writer: &mut W, chunk_size: usize) -> HoardResult<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = read_full(reader, &mut buf).await?;
        if n > 0 {
            writer.write_all(&buf[..n]).await?;
            total += n as u64;
        }
        if n < buf.len() {
            break;
        }
    }
    writer.flush().await?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PullReader, PushWriter};
    use bytes::Bytes;
    use futures::stream;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    async fn chunk_sizes(frames: Vec<Vec<u8>>, chunk_size: usize) -> (u64, Vec<Vec<u8>>) {
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let sink = pushed.clone();
        let mut writer = PushWriter::new(move |chunk: Bytes| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(chunk.to_vec());
                Ok(())
            }
        });
        let mut reader = PullReader::new(stream::iter(
            frames.into_iter().map(|f| Ok(Bytes::from(f))).collect::<Vec<_>>(),
        ));
        let copied = copy_chunked(&mut reader, &mut writer, chunk_size).await.unwrap();
        let pushed = pushed.lock().unwrap().clone();
        (copied, pushed)
    }

    #[tokio::test]
    async fn test_blocks_are_fixed_size() {
        let (copied, pushed) =
            chunk_sizes(vec![vec![1; 7], vec![2; 2], vec![3; 16]], 10).await;
        assert_eq!(copied, 25);
        let lens: Vec<_> = pushed.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_empty_tail() {
        let (copied, pushed) = chunk_sizes(vec![vec![9; 20]], 10).await;
        assert_eq!(copied, 20);
        assert_eq!(pushed.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_input_pushes_nothing() {
        let (copied, pushed) = chunk_sizes(vec![], 10).await;
        assert_eq!(copied, 0);
        assert!(pushed.is_empty());
    }

    proptest! {
        #[test]
        fn prop_reassembles(frames in proptest::collection::vec(
                                proptest::collection::vec(any::<u8>(), 0..300), 0..8),
                            chunk_size in 1usize..256) {
            let expected: Vec<u8> = frames.concat();
            let (copied, pushed) = tokio_test::block_on(chunk_sizes(frames, chunk_size));
            prop_assert_eq!(copied as usize, expected.len());
            prop_assert!(pushed.iter().rev().skip(1).all(|c| c.len() == chunk_size));
            prop_assert_eq!(pushed.concat(), expected);
        }
    }
}
