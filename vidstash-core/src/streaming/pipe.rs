//! Bounded byte pipes between a producer task and a consumer.
//!
//! The producer suspends once `capacity` chunks are queued and the consumer
//! suspends while the pipe is empty, so memory use stays constant with
//! respect to payload size. Dropping the consuming side stops the producer.

use std::io::{self, SeekFrom};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Receiving half of a byte pipe.
pub type ChunkReceiver<E> = mpsc::Receiver<Result<Bytes, E>>;

/// Spawns a task that reads `length` bytes of `file` starting at `start`.
///
/// Chunks are at most `chunk_size` bytes. A read error, or the file ending
/// before `length` bytes were produced, is delivered as the final item.
pub fn spawn_file_reader(
    file: File,
    start: u64,
    length: u64,
    chunk_size: usize,
    capacity: usize,
) -> ChunkReceiver<io::Error> {
    file_reader_task(file, start, length, chunk_size, capacity).0
}

/// The reader task's handle completes once the file has been closed.
fn file_reader_task(
    mut file: File,
    start: u64,
    length: u64,
    chunk_size: usize,
    capacity: usize,
) -> (ChunkReceiver<io::Error>, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let chunk_size = chunk_size.max(1);

    let task = tokio::spawn(async move {
        if start > 0 {
            if let Err(e) = file.seek(SeekFrom::Start(start)).await {
                let _ = sender.send(Err(e)).await;
                return;
            }
        }

        let mut remaining = length;
        while remaining > 0 {
            let want = remaining.min(chunk_size as u64) as usize;
            let mut buffer = BytesMut::zeroed(want);

            let read = match file.read(&mut buffer).await {
                Ok(0) => {
                    let _ = sender
                        .send(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("file ended with {remaining} bytes left to serve"),
                        )))
                        .await;
                    return;
                }
                Ok(read) => read,
                Err(e) => {
                    let _ = sender.send(Err(e)).await;
                    return;
                }
            };

            buffer.truncate(read);
            remaining -= read as u64;
            if sender.send(Ok(buffer.freeze())).await.is_err() {
                tracing::debug!("Reader dropped with {} bytes unsent, stopping", remaining);
                return;
            }
        }
    });

    (receiver, task)
}

/// Adapts the receiving half of a pipe into a `Stream`.
pub fn receiver_stream<E>(receiver: ChunkReceiver<E>) -> impl Stream<Item = Result<Bytes, E>>
where
    E: Send + 'static,
{
    futures::stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|item| (item, receiver))
    })
}

/// Errors raised while draining a pipe into a writer.
#[derive(Debug, thiserror::Error)]
pub enum DrainError<E> {
    /// The producer reported a failure.
    #[error("source failed: {0}")]
    Source(E),

    /// Writing to the sink failed.
    #[error("write failed: {0}")]
    Sink(#[source] io::Error),
}

/// Writes every chunk from `receiver` to `writer` in arrival order.
///
/// Returns the number of bytes written once the producer closes the pipe
/// and the writer has been flushed. On any error the receiver is dropped,
/// which stops the producer.
///
/// # Errors
/// - `DrainError::Source` - The producer delivered an error
/// - `DrainError::Sink` - Writing or flushing failed
pub async fn drain_to_writer<E, W>(
    mut receiver: ChunkReceiver<E>,
    writer: &mut W,
) -> Result<u64, DrainError<E>>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(item) = receiver.recv().await {
        let chunk = item.map_err(DrainError::Source)?;
        writer.write_all(&chunk).await.map_err(DrainError::Sink)?;
        written += chunk.len() as u64;
    }
    writer.flush().await.map_err(DrainError::Sink)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::storage::test_fixtures::{create_temp_storage_root, write_media_file};

    async fn collect(receiver: ChunkReceiver<io::Error>) -> io::Result<Vec<u8>> {
        let mut stream = Box::pin(receiver_stream(receiver));
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn test_file_reader_serves_exact_interval() {
        let (_temp_dir, root) = create_temp_storage_root();
        let payload = write_media_file(&root, "range.mp4", 10_000);
        let file = File::open(root.path().join("range.mp4")).await.unwrap();

        let receiver = spawn_file_reader(file, 1234, 5000, 1024, 2);
        let body = collect(receiver).await.unwrap();

        assert_eq!(body, payload[1234..6234]);
    }

    #[tokio::test]
    async fn test_file_reader_chunks_are_bounded() {
        let (_temp_dir, root) = create_temp_storage_root();
        write_media_file(&root, "chunks.mp4", 4096);
        let file = File::open(root.path().join("chunks.mp4")).await.unwrap();

        let mut receiver = spawn_file_reader(file, 0, 4096, 1000, 1);
        let mut sizes = Vec::new();
        while let Some(chunk) = receiver.recv().await {
            sizes.push(chunk.unwrap().len());
        }

        assert!(sizes.iter().all(|&size| size <= 1000));
        assert_eq!(sizes.iter().sum::<usize>(), 4096);
    }

    #[tokio::test]
    async fn test_file_reader_reports_truncated_file() {
        let (_temp_dir, root) = create_temp_storage_root();
        write_media_file(&root, "short.mp4", 100);
        let file = File::open(root.path().join("short.mp4")).await.unwrap();

        let receiver = spawn_file_reader(file, 0, 200, 64, 4);
        let err = collect(receiver).await.unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_file_reader_stops_when_consumer_disconnects() {
        let (_temp_dir, root) = create_temp_storage_root();
        write_media_file(&root, "long.mp4", 1 << 20);
        let file = File::open(root.path().join("long.mp4")).await.unwrap();

        let (mut receiver, task) = file_reader_task(file, 0, 1 << 20, 1024, 1);
        let first = receiver.recv().await.unwrap().unwrap();
        assert_eq!(first.len(), 1024);
        drop(receiver);

        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("reader kept running after the consumer went away")
            .unwrap();
    }

    #[tokio::test]
    async fn test_drain_preserves_order() {
        let (sender, receiver) = mpsc::channel::<Result<Bytes, io::Error>>(1);
        tokio::spawn(async move {
            for part in [&b"first "[..], b"second ", b"third"] {
                sender.send(Ok(Bytes::from_static(part))).await.unwrap();
            }
        });

        let mut sink = Vec::new();
        let written = drain_to_writer(receiver, &mut sink).await.unwrap();

        assert_eq!(written, 18);
        assert_eq!(sink, b"first second third");
    }

    #[tokio::test]
    async fn test_drain_stops_on_source_error() {
        let (sender, receiver) = mpsc::channel::<Result<Bytes, String>>(4);
        sender.send(Ok(Bytes::from_static(b"partial"))).await.unwrap();
        sender.send(Err("connection reset".to_string())).await.unwrap();
        drop(sender);

        let mut sink = Vec::new();
        let result = drain_to_writer(receiver, &mut sink).await;

        assert!(matches!(result, Err(DrainError::Source(reason)) if reason == "connection reset"));
        assert_eq!(sink, b"partial");
    }
}
