//! hoard-stream: adapters between byte I/O and framed transports
//!
//! - [`PullReader`]: `AsyncRead` over a stream of chunks
//! - [`PushWriter`]: `AsyncWrite` over a push callback
//! - [`copy_chunked`]: fixed-size re-blocking between the two
//! - [`Streamer`]: concurrent send/receive pumps with shared cancellation

pub mod chunked;
pub mod reader;
pub mod streamer;
pub mod writer;

pub use chunked::{copy_chunked, read_full};
pub use reader::PullReader;
pub use streamer::{StreamCount, Streamer, DEFAULT_STREAM_CHUNK_SIZE};
pub use writer::PushWriter;
