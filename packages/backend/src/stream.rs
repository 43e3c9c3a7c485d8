//! Lazy chunked byte streams returned by [`Backend::read`](crate::Backend::read).

use std::io::{self, Read};

use bytes::Bytes;

use crate::BackendError;

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// A finite, non-restartable sequence of byte chunks.
pub type ByteStream = Box<dyn Iterator<Item = Result<Bytes, BackendError>> + Send>;

/// Adapts any [`Read`] into a chunk iterator.
pub struct ReadChunks<R> {
    reader: R,
    path: String,
    chunk_size: usize,
    done: bool,
}

impl<R: Read> ReadChunks<R> {
    pub fn new(reader: R, path: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            reader,
            path: path.into(),
            chunk_size: chunk_size.max(1),
            done: false,
        }
    }
}

impl<R: Read> Iterator for ReadChunks<R> {
    type Item = Result<Bytes, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            match self.reader.read(&mut buffer) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(n) => {
                    buffer.truncate(n);
                    return Some(Ok(Bytes::from(buffer)));
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    self.done = true;
                    return Some(Err(BackendError::io(self.path.clone(), error)));
                }
            }
        }
    }
}

/// Drain a stream into a single buffer.
pub fn collect_bytes(stream: ByteStream) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    for chunk in stream {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}
