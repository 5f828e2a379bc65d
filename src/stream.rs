//! Byte sources backing response bodies
//!
//! A [`ResourceStream`] is a plain [`Read`] plus a "may block" hint. Streams
//! that may block are only ever read on the worker lane.

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

use bytes::{Buf, Bytes};
use tracing::warn;

pub trait ResourceStream: Read + Send {
    /// True if a read may wait on disk or another slow source
    fn may_block(&self) -> bool {
        false
    }
}

/// In-memory stream over shared bytes
#[derive(Debug, Clone)]
pub struct MemoryStream {
    data: Bytes,
}

impl MemoryStream {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn remaining(&self) -> usize {
        self.data.remaining()
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.data.remaining());
        self.data.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

impl ResourceStream for MemoryStream {}

/// Stream over a regular file on disk
#[derive(Debug)]
pub struct FileStream {
    file: File,
}

impl FileStream {
    /// Open `path` for reading. Fails for anything but a regular file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if !file.metadata()?.is_file() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }
        Ok(Self { file })
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl ResourceStream for FileStream {
    fn may_block(&self) -> bool {
        true
    }
}

/// Stream driven by a caller-supplied read function
pub struct CallbackStream<F> {
    read: F,
    may_block: bool,
}

impl<F> CallbackStream<F>
where
    F: FnMut(&mut [u8]) -> io::Result<usize> + Send,
{
    pub fn new(read: F) -> Self {
        Self {
            read,
            may_block: false,
        }
    }

    /// Route reads through the worker lane
    pub fn blocking(mut self) -> Self {
        self.may_block = true;
        self
    }
}

impl<F> Read for CallbackStream<F>
where
    F: FnMut(&mut [u8]) -> io::Result<usize> + Send,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (self.read)(buf)
    }
}

impl<F> ResourceStream for CallbackStream<F>
where
    F: FnMut(&mut [u8]) -> io::Result<usize> + Send,
{
    fn may_block(&self) -> bool {
        self.may_block
    }
}

/// Read until `buf` is full or the stream reports end of data.
///
/// Read errors end the stream: the bytes gathered so far are returned.
pub fn fill(stream: &mut dyn ResourceStream, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(error = %err, filled, "Stream read failed, treating as end of data");
                break;
            }
        }
    }
    filled
}
