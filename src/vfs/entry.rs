//! Readers over zip entries that share one open archive file.
//!
//! Every reader reads at its own offset, so any number of them progress
//! concurrently without locking. Stored entries are a window onto the
//! archive; deflated entries are decoded as they are read.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use flate2::read::DeflateDecoder;

/// Positional cursor over a shared file; clones keep separate offsets
#[derive(Debug, Clone)]
pub struct SharedFile {
    file: Arc<File>,
    len: u64,
    pos: u64,
}

impl SharedFile {
    pub fn new(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            file: Arc::new(file),
            len,
            pos: 0,
        })
    }

    /// Read into `buf` at `offset` without touching the cursor
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        positional_read(&self.file, buf, offset)
    }

    pub fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(buf, offset)? {
                0 => return Err(io::ErrorKind::UnexpectedEof.into()),
                n => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(windows)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

impl Read for SharedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SharedFile {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        self.pos = seek_target(self.pos, self.len, from)?;
        Ok(self.pos)
    }
}

/// Uncompressed entry occupying `size` bytes from `start`
#[derive(Debug)]
pub struct StoredEntry {
    file: SharedFile,
    start: u64,
    size: u64,
    pos: u64,
}

impl StoredEntry {
    pub const fn new(file: SharedFile, start: u64, size: u64) -> Self {
        Self {
            file,
            start,
            size,
            pos: 0,
        }
    }
}

impl Read for StoredEntry {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.size.saturating_sub(self.pos);
        let max = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        if max == 0 {
            return Ok(0);
        }
        let n = self.file.read_at(&mut buf[..max], self.start + self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for StoredEntry {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        self.pos = seek_target(self.pos, self.size, from)?;
        Ok(self.pos)
    }
}

/// Deflate-compressed entry
///
/// Seeking forward discards decoded output; seeking backward restarts the
/// decoder from the start of the entry.
pub struct DeflatedEntry {
    file: SharedFile,
    start: u64,
    compressed: u64,
    size: u64,
    pos: u64,
    decoder: DeflateDecoder<io::Take<SharedFile>>,
}

impl std::fmt::Debug for DeflatedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflatedEntry")
            .field("start", &self.start)
            .field("size", &self.size)
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

impl DeflatedEntry {
    pub fn new(file: SharedFile, start: u64, compressed: u64, size: u64) -> io::Result<Self> {
        let decoder = decoder(&file, start, compressed)?;
        Ok(Self {
            file,
            start,
            compressed,
            size,
            pos: 0,
            decoder,
        })
    }

    fn restart(&mut self) -> io::Result<()> {
        self.decoder = decoder(&self.file, self.start, self.compressed)?;
        self.pos = 0;
        Ok(())
    }
}

fn decoder(
    file: &SharedFile,
    start: u64,
    compressed: u64,
) -> io::Result<DeflateDecoder<io::Take<SharedFile>>> {
    let mut raw = file.clone();
    raw.seek(SeekFrom::Start(start))?;
    Ok(DeflateDecoder::new(raw.take(compressed)))
}

impl Read for DeflatedEntry {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decoder.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for DeflatedEntry {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let target = seek_target(self.pos, self.size, from)?;
        if target < self.pos {
            self.restart()?;
        }
        let skip = target - self.pos;
        let skipped = io::copy(&mut self.decoder.by_ref().take(skip), &mut io::sink())?;
        self.pos += skipped;
        Ok(self.pos)
    }
}

fn seek_target(pos: u64, len: u64, from: SeekFrom) -> io::Result<u64> {
    let target = match from {
        SeekFrom::Start(n) => Some(n),
        SeekFrom::End(off) => len.checked_add_signed(off),
        SeekFrom::Current(off) => pos.checked_add_signed(off),
    };
    target.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before start"))
}
