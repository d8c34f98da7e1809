// xbase - a library for reading and writing FoxPro/dBase table files.
// Copyright (C) 2025 Free Software Foundation, Inc.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! Random-access byte storage.
//!
//! Every table and memo codec in this crate reads and writes its backing
//! store exclusively through [PositionedIo].  Three backends are provided:
//! [OsFile] for real files (with whole-file exclusive locks and, on unix,
//! advisory byte-range locks), [Memory] for growable in-memory buffers, and
//! [Stream] for any caller-supplied `Read + Write + Seek`.
//!
//! Locking is an optional capability.  The trait's lock operations default
//! to no-ops, which is the correct behavior for backends that cannot be
//! shared between processes.

use std::{
    fs::{File, OpenOptions},
    io::{Error as IoError, ErrorKind, Read, Seek, SeekFrom, Write},
    ops::Range,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::{Error, Result};

/// Uniform random-access reads and writes over some byte storage.
pub trait PositionedIo: Send {
    /// Fills `buf` from `offset`.  Reading short is an
    /// [Incomplete](crate::error::ErrorKind::Incomplete) error carrying the byte count
    /// actually transferred.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Writes all of `data` at `offset`, extending the storage if the write
    /// ends past the current length.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Current storage length in bytes.
    fn len(&mut self) -> Result<u64>;

    /// Truncates or zero-extends the storage to exactly `len` bytes.
    fn set_len(&mut self, len: u64) -> Result<()>;

    /// Takes an exclusive whole-file lock, failing if another process holds
    /// one.  No-op for backends invisible to other processes.
    fn lock_exclusive(&mut self) -> Result<()> {
        Ok(())
    }

    /// Takes an advisory lock on a byte range.
    fn lock_range(&mut self, _range: Range<u64>) -> Result<()> {
        Ok(())
    }

    /// Releases an advisory byte-range lock.
    fn unlock_range(&mut self, _range: Range<u64>) -> Result<()> {
        Ok(())
    }

    /// Releases locks and closes the storage.  Idempotent; operations after
    /// close fail with an I/O error.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

fn closed_error() -> Error {
    Error::from(IoError::new(ErrorKind::Other, "file is closed"))
}

/// A [PositionedIo] over an operating-system file.
pub struct OsFile {
    file: Option<File>,
    path: PathBuf,
}

impl OsFile {
    /// Opens an existing file, read-only if `read_only`.
    pub fn open(path: impl AsRef<Path>, read_only: bool) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), read_only, "opening file");
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)?;
        Ok(Self {
            file: Some(file),
            path: path.into(),
        })
    }

    /// Creates a new file, truncating any existing one.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "creating file");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: Some(file),
            path: path.into(),
        })
    }

    /// The path this file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or_else(closed_error)
    }
}

#[cfg(unix)]
fn range_lock(file: &File, range: &Range<u64>, kind: libc::c_short) -> Result<()> {
    use std::os::unix::io::AsRawFd;

    let mut lock: libc::flock = unsafe { std::mem::zeroed() };
    lock.l_type = kind;
    lock.l_whence = libc::SEEK_SET as libc::c_short;
    lock.l_start = range.start as libc::off_t;
    lock.l_len = (range.end - range.start) as libc::off_t;
    if unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETLKW, &lock) } == -1 {
        return Err(Error::from(IoError::last_os_error()));
    }
    Ok(())
}

impl PositionedIo for OsFile {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let file = self.file()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut n = 0;
        while n < buf.len() {
            match file.read(&mut buf[n..]) {
                Ok(0) => return Err(Error::incomplete("read", offset, n, buf.len())),
                Ok(count) => n += count,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let file = self.file()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut n = 0;
        while n < data.len() {
            match file.write(&data[n..]) {
                Ok(0) => return Err(Error::incomplete("write", offset, n, data.len())),
                Ok(count) => n += count,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        Ok(self.file()?.set_len(len)?)
    }

    #[cfg(unix)]
    fn lock_exclusive(&mut self) -> Result<()> {
        use std::os::unix::io::AsRawFd;

        let file = self.file()?;
        if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } == -1 {
            let e = IoError::last_os_error();
            return Err(Error::from(IoError::new(
                e.kind(),
                format!("cannot lock {} exclusively: {e}", self.path.display()),
            )));
        }
        Ok(())
    }

    #[cfg(unix)]
    fn lock_range(&mut self, range: Range<u64>) -> Result<()> {
        let file = self.file()?;
        range_lock(file, &range, libc::F_WRLCK as libc::c_short)
    }

    #[cfg(unix)]
    fn unlock_range(&mut self, range: Range<u64>) -> Result<()> {
        let file = self.file()?;
        range_lock(file, &range, libc::F_UNLCK as libc::c_short)
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle releases every advisory lock.
        self.file.take();
        Ok(())
    }
}

/// A [PositionedIo] over a growable in-memory buffer.
///
/// Writes past the end zero-fill the gap, matching the behavior of file
/// backends.  Lock operations are no-ops.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Wraps `data`.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// The current contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the backend, returning the buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl PositionedIo for Memory {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(Error::incomplete(
                "read",
                offset,
                self.data.len().saturating_sub(start),
                buf.len(),
            ));
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + data.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.data.resize(len as usize, 0);
        Ok(())
    }
}

/// A [PositionedIo] over any seekable stream.
///
/// Lock operations are no-ops, and shrinking [set_len](PositionedIo::set_len)
/// requests are ignored because generic streams cannot truncate; growth
/// happens through ordinary zero writes.
pub struct Stream<S> {
    inner: S,
}

impl<S> Stream<S>
where
    S: Read + Write + Seek + Send,
{
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Consumes the backend, returning the stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> PositionedIo for Stream<S>
where
    S: Read + Write + Seek + Send,
{
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        let mut n = 0;
        while n < buf.len() {
            match self.inner.read(&mut buf[n..]) {
                Ok(0) => return Err(Error::incomplete("read", offset, n, buf.len())),
                Ok(count) => n += count,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.write_all(data)?;
        Ok(())
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.inner.seek(SeekFrom::End(0))?)
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        let current = self.len()?;
        if len > current {
            let zeros = vec![0; (len - current) as usize];
            self.write_at(current, &zeros)?;
        }
        Ok(())
    }
}
