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

//! The memo (`.FPT`) file.
//!
//! Memo storage is block-addressed.  The file starts with one header block
//! holding the next free block number and the block size, both big-endian
//! unlike everything in the table file.  Each stored memo begins on a block
//! boundary with an eight-byte chunk header (type, then payload length) and
//! occupies as many consecutive blocks as it needs.
//!
//! Allocation is append-only.  Rewriting a memo allocates fresh blocks and
//! abandons the old ones; orphaned blocks are tolerated and never reclaimed.

use std::io::Cursor;

use binrw::{BinRead, BinWrite};
use tracing::{debug, trace};

use crate::{
    error::{Error, Result},
    io::PositionedIo,
};

/// Bytes of chunk header preceding each memo payload.
pub const CHUNK_HEADER_SIZE: u32 = 8;

/// Block size used by [MemoFile::create] unless overridden.
pub const DEFAULT_BLOCK_SIZE: u16 = 64;

/// Chunk type of a text memo.
const CHUNK_TEXT: u32 = 1;

/// The memo-file header, big-endian on disk.
#[derive(BinRead, BinWrite)]
#[brw(big)]
struct RawMemoHeader {
    next_free_block: u32,
    reserved: [u8; 2],
    block_size: u16,
}

/// The decoded memo-file header.
#[derive(Copy, Clone, Debug)]
pub struct MemoHeader {
    /// Block number where the next memo will be written.
    pub next_free_block: u32,
    /// Size of one block in bytes.
    pub block_size: u16,
}

/// An open memo file over some byte storage.
pub struct MemoFile {
    io: Box<dyn PositionedIo>,
    header: MemoHeader,
    write_lock: bool,
}

impl MemoFile {
    /// Opens an existing memo file and decodes its header.
    pub fn open(mut io: Box<dyn PositionedIo>, write_lock: bool) -> Result<Self> {
        let mut bytes = [0; 8];
        io.read_at(0, &mut bytes)?;
        let raw = RawMemoHeader::read_be(&mut Cursor::new(&bytes[..]))?;
        if raw.block_size == 0 {
            return Err(Error::corrupt("memo block size is zero"));
        }
        debug!(
            next_free_block = raw.next_free_block,
            block_size = raw.block_size,
            "opened memo file"
        );
        Ok(Self {
            io,
            header: MemoHeader {
                next_free_block: raw.next_free_block,
                block_size: raw.block_size,
            },
            write_lock,
        })
    }

    /// Creates a new memo file: a header block announcing `block_size` and
    /// block 1 as the first free block.
    pub fn create(io: Box<dyn PositionedIo>, block_size: u16, write_lock: bool) -> Result<Self> {
        if block_size < 8 {
            return Err(Error::invalid_configuration(format!(
                "memo block size {block_size} is smaller than the header"
            )));
        }
        let header = MemoHeader {
            next_free_block: 1,
            block_size,
        };
        let mut this = Self {
            io,
            header,
            write_lock,
        };
        this.write_header()?;
        this.io.set_len(block_size as u64)?;
        Ok(this)
    }

    /// The decoded header.
    pub fn header(&self) -> &MemoHeader {
        &self.header
    }

    /// Reads the memo starting at `block`.  Returns the payload and
    /// whether the chunk says it holds text.
    pub fn read(&mut self, block: u32) -> Result<(Vec<u8>, bool)> {
        let offset = block as u64 * self.header.block_size as u64;
        let mut chunk = [0; 8];
        self.io.read_at(offset, &mut chunk)?;
        let chunk_type = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let length = u32::from_be_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
        let available = self.io.len()?.saturating_sub(offset + 8);
        if length as u64 > available {
            return Err(Error::corrupt(format!(
                "memo at block {block} claims {length} bytes but only {available} remain"
            )));
        }
        let mut payload = vec![0; length as usize];
        self.io.read_at(offset + 8, &mut payload)?;
        trace!(block, length, chunk_type, "read memo");
        Ok((payload, chunk_type == CHUNK_TEXT))
    }

    /// Appends a memo and returns its block number.
    ///
    /// The payload is written before the header update, so a failure in
    /// between leaves the new blocks orphaned but the file consistent.
    pub fn append(&mut self, payload: &[u8], is_text: bool) -> Result<u32> {
        let block_size = self.header.block_size as u64;
        let block = if self.header.next_free_block == 0 {
            // A zero free pointer means the header was never maintained;
            // fall back to the block count implied by the file length.
            (self.io.len()?.div_ceil(block_size)).max(1) as u32
        } else {
            self.header.next_free_block
        };
        let required =
            (payload.len() as u64 + CHUNK_HEADER_SIZE as u64).div_ceil(block_size) as u32;

        let start = block as u64 * block_size;
        let end = (block + required) as u64 * block_size;
        if self.write_lock {
            self.io.lock_range(start..end)?;
        }
        let result = self.append_locked(block, required, start, end, payload, is_text);
        if self.write_lock {
            self.io.unlock_range(start..end)?;
        }
        result
    }

    fn append_locked(
        &mut self,
        block: u32,
        required: u32,
        start: u64,
        end: u64,
        payload: &[u8],
        is_text: bool,
    ) -> Result<u32> {
        let chunk_type: u32 = if is_text { CHUNK_TEXT } else { 0 };
        let mut bytes = Vec::with_capacity(8 + payload.len());
        bytes.extend_from_slice(&chunk_type.to_be_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(payload);
        self.io.write_at(start, &bytes)?;
        if self.io.len()? < end {
            self.io.set_len(end)?;
        }
        self.header.next_free_block = block + required;
        self.write_header()?;
        debug!(block, blocks = required, bytes = payload.len(), "appended memo");
        Ok(block)
    }

    /// Replaces a memo.  The old blocks are never reclaimed; this is an
    /// append under a different name and returns the new block number.
    pub fn rewrite(&mut self, _old_block: u32, payload: &[u8], is_text: bool) -> Result<u32> {
        self.append(payload, is_text)
    }

    fn write_header(&mut self) -> Result<()> {
        let raw = RawMemoHeader {
            next_free_block: self.header.next_free_block,
            reserved: [0; 2],
            block_size: self.header.block_size,
        };
        let mut cursor = Cursor::new(Vec::with_capacity(8));
        raw.write_be(&mut cursor)?;
        self.io.write_at(0, &cursor.into_inner())
    }

    /// Closes the backing storage.
    pub fn close(&mut self) -> Result<()> {
        self.io.close()
    }

    /// Consumes the memo file, returning its storage.
    pub fn into_io(self) -> Box<dyn PositionedIo> {
        self.io
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, io::Memory};

    fn new_memo(block_size: u16) -> MemoFile {
        MemoFile::create(Box::new(Memory::default()), block_size, false).unwrap()
    }

    #[test]
    fn create_pads_to_one_block() {
        let mut memo = new_memo(512);
        assert_eq!(memo.io.len().unwrap(), 512);
        assert_eq!(memo.header().next_free_block, 1);
        assert_eq!(memo.header().block_size, 512);
    }

    #[test]
    fn append_layout_matches_the_format() {
        let mut memo = new_memo(512);
        let block = memo.append(b"hello", true).unwrap();
        assert_eq!(block, 1);

        let mut chunk = [0; 13];
        memo.io.read_at(512, &mut chunk).unwrap();
        assert_eq!(&chunk[..4], &[0, 0, 0, 1]);
        assert_eq!(&chunk[4..8], &[0, 0, 0, 5]);
        assert_eq!(&chunk[8..], b"hello");
        assert_eq!(memo.header().next_free_block, 2);
    }

    #[test]
    fn append_is_monotonic() {
        let mut memo = new_memo(64);
        let mut previous_free = memo.header().next_free_block;
        for size in [1_usize, 55, 56, 57, 200, 0] {
            let block = memo.append(&vec![0xAB; size], false).unwrap();
            assert!(block >= previous_free);
            previous_free = memo.header().next_free_block;
            assert!(previous_free > block);
        }
    }

    #[test]
    fn multi_block_round_trip() {
        let mut memo = new_memo(64);
        let payload: Vec<u8> = (0..200).map(|i| i as u8).collect();
        let block = memo.append(&payload, false).unwrap();
        // 208 bytes of chunk occupy four 64-byte blocks.
        assert_eq!(memo.header().next_free_block, block + 4);
        let (read, is_text) = memo.read(block).unwrap();
        assert_eq!(read, payload);
        assert!(!is_text);
    }

    #[test]
    fn rewrite_never_reclaims() {
        let mut memo = new_memo(64);
        let old = memo.append(b"first", true).unwrap();
        let new = memo.rewrite(old, b"second", true).unwrap();
        assert_ne!(old, new);
        let (still_there, _) = memo.read(old).unwrap();
        assert_eq!(still_there, b"first");
        let (replacement, _) = memo.read(new).unwrap();
        assert_eq!(replacement, b"second");
    }

    #[test]
    fn header_round_trip() {
        let mut memo = new_memo(128);
        memo.append(b"x", true).unwrap();
        let io = memo.into_io();
        let reopened = MemoFile::open(io, false).unwrap();
        assert_eq!(reopened.header().block_size, 128);
        assert_eq!(reopened.header().next_free_block, 2);
    }

    #[test]
    fn oversize_length_is_corrupt() {
        let mut memo = new_memo(64);
        let block = memo.append(b"ok", true).unwrap();
        let offset = block as u64 * 64;
        memo.io.write_at(offset + 4, &[0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert!(matches!(
            memo.read(block),
            Err(ref e) if matches!(e.kind(), ErrorKind::Corrupt(_))
        ));
    }
}
