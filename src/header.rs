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

//! The fixed 32-byte table header.
//!
//! The header identifies the file dialect, carries the record count and
//! geometry (`first_record_offset`, `row_size`) that every record access is
//! computed from, and names the code page of the file's text.  It is
//! rewritten after every successful append or in-place update to stamp the
//! last-modified date, and after appends to bump the record count.

use std::io::Cursor;

use binrw::{BinRead, BinWrite};
use chrono::{Datelike, NaiveDate};
use flagset::{flags, FlagSet};
use serde::Serialize;

use crate::{
    error::{Error, Result},
    io::PositionedIo,
};

/// Marks the end of the column-descriptor list.
pub const COLUMN_TERMINATOR: u8 = 0x0D;

/// Trailing byte written after the last record.
pub const EOF_MARKER: u8 = 0x1A;

/// Size of the fixed header prefix and of each column descriptor.
pub const HEADER_SIZE: usize = 32;

/// The file-version byte at offset zero.
///
/// The FoxPro family is what this crate is tested against; the older
/// dialects are recognized but only opened when the caller passes the
/// `untested` flag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum FileVersion {
    /// FoxPro (0x30).
    FoxPro,
    /// FoxPro with autoincrement columns (0x31).
    FoxProAutoincrement,
    /// FoxPro with variable-length columns (0x32).
    FoxProVar,
    /// FoxBase (0x02).
    FoxBase,
    /// FoxBase+ / dBase III (0x03).
    FoxBasePlus,
    /// dBase IV SQL table (0x43).
    DBaseSqlTable,
    /// FoxBase+ with memo file (0x83).
    FoxBasePlusMemo,
    /// dBase IV with memo file (0x8B).
    DBaseMemo,
    /// dBase IV SQL with memo file (0xCB).
    DBaseSqlMemo,
    /// FoxPro 2 with memo file (0xF5).
    FoxPro2Memo,
    /// FoxBase 2 (0xFB).
    FoxBase2,
    /// Any other version byte.
    Other(u8),
}

impl From<u8> for FileVersion {
    fn from(byte: u8) -> Self {
        match byte {
            0x30 => Self::FoxPro,
            0x31 => Self::FoxProAutoincrement,
            0x32 => Self::FoxProVar,
            0x02 => Self::FoxBase,
            0x03 => Self::FoxBasePlus,
            0x43 => Self::DBaseSqlTable,
            0x83 => Self::FoxBasePlusMemo,
            0x8B => Self::DBaseMemo,
            0xCB => Self::DBaseSqlMemo,
            0xF5 => Self::FoxPro2Memo,
            0xFB => Self::FoxBase2,
            other => Self::Other(other),
        }
    }
}

impl FileVersion {
    /// The on-disk version byte.
    pub fn byte(self) -> u8 {
        match self {
            Self::FoxPro => 0x30,
            Self::FoxProAutoincrement => 0x31,
            Self::FoxProVar => 0x32,
            Self::FoxBase => 0x02,
            Self::FoxBasePlus => 0x03,
            Self::DBaseSqlTable => 0x43,
            Self::FoxBasePlusMemo => 0x83,
            Self::DBaseMemo => 0x8B,
            Self::DBaseSqlMemo => 0xCB,
            Self::FoxPro2Memo => 0xF5,
            Self::FoxBase2 => 0xFB,
            Self::Other(byte) => byte,
        }
    }

    /// True for the FoxPro dialects this crate is tested against.
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            Self::FoxPro | Self::FoxProAutoincrement | Self::FoxProVar
        )
    }

    /// Errors unless the version is supported or `untested` is set.
    pub fn validate(self, untested: bool) -> Result<()> {
        if untested || self.is_supported() {
            Ok(())
        } else {
            Err(Error::invalid_version(self.byte()))
        }
    }
}

flags! {
    /// The table-flags byte of the header.
    pub enum TableFlag: u8 {
        /// The table has a structural index.
        Structural = 0x01,
        /// The table has an associated memo file.
        Memo = 0x02,
        /// The table belongs to a database container.
        Database = 0x04,
    }
}

/// The header exactly as stored on disk, little-endian.
#[derive(BinRead, BinWrite)]
#[brw(little)]
struct RawHeader {
    version: u8,
    year: u8,
    month: u8,
    day: u8,
    record_count: u32,
    first_record_offset: u16,
    row_size: u16,
    reserved: [u8; 16],
    table_flags: u8,
    code_page_mark: u8,
    reserved2: [u8; 2],
}

const FALLBACK_DATE: NaiveDate = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();

/// The decoded table header.
#[derive(Clone, Debug)]
pub struct Header {
    /// File dialect.
    pub version: FileVersion,
    /// Date of the last modification, stored as `(YY-1900, MM, DD)`.
    pub last_modified: NaiveDate,
    /// Number of records in the table.
    pub record_count: u32,
    /// Byte offset of record zero; also the total header length.
    pub first_record_offset: u16,
    /// Fixed width of every record, including the deletion marker.
    pub row_size: u16,
    /// Table flags.
    pub table_flags: FlagSet<TableFlag>,
    /// Code-page mark identifying the text encoding.
    pub code_page_mark: u8,
}

impl Header {
    /// Builds a header for a new, empty table.  `column_count` is the
    /// number of real descriptors including any synthesized null-flag
    /// column; `row_size` likewise includes everything.
    pub fn new(
        version: FileVersion,
        column_count: usize,
        row_size: u16,
        code_page_mark: u8,
        today: NaiveDate,
        has_memo: bool,
    ) -> Self {
        let first_record_offset = (HEADER_SIZE + HEADER_SIZE * column_count + 1) as u16;
        let mut table_flags = FlagSet::default();
        if has_memo {
            table_flags |= TableFlag::Memo;
        }
        Self {
            version,
            last_modified: today,
            record_count: 0,
            first_record_offset,
            row_size,
            table_flags,
            code_page_mark,
        }
    }

    /// Reads and decodes the 32-byte header prefix.
    pub fn read(io: &mut dyn PositionedIo) -> Result<Self> {
        let mut bytes = [0; HEADER_SIZE];
        io.read_at(0, &mut bytes)?;
        let raw = RawHeader::read_le(&mut Cursor::new(&bytes[..]))?;
        let last_modified = NaiveDate::from_ymd_opt(
            1900 + raw.year as i32,
            raw.month as u32,
            raw.day as u32,
        )
        .unwrap_or(FALLBACK_DATE);
        Ok(Self {
            version: raw.version.into(),
            last_modified,
            record_count: raw.record_count,
            first_record_offset: raw.first_record_offset,
            row_size: raw.row_size,
            table_flags: FlagSet::new_truncated(raw.table_flags),
            code_page_mark: raw.code_page_mark,
        })
    }

    /// Serializes and writes the 32-byte header prefix.
    pub fn write(&self, io: &mut dyn PositionedIo) -> Result<()> {
        let raw = RawHeader {
            version: self.version.byte(),
            year: (self.last_modified.year() - 1900).clamp(0, 255) as u8,
            month: self.last_modified.month() as u8,
            day: self.last_modified.day() as u8,
            record_count: self.record_count,
            first_record_offset: self.first_record_offset,
            row_size: self.row_size,
            reserved: [0; 16],
            table_flags: self.table_flags.bits(),
            code_page_mark: self.code_page_mark,
            reserved2: [0; 2],
        };
        let mut cursor = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        raw.write_le(&mut cursor)?;
        io.write_at(0, &cursor.into_inner())
    }

    /// Sets the last-modified date.
    pub fn stamp(&mut self, date: NaiveDate) {
        self.last_modified = date;
    }

    /// Byte offset of the record at `index`.
    pub fn record_offset(&self, index: u32) -> u64 {
        self.first_record_offset as u64 + index as u64 * self.row_size as u64
    }

    /// Expected file length: header, records, and the EOF marker.
    pub fn expected_len(&self) -> u64 {
        self.record_offset(self.record_count) + 1
    }

    /// True if the table flags announce a memo file.
    pub fn has_memo(&self) -> bool {
        self.table_flags.contains(TableFlag::Memo)
    }

    /// Number of column descriptors implied by `first_record_offset`.
    ///
    /// The offset covers the 32-byte prefix, one 32-byte descriptor per
    /// column, and the terminator byte, so disagreement with the actual
    /// descriptor list is a corruption signal.
    pub fn implied_column_count(&self) -> usize {
        (self.first_record_offset as usize)
            .saturating_sub(HEADER_SIZE + 1)
            / HEADER_SIZE
    }
}
