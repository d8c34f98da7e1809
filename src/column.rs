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

//! Columns and column descriptors.
//!
//! A table's schema is an ordered list of [Column]s, stored on disk as
//! 32-byte descriptors between the header and the terminator byte.  When
//! any column is nullable or variable-length, a hidden `_NullFlags` column
//! is appended to carry one bit per nullable column and one bit per
//! variable-length column; it is synthesized here, never declared by
//! callers.

use std::io::Cursor;

use binrw::{BinRead, BinWrite};
use flagset::{flags, FlagSet};
use serde::Serialize;
use unicase::UniCase;

use crate::{
    error::{Error, Result},
    header::{COLUMN_TERMINATOR, HEADER_SIZE},
    io::PositionedIo,
};

/// Maximum number of columns per table.
pub const MAX_COLUMNS: usize = 255;

/// Maximum width of a character, varchar, or varbinary column.
pub const MAX_CHARACTER_LENGTH: u8 = 254;

/// Maximum width of a numeric or float column.
pub const MAX_NUMERIC_LENGTH: u8 = 20;

/// Maximum record width in bytes.
pub const MAX_RECORD_LENGTH: u32 = 65_500;

/// Maximum length of a column name.
pub const MAX_NAME_LENGTH: usize = 10;

/// Reserved name of the synthesized flag column.
pub const NULL_FLAG_NAME: &str = "_NullFlags";

/// The one-byte type code of a column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DataType {
    /// `C`: fixed-width text.
    Character,
    /// `Y`: fixed-point currency, scaled by 10⁴.
    Currency,
    /// `B`: IEEE-754 double.
    Double,
    /// `D`: `YYYYMMDD` date.
    Date,
    /// `T`: Julian day plus milliseconds since midnight.
    DateTime,
    /// `F`: ASCII floating-point number.
    Float,
    /// `I`: 32-bit little-endian integer.
    Integer,
    /// `L`: logical.
    Logical,
    /// `M`: memo reference.
    Memo,
    /// `N`: ASCII number, integer when `decimals == 0`.
    Numeric,
    /// `W`: binary memo reference.
    Blob,
    /// `G`: OLE memo reference.
    General,
    /// `P`: picture memo reference.
    Picture,
    /// `Q`: variable-length binary.
    Varbinary,
    /// `V`: variable-length text.
    Varchar,
    /// `0`: the hidden null/variable flag column.
    NullFlags,
}

impl DataType {
    /// Decodes a type byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        Ok(match byte {
            0x43 => Self::Character,
            0x59 => Self::Currency,
            0x42 => Self::Double,
            0x44 => Self::Date,
            0x54 => Self::DateTime,
            0x46 => Self::Float,
            0x49 => Self::Integer,
            0x4C => Self::Logical,
            0x4D => Self::Memo,
            0x4E => Self::Numeric,
            0x57 => Self::Blob,
            0x47 => Self::General,
            0x50 => Self::Picture,
            0x51 => Self::Varbinary,
            0x56 => Self::Varchar,
            0x30 => Self::NullFlags,
            other => {
                return Err(Error::unknown_data_type(format!(
                    "unknown column type byte {other:#04x}"
                )))
            }
        })
    }

    /// The on-disk type byte.
    pub fn byte(self) -> u8 {
        match self {
            Self::Character => 0x43,
            Self::Currency => 0x59,
            Self::Double => 0x42,
            Self::Date => 0x44,
            Self::DateTime => 0x54,
            Self::Float => 0x46,
            Self::Integer => 0x49,
            Self::Logical => 0x4C,
            Self::Memo => 0x4D,
            Self::Numeric => 0x4E,
            Self::Blob => 0x57,
            Self::General => 0x47,
            Self::Picture => 0x50,
            Self::Varbinary => 0x51,
            Self::Varchar => 0x56,
            Self::NullFlags => 0x30,
        }
    }

    /// True for types whose slot ends with a length byte when the
    /// variable bit is set.
    pub fn is_variable(self) -> bool {
        matches!(self, Self::Varchar | Self::Varbinary)
    }

    /// True for types whose slot is a four-byte memo block reference.
    pub fn is_memo(self) -> bool {
        matches!(self, Self::Memo | Self::General | Self::Picture | Self::Blob)
    }

    /// The mandatory slot width, for types that have one.
    pub fn fixed_length(self) -> Option<u8> {
        match self {
            Self::Integer => Some(4),
            Self::Logical => Some(1),
            Self::Date | Self::DateTime | Self::Currency | Self::Double => Some(8),
            Self::Memo | Self::General | Self::Picture | Self::Blob => Some(4),
            _ => None,
        }
    }

    fn validate(self, length: u8, decimals: u8) -> Result<()> {
        let bad = |message: String| Err(Error::invalid_configuration(message));
        if let Some(fixed) = self.fixed_length() {
            if length != fixed {
                return bad(format!("{self:?} columns must have length {fixed}"));
            }
            return Ok(());
        }
        match self {
            Self::Character | Self::Varchar | Self::Varbinary => {
                if length == 0 || length > MAX_CHARACTER_LENGTH {
                    return bad(format!(
                        "{self:?} length {length} is not in 1..={MAX_CHARACTER_LENGTH}"
                    ));
                }
            }
            Self::Numeric | Self::Float => {
                if length == 0 || length > MAX_NUMERIC_LENGTH {
                    return bad(format!(
                        "{self:?} length {length} is not in 1..={MAX_NUMERIC_LENGTH}"
                    ));
                }
                if decimals > 0 && decimals + 2 > length {
                    return bad(format!(
                        "{decimals} decimals do not fit a {self:?} column of width {length}"
                    ));
                }
            }
            _ => (),
        }
        Ok(())
    }
}

flags! {
    /// Per-column flag bits of the descriptor.
    pub enum ColumnFlag: u8 {
        /// The column is hidden.
        Hidden = 0x01,
        /// The column may hold null.
        Nullable = 0x02,
        /// The column's bytes bypass code-page translation.
        Binary = 0x04,
        /// The column is auto-incremented on append.
        Autoincrement = 0x08,
    }
}

fn serialize_flags<S>(flags: &FlagSet<ColumnFlag>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u8(flags.bits())
}

/// A column descriptor exactly as stored on disk.
#[derive(BinRead, BinWrite)]
#[brw(little)]
struct RawDescriptor {
    name: [u8; 11],
    data_type: u8,
    position: u32,
    length: u8,
    decimals: u8,
    flags: u8,
    autoincrement_next: u32,
    autoincrement_step: u8,
    reserved: [u8; 8],
}

/// One column of a table.
#[derive(Clone, Debug, Serialize)]
pub struct Column {
    name: String,
    data_type: DataType,
    length: u8,
    decimals: u8,
    #[serde(serialize_with = "serialize_flags")]
    flags: FlagSet<ColumnFlag>,
    autoincrement_next: u32,
    autoincrement_step: u8,
    /// Offset of the column's slot within a record, counted from byte 1.
    #[serde(skip)]
    position: u32,
    /// Bit index in the flag column when nullable.
    #[serde(skip)]
    null_bit: Option<u16>,
    /// Bit index in the flag column when variable-length.
    #[serde(skip)]
    var_bit: Option<u16>,
}

impl Column {
    /// Declares a column.  Enforces the per-type length and decimal rules
    /// and rejects the reserved `_NullFlags` name.
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        length: u8,
        decimals: u8,
        nullable: bool,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return Err(Error::invalid_configuration(format!(
                "column name {name:?} is not 1 to {MAX_NAME_LENGTH} bytes"
            )));
        }
        if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(Error::invalid_configuration(format!(
                "column name {name:?} contains characters outside A-Z, 0-9, and _"
            )));
        }
        if UniCase::new(name.as_str()) == UniCase::new(NULL_FLAG_NAME) {
            return Err(Error::invalid_configuration(format!(
                "column name {NULL_FLAG_NAME:?} is reserved"
            )));
        }
        if data_type == DataType::NullFlags {
            return Err(Error::invalid_configuration(
                "the flag column cannot be declared directly",
            ));
        }
        data_type.validate(length, decimals)?;
        let mut flags = FlagSet::default();
        if nullable {
            flags |= ColumnFlag::Nullable;
        }
        Ok(Self {
            name,
            data_type,
            length,
            decimals,
            flags,
            autoincrement_next: 0,
            autoincrement_step: 0,
            position: 0,
            null_bit: None,
            var_bit: None,
        })
    }

    /// Returns `self` with the binary (no code-page translation) flag set.
    pub fn binary(mut self) -> Self {
        self.flags |= ColumnFlag::Binary;
        self
    }

    /// Returns `self` configured to auto-increment from `next` by `step`.
    pub fn autoincrement(mut self, next: u32, step: u8) -> Self {
        self.flags |= ColumnFlag::Autoincrement;
        self.autoincrement_next = next;
        self.autoincrement_step = step;
        self
    }

    /// The column name as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The column type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The slot width in bytes.
    pub fn length(&self) -> u8 {
        self.length
    }

    /// Digits after the decimal point, for numeric types.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// The descriptor flag bits.
    pub fn flags(&self) -> FlagSet<ColumnFlag> {
        self.flags
    }

    /// True if the column may hold null.
    pub fn is_nullable(&self) -> bool {
        self.flags.contains(ColumnFlag::Nullable)
    }

    /// True if the column bypasses code-page translation.
    pub fn is_binary(&self) -> bool {
        self.flags.contains(ColumnFlag::Binary)
    }

    /// Offset of the slot within a record, counted from byte 1.
    pub fn position(&self) -> u32 {
        self.position
    }

    pub(crate) fn null_bit(&self) -> Option<u16> {
        self.null_bit
    }

    pub(crate) fn var_bit(&self) -> Option<u16> {
        self.var_bit
    }

    fn to_raw(&self) -> RawDescriptor {
        let mut name = [0; 11];
        name[..self.name.len()].copy_from_slice(self.name.as_bytes());
        RawDescriptor {
            name,
            data_type: self.data_type.byte(),
            position: self.position,
            length: self.length,
            decimals: self.decimals,
            flags: self.flags.bits(),
            autoincrement_next: self.autoincrement_next,
            autoincrement_step: self.autoincrement_step,
            reserved: [0; 8],
        }
    }

    fn from_raw(raw: &RawDescriptor) -> Result<Self> {
        let end = raw.name.iter().position(|&b| b == 0).unwrap_or(raw.name.len());
        let name = std::str::from_utf8(&raw.name[..end])
            .map_err(|_| Error::corrupt(format!("column name {:?} is not ASCII", raw.name)))?
            .to_string();
        Ok(Self {
            name,
            data_type: DataType::from_byte(raw.data_type)?,
            length: raw.length,
            decimals: raw.decimals,
            flags: FlagSet::new_truncated(raw.flags),
            autoincrement_next: raw.autoincrement_next,
            autoincrement_step: raw.autoincrement_step,
            position: raw.position,
            null_bit: None,
            var_bit: None,
        })
    }
}

/// The finalized, ordered column list of one table.
#[derive(Clone, Debug, Default)]
pub struct Columns {
    columns: Vec<Column>,
    null_flag: Option<Column>,
}

impl Columns {
    /// Finalizes a declared column list: validates limits and duplicate
    /// names, assigns slot offsets, and synthesizes the `_NullFlags`
    /// column when any column is nullable or variable-length.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::invalid_configuration(
                "a table needs at least one column",
            ));
        }
        if columns.len() > MAX_COLUMNS {
            return Err(Error::invalid_configuration(format!(
                "{} columns exceed the limit of {MAX_COLUMNS}",
                columns.len()
            )));
        }
        for (i, column) in columns.iter().enumerate() {
            for other in &columns[..i] {
                if UniCase::new(column.name()) == UniCase::new(other.name()) {
                    return Err(Error::invalid_configuration(format!(
                        "duplicate column name {:?}",
                        column.name()
                    )));
                }
            }
        }
        let mut this = Self {
            columns,
            null_flag: None,
        };
        this.assign_layout()?;
        Ok(this)
    }

    /// Reads the descriptor list that follows the header, stopping at the
    /// terminator byte.  A trailing `_NullFlags` descriptor becomes the
    /// flag column; declared offsets are checked against the computed
    /// layout.
    pub fn read(io: &mut dyn PositionedIo, first_record_offset: u16) -> Result<Self> {
        let mut columns = Vec::new();
        let mut null_flag = None;
        let mut offset = HEADER_SIZE as u64;
        loop {
            let mut marker = [0];
            io.read_at(offset, &mut marker)?;
            if marker[0] == COLUMN_TERMINATOR {
                break;
            }
            if offset + HEADER_SIZE as u64 > first_record_offset as u64 {
                return Err(Error::corrupt(
                    "column descriptors are not terminated",
                ));
            }
            let mut bytes = [0; HEADER_SIZE];
            io.read_at(offset, &mut bytes)?;
            let raw = RawDescriptor::read_le(&mut Cursor::new(&bytes[..]))?;
            let column = Column::from_raw(&raw)?;
            if UniCase::new(column.name()) == UniCase::new(NULL_FLAG_NAME) {
                null_flag = Some(column);
            } else if null_flag.is_some() {
                return Err(Error::corrupt(format!(
                    "column {:?} follows the flag column",
                    column.name()
                )));
            } else {
                columns.push(column);
            }
            offset += HEADER_SIZE as u64;
        }
        if columns.is_empty() {
            return Err(Error::corrupt("no column descriptors"));
        }

        let declared: Vec<u32> = columns.iter().map(|c| c.position).collect();
        let declared_flag = null_flag.as_ref().map(|c| c.position);
        let had_flag_column = null_flag.is_some();
        let mut this = Self { columns, null_flag };
        this.assign_layout()?;
        if this.null_flag.is_some() != had_flag_column {
            return Err(Error::corrupt(
                "nullable or variable columns without a flag column",
            ));
        }
        for (column, declared) in this.columns.iter().zip(declared) {
            // Position zero means the writer did not fill the field in,
            // which some producers of the older dialects leave that way.
            if declared != 0 && declared != column.position {
                return Err(Error::corrupt(format!(
                    "column {:?} declares offset {declared} but lengths imply {}",
                    column.name(),
                    column.position
                )));
            }
        }
        if let (Some(declared), Some(flag)) = (declared_flag, this.null_flag.as_ref()) {
            if declared != 0 && declared != flag.position {
                return Err(Error::corrupt(format!(
                    "flag column declares offset {declared} but lengths imply {}",
                    flag.position
                )));
            }
        }
        Ok(this)
    }

    /// Writes the descriptor list and terminator after the header.
    pub fn write(&self, io: &mut dyn PositionedIo) -> Result<()> {
        let mut cursor = Cursor::new(Vec::new());
        for column in self.columns.iter().chain(self.null_flag.iter()) {
            column.to_raw().write_le(&mut cursor)?;
        }
        let mut bytes = cursor.into_inner();
        bytes.push(COLUMN_TERMINATOR);
        io.write_at(HEADER_SIZE as u64, &bytes)
    }

    /// Assigns slot offsets and flag-column bits.  Nullable columns claim
    /// the low bits in column order, then variable-length columns claim
    /// the rest.
    fn assign_layout(&mut self) -> Result<()> {
        let mut position = 1;
        let mut null_bits = 0;
        for column in &mut self.columns {
            column.position = position;
            position += column.length as u32;
            if column.is_nullable() {
                column.null_bit = Some(null_bits);
                null_bits += 1;
            } else {
                column.null_bit = None;
            }
        }
        let mut var_bits = 0;
        for column in &mut self.columns {
            if column.data_type.is_variable() {
                column.var_bit = Some(null_bits + var_bits);
                var_bits += 1;
            } else {
                column.var_bit = None;
            }
        }
        let bits = null_bits + var_bits;
        if bits > 0 {
            let length = bits.div_ceil(8) as u8;
            let flags = ColumnFlag::Hidden | ColumnFlag::Binary;
            self.null_flag = Some(Column {
                name: NULL_FLAG_NAME.into(),
                data_type: DataType::NullFlags,
                length,
                decimals: 0,
                flags,
                autoincrement_next: 0,
                autoincrement_step: 0,
                position,
                null_bit: None,
                var_bit: None,
            });
            position += length as u32;
        } else {
            self.null_flag = None;
        }
        if position > MAX_RECORD_LENGTH {
            return Err(Error::invalid_configuration(format!(
                "record length {position} exceeds the limit of {MAX_RECORD_LENGTH}"
            )));
        }
        Ok(())
    }

    /// The declared columns, without the synthesized flag column.
    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    /// Number of declared columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True if there are no declared columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The declared column at `index`.
    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Case-insensitive lookup by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        let name = UniCase::new(name);
        self.columns
            .iter()
            .position(|c| UniCase::new(c.name()) == name)
    }

    /// The synthesized flag column, if any column needs flag bits.
    pub fn null_flag(&self) -> Option<&Column> {
        self.null_flag.as_ref()
    }

    /// Total descriptor count as stored on disk.
    pub fn descriptor_count(&self) -> usize {
        self.columns.len() + usize::from(self.null_flag.is_some())
    }

    /// The record width: deletion marker plus every slot.
    pub fn row_size(&self) -> u16 {
        let widths: u32 = self
            .columns
            .iter()
            .chain(self.null_flag.iter())
            .map(|c| c.length as u32)
            .sum();
        (1 + widths) as u16
    }

    /// True if any column references the memo file.
    pub fn has_memo_columns(&self) -> bool {
        self.columns.iter().any(|c| c.data_type.is_memo())
    }

    /// Number of flag bits in use.
    pub fn flag_bits(&self) -> u16 {
        let nullable = self.columns.iter().filter(|c| c.is_nullable()).count();
        let variable = self
            .columns
            .iter()
            .filter(|c| c.data_type.is_variable())
            .count();
        (nullable + variable) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, io::Memory};

    fn columns_s1() -> Columns {
        Columns::new(vec![
            Column::new("ID", DataType::Integer, 4, 0, false).unwrap(),
            Column::new("NAME", DataType::Character, 8, 0, false).unwrap(),
            Column::new("ACTIVE", DataType::Logical, 1, 0, false).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn offsets_and_row_size() {
        let columns = columns_s1();
        assert_eq!(columns.get(0).unwrap().position(), 1);
        assert_eq!(columns.get(1).unwrap().position(), 5);
        assert_eq!(columns.get(2).unwrap().position(), 13);
        assert_eq!(columns.row_size(), 14);
        assert!(columns.null_flag().is_none());
    }

    #[test]
    fn legality_rules() {
        assert!(Column::new("A", DataType::Integer, 8, 0, false).is_err());
        assert!(Column::new("A", DataType::Character, 0, 0, false).is_err());
        assert!(Column::new("PRICE", DataType::Numeric, 8, 7, false).is_err());
        assert!(Column::new("PRICE", DataType::Numeric, 8, 2, false).is_ok());
        assert!(Column::new("TOOLONGNAME", DataType::Logical, 1, 0, false).is_err());
        assert!(Column::new("_NULLFLAGS", DataType::Character, 4, 0, false).is_err());
        assert!(Column::new("BAD NAME", DataType::Logical, 1, 0, false).is_err());
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = Columns::new(vec![
            Column::new("ID", DataType::Integer, 4, 0, false).unwrap(),
            Column::new("id", DataType::Logical, 1, 0, false).unwrap(),
        ]);
        assert!(matches!(
            result,
            Err(ref e) if matches!(e.kind(), ErrorKind::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn null_flag_synthesis() {
        let columns = Columns::new(vec![
            Column::new("A", DataType::Character, 4, 0, true).unwrap(),
            Column::new("TAG", DataType::Varchar, 10, 0, true).unwrap(),
            Column::new("Q", DataType::Varbinary, 6, 0, false).unwrap(),
        ])
        .unwrap();
        let flag = columns.null_flag().unwrap();
        assert_eq!(flag.name(), NULL_FLAG_NAME);
        assert_eq!(flag.data_type(), DataType::NullFlags);
        assert_eq!(flag.length(), 1);
        assert_eq!(columns.flag_bits(), 4);
        // Nullable bits first in column order, then variable bits.
        assert_eq!(columns.get(0).unwrap().null_bit(), Some(0));
        assert_eq!(columns.get(1).unwrap().null_bit(), Some(1));
        assert_eq!(columns.get(1).unwrap().var_bit(), Some(2));
        assert_eq!(columns.get(2).unwrap().var_bit(), Some(3));
        assert_eq!(columns.row_size(), 1 + 4 + 10 + 6 + 1);
    }

    #[test]
    fn nine_flag_bits_take_two_bytes() {
        let mut declared = Vec::new();
        for i in 0..9 {
            declared.push(Column::new(format!("C{i}"), DataType::Character, 2, 0, true).unwrap());
        }
        let columns = Columns::new(declared).unwrap();
        assert_eq!(columns.null_flag().unwrap().length(), 2);
    }

    #[test]
    fn descriptor_round_trip() {
        let columns = Columns::new(vec![
            Column::new("ID", DataType::Integer, 4, 0, false).unwrap(),
            Column::new("TAG", DataType::Varchar, 10, 0, true).unwrap(),
        ])
        .unwrap();
        let first_record_offset = (HEADER_SIZE + HEADER_SIZE * columns.descriptor_count() + 1) as u16;
        let mut io = Memory::new(vec![0; HEADER_SIZE]);
        columns.write(&mut io).unwrap();
        let read = Columns::read(&mut io, first_record_offset).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read.get(1).unwrap().name(), "TAG");
        assert_eq!(read.get(1).unwrap().data_type(), DataType::Varchar);
        assert!(read.get(1).unwrap().is_nullable());
        assert_eq!(read.null_flag().unwrap().length(), 1);
        assert_eq!(read.row_size(), columns.row_size());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let columns = columns_s1();
        assert_eq!(columns.index_of("name"), Some(1));
        assert_eq!(columns.index_of("Active"), Some(2));
        assert_eq!(columns.index_of("missing"), None);
    }
}
