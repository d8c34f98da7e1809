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

//! Records and the record codec.
//!
//! A record is a fixed-width buffer: one deletion-marker byte followed by
//! the column slots in declaration order, and, when the table has nullable
//! or variable-length columns, the hidden flag-column slot at the end.
//! [RowCodec] turns such buffers into decoded [Row]s and back, consulting
//! the memo file for memo-typed columns.

use std::sync::Arc;

use crate::{
    calendar,
    codepage::Transcoder,
    column::{Column, Columns, DataType},
    data::{Datum, CURRENCY_SCALE},
    error::{Error, Result},
    memo::MemoFile,
};

/// Deletion-marker byte of an active record.
pub const ACTIVE: u8 = 0x20;

/// Deletion-marker byte of a deleted record.
pub const DELETED: u8 = 0x2A;

/// A decoded record, detached from the file it came from.
///
/// Rows read from a table borrow nothing: each owns its data, so search
/// results stay valid after the cursor moves on.
#[derive(Clone, Debug)]
pub struct Row {
    columns: Arc<Columns>,
    data: Vec<Datum>,
    position: Option<u32>,
    deleted: bool,
}

impl Row {
    /// Builds a new row for [append](crate::table::Table::append_row),
    /// one datum per declared column.
    pub fn new(columns: Arc<Columns>, data: Vec<Datum>) -> Result<Self> {
        if data.len() != columns.len() {
            return Err(Error::invalid_position(format!(
                "{} values for {} columns",
                data.len(),
                columns.len()
            )));
        }
        Ok(Self {
            columns,
            data,
            position: None,
            deleted: false,
        })
    }

    pub(crate) fn from_parts(
        columns: Arc<Columns>,
        data: Vec<Datum>,
        position: u32,
        deleted: bool,
    ) -> Self {
        Self {
            columns,
            data,
            position: Some(position),
            deleted,
        }
    }

    /// The 0-based record number, if the row came from a file.
    pub fn position(&self) -> Option<u32> {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: u32) {
        self.position = Some(position);
    }

    /// Whether the record carries the deletion marker.
    pub fn deleted(&self) -> bool {
        self.deleted
    }

    /// The decoded data in column order.
    pub fn data(&self) -> &[Datum] {
        &self.data
    }

    /// The columns this row was decoded with.
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// The datum at column `index`.
    pub fn datum(&self, index: usize) -> Result<&Datum> {
        self.data
            .get(index)
            .ok_or_else(|| Error::invalid_position(format!("no column at index {index}")))
    }

    /// The datum of the column called `name` (case-insensitive).
    pub fn datum_by_name(&self, name: &str) -> Result<&Datum> {
        self.datum(self.index_of(name)?)
    }

    /// Replaces the datum at column `index`.
    pub fn set(&mut self, index: usize, datum: Datum) -> Result<()> {
        let slot = self
            .data
            .get_mut(index)
            .ok_or_else(|| Error::invalid_position(format!("no column at index {index}")))?;
        *slot = datum;
        Ok(())
    }

    /// Replaces the datum of the column called `name`.
    pub fn set_by_name(&mut self, name: &str, datum: Datum) -> Result<()> {
        let index = self.index_of(name)?;
        self.set(index, datum)
    }

    /// The text of a character-like column.
    pub fn string(&self, name: &str) -> Result<String> {
        Ok(self.datum_by_name(name)?.try_text()?.to_string())
    }

    /// The value of an integer-like column.
    pub fn integer(&self, name: &str) -> Result<i64> {
        self.datum_by_name(name)?.try_integer()
    }

    /// The value of a numeric column as a float.
    pub fn float(&self, name: &str) -> Result<f64> {
        self.datum_by_name(name)?.try_float()
    }

    /// The value of a logical column.
    pub fn logical(&self, name: &str) -> Result<bool> {
        self.datum_by_name(name)?.try_logical()
    }

    /// The value of a date or datetime column.
    pub fn timestamp(&self, name: &str) -> Result<chrono::NaiveDateTime> {
        self.datum_by_name(name)?.try_timestamp()
    }

    /// The value of a binary column.
    pub fn bytes(&self, name: &str) -> Result<Vec<u8>> {
        Ok(self.datum_by_name(name)?.try_bytes()?.to_vec())
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.columns
            .index_of(name)
            .ok_or_else(|| Error::invalid_position(format!("no column named {name:?}")))
    }
}

/// A column name paired with a comparison value, for searches.
#[derive(Clone, Debug)]
pub struct Field {
    pub(crate) index: usize,
    name: String,
    datum: Datum,
}

impl Field {
    pub(crate) fn new(index: usize, name: String, datum: Datum) -> Self {
        Self { index, name, datum }
    }

    /// The column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The comparison value.
    pub fn datum(&self) -> &Datum {
        &self.datum
    }
}

/// Encodes and decodes record buffers.
pub(crate) struct RowCodec<'a> {
    pub columns: &'a Arc<Columns>,
    pub transcoder: &'a dyn Transcoder,
    pub trim_spaces: bool,
    pub collapse_spaces: bool,
    pub memo: Option<&'a mut MemoFile>,
}

impl RowCodec<'_> {
    /// Decodes a full record buffer into a [Row].
    pub fn decode(&mut self, buf: &[u8], position: u32) -> Result<Row> {
        let row_size = self.columns.row_size() as usize;
        if buf.len() != row_size {
            return Err(Error::incomplete("record decode", 0, buf.len(), row_size));
        }
        let deleted = buf[0] == DELETED;
        let columns: &Columns = self.columns;
        let mut data = Vec::with_capacity(columns.len());
        for column in columns.iter() {
            data.push(self.decode_slot(buf, column)?);
        }
        Ok(Row::from_parts(Arc::clone(self.columns), data, position, deleted))
    }

    /// Encodes a [Row] into a fresh record buffer, appending memo payloads
    /// as a side effect.
    pub fn encode(&mut self, row: &Row) -> Result<Vec<u8>> {
        if row.data.len() != self.columns.len() {
            return Err(Error::invalid_position(format!(
                "{} values for {} columns",
                row.data.len(),
                self.columns.len()
            )));
        }
        let mut buf = vec![0; self.columns.row_size() as usize];
        buf[0] = if row.deleted { DELETED } else { ACTIVE };
        let columns: &Columns = self.columns;
        for (column, datum) in columns.iter().zip(&row.data) {
            self.encode_slot(&mut buf, column, datum)?;
        }
        Ok(buf)
    }

    fn flag_bit(&self, buf: &[u8], bit: u16) -> bool {
        match self.columns.null_flag() {
            Some(flag) => {
                let byte = buf[flag.position() as usize + bit as usize / 8];
                byte >> (bit % 8) & 1 == 1
            }
            None => false,
        }
    }

    fn set_flag_bit(&self, buf: &mut [u8], bit: u16) {
        if let Some(flag) = self.columns.null_flag() {
            buf[flag.position() as usize + bit as usize / 8] |= 1 << (bit % 8);
        }
    }

    fn decode_slot(&mut self, buf: &[u8], column: &Column) -> Result<Datum> {
        if let Some(bit) = column.null_bit() {
            if self.flag_bit(buf, bit) {
                return Ok(Datum::Null);
            }
        }
        let start = column.position() as usize;
        let slot = &buf[start..start + column.length() as usize];
        match column.data_type() {
            DataType::Character => {
                if column.is_binary() {
                    Ok(Datum::Bytes(slot.to_vec()))
                } else {
                    Ok(Datum::Text(self.postprocess(&self.transcoder.decode(slot))))
                }
            }
            DataType::Varchar | DataType::Varbinary => {
                let payload = match column.var_bit() {
                    Some(bit) if self.flag_bit(buf, bit) => {
                        let used = slot[slot.len() - 1] as usize;
                        if used >= slot.len() {
                            return Err(Error::corrupt(format!(
                                "column {:?} claims {used} bytes in a {}-byte slot",
                                column.name(),
                                slot.len()
                            )));
                        }
                        &slot[..used]
                    }
                    _ => slot,
                };
                if column.data_type() == DataType::Varbinary || column.is_binary() {
                    Ok(Datum::Bytes(payload.to_vec()))
                } else {
                    Ok(Datum::Text(
                        self.postprocess(&self.transcoder.decode(payload)),
                    ))
                }
            }
            DataType::Numeric | DataType::Float => self.decode_number(slot, column),
            DataType::Integer => {
                let n = i32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
                Ok(Datum::Integer(n.into()))
            }
            DataType::Currency => {
                let n = i64::from_le_bytes([
                    slot[0], slot[1], slot[2], slot[3], slot[4], slot[5], slot[6], slot[7],
                ]);
                Ok(Datum::Currency(n))
            }
            DataType::Double => {
                let x = f64::from_le_bytes([
                    slot[0], slot[1], slot[2], slot[3], slot[4], slot[5], slot[6], slot[7],
                ]);
                Ok(Datum::Float(x))
            }
            DataType::Date => Ok(calendar::decode_date(slot)?.into()),
            DataType::DateTime => {
                let jdn = u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
                let ms = u32::from_le_bytes([slot[4], slot[5], slot[6], slot[7]]);
                Ok(calendar::decode_datetime(jdn, ms)?.into())
            }
            DataType::Logical => match slot[0] {
                b'T' | b't' | b'Y' | b'y' => Ok(Datum::Logical(true)),
                b'F' | b'f' | b'N' | b'n' => Ok(Datum::Logical(false)),
                b'?' | b' ' => Ok(Datum::Null),
                other => Err(Error::corrupt(format!(
                    "logical column {:?} holds byte {other:#04x}",
                    column.name()
                ))),
            },
            DataType::Memo | DataType::General | DataType::Picture | DataType::Blob => {
                let block = u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
                if block == 0 {
                    return Ok(Datum::Null);
                }
                let memo = self.memo.as_deref_mut().ok_or_else(|| {
                    Error::no_memo_file(format!(
                        "column {:?} references block {block}",
                        column.name()
                    ))
                })?;
                let (payload, chunk_is_text) = memo.read(block)?;
                let text = chunk_is_text
                    && column.data_type() != DataType::Blob
                    && !column.is_binary();
                if text {
                    Ok(Datum::Text(self.transcoder.decode(&payload).into_owned()))
                } else {
                    Ok(Datum::Bytes(payload))
                }
            }
            DataType::NullFlags => Ok(Datum::Bytes(slot.to_vec())),
        }
    }

    fn decode_number(&self, slot: &[u8], column: &Column) -> Result<Datum> {
        let text = std::str::from_utf8(slot)
            .map_err(|_| {
                Error::corrupt(format!("numeric column {:?} is not ASCII", column.name()))
            })?
            .trim();
        if text.is_empty() {
            return Ok(Datum::Null);
        }
        if column.decimals() == 0 {
            let n: i64 = text.parse().map_err(|_| {
                Error::corrupt(format!(
                    "numeric column {:?} holds {text:?}",
                    column.name()
                ))
            })?;
            Ok(Datum::Integer(n))
        } else {
            let x: f64 = text.parse().map_err(|_| {
                Error::corrupt(format!(
                    "numeric column {:?} holds {text:?}",
                    column.name()
                ))
            })?;
            Ok(Datum::Float(x))
        }
    }

    fn encode_slot(&mut self, buf: &mut [u8], column: &Column, datum: &Datum) -> Result<()> {
        let start = column.position() as usize;
        let length = column.length() as usize;

        if datum.is_null() {
            if let Some(bit) = column.null_bit() {
                self.set_flag_bit(buf, bit);
            } else if !Self::has_null_blank(column.data_type()) {
                return Err(Error::unknown_data_type(format!(
                    "column {:?} is not nullable",
                    column.name()
                )));
            }
            let slot = &mut buf[start..start + length];
            Self::write_null_blank(slot, column.data_type());
            return Ok(());
        }

        let mismatch = |datum: &Datum| {
            Error::unknown_data_type(format!(
                "{datum:?} cannot be stored in {:?} column {:?}",
                column.data_type(),
                column.name()
            ))
        };

        match column.data_type() {
            DataType::Character => {
                let encoded: Vec<u8> = if column.is_binary() {
                    datum.try_bytes()?.to_vec()
                } else {
                    self.transcoder.encode(datum.try_text()?)?.into_owned()
                };
                if encoded.len() > length {
                    return Err(Error::unknown_data_type(format!(
                        "{} bytes do not fit column {:?} of width {length}",
                        encoded.len(),
                        column.name()
                    )));
                }
                // Character slots are space-padded whether or not the
                // column is binary; the binary flag only skips transcoding.
                let slot = &mut buf[start..start + length];
                slot[..encoded.len()].copy_from_slice(&encoded);
                slot[encoded.len()..].fill(ACTIVE);
            }
            DataType::Varchar | DataType::Varbinary => {
                let encoded: Vec<u8> = match (column.data_type(), datum) {
                    (DataType::Varchar, Datum::Text(s)) if !column.is_binary() => {
                        self.transcoder.encode(s)?.into_owned()
                    }
                    (DataType::Varchar, Datum::Bytes(b)) if column.is_binary() => b.clone(),
                    (DataType::Varbinary, Datum::Bytes(b)) => b.clone(),
                    _ => return Err(mismatch(datum)),
                };
                let slot = &mut buf[start..start + length];
                if encoded.len() == length {
                    slot.copy_from_slice(&encoded);
                } else if encoded.len() < length {
                    slot[..encoded.len()].copy_from_slice(&encoded);
                    slot[length - 1] = encoded.len() as u8;
                    if let Some(bit) = column.var_bit() {
                        self.set_flag_bit(buf, bit);
                    }
                } else {
                    return Err(Error::unknown_data_type(format!(
                        "{} bytes do not fit column {:?} of width {length}",
                        encoded.len(),
                        column.name()
                    )));
                }
            }
            DataType::Numeric | DataType::Float => {
                let text = if column.decimals() == 0 {
                    format!("{}", datum.try_integer().map_err(|_| mismatch(datum))?)
                } else {
                    format!(
                        "{:.*}",
                        column.decimals() as usize,
                        datum.try_float().map_err(|_| mismatch(datum))?
                    )
                };
                if text.len() > length {
                    return Err(Error::unknown_data_type(format!(
                        "{text:?} does not fit column {:?} of width {length}",
                        column.name()
                    )));
                }
                let slot = &mut buf[start..start + length];
                let pad = length - text.len();
                slot[..pad].fill(ACTIVE);
                slot[pad..].copy_from_slice(text.as_bytes());
            }
            DataType::Integer => {
                let n = datum.try_integer().map_err(|_| mismatch(datum))?;
                let n = i32::try_from(n).map_err(|_| {
                    Error::unknown_data_type(format!(
                        "{n} is out of range for integer column {:?}",
                        column.name()
                    ))
                })?;
                buf[start..start + 4].copy_from_slice(&n.to_le_bytes());
            }
            DataType::Currency => {
                let scaled = match datum {
                    Datum::Currency(c) => *c,
                    Datum::Integer(n) => n
                        .checked_mul(CURRENCY_SCALE)
                        .ok_or_else(|| mismatch(datum))?,
                    Datum::Float(x) => (x * CURRENCY_SCALE as f64).round() as i64,
                    _ => return Err(mismatch(datum)),
                };
                buf[start..start + 8].copy_from_slice(&scaled.to_le_bytes());
            }
            DataType::Double => {
                let x = datum.try_float().map_err(|_| mismatch(datum))?;
                buf[start..start + 8].copy_from_slice(&x.to_le_bytes());
            }
            DataType::Date => {
                let date = match datum {
                    Datum::Date(d) => *d,
                    Datum::DateTime(dt) => dt.date(),
                    _ => return Err(mismatch(datum)),
                };
                buf[start..start + 8].copy_from_slice(&calendar::encode_date(date));
            }
            DataType::DateTime => {
                let dt = datum.try_timestamp().map_err(|_| mismatch(datum))?;
                let (jdn, ms) = calendar::encode_datetime(dt);
                buf[start..start + 4].copy_from_slice(&jdn.to_le_bytes());
                buf[start + 4..start + 8].copy_from_slice(&ms.to_le_bytes());
            }
            DataType::Logical => {
                let b = datum.try_logical().map_err(|_| mismatch(datum))?;
                buf[start] = if b { b'T' } else { b'F' };
            }
            DataType::Memo | DataType::General | DataType::Picture | DataType::Blob => {
                let (payload, is_text): (Vec<u8>, bool) = match datum {
                    Datum::Text(s)
                        if column.data_type() != DataType::Blob && !column.is_binary() =>
                    {
                        (self.transcoder.encode(s)?.into_owned(), true)
                    }
                    Datum::Text(s) => (s.clone().into_bytes(), false),
                    Datum::Bytes(b) => (b.clone(), false),
                    _ => return Err(mismatch(datum)),
                };
                let memo = self.memo.as_deref_mut().ok_or_else(|| {
                    Error::no_memo_file(format!(
                        "column {:?} needs a memo file",
                        column.name()
                    ))
                })?;
                let block = memo.append(&payload, is_text)?;
                buf[start..start + 4].copy_from_slice(&block.to_le_bytes());
            }
            DataType::NullFlags => return Err(mismatch(datum)),
        }
        Ok(())
    }

    /// Types whose blank encoding round-trips to null even without a
    /// nullable bit.
    fn has_null_blank(data_type: DataType) -> bool {
        matches!(
            data_type,
            DataType::Date
                | DataType::DateTime
                | DataType::Logical
                | DataType::Numeric
                | DataType::Float
                | DataType::Memo
                | DataType::General
                | DataType::Picture
                | DataType::Blob
        )
    }

    fn write_null_blank(slot: &mut [u8], data_type: DataType) {
        match data_type {
            DataType::Character | DataType::Numeric | DataType::Float | DataType::Date => {
                slot.fill(ACTIVE)
            }
            DataType::Logical => slot[0] = b'?',
            // Memo references, datetimes, and the fixed binary types have
            // an all-zero null encoding.
            _ => slot.fill(0),
        }
    }

    fn postprocess(&self, text: &str) -> String {
        let text = if self.trim_spaces {
            text.trim_matches(' ')
        } else {
            text
        };
        if self.collapse_spaces {
            let mut out = String::with_capacity(text.len());
            let mut in_run = false;
            for c in text.chars() {
                if c == ' ' {
                    if !in_run {
                        out.push(' ');
                    }
                    in_run = true;
                } else {
                    out.push(c);
                    in_run = false;
                }
            }
            out
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::{
        codepage::{Registry, Transcoder},
        column::{Column, Columns, DataType},
        error::ErrorKind,
        io::Memory,
        memo::MemoFile,
    };

    fn transcoder() -> Arc<dyn Transcoder> {
        Registry::default().get(0x03).unwrap()
    }

    fn codec_round_trip(columns: Columns, data: Vec<Datum>) -> (Vec<u8>, Row) {
        let columns = Arc::new(columns);
        let transcoder = transcoder();
        let row = Row::new(Arc::clone(&columns), data).unwrap();
        let mut codec = RowCodec {
            columns: &columns,
            transcoder: &*transcoder,
            trim_spaces: false,
            collapse_spaces: false,
            memo: None,
        };
        let buf = codec.encode(&row).unwrap();
        let decoded = codec.decode(&buf, 0).unwrap();
        (buf, decoded)
    }

    #[test]
    fn every_fixed_type_round_trips() {
        let columns = Columns::new(vec![
            Column::new("C", DataType::Character, 8, 0, false).unwrap(),
            Column::new("N", DataType::Numeric, 8, 0, false).unwrap(),
            Column::new("P", DataType::Numeric, 8, 2, false).unwrap(),
            Column::new("I", DataType::Integer, 4, 0, false).unwrap(),
            Column::new("Y", DataType::Currency, 8, 0, false).unwrap(),
            Column::new("B", DataType::Double, 8, 0, false).unwrap(),
            Column::new("D", DataType::Date, 8, 0, false).unwrap(),
            Column::new("T", DataType::DateTime, 8, 0, false).unwrap(),
            Column::new("L", DataType::Logical, 1, 0, false).unwrap(),
        ])
        .unwrap();
        let date = NaiveDate::from_ymd_opt(2022, 10, 15).unwrap();
        let datetime = date.and_time(NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        let (_, decoded) = codec_round_trip(
            columns,
            vec![
                Datum::Text("ALICE".into()),
                Datum::Integer(-42),
                Datum::Float(3.5),
                Datum::Integer(7),
                Datum::Currency(12_3456),
                Datum::Float(2.25),
                Datum::Date(date),
                Datum::DateTime(datetime),
                Datum::Logical(true),
            ],
        );
        assert_eq!(decoded.data()[0], Datum::Text("ALICE   ".into()));
        assert_eq!(decoded.data()[1], Datum::Integer(-42));
        assert_eq!(decoded.data()[2], Datum::Float(3.5));
        assert_eq!(decoded.data()[3], Datum::Integer(7));
        assert_eq!(decoded.data()[4], Datum::Currency(12_3456));
        assert_eq!(decoded.data()[5], Datum::Float(2.25));
        assert_eq!(decoded.data()[6], Datum::Date(date));
        assert_eq!(decoded.data()[7], Datum::DateTime(datetime));
        assert_eq!(decoded.data()[8], Datum::Logical(true));
        assert!(!decoded.deleted());
    }

    #[test]
    fn numeric_decimal_bytes() {
        let columns = Arc::new(
            Columns::new(vec![Column::new("PRICE", DataType::Numeric, 8, 2, false).unwrap()])
                .unwrap(),
        );
        let transcoder = transcoder();
        let mut codec = RowCodec {
            columns: &columns,
            transcoder: &*transcoder,
            trim_spaces: false,
            collapse_spaces: false,
            memo: None,
        };
        let row = Row::new(Arc::clone(&columns), vec![Datum::Float(3.5)]).unwrap();
        let buf = codec.encode(&row).unwrap();
        assert_eq!(&buf[1..9], b"    3.50");
        assert_eq!(codec.decode(&buf, 0).unwrap().data()[0], Datum::Float(3.5));
    }

    #[test]
    fn numeric_overflow_is_fatal() {
        let columns = Arc::new(
            Columns::new(vec![Column::new("N", DataType::Numeric, 3, 0, false).unwrap()]).unwrap(),
        );
        let transcoder = transcoder();
        let mut codec = RowCodec {
            columns: &columns,
            transcoder: &*transcoder,
            trim_spaces: false,
            collapse_spaces: false,
            memo: None,
        };
        let row = Row::new(Arc::clone(&columns), vec![Datum::Integer(12345)]).unwrap();
        assert!(matches!(
            codec.encode(&row),
            Err(ref e) if matches!(e.kind(), ErrorKind::UnknownDataType(_))
        ));
    }

    #[test]
    fn varchar_length_byte_and_flag_bits() {
        let columns = Arc::new(
            Columns::new(vec![Column::new("TAG", DataType::Varchar, 10, 0, true).unwrap()])
                .unwrap(),
        );
        let transcoder = transcoder();
        let mut codec = RowCodec {
            columns: &columns,
            transcoder: &*transcoder,
            trim_spaces: false,
            collapse_spaces: false,
            memo: None,
        };

        let row = Row::new(Arc::clone(&columns), vec![Datum::Text("ab".into())]).unwrap();
        let buf = codec.encode(&row).unwrap();
        assert_eq!(&buf[1..3], b"ab");
        assert_eq!(buf[10], 2, "length byte in the last slot byte");
        let flag_slot = columns.null_flag().unwrap().position() as usize;
        assert_eq!(buf[flag_slot], 0b10, "variable bit set, null bit clear");
        assert_eq!(codec.decode(&buf, 0).unwrap().data()[0], Datum::Text("ab".into()));

        let row = Row::new(Arc::clone(&columns), vec![Datum::Null]).unwrap();
        let buf = codec.encode(&row).unwrap();
        assert_eq!(buf[flag_slot] & 0b01, 0b01, "null bit set");
        assert_eq!(codec.decode(&buf, 0).unwrap().data()[0], Datum::Null);

        // A full-width value occupies the whole slot with the bit clear.
        let row = Row::new(Arc::clone(&columns), vec![Datum::Text("0123456789".into())]).unwrap();
        let buf = codec.encode(&row).unwrap();
        assert_eq!(buf[flag_slot] & 0b10, 0);
        assert_eq!(
            codec.decode(&buf, 0).unwrap().data()[0],
            Datum::Text("0123456789".into())
        );
    }

    #[test]
    fn memo_columns_round_trip_through_the_memo_file() {
        let columns = Arc::new(
            Columns::new(vec![
                Column::new("NOTE", DataType::Memo, 4, 0, false).unwrap(),
                Column::new("RAW", DataType::Blob, 4, 0, false).unwrap(),
            ])
            .unwrap(),
        );
        let transcoder = transcoder();
        let mut memo = MemoFile::create(Box::new(Memory::default()), 512, false).unwrap();
        let mut codec = RowCodec {
            columns: &columns,
            transcoder: &*transcoder,
            trim_spaces: false,
            collapse_spaces: false,
            memo: Some(&mut memo),
        };
        let row = Row::new(
            Arc::clone(&columns),
            vec![Datum::Text("hello".into()), Datum::Bytes(vec![1, 2, 3])],
        )
        .unwrap();
        let buf = codec.encode(&row).unwrap();
        assert_eq!(&buf[1..5], &1u32.to_le_bytes());
        let decoded = codec.decode(&buf, 0).unwrap();
        assert_eq!(decoded.data()[0], Datum::Text("hello".into()));
        assert_eq!(decoded.data()[1], Datum::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn memo_without_memo_file_is_an_error() {
        let columns = Arc::new(
            Columns::new(vec![Column::new("NOTE", DataType::Memo, 4, 0, false).unwrap()]).unwrap(),
        );
        let transcoder = transcoder();
        let mut codec = RowCodec {
            columns: &columns,
            transcoder: &*transcoder,
            trim_spaces: false,
            collapse_spaces: false,
            memo: None,
        };
        let row = Row::new(
            Arc::clone(&columns),
            vec![Datum::Text("hello".into())],
        )
        .unwrap();
        assert!(matches!(
            codec.encode(&row),
            Err(ref e) if matches!(e.kind(), ErrorKind::NoMemoFile(_))
        ));
    }

    #[test]
    fn null_blanks_round_trip_without_flag_bits() {
        let columns = Columns::new(vec![
            Column::new("D", DataType::Date, 8, 0, false).unwrap(),
            Column::new("L", DataType::Logical, 1, 0, false).unwrap(),
            Column::new("T", DataType::DateTime, 8, 0, false).unwrap(),
            Column::new("N", DataType::Numeric, 6, 0, false).unwrap(),
        ])
        .unwrap();
        let (buf, decoded) = codec_round_trip(
            columns,
            vec![Datum::Null, Datum::Null, Datum::Null, Datum::Null],
        );
        assert_eq!(&buf[1..9], b"        ");
        assert_eq!(buf[9], b'?');
        assert_eq!(&buf[10..18], &[0; 8]);
        for datum in decoded.data() {
            assert!(datum.is_null());
        }
    }

    #[test]
    fn deleted_marker_round_trips() {
        let columns = Arc::new(
            Columns::new(vec![Column::new("L", DataType::Logical, 1, 0, false).unwrap()]).unwrap(),
        );
        let transcoder = transcoder();
        let mut codec = RowCodec {
            columns: &columns,
            transcoder: &*transcoder,
            trim_spaces: false,
            collapse_spaces: false,
            memo: None,
        };
        let mut row = Row::new(Arc::clone(&columns), vec![Datum::Logical(false)]).unwrap();
        row.deleted = true;
        let buf = codec.encode(&row).unwrap();
        assert_eq!(buf[0], DELETED);
        assert!(codec.decode(&buf, 3).unwrap().deleted());
    }

    #[test]
    fn trim_and_collapse() {
        let columns = Arc::new(
            Columns::new(vec![Column::new("C", DataType::Character, 12, 0, false).unwrap()])
                .unwrap(),
        );
        let transcoder = transcoder();
        let mut codec = RowCodec {
            columns: &columns,
            transcoder: &*transcoder,
            trim_spaces: true,
            collapse_spaces: true,
            memo: None,
        };
        let row = Row::new(Arc::clone(&columns), vec![Datum::Text("a  b c".into())]).unwrap();
        let buf = codec.encode(&row).unwrap();
        assert_eq!(
            codec.decode(&buf, 0).unwrap().data()[0],
            Datum::Text("a b c".into())
        );
    }

    #[test]
    fn binary_character_bypasses_transcoding() {
        let columns = Arc::new(
            Columns::new(vec![Column::new("C", DataType::Character, 4, 0, false)
                .unwrap()
                .binary()])
            .unwrap(),
        );
        let transcoder = transcoder();
        let mut codec = RowCodec {
            columns: &columns,
            transcoder: &*transcoder,
            trim_spaces: false,
            collapse_spaces: false,
            memo: None,
        };
        let row = Row::new(
            Arc::clone(&columns),
            vec![Datum::Bytes(vec![0xFF, 0x00, 0x01, 0x02])],
        )
        .unwrap();
        let buf = codec.encode(&row).unwrap();
        assert_eq!(
            codec.decode(&buf, 0).unwrap().data()[0],
            Datum::Bytes(vec![0xFF, 0x00, 0x01, 0x02])
        );

        // A short binary value is space-padded like any character slot.
        let row = Row::new(Arc::clone(&columns), vec![Datum::Bytes(vec![0xFF, 0x00])]).unwrap();
        let buf = codec.encode(&row).unwrap();
        assert_eq!(&buf[1..5], &[0xFF, 0x00, ACTIVE, ACTIVE]);
        assert_eq!(
            codec.decode(&buf, 0).unwrap().data()[0],
            Datum::Bytes(vec![0xFF, 0x00, ACTIVE, ACTIVE])
        );
    }
}
