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

//! End-to-end scenarios on real files: create, append, reopen, verify the
//! raw bytes, and read everything back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tempfile::TempDir;
use xbase::{
    Column, DataType, Datum, ErrorKind, FileVersion, OpenOptions, Table, TableBuilder,
};

fn people_table(dir: &Path) -> (PathBuf, Table) {
    let path = dir.join("people.dbf");
    let table = TableBuilder::new()
        .column(Column::new("ID", DataType::Integer, 4, 0, false).unwrap())
        .column(Column::new("NAME", DataType::Character, 8, 0, false).unwrap())
        .column(Column::new("ACTIVE", DataType::Logical, 1, 0, false).unwrap())
        .code_page_mark(0x03)
        .create(&path)
        .unwrap();
    let mut row = table
        .new_row(vec![
            Datum::Integer(1),
            Datum::Text("ALICE".into()),
            Datum::Logical(true),
        ])
        .unwrap();
    table.append_row(&mut row).unwrap();
    (path, table)
}

#[test]
fn create_and_read_back() {
    let dir = TempDir::new().unwrap();
    let (path, table) = people_table(dir.path());
    table.close().unwrap();

    let table = OpenOptions::new().open(&path).unwrap();
    assert_eq!(table.record_count(), 1);
    assert_eq!(table.header().version, FileVersion::FoxPro);
    let row = table.next().unwrap();
    assert_eq!(row.integer("ID").unwrap(), 1);
    assert_eq!(row.string("NAME").unwrap(), "ALICE   ");
    assert!(row.logical("ACTIVE").unwrap());
    assert!(table.next().is_err_and(|e| e.is_eof()));
    table.close().unwrap();

    let table = OpenOptions::new().trim_spaces(true).open(&path).unwrap();
    let row = table.next().unwrap();
    assert_eq!(row.string("NAME").unwrap(), "ALICE");
}

#[test]
fn header_geometry_invariants() {
    let dir = TempDir::new().unwrap();
    let (path, table) = people_table(dir.path());
    let header = table.header();
    let columns = table.columns();

    let slot_sum: u32 = columns.iter().map(|c| c.length() as u32).sum();
    assert_eq!(header.row_size as u32, 1 + slot_sum);
    assert_eq!(
        header.first_record_offset as usize,
        32 + 32 * columns.descriptor_count() + 1
    );
    table.close().unwrap();

    // Every record starts with an active or deleted marker, and the file
    // ends with the EOF byte.
    let bytes = std::fs::read(&path).unwrap();
    let start = header.first_record_offset as usize;
    let row_size = header.row_size as usize;
    for index in 0..header.record_count as usize {
        let marker = bytes[start + index * row_size];
        assert!(marker == 0x20 || marker == 0x2A);
    }
    assert_eq!(bytes.len(), start + row_size + 1);
    assert_eq!(*bytes.last().unwrap(), 0x1A);
}

#[test]
fn delete_marks_without_losing_data() {
    let dir = TempDir::new().unwrap();
    let (path, table) = people_table(dir.path());
    let before = {
        table.goto(0).unwrap();
        table.delete().unwrap();
        table.close().unwrap();
        std::fs::read(&path).unwrap()
    };

    let table = OpenOptions::new().open(&path).unwrap();
    table.goto(0).unwrap();
    let row = table.row().unwrap();
    assert!(row.deleted());
    assert_eq!(row.integer("ID").unwrap(), 1);
    assert_eq!(row.string("NAME").unwrap(), "ALICE   ");

    // Undelete restores the original bytes exactly.
    table.undelete().unwrap();
    table.close().unwrap();
    let mut expected = before;
    let offset = table.header().first_record_offset as usize;
    expected[offset] = 0x20;
    assert_eq!(std::fs::read(&path).unwrap(), expected);
}

#[test]
fn numeric_decimals_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prices.dbf");
    let table = TableBuilder::new()
        .column(Column::new("PRICE", DataType::Numeric, 8, 2, false).unwrap())
        .create(&path)
        .unwrap();
    let mut row = table.new_row(vec![Datum::Float(3.5)]).unwrap();
    table.append_row(&mut row).unwrap();
    let header = table.header();
    table.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let slot = header.first_record_offset as usize + 1;
    assert_eq!(&bytes[slot..slot + 8], b"    3.50");

    let table = OpenOptions::new().open(&path).unwrap();
    assert_eq!(table.next().unwrap().float("PRICE").unwrap(), 3.5);
}

#[test]
fn memo_round_trip_with_block_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.dbf");
    let table = TableBuilder::new()
        .column(Column::new("NOTE", DataType::Memo, 4, 0, false).unwrap())
        .memo_block_size(512)
        .create(&path)
        .unwrap();
    let mut row = table.new_row(vec![Datum::Text("hello".into())]).unwrap();
    table.append_row(&mut row).unwrap();
    let header = table.header();
    assert!(header.has_memo());
    table.close().unwrap();

    // The record holds little-endian block index 1.
    let bytes = std::fs::read(&path).unwrap();
    let slot = header.first_record_offset as usize + 1;
    assert_eq!(&bytes[slot..slot + 4], &1u32.to_le_bytes());

    // Block 1 of the memo file: big-endian type 1, length 5, then the text.
    let memo_bytes = std::fs::read(dir.path().join("notes.fpt")).unwrap();
    assert_eq!(&memo_bytes[512..516], &[0, 0, 0, 1]);
    assert_eq!(&memo_bytes[516..520], &[0, 0, 0, 5]);
    assert_eq!(&memo_bytes[520..525], b"hello");

    let table = OpenOptions::new().open(&path).unwrap();
    assert_eq!(table.next().unwrap().string("NOTE").unwrap(), "hello");
}

#[test]
fn datetime_is_julian_day_and_milliseconds() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("when.dbf");
    let table = TableBuilder::new()
        .column(Column::new("AT", DataType::DateTime, 8, 0, false).unwrap())
        .create(&path)
        .unwrap();
    let instant = NaiveDate::from_ymd_opt(2022, 10, 15)
        .unwrap()
        .and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    let mut row = table.new_row(vec![Datum::DateTime(instant)]).unwrap();
    table.append_row(&mut row).unwrap();
    let header = table.header();
    table.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let slot = header.first_record_offset as usize + 1;
    assert_eq!(&bytes[slot..slot + 4], &2_459_868u32.to_le_bytes());
    assert_eq!(&bytes[slot + 4..slot + 8], &0u32.to_le_bytes());

    let table = OpenOptions::new().open(&path).unwrap();
    assert_eq!(
        table.next().unwrap().timestamp("AT").unwrap(),
        instant
    );
}

#[test]
fn code_page_mark_drives_transcoding() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cyrillic.dbf");
    let table = TableBuilder::new()
        .column(Column::new("WORD", DataType::Character, 10, 0, false).unwrap())
        .code_page_mark(0x65)
        .create(&path)
        .unwrap();
    let mut row = table.new_row(vec![Datum::Text("Привет".into())]).unwrap();
    table.append_row(&mut row).unwrap();
    let header = table.header();
    table.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes[29], 0x65, "code-page mark in the header");
    let slot = header.first_record_offset as usize + 1;
    assert_eq!(
        &bytes[slot..slot + 6],
        &[0x8F, 0xE0, 0xA8, 0xA2, 0xA5, 0xE2],
        "CP866 bytes on disk"
    );

    // The mark in the header is enough to decode on reopen.
    let table = OpenOptions::new().trim_spaces(true).open(&path).unwrap();
    assert_eq!(table.next().unwrap().string("WORD").unwrap(), "Привет");
}

#[test]
fn varchar_and_null_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tags.dbf");
    let table = TableBuilder::new()
        .column(Column::new("TAG", DataType::Varchar, 10, 0, true).unwrap())
        .create(&path)
        .unwrap();
    assert_eq!(table.header().version, FileVersion::FoxProVar);

    let mut row = table.new_row(vec![Datum::Text("ab".into())]).unwrap();
    table.append_row(&mut row).unwrap();
    let mut row = table.new_row(vec![Datum::Null]).unwrap();
    table.append_row(&mut row).unwrap();
    let header = table.header();
    table.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let record = header.first_record_offset as usize;
    assert_eq!(&bytes[record + 1..record + 3], b"ab");
    assert_eq!(bytes[record + 10], 2, "length byte");
    assert_eq!(bytes[record + 11], 0b10, "variable bit set");
    let second = record + header.row_size as usize;
    assert_eq!(bytes[second + 11] & 0b01, 0b01, "null bit set");

    let table = OpenOptions::new().open(&path).unwrap();
    assert_eq!(table.next().unwrap().string("TAG").unwrap(), "ab");
    assert!(table.next().unwrap().datum_by_name("TAG").unwrap().is_null());
}

#[test]
fn append_is_visible_to_a_fresh_open() {
    let dir = TempDir::new().unwrap();
    let (path, table) = people_table(dir.path());
    let before = table.record_count();
    let mut row = table
        .new_row(vec![
            Datum::Integer(2),
            Datum::Text("BOB".into()),
            Datum::Logical(false),
        ])
        .unwrap();
    table.append_row(&mut row).unwrap();
    table.close().unwrap();

    let fresh = OpenOptions::new().open(&path).unwrap();
    assert_eq!(fresh.record_count(), before + 1);
    fresh.goto(before).unwrap();
    let row = fresh.row().unwrap();
    assert_eq!(row.integer("ID").unwrap(), 2);
    assert_eq!(row.string("NAME").unwrap(), "BOB     ");
    assert!(!row.logical("ACTIVE").unwrap());
}

#[test]
fn every_column_type_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("all.dbf");
    let table = TableBuilder::new()
        .column(Column::new("C", DataType::Character, 6, 0, false).unwrap())
        .column(Column::new("N", DataType::Numeric, 6, 0, false).unwrap())
        .column(Column::new("F", DataType::Float, 10, 3, false).unwrap())
        .column(Column::new("I", DataType::Integer, 4, 0, false).unwrap())
        .column(Column::new("Y", DataType::Currency, 8, 0, false).unwrap())
        .column(Column::new("B", DataType::Double, 8, 0, false).unwrap())
        .column(Column::new("D", DataType::Date, 8, 0, false).unwrap())
        .column(Column::new("T", DataType::DateTime, 8, 0, false).unwrap())
        .column(Column::new("L", DataType::Logical, 1, 0, false).unwrap())
        .column(Column::new("V", DataType::Varchar, 12, 0, false).unwrap())
        .column(Column::new("Q", DataType::Varbinary, 8, 0, false).unwrap())
        .column(Column::new("M", DataType::Memo, 4, 0, false).unwrap())
        .column(Column::new("W", DataType::Blob, 4, 0, false).unwrap())
        .create(&path)
        .unwrap();

    let date = NaiveDate::from_ymd_opt(1995, 7, 4).unwrap();
    let at = date.and_time(NaiveTime::from_hms_milli_opt(23, 59, 59, 500).unwrap());
    let mut row = table
        .new_row(vec![
            Datum::Text("six".into()),
            Datum::Integer(-12),
            Datum::Float(1.25),
            Datum::Integer(2_000_000),
            Datum::Currency(98_7654),
            Datum::Float(0.125),
            Datum::Date(date),
            Datum::DateTime(at),
            Datum::Logical(false),
            Datum::Text("variable".into()),
            Datum::Bytes(vec![9, 8, 7]),
            Datum::Text("memo body".into()),
            Datum::Bytes(vec![0xDE, 0xAD]),
        ])
        .unwrap();
    table.append_row(&mut row).unwrap();
    table.close().unwrap();

    let table = OpenOptions::new().open(&path).unwrap();
    let row = table.next().unwrap();
    assert_eq!(row.string("C").unwrap(), "six   ");
    assert_eq!(row.integer("N").unwrap(), -12);
    assert_eq!(row.float("F").unwrap(), 1.25);
    assert_eq!(row.integer("I").unwrap(), 2_000_000);
    assert_eq!(row.datum_by_name("Y").unwrap(), &Datum::Currency(98_7654));
    assert_eq!(row.float("B").unwrap(), 0.125);
    assert_eq!(row.timestamp("D").unwrap().date(), date);
    assert_eq!(row.timestamp("T").unwrap(), at);
    assert!(!row.logical("L").unwrap());
    assert_eq!(row.string("V").unwrap(), "variable");
    assert_eq!(row.bytes("Q").unwrap(), vec![9, 8, 7]);
    assert_eq!(row.string("M").unwrap(), "memo body");
    assert_eq!(row.bytes("W").unwrap(), vec![0xDE, 0xAD]);
    table.close().unwrap();
}

#[test]
fn rewriting_memos_only_grows_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("grow.dbf");
    let table = TableBuilder::new()
        .column(Column::new("NOTE", DataType::Memo, 4, 0, false).unwrap())
        .memo_block_size(64)
        .create(&path)
        .unwrap();
    let mut row = table.new_row(vec![Datum::Text("first".into())]).unwrap();
    table.append_row(&mut row).unwrap();

    table.goto(0).unwrap();
    let mut row = table.row().unwrap();
    row.set_by_name("NOTE", Datum::Text("second".into())).unwrap();
    table.write_row(&row).unwrap();
    table.close().unwrap();

    let memo_len = std::fs::metadata(dir.path().join("grow.fpt")).unwrap().len();
    assert!(memo_len >= 3 * 64, "old blocks stay, new blocks append");

    let table = OpenOptions::new().open(&path).unwrap();
    assert_eq!(table.next().unwrap().string("NOTE").unwrap(), "second");
}

#[test]
fn shared_table_appends_from_threads() {
    let dir = TempDir::new().unwrap();
    let (_, table) = people_table(dir.path());
    let table = Arc::new(table);
    let mut handles = Vec::new();
    for t in 0..4 {
        let table = Arc::clone(&table);
        handles.push(std::thread::spawn(move || {
            for i in 0..8 {
                let mut row = table
                    .new_row(vec![
                        Datum::Integer(100 + t * 8 + i),
                        Datum::Text("WORKER".into()),
                        Datum::Logical(true),
                    ])
                    .unwrap();
                table.append_row(&mut row).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(table.record_count(), 1 + 32);
}

#[test]
fn missing_table_and_version_errors() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.dbf");
    assert!(matches!(
        OpenOptions::new().open(&missing),
        Err(ref e) if matches!(e.kind(), ErrorKind::NoTableFile(_))
    ));

    // An old version byte is rejected unless untested is set.
    let (path, table) = people_table(dir.path());
    table.close().unwrap();
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] = 0x8B;
    std::fs::write(&path, &bytes).unwrap();
    assert!(matches!(
        OpenOptions::new().open(&path),
        Err(ref e) if matches!(e.kind(), ErrorKind::InvalidVersion { version: 0x8B })
    ));
    let table = OpenOptions::new().untested(true).open(&path).unwrap();
    assert_eq!(table.record_count(), 1);
}

#[test]
fn exclusive_open_is_taken_once() {
    let dir = TempDir::new().unwrap();
    let (path, table) = people_table(dir.path());
    table.close().unwrap();

    let first = OpenOptions::new().exclusive(true).open(&path).unwrap();
    #[cfg(unix)]
    {
        let second = OpenOptions::new().exclusive(true).open(&path);
        assert!(second.is_err(), "second exclusive open must fail");
    }
    first.close().unwrap();
    let third = OpenOptions::new().exclusive(true).open(&path).unwrap();
    third.close().unwrap();
}
