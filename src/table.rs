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

//! Open tables and the cursor state machine.
//!
//! A [Table] bundles the table file, its memo file when one exists, the
//! decoded header and column list, a transcoder, and a row cursor.  The
//! cursor is [BOF](Table::bof) after open, `at(n)` after positioning, and
//! [EOF](Table::eof) past the last row; moving past either end is the
//! ordinary way iteration terminates.
//!
//! Every public operation takes the table's mutex, so a `Table` may be
//! shared between threads behind an `Arc`.  Writes under the `write_lock`
//! option take advisory range locks in a fixed order (record, then memo,
//! then header) so concurrent processes interleave safely.

use std::{
    io::{Read, Seek, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use chrono::Local;
use tracing::debug;

use crate::{
    codepage::{Registry, Transcoder},
    column::{Column, Columns},
    data::Datum,
    error::{Error, Result},
    header::{FileVersion, Header, EOF_MARKER, HEADER_SIZE},
    io::{Memory, OsFile, PositionedIo, Stream},
    memo::{MemoFile, DEFAULT_BLOCK_SIZE},
    record::{Field, Row, RowCodec, ACTIVE, DELETED},
};

/// Maximum number of records a table may hold.
pub const MAX_RECORDS: u32 = 1_000_000_000;

/// How a table file is opened.
///
/// The defaults open read-write, non-exclusive, with no locking, strict
/// version checking, and text post-processing off.
#[derive(Clone)]
pub struct OpenOptions {
    exclusive: bool,
    read_only: bool,
    write_lock: bool,
    untested: bool,
    trim_spaces: bool,
    collapse_spaces: bool,
    validate_code_page: bool,
    interpret_code_page: bool,
    convert_underscores: bool,
    converter: Option<Arc<dyn Transcoder>>,
    registry: Registry,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            exclusive: false,
            read_only: false,
            write_lock: false,
            untested: false,
            trim_spaces: false,
            collapse_spaces: false,
            validate_code_page: false,
            interpret_code_page: false,
            convert_underscores: true,
            converter: None,
            registry: Registry::default(),
        }
    }
}

impl OpenOptions {
    /// Constructs the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes an exclusive whole-file lock at open.
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Refuses every write operation.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Takes advisory range locks around each write.
    pub fn write_lock(mut self, write_lock: bool) -> Self {
        self.write_lock = write_lock;
        self
    }

    /// Accepts file versions outside the tested FoxPro set.
    pub fn untested(mut self, untested: bool) -> Self {
        self.untested = untested;
        self
    }

    /// Strips leading and trailing spaces from decoded text.
    pub fn trim_spaces(mut self, trim_spaces: bool) -> Self {
        self.trim_spaces = trim_spaces;
        self
    }

    /// Collapses runs of spaces in decoded text to one space.
    pub fn collapse_spaces(mut self, collapse_spaces: bool) -> Self {
        self.collapse_spaces = collapse_spaces;
        self
    }

    /// Fails the open when the header's code-page mark is unknown.
    pub fn validate_code_page(mut self, validate_code_page: bool) -> Self {
        self.validate_code_page = validate_code_page;
        self
    }

    /// Prefers the header's code-page mark over a configured converter.
    pub fn interpret_code_page(mut self, interpret_code_page: bool) -> Self {
        self.interpret_code_page = interpret_code_page;
        self
    }

    /// Disables mapping `_` to space when resolving container members.
    pub fn disable_convert_filename_underscores(mut self, disable: bool) -> Self {
        self.convert_underscores = !disable;
        self
    }

    /// Uses `converter` for text instead of the header's code page.
    pub fn converter(mut self, converter: Arc<dyn Transcoder>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Replaces the code-page registry consulted at open.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub(crate) fn convert_underscores(&self) -> bool {
        self.convert_underscores
    }

    /// Opens the table at `path`, and the memo file beside it when the
    /// schema requires one.
    pub fn open(self, path: impl AsRef<Path>) -> Result<Table> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::no_table_file(path.display().to_string()));
        }
        let io = OsFile::open(path, self.read_only)
            .map_err(|e| Error::no_table_file(path.display().to_string()).with_cause(e))?;
        let memo_path = sibling_memo_path(path);
        let memo_io: Option<Box<dyn PositionedIo>> = match &memo_path {
            Some(memo_path) => Some(Box::new(
                OsFile::open(memo_path, self.read_only)
                    .map_err(|e| Error::no_memo_file(memo_path.display().to_string()).with_cause(e))?,
            )),
            None => None,
        };
        let name = path.display().to_string();
        let table = self.open_io(Box::new(io), memo_io, name)?;
        {
            let mut inner = table.lock_inner();
            inner.path = Some(path.to_path_buf());
            if inner.memo.is_none() && inner.columns.has_memo_columns() {
                return Err(Error::no_memo_file(format!(
                    "{} has memo columns but no memo file was found beside it",
                    path.display()
                )));
            }
        }
        Ok(table)
    }

    /// Opens a table held in memory, with the memo file contents when the
    /// schema requires one.
    pub fn open_memory(self, data: Vec<u8>, memo: Option<Vec<u8>>) -> Result<Table> {
        let memo_io: Option<Box<dyn PositionedIo>> =
            memo.map(|m| Box::new(Memory::new(m)) as Box<dyn PositionedIo>);
        self.open_io(Box::new(Memory::new(data)), memo_io, "<memory>".into())
    }

    /// Opens a table over caller-supplied streams.
    pub fn open_stream<S>(self, stream: S, memo: Option<S>) -> Result<Table>
    where
        S: Read + Write + Seek + Send + 'static,
    {
        let memo_io: Option<Box<dyn PositionedIo>> =
            memo.map(|m| Box::new(Stream::new(m)) as Box<dyn PositionedIo>);
        self.open_io(Box::new(Stream::new(stream)), memo_io, "<stream>".into())
    }

    fn open_io(
        self,
        mut io: Box<dyn PositionedIo>,
        memo_io: Option<Box<dyn PositionedIo>>,
        name: String,
    ) -> Result<Table> {
        if self.exclusive {
            io.lock_exclusive()?;
        }
        let header = Header::read(&mut *io)?;
        header.version.validate(self.untested)?;
        let columns = Columns::read(&mut *io, header.first_record_offset)?;
        if columns.row_size() != header.row_size {
            return Err(Error::corrupt(format!(
                "header says rows are {} bytes but the columns sum to {}",
                header.row_size,
                columns.row_size()
            )));
        }

        let mark = header.code_page_mark;
        if self.validate_code_page && !self.registry.contains(mark) {
            return Err(Error::invalid_encoding(format!(
                "unknown code-page mark {mark:#04x}"
            )));
        }
        let transcoder = if self.interpret_code_page {
            self.registry.get(mark)?
        } else if let Some(converter) = self.converter.clone() {
            converter
        } else {
            self.registry.get(mark)?
        };

        let memo = match memo_io {
            Some(memo_io) => Some(MemoFile::open(memo_io, self.write_lock)?),
            None => None,
        };

        let expected = header.expected_len();
        let actual = io.len()?;
        if actual > expected {
            // Trailing bytes past the counted records are tolerated; the
            // next successful append truncates them away.
            debug!(name = %name, actual, expected, "table has trailing bytes");
        }

        debug!(
            name = %name,
            records = header.record_count,
            columns = columns.len(),
            version = ?header.version,
            "opened table"
        );
        Ok(Table {
            inner: Mutex::new(Inner {
                name,
                path: None,
                io,
                memo,
                header,
                columns: Arc::new(columns),
                transcoder,
                cursor: Cursor::Bof,
                read_only: self.read_only,
                write_lock: self.write_lock,
                trim_spaces: self.trim_spaces,
                collapse_spaces: self.collapse_spaces,
            }),
        })
    }
}

/// Declares and creates a new table.
pub struct TableBuilder {
    version: FileVersion,
    columns: Vec<Column>,
    code_page_mark: u8,
    memo_block_size: u16,
    registry: Registry,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self {
            version: FileVersion::FoxPro,
            columns: Vec::new(),
            code_page_mark: 0x03,
            memo_block_size: DEFAULT_BLOCK_SIZE,
            registry: Registry::default(),
        }
    }
}

impl TableBuilder {
    /// Constructs a builder with no columns, FoxPro version, and
    /// code page 1252.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the file version to write.
    pub fn version(mut self, version: FileVersion) -> Self {
        self.version = version;
        self
    }

    /// Appends a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the code-page mark (and with it the text encoding).
    pub fn code_page_mark(mut self, mark: u8) -> Self {
        self.code_page_mark = mark;
        self
    }

    /// Sets the memo block size used when the schema needs a memo file.
    pub fn memo_block_size(mut self, block_size: u16) -> Self {
        self.memo_block_size = block_size;
        self
    }

    /// Replaces the code-page registry.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Creates the table at `path`, plus the memo file beside it when the
    /// schema has memo columns.
    pub fn create(self, path: impl AsRef<Path>) -> Result<Table> {
        let path = path.as_ref();
        let needs_memo = self.columns.iter().any(|c| c.data_type().is_memo());
        let io = OsFile::create(path)?;
        let memo_io: Option<Box<dyn PositionedIo>> = if needs_memo {
            let memo_path = created_memo_path(path);
            Some(Box::new(OsFile::create(memo_path)?))
        } else {
            None
        };
        let name = path.display().to_string();
        let table = self.create_io(Box::new(io), memo_io, name)?;
        table.lock_inner().path = Some(path.to_path_buf());
        Ok(table)
    }

    /// Creates the table in memory.
    pub fn create_memory(self) -> Result<Table> {
        let needs_memo = self.columns.iter().any(|c| c.data_type().is_memo());
        let memo_io: Option<Box<dyn PositionedIo>> = if needs_memo {
            Some(Box::new(Memory::default()))
        } else {
            None
        };
        self.create_io(Box::new(Memory::default()), memo_io, "<memory>".into())
    }

    fn create_io(
        self,
        mut io: Box<dyn PositionedIo>,
        memo_io: Option<Box<dyn PositionedIo>>,
        name: String,
    ) -> Result<Table> {
        let columns = Columns::new(self.columns)?;
        let has_variable = columns.iter().any(|c| c.data_type().is_variable());
        let version = match self.version {
            FileVersion::FoxPro if has_variable => FileVersion::FoxProVar,
            version => version,
        };
        let transcoder = self.registry.get(self.code_page_mark)?;
        let header = Header::new(
            version,
            columns.descriptor_count(),
            columns.row_size(),
            self.code_page_mark,
            Local::now().date_naive(),
            columns.has_memo_columns(),
        );

        header.write(&mut *io)?;
        columns.write(&mut *io)?;
        io.write_at(header.first_record_offset as u64, &[EOF_MARKER])?;
        io.set_len(header.expected_len())?;

        let memo = match memo_io {
            Some(memo_io) => Some(MemoFile::create(memo_io, self.memo_block_size, false)?),
            None => None,
        };

        debug!(name = %name, columns = columns.len(), version = ?version, "created table");
        Ok(Table {
            inner: Mutex::new(Inner {
                name,
                path: None,
                io,
                memo,
                header,
                columns: Arc::new(columns),
                transcoder,
                cursor: Cursor::Bof,
                read_only: false,
                write_lock: false,
                trim_spaces: false,
                collapse_spaces: false,
            }),
        })
    }
}

/// Memo sibling of an existing table path, if one exists on disk.
fn sibling_memo_path(path: &Path) -> Option<PathBuf> {
    let table_ext = path.extension()?.to_str()?;
    let memo_ext = match table_ext.to_ascii_uppercase().as_str() {
        "DBC" => "dct",
        _ => "fpt",
    };
    for candidate_ext in [memo_ext.to_string(), memo_ext.to_ascii_uppercase()] {
        let candidate = path.with_extension(&candidate_ext);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Memo sibling for a table being created, case following the table
/// extension.
fn created_memo_path(path: &Path) -> PathBuf {
    let table_ext = path.extension().and_then(|e| e.to_str()).unwrap_or("dbf");
    let memo_ext = match table_ext.to_ascii_uppercase().as_str() {
        "DBC" => "dct",
        _ => "fpt",
    };
    let upper = table_ext.chars().any(|c| c.is_ascii_uppercase());
    path.with_extension(if upper {
        memo_ext.to_ascii_uppercase()
    } else {
        memo_ext.to_string()
    })
}

/// The row cursor.  `Bof` is distinct from being at row zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Cursor {
    Bof,
    At(u32),
    Eof,
}

struct Inner {
    name: String,
    path: Option<PathBuf>,
    io: Box<dyn PositionedIo>,
    memo: Option<MemoFile>,
    header: Header,
    columns: Arc<Columns>,
    transcoder: Arc<dyn Transcoder>,
    cursor: Cursor,
    read_only: bool,
    write_lock: bool,
    trim_spaces: bool,
    collapse_spaces: bool,
}

/// An open table file.
///
/// All operations are serialized by an internal mutex, so a `Table` can be
/// shared across threads behind an `Arc`; operations on distinct tables
/// never contend.
pub struct Table {
    inner: Mutex<Inner>,
}

impl Table {
    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current header.
    pub fn header(&self) -> Header {
        self.lock_inner().header.clone()
    }

    /// The table's columns.
    pub fn columns(&self) -> Arc<Columns> {
        Arc::clone(&self.lock_inner().columns)
    }

    /// Number of records, including deleted ones.
    pub fn record_count(&self) -> u32 {
        self.lock_inner().header.record_count
    }

    /// The path the table was opened from, if it came from the filesystem.
    pub fn path(&self) -> Option<PathBuf> {
        self.lock_inner().path.clone()
    }

    /// True while the cursor is before the first row.
    pub fn bof(&self) -> bool {
        self.lock_inner().cursor == Cursor::Bof
    }

    /// True once the cursor is past the last row.
    pub fn eof(&self) -> bool {
        let inner = self.lock_inner();
        inner.cursor == Cursor::Eof
            || matches!(inner.cursor, Cursor::At(n) if n >= inner.header.record_count)
            || (inner.cursor == Cursor::Bof && inner.header.record_count == 0)
    }

    /// Positions the cursor at row `index`.  Positioning past the end
    /// leaves the cursor at EOF and reports [ErrorKind::Eof](crate::error::ErrorKind::Eof).
    pub fn goto(&self, index: u32) -> Result<()> {
        let mut inner = self.lock_inner();
        if index < inner.header.record_count {
            inner.cursor = Cursor::At(index);
            Ok(())
        } else {
            inner.cursor = Cursor::Eof;
            Err(Error::eof())
        }
    }

    /// Moves the cursor by `offset` rows, clamping at both ends.  Deleted
    /// rows are not skipped.
    pub fn skip(&self, offset: i64) {
        let mut inner = self.lock_inner();
        let count = inner.header.record_count as i64;
        let current = match inner.cursor {
            Cursor::Bof => -1,
            Cursor::At(n) => n as i64,
            Cursor::Eof => count,
        };
        let target = current.saturating_add(offset).clamp(0, count);
        inner.cursor = if target == count {
            Cursor::Eof
        } else {
            Cursor::At(target as u32)
        };
    }

    /// Advances to the following row and decodes it.  At the end of the
    /// table the cursor parks at EOF and [ErrorKind::Eof](crate::error::ErrorKind::Eof) is returned.
    pub fn next(&self) -> Result<Row> {
        let mut inner = self.lock_inner();
        let count = inner.header.record_count as i64;
        let target = match inner.cursor {
            Cursor::Bof => 0,
            Cursor::At(n) => n as i64 + 1,
            Cursor::Eof => count,
        };
        if target >= count {
            inner.cursor = Cursor::Eof;
            return Err(Error::eof());
        }
        let target = target as u32;
        inner.cursor = Cursor::At(target);
        inner.decode_at(target)
    }

    /// Decodes the row under the cursor.
    pub fn row(&self) -> Result<Row> {
        let mut inner = self.lock_inner();
        match inner.cursor {
            Cursor::Bof => Err(Error::bof()),
            Cursor::Eof => Err(Error::eof()),
            Cursor::At(index) => inner.decode_at(index),
        }
    }

    /// Whether the row under the cursor carries the deletion marker.
    pub fn deleted(&self) -> Result<bool> {
        let mut inner = self.lock_inner();
        let index = inner.cursor_index()?;
        let offset = inner.header.record_offset(index);
        let mut marker = [0];
        inner.io.read_at(offset, &mut marker)?;
        Ok(marker[0] == DELETED)
    }

    /// Marks the row under the cursor deleted.  The record's bytes are
    /// otherwise untouched.
    pub fn delete(&self) -> Result<()> {
        self.set_deletion_marker(DELETED)
    }

    /// Clears the deletion marker of the row under the cursor.
    pub fn undelete(&self) -> Result<()> {
        self.set_deletion_marker(ACTIVE)
    }

    fn set_deletion_marker(&self, marker: u8) -> Result<()> {
        let mut inner = self.lock_inner();
        inner.ensure_writable()?;
        let index = inner.cursor_index()?;
        let offset = inner.header.record_offset(index);
        let row_size = inner.header.row_size as u64;
        if inner.write_lock {
            inner.io.lock_range(offset..offset + row_size)?;
        }
        let result = inner.io.write_at(offset, &[marker]);
        if inner.write_lock {
            inner.io.unlock_range(offset..offset + row_size)?;
        }
        result
    }

    /// Builds a row for this table's columns, one datum per column.
    pub fn new_row(&self, data: Vec<Datum>) -> Result<Row> {
        Row::new(self.columns(), data)
    }

    /// Builds a search field, validating the column name.
    pub fn new_field(&self, name: &str, datum: Datum) -> Result<Field> {
        let inner = self.lock_inner();
        let index = inner
            .columns
            .index_of(name)
            .ok_or_else(|| Error::invalid_position(format!("no column named {name:?}")))?;
        Ok(Field::new(index, name.to_string(), datum))
    }

    /// Appends `row` at the end of the table and returns its record
    /// number.  The header is rewritten with the new record count and
    /// today's date before the operation reports success.
    pub fn append_row(&self, row: &mut Row) -> Result<()> {
        let mut inner = self.lock_inner();
        inner.ensure_writable()?;
        if inner.header.record_count >= MAX_RECORDS {
            return Err(Error::invalid_configuration(format!(
                "table is at the limit of {MAX_RECORDS} records"
            )));
        }
        let index = inner.header.record_count;
        let offset = inner.header.record_offset(index);
        let row_size = inner.header.row_size as u64;
        if inner.write_lock {
            inner.io.lock_range(offset..offset + row_size)?;
        }
        let result = inner.append_locked(row, index, offset);
        if inner.write_lock {
            inner.io.unlock_range(offset..offset + row_size)?;
        }
        result
    }

    /// Rewrites `row` in place at its own position.  Stamps the header
    /// date; the record count is unchanged.
    pub fn write_row(&self, row: &Row) -> Result<()> {
        let mut inner = self.lock_inner();
        inner.ensure_writable()?;
        let index = row.position().ok_or_else(|| {
            Error::invalid_position("the row has no position; append it instead")
        })?;
        if index >= inner.header.record_count {
            return Err(Error::invalid_position(format!(
                "row {index} is past the {} records",
                inner.header.record_count
            )));
        }
        let offset = inner.header.record_offset(index);
        let row_size = inner.header.row_size as u64;
        if inner.write_lock {
            inner.io.lock_range(offset..offset + row_size)?;
        }
        let result = inner.write_locked(row, offset);
        if inner.write_lock {
            inner.io.unlock_range(offset..offset + row_size)?;
        }
        result
    }

    /// Scans the whole table for active rows whose value in the field's
    /// column matches.  `exact` demands equality; otherwise text columns
    /// match on substrings.  Results come back in file order.
    pub fn search(&self, field: &Field, exact: bool) -> Result<Vec<Row>> {
        self.search_inner(field, exact, false)
    }

    /// Like [search](Self::search), but deleted rows are included.
    pub fn search_with_deleted(&self, field: &Field, exact: bool) -> Result<Vec<Row>> {
        self.search_inner(field, exact, true)
    }

    fn search_inner(&self, field: &Field, exact: bool, include_deleted: bool) -> Result<Vec<Row>> {
        let mut inner = self.lock_inner();
        let count = inner.header.record_count;
        let mut rows = Vec::new();
        for index in 0..count {
            let buf = inner.read_record(index)?;
            if !include_deleted && buf[0] == DELETED {
                continue;
            }
            let row = inner.decode_buf(&buf, index)?;
            let datum = row.datum(field.index)?;
            let matched = if exact {
                datum.matches_exact(field.datum())
            } else {
                datum.matches_partial(field.datum())
            };
            if matched {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Closes the table and its memo file, releasing all locks.
    /// Idempotent.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.lock_inner();
        if let Some(memo) = inner.memo.as_mut() {
            memo.close()?;
        }
        inner.io.close()
    }
}

impl Inner {
    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::invalid_configuration(format!(
                "{} is open read-only",
                self.name
            )));
        }
        Ok(())
    }

    fn cursor_index(&self) -> Result<u32> {
        match self.cursor {
            Cursor::Bof => Err(Error::bof()),
            Cursor::Eof => Err(Error::eof()),
            Cursor::At(index) => Ok(index),
        }
    }

    fn read_record(&mut self, index: u32) -> Result<Vec<u8>> {
        if index >= self.header.record_count {
            return Err(Error::eof());
        }
        let offset = self.header.record_offset(index);
        let mut buf = vec![0; self.header.row_size as usize];
        self.io.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    fn decode_buf(&mut self, buf: &[u8], index: u32) -> Result<Row> {
        let mut codec = RowCodec {
            columns: &self.columns,
            transcoder: &*self.transcoder,
            trim_spaces: self.trim_spaces,
            collapse_spaces: self.collapse_spaces,
            memo: self.memo.as_mut(),
        };
        codec.decode(buf, index)
    }

    fn decode_at(&mut self, index: u32) -> Result<Row> {
        let buf = self.read_record(index)?;
        self.decode_buf(&buf, index)
    }

    fn encode_row(&mut self, row: &Row) -> Result<Vec<u8>> {
        let mut codec = RowCodec {
            columns: &self.columns,
            transcoder: &*self.transcoder,
            trim_spaces: self.trim_spaces,
            collapse_spaces: self.collapse_spaces,
            memo: self.memo.as_mut(),
        };
        codec.encode(row)
    }

    fn append_locked(&mut self, row: &mut Row, index: u32, offset: u64) -> Result<()> {
        let buf = self.encode_row(row)?;
        self.io.write_at(offset, &buf)?;
        let end = offset + buf.len() as u64;
        self.io.write_at(end, &[EOF_MARKER])?;
        // Reclaims any trailing garbage a crashed writer left behind.
        self.io.set_len(end + 1)?;
        self.header.record_count = index + 1;
        self.header.stamp(Local::now().date_naive());
        self.write_header()?;
        self.cursor = Cursor::At(index);
        row.set_position(index);
        debug!(name = %self.name, index, "appended row");
        Ok(())
    }

    fn write_locked(&mut self, row: &Row, offset: u64) -> Result<()> {
        let buf = self.encode_row(row)?;
        self.io.write_at(offset, &buf)?;
        self.header.stamp(Local::now().date_naive());
        self.write_header()
    }

    fn write_header(&mut self) -> Result<()> {
        if self.write_lock {
            self.io.lock_range(0..HEADER_SIZE as u64)?;
        }
        let result = self.header.write(&mut *self.io);
        if self.write_lock {
            self.io.unlock_range(0..HEADER_SIZE as u64)?;
        }
        result
    }
}
