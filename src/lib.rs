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

//! # xbase
//!
//! A library for reading and writing legacy FoxPro and dBase table files
//! (`.DBF`), their memo files (`.FPT`), and Visual FoxPro database
//! containers (`.DBC`).
//!
//! The format is decades old and bit-exact compatibility matters more than
//! elegance: records are fixed-width byte buffers with a one-byte deletion
//! marker, text lives in legacy 8-bit code pages, memo values are block
//! chains in a second file, and nullability is squeezed into a hidden
//! bitmap column.  This crate implements that contract faithfully on top
//! of a small positioned-I/O abstraction, so the same codec runs over real
//! files, in-memory buffers, and caller-supplied streams.
//!
//! ## Reading a table
//!
//! ```no_run
//! use xbase::OpenOptions;
//!
//! # fn main() -> Result<(), xbase::Error> {
//! let table = OpenOptions::new().trim_spaces(true).open("customers.dbf")?;
//! loop {
//!     match table.next() {
//!         Ok(row) => println!("{} {}", row.integer("ID")?, row.string("NAME")?),
//!         Err(e) if e.is_eof() => break,
//!         Err(e) => return Err(e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Creating a table
//!
//! ```no_run
//! use xbase::{Column, DataType, Datum, TableBuilder};
//!
//! # fn main() -> Result<(), xbase::Error> {
//! let table = TableBuilder::new()
//!     .column(Column::new("ID", DataType::Integer, 4, 0, false)?)
//!     .column(Column::new("NAME", DataType::Character, 24, 0, false)?)
//!     .create("customers.dbf")?;
//! let mut row = table.new_row(vec![Datum::Integer(1), "ALICE".into()])?;
//! table.append_row(&mut row)?;
//! # Ok(())
//! # }
//! ```
//!
//! Navigation follows the dBase model: an internal cursor with BOF and EOF
//! sentinels, absolute [goto](Table::goto), relative [skip](Table::skip),
//! and [next](Table::next).  Deletion only marks a record
//! ([delete](Table::delete)); deleted rows stay in the file and are skipped
//! by [search](Table::search) unless asked for.

pub mod calendar;
pub mod codepage;
pub mod column;
pub mod data;
pub mod database;
pub mod error;
pub mod header;
pub mod io;
pub mod memo;
pub mod record;
pub mod table;

pub use codepage::{Registry, Transcoder};
pub use column::{Column, ColumnFlag, Columns, DataType};
pub use data::Datum;
pub use database::{Database, TableProvider};
pub use error::{Cause, Error, ErrorKind, Result};
pub use header::{FileVersion, Header, TableFlag};
pub use memo::{MemoFile, MemoHeader};
pub use record::{Field, Row};
pub use table::{OpenOptions, Table, TableBuilder};
