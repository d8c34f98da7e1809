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

//! Errors raised by this crate.
//!
//! [Error] is the single error type used throughout: an [ErrorKind] with
//! its human message, a chain of contributing causes added through
//! [with_cause](Error::with_cause), and, in debug builds, the source
//! location that constructed the error.  End-of-file and beginning-of-file
//! are ordinary terminal conditions for cursor movement, not corruption;
//! everything else either aborts the operation (row-level errors) or the
//! whole open (structural errors).

use std::{
    error::Error as StdError,
    fmt::{Debug, Display, Formatter},
    io::Error as IoError,
};

use thiserror::Error as ThisError;

/// What went wrong, with the human-readable message.
#[derive(Debug, ThisError)]
pub enum ErrorKind {
    /// The cursor moved past the last row.
    #[error("EOF")]
    Eof,

    /// The cursor moved before the first row.
    #[error("BOF")]
    Bof,

    /// A read or write finished short.
    #[error("incomplete {operation} at offset {offset:#x}: got {got} of {wanted} bytes")]
    Incomplete {
        /// What was being transferred.
        operation: &'static str,
        /// Byte offset of the transfer.
        offset: u64,
        /// Bytes actually transferred.
        got: usize,
        /// Bytes requested.
        wanted: usize,
    },

    /// A memo column was accessed but no memo file is attached.
    #[error("no memo file: {0}")]
    NoMemoFile(String),

    /// The table file does not exist or could not be opened.
    #[error("no table file: {0}")]
    NoTableFile(String),

    /// A column name or index does not identify a column.
    #[error("invalid column position: {0}")]
    InvalidPosition(String),

    /// The code-page mark is unknown, or text could not be transcoded.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// A value cannot be coerced to or from the column's type.
    #[error("unknown data type: {0}")]
    UnknownDataType(String),

    /// The file-version byte is not in the supported set.
    #[error("untested DBF file version {version:#04x}")]
    InvalidVersion {
        /// The version byte read from the header.
        version: u8,
    },

    /// The open- or create-time configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The file contents contradict themselves.
    #[error("corrupt table: {0}")]
    Corrupt(String),

    /// An operating-system I/O failure.
    #[error("I/O error ({0})")]
    Io(#[from] IoError),
}

/// A boxed contributing cause.
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// An error reading, writing, or navigating a table.
///
/// Carries an [ErrorKind] plus any number of contributing causes.  Debug
/// builds also record where the error was constructed; release builds
/// drop the capture point entirely.
pub struct Error {
    kind: ErrorKind,
    causes: Vec<Cause>,
    #[cfg(debug_assertions)]
    location: &'static std::panic::Location<'static>,
}

impl Error {
    /// Wraps `kind`, capturing the caller's location in debug builds.
    #[track_caller]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            causes: Vec::new(),
            #[cfg(debug_assertions)]
            location: std::panic::Location::caller(),
        }
    }

    /// Appends a contributing cause and returns `self`.
    pub fn with_cause(mut self, cause: impl Into<Cause>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// The kind of error, with its message.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The chain of contributing causes, outermost first.
    pub fn causes(&self) -> &[Cause] {
        &self.causes
    }

    /// Where the error was constructed.  Only debug builds record this.
    #[cfg(debug_assertions)]
    pub fn location(&self) -> &'static std::panic::Location<'static> {
        self.location
    }

    /// Returns true for the ordinary terminal cursor conditions.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ErrorKind::Eof | ErrorKind::Bof)
    }

    /// True if the cursor ran past the last row.
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, ErrorKind::Eof)
    }

    /// True if the cursor ran before the first row.
    pub fn is_bof(&self) -> bool {
        matches!(self.kind, ErrorKind::Bof)
    }

    #[track_caller]
    pub(crate) fn eof() -> Self {
        Self::new(ErrorKind::Eof)
    }

    #[track_caller]
    pub(crate) fn bof() -> Self {
        Self::new(ErrorKind::Bof)
    }

    #[track_caller]
    pub(crate) fn incomplete(
        operation: &'static str,
        offset: u64,
        got: usize,
        wanted: usize,
    ) -> Self {
        Self::new(ErrorKind::Incomplete {
            operation,
            offset,
            got,
            wanted,
        })
    }

    #[track_caller]
    pub(crate) fn no_memo_file(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoMemoFile(message.into()))
    }

    #[track_caller]
    pub(crate) fn no_table_file(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoTableFile(message.into()))
    }

    #[track_caller]
    pub(crate) fn invalid_position(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPosition(message.into()))
    }

    #[track_caller]
    pub(crate) fn invalid_encoding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidEncoding(message.into()))
    }

    #[track_caller]
    pub(crate) fn unknown_data_type(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownDataType(message.into()))
    }

    #[track_caller]
    pub(crate) fn invalid_version(version: u8) -> Self {
        Self::new(ErrorKind::InvalidVersion { version })
    }

    #[track_caller]
    pub(crate) fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfiguration(message.into()))
    }

    #[track_caller]
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corrupt(message.into()))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        for cause in &self.causes {
            write!(f, " => {cause}")?;
        }
        Ok(())
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        #[cfg(debug_assertions)]
        write!(f, "{}:{}: ", self.location.file(), self.location.line())?;
        write!(f, "{:?}", self.kind)?;
        for cause in &self.causes {
            write!(f, " => {cause}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorKind::Io(e) => Some(e),
            _ => self
                .causes
                .first()
                .map(|cause| cause.as_ref() as &(dyn StdError + 'static)),
        }
    }
}

impl From<ErrorKind> for Error {
    #[track_caller]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<IoError> for Error {
    #[track_caller]
    fn from(error: IoError) -> Self {
        Self::new(ErrorKind::Io(error))
    }
}

impl From<binrw::Error> for Error {
    #[track_caller]
    fn from(error: binrw::Error) -> Self {
        match error {
            binrw::Error::Io(e) => Self::new(ErrorKind::Io(e)),
            other => {
                Self::new(ErrorKind::Corrupt("binary layout mismatch".into())).with_cause(other)
            }
        }
    }
}

/// Shorthand for results returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;
