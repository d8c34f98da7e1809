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

//! Individual pieces of data.
//!
//! [Datum] is the decoded value of one field of one row.  Each column type
//! decodes to a fixed [Datum] variant (see [DataType](crate::column::DataType));
//! a null field decodes to [Datum::Null] regardless of column type.

use std::fmt::{Debug, Display, Formatter};

use chrono::{NaiveDate, NaiveDateTime};
use itertools::{EitherOrBoth, Itertools};
use serde::Serialize;

use crate::error::{Error, Result};

/// Fixed-point scale of a `Currency` value: four decimal digits.
pub const CURRENCY_SCALE: i64 = 10_000;

/// The decoded value of one field.
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Datum {
    /// The field is null.
    Null,
    /// A character, varchar, or text-memo value, already transcoded.
    Text(String),
    /// An integer value, also produced by numeric columns without decimals.
    Integer(i64),
    /// A floating-point value.
    Float(f64),
    /// A currency value, scaled by [CURRENCY_SCALE].
    Currency(i64),
    /// A logical value.
    Logical(bool),
    /// A date without a time of day.
    Date(NaiveDate),
    /// A date and time of day.
    DateTime(NaiveDateTime),
    /// A binary value: blob, varbinary, binary memo, or binary character.
    Bytes(Vec<u8>),
}

impl Datum {
    /// Returns true for [Datum::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// The text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Datum::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The integer content, if this value is exactly an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Datum::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// This value as a float.  Integer and currency values coerce.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Datum::Float(f) => Some(*f),
            Datum::Integer(n) => Some(*n as f64),
            Datum::Currency(c) => Some(*c as f64 / CURRENCY_SCALE as f64),
            _ => None,
        }
    }

    /// The logical content, if any.
    pub fn as_logical(&self) -> Option<bool> {
        match self {
            Datum::Logical(b) => Some(*b),
            _ => None,
        }
    }

    /// This value as a timestamp.  A date coerces to midnight.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Datum::DateTime(dt) => Some(*dt),
            Datum::Date(d) => d.and_hms_opt(0, 0, 0),
            _ => None,
        }
    }

    /// The binary content, if this is a binary value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Datum::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Like [as_text](Self::as_text) but an error on mismatch.
    pub fn try_text(&self) -> Result<&str> {
        self.as_text()
            .ok_or_else(|| self.coercion_error("a character value"))
    }

    /// Like [as_integer](Self::as_integer) but an error on mismatch.
    pub fn try_integer(&self) -> Result<i64> {
        self.as_integer()
            .ok_or_else(|| self.coercion_error("an integer value"))
    }

    /// Like [as_float](Self::as_float) but an error on mismatch.
    pub fn try_float(&self) -> Result<f64> {
        self.as_float()
            .ok_or_else(|| self.coercion_error("a numeric value"))
    }

    /// Like [as_logical](Self::as_logical) but an error on mismatch.
    pub fn try_logical(&self) -> Result<bool> {
        self.as_logical()
            .ok_or_else(|| self.coercion_error("a logical value"))
    }

    /// Like [as_timestamp](Self::as_timestamp) but an error on mismatch.
    pub fn try_timestamp(&self) -> Result<NaiveDateTime> {
        self.as_timestamp()
            .ok_or_else(|| self.coercion_error("a date or datetime value"))
    }

    /// Like [as_bytes](Self::as_bytes) but an error on mismatch.
    pub fn try_bytes(&self) -> Result<&[u8]> {
        self.as_bytes()
            .ok_or_else(|| self.coercion_error("a binary value"))
    }

    fn coercion_error(&self, wanted: &str) -> Error {
        Error::unknown_data_type(format!("{self:?} is not {wanted}"))
    }

    /// Compares two data for search purposes.  Text compares byte-wise with
    /// trailing spaces ignored on either side, so a padded fixed-width value
    /// matches its trimmed form.
    pub fn matches_exact(&self, other: &Datum) -> bool {
        match (self, other) {
            (Datum::Text(a), Datum::Text(b)) => a
                .bytes()
                .zip_longest(b.bytes())
                .all(|pair| match pair {
                    EitherOrBoth::Both(l, r) => l == r,
                    EitherOrBoth::Left(b) | EitherOrBoth::Right(b) => b == b' ',
                }),
            _ => self == other,
        }
    }

    /// Substring match for searches with `exact` unset.  Only text values
    /// compare partially; everything else falls back to exact comparison.
    pub fn matches_partial(&self, other: &Datum) -> bool {
        match (self, other) {
            (Datum::Text(haystack), Datum::Text(needle)) => {
                haystack.contains(needle.trim_end_matches(' '))
            }
            _ => self.matches_exact(other),
        }
    }
}

impl Debug for Datum {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Text(s) => write!(f, "{s:?}"),
            Datum::Integer(n) => write!(f, "{n:?}"),
            Datum::Float(x) => write!(f, "{x:?}"),
            Datum::Currency(c) => write!(f, "{}¤", *c as f64 / CURRENCY_SCALE as f64),
            Datum::Logical(b) => write!(f, "{b:?}"),
            Datum::Date(d) => write!(f, "{d:?}"),
            Datum::DateTime(dt) => write!(f, "{dt:?}"),
            Datum::Bytes(b) => write!(f, "{b:02x?}"),
        }
    }
}

impl Display for Datum {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Datum::Null => write!(f, ""),
            Datum::Text(s) => write!(f, "{s}"),
            Datum::Integer(n) => write!(f, "{n}"),
            Datum::Float(x) => write!(f, "{x}"),
            Datum::Currency(c) => write!(f, "{}", *c as f64 / CURRENCY_SCALE as f64),
            Datum::Logical(b) => write!(f, "{b}"),
            Datum::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Datum::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Datum::Bytes(b) => write!(f, "{} bytes", b.len()),
        }
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::Text(s.into())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::Text(s)
    }
}

impl From<i64> for Datum {
    fn from(n: i64) -> Self {
        Datum::Integer(n)
    }
}

impl From<i32> for Datum {
    fn from(n: i32) -> Self {
        Datum::Integer(n.into())
    }
}

impl From<f64> for Datum {
    fn from(x: f64) -> Self {
        Datum::Float(x)
    }
}

impl From<bool> for Datum {
    fn from(b: bool) -> Self {
        Datum::Logical(b)
    }
}

impl From<NaiveDate> for Datum {
    fn from(d: NaiveDate) -> Self {
        Datum::Date(d)
    }
}

impl From<NaiveDateTime> for Datum {
    fn from(dt: NaiveDateTime) -> Self {
        Datum::DateTime(dt)
    }
}

impl From<Vec<u8>> for Datum {
    fn from(b: Vec<u8>) -> Self {
        Datum::Bytes(b)
    }
}

impl<T> From<Option<T>> for Datum
where
    T: Into<Datum>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Datum::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn float_coercion() {
        assert_eq!(Datum::Integer(2).as_float(), Some(2.0));
        assert_eq!(Datum::Currency(35_000).as_float(), Some(3.5));
        assert_eq!(Datum::Text("2".into()).as_float(), None);
    }

    #[test]
    fn try_conversions_report_kind() {
        let err = Datum::Logical(true).try_text().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownDataType(_)));
    }

    #[test]
    fn text_matches_ignore_trailing_spaces() {
        let padded = Datum::Text("ALICE   ".into());
        assert!(padded.matches_exact(&Datum::Text("ALICE".into())));
        assert!(!padded.matches_exact(&Datum::Text("ALICES".into())));
        assert!(padded.matches_partial(&Datum::Text("LIC".into())));
    }

    #[test]
    fn null_conversions() {
        let datum: Datum = Option::<i64>::None.into();
        assert!(datum.is_null());
        assert!(datum.try_integer().is_err());
    }
}
