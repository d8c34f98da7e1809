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

//! Calendar conversions for the on-disk date representations.
//!
//! `DateTime` columns store a Julian day number and a count of milliseconds
//! since midnight, both as 32-bit integers.  `Date` columns store eight
//! ASCII digits `YYYYMMDD`.  Day number zero and an all-blank date are the
//! respective null sentinels.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::{Error, Result};

/// Julian day number of 0001-01-01 in the proleptic Gregorian calendar,
/// minus one, so that `jdn = num_days_from_ce + JDN_OF_CE`.
const JDN_OF_CE: i64 = 1_721_425;

/// Converts a date to its Julian day number.
pub fn julian_day_number(date: NaiveDate) -> u32 {
    (date.num_days_from_ce() as i64 + JDN_OF_CE) as u32
}

/// Converts a Julian day number back to a date.  Day number zero is the
/// null sentinel and yields `None`, as does a day number outside chrono's
/// representable range.
pub fn date_from_julian_day(jdn: u32) -> Option<NaiveDate> {
    if jdn == 0 {
        return None;
    }
    let days = jdn as i64 - JDN_OF_CE;
    NaiveDate::from_num_days_from_ce_opt(i32::try_from(days).ok()?)
}

/// Milliseconds since midnight for `time`.  Sub-millisecond precision is
/// discarded, matching the file format.
pub fn milliseconds_since_midnight(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight() * 1000 + time.nanosecond() / 1_000_000
}

/// Converts a millisecond-of-day count back to a time of day.
pub fn time_from_milliseconds(ms: u32) -> Option<NaiveTime> {
    NaiveTime::from_num_seconds_from_midnight_opt(ms / 1000, (ms % 1000) * 1_000_000)
}

/// Splits a datetime into its stored `(julian day, milliseconds)` pair.
pub fn encode_datetime(datetime: NaiveDateTime) -> (u32, u32) {
    (
        julian_day_number(datetime.date()),
        milliseconds_since_midnight(datetime.time()),
    )
}

/// Reassembles a datetime from its stored pair.  A zero day number is the
/// null sentinel.
pub fn decode_datetime(jdn: u32, ms: u32) -> Result<Option<NaiveDateTime>> {
    if jdn == 0 {
        return Ok(None);
    }
    let date = date_from_julian_day(jdn)
        .ok_or_else(|| Error::corrupt(format!("julian day {jdn} is out of range")))?;
    let time = time_from_milliseconds(ms)
        .ok_or_else(|| Error::corrupt(format!("{ms} milliseconds is more than a day")))?;
    Ok(Some(date.and_time(time)))
}

/// Formats a date as the eight ASCII digits stored in a `Date` column.
pub fn encode_date(date: NaiveDate) -> [u8; 8] {
    let mut out = [0; 8];
    let s = format!("{:04}{:02}{:02}", date.year(), date.month(), date.day());
    out.copy_from_slice(s.as_bytes());
    out
}

/// Parses the eight-byte `YYYYMMDD` representation.  All blanks (and, in
/// files written by some producers, all zero digits) is the null date.
pub fn decode_date(raw: &[u8]) -> Result<Option<NaiveDate>> {
    if raw.iter().all(|&b| b == b' ' || b == 0) || raw == b"00000000" {
        return Ok(None);
    }
    let s = std::str::from_utf8(raw)
        .map_err(|_| Error::corrupt(format!("date field {raw:?} is not ASCII")))?;
    NaiveDate::parse_from_str(s.trim(), "%Y%m%d")
        .map(Some)
        .map_err(|_| Error::corrupt(format!("date field {s:?} is not in YYYYMMDD form")))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;

    #[test]
    fn known_julian_days() {
        let date = NaiveDate::from_ymd_opt(2022, 10, 15).unwrap();
        assert_eq!(julian_day_number(date), 2_459_868);
        assert_eq!(date_from_julian_day(2_459_868), Some(date));

        let y2k = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert_eq!(julian_day_number(y2k), 2_451_545);
    }

    #[test]
    fn zero_day_is_null() {
        assert_eq!(date_from_julian_day(0), None);
        assert_eq!(decode_datetime(0, 12345).unwrap(), None);
    }

    #[test]
    fn datetime_round_trip() {
        let dt = NaiveDate::from_ymd_opt(1998, 2, 3)
            .unwrap()
            .and_time(NaiveTime::from_hms_milli_opt(13, 30, 5, 250).unwrap());
        let (jdn, ms) = encode_datetime(dt);
        assert_eq!(decode_datetime(jdn, ms).unwrap(), Some(dt));
    }

    #[test]
    fn date_codec() {
        let date = NaiveDate::from_ymd_opt(1989, 12, 31).unwrap();
        assert_eq!(&encode_date(date), b"19891231");
        assert_eq!(decode_date(b"19891231").unwrap(), Some(date));
        assert_eq!(decode_date(b"        ").unwrap(), None);
        assert_eq!(decode_date(b"00000000").unwrap(), None);
        assert!(decode_date(b"1989123x").is_err());
    }
}
