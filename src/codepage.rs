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

//! Character encodings for table files.
//!
//! One byte of the table header, the code-page mark, identifies the legacy
//! 8-bit encoding of every character and text-memo field in the file.  A
//! [Transcoder] converts between that encoding and Unicode, and a
//! [Registry] maps marks to transcoders.  Columns flagged binary bypass
//! transcoding entirely.
//!
//! Marks whose encodings are in the WHATWG set use [encoding_rs]; the DOS
//! OEM pages 437, 850, 852 and 865 have no such labels and are backed by
//! [yore] instead.

use std::{borrow::Cow, collections::BTreeMap, fmt::Debug, sync::Arc};

use encoding_rs::{Encoding, IBM866, WINDOWS_874, WINDOWS_1250, WINDOWS_1251, WINDOWS_1252,
                  WINDOWS_1253, WINDOWS_1254, WINDOWS_1255, WINDOWS_1256};
use yore::code_pages::{CP437, CP850, CP852, CP865};
use yore::CodePage;

use crate::error::{Error, Result};

/// A bidirectional mapping between a legacy 8-bit encoding and Unicode.
///
/// Decoding is lossy: bytes with no mapping become U+FFFD.  Encoding is
/// strict: a character the code page cannot represent is an error.
pub trait Transcoder: Send + Sync {
    /// A human-readable encoding name, such as `"cp866"`.
    fn name(&self) -> &'static str;

    /// Converts legacy bytes to Unicode.
    fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str>;

    /// Converts Unicode to legacy bytes.
    fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>>;
}

impl Debug for dyn Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Transcoder({})", self.name())
    }
}

/// A [Transcoder] backed by an [encoding_rs] encoding.
pub struct WebTranscoder {
    name: &'static str,
    encoding: &'static Encoding,
}

impl WebTranscoder {
    /// Wraps `encoding` as a transcoder.
    pub fn new(name: &'static str, encoding: &'static Encoding) -> Self {
        Self { name, encoding }
    }
}

impl Transcoder for WebTranscoder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let (text, _malformed) = self.encoding.decode_without_bom_handling(bytes);
        text
    }

    fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>> {
        let (bytes, _, unmappable) = self.encoding.encode(text);
        if unmappable {
            return Err(Error::invalid_encoding(format!(
                "{text:?} is not representable in {}",
                self.name
            )));
        }
        Ok(bytes)
    }
}

/// A [Transcoder] backed by a [yore] DOS OEM code page.
pub struct OemTranscoder<C> {
    name: &'static str,
    page: C,
}

impl<C> OemTranscoder<C>
where
    C: CodePage,
{
    /// Wraps `page` as a transcoder.
    pub fn new(name: &'static str, page: C) -> Self {
        Self { name, page }
    }
}

impl<C> Transcoder for OemTranscoder<C>
where
    C: CodePage + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        Cow::Owned(self.page.decode_lossy(bytes).into_owned())
    }

    fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>> {
        match self.page.encode(text) {
            Ok(bytes) => Ok(Cow::Owned(bytes.into_owned())),
            Err(_) => Err(Error::invalid_encoding(format!(
                "{text:?} is not representable in {}",
                self.name
            ))),
        }
    }
}

/// Maps code-page marks to transcoders.
///
/// [Registry::default] holds the built-in table below; additional entries
/// may be registered, and registering an existing mark replaces it.
///
/// | Mark | Code page |
/// |------|-----------|
/// | 0x01 | 437       |
/// | 0x02 | 850       |
/// | 0x03 | 1252      |
/// | 0x64 | 852       |
/// | 0x65 | 866       |
/// | 0x66 | 865       |
/// | 0x7C | 874       |
/// | 0x7D | 1255      |
/// | 0x7E | 1256      |
/// | 0xC8 | 1250      |
/// | 0xC9 | 1251      |
/// | 0xCA | 1254      |
/// | 0xCB | 1253      |
#[derive(Clone, Debug)]
pub struct Registry {
    entries: BTreeMap<u8, Arc<dyn Transcoder>>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self {
            entries: BTreeMap::new(),
        };
        registry.register(0x01, Arc::new(OemTranscoder::new("cp437", CP437)));
        registry.register(0x02, Arc::new(OemTranscoder::new("cp850", CP850)));
        registry.register(0x03, Arc::new(WebTranscoder::new("cp1252", WINDOWS_1252)));
        registry.register(0x64, Arc::new(OemTranscoder::new("cp852", CP852)));
        registry.register(0x65, Arc::new(WebTranscoder::new("cp866", IBM866)));
        registry.register(0x66, Arc::new(OemTranscoder::new("cp865", CP865)));
        registry.register(0x7C, Arc::new(WebTranscoder::new("cp874", WINDOWS_874)));
        registry.register(0x7D, Arc::new(WebTranscoder::new("cp1255", WINDOWS_1255)));
        registry.register(0x7E, Arc::new(WebTranscoder::new("cp1256", WINDOWS_1256)));
        registry.register(0xC8, Arc::new(WebTranscoder::new("cp1250", WINDOWS_1250)));
        registry.register(0xC9, Arc::new(WebTranscoder::new("cp1251", WINDOWS_1251)));
        registry.register(0xCA, Arc::new(WebTranscoder::new("cp1254", WINDOWS_1254)));
        registry.register(0xCB, Arc::new(WebTranscoder::new("cp1253", WINDOWS_1253)));
        registry
    }
}

impl Registry {
    /// Adds (or replaces) the transcoder for `mark`.
    pub fn register(&mut self, mark: u8, transcoder: Arc<dyn Transcoder>) {
        self.entries.insert(mark, transcoder);
    }

    /// Returns the transcoder for `mark`.
    pub fn get(&self, mark: u8) -> Result<Arc<dyn Transcoder>> {
        self.entries.get(&mark).cloned().ok_or_else(|| {
            Error::invalid_encoding(format!("unknown code-page mark {mark:#04x}"))
        })
    }

    /// True if `mark` has a registered transcoder.
    pub fn contains(&self, mark: u8) -> bool {
        self.entries.contains_key(&mark)
    }

    /// All registered marks, ascending.
    pub fn marks(&self) -> impl Iterator<Item = u8> + '_ {
        self.entries.keys().copied()
    }
}
