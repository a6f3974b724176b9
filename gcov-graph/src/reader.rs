// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};

use crate::error::{FormatError, FormatErrorKind};

pub(crate) const WORD_SIZE: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Endian {
    Big,
    Little,
    Native,
}

impl Endian {
    fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            Endian::Big => BigEndian::read_u32(bytes),
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Native => NativeEndian::read_u32(bytes),
        }
    }
}

/// How the length word of a string is interpreted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum StringLength {
    /// Length counts 4-byte words, which include NUL padding.
    Words,

    /// Length counts bytes, followed by `4 - len % 4` bytes of padding.
    Bytes,
}

/// Cursor over the 32-bit words of a graph file, or of one record in it.
#[derive(Clone, Debug)]
pub(crate) struct WordReader<'d> {
    name: &'d str,
    data: &'d [u8],
    pos: usize,
    endian: Endian,
}

impl<'d> WordReader<'d> {
    pub fn new(name: &'d str, data: &'d [u8], endian: Endian) -> Self {
        Self {
            name,
            data,
            pos: 0,
            endian,
        }
    }

    pub fn name(&self) -> &'d str {
        self.name
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn error(&self, kind: FormatErrorKind) -> FormatError {
        FormatError::new(self.name, kind)
    }

    pub fn read_bytes(&mut self, len: usize, what: &'static str) -> Result<&'d [u8], FormatError> {
        if len > self.remaining() {
            return Err(self.error(FormatErrorKind::Truncated(what)));
        }

        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;

        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize, what: &'static str) -> Result<(), FormatError> {
        self.read_bytes(len, what)?;
        Ok(())
    }

    pub fn read_u32(&mut self, what: &'static str) -> Result<u32, FormatError> {
        let bytes = self.read_bytes(WORD_SIZE, what)?;
        Ok(self.endian.read_u32(bytes))
    }

    pub fn peek_u32(&self, what: &'static str) -> Result<u32, FormatError> {
        self.clone().read_u32(what)
    }

    /// Split off the next `len` bytes as a reader of their own, advancing past
    /// them regardless of how much of the sub-reader is later consumed.
    pub fn take(&mut self, len: usize, what: &'static str) -> Result<WordReader<'d>, FormatError> {
        let data = self.read_bytes(len, what)?;

        Ok(WordReader::new(self.name, data, self.endian))
    }

    pub fn read_string(
        &mut self,
        encoding: StringLength,
        what: &'static str,
    ) -> Result<String, FormatError> {
        let length = self.read_u32(what)? as usize;

        if length == 0 {
            return Ok(String::new());
        }

        let bytes = match encoding {
            StringLength::Words => {
                let size = length
                    .checked_mul(WORD_SIZE)
                    .ok_or_else(|| self.error(FormatErrorKind::Truncated(what)))?;
                self.read_bytes(size, what)?
            }
            StringLength::Bytes => {
                let bytes = self.read_bytes(length, what)?;
                self.skip(WORD_SIZE - length % WORD_SIZE, "string padding")?;
                bytes
            }
        };

        Ok(strip_nuls(bytes))
    }
}

pub(crate) fn strip_nuls(bytes: &[u8]) -> String {
    let bytes: Vec<u8> = bytes.iter().copied().filter(|b| *b != 0).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_words_both_orders() -> Result<(), FormatError> {
        let data = [0x01, 0x02, 0x03, 0x04];

        let mut big = WordReader::new("t", &data, Endian::Big);
        assert_eq!(big.read_u32("word")?, 0x01020304);
        assert!(big.is_empty());

        let mut little = WordReader::new("t", &data, Endian::Little);
        assert_eq!(little.read_u32("word")?, 0x04030201);

        Ok(())
    }

    #[test]
    fn test_truncated_word() {
        let data = [0x01, 0x02];
        let mut reader = WordReader::new("short.gcno", &data, Endian::Big);

        let err = reader.read_u32("record tag").unwrap_err();
        assert_eq!(err.kind, FormatErrorKind::Truncated("record tag"));
        assert_eq!(err.file, "short.gcno");
    }

    #[test]
    fn test_take_advances_by_declared_length() -> Result<(), FormatError> {
        let data = [0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3];
        let mut reader = WordReader::new("t", &data, Endian::Big);

        let mut record = reader.take(8, "record")?;
        assert_eq!(record.read_u32("word")?, 1);

        // The unread word of the record is skipped anyway.
        assert_eq!(reader.read_u32("word")?, 3);

        Ok(())
    }

    #[test]
    fn test_strings() -> Result<(), FormatError> {
        // Word-counted: 2 words, NUL padded.
        let words = [0, 0, 0, 2, b'm', b'a', b'i', b'n', b'.', b'c', 0, 0];
        let mut reader = WordReader::new("t", &words, Endian::Big);
        assert_eq!(reader.read_string(StringLength::Words, "name")?, "main.c");
        assert!(reader.is_empty());

        // Byte-counted: 4 bytes, then a full word of padding.
        let bytes = [0, 0, 0, 4, b'm', b'a', b'i', b'n', 0, 0, 0, 0];
        let mut reader = WordReader::new("t", &bytes, Endian::Big);
        assert_eq!(reader.read_string(StringLength::Bytes, "name")?, "main");
        assert!(reader.is_empty());

        let empty = [0, 0, 0, 0];
        let mut reader = WordReader::new("t", &empty, Endian::Big);
        assert_eq!(reader.read_string(StringLength::Bytes, "name")?, "");

        Ok(())
    }
}
