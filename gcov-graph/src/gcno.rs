// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Decoder for `.gcno` files.
//!
//! The byte order of a `.gcno` file is that of the machine that compiled the
//! program, so it is recovered from the magic word. The header's version word
//! decides which optional fields appear in the header and in FUNCTION records.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{FormatError, FormatErrorKind};
use crate::graph::{GraphBuilder, GraphData};
use crate::reader::{Endian, StringLength, WordReader};
use crate::record::{for_each_record, read_lines_record, RecordLength, RecordTag};
use crate::version::GcovVersion;
use crate::{DecodeOptions, SplitChecksum};

pub const MAGIC: u32 = 0x6763_6e6f;

/// State that lives for the decoding of one `.gcno` file.
struct DecodeSession<'o> {
    options: &'o DecodeOptions,
    version: GcovVersion,

    /// Whether FUNCTION records carry a second checksum word. Decided by the
    /// first FUNCTION record and reused for the rest of the file.
    split_checksum: Option<bool>,
}

impl<'o> DecodeSession<'o> {
    fn new(options: &'o DecodeOptions, version: GcovVersion) -> Self {
        Self {
            options,
            version,
            split_checksum: None,
        }
    }

    fn split_checksum(&mut self, record: &WordReader<'_>, length: usize) -> Result<bool, FormatError> {
        if let Some(split) = self.split_checksum {
            return Ok(split);
        }

        let split = self.detect_split_checksum(record, length)?;
        self.split_checksum = Some(split);

        Ok(split)
    }

    fn detect_split_checksum(&self, record: &WordReader<'_>, length: usize) -> Result<bool, FormatError> {
        if self.version >= GcovVersion::SPLIT_CHECKSUM {
            return Ok(true);
        }

        match self.options.split_checksum {
            SplitChecksum::On => return Ok(true),
            SplitChecksum::Off | SplitChecksum::Auto => {}
        }

        // Without split checksums the next word is the length of the function
        // name, which fits in the record. With them it is a checksum, which
        // likely has high bits set and claims more words than the record has.
        let strlen = record.peek_u32("function name length")? as usize;
        let overlong = strlen.saturating_mul(4) >= length.saturating_sub(12);

        if !overlong {
            return Ok(false);
        }

        match self.options.split_checksum {
            SplitChecksum::Auto => {
                info!("{}: auto-detected split checksum format", record.name());
                Ok(true)
            }
            _ => {
                warn!(
                    "{}: found overlong string in function record, try enabling split checksums",
                    record.name()
                );
                Ok(false)
            }
        }
    }
}

pub fn decode(name: &str, data: &[u8], options: &DecodeOptions) -> Result<GraphData, FormatError> {
    let mut reader = WordReader::new(name, data, Endian::Big);

    let magic = reader.read_bytes(4, "file magic")?;
    let endian = if BigEndian::read_u32(magic) == MAGIC {
        Endian::Big
    } else if LittleEndian::read_u32(magic) == MAGIC {
        Endian::Little
    } else {
        return Err(reader.error(FormatErrorKind::BadMagic(BigEndian::read_u32(magic))));
    };
    reader.set_endian(endian);

    let version = GcovVersion::from_raw(reader.read_u32("compiler version")?);
    debug!("{name}: {endian:?} endian, version {version}");

    reader.skip(4, "file timestamp")?;

    if version >= GcovVersion::WORKING_DIRECTORY {
        let cwd = reader.read_string(StringLength::Words, "working directory")?;
        debug!("{name}: compiled in {cwd}");
    }

    if version >= GcovVersion::EXTENDED_FUNCTION {
        reader.skip(4, "unexecuted blocks flag")?;
    }

    let mut session = DecodeSession::new(options, version);
    let mut builder = GraphBuilder::default();
    let mut function: Option<String> = None;
    let mut filename: Option<String> = None;

    for_each_record(&mut reader, RecordLength::Words, |tag, record| {
        match tag {
            RecordTag::Function => {
                let length = record.remaining();
                let (func, file) = read_function_record(record, length, &mut session, &mut builder)?;
                function = Some(func);
                filename = Some(file);
            }
            RecordTag::Lines => {
                filename = read_lines_record(
                    record,
                    StringLength::Words,
                    function.as_deref(),
                    filename.take(),
                    &mut builder,
                )?;
            }
            RecordTag::Other(_) => {}
        }

        Ok(())
    })?;

    builder.finish(name)
}

fn read_function_record(
    record: &mut WordReader<'_>,
    length: usize,
    session: &mut DecodeSession<'_>,
    builder: &mut GraphBuilder,
) -> Result<(String, String), FormatError> {
    record.skip(8, "function ident and checksum")?;

    if session.split_checksum(record, length)? {
        record.skip(4, "function cfg checksum")?;
    }

    let function = record.read_string(StringLength::Words, "function name")?;

    let artificial = if session.version >= GcovVersion::EXTENDED_FUNCTION {
        record.read_u32("artificial flag")? != 0
    } else {
        false
    };

    let filename = record.read_string(StringLength::Words, "filename")?;
    let line = record.read_u32("initial line number")?;

    if session.version >= GcovVersion::EXTENDED_FUNCTION {
        record.skip(4, "column number")?;
        record.skip(4, "ending line number")?;
    }

    builder.add_line(&function, &filename, line);

    if artificial {
        builder.mark_artificial(&function);
    }

    Ok((function, filename))
}
