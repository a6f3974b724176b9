// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::FormatError;
use crate::graph::GraphBuilder;
use crate::reader::{StringLength, WordReader, WORD_SIZE};

pub const TAG_FUNCTION: u32 = 0x0100_0000;
pub const TAG_LINES: u32 = 0x0145_0000;

/// Record kinds shared by `.bbg` and `.gcno` files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordTag {
    Function,
    Lines,
    Other(u32),
}

impl From<u32> for RecordTag {
    fn from(tag: u32) -> Self {
        match tag {
            TAG_FUNCTION => Self::Function,
            TAG_LINES => Self::Lines,
            other => Self::Other(other),
        }
    }
}

/// How the length word of a record is interpreted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum RecordLength {
    Bytes,
    Words,
}

/// Visit each tagged record, handing the callback a reader bounded to the
/// record's declared length.
///
/// The outer reader always advances by the declared length, whatever the
/// callback consumes. A record that claims to extend past the end of the file
/// ends the walk with a warning.
pub(crate) fn for_each_record<'d>(
    reader: &mut WordReader<'d>,
    unit: RecordLength,
    mut visit: impl FnMut(RecordTag, &mut WordReader<'d>) -> Result<(), FormatError>,
) -> Result<(), FormatError> {
    while !reader.is_empty() {
        let tag = reader.read_u32("record tag")?;
        let length = reader.read_u32("record length")? as usize;

        let length = match unit {
            RecordLength::Bytes => Some(length),
            RecordLength::Words => length.checked_mul(WORD_SIZE),
        };

        let length = match length {
            Some(length) if length <= reader.remaining() => length,
            _ => {
                warn!("{}: overlong record at end of file", reader.name());
                break;
            }
        };

        let mut record = reader.take(length, "record")?;

        visit(RecordTag::from(tag), &mut record).map_err(|err| err.into_overrun(tag, length))?;
    }

    Ok(())
}

/// Read the body of a LINES record.
///
/// Returns the filename in effect at the end of the record, which carries
/// over to the next LINES record of the same function.
pub(crate) fn read_lines_record(
    record: &mut WordReader<'_>,
    strings: StringLength,
    function: Option<&str>,
    mut filename: Option<String>,
    builder: &mut GraphBuilder,
) -> Result<Option<String>, FormatError> {
    record.skip(WORD_SIZE, "basic block index")?;

    loop {
        let line = record.read_u32("line number")?;

        if line == 0 {
            let name = record.read_string(strings, "filename")?;

            if name.is_empty() {
                return Ok(filename);
            }

            filename = Some(name);
            continue;
        }

        match (function, &filename) {
            (Some(function), Some(filename)) => builder.add_line(function, filename, line),
            _ => warn!("{}: unassigned line number {line}", record.name()),
        }
    }
}
