// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Decoder for `.bbg` files, the big-endian tagged-record format that
//! preceded `.gcno`.

use crate::error::{FormatError, FormatErrorKind};
use crate::graph::{GraphBuilder, GraphData};
use crate::reader::{Endian, StringLength, WordReader};
use crate::record::{for_each_record, read_lines_record, RecordLength, RecordTag};

pub const MAGIC: u32 = 0x6762_6267;

pub fn decode(name: &str, data: &[u8]) -> Result<GraphData, FormatError> {
    let mut reader = WordReader::new(name, data, Endian::Big);

    let magic = reader.read_u32("file magic")?;
    if magic != MAGIC {
        return Err(reader.error(FormatErrorKind::BadMagic(magic)));
    }

    reader.skip(4, "version")?;

    let mut builder = GraphBuilder::default();
    let mut function: Option<String> = None;
    let mut filename: Option<String> = None;

    for_each_record(&mut reader, RecordLength::Bytes, |tag, record| {
        match tag {
            RecordTag::Function => {
                function = Some(record.read_string(StringLength::Bytes, "function name")?);
                filename = None;
                record.skip(4, "function checksum")?;
            }
            RecordTag::Lines => {
                filename = read_lines_record(
                    record,
                    StringLength::Bytes,
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
