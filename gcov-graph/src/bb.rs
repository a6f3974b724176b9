// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Decoder for `.bb` files, the oldest graph format.
//!
//! A `.bb` file is a flat stream of native-endian 32-bit words. Two sentinel
//! words announce that a filename or a function name follows; the name is
//! spelled out in the following words up to a repeat of the same sentinel.
//! Any other positive word is a line number of the current function in the
//! current file.

use crate::error::FormatError;
use crate::graph::{GraphBuilder, GraphData};
use crate::reader::{strip_nuls, Endian, WordReader};

pub const FILENAME_MARKER: u32 = 0x8000_0001;
pub const FUNCTION_MARKER: u32 = 0x8000_0002;

pub fn decode(name: &str, data: &[u8]) -> Result<GraphData, FormatError> {
    let mut reader = WordReader::new(name, data, Endian::Native);
    let mut builder = GraphBuilder::default();

    let mut filename: Option<String> = None;
    let mut function: Option<String> = None;

    while !reader.is_empty() {
        let word = reader.read_u32("data word")?;

        match word {
            FILENAME_MARKER => {
                filename = Some(read_string(&mut reader, FILENAME_MARKER)?);
            }
            FUNCTION_MARKER => {
                function = Some(read_string(&mut reader, FUNCTION_MARKER)?);
            }
            line if (line as i32) > 0 => match (&function, &filename) {
                (Some(function), Some(filename)) => builder.add_line(function, filename, line),
                _ => warn!("{name}: unassigned line number {line}"),
            },
            _ => {}
        }
    }

    builder.finish(name)
}

fn read_string(reader: &mut WordReader<'_>, delimiter: u32) -> Result<String, FormatError> {
    let mut bytes = vec![];

    loop {
        let word = reader.peek_u32("string")?;

        if word == delimiter {
            reader.skip(4, "string delimiter")?;
            break;
        }

        bytes.extend_from_slice(reader.read_bytes(4, "string")?);
    }

    Ok(strip_nuls(&bytes))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use anyhow::Result;

    use super::*;
    use crate::path::SourcePath;

    fn push_word(data: &mut Vec<u8>, word: u32) {
        data.extend_from_slice(&word.to_ne_bytes());
    }

    fn push_name(data: &mut Vec<u8>, marker: u32, name: &str) {
        push_word(data, marker);

        let mut bytes = name.as_bytes().to_vec();
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        data.extend_from_slice(&bytes);

        push_word(data, marker);
    }

    #[test]
    fn test_decode_bb() -> Result<()> {
        let mut data = vec![];

        push_name(&mut data, FILENAME_MARKER, "hello.c");
        push_name(&mut data, FUNCTION_MARKER, "main");
        push_word(&mut data, 4);
        push_word(&mut data, 5);
        push_word(&mut data, 0);
        push_name(&mut data, FUNCTION_MARKER, "helper");
        push_word(&mut data, 12);
        push_word(&mut data, 4);

        let decoded = decode("hello.bb", &data)?;

        let hello = SourcePath::new("hello.c")?;
        let functions = decoded.graph.functions(&hello).unwrap();
        assert_eq!(functions["main"], BTreeSet::from([4, 5]));
        assert_eq!(functions["helper"], BTreeSet::from([4, 12]));
        assert_eq!(
            decoded.instrumented.lines(&hello),
            Some(&BTreeSet::from([4, 5, 12]))
        );

        Ok(())
    }

    #[test]
    fn test_unassigned_lines_are_skipped() -> Result<()> {
        let mut data = vec![];

        push_word(&mut data, 9);
        push_name(&mut data, FILENAME_MARKER, "a.c");
        push_word(&mut data, 10);

        let decoded = decode("a.bb", &data)?;
        assert!(decoded.graph.files.is_empty());
        assert!(decoded.instrumented.files.is_empty());

        Ok(())
    }

    #[test]
    fn test_unterminated_name_is_truncated() {
        let mut data = vec![];

        push_word(&mut data, FILENAME_MARKER);
        data.extend_from_slice(b"abcd");

        assert!(decode("bad.bb", &data).is_err());
    }
}
