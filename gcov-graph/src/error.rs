// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// A graph file could not be decoded.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{file}: {kind}")]
pub struct FormatError {
    /// Name of the graph file being decoded.
    pub file: String,

    pub kind: FormatErrorKind,
}

impl FormatError {
    pub fn new(file: impl Into<String>, kind: FormatErrorKind) -> Self {
        let file = file.into();

        Self { file, kind }
    }

    /// Reinterpret a truncated read inside a bounded record as an overrun of
    /// that record's declared length.
    pub(crate) fn into_overrun(self, tag: u32, length: usize) -> Self {
        match self.kind {
            FormatErrorKind::Truncated(_) => Self {
                file: self.file,
                kind: FormatErrorKind::RecordOverrun { tag, length },
            },
            _ => self,
        }
    }
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FormatErrorKind {
    #[error("bad file magic {0:#010x}")]
    BadMagic(u32),

    #[error("reached end of file while reading {0}")]
    Truncated(&'static str),

    #[error("record {tag:#010x} overran its declared length of {length} bytes")]
    RecordOverrun { tag: u32, length: usize },

    #[error("invalid source path `{0}`")]
    InvalidPath(String),
}
