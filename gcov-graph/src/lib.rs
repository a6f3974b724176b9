// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! # gcov-graph
//!
//! Decoders for the structural side files that GCC-compatible compilers emit
//! next to instrumented objects. Three historical formats are supported:
//!
//!  - `.bb`: a word stream of filename, function name and line markers
//!  - `.bbg`: big-endian tagged records
//!  - `.gcno`: tagged records in the compiling machine's byte order, with
//!    version-dependent fields
//!
//! Each decoder recovers two views of the same data: the set of instrumented
//! lines per source file ([`InstrumentedLines`]), and the lines of each
//! function, with every function attributed to exactly one source file
//! ([`Graph`]).
//!
//! When a function draws lines from several files (inlined headers, for
//! instance), it is attributed to the "base file" of the graph: the file that
//! contributes lines to the most functions. If the base file does not
//! contribute to a function, or there is no unique base file, the function is
//! attributed to the first file that contributed lines to it.

#[macro_use]
extern crate log;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod bb;
pub mod bbg;
pub mod error;
pub mod gcno;
pub mod graph;
pub mod path;
pub mod record;
pub mod version;

mod reader;

pub use error::{FormatError, FormatErrorKind};
pub use graph::{FunctionMap, Graph, GraphData, InstrumentedLines};
pub use path::{BaseDir, Identity, PathResolver, SourcePath};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GraphFormat {
    Bb,
    Bbg,
    Gcno,
}

impl GraphFormat {
    /// Select a format from the file extension of `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?;

        match extension {
            "bb" => Some(Self::Bb),
            "bbg" => Some(Self::Bbg),
            "gcno" => Some(Self::Gcno),
            _ => None,
        }
    }
}

/// Whether `.gcno` FUNCTION records from compilers older than 4.7 carry a
/// split checksum. Some vendor compilers backported the newer layout.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitChecksum {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub split_checksum: SplitChecksum,
}

/// Decode the graph file contents `data`. `name` is only used in diagnostics.
pub fn decode(
    format: GraphFormat,
    name: &str,
    data: &[u8],
    options: &DecodeOptions,
) -> Result<GraphData, FormatError> {
    match format {
        GraphFormat::Bb => bb::decode(name, data),
        GraphFormat::Bbg => bbg::decode(name, data),
        GraphFormat::Gcno => gcno::decode(name, data, options),
    }
}

/// Read and decode the graph file at `path`, choosing the format from its
/// extension.
pub fn read_graph(path: impl AsRef<Path>, options: &DecodeOptions) -> Result<GraphData> {
    let path = path.as_ref();

    let format = GraphFormat::from_path(path)
        .with_context(|| format!("unknown graph file type: {}", path.display()))?;

    let data = std::fs::read(path)
        .with_context(|| format!("unable to read graph file: {}", path.display()))?;

    let name = path.to_string_lossy();
    let decoded = decode(format, &name, &data, options)?;

    Ok(decoded)
}
