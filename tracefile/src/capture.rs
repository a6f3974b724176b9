// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Building a trace for one test from a decoded graph and per-line counts.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use gcov_graph::{
    DecodeOptions, FormatError, GraphData, GraphFormat, PathResolver, SourcePath,
};
use sha2::{Digest, Sha256};

use crate::branch::BranchVector;
use crate::codec::sanitize_test_name;
use crate::error::{ErrorCategory, IgnorePolicy, TraceError};
use crate::model::{Count, Line, TestCoverage, TestedFile, TraceModel};
use crate::options::Options;

mod gcov;

pub use gcov::{parse_gcov, GcovFile};

/// One source line as reported by the line-count source.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LineRecord {
    pub instrumented: bool,
    pub count: Count,
    pub text: String,
}

/// Execution counts for one source file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LineCounts {
    /// Source lines 1..n, in order.
    pub lines: Vec<LineRecord>,

    /// Call counts by function name.
    pub functions: BTreeMap<String, Count>,

    pub branches: BranchVector,
}

/// Hex SHA-256 of a source line.
pub fn checksum(text: &str) -> String {
    let mut ctx = Sha256::new();
    ctx.update(text.as_bytes());

    hex::encode(ctx.finalize())
}

/// Read and decode a graph file, resolving its source paths with `resolver`.
///
/// Returns `Ok(None)` when the file cannot be used and `policy` ignores
/// graph errors.
pub fn load_graph(
    path: impl AsRef<Path>,
    options: &DecodeOptions,
    resolver: &dyn PathResolver,
    policy: &IgnorePolicy,
) -> Result<Option<GraphData>, TraceError> {
    let path = path.as_ref();

    let decode = || -> Result<GraphData, TraceError> {
        let data = fs::read(path).map_err(|err| TraceError::input(path, err))?;

        let format = GraphFormat::from_path(path).unwrap_or_else(|| {
            debug!("{}: unknown extension, assuming gcno", path.display());
            GraphFormat::Gcno
        });

        let name = path.to_string_lossy();
        let decoded = gcov_graph::decode(format, &name, &data, options)?;

        let resolved = decoded
            .resolve_paths(resolver)
            .map_err(|kind| FormatError::new(name, kind))?;

        Ok(resolved)
    };

    policy.check(ErrorCategory::Graph, decode())
}

/// Read a `.gcov` text file.
///
/// Returns `Ok(None)` when the file cannot be used and `policy` ignores
/// gcov errors.
pub fn load_gcov(
    path: impl AsRef<Path>,
    policy: &IgnorePolicy,
) -> Result<Option<GcovFile>, TraceError> {
    let path = path.as_ref();

    let read = || -> Result<GcovFile, TraceError> {
        let text = fs::read_to_string(path).map_err(|err| TraceError::input(path, err))?;
        parse_gcov(&text, &path.to_string_lossy())
    };

    match read() {
        // A gcov file without a source header carries nothing to capture.
        Err(TraceError::DataAbsent(name)) => {
            warn!("no source header in {name}, skipping");
            Ok(None)
        }
        result => policy.check(ErrorCategory::Gcov, result),
    }
}

/// Lines of a source file, for checksums when no counts were captured.
fn read_source(path: &SourcePath) -> Result<Vec<String>, TraceError> {
    let text =
        fs::read_to_string(path.as_path()).map_err(|err| TraceError::input(path.as_path(), err))?;

    Ok(text.lines().map(str::to_owned).collect())
}

/// Coverage and checksums for one file from captured counts.
fn counted(counts: &LineCounts, options: &Options) -> (TestCoverage, BTreeMap<Line, String>) {
    let mut coverage = TestCoverage::default();
    let mut checksums = BTreeMap::new();

    for (number, record) in (1..).zip(&counts.lines) {
        if !record.instrumented {
            continue;
        }

        let Ok(line) = Line::new(number) else {
            continue;
        };

        coverage.lines.insert(line, record.count);

        if options.checksum {
            checksums.insert(line, checksum(&record.text));
        }
    }

    if options.branch_coverage {
        coverage.branches = counts.branches.clone();
    }

    (coverage, checksums)
}

/// Zero coverage for every instrumented line of one file.
fn baseline(
    path: &SourcePath,
    data: &GraphData,
    options: &Options,
    policy: &IgnorePolicy,
) -> Result<(TestCoverage, BTreeMap<Line, String>), TraceError> {
    let mut coverage = TestCoverage::default();
    let mut checksums = BTreeMap::new();

    let source = if options.checksum {
        policy.check(ErrorCategory::Source, read_source(path))?
    } else {
        None
    };

    for number in data.instrumented.lines(path).into_iter().flatten() {
        let Ok(line) = Line::new(*number) else {
            continue;
        };

        coverage.lines.insert(line, Count(0));

        let text = source
            .as_ref()
            .and_then(|source| source.get(*number as usize - 1));

        if let Some(text) = text {
            checksums.insert(line, checksum(text));
        }
    }

    Ok((coverage, checksums))
}

/// Build the trace of `test_name` over every file of `data`.
///
/// Files with an entry in `counts` take their line, function and branch
/// counts from it. All other files get zero counts for every instrumented
/// line and function.
pub fn assemble(
    test_name: &str,
    data: &GraphData,
    counts: &BTreeMap<SourcePath, LineCounts>,
    options: &Options,
    policy: &IgnorePolicy,
) -> Result<TraceModel, TraceError> {
    let (test, renamed) = sanitize_test_name(test_name);

    if renamed {
        warn!("invalid characters removed from test name `{test_name}`, using `{test}`");
    }

    let mut model = TraceModel::new();

    for path in data.instrumented.files.keys() {
        let file_counts = counts.get(path);

        let (mut coverage, checksums) = match file_counts {
            Some(file_counts) => counted(file_counts, options),
            None => baseline(path, data, options, policy)?,
        };

        if coverage.is_empty() {
            debug!("no instrumented lines in {path}, skipping");
            continue;
        }

        let mut file = TestedFile {
            checksums,
            ..TestedFile::default()
        };

        if options.function_coverage {
            for function in data.graph.functions(path).into_iter().flat_map(|f| f.keys()) {
                let Some(first) = data.graph.first_line(path, function) else {
                    continue;
                };
                let Ok(first) = Line::new(first) else {
                    continue;
                };

                let calls = file_counts
                    .and_then(|c| c.functions.get(function))
                    .copied()
                    .unwrap_or_default();

                file.functions.insert(function.clone(), first);
                coverage.functions.insert(function.clone(), calls);
            }
        }

        file.tests.insert(test.clone(), coverage);
        file.rebuild_aggregates();

        model.files.insert(path.clone(), file);
    }

    if model.is_empty() {
        return Err(TraceError::DataAbsent(format!("test {test}")));
    }

    info!("{}: {}", test, model.summary());

    Ok(model)
}
