// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reading and writing the line-oriented tracefile format.

use std::collections::btree_map::Entry;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use gcov_graph::SourcePath;
use lazy_static::lazy_static;
use regex::Regex;

use crate::branch::{Block, BranchRecord, Taken};
use crate::error::{IntegrityError, TraceError};
use crate::model::{Count, Line, Summary, TestCoverage, TestedFile, TraceModel};
use crate::options::Options;

pub mod statement;

pub use statement::Statement;

/// Non-fatal problems found while parsing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ParseWarnings {
    /// Counts below zero that were stored as zero.
    pub negative_counts: usize,

    /// Test names that had invalid characters replaced.
    pub renamed_tests: usize,
}

lazy_static! {
    static ref NON_WORD_RE: Regex = Regex::new(r"\W").unwrap();
}

const DIFF_SUFFIX: &str = ",diff";

/// Replace characters other than letters, digits and `_` in a test name.
///
/// Only the text before the first `,` is the name. A `,diff` suffix after it
/// is kept; anything else after the comma is dropped. Returns whether any
/// character was replaced.
pub(crate) fn sanitize_test_name(raw: &str) -> (String, bool) {
    let (name, suffix) = match raw.split_once(',') {
        Some((name, rest)) if rest.starts_with("diff") => (name, DIFF_SUFFIX),
        Some((name, _)) => (name, ""),
        None => (raw, ""),
    };

    let sanitized = NON_WORD_RE.replace_all(name, "_");
    let changed = sanitized != name;

    (format!("{sanitized}{suffix}"), changed)
}

/// Counters for the record currently being read.
struct OpenRecord {
    path: SourcePath,
    test: String,
    coverage: TestCoverage,
}

struct Parser<'o> {
    options: &'o Options,
    model: TraceModel,
    warnings: ParseWarnings,
    test: String,
    record: Option<OpenRecord>,
}

impl<'o> Parser<'o> {
    fn new(options: &'o Options) -> Self {
        Self {
            options,
            model: TraceModel::default(),
            warnings: ParseWarnings::default(),
            test: String::new(),
            record: None,
        }
    }

    fn clamp(&mut self, count: i64) -> Count {
        let (count, clamped) = Count::from_signed(count);

        if clamped {
            self.warnings.negative_counts += 1;
        }

        count
    }

    fn open(&mut self, path: &str) {
        self.commit();

        let path = match SourcePath::new(path) {
            Ok(path) => path,
            Err(err) => {
                debug!("ignoring record: {err}");
                return;
            }
        };

        // Counters already read for this file and test are resumed.
        let coverage = self
            .model
            .files
            .get_mut(&path)
            .and_then(|file| file.tests.remove(&self.test))
            .unwrap_or_default();

        self.model.files.entry(path.clone()).or_default();

        self.record = Some(OpenRecord {
            path,
            test: self.test.clone(),
            coverage,
        });
    }

    fn commit(&mut self) {
        let Some(record) = self.record.take() else {
            return;
        };

        if let Some(file) = self.model.files.get_mut(&record.path) {
            file.tests
                .entry(record.test)
                .or_default()
                .merge(record.coverage);
        }
    }

    fn line_data(&mut self, line: u32, count: i64, checksum: Option<&str>) -> Result<(), TraceError> {
        let (true, Ok(line)) = (self.record.is_some(), Line::new(line)) else {
            return Ok(());
        };

        let count = self.clamp(count);

        let Some(record) = &mut self.record else {
            return Ok(());
        };

        *record.coverage.lines.entry(line).or_default() += count;

        let checksum = match checksum {
            Some(checksum) if !checksum.is_empty() => checksum,
            _ => return Ok(()),
        };

        let Some(file) = self.model.files.get_mut(&record.path) else {
            return Ok(());
        };

        match file.checksums.entry(line) {
            Entry::Vacant(entry) => {
                entry.insert(checksum.to_owned());
            }
            Entry::Occupied(entry) => {
                if entry.get() != checksum {
                    return Err(IntegrityError::ChecksumMismatch {
                        file: record.path.to_string(),
                        line: line.number(),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    fn function(&mut self, line: u32, name: &str) {
        if !self.options.function_coverage {
            return;
        }

        let (Some(record), Ok(line)) = (&mut self.record, Line::new(line)) else {
            return;
        };

        if let Some(file) = self.model.files.get_mut(&record.path) {
            file.functions.entry(name.to_owned()).or_insert(line);
        }

        record.coverage.functions.entry(name.to_owned()).or_default();
    }

    fn function_data(&mut self, count: i64, name: &str) {
        if !self.options.function_coverage {
            return;
        }

        if self.record.is_none() {
            return;
        }

        let count = self.clamp(count);

        if let Some(record) = &mut self.record {
            *record.coverage.functions.entry(name.to_owned()).or_default() += count;
        }
    }

    fn branch_data(&mut self, line: u32, block: Block, branch: u32, taken: Option<i64>) {
        if !self.options.branch_coverage {
            return;
        }

        let (true, Ok(line)) = (self.record.is_some(), Line::new(line)) else {
            return;
        };

        let taken = match taken {
            Some(count) => Taken::Count(self.clamp(count)),
            None => Taken::Unevaluated,
        };

        let Some(record) = &mut self.record else {
            return;
        };

        record.coverage.branches.push(BranchRecord {
            line,
            block,
            branch,
            taken,
        });
    }

    fn statement(&mut self, statement: Statement<'_>) -> Result<(), TraceError> {
        match statement {
            Statement::TestName(raw) => {
                let (name, changed) = sanitize_test_name(raw);

                if changed {
                    self.warnings.renamed_tests += 1;
                }

                self.test = name;
            }
            Statement::SourceFile(path) => self.open(path),
            Statement::Function { line, name } => self.function(line, name),
            Statement::FunctionData { count, name } => self.function_data(count, name),
            Statement::BranchData {
                line,
                block,
                branch,
                taken,
            } => self.branch_data(line, block, branch, taken),
            Statement::LineData {
                line,
                count,
                checksum,
            } => self.line_data(line, count, checksum)?,
            Statement::EndOfRecord => self.commit(),
            Statement::FunctionsFound(_)
            | Statement::FunctionsHit(_)
            | Statement::BranchesFound(_)
            | Statement::BranchesHit(_)
            | Statement::LinesFound(_)
            | Statement::LinesHit(_)
            | Statement::Unknown => {}
        }

        Ok(())
    }

    fn finish(mut self, source: &str) -> Result<(TraceModel, ParseWarnings), TraceError> {
        self.commit();

        for file in self.model.files.values_mut() {
            file.prune_tests();
            file.rebuild_aggregates();
        }

        self.model.files.retain(|_, file| !file.is_empty());

        if self.warnings.negative_counts > 0 {
            warn!(
                "{source}: {} negative counts found and set to zero",
                self.warnings.negative_counts
            );
        }

        if self.warnings.renamed_tests > 0 {
            warn!("{source}: invalid characters removed from test names");
        }

        if self.model.is_empty() {
            return Err(TraceError::DataAbsent(source.to_owned()));
        }

        Ok((self.model, self.warnings))
    }
}

/// Parse tracefile text. `source` names the input in diagnostics.
pub fn parse(
    text: &str,
    source: &str,
    options: &Options,
) -> Result<(TraceModel, ParseWarnings), TraceError> {
    let mut parser = Parser::new(options);

    for line in text.lines() {
        parser.statement(Statement::parse(line))?;
    }

    parser.finish(source)
}

/// Functions of `coverage` in output order: declared ones by start line and
/// name, then any without a declaration by name.
fn ordered_functions<'c>(
    file: &TestedFile,
    coverage: &'c TestCoverage,
) -> (Vec<(Line, &'c str)>, Vec<&'c str>) {
    let mut declared = vec![];
    let mut undeclared = vec![];

    for name in coverage.functions.keys() {
        match file.functions.get(name) {
            Some(line) => declared.push((*line, name.as_str())),
            None => undeclared.push(name.as_str()),
        }
    }

    declared.sort();

    (declared, undeclared)
}

fn signed(count: Count) -> i64 {
    i64::try_from(count.0).unwrap_or(i64::MAX)
}

fn write_record(
    out: &mut impl Write,
    path: &SourcePath,
    file: &TestedFile,
    test: &str,
    coverage: &TestCoverage,
    options: &Options,
) -> io::Result<()> {
    writeln!(out, "{}", Statement::TestName(test))?;
    writeln!(out, "{}", Statement::SourceFile(path.as_str()))?;

    if options.function_coverage {
        let (declared, undeclared) = ordered_functions(file, coverage);

        for &(line, name) in &declared {
            writeln!(
                out,
                "{}",
                Statement::Function {
                    line: line.number(),
                    name
                }
            )?;
        }

        let names = declared.iter().map(|(_, name)| *name).chain(undeclared);

        for name in names {
            let count = coverage.functions.get(name).copied().unwrap_or_default();

            writeln!(
                out,
                "{}",
                Statement::FunctionData {
                    count: signed(count),
                    name
                }
            )?;
        }

        let found = coverage.functions.len() as u32;
        let hit = coverage.functions.values().filter(|c| c.reached()).count() as u32;
        writeln!(out, "{}", Statement::FunctionsFound(found))?;
        writeln!(out, "{}", Statement::FunctionsHit(hit))?;
    }

    if options.branch_coverage && !coverage.branches.is_empty() {
        for record in coverage.branches.iter() {
            let taken = match record.taken {
                Taken::Unevaluated => None,
                Taken::Count(count) => Some(signed(count)),
            };

            writeln!(
                out,
                "{}",
                Statement::BranchData {
                    line: record.line.number(),
                    block: record.block,
                    branch: record.branch,
                    taken,
                }
            )?;
        }

        writeln!(out, "{}", Statement::BranchesFound(coverage.branches.found() as u32))?;
        writeln!(out, "{}", Statement::BranchesHit(coverage.branches.hit() as u32))?;
    }

    for (line, count) in &coverage.lines {
        let checksum = if options.checksum {
            file.checksums.get(line).map(String::as_str)
        } else {
            None
        };

        writeln!(
            out,
            "{}",
            Statement::LineData {
                line: line.number(),
                count: signed(*count),
                checksum,
            }
        )?;
    }

    let hit = coverage.lines.values().filter(|c| c.reached()).count() as u32;
    writeln!(out, "{}", Statement::LinesFound(coverage.lines.len() as u32))?;
    writeln!(out, "{}", Statement::LinesHit(hit))?;
    writeln!(out, "{}", Statement::EndOfRecord)?;

    Ok(())
}

/// Write one record per file and test, returning the totals of what was
/// written.
pub fn write(out: &mut impl Write, model: &TraceModel, options: &Options) -> io::Result<Summary> {
    let mut summary = Summary::default();

    for (path, file) in &model.files {
        let mut totals = file.summary();

        if !options.function_coverage {
            totals.functions_found = 0;
            totals.functions_hit = 0;
        }

        if !options.branch_coverage {
            totals.branches_found = 0;
            totals.branches_hit = 0;
        }

        summary += totals;

        for (test, coverage) in &file.tests {
            write_record(out, path, file, test, coverage, options)?;
        }
    }

    Ok(summary)
}

pub fn to_string(model: &TraceModel, options: &Options) -> (String, Summary) {
    let mut out = vec![];

    // Writing to a `Vec` cannot fail.
    let summary = write(&mut out, model, options).unwrap_or_default();
    let text = String::from_utf8_lossy(&out).into_owned();

    (text, summary)
}

pub fn read_tracefile(
    path: impl AsRef<Path>,
    options: &Options,
) -> Result<(TraceModel, ParseWarnings)> {
    let path = path.as_ref();

    let text = std::fs::read_to_string(path).map_err(|err| TraceError::input(path, err))?;
    let parsed = parse(&text, &path.to_string_lossy(), options)?;

    info!("read {} files from {}", parsed.0.files.len(), path.display());

    Ok(parsed)
}

pub fn write_tracefile(
    path: impl AsRef<Path>,
    model: &TraceModel,
    options: &Options,
) -> Result<Summary> {
    let path = path.as_ref();

    let file = File::create(path)
        .with_context(|| format!("unable to create tracefile: {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let summary = write(&mut out, model, options)
        .and_then(|summary| out.flush().map(|_| summary))
        .with_context(|| format!("unable to write tracefile: {}", path.display()))?;

    Ok(summary)
}
