// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Carrying coverage across source edits described by a unified diff.
//!
//! Each traced file is matched to at most one diff section by path suffix.
//! Its line-keyed data is moved from old to new line numbers, lines the diff
//! removed are dropped, and its tests are renamed with a `,diff` suffix.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use gcov_graph::SourcePath;
use serde::{Deserialize, Serialize};

use crate::error::{IntegrityError, TraceError};
use crate::merge::combine_files;
use crate::model::{Line, TestCoverage, TestedFile, TraceModel};

mod parse;

pub use parse::{parse_unified_diff, DiffSection, UnifiedDiff};

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct DiffOptions {
    /// Leading path components to remove from diff headers.
    pub strip: usize,

    /// Directory the diff paths are relative to. When set, only traced files
    /// under it are considered.
    pub diff_path: Option<String>,

    /// Rename traced files that the diff renames.
    pub convert_filenames: bool,
}

/// The remapped trace, with the number of files that matched a diff section
/// and the number that did not.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiffReport {
    pub model: TraceModel,
    pub converted: usize,
    pub unchanged: usize,
}

pub fn read_diff(path: impl AsRef<Path>, strip: usize) -> Result<UnifiedDiff> {
    let path = path.as_ref();

    let text = std::fs::read_to_string(path).map_err(|err| TraceError::input(path, err))?;
    let diff = parse_unified_diff(&text, strip)
        .with_context(|| format!("no valid diff data found in {}", path.display()))?;

    Ok(diff)
}

/// Old to new line numbers for one diff section.
struct LineMap {
    old_to_new: BTreeMap<u32, u32>,
    last_old: u32,
    offset: i64,
}

impl LineMap {
    fn new(section: &DiffSection) -> Self {
        let old_to_new = section.map.iter().map(|(new, old)| (*old, *new)).collect();
        let offset = i64::from(section.last_new) - i64::from(section.last_old);

        Self {
            old_to_new,
            last_old: section.last_old,
            offset,
        }
    }

    fn map(&self, line: Line) -> Option<Line> {
        let old = line.number();

        if let Some(new) = self.old_to_new.get(&old) {
            return Line::new(*new).ok();
        }

        if old > self.last_old {
            let new = u32::try_from(i64::from(old) + self.offset).ok()?;
            return Line::new(new).ok();
        }

        None
    }
}

/// The section whose old path is the most specific suffix of `path`.
fn find_section<'d>(
    path: &str,
    diff: &'d UnifiedDiff,
    diff_path: Option<&str>,
) -> Result<Option<&'d DiffSection>, IntegrityError> {
    let relative = match diff_path {
        Some(prefix) => {
            let prefix = prefix.trim_end_matches('/');

            match path.strip_prefix(prefix) {
                Some(rest) if rest.starts_with('/') => rest,
                _ => return Ok(None),
            }
        }
        None => path,
    };

    let relative = relative.trim_start_matches('/');

    let mut best: Option<(usize, &DiffSection)> = None;
    let mut tied = false;

    for (old_path, section) in &diff.sections {
        let old_path = old_path.trim_start_matches('/');
        let matches = relative == old_path || relative.ends_with(&format!("/{old_path}"));

        if !matches {
            continue;
        }

        let depth = old_path.matches('/').count();

        match best {
            Some((best_depth, _)) if depth < best_depth => {}
            Some((best_depth, _)) if depth == best_depth => tied = true,
            _ => {
                best = Some((depth, section));
                tied = false;
            }
        }
    }

    if tied {
        return Err(IntegrityError::AmbiguousDiff {
            file: path.to_owned(),
        });
    }

    Ok(best.map(|(_, section)| section))
}

fn remap_coverage(coverage: TestCoverage, map: &LineMap, dropped: &[String]) -> TestCoverage {
    let mut remapped = TestCoverage::default();

    for (line, count) in coverage.lines {
        if let Some(line) = map.map(line) {
            *remapped.lines.entry(line).or_default() += count;
        }
    }

    remapped.functions = coverage
        .functions
        .into_iter()
        .filter(|(name, _)| !dropped.contains(name))
        .collect();

    remapped.branches = coverage.branches.remap(|line| map.map(line));

    remapped
}

/// Name of a test after its file was carried across a diff.
fn diff_test_name(test: &str) -> String {
    if test.contains(',') {
        test.to_owned()
    } else {
        format!("{test},diff")
    }
}

fn remap_file(file: TestedFile, section: &DiffSection) -> TestedFile {
    let map = LineMap::new(section);
    let mut remapped = TestedFile::default();
    let mut dropped = vec![];

    for (name, line) in file.functions {
        match map.map(line) {
            Some(line) => {
                remapped.functions.insert(name, line);
            }
            None => dropped.push(name),
        }
    }

    for (line, checksum) in file.checksums {
        if let Some(line) = map.map(line) {
            remapped.checksums.insert(line, checksum);
        }
    }

    for (test, coverage) in file.tests {
        let coverage = remap_coverage(coverage, &map, &dropped);

        remapped
            .tests
            .entry(diff_test_name(&test))
            .or_default()
            .merge(coverage);
    }

    remapped.prune_tests();
    remapped.rebuild_aggregates();

    remapped
}

/// Path prefixes to rewrite, from the renames of `diff`.
///
/// Each rename also contributes its parent directories, for as long as both
/// sides have one and they differ.
fn conversion_table(diff: &UnifiedDiff) -> BTreeMap<String, String> {
    let mut table = BTreeMap::new();

    for (old, new) in &diff.renames {
        table.insert(old.clone(), new.clone());

        let (mut old, mut new) = (old.as_str(), new.as_str());

        while let (Some((old_dir, _)), Some((new_dir, _))) = (old.rsplit_once('/'), new.rsplit_once('/')) {
            if old_dir == new_dir {
                break;
            }

            table.insert(old_dir.to_owned(), new_dir.to_owned());
            old = old_dir;
            new = new_dir;
        }
    }

    table
}

/// Rewrite the longest table entry found in `path` at a component boundary.
fn convert_path(
    path: &str,
    table: &BTreeMap<String, String>,
    diff_path: Option<&str>,
) -> Option<String> {
    let min_start = match diff_path {
        Some(prefix) => {
            let prefix = prefix.trim_end_matches('/');
            path.strip_prefix(prefix)?.strip_prefix('/')?;
            prefix.len() + 1
        }
        None => 0,
    };

    let starts: Vec<usize> = std::iter::once(0)
        .chain(path.match_indices('/').map(|(i, _)| i + 1))
        .filter(|start| *start >= min_start)
        .collect();

    let mut candidates: Vec<_> = table.iter().collect();
    candidates.sort_by_key(|(old, _)| Reverse(old.len()));

    for (old, new) in candidates {
        for start in &starts {
            let Some(rest) = path[*start..].strip_prefix(old.as_str()) else {
                continue;
            };

            if rest.is_empty() || rest.starts_with('/') {
                return Some(format!("{}{new}{rest}", &path[..*start]));
            }
        }
    }

    None
}

fn convert_paths(
    model: TraceModel,
    diff: &UnifiedDiff,
    diff_path: Option<&str>,
) -> Result<TraceModel, TraceError> {
    let table = conversion_table(diff);

    if table.is_empty() {
        return Ok(model);
    }

    let mut converted = TraceModel::new();

    for (path, file) in model.files {
        let new = convert_path(path.as_str(), &table, diff_path)
            .and_then(|new| SourcePath::new(new).ok());

        let path = match new {
            Some(new) => {
                info!("converting {path} to {new}");
                new
            }
            None => {
                debug!("no conversion available for {path}");
                path
            }
        };

        let file = match converted.files.remove(&path) {
            Some(existing) => combine_files(&path, existing, file)?,
            None => file,
        };

        converted.files.insert(path, file);
    }

    Ok(converted)
}

/// Move the coverage in `model` onto the new line numbers described by
/// `diff`.
pub fn apply_diff(
    model: TraceModel,
    diff: &UnifiedDiff,
    options: &DiffOptions,
) -> Result<DiffReport, TraceError> {
    let diff_path = options.diff_path.as_deref();
    let mut report = DiffReport::default();

    for (path, file) in model.files {
        let Some(section) = find_section(path.as_str(), diff, diff_path)? else {
            report.unchanged += 1;
            report.model.files.insert(path, file);
            continue;
        };

        report.converted += 1;

        if section.is_deleted() {
            info!("removing {path}, deleted by diff");
            continue;
        }

        info!("converting {path}");

        let file = remap_file(file, section);

        if file.is_empty() {
            info!("removing {path}, no lines remain");
            continue;
        }

        report.model.files.insert(path, file);
    }

    if options.convert_filenames {
        report.model = convert_paths(report.model, diff, diff_path)?;
    }

    info!(
        "{} files converted, {} unchanged",
        report.converted, report.unchanged
    );

    Ok(report)
}

#[cfg(test)]
mod tests;
