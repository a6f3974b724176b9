// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{FormatError, FormatErrorKind};
use crate::path::{PathResolver, SourcePath};

/// Function name to the ascending, unique line numbers attributed to it.
pub type FunctionMap = BTreeMap<String, BTreeSet<u32>>;

/// Source lines grouped by the function they belong to, per source file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Graph {
    pub files: BTreeMap<SourcePath, FunctionMap>,
}

impl Graph {
    pub fn functions(&self, path: &SourcePath) -> Option<&FunctionMap> {
        self.files.get(path)
    }

    /// Line on which `function` in `path` begins.
    pub fn first_line(&self, path: &SourcePath, function: &str) -> Option<u32> {
        self.files
            .get(path)?
            .get(function)?
            .iter()
            .next()
            .copied()
    }

    fn prune(&mut self) {
        for functions in self.files.values_mut() {
            functions.retain(|_, lines| !lines.is_empty());
        }

        self.files.retain(|_, functions| !functions.is_empty());
    }
}

/// Every instrumented line per source file, regardless of function.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InstrumentedLines {
    pub files: BTreeMap<SourcePath, BTreeSet<u32>>,
}

impl InstrumentedLines {
    pub fn lines(&self, path: &SourcePath) -> Option<&BTreeSet<u32>> {
        self.files.get(path)
    }
}

/// The decoded content of one graph file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GraphData {
    pub instrumented: InstrumentedLines,
    pub graph: Graph,
}

impl GraphData {
    /// Rewrite every source path with `resolver`, merging paths that resolve
    /// to the same file.
    pub fn resolve_paths(self, resolver: &dyn PathResolver) -> Result<Self, FormatErrorKind> {
        let resolve = |path: &SourcePath| {
            let resolved = resolver.resolve(path.as_str());
            SourcePath::new(resolved.clone()).map_err(|_| FormatErrorKind::InvalidPath(resolved))
        };

        let mut resolved = GraphData::default();

        for (path, lines) in self.instrumented.files {
            let path = resolve(&path)?;
            resolved
                .instrumented
                .files
                .entry(path)
                .or_default()
                .extend(lines);
        }

        for (path, functions) in self.graph.files {
            let path = resolve(&path)?;
            let merged = resolved.graph.files.entry(path).or_default();

            for (function, lines) in functions {
                merged.entry(function).or_default().extend(lines);
            }
        }

        Ok(resolved)
    }
}

/// Accumulates (function, file, line) triples in the order a decoder finds
/// them, then attributes each function to a single file.
#[derive(Debug, Default)]
pub(crate) struct GraphBuilder {
    lines: BTreeMap<String, BTreeMap<String, Vec<u32>>>,
    order: BTreeMap<String, Vec<String>>,
    artificial: BTreeSet<String>,
}

impl GraphBuilder {
    pub fn add_line(&mut self, function: &str, file: &str, line: u32) {
        if line == 0 || file.is_empty() {
            return;
        }

        self.lines
            .entry(function.to_owned())
            .or_default()
            .entry(file.to_owned())
            .or_default()
            .push(line);

        let order = self.order.entry(function.to_owned()).or_default();

        if !order.iter().any(|f| f == file) {
            order.push(file.to_owned());
        }
    }

    pub fn mark_artificial(&mut self, function: &str) {
        self.artificial.insert(function.to_owned());
    }

    /// The file contributing lines to the most functions, unless several
    /// files share that maximum.
    fn base_file(&self) -> Option<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for files in self.lines.values() {
            for file in files.keys() {
                *counts.entry(file.as_str()).or_default() += 1;
            }
        }

        let max = counts.values().copied().max()?;
        let mut at_max = counts.iter().filter(|(_, count)| **count == max);

        match (at_max.next(), at_max.next()) {
            (Some((file, _)), None) => Some(*file),
            _ => None,
        }
    }

    pub fn finish(self, name: &str) -> Result<GraphData, FormatError> {
        // Artificial functions still count towards the base file.
        let base = self.base_file().map(str::to_owned);
        debug!("{name}: base file {base:?}");

        let mut data = GraphData::default();

        for (function, files) in &self.lines {
            if self.artificial.contains(function) {
                debug!("{name}: dropping artificial function {function}");
                continue;
            }

            let owner = match &base {
                Some(base) if files.contains_key(base) => Some(base.as_str()),
                _ => self
                    .order
                    .get(function)
                    .and_then(|order| order.first())
                    .map(String::as_str),
            };

            for (file, lines) in files {
                let path = source_path(name, file)?;

                data.instrumented
                    .files
                    .entry(path.clone())
                    .or_default()
                    .extend(lines);

                if Some(file.as_str()) == owner {
                    data.graph
                        .files
                        .entry(path)
                        .or_default()
                        .entry(function.clone())
                        .or_default()
                        .extend(lines);
                }
            }
        }

        data.graph.prune();

        Ok(data)
    }
}

fn source_path(name: &str, raw: &str) -> Result<SourcePath, FormatError> {
    SourcePath::new(raw)
        .map_err(|_| FormatError::new(name, FormatErrorKind::InvalidPath(raw.to_owned())))
}
