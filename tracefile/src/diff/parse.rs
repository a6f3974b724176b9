// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::TraceError;

lazy_static! {
    // Counts default to 1 when omitted.
    static ref HUNK_RE: Regex =
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap();
}

const DEV_NULL: &str = "/dev/null";

/// The changes to one file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiffSection {
    pub old_path: String,
    pub new_path: String,

    /// New line number to the old line it came from, for every line that
    /// exists on both sides up to the end of the last hunk.
    pub map: BTreeMap<u32, u32>,

    /// Old line at the end of the last hunk.
    pub last_old: u32,

    /// New line at the end of the last hunk.
    pub last_new: u32,
}

impl DiffSection {
    fn new(old_path: String, new_path: String) -> Self {
        Self {
            old_path,
            new_path,
            ..Self::default()
        }
    }

    /// Record the unchanged lines up to the start of a hunk.
    fn fill_to(&mut self, old_start: u32, new_start: u32, old: &mut u32, new: &mut u32) {
        while *old < old_start && *new < new_start {
            self.map.insert(*new, *old);
            *old += 1;
            *new += 1;
        }

        *old = old_start.max(*old);
        *new = new_start.max(*new);
    }

    /// Whether the diff deletes the file.
    pub fn is_deleted(&self) -> bool {
        self.new_path == DEV_NULL
    }
}

/// A parsed unified diff.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UnifiedDiff {
    /// Sections by old path.
    pub sections: BTreeMap<String, DiffSection>,

    /// Old path to new path, for files the diff renames.
    pub renames: BTreeMap<String, String>,
}

/// Take the path from a `---`/`+++` header line, dropping any trailing
/// timestamp and the first `strip` components.
fn header_path(header: &str, strip: usize) -> String {
    let path = header.split('\t').next().unwrap_or_default().trim_end();

    if path == DEV_NULL || strip == 0 {
        return path.to_owned();
    }

    let mut components = path.split('/').filter(|c| !c.is_empty());

    for _ in 0..strip {
        components.next();
    }

    components.collect::<Vec<_>>().join("/")
}

struct Hunk {
    old_remaining: u32,
    new_remaining: u32,
}

impl Hunk {
    fn is_open(&self) -> bool {
        self.old_remaining > 0 || self.new_remaining > 0
    }
}

/// Parse a unified diff. `strip` removes that many leading directories from
/// the paths in file headers.
pub fn parse_unified_diff(text: &str, strip: usize) -> Result<UnifiedDiff, TraceError> {
    let mut diff = UnifiedDiff::default();
    let mut hunks = 0;

    let mut old_header: Option<String> = None;
    let mut section: Option<DiffSection> = None;
    let mut hunk: Option<Hunk> = None;
    let mut old = 1;
    let mut new = 1;

    let close = |section: Option<DiffSection>, old: u32, new: u32, diff: &mut UnifiedDiff| {
        if let Some(mut section) = section {
            section.last_old = old - 1;
            section.last_new = new - 1;

            if diff.sections.contains_key(&section.old_path) {
                warn!("diff contains {} more than once, using last entry", section.old_path);
            }

            diff.sections.insert(section.old_path.clone(), section);
        }
    };

    for line in text.lines() {
        if let Some(open) = &mut hunk {
            if open.is_open() {
                match line.as_bytes().first() {
                    Some(b'+') => {
                        open.new_remaining = open.new_remaining.saturating_sub(1);
                        new += 1;
                        continue;
                    }
                    Some(b'-') => {
                        open.old_remaining = open.old_remaining.saturating_sub(1);
                        old += 1;
                        continue;
                    }
                    Some(b' ') | None => {
                        if let Some(section) = &mut section {
                            section.map.insert(new, old);
                        }
                        open.old_remaining = open.old_remaining.saturating_sub(1);
                        open.new_remaining = open.new_remaining.saturating_sub(1);
                        old += 1;
                        new += 1;
                        continue;
                    }
                    Some(b'\\') => continue,
                    Some(_) => {}
                }
            }
        }

        hunk = None;

        if let Some(header) = line.strip_prefix("--- ") {
            old_header = Some(header_path(header, strip));
        } else if let Some(header) = line.strip_prefix("+++ ") {
            let Some(old_path) = old_header.take() else {
                continue;
            };
            let new_path = header_path(header, strip);

            close(section.take(), old, new, &mut diff);

            if old_path != new_path && old_path != DEV_NULL && new_path != DEV_NULL {
                diff.renames.insert(old_path.clone(), new_path.clone());
            }

            old = 1;
            new = 1;
            section = (old_path != DEV_NULL).then(|| DiffSection::new(old_path, new_path));
        } else if let Some(captures) = HUNK_RE.captures(line) {
            let number = |index: usize, default: u32| {
                captures
                    .get(index)
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .unwrap_or(default)
            };

            let (old_start, old_count) = (number(1, 0), number(2, 1));
            let (new_start, new_count) = (number(3, 0), number(4, 1));

            if section.is_none() && old_header.is_none() {
                debug!("ignoring hunk without file headers");
            }

            if let Some(section) = &mut section {
                // A zero count names the line before the change.
                let old_start = if old_count == 0 { old_start + 1 } else { old_start };
                let new_start = if new_count == 0 { new_start + 1 } else { new_start };

                section.fill_to(old_start, new_start, &mut old, &mut new);
                hunks += 1;
            }

            hunk = Some(Hunk {
                old_remaining: old_count,
                new_remaining: new_count,
            });
        }
    }

    close(section.take(), old, new, &mut diff);

    if hunks == 0 {
        return Err(TraceError::DataAbsent("diff".to_owned()));
    }

    Ok(diff)
}
