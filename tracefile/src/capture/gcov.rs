// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reader for the annotated-source text that `gcov` writes per source file.
//!
//! ```text
//!         -:    0:Source:src/main.c
//! function main called 1 returned 100% blocks executed 75%
//!         1:    3:int main() {
//!     #####:    4:  abort();
//! branch  0 taken 0
//! branch  1 never executed
//! ```

use crate::branch::{Block, BranchRecord, BranchVector, Taken};
use crate::error::TraceError;
use crate::model::{Count, Line};

use super::{LineCounts, LineRecord};

/// Rows further than this past the last line seen are rejected.
const MAX_LINE_GAP: usize = 1 << 16;

/// Counts for one source file, as reported by `gcov`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GcovFile {
    /// Source path as written in the `Source:` header.
    pub source: String,

    pub counts: LineCounts,
}

/// Count column of a source line. `None` for lines without code.
fn parse_count(field: &str) -> Option<Option<Count>> {
    let field = field.trim();

    match field {
        "-" => Some(None),
        "#####" | "=====" => Some(Some(Count(0))),
        _ => {
            // A trailing `*` marks lines with unexecuted blocks.
            let digits = field.trim_end_matches('*');
            digits.parse::<u64>().ok().map(|count| Some(Count(count)))
        }
    }
}

/// `function <name> called <count> returned ...`
fn parse_function(line: &str) -> Option<(&str, Count)> {
    let rest = line.strip_prefix("function ")?;
    let (name, rest) = rest.rsplit_once(" called ")?;
    let count = rest.split_whitespace().next()?.parse::<u64>().ok()?;

    Some((name, Count(count)))
}

/// `branch <n> taken <count>` or `branch <n> never executed`
fn parse_branch(line: &str) -> Option<(u32, Taken)> {
    let mut words = line.split_whitespace();

    if words.next()? != "branch" {
        return None;
    }

    let branch = words.next()?.parse::<u32>().ok()?;

    match words.next()? {
        "taken" => {
            let taken = words.next()?;
            let digits: String = taken.chars().take_while(char::is_ascii_digit).collect();
            let count = digits.parse::<u64>().ok()?;
            Some((branch, Taken::Count(Count(count))))
        }
        "never" => Some((branch, Taken::Unevaluated)),
        _ => None,
    }
}

/// Branches of one line, grouped into blocks numbered down from the unnamed
/// block. A new group starts at each `branch 0`.
#[derive(Default)]
struct LineBranches {
    line: Option<Line>,
    group: Option<u32>,
}

impl LineBranches {
    fn start_line(&mut self, line: Line) {
        self.line = Some(line);
        self.group = None;
    }

    fn record(&mut self, branch: u32, taken: Taken) -> Option<BranchRecord> {
        let line = self.line?;

        let group = match (self.group, branch) {
            (Some(group), 0) => group + 1,
            (Some(group), _) => group,
            (None, _) => 0,
        };
        self.group = Some(group);

        Some(BranchRecord {
            line,
            block: Block::from(Block::UNNAMED - group),
            branch,
            taken,
        })
    }
}

/// Parse `gcov` output. `name` labels the input in errors.
pub fn parse_gcov(text: &str, name: &str) -> Result<GcovFile, TraceError> {
    let mut source = None;
    let mut lines: Vec<LineRecord> = vec![];
    let mut branches = BranchVector::new();
    let mut current = LineBranches::default();
    let mut file = GcovFile::default();

    for line in text.lines() {
        if let Some((function, count)) = parse_function(line) {
            *file.counts.functions.entry(function.to_owned()).or_default() += count;
            continue;
        }

        if let Some((branch, taken)) = parse_branch(line) {
            if let Some(record) = current.record(branch, taken) {
                branches.push(record);
            }
            continue;
        }

        let mut fields = line.splitn(3, ':');
        let (Some(count), Some(number), Some(text)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        let Ok(number) = number.trim().parse::<u32>() else {
            continue;
        };

        if number == 0 {
            if let Some(path) = text.strip_prefix("Source:") {
                source = Some(path.to_owned());
            }
            continue;
        }

        let Some(count) = parse_count(count) else {
            debug!("{name}: unrecognized count `{}`", count.trim());
            continue;
        };

        let index = number as usize - 1;
        if index > lines.len() + MAX_LINE_GAP {
            warn!("{name}: line {number} is far past line {}, skipping", lines.len());
            continue;
        }

        if lines.len() <= index {
            lines.resize_with(index + 1, LineRecord::default);
        }

        lines[index] = LineRecord {
            instrumented: count.is_some(),
            count: count.unwrap_or_default(),
            text: text.to_owned(),
        };

        if let Ok(line) = Line::new(number) {
            current.start_line(line);
        }
    }

    let Some(source) = source else {
        return Err(TraceError::DataAbsent(name.to_owned()));
    };

    file.source = source;
    file.counts.lines = lines;
    file.counts.branches = branches;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    use super::*;

    const MAIN_GCOV: &str = "\
        -:    0:Source:src/main.c
        -:    0:Graph:main.gcno
        -:    1:#include <stdlib.h>
        -:    2:
function main called 2 returned 100% blocks executed 75%
        2:    3:int main(int argc, char **argv) {
        2:    4:  if (argc > 1)
branch  0 taken 1 (fallthrough)
branch  1 taken 1
branch  0 never executed
    #####:    5:    abort();
       1*:    6:  return 0;
        -:    7:}
";

    fn line(n: u32) -> Line {
        Line::new(n).unwrap()
    }

    #[test]
    fn test_parse_gcov() -> Result<()> {
        let file = parse_gcov(MAIN_GCOV, "main.c.gcov")?;

        assert_eq!(file.source, "src/main.c");
        assert_eq!(file.counts.lines.len(), 7);

        let instrumented: Vec<_> = file
            .counts
            .lines
            .iter()
            .enumerate()
            .filter(|(_, r)| r.instrumented)
            .map(|(i, r)| (i + 1, r.count.0))
            .collect();
        assert_eq!(instrumented, vec![(3, 2), (4, 2), (5, 0), (6, 1)]);

        assert_eq!(file.counts.lines[2].text, "int main(int argc, char **argv) {");
        assert_eq!(file.counts.functions["main"], Count(2));

        let branches = &file.counts.branches;
        assert_eq!(branches.len(), 3);
        assert_eq!(
            branches.get(line(4), Block::Unnamed, 1).unwrap().taken,
            Taken::Count(Count(1))
        );
        assert_eq!(
            branches.get(line(4), Block::Named(u32::MAX - 1), 0).unwrap().taken,
            Taken::Unevaluated
        );

        Ok(())
    }

    #[test]
    fn test_missing_source_header() {
        let err = parse_gcov("        1:    1:x\n", "x.gcov").unwrap_err();
        assert!(matches!(err, TraceError::DataAbsent(_)));
    }

    #[test]
    fn test_line_number_out_of_range() -> Result<()> {
        let text = "        -:    0:Source:a.c\n        1:    1:int x;\n        -:4294967295:x\n        2:    2:int y;\n";
        let file = parse_gcov(text, "a.c.gcov")?;

        assert_eq!(file.counts.lines.len(), 2);
        assert_eq!(file.counts.lines[1].count, Count(2));

        Ok(())
    }

    #[test]
    fn test_parse_count_forms() {
        assert_eq!(parse_count("        -"), Some(None));
        assert_eq!(parse_count("    #####"), Some(Some(Count(0))));
        assert_eq!(parse_count("====="), Some(Some(Count(0))));
        assert_eq!(parse_count("  12*"), Some(Some(Count(12))));
        assert_eq!(parse_count("1.2k"), None);
    }
}
