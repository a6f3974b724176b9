// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;

use anyhow::{bail, Result};
use gcov_graph::SourcePath;

use crate::branch::BranchVector;

/// A 1-indexed source line number.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Line(u32);

impl Line {
    pub fn new(line: u32) -> Result<Self> {
        if line == 0 {
            bail!("source lines must be 1-indexed");
        }

        Ok(Self(line))
    }

    pub fn number(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution count. Combining counts saturates instead of overflowing.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Count(pub u64);

impl Count {
    /// Convert a count read from text, clamping negative values to zero.
    ///
    /// Returns whether the value was clamped.
    pub fn from_signed(count: i64) -> (Self, bool) {
        match u64::try_from(count) {
            Ok(count) => (Self(count), false),
            Err(_) => (Self(0), true),
        }
    }

    pub fn reached(&self) -> bool {
        self.0 > 0
    }
}

impl AddAssign for Count {
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counters recorded by one named test for one source file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestCoverage {
    pub lines: BTreeMap<Line, Count>,
    pub functions: BTreeMap<String, Count>,
    pub branches: BranchVector,
}

impl TestCoverage {
    /// Tests without line data carry no coverage and are pruned.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add every counter of `other` to this one.
    pub fn merge(&mut self, other: TestCoverage) {
        for (line, count) in other.lines {
            *self.lines.entry(line).or_default() += count;
        }

        for (name, count) in other.functions {
            *self.functions.entry(name).or_default() += count;
        }

        self.branches.merge(other.branches);
    }
}

/// Coverage of one source file, per test and in aggregate.
///
/// The aggregate maps are always derived from `tests` by
/// [`TestedFile::rebuild_aggregates`] and never edited on their own.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestedFile {
    pub tests: BTreeMap<String, TestCoverage>,

    /// Function name to the line it starts on.
    pub functions: BTreeMap<String, Line>,

    /// Line to the checksum of its source text.
    pub checksums: BTreeMap<Line, String>,

    pub lines: BTreeMap<Line, Count>,
    pub function_counts: BTreeMap<String, Count>,
    pub branches: BranchVector,
}

impl TestedFile {
    /// Whether no line of the file is instrumented by any test.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn prune_tests(&mut self) {
        self.tests.retain(|_, coverage| !coverage.is_empty());
    }

    pub fn rebuild_aggregates(&mut self) {
        let mut total = TestCoverage::default();

        for coverage in self.tests.values() {
            total.merge(coverage.clone());
        }

        self.lines = total.lines;
        self.function_counts = total.functions;
        self.branches = total.branches;
    }

    pub fn summary(&self) -> Summary {
        Summary {
            lines_found: self.lines.len(),
            lines_hit: self.lines.values().filter(|c| c.reached()).count(),
            functions_found: self.function_counts.len(),
            functions_hit: self.function_counts.values().filter(|c| c.reached()).count(),
            branches_found: self.branches.found(),
            branches_hit: self.branches.hit(),
        }
    }
}

/// Found and hit totals for lines, functions and branches.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    pub lines_found: usize,
    pub lines_hit: usize,
    pub functions_found: usize,
    pub functions_hit: usize,
    pub branches_found: usize,
    pub branches_hit: usize,
}

impl AddAssign for Summary {
    fn add_assign(&mut self, other: Self) {
        self.lines_found += other.lines_found;
        self.lines_hit += other.lines_hit;
        self.functions_found += other.functions_found;
        self.functions_hit += other.functions_hit;
        self.branches_found += other.branches_found;
        self.branches_hit += other.branches_hit;
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "lines......: {}/{}", self.lines_hit, self.lines_found)?;
        writeln!(f, "functions..: {}/{}", self.functions_hit, self.functions_found)?;
        write!(f, "branches...: {}/{}", self.branches_hit, self.branches_found)
    }
}

/// Coverage of every traced source file, ordered by path.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TraceModel {
    pub files: BTreeMap<SourcePath, TestedFile>,
}

impl TraceModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file(&self, path: &SourcePath) -> Option<&TestedFile> {
        self.files.get(path)
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();

        for file in self.files.values() {
            summary += file.summary();
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::branch::{Block, BranchRecord, Taken};

    fn line(n: u32) -> Line {
        Line::new(n).unwrap()
    }

    #[test]
    fn test_line_is_one_indexed() {
        assert!(Line::new(0).is_err());
        assert_eq!(Line::new(7).unwrap().number(), 7);
    }

    #[test]
    fn test_count_clamps_and_saturates() {
        assert_eq!(Count::from_signed(-3), (Count(0), true));
        assert_eq!(Count::from_signed(3), (Count(3), false));

        let mut count = Count(u64::MAX - 1);
        count += Count(5);
        assert_eq!(count, Count(u64::MAX));
    }

    #[test]
    fn test_aggregates_from_tests() -> Result<()> {
        let mut file = TestedFile::default();

        let mut a = TestCoverage::default();
        a.lines.insert(line(1), Count(2));
        a.lines.insert(line(2), Count(0));
        a.functions.insert("main".into(), Count(1));
        a.branches.push(BranchRecord {
            line: line(2),
            block: Block::Named(0),
            branch: 0,
            taken: Taken::Unevaluated,
        });

        let mut b = TestCoverage::default();
        b.lines.insert(line(2), Count(4));
        b.functions.insert("main".into(), Count(0));
        b.functions.insert("helper".into(), Count(0));
        b.branches.push(BranchRecord {
            line: line(2),
            block: Block::Named(0),
            branch: 0,
            taken: Taken::Count(Count(1)),
        });

        file.tests.insert("a".into(), a);
        file.tests.insert("b".into(), b);
        file.tests.insert("empty".into(), TestCoverage::default());

        file.prune_tests();
        file.rebuild_aggregates();

        assert_eq!(file.tests.len(), 2);
        assert_eq!(file.lines[&line(2)], Count(4));
        assert_eq!(
            file.summary(),
            Summary {
                lines_found: 2,
                lines_hit: 2,
                functions_found: 2,
                functions_hit: 1,
                branches_found: 1,
                branches_hit: 1,
            }
        );

        Ok(())
    }
}
