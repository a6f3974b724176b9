// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use gcov_graph::{FunctionMap, GraphData, SourcePath};
use pretty_assertions::assert_eq;
use tracefile::capture::{assemble, parse_gcov};
use tracefile::codec;
use tracefile::diff::{apply_diff, parse_unified_diff, DiffOptions};
use tracefile::{
    combine, combine_all, read_tracefile, write_tracefile, Count, IgnorePolicy, Line, Options,
    TraceModel,
};

const FIRST: &str = "\
TN:unit
SF:/src/a.c
FN:1,a
FNDA:1,a
BRDA:2,0,0,1
BRDA:2,0,1,-
DA:1,1
DA:2,1
DA:3,0
end_of_record
";

const SECOND: &str = "\
TN:unit
SF:/src/a.c
FN:1,a
FNDA:2,a
BRDA:2,0,0,-
BRDA:2,0,1,3
DA:1,2
DA:3,5
end_of_record
TN:fuzz
SF:/src/b.c
DA:7,1
end_of_record
";

const THIRD: &str = "\
TN:fuzz
SF:/src/a.c
DA:2,9
end_of_record
SF:/src/b.c
DA:7,1
DA:8,0
end_of_record
";

fn parse(text: &str) -> TraceModel {
    codec::parse(text, "test.info", &Options::all()).unwrap().0
}

fn path(p: &str) -> SourcePath {
    SourcePath::new(p).unwrap()
}

fn line(n: u32) -> Line {
    Line::new(n).unwrap()
}

#[test]
fn test_merge_is_associative() -> Result<()> {
    let (a, b, c) = (parse(FIRST), parse(SECOND), parse(THIRD));

    let left = combine(combine(a.clone(), b.clone())?, c.clone())?;
    let right = combine(a.clone(), combine(b.clone(), c.clone())?)?;
    assert_eq!(left, right);

    let folded = combine_all([a, b, c])?;
    assert_eq!(folded, left);

    let file = folded.file(&path("/src/a.c")).unwrap();
    assert_eq!(file.lines[&line(2)], Count(10));
    assert_eq!(file.function_counts["a"], Count(3));
    assert_eq!(file.branches.hit(), 2);

    Ok(())
}

#[test]
fn test_written_trace_reads_back() -> Result<()> {
    let merged = combine_all([parse(FIRST), parse(SECOND), parse(THIRD)])?;

    let dir = tempfile::tempdir()?;
    let out = dir.path().join("merged.info");

    let written = write_tracefile(&out, &merged, &Options::all())?;
    let (read, warnings) = read_tracefile(&out, &Options::all())?;

    assert_eq!(read, merged);
    assert_eq!(read.summary(), written);
    assert_eq!(warnings.negative_counts, 0);

    Ok(())
}

#[test]
fn test_capture_merge_diff() -> Result<()> {
    let mut data = GraphData::default();
    data.instrumented
        .files
        .insert(path("/proj/src/main.c"), BTreeSet::from([3, 4, 5]));

    let mut functions = FunctionMap::new();
    functions.insert("main".into(), BTreeSet::from([3, 4, 5]));
    data.graph.files.insert(path("/proj/src/main.c"), functions);

    let options = Options::default();
    let policy = IgnorePolicy::default();

    let baseline = assemble("initial", &data, &BTreeMap::new(), &options, &policy)?;

    let gcov = parse_gcov(
        "\
        -:    0:Source:src/main.c
function main called 1 returned 100% blocks executed 66%
        1:    3:int main() {
    #####:    4:  abort();
        1:    5:}
",
        "main.c.gcov",
    )?;
    assert_eq!(gcov.source, "src/main.c");

    let counts = BTreeMap::from([(path("/proj/src/main.c"), gcov.counts)]);
    let run = assemble("run", &data, &counts, &options, &policy)?;

    let merged = combine(baseline, run)?;
    let summary = merged.summary();
    assert_eq!((summary.lines_found, summary.lines_hit), (3, 2));
    assert_eq!((summary.functions_found, summary.functions_hit), (1, 1));

    // Two lines inserted above `main`.
    let diff = parse_unified_diff(
        "\
--- a/src/main.c
+++ b/src/main.c
@@ -1,2 +1,4 @@
 #include <stdlib.h>
+#include <stdio.h>
+#include <string.h>

",
        1,
    )?;

    let report = apply_diff(merged, &diff, &DiffOptions::default())?;
    assert_eq!(report.converted, 1);

    let file = report.model.file(&path("/proj/src/main.c")).unwrap();
    assert_eq!(
        file.lines.keys().map(|l| l.number()).collect::<Vec<_>>(),
        vec![5, 6, 7]
    );
    assert_eq!(file.functions["main"], line(5));
    assert_eq!(
        file.tests.keys().collect::<Vec<_>>(),
        vec!["initial,diff", "run,diff"]
    );

    let (text, _) = codec::to_string(&report.model, &options);
    assert!(text.contains("TN:run,diff\n"));
    assert!(text.contains("FN:5,main\n"));

    Ok(())
}
