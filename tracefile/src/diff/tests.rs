// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use pretty_assertions::assert_eq;

use super::*;
use crate::branch::Block;
use crate::codec;
use crate::model::Count;
use crate::options::Options;

const INSERTION: &str = "\
--- a/src/main.c
+++ b/src/main.c
@@ -10,3 +10,5 @@
 ten
 eleven
 twelve
+thirteen
+fourteen
";

fn trace(text: &str) -> TraceModel {
    codec::parse(text, "test.info", &Options::all()).unwrap().0
}

fn path(p: &str) -> SourcePath {
    SourcePath::new(p).unwrap()
}

fn line(n: u32) -> Line {
    Line::new(n).unwrap()
}

#[test]
fn test_lines_after_hunk_shift() -> Result<()> {
    let model = trace("TN:t\nSF:/proj/src/main.c\nDA:5,1\nDA:11,2\nDA:15,4\nend_of_record\n");
    let diff = parse_unified_diff(INSERTION, 1)?;

    let report = apply_diff(model, &diff, &DiffOptions::default())?;
    assert_eq!((report.converted, report.unchanged), (1, 0));

    let file = report.model.file(&path("/proj/src/main.c")).unwrap();
    let lines: Vec<_> = file.lines.iter().map(|(l, c)| (l.number(), c.0)).collect();
    assert_eq!(lines, vec![(5, 1), (11, 2), (17, 4)]);

    assert_eq!(file.tests.keys().collect::<Vec<_>>(), vec!["t,diff"]);

    Ok(())
}

#[test]
fn test_deleted_lines_dropped() -> Result<()> {
    let model = trace(
        "\
TN:t
SF:/src/a.c
FN:2,gone
FN:4,kept
FNDA:1,gone
FNDA:3,kept
BRDA:2,0,0,1
BRDA:4,0,0,1
DA:1,1,c1
DA:2,1,c2
DA:3,0,c3
DA:4,3,c4
end_of_record
",
    );

    let diff = parse_unified_diff(
        "\
--- a.c
+++ a.c
@@ -1,4 +1,3 @@
 one
-two
 three
 four
",
        0,
    )?;

    let report = apply_diff(model, &diff, &DiffOptions::default())?;
    let file = report.model.file(&path("/src/a.c")).unwrap();

    let lines: Vec<_> = file.lines.keys().map(|l| l.number()).collect();
    assert_eq!(lines, vec![1, 2, 3]);
    assert_eq!(file.lines[&line(3)], Count(3));

    assert_eq!(file.functions.len(), 1);
    assert_eq!(file.functions["kept"], line(3));
    assert!(!file.function_counts.contains_key("gone"));

    assert_eq!(file.checksums[&line(2)], "c3");
    assert_eq!(file.branches.len(), 1);
    assert!(file.branches.get(line(3), Block::Named(0), 0).is_some());

    Ok(())
}

#[test]
fn test_unmatched_files_unchanged() -> Result<()> {
    let text = "TN:t\nSF:/src/other.c\nDA:15,4\nend_of_record\n";
    let model = trace(text);
    let diff = parse_unified_diff(INSERTION, 1)?;

    let report = apply_diff(model.clone(), &diff, &DiffOptions::default())?;

    assert_eq!((report.converted, report.unchanged), (0, 1));
    assert_eq!(report.model, model);

    Ok(())
}

#[test]
fn test_deleted_file_removed() -> Result<()> {
    let model = trace("SF:/src/gone.c\nDA:1,1\nend_of_record\nSF:/src/kept.c\nDA:1,1\nend_of_record\n");
    let diff = parse_unified_diff("--- a/gone.c\n+++ /dev/null\n@@ -1 +0,0 @@\n-one\n", 1)?;

    let report = apply_diff(model, &diff, &DiffOptions::default())?;

    assert!(report.model.file(&path("/src/gone.c")).is_none());
    assert!(report.model.file(&path("/src/kept.c")).is_some());
    assert_eq!(report.converted, 1);

    Ok(())
}

#[test]
fn test_most_specific_section_wins() -> Result<()> {
    let model = trace("SF:/proj/lib/util.c\nDA:1,1\nDA:2,1\nend_of_record\n");

    // Line 1 removed in lib/util.c, line 2 removed in util.c.
    let text = "\
--- util.c
+++ util.c
@@ -2 +1,0 @@
-two
--- lib/util.c
+++ lib/util.c
@@ -1 +0,0 @@
-one
";
    let diff = parse_unified_diff(text, 0)?;

    let report = apply_diff(model, &diff, &DiffOptions::default())?;
    let file = report.model.file(&path("/proj/lib/util.c")).unwrap();

    assert_eq!(file.lines.keys().map(|l| l.number()).collect::<Vec<_>>(), vec![1]);

    Ok(())
}

#[test]
fn test_equal_specificity_is_ambiguous() -> Result<()> {
    let model = trace("SF:/proj/lib/util.c\nDA:1,1\nend_of_record\n");

    let text = "\
--- lib/util.c
+++ lib/util.c
@@ -1 +1 @@
-one
+uno
--- /lib/util.c
+++ /lib/util.c
@@ -1 +1 @@
-one
+uno
";
    let diff = parse_unified_diff(text, 0)?;

    let err = apply_diff(model, &diff, &DiffOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        TraceError::Integrity(IntegrityError::AmbiguousDiff { .. })
    ));

    Ok(())
}

#[test]
fn test_diff_path_restricts_matches() -> Result<()> {
    let model = trace("SF:/proj/src/main.c\nDA:15,4\nend_of_record\nSF:/other/src/main.c\nDA:15,4\nend_of_record\n");
    let diff = parse_unified_diff(INSERTION, 1)?;

    let options = DiffOptions {
        diff_path: Some("/proj/".into()),
        ..DiffOptions::default()
    };
    let report = apply_diff(model, &diff, &options)?;

    assert_eq!((report.converted, report.unchanged), (1, 1));
    assert!(report.model.file(&path("/proj/src/main.c")).unwrap().lines.contains_key(&line(17)));
    assert!(report.model.file(&path("/other/src/main.c")).unwrap().lines.contains_key(&line(15)));

    Ok(())
}

#[test]
fn test_diff_test_names_merge() -> Result<()> {
    let model = trace(
        "\
TN:t
SF:/src/main.c
DA:15,1
end_of_record
TN:t,diff
SF:/src/main.c
DA:15,2
end_of_record
TN:u,other
SF:/src/main.c
DA:15,0
end_of_record
",
    );
    let diff = parse_unified_diff(INSERTION, 1)?;

    let report = apply_diff(model, &diff, &DiffOptions::default())?;
    let file = report.model.file(&path("/src/main.c")).unwrap();

    // `TN:u,other` was read as plain `u`.
    assert_eq!(file.tests.keys().collect::<Vec<_>>(), vec!["t,diff", "u,diff"]);
    assert_eq!(file.tests["t,diff"].lines[&line(17)], Count(3));

    Ok(())
}

#[test]
fn test_convert_filenames() -> Result<()> {
    let model = trace(
        "\
TN:t
SF:/proj/src/old/x.c
DA:1,1
end_of_record
SF:/proj/src/old/y.c
DA:1,1
end_of_record
SF:/proj/src/new/x.c
DA:1,2
DA:2,0
end_of_record
SF:/proj/lib/z.c
DA:1,1
end_of_record
",
    );

    let text = "\
--- a/src/old/x.c
+++ b/src/new/x.c
@@ -1 +1 @@
 one
";
    let diff = parse_unified_diff(text, 1)?;

    let options = DiffOptions {
        convert_filenames: true,
        ..DiffOptions::default()
    };
    let report = apply_diff(model, &diff, &options)?;

    let paths: Vec<_> = report.model.files.keys().map(|p| p.as_str()).collect();
    assert_eq!(paths, vec!["/proj/lib/z.c", "/proj/src/new/x.c", "/proj/src/new/y.c"]);

    // The converted file merged into the one already at the new path.
    let x = report.model.file(&path("/proj/src/new/x.c")).unwrap();
    assert_eq!(x.tests.keys().collect::<Vec<_>>(), vec!["t", "t,diff"]);
    assert_eq!(x.lines[&line(1)], Count(3));

    Ok(())
}

#[test]
fn test_conversion_table_expands_directories() -> Result<()> {
    let diff = parse_unified_diff("--- a/src/old/x.c\n+++ b/src/new/y.c\n@@ -1 +1 @@\n one\n", 1)?;
    let table = conversion_table(&diff);

    assert_eq!(table["src/old/x.c"], "src/new/y.c");
    assert_eq!(table["src/old"], "src/new");
    assert!(!table.contains_key("src"));

    assert_eq!(
        convert_path("/p/src/old/x.c", &table, None).as_deref(),
        Some("/p/src/new/y.c")
    );
    assert_eq!(
        convert_path("/p/src/old/sub/z.c", &table, None).as_deref(),
        Some("/p/src/new/sub/z.c")
    );
    assert_eq!(convert_path("/p/src/older/z.c", &table, None), None);
    assert_eq!(convert_path("/p/src/old/x.c", &table, Some("/q")), None);

    Ok(())
}
