// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::btree_map::Entry;

use gcov_graph::SourcePath;

use crate::error::{IntegrityError, TraceError};
use crate::model::{TestedFile, TraceModel};

/// Combine the coverage of the same source file from two traces.
///
/// Checksums must agree wherever both sides record one. Function start lines
/// that disagree keep the value from `a`.
pub fn combine_files(
    path: &SourcePath,
    mut a: TestedFile,
    b: TestedFile,
) -> Result<TestedFile, IntegrityError> {
    for (line, checksum) in &b.checksums {
        if let Some(existing) = a.checksums.get(line) {
            if existing != checksum {
                return Err(IntegrityError::ChecksumMismatch {
                    file: path.to_string(),
                    line: line.number(),
                });
            }
        }
    }

    a.checksums.extend(b.checksums);

    for (name, line) in b.functions {
        match a.functions.entry(name) {
            Entry::Vacant(entry) => {
                entry.insert(line);
            }
            Entry::Occupied(entry) => {
                if *entry.get() != line {
                    warn!(
                        "{path}: function {} starts on line {} and on line {line}, keeping line {}",
                        entry.key(),
                        entry.get(),
                        entry.get()
                    );
                }
            }
        }
    }

    for (test, coverage) in b.tests {
        a.tests.entry(test).or_default().merge(coverage);
    }

    a.rebuild_aggregates();

    Ok(a)
}

/// Combine two traces into one.
pub fn combine(mut a: TraceModel, b: TraceModel) -> Result<TraceModel, TraceError> {
    for (path, file) in b.files {
        let combined = match a.files.remove(&path) {
            Some(existing) => combine_files(&path, existing, file)?,
            None => file,
        };

        a.files.insert(path, combined);
    }

    Ok(a)
}

/// Fold [`combine`] over `models` in order, starting from an empty trace.
pub fn combine_all(models: impl IntoIterator<Item = TraceModel>) -> Result<TraceModel, TraceError> {
    let mut total = TraceModel::new();

    for model in models {
        total = combine(total, model)?;
    }

    Ok(total)
}
