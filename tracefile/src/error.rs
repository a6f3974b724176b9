// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io;
use std::path::PathBuf;

use gcov_graph::FormatError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("no coverage data found in {0}")]
    DataAbsent(String),

    #[error("unable to read {}", path.display())]
    Input {
        path: PathBuf,

        #[source]
        source: io::Error,
    },
}

impl TraceError {
    pub fn input(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();

        Self::Input { path, source }
    }
}

/// Coverage data from two sources disagrees, or cannot be placed
/// unambiguously. Never downgraded to a warning.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum IntegrityError {
    #[error("checksum mismatch at {file}:{line}")]
    ChecksumMismatch { file: String, line: u32 },

    #[error("ambiguous diff entries for {file}")]
    AmbiguousDiff { file: String },
}

/// The collaborator whose input failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorCategory {
    /// Graph files (`.bb`, `.bbg`, `.gcno`).
    Graph,

    /// Source files read for checksums.
    Source,

    /// Output of the line-counting tool.
    Gcov,
}

/// Per-category choice to skip unreadable or malformed inputs with a warning
/// instead of failing.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct IgnorePolicy {
    pub graph: bool,
    pub source: bool,
    pub gcov: bool,
}

impl IgnorePolicy {
    pub fn ignores(&self, category: ErrorCategory) -> bool {
        match category {
            ErrorCategory::Graph => self.graph,
            ErrorCategory::Source => self.source,
            ErrorCategory::Gcov => self.gcov,
        }
    }

    /// Pass `result` through, except that format and input errors in an
    /// ignored category become `Ok(None)` after a warning.
    pub fn check<T>(
        &self,
        category: ErrorCategory,
        result: Result<T, TraceError>,
    ) -> Result<Option<T>, TraceError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err @ (TraceError::Format(_) | TraceError::Input { .. }))
                if self.ignores(category) =>
            {
                warn!("{err}, skipping");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use gcov_graph::FormatErrorKind;

    use super::*;

    fn format_error() -> TraceError {
        FormatError::new("a.gcno", FormatErrorKind::BadMagic(0)).into()
    }

    #[test]
    fn test_default_policy_is_fatal() {
        let policy = IgnorePolicy::default();
        let result: Result<(), _> = Err(format_error());

        assert!(policy.check(ErrorCategory::Graph, result).is_err());
    }

    #[test]
    fn test_ignored_category_skips() {
        let policy = IgnorePolicy {
            graph: true,
            ..IgnorePolicy::default()
        };

        let skipped = policy.check::<()>(ErrorCategory::Graph, Err(format_error()));
        assert!(matches!(skipped, Ok(None)));

        let other = policy.check::<()>(ErrorCategory::Gcov, Err(format_error()));
        assert!(other.is_err());

        let ok = policy.check(ErrorCategory::Graph, Ok(5));
        assert!(matches!(ok, Ok(Some(5))));
    }

    #[test]
    fn test_integrity_never_ignored() {
        let policy = IgnorePolicy {
            graph: true,
            source: true,
            gcov: true,
        };

        let err = IntegrityError::ChecksumMismatch {
            file: "a.c".into(),
            line: 3,
        };

        let result = policy.check::<()>(ErrorCategory::Source, Err(err.into()));
        assert!(matches!(result, Err(TraceError::Integrity(_))));

        let absent = policy.check::<()>(ErrorCategory::Gcov, Err(TraceError::DataAbsent("x".into())));
        assert!(absent.is_err());
    }
}
