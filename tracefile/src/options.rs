// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

/// Which kinds of coverage data are read, assembled and written.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Options {
    pub function_coverage: bool,
    pub branch_coverage: bool,

    /// Emit per-line source checksums when writing.
    pub checksum: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            function_coverage: true,
            branch_coverage: false,
            checksum: false,
        }
    }
}

impl Options {
    /// Every kind of coverage data enabled.
    pub fn all() -> Self {
        Self {
            function_coverage: true,
            branch_coverage: true,
            checksum: true,
        }
    }
}
