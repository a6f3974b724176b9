// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory coverage trace database, with its text codec and the engines
//! that combine traces and carry them across source edits.

#[macro_use]
extern crate log;

pub mod branch;
pub mod capture;
pub mod codec;
pub mod diff;
pub mod error;
pub mod merge;
pub mod model;
pub mod options;

pub use branch::{Block, BranchRecord, BranchVector, Taken};
pub use codec::{read_tracefile, write_tracefile, ParseWarnings};
pub use error::{ErrorCategory, IgnorePolicy, IntegrityError, TraceError};
pub use merge::{combine, combine_all};
pub use model::{Count, Line, Summary, TestCoverage, TestedFile, TraceModel};
pub use options::Options;
