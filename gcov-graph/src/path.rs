// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use path_absolutize::Absolutize;

/// Path to a source file, as recorded in coverage data. Guaranteed UTF-8.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SourcePath(String);

impl SourcePath {
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();

        if path.is_empty() {
            bail!("source path is empty");
        }

        if Path::new(&path).file_name().is_none() {
            bail!("source path has no file name: `{path}`");
        }

        Ok(Self(path))
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> &str {
        // Unwraps checked by ctor.
        Path::new(&self.0).file_name().unwrap().to_str().unwrap()
    }
}

impl From<SourcePath> for String {
    fn from(path: SourcePath) -> Self {
        path.0
    }
}

impl AsRef<str> for SourcePath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<Path> for SourcePath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps source paths as recorded by the compiler to the paths that coverage
/// data is keyed on.
pub trait PathResolver {
    fn resolve(&self, path: &str) -> String;
}

/// Leaves paths as recorded.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl PathResolver for Identity {
    fn resolve(&self, path: &str) -> String {
        path.to_owned()
    }
}

/// Resolves relative paths against the directory the compiler ran in.
#[derive(Clone, Debug)]
pub struct BaseDir {
    base: PathBuf,
}

impl BaseDir {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();

        Self { base }
    }
}

impl PathResolver for BaseDir {
    fn resolve(&self, path: &str) -> String {
        match Path::new(path).absolutize_from(&self.base) {
            Ok(resolved) => resolved.to_string_lossy().into_owned(),
            Err(err) => {
                warn!("unable to resolve {path} against {}: {err}", self.base.display());
                path.to_owned()
            }
        }
    }
}
