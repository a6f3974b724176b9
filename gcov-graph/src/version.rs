// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

/// Compiler version recorded in a `.gcno` file, as `major << 16 | minor << 8`.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct GcovVersion(pub u32);

impl GcovVersion {
    /// Function records carry a separate CFG checksum.
    pub const SPLIT_CHECKSUM: Self = Self(0x04_07_00);

    /// Function records carry the artificial flag, column and end line, and
    /// the header carries the "unexecuted blocks" flag.
    pub const EXTENDED_FUNCTION: Self = Self(0x08_00_00);

    /// The header carries the compilation working directory.
    pub const WORKING_DIRECTORY: Self = Self(0x09_00_00);

    /// Decode the packed version word.
    ///
    /// The top three bytes spell the version in ASCII. Before GCC 10 this is
    /// a major digit and two minor digits (`"407*"` is 4.7); from GCC 10 the
    /// first byte is a letter counting tens (`"B01*"` is 10.1).
    pub fn from_raw(raw: u32) -> Self {
        let a = i64::from(raw >> 24);
        let b = i64::from(raw >> 16 & 0xff);
        let c = i64::from(raw >> 8 & 0xff);

        let zero = i64::from(b'0');
        let letter = i64::from(b'A');

        let (major, minor) = if a < letter {
            (a - zero, (b - zero) * 10 + c - zero)
        } else {
            ((a - letter) * 10 + b - zero, c - zero)
        };

        let major = major.clamp(0, 0xff) as u32;
        let minor = minor.clamp(0, 0xff) as u32;

        Self(major << 16 | minor << 8)
    }

    pub fn major(&self) -> u32 {
        self.0 >> 16
    }

    pub fn minor(&self) -> u32 {
        self.0 >> 8 & 0xff
    }
}

impl fmt::Display for GcovVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}
