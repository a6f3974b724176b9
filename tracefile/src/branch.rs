// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::ops::Add;

use crate::model::{Count, Line};

/// Basic block that a branch leaves from.
///
/// `Unnamed` sorts after every named block.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Block {
    Named(u32),
    Unnamed,
}

impl Block {
    /// Value written in place of an unnamed block.
    pub const UNNAMED: u32 = u32::MAX;
}

impl From<u32> for Block {
    fn from(block: u32) -> Self {
        if block == Self::UNNAMED {
            Block::Unnamed
        } else {
            Block::Named(block)
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Block::Named(block) => write!(f, "{block}"),
            Block::Unnamed => write!(f, "{}", Self::UNNAMED),
        }
    }
}

/// How often a branch was taken, if the block it leaves was ever evaluated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Taken {
    Unevaluated,
    Count(Count),
}

impl Taken {
    pub fn reached(&self) -> bool {
        matches!(self, Taken::Count(count) if count.reached())
    }
}

impl Add for Taken {
    type Output = Taken;

    /// `Unevaluated` is the identity.
    fn add(self, other: Taken) -> Taken {
        match (self, other) {
            (Taken::Unevaluated, taken) | (taken, Taken::Unevaluated) => taken,
            (Taken::Count(mut a), Taken::Count(b)) => {
                a += b;
                Taken::Count(a)
            }
        }
    }
}

impl fmt::Display for Taken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Taken::Unevaluated => write!(f, "-"),
            Taken::Count(count) => write!(f, "{count}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BranchRecord {
    pub line: Line,
    pub block: Block,
    pub branch: u32,
    pub taken: Taken,
}

impl BranchRecord {
    pub fn key(&self) -> (Line, Block, u32) {
        (self.line, self.block, self.branch)
    }
}

/// Branch records kept sorted and unique by (line, block, branch).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BranchVector {
    records: Vec<BranchRecord>,
}

impl BranchVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record`, adding its taken count to any record with the same key.
    pub fn push(&mut self, record: BranchRecord) {
        match self
            .records
            .binary_search_by_key(&record.key(), BranchRecord::key)
        {
            Ok(index) => {
                let existing = &mut self.records[index];
                existing.taken = existing.taken + record.taken;
            }
            Err(index) => self.records.insert(index, record),
        }
    }

    pub fn merge(&mut self, other: BranchVector) {
        for record in other.records {
            self.push(record);
        }
    }

    pub fn get(&self, line: Line, block: Block, branch: u32) -> Option<&BranchRecord> {
        let index = self
            .records
            .binary_search_by_key(&(line, block, branch), BranchRecord::key)
            .ok()?;

        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BranchRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn found(&self) -> usize {
        self.len()
    }

    pub fn hit(&self) -> usize {
        self.records.iter().filter(|r| r.taken.reached()).count()
    }

    /// Move every record to the line chosen by `map`, dropping records whose
    /// line maps to `None`.
    pub fn remap(self, mut map: impl FnMut(Line) -> Option<Line>) -> BranchVector {
        let mut remapped = BranchVector::new();

        for record in self.records {
            if let Some(line) = map(record.line) {
                remapped.push(BranchRecord { line, ..record });
            }
        }

        remapped
    }
}

impl FromIterator<BranchRecord> for BranchVector {
    fn from_iter<I: IntoIterator<Item = BranchRecord>>(iter: I) -> Self {
        let mut vector = BranchVector::new();

        for record in iter {
            vector.push(record);
        }

        vector
    }
}
