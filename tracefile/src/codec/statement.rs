// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, i64, u32};
use nom::combinator::{all_consuming, map, opt, rest, value};
use nom::sequence::{preceded, separated_pair, tuple};
use nom::IResult;

use crate::branch::Block;

/// One line of a tracefile.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Statement<'a> {
    /// `TN:<name>`
    TestName(&'a str),

    /// `SF:<path>`
    SourceFile(&'a str),

    /// `FN:<line>,<name>`
    Function { line: u32, name: &'a str },

    /// `FNDA:<count>,<name>`
    FunctionData { count: i64, name: &'a str },

    FunctionsFound(u32),
    FunctionsHit(u32),

    /// `BRDA:<line>,<block>,<branch>,<taken>`, where `None` is written `-`.
    BranchData {
        line: u32,
        block: Block,
        branch: u32,
        taken: Option<i64>,
    },

    BranchesFound(u32),
    BranchesHit(u32),

    /// `DA:<line>,<count>[,<checksum>]`
    LineData {
        line: u32,
        count: i64,
        checksum: Option<&'a str>,
    },

    LinesFound(u32),
    LinesHit(u32),

    EndOfRecord,

    /// Anything unrecognized or malformed.
    Unknown,
}

impl<'a> Statement<'a> {
    /// Classify one line of text. Never fails; see [`Statement::Unknown`].
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim_end_matches(&['\r', '\n'][..]);

        match all_consuming(statement)(line) {
            Ok((_, statement)) => statement,
            Err(_) => Statement::Unknown,
        }
    }
}

fn statement(input: &str) -> IResult<&str, Statement<'_>> {
    alt((
        value(Statement::EndOfRecord, tag("end_of_record")),
        map(preceded(tag("TN:"), rest), Statement::TestName),
        map(preceded(tag("SF:"), rest), Statement::SourceFile),
        preceded(tag("FNDA:"), function_data),
        map(preceded(tag("FNF:"), u32), Statement::FunctionsFound),
        map(preceded(tag("FNH:"), u32), Statement::FunctionsHit),
        preceded(tag("FN:"), function),
        preceded(tag("BRDA:"), branch_data),
        map(preceded(tag("BRF:"), u32), Statement::BranchesFound),
        map(preceded(tag("BRH:"), u32), Statement::BranchesHit),
        preceded(tag("DA:"), line_data),
        map(preceded(tag("LF:"), u32), Statement::LinesFound),
        map(preceded(tag("LH:"), u32), Statement::LinesHit),
    ))(input)
}

fn function(input: &str) -> IResult<&str, Statement<'_>> {
    map(separated_pair(u32, char(','), rest), |(line, name)| {
        Statement::Function { line, name }
    })(input)
}

fn function_data(input: &str) -> IResult<&str, Statement<'_>> {
    map(separated_pair(i64, char(','), rest), |(count, name)| {
        Statement::FunctionData { count, name }
    })(input)
}

fn block(input: &str) -> IResult<&str, Block> {
    alt((value(Block::Unnamed, tag("-1")), map(u32, Block::from)))(input)
}

fn taken(input: &str) -> IResult<&str, Option<i64>> {
    alt((map(i64, Some), value(None, char('-'))))(input)
}

fn branch_data(input: &str) -> IResult<&str, Statement<'_>> {
    let (input, (line, _, block, _, branch, _, taken)) = tuple((
        u32,
        char(','),
        block,
        char(','),
        u32,
        char(','),
        taken,
    ))(input)?;

    Ok((
        input,
        Statement::BranchData {
            line,
            block,
            branch,
            taken,
        },
    ))
}

fn line_data(input: &str) -> IResult<&str, Statement<'_>> {
    let (input, (line, _, count)) = tuple((u32, char(','), i64))(input)?;
    let (input, checksum) = opt(preceded(char(','), rest))(input)?;

    Ok((
        input,
        Statement::LineData {
            line,
            count,
            checksum,
        },
    ))
}

impl fmt::Display for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Statement::TestName(name) => write!(f, "TN:{name}"),
            Statement::SourceFile(path) => write!(f, "SF:{path}"),
            Statement::Function { line, name } => write!(f, "FN:{line},{name}"),
            Statement::FunctionData { count, name } => write!(f, "FNDA:{count},{name}"),
            Statement::FunctionsFound(n) => write!(f, "FNF:{n}"),
            Statement::FunctionsHit(n) => write!(f, "FNH:{n}"),
            Statement::BranchData {
                line,
                block,
                branch,
                taken,
            } => {
                write!(f, "BRDA:{line},{block},{branch},")?;

                match taken {
                    Some(taken) => write!(f, "{taken}"),
                    None => write!(f, "-"),
                }
            }
            Statement::BranchesFound(n) => write!(f, "BRF:{n}"),
            Statement::BranchesHit(n) => write!(f, "BRH:{n}"),
            Statement::LineData {
                line,
                count,
                checksum,
            } => {
                write!(f, "DA:{line},{count}")?;

                if let Some(checksum) = checksum {
                    write!(f, ",{checksum}")?;
                }

                Ok(())
            }
            Statement::LinesFound(n) => write!(f, "LF:{n}"),
            Statement::LinesHit(n) => write!(f, "LH:{n}"),
            Statement::EndOfRecord => write!(f, "end_of_record"),
            Statement::Unknown => Ok(()),
        }
    }
}
