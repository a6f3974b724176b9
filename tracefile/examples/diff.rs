// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use clap::Parser;
use tracefile::diff::{apply_diff, read_diff, DiffOptions};
use tracefile::{read_tracefile, write_tracefile, Options};

#[derive(Parser, Debug)]
struct Args {
    /// Tracefile recorded against the old sources.
    tracefile: String,

    /// Unified diff from the old sources to the new ones.
    diff: String,

    #[arg(short, long)]
    output: String,

    /// Leading directories to remove from diff paths.
    #[arg(short = 'p', long, default_value_t = 0)]
    strip: usize,

    /// Directory the diff paths are relative to.
    #[arg(long)]
    diff_path: Option<String>,

    /// Rename files the diff renames.
    #[arg(long)]
    convert_filenames: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let options = Options::default();
    let diff_options = DiffOptions {
        strip: args.strip,
        diff_path: args.diff_path,
        convert_filenames: args.convert_filenames,
    };

    let (model, _) = read_tracefile(&args.tracefile, &options)?;
    let diff = read_diff(&args.diff, diff_options.strip)?;

    let report = apply_diff(model, &diff, &diff_options)?;
    let summary = write_tracefile(&args.output, &report.model, &options)?;

    println!(
        "{} files converted, {} unchanged",
        report.converted, report.unchanged
    );
    println!("{summary}");

    Ok(())
}
