// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use clap::Parser;
use tracefile::{combine_all, read_tracefile, write_tracefile, Options};

#[derive(Parser, Debug)]
struct Args {
    /// Tracefiles to combine.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Where to write the combined tracefile.
    #[arg(short, long)]
    output: String,

    #[arg(long)]
    branch_coverage: bool,

    #[arg(long)]
    checksum: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let options = Options {
        branch_coverage: args.branch_coverage,
        checksum: args.checksum,
        ..Options::default()
    };

    let mut models = vec![];

    for input in &args.inputs {
        let (model, _) = read_tracefile(input, &options)?;
        models.push(model);
    }

    let combined = combine_all(models)?;
    let summary = write_tracefile(&args.output, &combined, &options)?;

    println!("{summary}");

    Ok(())
}
