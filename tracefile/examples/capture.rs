// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use anyhow::Result;
use clap::Parser;
use gcov_graph::{BaseDir, DecodeOptions, PathResolver, SourcePath};
use tracefile::capture::{assemble, load_gcov, load_graph};
use tracefile::{combine_all, write_tracefile, IgnorePolicy, Options};

#[derive(Parser, Debug)]
struct Args {
    /// Graph files (`.bb`, `.bbg` or `.gcno`).
    #[arg(required = true)]
    graphs: Vec<String>,

    /// `.gcov` outputs holding execution counts. Files without one are
    /// captured with zero counts.
    #[arg(short, long)]
    gcov: Vec<String>,

    /// Directory the compiler ran in.
    #[arg(short, long, default_value = ".")]
    base_dir: String,

    #[arg(short, long, default_value = "")]
    test_name: String,

    #[arg(short, long)]
    output: String,

    #[arg(long)]
    branch_coverage: bool,

    #[arg(long)]
    checksum: bool,

    /// Skip unreadable graph, source and gcov files.
    #[arg(long)]
    ignore_errors: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let options = Options {
        branch_coverage: args.branch_coverage,
        checksum: args.checksum,
        ..Options::default()
    };

    let policy = IgnorePolicy {
        graph: args.ignore_errors,
        source: args.ignore_errors,
        gcov: args.ignore_errors,
    };

    let resolver = BaseDir::new(std::env::current_dir()?.join(&args.base_dir));

    let mut counts = BTreeMap::new();

    for gcov in &args.gcov {
        if let Some(file) = load_gcov(gcov, &policy)? {
            let path = SourcePath::new(resolver.resolve(&file.source))?;
            counts.insert(path, file.counts);
        }
    }

    let mut models = vec![];

    for graph in &args.graphs {
        let Some(data) = load_graph(graph, &DecodeOptions::default(), &resolver, &policy)? else {
            continue;
        };

        models.push(assemble(&args.test_name, &data, &counts, &options, &policy)?);
    }

    let model = combine_all(models)?;
    let summary = write_tracefile(&args.output, &model, &options)?;

    println!("{summary}");

    Ok(())
}
