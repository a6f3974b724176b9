// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use clap::Parser;
use gcov_graph::{read_graph, BaseDir, DecodeOptions, SplitChecksum};

#[derive(Parser, Debug)]
struct Args {
    /// Path to a `.bb`, `.bbg` or `.gcno` file.
    graph: String,

    /// Resolve relative source paths against this directory.
    #[arg(short, long)]
    base_dir: Option<String>,

    /// Force split checksums on for pre-4.7 `.gcno` files.
    #[arg(long)]
    split_checksum: bool,

    /// Print the per-function graph instead of instrumented lines.
    #[arg(short, long)]
    functions: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let options = DecodeOptions {
        split_checksum: if args.split_checksum {
            SplitChecksum::On
        } else {
            SplitChecksum::Auto
        },
    };

    let mut data = read_graph(&args.graph, &options)?;

    if let Some(base_dir) = args.base_dir {
        let base_dir = std::env::current_dir()?.join(base_dir);
        data = data.resolve_paths(&BaseDir::new(base_dir))?;
    }

    if args.functions {
        for (path, functions) in &data.graph.files {
            println!("{path}");

            for (function, lines) in functions {
                println!("  {function}: {lines:?}");
            }
        }
    } else {
        for (path, lines) in &data.instrumented.files {
            println!("{path}: {lines:?}");
        }
    }

    Ok(())
}
