// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use shaperpc_compiler::common::read_description;
use shaperpc_compiler::{RustStubBackend, parse_parameters, write_artifact};
use shaperpc_contract::CodegenBackend;
use shaperpc_tracing::TracingConfiguration;

/// Generate Rust stubs from a contract description read on stdin
#[derive(Parser, Debug)]
#[command(name = "shaperpc-gen", version, about)]
struct Args {
    /// Directory receiving the generated file
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Generator parameters, `key=value,...` (module, runtime_crate)
    #[arg(short, long, default_value = "", env = "SHAPERPC_GEN_PARAMS")]
    params: String,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    TracingConfiguration::default()
        .with_log_level(args.log_level.clone())
        .with_filter(args.log_level.clone())
        .setup_tracing_subscriber()
        .context("Failed to set up tracing")?;

    let description =
        read_description(io::stdin().lock()).context("Failed to read contract description")?;
    let backend = RustStubBackend::from_parameters(&parse_parameters(&args.params))
        .context("Invalid generator parameters")?;

    let artifact = backend
        .generate(&description)
        .with_context(|| format!("Failed to generate {}", description.contract_name))?;
    let written = write_artifact(&args.out_dir, &artifact)
        .with_context(|| format!("Failed to write {}", artifact.file_name))?;

    let path = args.out_dir.join(&artifact.file_name);
    if written {
        println!("{}", path.display());
    } else {
        println!("{} (up to date)", path.display());
    }
    Ok(())
}
