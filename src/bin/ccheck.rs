//! The `ccheck` executable: a value-flow based static analyzer for C and
//! C++ sources.

use anyhow::Result;
use clap::Parser;

use ccheck_cli::commands::AnalyzeCommand;

/// ccheck — C/C++ static analysis.
#[derive(Parser)]
#[command(name = "ccheck", version, about)]
struct Ccheck {
    #[command(flatten)]
    analyze: AnalyzeCommand,
}

fn main() -> Result<()> {
    env_logger::init();
    Ccheck::parse().analyze.execute()
}
