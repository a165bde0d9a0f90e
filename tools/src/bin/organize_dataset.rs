use anyhow::Result;
use clap::Parser;
use cli_support::{init_tracing, PipelineConfig};
use tools::{run_organize, OrganizeArgs};

#[derive(Parser, Debug)]
#[command(
    name = "organize_dataset",
    about = "Copy label-prefixed jpg files into per-label bucket directories"
)]
struct Cli {
    #[command(flatten)]
    organize: OrganizeArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let report = run_organize(&cli.organize, &PipelineConfig::load())?;
    println!(
        "copied {} files into {} buckets",
        report.copied,
        report.buckets.len()
    );
    Ok(())
}
