use anyhow::{Context, Result};
use burn_dataset::{summarize_root, types::ValidationOutcome};
use clap::Parser;
use cli_support::{init_tracing, PipelineConfig};
use tools::{render_text, SummaryArgs};

#[derive(Parser, Debug)]
#[command(
    name = "dataset_summary",
    about = "Count images per age bucket and flag trees the trainer would reject"
)]
struct Cli {
    #[command(flatten)]
    summary: SummaryArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let root = cli.summary.dataset.resolve(&PipelineConfig::load());
    let report =
        summarize_root(&root).with_context(|| format!("summarizing {}", root.display()))?;

    if cli.summary.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report));
    }
    if report.outcome == ValidationOutcome::Fail {
        anyhow::bail!("dataset at {} is not trainable", root.display());
    }
    Ok(())
}
