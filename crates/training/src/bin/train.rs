use clap::Parser;
use cli_support::{init_tracing, PipelineConfig};
use training::util::{run_train, TrainArgs};

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = TrainArgs::parse();
    let pipeline = PipelineConfig::load();
    run_train(&args, &pipeline)?;
    Ok(())
}
