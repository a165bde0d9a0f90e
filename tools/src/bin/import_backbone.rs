use anyhow::Result;
use clap::Parser;
use cli_support::init_tracing;
use tools::{run_import, ImportArgs};

#[derive(Parser, Debug)]
#[command(
    name = "import_backbone",
    about = "Convert ImageNet MobileNetV2 weights into a Burn backbone record"
)]
struct Cli {
    #[command(flatten)]
    import: ImportArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let written = run_import(&cli.import)?;
    println!("wrote {}", written.display());
    Ok(())
}
