use clap::Parser;
use nftel_cli::Cli;
use nftel_cli::tracing_setup::init_subscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber(cli.verbosity());
    cli.run().await
}
