use clap::{Parser, Subcommand};
use inspect::InspectCommand;
use transfer::{ExportCommand, ImportCommand};

mod inspect;
mod transfer;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Inspect(InspectCommand),
    Export(ExportCommand),
    Import(ImportCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    pretty_env_logger::init();

    let args = Args::parse();

    match args.commands {
        Commands::Inspect(inspect) => inspect.run(),
        Commands::Export(mut export) => export.run().await,
        Commands::Import(mut import) => import.run().await,
    }
}
