use clap::Parser;

mod commands;
mod context;

use commands::Commands;
use context::{Context, GlobalArgs};

#[derive(Parser)]
#[command(name = "stagecrypt")]
#[command(about = "Multi-stage configuration with KMS-encrypted secrets", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    stagecrypt_utils::tracing::init(cli.global.verbose)
        .map_err(|e| eyre::eyre!("failed to initialize logging: {e}"))?;

    let context = Context::from_args(&cli.global)?;
    if let Err(error) = cli.command.execute(&context) {
        if let Some(path) = error.path().filter(|path| !path.is_root()) {
            tracing::debug!(path = %path, "Command failed inside the config tree");
        }
        return Err(error.into());
    }
    Ok(())
}
