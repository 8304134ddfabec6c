mod cli;
mod cli_progress;

use anyhow::Result;
use cli::Cli;
use log::{debug, error, info};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Cli::parse();
    kdl_core::logging::init(args.log_level());
    debug!("CLI arguments: {:?}", args);

    let sinks = cli_progress::build_sinks(args.progress_mode());
    let request = cli::resolve(args, sinks)?;

    let final_path = kdl_core::run(request).await?;

    info!("download completed successfully: {}", final_path.display());
    Ok(())
}
