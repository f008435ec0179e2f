use std::process::ExitCode;

use clap::Parser;
use orderpull_cli::{cli::Cli, commands, logging};
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	match commands::dispatch(cli).await {
		Ok(code) => Ok(code),
		Err(err) => {
			error!(target = "orderpull", error = %err, "command failed");
			Err(err.into())
		}
	}
}
