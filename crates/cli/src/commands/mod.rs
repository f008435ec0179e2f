use std::process::ExitCode;

use orderpull::credentials::{CredentialProvider, EnvCredentials};
use orderpull::{DownloadController, Orchestrator, Settings, StatusReceiver};
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};

pub mod config;
pub mod fetch;
pub mod interactive;

pub async fn dispatch(cli: Cli) -> Result<ExitCode> {
	let settings = load_settings(&cli)?;
	match cli.command {
		Commands::Config => config::execute(&settings),
		Commands::Fetch => {
			let (controller, updates) = controller(settings)?;
			fetch::execute(controller, updates, cli.format).await
		}
		Commands::Interactive => {
			let (controller, updates) = controller(settings)?;
			interactive::execute(controller, updates, cli.format).await
		}
	}
}

/// File (or default file) settings with command-line overrides applied.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
	let mut settings = Settings::load(cli.config.as_deref())?;
	if let Some(dir) = &cli.download_dir {
		settings.download_dir = dir.clone();
	}
	if cli.headless {
		settings.browser.headless = true;
	}
	settings.validate()?;
	Ok(settings)
}

fn controller(settings: Settings) -> Result<(DownloadController, StatusReceiver)> {
	if !settings.download_dir.is_dir() {
		return Err(CliError::DownloadDir(settings.download_dir));
	}
	let credentials = EnvCredentials::default().credentials()?;
	info!(target = "orderpull", user = credentials.identifier(), dir = %settings.download_dir.display(), "ready");
	Ok(DownloadController::new(Orchestrator::with_cdp(settings, credentials)))
}
