use std::process::ExitCode;

use orderpull::Settings;

use crate::error::Result;

pub fn execute(settings: &Settings) -> Result<ExitCode> {
	println!("{}", serde_json::to_string_pretty(settings)?);
	Ok(ExitCode::SUCCESS)
}
