use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "orderpull")]
#[command(about = "Download the purchase-order export from the supplier portal")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Settings file (defaults to ~/.config/orderpull/config.json when present)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Directory the browser saves the export into
	#[arg(short, long, global = true, value_name = "DIR")]
	pub download_dir: Option<PathBuf>,

	/// Run the browser without a window
	#[arg(long, global = true)]
	pub headless: bool,

	/// Output format for status updates
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run one download and exit (status 1 on failure)
	Fetch,

	/// Start a download with Enter, quit with q
	#[command(alias = "i")]
	Interactive,

	/// Print the effective settings as JSON
	Config,
}
