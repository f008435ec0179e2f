use std::io::{self, BufRead, BufReader};
use std::process::ExitCode;

use colored::Colorize;
use orderpull::{DownloadController, StatusReceiver, StatusUpdate};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::Result;
use crate::output::{self, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
	Start,
	Quit,
}

fn parse_input(line: &str) -> Input {
	match line.trim() {
		"q" | "quit" | "exit" => Input::Quit,
		_ => Input::Start,
	}
}

/// Forwards lines from `input` on a detached thread, outside the runtime's
/// blocking pool so shutdown never waits on a pending read. The channel closes at EOF.
fn read_lines<R>(input: R) -> io::Result<mpsc::UnboundedReceiver<io::Result<String>>>
where
	R: BufRead + Send + 'static,
{
	let (tx, rx) = mpsc::unbounded_channel();
	std::thread::Builder::new().name("orderpull-stdin".into()).spawn(move || {
		for line in input.lines() {
			if tx.send(line).is_err() {
				break;
			}
		}
	})?;
	Ok(rx)
}

/// Line-driven loop: Enter starts a download, `q` quits once no run is active.
pub async fn execute(controller: DownloadController, mut updates: StatusReceiver, format: OutputFormat) -> Result<ExitCode> {
	let mut lines = read_lines(BufReader::new(io::stdin()))?;
	let mut quitting = false;
	if format == OutputFormat::Text {
		println!("{}", "Ready. Press Enter to download, q to quit.".dimmed());
	}

	loop {
		tokio::select! {
			line = lines.recv(), if !quitting => {
				let input = match line.transpose()? {
					Some(line) => parse_input(&line),
					None => Input::Quit,
				};
				match input {
					Input::Start => {
						if !controller.start() {
							debug!(target = "orderpull", "download already running");
						}
					}
					Input::Quit if controller.is_running() => {
						quitting = true;
						if format == OutputFormat::Text {
							println!("{}", "Waiting for the current download to finish...".dimmed());
						}
					}
					Input::Quit => break,
				}
			}
			update = updates.recv() => {
				let Some(update) = update else { break };
				output::print(&update, format);
				if matches!(update, StatusUpdate::Finished(_)) && quitting {
					break;
				}
			}
		}
	}
	while let Ok(update) = updates.try_recv() {
		output::print(&update, format);
	}
	controller.join();
	Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blank_line_starts_and_q_quits() {
		assert_eq!(parse_input(""), Input::Start);
		assert_eq!(parse_input("  \n"), Input::Start);
		assert_eq!(parse_input("q"), Input::Quit);
		assert_eq!(parse_input(" quit "), Input::Quit);
	}

	#[tokio::test]
	async fn lines_are_forwarded_until_end_of_input() {
		let mut lines = read_lines(io::Cursor::new("\nq\n")).unwrap();
		assert_eq!(lines.recv().await.unwrap().unwrap(), "");
		assert_eq!(lines.recv().await.unwrap().unwrap(), "q");
		assert!(lines.recv().await.is_none());
	}
}
