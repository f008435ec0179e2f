//! Browser executable discovery.

use std::path::{Path, PathBuf};

/// Environment variable that pins the browser executable.
pub const BROWSER_ENV: &str = "ORDERPULL_CHROME";

/// Resolves the browser to launch.
///
/// An explicit path wins, then [`BROWSER_ENV`], then well-known install
/// locations and `PATH` lookups for Chromium-family browsers.
pub fn find_browser_executable(explicit: Option<&Path>) -> Option<PathBuf> {
	if let Some(path) = explicit {
		return resolve_candidate(&path.to_string_lossy());
	}

	if let Ok(value) = std::env::var(BROWSER_ENV) {
		let value = value.trim();
		if !value.is_empty() {
			return resolve_candidate(value);
		}
	}

	browser_candidates().iter().find_map(|candidate| resolve_candidate(candidate))
}

fn resolve_candidate(candidate: &str) -> Option<PathBuf> {
	if candidate.starts_with('/') || candidate.contains('\\') || candidate.contains(':') {
		let path = PathBuf::from(candidate);
		path.exists().then_some(path)
	} else {
		which::which(candidate).ok()
	}
}

fn browser_candidates() -> Vec<String> {
	if cfg!(target_os = "macos") {
		[
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	} else if cfg!(target_os = "windows") {
		windows_browser_candidates()
	} else {
		[
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	}
}

fn windows_browser_candidates() -> Vec<String> {
	let mut roots = Vec::new();
	for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
		if let Ok(value) = std::env::var(key) {
			roots.push(PathBuf::from(value));
		}
	}
	if roots.is_empty() {
		roots.push(PathBuf::from(r"C:\Program Files"));
		roots.push(PathBuf::from(r"C:\Program Files (x86)"));
	}

	let suffixes: &[&[&str]] = &[
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Microsoft", "Edge", "Application", "msedge.exe"],
		&["Chromium", "Application", "chrome.exe"],
	];

	let mut candidates: Vec<String> = roots
		.iter()
		.flat_map(|root| {
			suffixes.iter().map(move |suffix| {
				let mut path = root.clone();
				path.extend(suffix.iter());
				path.to_string_lossy().to_string()
			})
		})
		.collect();

	candidates.extend(["chrome.exe", "msedge.exe", "chromium.exe"].map(str::to_string));
	candidates
}
