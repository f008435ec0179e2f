//! Automated purchase-order export download.
//!
//! Drives a browser through the supplier portal's login form, triggers the
//! orders export and waits for the exported file to land in a download
//! directory. Progress is reported over a FIFO status channel so a
//! presentation layer on another thread never blocks on the workflow.
//!
//! ```no_run
//! use orderpull::{DownloadController, Orchestrator, Settings, StatusUpdate};
//! use orderpull::credentials::{CredentialProvider, EnvCredentials};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load(None)?;
//! let credentials = EnvCredentials::default().credentials()?;
//! let (controller, mut updates) = DownloadController::new(Orchestrator::with_cdp(settings, credentials));
//!
//! controller.start();
//! while let Some(update) = updates.recv().await {
//!     if let StatusUpdate::Finished(outcome) = update {
//!         println!("{outcome}");
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod export;
pub mod locator;
pub mod orchestrator;
pub mod session;
pub mod settings;
pub mod status;
pub mod watcher;

pub use controller::DownloadController;
pub use credentials::Credentials;
pub use error::{FetchError, Result, Stage};
pub use locator::Locator;
pub use orchestrator::{Orchestrator, RunFailure, RunOutcome};
pub use session::{BrowserSession, ElementHandle, SessionLauncher};
pub use settings::Settings;
pub use status::{Severity, StatusEvent, StatusReceiver, StatusSender, StatusUpdate, status_channel};
pub use watcher::{CompletionCheck, DownloadWatcher, FileSnapshot};
