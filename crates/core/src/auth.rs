//! Login state machine.

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::credentials::Credentials;
use crate::error::{FetchError, Result};
use crate::locator::Locator;
use crate::session::BrowserSession;
use crate::settings::Settings;
use crate::status::StatusSender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
	NotStarted,
	LoginPageLoaded,
	CredentialsEntered,
	SubmissionSent,
	Authenticated,
	Failed(String),
}

impl fmt::Display for AuthState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AuthState::NotStarted => f.write_str("not started"),
			AuthState::LoginPageLoaded => f.write_str("login page loaded"),
			AuthState::CredentialsEntered => f.write_str("credentials entered"),
			AuthState::SubmissionSent => f.write_str("submission sent"),
			AuthState::Authenticated => f.write_str("authenticated"),
			AuthState::Failed(reason) => write!(f, "failed: {reason}"),
		}
	}
}

/// Drives one login attempt. There are no retries: any failed step is final.
pub struct AuthSequencer<'a> {
	settings: &'a Settings,
	credentials: &'a Credentials,
	state: AuthState,
}

impl<'a> AuthSequencer<'a> {
	pub fn new(settings: &'a Settings, credentials: &'a Credentials) -> Self {
		Self {
			settings,
			credentials,
			state: AuthState::NotStarted,
		}
	}

	pub fn state(&self) -> &AuthState {
		&self.state
	}

	pub async fn run(&mut self, session: &mut dyn BrowserSession, status: &StatusSender) -> Result<()> {
		match self.drive(session, status).await {
			Ok(()) => Ok(()),
			Err(e) => {
				self.advance(AuthState::Failed(e.to_string()));
				Err(e)
			}
		}
	}

	async fn drive(&mut self, session: &mut dyn BrowserSession, status: &StatusSender) -> Result<()> {
		let settings = self.settings;
		let locators = &settings.locators;
		let timeouts = &settings.timeouts;
		let identifier = locators.identifier()?;

		status.progress("Opening login page...");
		session.open(&settings.login_url).await?;
		self.advance(AuthState::LoginPageLoaded);

		status.progress("Logging in...");
		let field = session.find_element(&identifier, timeouts.element_wait()).await?;
		session.type_into(&field, self.credentials.identifier()).await?;
		session.send_text(&locators.secret()?, self.credentials.secret()).await?;
		self.advance(AuthState::CredentialsEntered);

		session.click(&locators.submit()?).await?;
		self.advance(AuthState::SubmissionSent);

		wait_for_login_form_to_close(session, &identifier, timeouts.login_dismiss()).await?;
		tokio::time::sleep(timeouts.login_settle()).await;
		self.advance(AuthState::Authenticated);
		Ok(())
	}

	fn advance(&mut self, next: AuthState) {
		debug!(target = "orderpull", from = %self.state, to = %next, "login state");
		self.state = next;
	}
}

async fn wait_for_login_form_to_close(session: &mut dyn BrowserSession, identifier: &Locator, timeout: Duration) -> Result<()> {
	session
		.wait_for_disappearance(identifier, timeout)
		.await
		.map_err(|e| match e {
			FetchError::Timeout { ms, .. } => FetchError::Timeout {
				condition: "login form to close (credentials rejected?)".into(),
				ms,
			},
			other => other,
		})
}
