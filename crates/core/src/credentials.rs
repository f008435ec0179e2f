//! Login credentials and where they come from.

use std::fmt;

use crate::error::{FetchError, Result};

pub const USERNAME_ENV: &str = "ORDERPULL_USERNAME";
pub const PASSWORD_ENV: &str = "ORDERPULL_PASSWORD";

/// Portal login pair. Immutable once built; `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
	identifier: String,
	secret: String,
}

impl Credentials {
	pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
		Self {
			identifier: identifier.into(),
			secret: secret.into(),
		}
	}

	pub fn identifier(&self) -> &str {
		&self.identifier
	}

	pub fn secret(&self) -> &str {
		&self.secret
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("identifier", &self.identifier)
			.field("secret", &"<redacted>")
			.finish()
	}
}

/// Source of credentials, resolved once before a controller is built.
pub trait CredentialProvider {
	fn credentials(&self) -> Result<Credentials>;
}

/// Reads credentials from environment variables.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
	pub username_var: String,
	pub password_var: String,
}

impl Default for EnvCredentials {
	fn default() -> Self {
		Self {
			username_var: USERNAME_ENV.to_string(),
			password_var: PASSWORD_ENV.to_string(),
		}
	}
}

impl EnvCredentials {
	fn read(&self, var: &str) -> Result<String> {
		match std::env::var(var) {
			Ok(value) if !value.trim().is_empty() => Ok(value),
			Ok(_) => Err(FetchError::Credentials(format!("{var} is empty"))),
			Err(_) => Err(FetchError::Credentials(format!("{var} is not set"))),
		}
	}
}

impl CredentialProvider for EnvCredentials {
	fn credentials(&self) -> Result<Credentials> {
		Ok(Credentials::new(self.read(&self.username_var)?, self.read(&self.password_var)?))
	}
}

/// Fixed credentials, for embedding and tests.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl CredentialProvider for StaticCredentials {
	fn credentials(&self) -> Result<Credentials> {
		Ok(self.0.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn debug_redacts_secret() {
		let creds = Credentials::new("buyer@example.test", "hunter2");
		let rendered = format!("{creds:?}");
		assert!(rendered.contains("buyer@example.test"));
		assert!(!rendered.contains("hunter2"));
	}

	#[test]
	fn env_provider_reports_missing_variable() {
		let provider = EnvCredentials {
			username_var: "ORDERPULL_TEST_MISSING_USER_7F3A".into(),
			password_var: "ORDERPULL_TEST_MISSING_PASS_7F3A".into(),
		};
		let err = provider.credentials().unwrap_err();
		assert!(matches!(err, FetchError::Credentials(ref msg) if msg.contains("ORDERPULL_TEST_MISSING_USER_7F3A is not set")));
	}

	#[test]
	fn static_provider_returns_its_pair() {
		let provider = StaticCredentials(Credentials::new("a", "b"));
		let creds = provider.credentials().unwrap();
		assert_eq!(creds.identifier(), "a");
		assert_eq!(creds.secret(), "b");
	}
}
