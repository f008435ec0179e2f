//! Element locators with ordered fallbacks.
//!
//! Portal markup drifts between deployments, so a [`Locator`] holds one or
//! more CSS selectors tried in order; the first that matches wins.

use std::fmt;

/// One logical element query made of ordered CSS alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
	alternatives: Vec<String>,
}

impl Locator {
	pub fn css(selector: impl Into<String>) -> Self {
		Self {
			alternatives: vec![selector.into()],
		}
	}

	/// Builds a locator from ordered alternatives; `None` when the list is empty.
	pub fn any<I, S>(alternatives: I) -> Option<Self>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let alternatives: Vec<String> = alternatives
			.into_iter()
			.map(Into::into)
			.filter(|s: &String| !s.trim().is_empty())
			.collect();
		(!alternatives.is_empty()).then_some(Self { alternatives })
	}

	/// Adds a fallback tried after the existing alternatives.
	pub fn or(mut self, selector: impl Into<String>) -> Self {
		self.alternatives.push(selector.into());
		self
	}

	pub fn alternatives(&self) -> &[String] {
		&self.alternatives
	}
}

impl fmt::Display for Locator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.alternatives.join(" | "))
	}
}
