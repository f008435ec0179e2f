//! Export trigger on the orders listing.

use tracing::debug;

use crate::error::{FetchError, Result};
use crate::session::BrowserSession;
use crate::settings::Settings;
use crate::status::StatusSender;

pub const SCROLL_INTO_VIEW: &str = "arguments[0].scrollIntoView({block: 'center'});";
pub const FORCE_CLICK: &str = "arguments[0].click();";

/// Opens the listing and activates its export control.
///
/// Every failure is reported as [`FetchError::ExportTrigger`] around its cause.
pub async fn trigger_export(session: &mut dyn BrowserSession, settings: &Settings, status: &StatusSender) -> Result<()> {
	activate(session, settings, status).await.map_err(|e| match e {
		FetchError::ExportTrigger(_) => e,
		other => FetchError::ExportTrigger(Box::new(other)),
	})
}

async fn activate(session: &mut dyn BrowserSession, settings: &Settings, status: &StatusSender) -> Result<()> {
	let timeouts = &settings.timeouts;

	status.progress("Opening orders...");
	session.open(&settings.orders_url).await?;

	status.progress("Clicking export...");
	session.find_element(&settings.locators.listing_ready()?, timeouts.element_wait()).await?;
	tokio::time::sleep(timeouts.listing_settle()).await;

	let icon = session.find_element(&settings.locators.export_icon()?, timeouts.element_wait()).await?;
	debug!(target = "orderpull", locator = %icon.locator, "export control located");

	session.execute_script(SCROLL_INTO_VIEW, &[&icon]).await?;
	tokio::time::sleep(timeouts.scroll_settle()).await;
	session.execute_script(FORCE_CLICK, &[&icon]).await?;
	Ok(())
}
