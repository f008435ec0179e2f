//! Browser runtime for orderpull.
//!
//! Owns everything below the export workflow: finding and launching a
//! Chromium-family browser with remote debugging enabled, probing its
//! DevTools endpoint, and speaking CDP to it over a WebSocket.
//!
//! The entry point is [`Browser::launch`], which yields a [`Browser`] whose
//! [`Browser::new_page`] returns a [`Page`] for driving a single tab.

pub mod browser;
pub mod connection;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod finder;
pub mod page;
pub mod probe;
pub mod process;

pub use browser::{Browser, LaunchOptions};
pub use connection::Connection;
pub use error::{Result, RuntimeError};
pub use page::{Page, Point};
