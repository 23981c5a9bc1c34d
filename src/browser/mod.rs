//! Page renderer: the single owner of browser session state.
//!
//! Scraping logic talks to a [`PageDriver`]; [`ChromeSession`] drives a real
//! Chrome over CDP (chromiumoxide), and tests use a scripted in-memory site.

mod chrome;
mod config;
mod launcher;
pub mod navigation;
pub mod query;
#[cfg(test)]
pub(crate) mod testing;

pub use chrome::ChromeSession;
pub use config::BrowserEngineConfig;
pub use launcher::{ChromeLauncher, SessionLauncher};

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrowserError;

/// Control surface of one live browser tab.
///
/// Every method operates on the tab's current page. Implementations own
/// their session exclusively; nothing here is shared between runs.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to `url` and wait for the page to settle.
    async fn open(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Rendered markup of the current page.
    async fn current_html(&mut self) -> Result<String, BrowserError>;

    /// Click the first link whose text contains `text`, retrying until it
    /// is clickable or `timeout` elapses.
    ///
    /// Returns once the navigation the click starts has replaced the page.
    /// A click that navigates nowhere within `timeout` is a
    /// [`BrowserError::NavigationTimeout`], and the tab may still move later.
    async fn click_element_containing_text(
        &mut self,
        text: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    /// Whether an element with this id appears within `timeout`.
    ///
    /// A missing element is an expected outcome, so this never errors.
    async fn wait_for_element_by_id(&mut self, id: &str, timeout: Duration) -> bool;

    /// Go back one history entry, returning once the previous page has
    /// replaced the current one. Callers settle afterwards.
    async fn go_back(&mut self) -> Result<(), BrowserError>;

    /// Wait for rendering to finish, bounded by `ceiling`.
    async fn settle(&mut self, ceiling: Duration);

    /// Terminate the session. Safe to call more than once and after errors.
    async fn close(&mut self);
}

#[async_trait]
impl<D: PageDriver + ?Sized> PageDriver for Box<D> {
    async fn open(&mut self, url: &str) -> Result<(), BrowserError> {
        (**self).open(url).await
    }

    async fn current_html(&mut self) -> Result<String, BrowserError> {
        (**self).current_html().await
    }

    async fn click_element_containing_text(
        &mut self,
        text: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        (**self).click_element_containing_text(text, timeout).await
    }

    async fn wait_for_element_by_id(&mut self, id: &str, timeout: Duration) -> bool {
        (**self).wait_for_element_by_id(id, timeout).await
    }

    async fn go_back(&mut self) -> Result<(), BrowserError> {
        (**self).go_back().await
    }

    async fn settle(&mut self, ceiling: Duration) {
        (**self).settle(ceiling).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }
}
