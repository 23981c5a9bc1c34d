//! Detecting when a click or history traversal has replaced the page.
//!
//! A navigation started from script or a click has no completion signal the
//! caller can await, and the outgoing document keeps answering queries
//! (`readyState` included) until its successor commits. Before acting, the
//! driver tags the current document with a fresh token; the navigation has
//! committed once the token is no longer readable. Tokens are never reused,
//! so a document restored from the back/forward cache still carrying an
//! older token counts as new.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::error::BrowserError;

/// Property set on `window` to identify the document an action started on.
pub const DOCUMENT_TOKEN: &str = "__parcelscrapeDocument";

/// Script tagging the current document with `token`.
pub fn mark_script(token: u64) -> String {
    format!("window.{DOCUMENT_TOKEN} = {token}")
}

/// Script evaluating to `true` while the tagged document is still current.
pub fn marked_script(token: u64) -> String {
    format!("window.{DOCUMENT_TOKEN} === {token}")
}

/// A tab whose current document can be tagged and checked.
#[async_trait]
pub trait DocumentMarker: Send {
    /// Tag the current document.
    async fn mark(&mut self, token: u64) -> Result<(), BrowserError>;

    /// `Some(true)` while the tagged document is current, `None` when the
    /// page cannot answer (typically mid-teardown).
    async fn is_marked(&mut self, token: u64) -> Option<bool>;
}

/// Poll until the document tagged with `token` is gone.
///
/// Returns `false` if it is still current after `timeout`.
pub async fn wait_for_replacement<M>(
    marker: &mut M,
    token: u64,
    timeout: Duration,
    poll_interval: Duration,
) -> bool
where
    M: DocumentMarker + ?Sized,
{
    let deadline = Instant::now() + timeout;
    loop {
        match marker.is_marked(token).await {
            Some(false) => return true,
            Some(true) => {}
            None => debug!("Document unreadable while waiting for navigation"),
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(poll_interval).await;
    }
}
