//! Scripted in-memory site for exercising navigation without Chrome.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::navigation::{wait_for_replacement, DocumentMarker};
use super::PageDriver;
use crate::error::BrowserError;

/// One page of the fake site.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub html: String,
    /// (link text, target page url)
    pub links: Vec<(String, String)>,
    pub element_ids: Vec<String>,
}

impl FakePage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn link(mut self, text: &str, target: &str) -> Self {
        self.links.push((text.to_string(), target.to_string()));
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.element_ids.push(id.to_string());
        self
    }
}

/// Observations a test can make after the driver moved into a run.
#[derive(Debug, Default)]
pub struct FakeJournal {
    pub closed: AtomicUsize,
    pub backs: AtomicUsize,
    pub visited: Mutex<Vec<String>>,
    /// Committed page, kept after the driver moves into a run.
    pub location: Mutex<Option<String>>,
    pub panic_on_html: AtomicBool,
}

impl FakeJournal {
    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn back_count(&self) -> usize {
        self.backs.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn location(&self) -> Option<String> {
        self.location.lock().ok().and_then(|l| l.clone())
    }
}

/// Listing table with one row per id; the owner is `Owner {id}`.
pub fn listing_html(ids: &[&str]) -> String {
    let rows: String = ids
        .iter()
        .map(|id| {
            format!(
                "<tr><td>1</td><td><a href=\"Parcel.aspx?p={id}\">{id}</a></td><td>x</td><td>Owner {id}</td></tr>"
            )
        })
        .collect();
    format!("<html><body><table>{rows}</table></body></html>")
}

pub fn detail_html(address: &str, first: &str, second: &str) -> String {
    format!(
        r#"<html><body><span id="lblLocation">{address}</span><span id="lblFirstFloor">{first}</span><span id="lblSecondFloor">{second}</span></body></html>"#
    )
}

/// Listing at `listing_url` whose parcels all drill down successfully.
///
/// Each detail page reads `{id} Main St` with 1000 + 250 square feet.
pub fn parcel_site(listing_url: &str, ids: &[&str]) -> FakeBrowser {
    let mut listing = FakePage::new(listing_html(ids));
    let mut browser = FakeBrowser::new();
    for id in ids {
        listing = listing.link(id, &format!("mid-{id}"));
        browser = browser
            .page(
                &format!("mid-{id}"),
                FakePage::new("").link(id, &format!("detail-{id}")),
            )
            .page(
                &format!("detail-{id}"),
                FakePage::new(detail_html(&format!("{id} Main St"), "1000", "250"))
                    .with_id("lblLocation"),
            );
    }
    browser.page(listing_url, listing)
}

/// A navigation started but not yet committed.
#[derive(Debug, Clone)]
enum Pending {
    Visit(String),
    Back,
}

/// Poll interval the fake uses while waiting for a navigation to commit.
const COMMIT_POLL: Duration = Duration::from_millis(1);

/// In-memory [`PageDriver`] with a history stack.
///
/// Clicks and back traversals start a navigation that commits only when the
/// driver checks for it, after `commit_after` checks have seen the old page.
/// The driver waits through [`wait_for_replacement`], as the Chrome session does.
pub struct FakeBrowser {
    pages: HashMap<String, FakePage>,
    history: Vec<String>,
    journal: Arc<FakeJournal>,
    /// Delay applied to every click, to let tests cancel mid-run.
    click_delay: Duration,
    commit_after: usize,
    /// Pages whose navigations never commit.
    stalled: HashSet<String>,
    back_timeout: Duration,
    pending: Option<Pending>,
    checks_left: usize,
    /// Token tagging the current document, cleared on every commit.
    mark: Option<u64>,
    next_token: u64,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            history: Vec::new(),
            journal: Arc::new(FakeJournal::default()),
            click_delay: Duration::ZERO,
            commit_after: 0,
            stalled: HashSet::new(),
            back_timeout: Duration::from_secs(1),
            pending: None,
            checks_left: 0,
            mark: None,
            next_token: 0,
        }
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn click_delay(mut self, delay: Duration) -> Self {
        self.click_delay = delay;
        self
    }

    /// Keep the old page current for `checks` navigation checks.
    pub fn commit_after(mut self, checks: usize) -> Self {
        self.commit_after = checks;
        self
    }

    /// Navigations to `url` start but never commit.
    pub fn stall(mut self, url: &str) -> Self {
        self.stalled.insert(url.to_string());
        self
    }

    pub fn journal(&self) -> Arc<FakeJournal> {
        self.journal.clone()
    }

    pub fn current_url(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    fn current(&self) -> Option<&FakePage> {
        self.current_url().and_then(|url| self.pages.get(url))
    }

    fn navigate(&mut self, url: &str) {
        if let Ok(mut visited) = self.journal.visited.lock() {
            visited.push(url.to_string());
        }
        self.history.push(url.to_string());
        self.record_location();
    }

    fn record_location(&self) {
        if let Ok(mut location) = self.journal.location.lock() {
            *location = self.current_url().map(str::to_string);
        }
    }

    fn begin(&mut self, pending: Pending) {
        self.pending = Some(pending);
        self.checks_left = self.commit_after;
    }

    fn destination(&self, pending: &Pending) -> Option<String> {
        match pending {
            Pending::Visit(url) => Some(url.clone()),
            Pending::Back => self.history.iter().rev().nth(1).cloned(),
        }
    }

    fn commit(&mut self) {
        match self.pending.take() {
            Some(Pending::Visit(url)) => self.navigate(&url),
            Some(Pending::Back) => {
                self.history.pop();
                self.record_location();
            }
            None => return,
        }
        self.mark = None;
    }

    /// Advance a pending navigation by one check.
    fn check_pending(&mut self) {
        let Some(pending) = self.pending.clone() else {
            return;
        };
        match self.destination(&pending) {
            Some(url) if !self.stalled.contains(&url) => {}
            _ => return,
        }
        if self.checks_left == 0 {
            self.commit();
        } else {
            self.checks_left -= 1;
        }
    }

    async fn navigate_and_wait(
        &mut self,
        pending: Pending,
        action: String,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        self.next_token += 1;
        let token = self.next_token;
        self.mark(token).await?;
        self.begin(pending);

        if wait_for_replacement(self, token, timeout, COMMIT_POLL).await {
            Ok(())
        } else {
            Err(BrowserError::NavigationTimeout { action, timeout })
        }
    }
}

#[async_trait]
impl DocumentMarker for FakeBrowser {
    async fn mark(&mut self, token: u64) -> Result<(), BrowserError> {
        self.mark = Some(token);
        Ok(())
    }

    async fn is_marked(&mut self, token: u64) -> Option<bool> {
        self.check_pending();
        Some(self.mark == Some(token))
    }
}

#[async_trait]
impl PageDriver for FakeBrowser {
    async fn open(&mut self, url: &str) -> Result<(), BrowserError> {
        if !self.pages.contains_key(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "404".to_string(),
            });
        }
        self.pending = None;
        self.mark = None;
        self.navigate(url);
        Ok(())
    }

    async fn current_html(&mut self) -> Result<String, BrowserError> {
        if self.journal.panic_on_html.load(Ordering::SeqCst) && self.history.len() > 1 {
            panic!("renderer crashed");
        }
        self.current()
            .map(|p| p.html.clone())
            .ok_or(BrowserError::Closed)
    }

    async fn click_element_containing_text(
        &mut self,
        text: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        if !self.click_delay.is_zero() {
            tokio::time::sleep(self.click_delay).await;
        }
        let target = self.current().and_then(|page| {
            page.links
                .iter()
                .find(|(link_text, _)| link_text.contains(text))
                .map(|(_, target)| target.clone())
        });
        match target {
            Some(target) => {
                self.navigate_and_wait(Pending::Visit(target), format!("clicking '{text}'"), timeout)
                    .await
            }
            None => Err(BrowserError::ElementNotInteractable {
                text: text.to_string(),
                timeout,
            }),
        }
    }

    async fn wait_for_element_by_id(&mut self, id: &str, _timeout: Duration) -> bool {
        self.current()
            .map(|p| p.element_ids.iter().any(|e| e == id))
            .unwrap_or(false)
    }

    async fn go_back(&mut self) -> Result<(), BrowserError> {
        self.journal.backs.fetch_add(1, Ordering::SeqCst);
        if self.history.len() < 2 {
            // Nothing to go back to: the page never changes.
            return Err(BrowserError::NavigationTimeout {
                action: "going back".to_string(),
                timeout: self.back_timeout,
            });
        }
        let timeout = self.back_timeout;
        self.navigate_and_wait(Pending::Back, "going back".to_string(), timeout)
            .await
    }

    async fn settle(&mut self, _ceiling: Duration) {}

    async fn close(&mut self) {
        self.journal.closed.fetch_add(1, Ordering::SeqCst);
        self.pending = None;
        self.history.clear();
    }
}
