//! Two-level drill-down from the listing into a record's detail view.
//!
//! The first click on a record id lands on an intermediate page that
//! re-exposes a link with the same id; the second reaches the detail view.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::browser::PageDriver;
use crate::error::BrowserError;

/// Number of link activations between the listing and a detail page.
pub const DRILL_DOWN_LEVELS: usize = 2;

/// Waits used during one drill-down.
#[derive(Debug, Clone)]
pub struct DrillDownPlan {
    pub click_timeout: Duration,
    pub marker_timeout: Duration,
    pub marker_id: String,
}

/// A drill-down that reached a valid detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrillDown {
    pub levels_entered: usize,
}

/// Why a drill-down stopped short.
#[derive(Debug, Error)]
pub enum DrillDownFailure {
    #[error("link for {id} not clickable after {levels_entered} level(s): {source}")]
    NotInteractable {
        id: String,
        levels_entered: usize,
        #[source]
        source: BrowserError,
    },

    #[error("anomalous page for {id}: marker '{marker}' not found")]
    MarkerMissing {
        id: String,
        marker: String,
        levels_entered: usize,
    },
}

impl DrillDownFailure {
    /// How many navigation levels were entered before failing.
    pub fn levels_entered(&self) -> usize {
        match self {
            DrillDownFailure::NotInteractable { levels_entered, .. }
            | DrillDownFailure::MarkerMissing { levels_entered, .. } => *levels_entered,
        }
    }

    /// Whether the browser is known to be exactly `levels_entered` deep.
    ///
    /// A click whose navigation never committed may still land later.
    pub fn depth_is_known(&self) -> bool {
        !matches!(
            self,
            DrillDownFailure::NotInteractable {
                source: BrowserError::NavigationTimeout { .. },
                ..
            }
        )
    }
}

/// Click through to the detail page for `id` and confirm its marker.
///
/// Never panics or propagates driver errors: every failure comes back as a
/// [`DrillDownFailure`] that says how deep the browser got, so the caller
/// can back out exactly that far.
pub async fn drill_down<D>(
    driver: &mut D,
    id: &str,
    plan: &DrillDownPlan,
) -> Result<DrillDown, DrillDownFailure>
where
    D: PageDriver + ?Sized,
{
    for level in 0..DRILL_DOWN_LEVELS {
        debug!("Clicking link for {} (level {})", id, level + 1);
        if let Err(source) = driver
            .click_element_containing_text(id, plan.click_timeout)
            .await
        {
            warn!("Error navigating to parcel {}: {}", id, source);
            return Err(DrillDownFailure::NotInteractable {
                id: id.to_string(),
                levels_entered: level,
                source,
            });
        }
    }

    if !driver
        .wait_for_element_by_id(&plan.marker_id, plan.marker_timeout)
        .await
    {
        warn!("Anomalous page detected for parcel: {}", id);
        return Err(DrillDownFailure::MarkerMissing {
            id: id.to_string(),
            marker: plan.marker_id.clone(),
            levels_entered: DRILL_DOWN_LEVELS,
        });
    }

    info!("Detail page reached for parcel: {}", id);
    Ok(DrillDown {
        levels_entered: DRILL_DOWN_LEVELS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{FakeBrowser, FakePage};

    fn plan() -> DrillDownPlan {
        DrillDownPlan {
            click_timeout: Duration::from_millis(10),
            marker_timeout: Duration::from_millis(10),
            marker_id: "lblLocation".to_string(),
        }
    }

    async fn at_listing(browser: FakeBrowser) -> FakeBrowser {
        let mut browser = browser;
        browser.open("listing").await.unwrap();
        browser
    }

    #[tokio::test]
    async fn reaches_detail_page_in_two_clicks() {
        let mut browser = at_listing(
            FakeBrowser::new()
                .page("listing", FakePage::new("").link("01-001", "mid"))
                .page("mid", FakePage::new("").link("01-001", "detail"))
                .page("detail", FakePage::new("").with_id("lblLocation")),
        )
        .await;

        let result = drill_down(&mut browser, "01-001", &plan()).await.unwrap();
        assert_eq!(result.levels_entered, 2);
        assert_eq!(browser.current_url(), Some("detail"));
    }

    #[tokio::test]
    async fn missing_first_link_enters_nothing() {
        let mut browser =
            at_listing(FakeBrowser::new().page("listing", FakePage::new(""))).await;

        let err = drill_down(&mut browser, "01-001", &plan()).await.unwrap_err();
        assert!(matches!(err, DrillDownFailure::NotInteractable { .. }));
        assert_eq!(err.levels_entered(), 0);
    }

    #[tokio::test]
    async fn missing_nested_link_enters_one_level() {
        let mut browser = at_listing(
            FakeBrowser::new()
                .page("listing", FakePage::new("").link("01-001", "mid"))
                .page("mid", FakePage::new("")),
        )
        .await;

        let err = drill_down(&mut browser, "01-001", &plan()).await.unwrap_err();
        assert_eq!(err.levels_entered(), 1);
        assert_eq!(browser.current_url(), Some("mid"));
    }

    #[tokio::test]
    async fn missing_marker_enters_both_levels() {
        let mut browser = at_listing(
            FakeBrowser::new()
                .page("listing", FakePage::new("").link("01-001", "mid"))
                .page("mid", FakePage::new("").link("01-001", "odd"))
                .page("odd", FakePage::new("<p>Parcel retired</p>")),
        )
        .await;

        let err = drill_down(&mut browser, "01-001", &plan()).await.unwrap_err();
        assert!(matches!(err, DrillDownFailure::MarkerMissing { .. }));
        assert_eq!(err.levels_entered(), 2);
    }

    #[tokio::test]
    async fn counts_a_level_only_once_its_page_commits() {
        let mut browser = at_listing(
            FakeBrowser::new()
                .page("listing", FakePage::new("").link("01-001", "mid"))
                .page("mid", FakePage::new("").link("01-001", "detail"))
                .page("detail", FakePage::new("").with_id("lblLocation"))
                .commit_after(3),
        )
        .await;

        let plan = DrillDownPlan {
            click_timeout: Duration::from_secs(1),
            ..plan()
        };

        let result = drill_down(&mut browser, "01-001", &plan).await.unwrap();
        assert_eq!(result.levels_entered, 2);
        assert_eq!(browser.current_url(), Some("detail"));
        let journal = browser.journal();
        assert_eq!(journal.visited(), vec!["listing", "mid", "detail"]);
    }

    #[tokio::test]
    async fn uncommitted_click_leaves_depth_unknown() {
        let mut browser = at_listing(
            FakeBrowser::new()
                .page("listing", FakePage::new("").link("01-001", "mid"))
                .page("mid", FakePage::new("").link("01-001", "detail"))
                .stall("mid"),
        )
        .await;

        let err = drill_down(&mut browser, "01-001", &plan()).await.unwrap_err();
        assert_eq!(err.levels_entered(), 0);
        assert!(!err.depth_is_known());
        assert_eq!(browser.current_url(), Some("listing"));
    }

    #[tokio::test]
    async fn missing_link_leaves_depth_known() {
        let mut browser =
            at_listing(FakeBrowser::new().page("listing", FakePage::new(""))).await;

        let err = drill_down(&mut browser, "01-001", &plan()).await.unwrap_err();
        assert!(err.depth_is_known());
    }

    #[tokio::test]
    async fn matches_link_text_by_containment() {
        let mut browser = at_listing(
            FakeBrowser::new()
                .page("listing", FakePage::new("").link("Parcel 01-001 (R)", "mid"))
                .page("mid", FakePage::new("").link("01-001", "detail"))
                .page("detail", FakePage::new("").with_id("lblLocation")),
        )
        .await;

        assert!(drill_down(&mut browser, "01-001", &plan()).await.is_ok());
    }
}
