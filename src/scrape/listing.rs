//! Listing page parsing.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::models::Candidate;

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// Owner placeholder when the owner cell is missing.
pub const MISSING_OWNER: &str = "N/A";

/// Extract record candidates from a rendered listing page.
///
/// A row qualifies when it has at least four cells and its second cell
/// holds a link. Rows whose id is excluded, or whose link target carries a
/// scheme separator (external/absolute), are dropped. Output follows
/// document order; duplicates are kept.
pub fn parse_candidates(html: &str, excluded: &HashSet<String>) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let mut candidates = Vec::new();

    for row in document.select(&ROW) {
        let cells: Vec<ElementRef> = row.select(&CELL).collect();
        if cells.len() < 4 {
            continue;
        }

        let Some(link) = cells[1].select(&LINK).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let id = element_text(&link);
        if excluded.contains(&id) {
            debug!("Skipping excluded parcel {}", id);
            continue;
        }
        if href.contains(':') {
            debug!("Skipping external link {} -> {}", id, href);
            continue;
        }

        let owner = cells
            .get(3)
            .map(element_text)
            .unwrap_or_else(|| MISSING_OWNER.to_string());

        candidates.push(Candidate { id, owner });
    }

    info!("Detected {} parcel links with owners", candidates.len());
    candidates
}

/// Text of an element and its descendants, whitespace runs collapsed to one space.
pub(crate) fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
