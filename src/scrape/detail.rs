//! Detail page extraction.

use scraper::{Html, Selector};
use tracing::debug;

use super::listing::element_text;
use crate::browser::query::id_selector;
use crate::config::PageIdentifiers;
use crate::error::ScrapeError;
use crate::models::Detail;

/// Address placeholder when the location element is missing.
pub const MISSING_ADDRESS: &str = "N/A";

/// Read the address and total floor area from a rendered detail page.
///
/// Missing fields degrade to defaults: the address becomes `"N/A"` and a
/// floor whose text is absent or not purely numeric counts as 0. Only a
/// document that cannot be read at all is an error.
pub fn extract_detail(html: &str, ids: &PageIdentifiers) -> Result<Detail, ScrapeError> {
    if html.trim().is_empty() {
        return Err(ScrapeError::MalformedDetailPage(
            "renderer returned an empty document".to_string(),
        ));
    }

    let document = Html::parse_document(html);
    let text_of = |id: &str| -> Result<Option<String>, ScrapeError> {
        let selector = Selector::parse(&id_selector(id))
            .map_err(|e| ScrapeError::MalformedDetailPage(format!("bad id {id:?}: {e}")))?;
        Ok(document.select(&selector).next().map(|el| element_text(&el)))
    };

    let address = text_of(&ids.location_id)?.unwrap_or_else(|| MISSING_ADDRESS.to_string());
    let first = text_of(&ids.first_floor_id)?.map_or(0, |t| parse_area(&t));
    let second = text_of(&ids.second_floor_id)?.map_or(0, |t| parse_area(&t));
    let total_area = first.saturating_add(second);

    debug!(
        "Scraped {}: first floor {}, second floor {}, total {}",
        address, first, second, total_area
    );

    Ok(Detail {
        address,
        total_area,
    })
}

/// Parse purely numeric text as an area; anything else counts as 0.
fn parse_area(text: &str) -> u64 {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }
    text.parse().unwrap_or(0)
}
