//! HTML pages.

use axum::response::Html;

use super::super::assets;

/// Scrape form.
pub async fn index() -> Html<&'static str> {
    Html(assets::INDEX_HTML)
}
