//! Static page served at the root.

/// Scrape form plus the script that follows the progress stream.
pub const INDEX_HTML: &str = include_str!("index.html");
