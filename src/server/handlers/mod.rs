//! HTTP request handlers for the web server.

mod download;
mod pages;
mod runs;
mod scrape;

pub use download::download_csv;
pub use pages::index;
pub use runs::{cancel_run, list_runs};
pub use scrape::start_scrape;
