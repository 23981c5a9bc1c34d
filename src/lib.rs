//! Parcel scraper: drives a browser through a county parcel listing,
//! drills into each parcel's detail page, and exports what it finds.
//!
//! Runs are started with [`scrape::start`] and observed through the
//! [`scrape::ProgressStream`] they return.

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod scrape;
pub mod server;
