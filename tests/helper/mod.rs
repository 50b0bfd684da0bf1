//! Shared test utilities

#![allow(dead_code)]

pub mod fetcher;
pub mod fixtures;

pub use fetcher::StaticFetcher;
pub use fixtures::{TestLayout, descriptor, zip_bytes};
