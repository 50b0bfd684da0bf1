//! Version-aware synchronization of locally installed toolchain libraries
//!
//! A [`updater::Synchronizer`] compares the installed version record with the one
//! published online, and when they differ (or libraries are missing) downloads the
//! published artifact and merges it into the libraries directory.

pub mod archive;
pub mod config;
pub mod fetch;
pub mod logging;
pub mod updater;
pub mod version;
