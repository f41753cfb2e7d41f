//! CLI command implementations.
//!
//! - [`estimate`] - missing tiles and bytes for a region
//! - [`download`] - bulk prefetch of a region with progress
//! - [`config`] - configuration file management

pub mod common;
pub mod config;
pub mod download;
pub mod estimate;
