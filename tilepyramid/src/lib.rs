//! TilePyramid - tiled multi-resolution spatial data cache and retrieval
//! scheduler.
//!
//! A [`level::LevelSet`] describes a pyramid of tile levels over a region of
//! the globe. Tiles needed for a view are requested each cycle through a
//! [`retrieval::TileRequester`], which prioritises them in an
//! [`executor::RequestQueue`] and hands them to a bounded
//! [`executor::TaskScheduler`]. Fetched tiles land in a disk
//! [`cache::FileStore`] and a [`cache::TileMemoryCache`]. Repeated failures
//! are suppressed by [`absence::AbsenceTracker`]s, and the
//! [`network::NetworkMonitor`] keeps the system quiet while offline.
//! [`bulk`] estimates and downloads whole regions ahead of time.

pub mod absence;
pub mod app;
pub mod bulk;
pub mod cache;
pub mod config;
pub mod executor;
pub mod geo;
pub mod level;
pub mod logging;
pub mod network;
pub mod retrieval;
pub mod spatial;
