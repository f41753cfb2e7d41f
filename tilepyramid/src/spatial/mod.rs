//! Spatial indexing of arbitrary point and region items.
//!
//! [`BitQuadTree`] subdivides a domain sector into a fixed-depth quadtree and
//! records occupancy in a single flat bit vector. Inserts and queries walk
//! the same descent; only populated branches are visited on query.

mod bit_index;

pub use bit_index::{BitQuadTree, ItemBounds, MAX_INDEX_LEVELS};
