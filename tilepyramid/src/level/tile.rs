//! Tile addressing types.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::geo::Sector;

/// Address of a tile within a level set.
///
/// Keys compare by level, row, column and cache name, so keys from different
/// datasets never collide in shared maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    level: u32,
    row: i32,
    col: i32,
    cache_name: Arc<str>,
}

impl TileKey {
    pub fn new(level: u32, row: i32, col: i32, cache_name: impl Into<Arc<str>>) -> Self {
        Self {
            level,
            row,
            col,
            cache_name: cache_name.into(),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn row(&self) -> i32 {
        self.row
    }

    pub fn col(&self) -> i32 {
        self.col
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@L{}[{},{}]",
            self.cache_name, self.level, self.row, self.col
        )
    }
}

/// A resolved tile: its key plus derived geometry and cache location.
///
/// Two tiles are the same tile iff their cache paths are equal.
#[derive(Debug, Clone)]
pub struct Tile {
    key: TileKey,
    sector: Sector,
    cache_path: String,
    width: u32,
    height: u32,
}

impl Tile {
    pub(crate) fn new(key: TileKey, sector: Sector, cache_path: String, width: u32, height: u32) -> Self {
        Self {
            key,
            sector,
            cache_path,
            width,
            height,
        }
    }

    pub fn key(&self) -> &TileKey {
        &self.key
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    /// Path relative to the cache root.
    pub fn cache_path(&self) -> &str {
        &self.cache_path
    }

    pub fn level(&self) -> u32 {
        self.key.level
    }

    pub fn row(&self) -> i32 {
        self.key.row
    }

    pub fn col(&self) -> i32 {
        self.key.col
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.cache_path == other.cache_path
    }
}

impl Eq for Tile {}

impl Hash for Tile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cache_path.hash(state);
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_accessors() {
        let key = TileKey::new(3, 10, -4, "Earth/BMNG/3");
        assert_eq!(key.level(), 3);
        assert_eq!(key.row(), 10);
        assert_eq!(key.col(), -4);
        assert_eq!(key.cache_name(), "Earth/BMNG/3");
        assert_eq!(key.to_string(), "Earth/BMNG/3@L3[10,-4]");
    }

    #[test]
    fn test_keys_from_different_datasets_differ() {
        let a = TileKey::new(0, 1, 1, "a/0");
        let b = TileKey::new(0, 1, 1, "b/0");
        assert_ne!(a, b);
    }

    #[test]
    fn test_tile_identity_is_cache_path() {
        let sector = Sector::full_sphere();
        let a = Tile::new(TileKey::new(0, 0, 0, "x/0"), sector, "x/0/0/0_0.jpg".into(), 512, 512);
        let b = Tile::new(TileKey::new(0, 0, 0, "x/0"), sector, "x/0/0/0_0.jpg".into(), 256, 256);
        let c = Tile::new(TileKey::new(0, 0, 1, "x/0"), sector, "x/0/0/0_1.jpg".into(), 512, 512);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Tile> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
