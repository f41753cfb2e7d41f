//! Quadtree over a flat bitset.
//!
//! The tree is never materialised as nodes. Each cell is identified by a bit
//! position derived from its depth and its path from the root:
//!
//! ```text
//! depth 0:  bits 0..4                    (the four level-zero quadrants)
//! depth 1:  bits 4..20                   (16 cells)
//! depth d:  bits offset(d)..offset(d) + 4^(d+1)
//!
//! offset(d)      = Σ_{k<d} 4^(k+1)
//! child position = parent position * 4 + quadrant   (quadrant: SW, SE, NW, NE)
//! ```
//!
//! A set bit means "something was inserted below this cell". Items are only
//! stored at the deepest level, in a sparse map keyed by bit position.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::geo::{LatLon, Sector};

/// Bounds of an indexed item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemBounds {
    Point(LatLon),
    Region(Sector),
}

impl ItemBounds {
    fn intersects(&self, cell: &Sector) -> bool {
        match self {
            ItemBounds::Point(p) => cell.contains(p.lat, p.lon),
            ItemBounds::Region(s) => cell.intersects(s),
        }
    }
}

impl From<LatLon> for ItemBounds {
    fn from(point: LatLon) -> Self {
        ItemBounds::Point(point)
    }
}

impl From<Sector> for ItemBounds {
    fn from(sector: Sector) -> Self {
        ItemBounds::Region(sector)
    }
}

/// Deepest supported subdivision: 4^12 leaves, about 2.8 MB of bits.
pub const MAX_INDEX_LEVELS: usize = 12;

/// Region/point index backed by a bit vector and per-leaf item lists.
///
/// # Example
///
/// ```
/// use tilepyramid::geo::{LatLon, Sector};
/// use tilepyramid::spatial::BitQuadTree;
///
/// let mut index = BitQuadTree::new(Sector::full_sphere(), 4, true);
/// index.add("paris", LatLon::new(48.85, 2.35));
/// index.add("alps", Sector::new(44.0, 48.0, 5.0, 16.0).unwrap());
///
/// let europe = Sector::new(35.0, 60.0, -10.0, 30.0).unwrap();
/// let found = index.items_in_region(&europe);
/// assert!(found.contains("paris"));
/// assert!(found.contains("alps"));
/// ```
#[derive(Debug, Clone)]
pub struct BitQuadTree<T> {
    sector: Sector,
    num_levels: usize,
    allow_duplicates: bool,
    level_offsets: Vec<usize>,
    bits: Vec<u64>,
    items: HashMap<usize, Vec<T>>,
}

impl<T> BitQuadTree<T>
where
    T: Clone + Eq + Hash,
{
    /// Creates an index over `sector` with `num_levels` of subdivision.
    ///
    /// `num_levels` is clamped to `1..=MAX_INDEX_LEVELS`.
    pub fn new(sector: Sector, num_levels: usize, allow_duplicates: bool) -> Self {
        let num_levels = num_levels.clamp(1, MAX_INDEX_LEVELS);
        let mut level_offsets = Vec::with_capacity(num_levels);
        let mut offset = 0usize;
        for depth in 0..num_levels {
            level_offsets.push(offset);
            offset += cells_at_depth(depth);
        }
        let words = offset.div_ceil(64);

        Self {
            sector,
            num_levels,
            allow_duplicates,
            level_offsets,
            bits: vec![0; words],
            items: HashMap::new(),
        }
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    pub fn allows_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    /// Total number of addressable cells across all depths.
    pub fn bit_count(&self) -> usize {
        self.level_offsets[self.num_levels - 1] + cells_at_depth(self.num_levels - 1)
    }

    /// Bit position of the cell at `depth` with path `position`.
    pub fn bit_position(&self, depth: usize, position: usize) -> usize {
        self.level_offsets[depth] + position
    }

    pub fn is_bit_set(&self, bit: usize) -> bool {
        bit < self.bit_count() && self.bits[bit / 64] & (1u64 << (bit % 64)) != 0
    }

    fn set_bit(&mut self, bit: usize) {
        self.bits[bit / 64] |= 1u64 << (bit % 64);
    }

    fn clear_bit(&mut self, bit: usize) {
        self.bits[bit / 64] &= !(1u64 << (bit % 64));
    }

    /// Inserts `item`. Region items straddling cell edges are stored in every
    /// leaf they touch unless duplicates are disabled.
    pub fn add(&mut self, item: T, bounds: impl Into<ItemBounds>) {
        let bounds = bounds.into();
        let leaves = self.leaf_ids_for(bounds);
        for leaf in leaves {
            self.items.entry(leaf).or_default().push(item.clone());
        }
    }

    /// Leaf bit positions an item with `bounds` lands in, marking the bits
    /// of every cell traversed on the way.
    pub fn leaf_ids_for(&mut self, bounds: ItemBounds) -> Vec<usize> {
        let mut leaves = Vec::new();
        let quadrants = self.sector.subdivide();
        for (quadrant, cell) in quadrants.iter().enumerate() {
            if self.descend_mark(&bounds, cell, 0, quadrant, &mut leaves) {
                break;
            }
        }
        leaves
    }

    /// Returns true when descent must stop (first leaf found, no duplicates).
    fn descend_mark(
        &mut self,
        bounds: &ItemBounds,
        cell: &Sector,
        depth: usize,
        position: usize,
        leaves: &mut Vec<usize>,
    ) -> bool {
        if !bounds.intersects(cell) {
            return false;
        }

        let bit = self.bit_position(depth, position);
        self.set_bit(bit);

        if depth == self.num_levels - 1 {
            leaves.push(bit);
            return !self.allow_duplicates;
        }

        for (quadrant, child) in cell.subdivide().iter().enumerate() {
            if self.descend_mark(bounds, child, depth + 1, position * 4 + quadrant, leaves) {
                return true;
            }
        }
        false
    }

    /// All items stored in leaves intersecting `region`, de-duplicated.
    pub fn items_in_region(&self, region: &Sector) -> HashSet<T> {
        let mut result = HashSet::new();
        for leaf in self.occupied_leaves(&ItemBounds::Region(*region)) {
            if let Some(list) = self.items.get(&leaf) {
                result.extend(list.iter().cloned());
            }
        }
        result
    }

    /// Union of [`Self::items_in_region`] over several regions.
    pub fn items_in_regions(&self, regions: &[Sector]) -> HashSet<T> {
        let mut result = HashSet::new();
        for region in regions {
            result.extend(self.items_in_region(region));
        }
        result
    }

    /// Items stored in the leaves containing the given point.
    pub fn items_at(&self, lat: f64, lon: f64) -> HashSet<T> {
        let mut result = HashSet::new();
        for leaf in self.occupied_leaves(&ItemBounds::Point(LatLon::new(lat, lon))) {
            if let Some(list) = self.items.get(&leaf) {
                result.extend(list.iter().cloned());
            }
        }
        result
    }

    /// Set leaf bits whose cells intersect `bounds`.
    fn occupied_leaves(&self, bounds: &ItemBounds) -> Vec<usize> {
        let mut leaves = Vec::new();
        for (quadrant, cell) in self.sector.subdivide().iter().enumerate() {
            self.descend_query(bounds, cell, 0, quadrant, &mut leaves);
        }
        leaves
    }

    fn descend_query(
        &self,
        bounds: &ItemBounds,
        cell: &Sector,
        depth: usize,
        position: usize,
        leaves: &mut Vec<usize>,
    ) {
        let bit = self.bit_position(depth, position);
        if !self.is_bit_set(bit) || !bounds.intersects(cell) {
            return;
        }

        if depth == self.num_levels - 1 {
            leaves.push(bit);
            return;
        }

        for (quadrant, child) in cell.subdivide().iter().enumerate() {
            self.descend_query(bounds, child, depth + 1, position * 4 + quadrant, leaves);
        }
    }

    /// Removes every stored reference to `item`.
    ///
    /// Scans all leaf lists, so this costs O(items). Leaf bits whose lists
    /// become empty are cleared; ancestor bits are left set.
    pub fn remove(&mut self, item: &T) -> bool {
        let mut removed = false;
        let mut emptied = Vec::new();
        for (bit, list) in self.items.iter_mut() {
            let before = list.len();
            list.retain(|i| i != item);
            if list.len() != before {
                removed = true;
                if list.is_empty() {
                    emptied.push(*bit);
                }
            }
        }
        for bit in emptied {
            self.items.remove(&bit);
            self.clear_bit(bit);
        }
        removed
    }

    /// Number of stored item references (duplicates counted).
    pub fn len(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct items stored.
    pub fn distinct_len(&self) -> usize {
        self.items.values().flatten().collect::<HashSet<_>>().len()
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
        self.items.clear();
    }
}

fn cells_at_depth(depth: usize) -> usize {
    4usize.pow(depth as u32 + 1)
}
