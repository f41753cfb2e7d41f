//! Cache path construction for tiles.
//!
//! Tiles are stored relative to a cache root as:
//!
//! ```text
//! {cache_name}/{row}/{row}_{col}.{suffix}
//! ```
//!
//! where `cache_name` is the level's dataset prefix (for example
//! `Earth/BlueMarble/3`). Characters that are illegal in file names on common
//! platforms are stripped from every component.

use regex::Regex;
use std::sync::OnceLock;

/// Characters stripped from cache path components: `<>:"|?*`, backslash and
/// control characters.
fn illegal_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"[<>:"|?*\\\x00-\x1f]"#).unwrap())
}

/// Removes characters that are not allowed in file paths.
///
/// Forward slashes are kept so that a dataset name can carry its own
/// directory hierarchy; `..` segments are dropped.
///
/// # Example
///
/// ```
/// use tilepyramid::cache::strip_illegal_path_chars;
///
/// assert_eq!(strip_illegal_path_chars("Earth/BMNG:2004?/3"), "Earth/BMNG2004/3");
/// ```
pub fn strip_illegal_path_chars(s: &str) -> String {
    let cleaned = illegal_chars().replace_all(s, "");
    cleaned
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// Relative cache path of a tile.
///
/// # Example
///
/// ```
/// use tilepyramid::cache::tile_cache_path;
///
/// let path = tile_cache_path("Earth/BMNG/2", 5, 12, "jpg");
/// assert_eq!(path, "Earth/BMNG/2/5/5_12.jpg");
/// ```
pub fn tile_cache_path(cache_name: &str, row: i32, col: i32, suffix: &str) -> String {
    let dataset = strip_illegal_path_chars(cache_name);
    let suffix = strip_illegal_path_chars(suffix.trim_start_matches('.'));
    if dataset.is_empty() {
        format!("{row}/{row}_{col}.{suffix}")
    } else {
        format!("{dataset}/{row}/{row}_{col}.{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_cache_path_layout() {
        assert_eq!(tile_cache_path("Earth/NAIP/7", 100, 200, "png"), "Earth/NAIP/7/100/100_200.png");
    }

    #[test]
    fn test_suffix_leading_dot_is_ignored() {
        assert_eq!(tile_cache_path("d/0", 1, 2, ".dds"), "d/0/1/1_2.dds");
    }

    #[test]
    fn test_negative_rows_are_preserved() {
        assert_eq!(tile_cache_path("d/0", -1, -2, "jpg"), "d/0/-1/-1_-2.jpg");
    }

    #[test]
    fn test_illegal_characters_stripped() {
        assert_eq!(
            tile_cache_path("Ear<th>/a|b*c?/1", 0, 0, "jpg"),
            "Earth/abc/1/0/0_0.jpg"
        );
    }

    #[test]
    fn test_parent_segments_removed() {
        assert_eq!(strip_illegal_path_chars("../../etc//passwd"), "etc/passwd");
    }

    #[test]
    fn test_empty_dataset() {
        assert_eq!(tile_cache_path("", 3, 4, "jpg"), "3/3_4.jpg");
    }
}
