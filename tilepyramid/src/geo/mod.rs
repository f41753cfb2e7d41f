//! Geographic primitives.
//!
//! Provides the [`LatLon`] point and [`Sector`] rectangle types used by the
//! pyramid, the spatial index and the retrieval layer. Projection and
//! great-circle math are deliberately absent: all distances here are plain
//! angular distances in degrees, which is enough to rank tile requests.

mod sector;

pub use sector::Sector;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing geographic values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeoError {
    #[error("sector bounds are not finite")]
    NonFinite,

    #[error("inverted sector bounds: lat {min_lat}..{max_lat}, lon {min_lon}..{max_lon}")]
    InvertedBounds {
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    },

    #[error("cannot parse sector '{0}' (expected min_lat,min_lon,max_lat,max_lon)")]
    Parse(String),
}

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Planar angular distance in degrees.
    ///
    /// Only used as a request priority, so the flat approximation is fine.
    pub fn angular_distance(&self, other: &LatLon) -> f64 {
        (self.lat - other.lat).hypot(self.lon - other.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angular_distance() {
        let a = LatLon::new(0.0, 0.0);
        let b = LatLon::new(3.0, 4.0);
        assert_eq!(a.angular_distance(&b), 5.0);
        assert_eq!(b.angular_distance(&a), 5.0);
    }
}
