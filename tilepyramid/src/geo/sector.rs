//! Angular rectangle type used as the region primitive throughout the crate.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{GeoError, LatLon};

/// An axis-aligned latitude/longitude rectangle, in degrees.
///
/// Containment and intersection tests are boundary-inclusive: a point lying
/// exactly on the shared edge of two adjacent sectors is inside both.
///
/// # Example
///
/// ```
/// use tilepyramid::geo::Sector;
///
/// let sector = Sector::new(-10.0, 10.0, 20.0, 40.0).unwrap();
/// assert!(sector.contains(0.0, 30.0));
/// assert!(sector.contains(10.0, 40.0)); // edges are inside
/// assert_eq!(sector.delta_lat(), 20.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SectorBounds")]
pub struct Sector {
    /// Southern edge.
    pub min_lat: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Western edge.
    pub min_lon: f64,
    /// Eastern edge.
    pub max_lon: f64,
}

/// Unvalidated wire form; deserialized sectors go through [`Sector::new`].
#[derive(Deserialize)]
struct SectorBounds {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl TryFrom<SectorBounds> for Sector {
    type Error = GeoError;

    fn try_from(b: SectorBounds) -> Result<Self, Self::Error> {
        Sector::new(b.min_lat, b.max_lat, b.min_lon, b.max_lon)
    }
}

impl Sector {
    /// Creates a sector, validating that the bounds are ordered and finite.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self, GeoError> {
        let values = [min_lat, max_lat, min_lon, max_lon];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GeoError::NonFinite);
        }
        if min_lat > max_lat || min_lon > max_lon {
            return Err(GeoError::InvertedBounds {
                min_lat,
                max_lat,
                min_lon,
                max_lon,
            });
        }
        Ok(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// Creates a sector from bounds known to be valid.
    ///
    /// Used internally where bounds are derived from an already valid sector.
    pub(crate) const fn from_bounds_unchecked(
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    ) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// The whole globe: -90..90 latitude, -180..180 longitude.
    pub const fn full_sphere() -> Self {
        Self::from_bounds_unchecked(-90.0, 90.0, -180.0, 180.0)
    }

    /// Parses `min_lat,min_lon,max_lat,max_lon`.
    pub fn parse(s: &str) -> Result<Self, GeoError> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| GeoError::Parse(s.to_string()))?;
        if parts.len() != 4 {
            return Err(GeoError::Parse(s.to_string()));
        }
        Self::new(parts[0], parts[2], parts[1], parts[3])
    }

    /// Latitude extent in degrees.
    pub fn delta_lat(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Longitude extent in degrees.
    pub fn delta_lon(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn southwest(&self) -> LatLon {
        LatLon::new(self.min_lat, self.min_lon)
    }

    pub fn northeast(&self) -> LatLon {
        LatLon::new(self.max_lat, self.max_lon)
    }

    pub fn centroid(&self) -> LatLon {
        LatLon::new(
            0.5 * (self.min_lat + self.max_lat),
            0.5 * (self.min_lon + self.max_lon),
        )
    }

    /// Returns true if the point lies inside or on the edge of this sector.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    pub fn contains_point(&self, point: LatLon) -> bool {
        self.contains(point.lat, point.lon)
    }

    /// Returns true if `other` lies entirely within this sector.
    pub fn contains_sector(&self, other: &Sector) -> bool {
        other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
            && other.min_lon >= self.min_lon
            && other.max_lon <= self.max_lon
    }

    /// Returns true if the sectors overlap or touch.
    pub fn intersects(&self, other: &Sector) -> bool {
        !(other.max_lat < self.min_lat
            || other.min_lat > self.max_lat
            || other.max_lon < self.min_lon
            || other.min_lon > self.max_lon)
    }

    /// Returns the overlapping region, or `None` when the sectors are disjoint.
    pub fn intersection(&self, other: &Sector) -> Option<Sector> {
        if !self.intersects(other) {
            return None;
        }
        Some(Self::from_bounds_unchecked(
            self.min_lat.max(other.min_lat),
            self.max_lat.min(other.max_lat),
            self.min_lon.max(other.min_lon),
            self.max_lon.min(other.max_lon),
        ))
    }

    /// Smallest sector enclosing both.
    pub fn union(&self, other: &Sector) -> Sector {
        Self::from_bounds_unchecked(
            self.min_lat.min(other.min_lat),
            self.max_lat.max(other.max_lat),
            self.min_lon.min(other.min_lon),
            self.max_lon.max(other.max_lon),
        )
    }

    /// Splits the sector into four quadrants, ordered SW, SE, NW, NE.
    pub fn subdivide(&self) -> [Sector; 4] {
        let mid_lat = 0.5 * (self.min_lat + self.max_lat);
        let mid_lon = 0.5 * (self.min_lon + self.max_lon);
        [
            Self::from_bounds_unchecked(self.min_lat, mid_lat, self.min_lon, mid_lon),
            Self::from_bounds_unchecked(self.min_lat, mid_lat, mid_lon, self.max_lon),
            Self::from_bounds_unchecked(mid_lat, self.max_lat, self.min_lon, mid_lon),
            Self::from_bounds_unchecked(mid_lat, self.max_lat, mid_lon, self.max_lon),
        ]
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) - ({}, {})",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_validates_bounds() {
        let sector: Sector =
            serde_json::from_str(r#"{"min_lat":-10.0,"max_lat":10.0,"min_lon":20.0,"max_lon":40.0}"#)
                .unwrap();
        assert_eq!(sector, Sector::new(-10.0, 10.0, 20.0, 40.0).unwrap());

        let inverted = r#"{"min_lat":10.0,"max_lat":-10.0,"min_lon":0.0,"max_lon":1.0}"#;
        assert!(serde_json::from_str::<Sector>(inverted).is_err());
    }

    #[test]
    fn test_new_rejects_inverted_bounds() {
        let result = Sector::new(10.0, -10.0, 0.0, 1.0);
        assert!(matches!(result, Err(GeoError::InvertedBounds { .. })));
    }

    #[test]
    fn test_new_rejects_nan() {
        assert!(matches!(
            Sector::new(f64::NAN, 1.0, 0.0, 1.0),
            Err(GeoError::NonFinite)
        ));
    }

    #[test]
    fn test_contains_is_boundary_inclusive() {
        let sector = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
        assert!(sector.contains(0.0, 0.0));
        assert!(sector.contains(10.0, 10.0));
        assert!(!sector.contains(10.000001, 5.0));
    }

    #[test]
    fn test_touching_sectors_intersect() {
        let west = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
        let east = Sector::new(0.0, 10.0, 10.0, 20.0).unwrap();
        assert!(west.intersects(&east));

        let far = Sector::new(0.0, 10.0, 10.5, 20.0).unwrap();
        assert!(!west.intersects(&far));
        assert!(west.intersection(&far).is_none());
    }

    #[test]
    fn test_intersection_and_union() {
        let a = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
        let b = Sector::new(5.0, 15.0, -5.0, 5.0).unwrap();

        let inter = a.intersection(&b).unwrap();
        assert_eq!(inter, Sector::new(5.0, 10.0, 0.0, 5.0).unwrap());

        let union = a.union(&b);
        assert_eq!(union, Sector::new(0.0, 15.0, -5.0, 10.0).unwrap());
    }

    #[test]
    fn test_subdivide_order() {
        let quads = Sector::full_sphere().subdivide();
        assert_eq!(quads[0], Sector::new(-90.0, 0.0, -180.0, 0.0).unwrap());
        assert_eq!(quads[1], Sector::new(-90.0, 0.0, 0.0, 180.0).unwrap());
        assert_eq!(quads[2], Sector::new(0.0, 90.0, -180.0, 0.0).unwrap());
        assert_eq!(quads[3], Sector::new(0.0, 90.0, 0.0, 180.0).unwrap());
    }

    #[test]
    fn test_parse() {
        let sector = Sector::parse("10, 20, 30, 40").unwrap();
        assert_eq!(sector.min_lat, 10.0);
        assert_eq!(sector.min_lon, 20.0);
        assert_eq!(sector.max_lat, 30.0);
        assert_eq!(sector.max_lon, 40.0);

        assert!(Sector::parse("1,2,3").is_err());
        assert!(Sector::parse("a,b,c,d").is_err());
    }

    #[test]
    fn test_display() {
        let sector = Sector::new(1.0, 2.0, 3.0, 4.0).unwrap();
        assert_eq!(sector.to_string(), "(1, 3) - (2, 4)");
    }
}
