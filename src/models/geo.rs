use crate::constants::{METERS_PER_DEGREE_LAT, POLAR_LATITUDE_CUTOFF};
use crate::models::Coordinates;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in geographic coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Build a box from two opposite corners given in any order.
    pub fn from_corners(a: &Coordinates, b: &Coordinates) -> Self {
        BoundingBox {
            min_lat: a.lat.min(b.lat),
            max_lat: a.lat.max(b.lat),
            min_lng: a.lng.min(b.lng),
            max_lng: a.lng.max(b.lng),
        }
    }

    /// Edge-inclusive containment test.
    pub fn contains(&self, point: &Coordinates) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lng..=self.max_lng).contains(&point.lng)
    }

    /// Grow the box outward by a margin in meters.
    ///
    /// Small-angle approximation: the longitude margin is scaled by the cosine
    /// of the box's mid-latitude, which is plenty for a coarse tolerance.
    pub fn expanded_by_meters(&self, margin_m: f64) -> Self {
        let lat_margin = margin_m / METERS_PER_DEGREE_LAT;
        let mid_lat = (self.min_lat + self.max_lat) / 2.0;

        let lng_margin = if mid_lat.abs() > POLAR_LATITUDE_CUTOFF {
            lat_margin
        } else {
            margin_m / (METERS_PER_DEGREE_LAT * mid_lat.to_radians().cos())
        };

        BoundingBox {
            min_lat: self.min_lat - lat_margin,
            max_lat: self.max_lat + lat_margin,
            min_lng: self.min_lng - lng_margin,
            max_lng: self.max_lng + lng_margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    #[test]
    fn corners_are_normalized() {
        let bbox = BoundingBox::from_corners(&c(28.2, -82.1), &c(27.6, -82.8));
        assert_eq!(bbox.min_lat, 27.6);
        assert_eq!(bbox.max_lat, 28.2);
        assert_eq!(bbox.min_lng, -82.8);
        assert_eq!(bbox.max_lng, -82.1);
    }

    #[test]
    fn contains_is_edge_inclusive() {
        let bbox = BoundingBox::from_corners(&c(10.0, 20.0), &c(11.0, 21.0));
        assert!(bbox.contains(&c(10.5, 20.5)));
        assert!(bbox.contains(&c(10.0, 20.0)));
        assert!(bbox.contains(&c(11.0, 21.0)));
        assert!(!bbox.contains(&c(11.0001, 20.5)));
        assert!(!bbox.contains(&c(10.5, 19.9999)));
    }

    #[test]
    fn expansion_adds_latitude_margin() {
        let bbox = BoundingBox::from_corners(&c(48.85, 2.35), &c(48.86, 2.36));
        let grown = bbox.expanded_by_meters(1000.0);
        let lat_margin = 1000.0 / METERS_PER_DEGREE_LAT;
        assert!((grown.min_lat - (48.85 - lat_margin)).abs() < 1e-10);
        assert!((grown.max_lat - (48.86 + lat_margin)).abs() < 1e-10);
    }

    #[test]
    fn longitude_margin_widens_at_higher_latitude() {
        let equator = BoundingBox::from_corners(&c(1.0, 10.0), &c(1.0, 10.0));
        let north = BoundingBox::from_corners(&c(60.0, 10.0), &c(60.0, 10.0));

        let lng_eq = equator.expanded_by_meters(1000.0).max_lng - 10.0;
        let lng_60 = north.expanded_by_meters(1000.0).max_lng - 10.0;

        assert!(lng_60 > lng_eq, "lng_60={lng_60}, lng_eq={lng_eq}");
        // cos(60 deg) = 0.5, so the margin doubles
        assert!((lng_60 - 2.0 * 1000.0 / METERS_PER_DEGREE_LAT).abs() < 1e-9);
    }

    #[test]
    fn near_poles_reuses_latitude_margin() {
        let bbox = BoundingBox::from_corners(&c(86.0, 10.0), &c(86.0, 10.0));
        let grown = bbox.expanded_by_meters(1000.0);
        let lat_margin = 1000.0 / METERS_PER_DEGREE_LAT;
        assert!((grown.max_lng - 10.0 - lat_margin).abs() < 1e-10);
    }
}
