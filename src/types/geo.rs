use serde::{Deserialize, Serialize};

use crate::core::error::Error;

const FULL_TURN: f64 = 360.0;
const HALF_TURN: f64 = 180.0;
const MAX_LATITUDE: f64 = 90.0;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Maps any finite longitude into (-180, 180]. Values already in range are
/// returned untouched, so repeated application never drifts.
pub fn normalize_longitude(lng: f64) -> f64 {
    if lng > -HALF_TURN && lng <= HALF_TURN {
        return lng;
    }

    let wrapped = (lng + HALF_TURN).rem_euclid(FULL_TURN) - HALF_TURN;

    if wrapped <= -HALF_TURN {
        wrapped + FULL_TURN
    } else {
        wrapped
    }
}

/// Shifts `lng` by whole turns so it lies within 180 degrees of `center`, which
/// places a marker on the world copy the map is currently looking at.
pub fn denormalize_longitude(lng: f64, center: f64) -> f64 {
    if (center - lng).abs() <= HALF_TURN {
        return lng;
    }

    let shifted = lng + ((center - lng) / FULL_TURN).round() * FULL_TURN;

    if center - shifted > HALF_TURN {
        shifted + FULL_TURN
    } else if shifted - center > HALF_TURN {
        shifted - FULL_TURN
    } else {
        shifted
    }
}

pub fn clamp_latitude(lat: f64) -> f64 {
    lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
}

/// A latitude/longitude rectangle. Longitudes are always normalised; a box
/// with `west > east` crosses the antimeridian, and the whole globe is
/// exactly `[-180, 180]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    /// Builds bounds from raw map-library edges, normalising longitudes at
    /// the boundary so nothing downstream sees unwrapped values.
    pub fn from_map(north: f64, south: f64, east: f64, west: f64) -> Result<Self, Error> {
        if ![north, south, east, west].iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidBounds("edges must be finite".to_owned()));
        }

        let north = clamp_latitude(north);
        let south = clamp_latitude(south);

        if north <= south {
            return Err(Error::InvalidBounds(format!(
                "north ({}) must be greater than south ({})",
                north, south
            )));
        }

        if east - west >= FULL_TURN {
            return Ok(Self {
                north,
                south,
                east: HALF_TURN,
                west: -HALF_TURN,
            });
        }

        Ok(Self {
            north,
            south,
            east: normalize_longitude(east),
            west: normalize_longitude(west),
        })
    }

    /// A box of the given size in degrees around `center`.
    pub fn around(center: Coordinate, lat_span: f64, lng_span: f64) -> Result<Self, Error> {
        Self::from_map(
            center.latitude + lat_span / 2.0,
            center.latitude - lat_span / 2.0,
            center.longitude + lng_span / 2.0,
            center.longitude - lng_span / 2.0,
        )
    }

    pub fn is_full_globe(&self) -> bool {
        self.west == -HALF_TURN && self.east == HALF_TURN
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    pub fn lng_span(&self) -> f64 {
        if self.crosses_antimeridian() {
            self.east + FULL_TURN - self.west
        } else {
            self.east - self.west
        }
    }

    /// True when every edge of `other` lies on or inside the matching edge of
    /// `self`. Longitudes are compared in a frame unwrapped from `self.west`
    /// so boxes across the antimeridian behave like any other box.
    pub fn contains(&self, other: &Bounds) -> bool {
        if other.north > self.north || other.south < self.south {
            return false;
        }

        if self.is_full_globe() {
            return true;
        }

        if other.lng_span() > self.lng_span() {
            return false;
        }

        let west = self.west + (other.west - self.west).rem_euclid(FULL_TURN);
        let east = west + other.lng_span();

        east <= self.west + self.lng_span()
    }

    /// Grows each axis by `factor` times its span, half on each side.
    /// Latitude is clamped to the poles; a longitude span that would wrap
    /// the globe becomes the full globe.
    pub fn buffer(&self, factor: f64) -> Bounds {
        let lat_pad = self.lat_span() * factor / 2.0;

        let north = clamp_latitude(self.north + lat_pad);
        let south = clamp_latitude(self.south - lat_pad);

        let lng_span = self.lng_span();

        if self.is_full_globe() || lng_span * (1.0 + factor) >= FULL_TURN {
            return Bounds {
                north,
                south,
                east: HALF_TURN,
                west: -HALF_TURN,
            };
        }

        let lng_pad = lng_span * factor / 2.0;

        Bounds {
            north,
            south,
            east: normalize_longitude(self.east + lng_pad),
            west: normalize_longitude(self.west - lng_pad),
        }
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.north + self.south) / 2.0,
            normalize_longitude(self.west + self.lng_span() / 2.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn bounds(north: f64, south: f64, east: f64, west: f64) -> Bounds {
        Bounds::from_map(north, south, east, west).unwrap()
    }

    #[test]
    fn test_normalize_longitude_range_and_idempotence() {
        let samples = [
            -1080.5, -540.0, -360.0, -180.0, -179.99, -0.0, 0.0, 45.5, 180.0, 180.01, 359.0,
            360.0, 725.25, 1e7, -1e7, 1e-20, -1e-20,
        ];

        for lng in samples {
            let once = normalize_longitude(lng);
            assert!(once > -180.0 && once <= 180.0, "{} -> {}", lng, once);
            assert_eq!(normalize_longitude(once), once, "not idempotent for {}", lng);
        }

        assert_eq!(normalize_longitude(-180.0), 180.0);
        assert_eq!(normalize_longitude(190.0), -170.0);
        assert_eq!(normalize_longitude(-190.0), 170.0);
        assert_eq!(normalize_longitude(540.0), 180.0);
    }

    #[test]
    fn test_denormalize_longitude() {
        assert_eq!(denormalize_longitude(-170.0, 175.0), 190.0);
        assert_eq!(denormalize_longitude(170.0, -175.0), -190.0);
        assert_eq!(denormalize_longitude(10.0, 20.0), 10.0);
        assert_eq!(denormalize_longitude(10.0, 730.0), 730.0);

        for (lng, center) in [(-170.0, 175.0), (0.0, 540.0), (90.0, -900.0), (0.0, 180.0)] {
            let once = denormalize_longitude(lng, center);
            assert!((center - once).abs() <= 180.0);
            assert_eq!(denormalize_longitude(once, center), once);
        }
    }

    #[test]
    fn test_from_map_normalizes_and_validates() {
        let b = bounds(10.0, 0.0, 190.0, 170.0);
        assert_eq!(b.east, -170.0);
        assert_eq!(b.west, 170.0);
        assert!(b.crosses_antimeridian());
        assert!((b.lng_span() - 20.0).abs() < EPSILON);

        assert!(bounds(80.0, -80.0, 300.0, -100.0).is_full_globe());

        assert!(Bounds::from_map(0.0, 10.0, 5.0, 0.0).is_err());
        assert!(Bounds::from_map(f64::NAN, 0.0, 5.0, 0.0).is_err());
    }

    #[test]
    fn test_contained_within_zone() {
        let zone = bounds(10.0, 0.0, 10.0, 0.0);

        assert!(zone.contains(&bounds(8.0, 2.0, 8.0, 2.0)));
        assert!(zone.contains(&zone));
    }

    #[test]
    fn test_any_edge_outside_is_not_contained() {
        let zone = bounds(10.0, 0.0, 10.0, 0.0);

        assert!(!zone.contains(&bounds(11.0, 0.0, 10.0, 0.0)));
        assert!(!zone.contains(&bounds(10.0, -1.0, 10.0, 0.0)));
        assert!(!zone.contains(&bounds(10.0, 0.0, 11.0, 0.0)));
        assert!(!zone.contains(&bounds(10.0, 0.0, 10.0, -1.0)));
    }

    #[test]
    fn test_containment_across_antimeridian() {
        let zone = bounds(10.0, -10.0, 200.0, 160.0);

        assert!(zone.contains(&bounds(5.0, -5.0, 190.0, 170.0)));
        assert!(zone.contains(&bounds(5.0, -5.0, 175.0, 165.0)));
        assert!(!zone.contains(&bounds(5.0, -5.0, 210.0, 170.0)));
        assert!(!zone.contains(&bounds(5.0, -5.0, 0.0, -10.0)));
    }

    #[test]
    fn test_buffer_contains_source_and_scales_span() {
        let factor = 1.25;
        let sources = [
            bounds(10.0, 0.0, 10.0, 0.0),
            bounds(51.6, 51.4, 0.1, -0.3),
            bounds(-30.0, -35.5, 152.0, 148.25),
            bounds(5.0, -5.0, 185.0, 175.0),
        ];

        for source in sources {
            let buffered = source.buffer(factor);

            assert!(buffered.contains(&source), "{:?} !⊇ {:?}", buffered, source);
            assert!((buffered.lat_span() - source.lat_span() * (1.0 + factor)).abs() < EPSILON);
            assert!((buffered.lng_span() - source.lng_span() * (1.0 + factor)).abs() < EPSILON);
        }
    }

    #[test]
    fn test_buffer_clamps_and_wraps() {
        let polar = bounds(85.0, 60.0, 10.0, 0.0).buffer(1.25);
        assert_eq!(polar.north, 90.0);
        assert!(polar.south < 60.0);

        let wide = bounds(10.0, 0.0, 100.0, -100.0).buffer(1.25);
        assert!(wide.is_full_globe());
        assert!(wide.contains(&bounds(10.0, 0.0, 100.0, -100.0)));

        let wrapped = bounds(10.0, 0.0, 179.0, 170.0).buffer(1.0);
        assert!(wrapped.crosses_antimeridian());
        assert!((wrapped.east - -176.5).abs() < EPSILON);
        assert!((wrapped.west - 165.5).abs() < EPSILON);
    }

    #[test]
    fn test_center() {
        assert_eq!(bounds(10.0, 0.0, 10.0, 0.0).center(), Coordinate::new(5.0, 5.0));
        assert_eq!(
            bounds(10.0, -10.0, 190.0, 170.0).center(),
            Coordinate::new(0.0, 180.0)
        );
    }
}
