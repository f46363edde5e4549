//! Geodesic helpers for place search.

use serde::{Deserialize, Serialize};

use crate::domain::types::{GeoPoint, RadiusMeters, TypeConstraintError};

/// Mean Earth radius (IUGG) in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Great-circle distance in meters using the haversine formula.
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();
    let d_lat = (b.latitude() - a.latitude()).to_radians();
    let d_lon = (b.longitude() - a.longitude()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Longitude/latitude rectangle. `west > east` means the box crosses the
/// antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

impl BoundingBox {
    /// Builds a box from its south-west and north-east corners.
    pub fn new(south_west: GeoPoint, north_east: GeoPoint) -> Result<Self, TypeConstraintError> {
        if south_west.latitude() > north_east.latitude() {
            return Err(TypeConstraintError::InvalidValue(
                "bounding box south edge lies above its north edge".to_string(),
            ));
        }
        Ok(Self {
            west: south_west.longitude(),
            south: south_west.latitude(),
            east: north_east.longitude(),
            north: north_east.latitude(),
        })
    }

    /// Smallest box guaranteed to contain every point within `radius` of
    /// `center`.
    ///
    /// The longitude half-width is that of the circle's tangent meridians,
    /// `asin(sin(r) / cos(lat))`, which is wider than `r / cos(lat)`.
    pub fn around(center: &GeoPoint, radius: RadiusMeters) -> Self {
        let angular = radius.get() / EARTH_RADIUS_METERS;
        let d_lat = angular.to_degrees();
        let south = center.latitude() - d_lat;
        let north = center.latitude() + d_lat;
        if south <= -90.0 || north >= 90.0 {
            return Self {
                west: -180.0,
                south: south.max(-90.0),
                east: 180.0,
                north: north.min(90.0),
            };
        }

        let spread = angular.sin() / center.latitude().to_radians().cos();
        if angular >= std::f64::consts::FRAC_PI_2 || spread >= 1.0 {
            return Self {
                west: -180.0,
                south,
                east: 180.0,
                north,
            };
        }
        let d_lon = spread.asin().to_degrees();
        Self {
            west: wrap_longitude(center.longitude() - d_lon),
            south,
            east: wrap_longitude(center.longitude() + d_lon),
            north,
        }
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        let lat = point.latitude();
        let lon = point.longitude();
        if lat < self.south || lat > self.north {
            return false;
        }
        if self.crosses_antimeridian() {
            lon >= self.west || lon <= self.east
        } else {
            lon >= self.west && lon <= self.east
        }
    }
}

fn wrap_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// Simple polygon given by its vertices; the ring is closed implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    vertices: Vec<GeoPoint>,
}

impl Polygon {
    pub fn new(mut vertices: Vec<GeoPoint>) -> Result<Self, TypeConstraintError> {
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(TypeConstraintError::InvalidValue(
                "polygon needs at least three vertices".to_string(),
            ));
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[GeoPoint] {
        &self.vertices
    }

    /// Planar ray-casting test in longitude/latitude space.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        let (x, y) = (point.longitude(), point.latitude());
        let mut inside = false;
        let mut j = self.vertices.len() - 1;
        for i in 0..self.vertices.len() {
            let (xi, yi) = (self.vertices[i].longitude(), self.vertices[i].latitude());
            let (xj, yj) = (self.vertices[j].longitude(), self.vertices[j].latitude());
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bounds = BoundingBox {
            west: f64::MAX,
            south: f64::MAX,
            east: f64::MIN,
            north: f64::MIN,
        };
        for vertex in &self.vertices {
            bounds.west = bounds.west.min(vertex.longitude());
            bounds.east = bounds.east.max(vertex.longitude());
            bounds.south = bounds.south.min(vertex.latitude());
            bounds.north = bounds.north.max(vertex.latitude());
        }
        bounds
    }
}

/// Spatial restriction of a place search; at most one per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeoFilter {
    Radius {
        center: GeoPoint,
        radius: RadiusMeters,
    },
    BoundingBox(BoundingBox),
    Polygon(Polygon),
}

impl GeoFilter {
    pub fn matches(&self, point: &GeoPoint) -> bool {
        match self {
            Self::Radius { center, radius } => distance_meters(center, point) <= radius.get(),
            Self::BoundingBox(bounds) => bounds.contains(point),
            Self::Polygon(polygon) => polygon.contains(point),
        }
    }

    /// Rectangle that contains every match; used as a storage prefilter.
    pub fn bounds(&self) -> BoundingBox {
        match self {
            Self::Radius { center, radius } => BoundingBox::around(center, *radius),
            Self::BoundingBox(bounds) => *bounds,
            Self::Polygon(polygon) => polygon.bounding_box(),
        }
    }

    /// Whether [`Self::bounds`] alone decides a match.
    pub fn is_exact_in_bounds(&self) -> bool {
        matches!(self, Self::BoundingBox(_))
    }
}
