//! Planar geometry primitives over lon/lat degrees.
//!
//! Everything here treats coordinates as a flat plane except [`haversine_m`],
//! which is the only spherical measure and is used for edge weights.

use serde::{Deserialize, Serialize};

/// Tolerance under which a cross product counts as collinear.
pub const COLLINEAR_EPS: f64 = 1e-12;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }

    /// Planar distance in degrees.
    pub fn planar_distance(&self, other: &Coord) -> f64 {
        (self.lon - other.lon).hypot(self.lat - other.lat)
    }
}

impl From<(f64, f64)> for Coord {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self { lon, lat }
    }
}

/// Closed ring: first coordinate equals the last.
pub type Ring = Vec<Coord>;

/// All rings of one obstacle; every ring blocks on its own, holes included.
pub type ObstaclePolygon = Vec<Ring>;

/// Infinitely thin linear obstacle.
pub type WallSegment = [Coord; 2];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BBox {
    pub fn empty() -> Self {
        Self {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        }
    }

    pub fn extend(&mut self, c: &Coord) {
        self.min_lon = self.min_lon.min(c.lon);
        self.min_lat = self.min_lat.min(c.lat);
        self.max_lon = self.max_lon.max(c.lon);
        self.max_lat = self.max_lat.max(c.lat);
    }

    pub fn of_points<'a, I: IntoIterator<Item = &'a Coord>>(points: I) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.extend(p);
        }
        bbox
    }

    pub fn of_ring(ring: &[Coord]) -> Self {
        Self::of_points(ring)
    }

    pub fn of_rings(rings: &[Ring]) -> Self {
        Self::of_points(rings.iter().flatten())
    }

    pub fn of_segment(a: &Coord, b: &Coord) -> Self {
        Self {
            min_lon: a.lon.min(b.lon),
            min_lat: a.lat.min(b.lat),
            max_lon: a.lon.max(b.lon),
            max_lat: a.lat.max(b.lat),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_lon.is_finite()
            && self.min_lat.is_finite()
            && self.max_lon.is_finite()
            && self.max_lat.is_finite()
            && self.min_lon <= self.max_lon
            && self.min_lat <= self.max_lat
    }

    pub fn contains(&self, c: &Coord) -> bool {
        c.lon >= self.min_lon && c.lon <= self.max_lon && c.lat >= self.min_lat && c.lat <= self.max_lat
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }
}

/// Orientation of the triple (a, b, c): 0 collinear, 1 clockwise, 2 counter-clockwise.
pub fn orientation(a: &Coord, b: &Coord, c: &Coord) -> u8 {
    let val = (b.lat - a.lat) * (c.lon - b.lon) - (b.lon - a.lon) * (c.lat - b.lat);
    if val.abs() <= COLLINEAR_EPS {
        0
    } else if val > 0.0 {
        1
    } else {
        2
    }
}

/// `q` lies within the axis-aligned range spanned by `p`..`r` (used only for collinear triples).
fn on_segment(p: &Coord, q: &Coord, r: &Coord) -> bool {
    q.lon <= p.lon.max(r.lon)
        && q.lon >= p.lon.min(r.lon)
        && q.lat <= p.lat.max(r.lat)
        && q.lat >= p.lat.min(r.lat)
}

/// True if segment `ab` crosses or touches segment `cd`.
pub fn segments_intersect(a: &Coord, b: &Coord, c: &Coord, d: &Coord) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == 0 && on_segment(a, c, b))
        || (o2 == 0 && on_segment(a, d, b))
        || (o3 == 0 && on_segment(c, a, d))
        || (o4 == 0 && on_segment(c, b, d))
}

/// Ray casting against a single ring.
pub fn point_in_ring(p: &Coord, ring: &[Coord]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lon, ring[i].lat);
        let (xj, yj) = (ring[j].lon, ring[j].lat);
        let dy = yj - yi;
        let denom = if dy == 0.0 { COLLINEAR_EPS } else { dy };
        let crosses = (yi > p.lat) != (yj > p.lat) && p.lon < (xj - xi) * (p.lat - yi) / denom + xi;
        if crosses {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// True if `p` is inside any ring. Rings are not combined, so a hole still counts as inside.
pub fn point_in_polygon(p: &Coord, rings: &[Ring]) -> bool {
    rings.iter().any(|ring| point_in_ring(p, ring))
}

/// Projection parameter of `p` onto `ab`, clamped to `[0, 1]`.
pub fn project_onto_segment(p: &Coord, a: &Coord, b: &Coord) -> f64 {
    let dx = b.lon - a.lon;
    let dy = b.lat - a.lat;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return 0.0;
    }
    (((p.lon - a.lon) * dx + (p.lat - a.lat) * dy) / len_sq).clamp(0.0, 1.0)
}

pub fn lerp(a: &Coord, b: &Coord, t: f64) -> Coord {
    Coord::new(a.lon + t * (b.lon - a.lon), a.lat + t * (b.lat - a.lat))
}

/// Euclidean distance from `p` to the closest point of segment `ab`.
pub fn point_segment_distance(p: &Coord, a: &Coord, b: &Coord) -> f64 {
    let t = project_onto_segment(p, a, b);
    p.planar_distance(&lerp(a, b, t))
}

pub fn bbox_intersects(a: &BBox, b: &BBox) -> bool {
    !(a.max_lon < b.min_lon || a.min_lon > b.max_lon || a.max_lat < b.min_lat || a.min_lat > b.max_lat)
}

/// Great-circle distance in meters.
pub fn haversine_m(a: &Coord, b: &Coord) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Segment `ab` crosses or touches any edge of any ring. `rings_bbox` is the pre-filter.
pub fn segment_intersects_polygon(a: &Coord, b: &Coord, rings: &[Ring], rings_bbox: &BBox) -> bool {
    if !bbox_intersects(&BBox::of_segment(a, b), rings_bbox) {
        return false;
    }
    rings
        .iter()
        .any(|ring| ring.windows(2).any(|edge| segments_intersect(a, b, &edge[0], &edge[1])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Ring> {
        vec![vec![
            Coord::new(0.0, 0.0),
            Coord::new(0.0, 2.0),
            Coord::new(2.0, 2.0),
            Coord::new(2.0, 0.0),
            Coord::new(0.0, 0.0),
        ]]
    }

    #[test]
    fn test_point_in_square() {
        let rings = square();
        assert!(point_in_polygon(&Coord::new(1.0, 1.0), &rings));
        assert!(!point_in_polygon(&Coord::new(-1.0, 1.0), &rings));
    }

    #[test]
    fn test_hole_still_blocks() {
        let mut rings = square();
        rings.push(vec![
            Coord::new(0.5, 0.5),
            Coord::new(0.5, 1.5),
            Coord::new(1.5, 1.5),
            Coord::new(1.5, 0.5),
            Coord::new(0.5, 0.5),
        ]);
        assert!(point_in_polygon(&Coord::new(1.0, 1.0), &rings));
    }

    #[test]
    fn test_crossing_and_touching_segments() {
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(2.0, 2.0);
        assert!(segments_intersect(&a, &b, &Coord::new(0.0, 2.0), &Coord::new(2.0, 0.0)));
        // endpoint touching the other segment
        assert!(segments_intersect(&a, &b, &Coord::new(1.0, 1.0), &Coord::new(3.0, 0.0)));
        assert!(!segments_intersect(&a, &b, &Coord::new(3.0, 0.0), &Coord::new(4.0, 1.0)));
        // collinear but disjoint
        assert!(!segments_intersect(&a, &Coord::new(1.0, 1.0), &Coord::new(2.0, 2.0), &Coord::new(3.0, 3.0)));
    }

    #[test]
    fn test_orientation_signs() {
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(1.0, 0.0);
        assert_eq!(orientation(&a, &b, &Coord::new(2.0, 0.0)), 0);
        assert_ne!(orientation(&a, &b, &Coord::new(2.0, 1.0)), orientation(&a, &b, &Coord::new(2.0, -1.0)));
    }

    #[test]
    fn test_point_segment_distance_clamps() {
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(1.0, 0.0);
        assert!((point_segment_distance(&Coord::new(0.5, 1.0), &a, &b) - 1.0).abs() < 1e-12);
        assert!((point_segment_distance(&Coord::new(2.0, 0.0), &a, &b) - 1.0).abs() < 1e-12);
        assert!((point_segment_distance(&Coord::new(3.0, 4.0), &a, &a) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_bbox_intersects_touching() {
        let a = BBox { min_lon: 0.0, min_lat: 0.0, max_lon: 1.0, max_lat: 1.0 };
        let b = BBox { min_lon: 1.0, min_lat: 1.0, max_lon: 2.0, max_lat: 2.0 };
        let c = BBox { min_lon: 1.5, min_lat: 0.0, max_lon: 2.0, max_lat: 0.5 };
        assert!(bbox_intersects(&a, &b));
        assert!(!bbox_intersects(&a, &c));
    }

    #[test]
    fn test_haversine_one_degree_equator() {
        let d = haversine_m(&Coord::new(0.0, 0.0), &Coord::new(1.0, 0.0));
        assert!((d - 111_194.93).abs() < 1.0);
    }

    #[test]
    fn test_segment_crossing_square() {
        let rings = square();
        let bbox = BBox::of_rings(&rings);
        assert!(segment_intersects_polygon(&Coord::new(-1.0, 1.0), &Coord::new(3.0, 1.0), &rings, &bbox));
        assert!(!segment_intersects_polygon(&Coord::new(-1.0, 3.0), &Coord::new(3.0, 3.0), &rings, &bbox));
    }
}
