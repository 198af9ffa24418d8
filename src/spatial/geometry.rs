//! Footprint construction and the distance queries the collision model needs

use geo::{BoundingRect, Coord, EuclideanDistance, Intersects, LineString, Point, Polygon, Rect};

/// Axis-aligned rectangle of `width` (x) by `length` (y) centered on `center`,
/// rotated counter-clockwise by `rotation_deg` around its center
pub fn rectangle_footprint(center: Coord, width: f64, length: f64, rotation_deg: f64) -> Polygon<f64> {
    let (sin, cos) = rotation_deg.to_radians().sin_cos();
    let hw = width / 2.0;
    let hl = length / 2.0;
    let corners = [(-hw, -hl), (hw, -hl), (hw, hl), (-hw, hl), (-hw, -hl)];
    let ring: Vec<Coord> = corners
        .iter()
        .map(|&(dx, dy)| Coord {
            x: center.x + dx * cos - dy * sin,
            y: center.y + dx * sin + dy * cos,
        })
        .collect();
    Polygon::new(LineString::new(ring), vec![])
}

/// Closed polygon from an `[x, y]` ring, closing it if needed
pub fn ring_to_polygon(ring: &[[f64; 2]]) -> Polygon<f64> {
    let coords: Vec<Coord> = ring.iter().map(|&[x, y]| Coord { x, y }).collect();
    // LineString -> Polygon closes the exterior ring
    Polygon::new(LineString::new(coords), vec![])
}

/// Minimum distance between two polygons, 0 when they touch or overlap
pub fn polygon_distance(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
    if a.intersects(b) {
        0.0
    } else {
        a.euclidean_distance(b)
    }
}

/// Distance from a polygon's outline to another polygon's exterior ring
///
/// Used for property lines, where the footprint sits inside the parcel and the
/// clearance of interest is to the parcel edge, not to the parcel area.
pub fn distance_to_ring(footprint: &Polygon<f64>, outer: &Polygon<f64>) -> f64 {
    footprint.exterior().euclidean_distance(outer.exterior())
}

/// Distance from a point to a polygon, 0 inside
pub fn point_polygon_distance(point: Coord, polygon: &Polygon<f64>) -> f64 {
    Point::from(point).euclidean_distance(polygon)
}

/// Bounding rectangle of a set of polygons
pub fn union_bounds<'a>(polygons: impl IntoIterator<Item = &'a Polygon<f64>>) -> Option<Rect<f64>> {
    polygons
        .into_iter()
        .filter_map(|p| p.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        })
}

/// Diagonal length of a rectangle
pub fn rect_diagonal(rect: &Rect<f64>) -> f64 {
    (rect.width().powi(2) + rect.height().powi(2)).sqrt()
}
