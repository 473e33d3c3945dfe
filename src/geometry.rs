//! Planar geometry over image coordinates.
//!
//! Contours arrive from the contour tracer as pixel chains. Everything that
//! measures them (area, perimeter, centroid, radial profile) and everything
//! that simplifies them into polygons lives here so the classifier only has to
//! reason about shapes.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A position in image pixel space, `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Displacement between two [`Point`]s.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        (self - other).norm()
    }

    /// Linear interpolation towards `other`, `t = 0` yields `self`.
    pub fn lerp(self, other: Point, t: f32) -> Point {
        self + (other - self) * t
    }
}

impl From<imageproc::point::Point<u32>> for Point {
    fn from(p: imageproc::point::Point<u32>) -> Self {
        Point::new(p.x as f32, p.y as f32)
    }
}

impl Vector {
    pub fn new(x: f32, y: f32) -> Self {
        Vector { x, y }
    }

    pub fn dot(self, rhs: Vector) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    pub fn cross(self, rhs: Vector) -> f32 {
        self.x * rhs.y - self.y * rhs.x
    }

    pub fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn normalize(self) -> Vector {
        let n = self.norm();
        if n == 0.0 { Vector::default() } else { self * (1.0 / n) }
    }

    /// Angle in degrees between two vectors, in `[0, 180]`.
    pub fn angle_to(self, rhs: Vector) -> f32 {
        let denom = self.norm() * rhs.norm();
        if denom == 0.0 {
            return 0.0;
        }
        (self.dot(rhs) / denom).clamp(-1.0, 1.0).acos().to_degrees()
    }
}

impl Sub<Point> for Point {
    type Output = Vector;

    fn sub(self, rhs: Point) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Add<Vector> for Point {
    type Output = Point;

    fn add(self, rhs: Vector) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Mul<f32> for Vector {
    type Output = Vector;

    fn mul(self, rhs: f32) -> Vector {
        Vector::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned bounding box, inclusive of its edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl BoundingBox {
    pub fn from_points(points: &[Point]) -> Option<BoundingBox> {
        let first = points.first()?;
        let mut bbox = BoundingBox {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in points.iter().skip(1) {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x + 1.0
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y + 1.0
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

/// Area enclosed by a closed polygon (shoelace formula).
pub fn polygon_area(points: &[Point]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f32 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    twice.abs() / 2.0
}

/// Length of a closed polygon, including the closing edge.
pub fn perimeter(points: &[Point]) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.distance(*b))
        .sum()
}

/// Area centroid of a closed polygon; falls back to the vertex mean for
/// degenerate (zero-area) input.
pub fn centroid(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::default();
    }

    let (mut cx, mut cy, mut twice_area) = (0.0f64, 0.0f64, 0.0f64);
    for (a, b) in points.iter().zip(points.iter().cycle().skip(1)) {
        let cross = (a.x as f64) * (b.y as f64) - (b.x as f64) * (a.y as f64);
        twice_area += cross;
        cx += (a.x as f64 + b.x as f64) * cross;
        cy += (a.y as f64 + b.y as f64) * cross;
    }

    if twice_area.abs() < 1e-6 {
        let n = points.len() as f32;
        let sx: f32 = points.iter().map(|p| p.x).sum();
        let sy: f32 = points.iter().map(|p| p.y).sum();
        return Point::new(sx / n, sy / n);
    }

    Point::new(
        (cx / (3.0 * twice_area)) as f32,
        (cy / (3.0 * twice_area)) as f32,
    )
}

/// Isoperimetric quotient `4πA / P²`: 1.0 for a perfect disc.
pub fn circularity(area: f32, perimeter: f32) -> f32 {
    if perimeter <= 0.0 {
        return 0.0;
    }
    4.0 * std::f32::consts::PI * area / (perimeter * perimeter)
}

/// Mean and standard deviation of the distances from `center` to `points`.
pub fn radial_profile(points: &[Point], center: Point) -> (f32, f32) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let n = points.len() as f32;
    let mean = points.iter().map(|p| p.distance(center)).sum::<f32>() / n;
    let variance = points
        .iter()
        .map(|p| (p.distance(center) - mean).powi(2))
        .sum::<f32>()
        / n;
    (mean, variance.sqrt())
}

/// Shortest distance from `p` to the segment `a`–`b`.
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f32 {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Even-odd rule containment test.
pub fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Move every vertex towards `center` by `factor` (1.0 keeps the polygon).
pub fn scale_polygon(points: &[Point], center: Point, factor: f32) -> Vec<Point> {
    points
        .iter()
        .map(|p| center + (*p - center) * factor)
        .collect()
}

/// Interior angle in degrees at vertex `i` of a closed polygon.
pub fn vertex_angle(points: &[Point], i: usize) -> f32 {
    let n = points.len();
    let prev = points[(i + n - 1) % n];
    let next = points[(i + 1) % n];
    (prev - points[i]).angle_to(next - points[i])
}

/// Intersection of the infinite lines through `a1`–`a2` and `b1`–`b2`.
pub fn line_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let (da, db) = (a2 - a1, b2 - b1);
    let denom = da.cross(db);
    if denom.abs() < 1e-6 {
        return None;
    }
    let t = (b1 - a1).cross(db) / denom;
    Some(a1 + da * t)
}

/// Clean up a simplified polygon traced from a thick stroke.
///
/// Hole contours of stroked outlines have blunt corners, which simplify into
/// a short edge between two half corners. Vertices turning less than
/// `min_turn` degrees are dropped, and edges shorter than `short_edge_ratio`
/// times the longest edge collapse into the intersection of their
/// neighbours.
pub fn sharpen_corners(polygon: &[Point], min_turn: f32, short_edge_ratio: f32) -> Vec<Point> {
    let mut polygon = polygon.to_vec();
    while polygon.len() > 3 {
        let n = polygon.len();
        let flattest = (0..n)
            .map(|i| (i, 180.0 - vertex_angle(&polygon, i)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b));
        if let Some((i, turn)) = flattest {
            if turn < min_turn {
                polygon.remove(i);
                continue;
            }
        }

        let sides: Vec<f32> = (0..n)
            .map(|i| polygon[i].distance(polygon[(i + 1) % n]))
            .collect();
        let longest = sides.iter().copied().fold(0.0f32, f32::max);
        let Some((j, shortest)) = sides
            .iter()
            .copied()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            break;
        };
        if shortest >= short_edge_ratio * longest {
            break;
        }

        let (a, b) = (polygon[j], polygon[(j + 1) % n]);
        let (prev, next) = (polygon[(j + n - 1) % n], polygon[(j + 2) % n]);
        match line_intersection(prev, a, b, next) {
            Some(corner) if corner.distance(a) <= 2.0 * longest => {
                polygon[j] = corner;
                polygon.remove((j + 1) % n);
            }
            _ => break,
        }
    }
    polygon
}

/// Move every vertex of `polygon` to the intersection of least-squares lines
/// fitted to the contour points along its two edges.
///
/// Only contour points within `band` pixels of an edge, and away from both of
/// its corners by `trim` of its length, take part in the fit. A vertex stays
/// where it is when the fitted lines meet farther than half its shorter edge
/// away.
pub fn fit_edges(polygon: &[Point], contour: &[Point], band: f32, trim: f32) -> Vec<Point> {
    let n = polygon.len();
    if n < 3 {
        return polygon.to_vec();
    }

    let lines: Vec<(Point, Point)> = (0..n)
        .map(|i| {
            let (a, b) = (polygon[i], polygon[(i + 1) % n]);
            fit_line(a, b, contour, band, trim).unwrap_or((a, b))
        })
        .collect();

    (0..n)
        .map(|i| {
            let prev = (i + n - 1) % n;
            let limit = 0.5
                * polygon[prev]
                    .distance(polygon[i])
                    .min(polygon[i].distance(polygon[(i + 1) % n]));
            let (l0, l1) = (lines[prev], lines[i]);
            match line_intersection(l0.0, l0.1, l1.0, l1.1) {
                Some(corner) if corner.distance(polygon[i]) <= limit => corner,
                _ => polygon[i],
            }
        })
        .collect()
}

/// Principal axis of the contour points supporting edge `a`–`b`.
fn fit_line(a: Point, b: Point, contour: &[Point], band: f32, trim: f32) -> Option<(Point, Point)> {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq == 0.0 {
        return None;
    }
    let support: Vec<Point> = contour
        .iter()
        .copied()
        .filter(|&p| {
            let t = (p - a).dot(ab) / len_sq;
            (trim..=1.0 - trim).contains(&t) && point_segment_distance(p, a, b) <= band
        })
        .collect();
    if support.len() < 3 {
        return None;
    }

    let count = support.len() as f32;
    let mx = support.iter().map(|p| p.x).sum::<f32>() / count;
    let my = support.iter().map(|p| p.y).sum::<f32>() / count;
    let (mut sxx, mut syy, mut sxy) = (0.0f32, 0.0f32, 0.0f32);
    for p in &support {
        let (dx, dy) = (p.x - mx, p.y - my);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let angle = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let origin = Point::new(mx, my);
    Some((origin, origin + Vector::new(angle.cos(), angle.sin())))
}

/// Simplify a closed contour with the Douglas–Peucker algorithm.
///
/// The chain is split at the point farthest from the centroid and at the
/// point farthest from that one, so the result does not depend on where the
/// tracer started. Vertices left nearly collinear with their neighbours after
/// the split are dropped.
///
/// # Arguments
///
/// * `points` - Closed contour, first point not repeated at the end
/// * `epsilon` - Maximum distance between the contour and the simplified polygon
///
/// # Returns
///
/// The simplified polygon's vertices in contour order.
pub fn simplify_closed(points: &[Point], epsilon: f32) -> Vec<Point> {
    let n = points.len();
    if n < 4 {
        return points.to_vec();
    }

    let center = centroid(points);
    let start = farthest_from(points, center);
    let ring: Vec<Point> = points[start..]
        .iter()
        .chain(points[..start].iter())
        .copied()
        .collect();
    let split = farthest_from(&ring, ring[0]);
    if split == 0 {
        return vec![ring[0]];
    }

    let mut first = douglas_peucker(&ring[..=split], epsilon);
    let mut closing: Vec<Point> = ring[split..].to_vec();
    closing.push(ring[0]);
    let second = douglas_peucker(&closing, epsilon);

    // Both halves repeat the split points.
    first.pop();
    first.extend_from_slice(&second[..second.len() - 1]);

    drop_collinear(first, epsilon)
}

fn farthest_from(points: &[Point], origin: Point) -> usize {
    let mut best = 0;
    let mut best_distance = -1.0;
    for (i, p) in points.iter().enumerate() {
        let d = p.distance(origin);
        if d > best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

/// Open-chain Douglas–Peucker keeping both endpoints.
fn douglas_peucker(points: &[Point], epsilon: f32) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end - start <= 1 {
            continue;
        }
        let mut max_distance = 0.0;
        let mut max_index = start;
        for i in (start + 1)..end {
            let d = point_segment_distance(points[i], points[start], points[end]);
            if d > max_distance {
                max_distance = d;
                max_index = i;
            }
        }
        if max_distance > epsilon {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn drop_collinear(mut polygon: Vec<Point>, epsilon: f32) -> Vec<Point> {
    let mut changed = true;
    while changed && polygon.len() > 3 {
        changed = false;
        let n = polygon.len();
        for i in 0..n {
            let prev = polygon[(i + n - 1) % n];
            let next = polygon[(i + 1) % n];
            if point_segment_distance(polygon[i], prev, next) <= epsilon {
                polygon.remove(i);
                changed = true;
                break;
            }
        }
    }
    polygon
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f32) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(side, 0.0),
            Point::new(side, side),
            Point::new(0.0, side),
        ]
    }

    /// Densely sample a closed polygon the way the contour tracer would
    fn densify(polygon: &[Point], step: f32) -> Vec<Point> {
        let mut out = Vec::new();
        for (a, b) in polygon.iter().zip(polygon.iter().cycle().skip(1)) {
            let steps = (a.distance(*b) / step).ceil().max(1.0) as usize;
            for s in 0..steps {
                out.push(a.lerp(*b, s as f32 / steps as f32));
            }
        }
        out
    }

    /// Shoelace area and perimeter of an axis-aligned square
    #[test]
    fn test_area_and_perimeter() {
        let sq = square(10.0);
        assert!((polygon_area(&sq) - 100.0).abs() < 1e-4);
        assert!((perimeter(&sq) - 40.0).abs() < 1e-4);
        let c = centroid(&sq);
        assert!((c.x - 5.0).abs() < 1e-4 && (c.y - 5.0).abs() < 1e-4);
    }

    /// A disc has circularity close to one, a square close to π/4
    #[test]
    fn test_circularity() {
        let circle: Vec<Point> = (0..360)
            .map(|d| {
                let a = (d as f32).to_radians();
                Point::new(50.0 + 20.0 * a.cos(), 50.0 + 20.0 * a.sin())
            })
            .collect();
        let c = circularity(polygon_area(&circle), perimeter(&circle));
        assert!(c > 0.99, "circle circularity {}", c);

        let sq = square(10.0);
        let s = circularity(polygon_area(&sq), perimeter(&sq));
        assert!((s - std::f32::consts::FRAC_PI_4).abs() < 1e-3);
    }

    /// Simplification recovers the corners of a densely sampled triangle
    #[test]
    fn test_simplify_triangle() {
        let triangle = vec![
            Point::new(50.0, 10.0),
            Point::new(90.0, 80.0),
            Point::new(10.0, 80.0),
        ];
        let dense = densify(&triangle, 1.0);
        let simplified = simplify_closed(&dense, 2.0);
        assert_eq!(simplified.len(), 3);
    }

    /// Starting the contour mid-edge does not add a spurious vertex
    #[test]
    fn test_simplify_rotation_of_start() {
        let dense = densify(&square(40.0), 1.0);
        let shifted: Vec<Point> = dense[20..].iter().chain(dense[..20].iter()).copied().collect();
        assert_eq!(simplify_closed(&shifted, 1.5).len(), 4);
    }

    /// Blunt corners of a stroked triangle are pushed back to sharp tips
    #[test]
    fn test_sharpen_blunt_triangle() {
        // Tips cut off by a short edge, plus one nearly straight vertex.
        let blunt = vec![
            Point::new(48.0, 12.0),
            Point::new(52.0, 12.0),
            Point::new(70.0, 45.0),
            Point::new(88.0, 78.0),
            Point::new(12.0, 78.0),
        ];
        let sharp = sharpen_corners(&blunt, 30.0, 0.45);
        assert_eq!(sharp.len(), 3);
        let top = sharp
            .iter()
            .copied()
            .min_by(|a, b| a.y.total_cmp(&b.y))
            .unwrap();
        assert!((top.x - 50.0).abs() < 0.5, "{:?}", top);
        assert!(top.y < 12.0, "{:?}", top);
    }

    /// Fitted edges recover corners that simplification left on the chamfer
    #[test]
    fn test_fit_edges_recovers_corners() {
        let sq = square(40.0);
        let contour = densify(&sq, 1.0);
        // Corners placed on a 4 px chamfer instead of the true corners.
        let rough = vec![
            Point::new(3.0, 0.0),
            Point::new(40.0, 3.0),
            Point::new(37.0, 40.0),
            Point::new(0.0, 37.0),
        ];
        let fitted = fit_edges(&rough, &contour, 3.0, 0.2);
        for (got, want) in fitted.iter().zip(&sq) {
            assert!(got.distance(*want) < 0.5, "{:?} vs {:?}", got, want);
        }
        assert!((polygon_area(&fitted) - 1600.0).abs() < 20.0);
    }

    /// Parallel lines never intersect
    #[test]
    fn test_line_intersection() {
        let x = line_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
        )
        .unwrap();
        assert!(x.distance(Point::new(5.0, 5.0)) < 1e-4);
        assert!(
            line_intersection(
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(0.0, 1.0),
                Point::new(1.0, 1.0)
            )
            .is_none()
        );
    }

    /// Even-odd containment for points inside, outside and around a square
    #[test]
    fn test_point_in_polygon() {
        let sq = square(10.0);
        assert!(point_in_polygon(Point::new(5.0, 5.0), &sq));
        assert!(!point_in_polygon(Point::new(15.0, 5.0), &sq));
        assert!(!point_in_polygon(Point::new(-1.0, -1.0), &sq));
    }

    /// Segment distance clamps to the nearest endpoint
    #[test]
    fn test_point_segment_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!((point_segment_distance(Point::new(5.0, 3.0), a, b) - 3.0).abs() < 1e-5);
        assert!((point_segment_distance(Point::new(13.0, 4.0), a, b) - 5.0).abs() < 1e-5);
    }
}
