//! Test helpers for drawing synthetic magic circles.
//!
//! Glyphs are drawn the way a person would draw them: dark 3 px outlines on
//! white paper, marks inside, lines between glyph boundaries. Every helper
//! draws into a [`Sketch`], which can then be handed to the detector as a
//! decoded image.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
use imageproc::point::Point as PixelPoint;

use crate::classifier::templates::{PLUS, Stroke, default_templates};
use crate::geometry::{Point, point_segment_distance};
use crate::symbols::{Pattern, SymbolKind};

pub const INK: Luma<u8> = Luma([0]);
pub const PAPER: Luma<u8> = Luma([255]);

/// Half the width of every drawn stroke.
pub const HALF_STROKE: f32 = 1.5;

/// Vertices of a regular polygon; `rotation` 0 puts a vertex straight up.
pub fn regular_polygon(center: Point, radius: f32, sides: usize, rotation: f32) -> Vec<Point> {
    (0..sides)
        .map(|k| {
            let angle = (-90.0 + rotation + k as f32 * 360.0 / sides as f32).to_radians();
            Point::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect()
}

/// Vertices of a star alternating between `outer` and `inner` radius.
pub fn star_polygon(
    center: Point,
    outer: f32,
    inner: f32,
    points: usize,
    rotation: f32,
) -> Vec<Point> {
    (0..2 * points)
        .map(|k| {
            let radius = if k % 2 == 0 { outer } else { inner };
            let angle = (-90.0 + rotation + k as f32 * 180.0 / points as f32).to_radians();
            Point::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect()
}

/// Sample a closed polygon every pixel, like a contour tracer would.
pub fn dense(polygon: &[Point]) -> Vec<Point> {
    let mut out = Vec::new();
    for (a, b) in polygon.iter().zip(polygon.iter().cycle().skip(1)) {
        let steps = a.distance(*b).ceil().max(1.0) as usize;
        for s in 0..steps {
            out.push(a.lerp(*b, s as f32 / steps as f32));
        }
    }
    out
}

/// A drawing in progress.
pub struct Sketch {
    image: GrayImage,
    glyphs: Vec<(Point, f32)>,
}

impl Sketch {
    /// White square canvas with an outer circle of radius `0.45 * size`.
    pub fn new(size: u32) -> Self {
        Sketch::with_outer(size, 0.45 * size as f32)
    }

    pub fn with_outer(size: u32, radius: f32) -> Self {
        let mut sketch = Sketch::without_outer(size);
        let center = size as f32 / 2.0;
        sketch.ring(Point::new(center, center), radius);
        sketch
    }

    pub fn without_outer(size: u32) -> Self {
        Sketch {
            image: GrayImage::from_pixel(size, size, PAPER),
            glyphs: Vec::new(),
        }
    }

    pub fn to_image(&self) -> DynamicImage {
        DynamicImage::ImageLuma8(self.image.clone())
    }

    /// Draw a glyph outline and return its handle for connecting lines.
    pub fn glyph(&mut self, kind: SymbolKind, at: (f32, f32), size: f32) -> usize {
        self.glyph_rotated(kind, at, size, 0.0)
    }

    pub fn glyph_rotated(
        &mut self,
        kind: SymbolKind,
        at: (f32, f32),
        size: f32,
        rotation: f32,
    ) -> usize {
        let c = Point::new(at.0, at.1);
        match kind {
            SymbolKind::OuterCircle | SymbolKind::InnerCircle => self.ring(c, size),
            SymbolKind::DoubleCircle => {
                self.ring(c, size);
                self.ring(c, 0.6 * size);
            }
            SymbolKind::Square => self.outline(&regular_polygon(c, size, 4, 45.0 + rotation)),
            SymbolKind::Triangle => self.outline(&regular_polygon(c, size, 3, rotation)),
            SymbolKind::Pentagon => self.outline(&regular_polygon(c, size, 5, rotation)),
            SymbolKind::Hexagon => self.outline(&regular_polygon(c, size, 6, rotation)),
            SymbolKind::Star => self.outline(&star_polygon(c, size, 0.4 * size, 5, rotation)),
            SymbolKind::SixPointedStar => {
                self.outline(&star_polygon(c, size, 0.4 * size, 6, rotation))
            }
            SymbolKind::EightPointedStar => {
                self.outline(&star_polygon(c, size, 0.4 * size, 8, rotation))
            }
            SymbolKind::TextLabel => {
                let (w, h) = (0.9 * size, 0.35 * size);
                let (sin, cos) = rotation.to_radians().sin_cos();
                let corners: Vec<Point> = [(-w, -h), (w, -h), (w, h), (-w, h)]
                    .iter()
                    .map(|(x, y)| Point::new(c.x + x * cos - y * sin, c.y + x * sin + y * cos))
                    .collect();
                self.outline(&corners);
            }
            operator => {
                self.ring(c, size);
                if let Some(template) = default_templates().into_iter().find(|t| t.kind == operator)
                {
                    self.strokes(&template.strokes, c, 0.7 * size);
                }
            }
        }
        self.glyphs.push((c, size));
        self.glyphs.len() - 1
    }

    /// Draw an interior mark centred in a glyph of the given size.
    pub fn mark(&mut self, pattern: Pattern, at: (f32, f32), size: f32) {
        let c = Point::new(at.0, at.1);
        let dot = (0.1 * size).max(3.0);
        let spread = 0.3 * size;
        match pattern {
            Pattern::Empty => {}
            Pattern::Dot => self.disc(c, dot),
            Pattern::DoubleDot => {
                self.disc(Point::new(c.x - spread, c.y), dot);
                self.disc(Point::new(c.x + spread, c.y), dot);
            }
            Pattern::TripleDot => {
                for dx in [-spread, 0.0, spread] {
                    self.disc(Point::new(c.x + dx, c.y), dot);
                }
            }
            Pattern::MultiDot(n) => {
                for p in regular_polygon(c, 0.35 * size, n, 0.0) {
                    self.disc(p, dot);
                }
            }
            Pattern::HorizontalLines(n) | Pattern::Lines(n) => {
                for k in 0..n {
                    let y = c.y + (k as f32 - (n as f32 - 1.0) / 2.0) * 0.25 * size;
                    self.segment(
                        Point::new(c.x - 0.45 * size, y),
                        Point::new(c.x + 0.45 * size, y),
                    );
                }
            }
            Pattern::VerticalLines(n) => {
                for k in 0..n {
                    let x = c.x + (k as f32 - (n as f32 - 1.0) / 2.0) * 0.25 * size;
                    self.segment(
                        Point::new(x, c.y - 0.45 * size),
                        Point::new(x, c.y + 0.45 * size),
                    );
                }
            }
            Pattern::Cross => self.strokes(&PLUS, c, 0.7 * size),
            Pattern::Sun => self.disc(c, 0.38 * size),
            Pattern::Moon => {
                let r = 0.4 * size;
                self.fill_where(c, r, |p| p.distance(c) <= r && p.y <= c.y);
            }
            Pattern::Complex => {
                let s = 0.4 * size;
                self.segment(Point::new(c.x - s, c.y - s), Point::new(c.x + s, c.y - s));
                self.segment(Point::new(c.x + s, c.y - s), Point::new(c.x - s, c.y + s));
                self.segment(Point::new(c.x - s, c.y + s), Point::new(c.x + s, c.y + s));
            }
        }
    }

    /// Solid line between two glyph boundaries.
    pub fn line(&mut self, from: usize, to: usize) {
        let (a, b) = self.span(from, to);
        self.segment(a, b);
    }

    /// Dashed line between two glyph boundaries.
    pub fn dashed(&mut self, from: usize, to: usize) {
        let (a, b) = self.span(from, to);
        let length = a.distance(b);
        let (dash, gap) = (10.0, 6.0);
        let mut t = 0.0;
        while t < length {
            let end = (t + dash).min(length);
            self.segment(a.lerp(b, t / length), a.lerp(b, end / length));
            t += dash + gap;
        }
    }

    /// Dotted line between two glyph boundaries.
    pub fn dotted(&mut self, from: usize, to: usize) {
        let (a, b) = self.span(from, to);
        let length = a.distance(b);
        let mut t = 2.0;
        while t < length {
            self.disc(a.lerp(b, t / length), 2.0);
            t += 8.0;
        }
    }

    /// Solid line with an arrowhead touching `to`.
    pub fn arrow(&mut self, from: usize, to: usize) {
        let (a, b) = self.span(from, to);
        self.segment(a, b);
        let u = (b - a).normalize();
        let base = b + u * -14.0;
        let normal = crate::geometry::Vector::new(-u.y, u.x);
        let head = [b, base + normal * 6.0, base + normal * -6.0];
        let pixels: Vec<PixelPoint<i32>> = head
            .iter()
            .map(|p| PixelPoint::new(p.x.round() as i32, p.y.round() as i32))
            .collect();
        draw_polygon_mut(&mut self.image, &pixels, INK);
    }

    /// Solid line ending in an open "V" at `to`, whose wings stay clear of the shaft.
    pub fn open_arrow(&mut self, from: usize, to: usize) {
        let (a, b) = self.span(from, to);
        self.segment(a, b);
        let u = (b - a).normalize();
        let normal = crate::geometry::Vector::new(-u.y, u.x);
        let base = b + u * -12.0;
        self.segment(b, base + normal * 10.0);
        self.segment(b, base + normal * -10.0);
    }

    /// Line from a glyph boundary to an arbitrary point.
    pub fn stroke_from(&mut self, from: usize, to: (f32, f32)) {
        let (c, r) = self.glyphs[from];
        let target = Point::new(to.0, to.1);
        let u = (target - c).normalize();
        self.segment(c + u * (r + 2.0), target);
    }

    /// Free-standing stroke between two points.
    pub fn stub(&mut self, from: (f32, f32), to: (f32, f32)) {
        self.segment(Point::new(from.0, from.1), Point::new(to.0, to.1));
    }

    fn span(&self, from: usize, to: usize) -> (Point, Point) {
        let (ca, ra) = self.glyphs[from];
        let (cb, rb) = self.glyphs[to];
        let u = (cb - ca).normalize();
        (ca + u * (ra + 2.0), cb + u * -(rb + 2.0))
    }

    fn ring(&mut self, c: Point, r: f32) {
        self.fill_where(c, r + HALF_STROKE, |p| {
            (p.distance(c) - r).abs() <= HALF_STROKE
        });
    }

    fn outline(&mut self, polygon: &[Point]) {
        for (a, b) in polygon.iter().zip(polygon.iter().cycle().skip(1)) {
            self.segment(*a, *b);
        }
    }

    fn segment(&mut self, a: Point, b: Point) {
        let lo = Point::new(a.x.min(b.x) - 2.0, a.y.min(b.y) - 2.0);
        let hi = Point::new(a.x.max(b.x) + 2.0, a.y.max(b.y) + 2.0);
        self.fill_box(lo, hi, |p| point_segment_distance(p, a, b) <= HALF_STROKE);
    }

    fn strokes(&mut self, strokes: &[Stroke], c: Point, half_side: f32) {
        let at = |v: [f32; 2]| Point::new(c.x + v[0] * half_side, c.y + v[1] * half_side);
        for stroke in strokes {
            match *stroke {
                Stroke::Line { from, to } => self.segment(at(from), at(to)),
                Stroke::Dot { at: p } => self.disc(at(p), (0.12 * half_side).max(2.0)),
            }
        }
    }

    fn disc(&mut self, c: Point, r: f32) {
        draw_filled_circle_mut(
            &mut self.image,
            (c.x.round() as i32, c.y.round() as i32),
            r.round() as i32,
            INK,
        );
    }

    fn fill_where<F: Fn(Point) -> bool>(&mut self, c: Point, reach: f32, inside: F) {
        let lo = Point::new(c.x - reach - 1.0, c.y - reach - 1.0);
        let hi = Point::new(c.x + reach + 1.0, c.y + reach + 1.0);
        self.fill_box(lo, hi, inside);
    }

    fn fill_box<F: Fn(Point) -> bool>(&mut self, lo: Point, hi: Point, inside: F) {
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let x0 = (lo.x.floor() as i64).max(0);
        let y0 = (lo.y.floor() as i64).max(0);
        let x1 = (hi.x.ceil() as i64).min(w - 1);
        let y1 = (hi.y.ceil() as i64).min(h - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                if inside(Point::new(x as f32, y as f32)) {
                    self.image.put_pixel(x as u32, y as u32, INK);
                }
            }
        }
    }
}
