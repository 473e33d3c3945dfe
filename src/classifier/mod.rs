//! Shape classification of single contours.
//!
//! The [`ShapeClassifier`] looks at one closed contour at a time and decides
//! which glyph silhouette it is, and then, given the binarised image, what is
//! drawn inside it. It holds no state besides its immutable
//! [`ClassifierConfig`], so one classifier can be shared by every worker of a
//! parallel detection.
//!
//! # Silhouettes
//!
//! A contour that is round with a flat radial profile is a circle. Anything
//! else is simplified with Douglas–Peucker, and the blunt corners left by the
//! stroke width are sharpened before the vertices are counted:
//!
//! - 10, 12 or 16 vertices alternating between two radii form the star family
//! - 3, 5 and 6 regular vertices form triangles, pentagons and hexagons
//! - 4 right angles form a square, or a text label frame when elongated
//!
//! Polygon edges are then refitted to the contour, and the polygon must cover
//! about the same area as the contour. Irregular polygons are rejected, which
//! also drops the regions enclosed by connection lines.
//!
//! # Interiors
//!
//! Ink inside the silhouette is reduced to a [`Pattern`]. Circles carrying a
//! mark that matches one of the [`GlyphTemplate`]s become operator glyphs.

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::geometry::{
    Point, centroid, circularity, fit_edges, perimeter, polygon_area, radial_profile,
    sharpen_corners, simplify_closed, vertex_angle,
};
use crate::symbols::{Pattern, Symbol, SymbolKind};

pub mod interior;
pub mod templates;

pub use interior::InteriorInk;
pub use templates::{GlyphTemplate, OccupancyGrid, Stroke, default_templates};

/// Tolerances of the shape classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Douglas–Peucker tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_ratio: f32,
    /// Lower bound of the Douglas–Peucker tolerance, in pixels.
    pub min_epsilon: f32,
    /// Vertices turning less than this many degrees are dropped.
    pub min_corner_turn: f32,
    /// Edges shorter than this fraction of the longest edge are blunt corners.
    pub short_edge_ratio: f32,
    /// Contour points this close to a polygon edge are fitted to it, in pixels.
    pub edge_fit_band: f32,
    /// Share of an edge's length at either end left out of its fit.
    pub edge_fit_trim: f32,
    /// Number of edge refitting passes.
    pub edge_fit_passes: usize,
    /// Allowed deviation from 1 of the polygon/contour area ratio.
    pub polygon_fill_tolerance: f32,
    /// Allowed relative deviation of a side from the mean side length.
    pub side_tolerance: f32,
    /// Allowed deviation of an interior angle from the regular one, in degrees.
    pub angle_tolerance: f32,
    /// Inner radius of a star must stay below this fraction of the outer one.
    pub star_inner_ratio: f32,
    /// Minimum long/short side ratio of a text label frame.
    pub label_aspect: f32,
    /// Minimum `4πA/P²` of a circle.
    pub circularity_threshold: f32,
    /// Maximum std/mean of a circle's radial profile.
    pub max_radial_spread: f32,
    /// Scale applied to a silhouette before sampling its interior.
    pub interior_shrink: f32,
    /// Interior blobs smaller than this are noise.
    pub min_mark_pixels: usize,
    /// Marks at least this wide, relative to the interior diameter, are discs
    /// rather than dots.
    pub large_mark_ratio: f32,
    pub disc_max_elongation: f32,
    /// Minimum share of its bounding box a disc or dot fills.
    pub disc_min_solidity: f32,
    pub half_disc_min_elongation: f32,
    pub half_disc_max_elongation: f32,
    pub half_disc_min_solidity: f32,
    pub dot_max_elongation: f32,
    pub line_min_elongation: f32,
    /// Share of a template cell's pixels that must be ink for it to count.
    pub template_cell_fill: f32,
    /// Half side of the template square as a fraction of the circle radius.
    pub template_extent: f32,
    /// Resolution of the template occupancy grid.
    pub template_grid: usize,
    /// Minimum template score for an operator glyph.
    pub template_threshold: f32,
    pub templates: Vec<GlyphTemplate>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            approx_epsilon_ratio: 0.02,
            min_epsilon: 1.5,
            min_corner_turn: 30.0,
            short_edge_ratio: 0.45,
            edge_fit_band: 3.0,
            edge_fit_trim: 0.2,
            edge_fit_passes: 2,
            polygon_fill_tolerance: 0.1,
            side_tolerance: 0.3,
            angle_tolerance: 20.0,
            star_inner_ratio: 0.75,
            label_aspect: 1.8,
            circularity_threshold: 0.85,
            max_radial_spread: 0.035,
            interior_shrink: 0.85,
            min_mark_pixels: 4,
            large_mark_ratio: 0.35,
            disc_max_elongation: 1.4,
            disc_min_solidity: 0.5,
            half_disc_min_elongation: 1.6,
            half_disc_max_elongation: 2.6,
            half_disc_min_solidity: 0.6,
            dot_max_elongation: 1.6,
            line_min_elongation: 3.0,
            template_cell_fill: 0.12,
            template_extent: 0.7,
            template_grid: 9,
            template_threshold: 0.7,
            templates: default_templates(),
        }
    }
}

/// Outline-level classification of one contour.
#[derive(Debug, Clone, PartialEq)]
pub struct Silhouette {
    pub kind: SymbolKind,
    pub position: Point,
    pub size: f32,
    pub rotation: f32,
    /// Simplified polygon of the contour.
    pub outline: Vec<Point>,
    pub area: f32,
}

/// What was found inside a silhouette.
#[derive(Debug, Clone, PartialEq)]
pub struct Interior {
    pub pattern: Pattern,
    /// Operator glyph named by a template match, circles only.
    pub operator: Option<SymbolKind>,
}

pub struct ShapeClassifier {
    config: ClassifierConfig,
}

impl ShapeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        ShapeClassifier { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a closed contour.
    ///
    /// # Arguments
    ///
    /// * `contour` - Boundary points in tracing order, not closed explicitly
    ///
    /// # Returns
    ///
    /// The silhouette, or `None` when the contour matches no glyph outline.
    ///
    /// # Example
    ///
    /// ```
    /// use grimoire::classifier::{ClassifierConfig, ShapeClassifier};
    /// use grimoire::geometry::Point;
    /// use grimoire::symbols::SymbolKind;
    ///
    /// let square: Vec<Point> = (0..160)
    ///     .map(|i| {
    ///         let t = (i % 40) as f32;
    ///         match i / 40 {
    ///             0 => Point::new(10.0 + t, 10.0),
    ///             1 => Point::new(50.0, 10.0 + t),
    ///             2 => Point::new(50.0 - t, 50.0),
    ///             _ => Point::new(10.0, 50.0 - t),
    ///         }
    ///     })
    ///     .collect();
    ///
    /// let classifier = ShapeClassifier::new(ClassifierConfig::default());
    /// let silhouette = classifier.classify(&square).unwrap();
    /// assert_eq!(silhouette.kind, SymbolKind::Square);
    /// ```
    pub fn classify(&self, contour: &[Point]) -> Option<Silhouette> {
        if contour.len() < 8 {
            return None;
        }

        let config = &self.config;
        let area = polygon_area(contour);
        let center = centroid(contour);
        let epsilon = (config.approx_epsilon_ratio * perimeter(contour)).max(config.min_epsilon);
        let simplified = simplify_closed(contour, epsilon);

        // Measured on a 1px simplification so the pixel staircase does not
        // inflate the perimeter.
        let smooth = simplify_closed(contour, 1.0);
        let roundness = circularity(area, perimeter(&smooth));
        let (mean_radius, spread) = radial_profile(contour, center);
        if roundness >= config.circularity_threshold
            && mean_radius > 0.0
            && spread / mean_radius <= config.max_radial_spread
        {
            return Some(Silhouette {
                kind: SymbolKind::InnerCircle,
                position: center,
                size: mean_radius,
                rotation: 0.0,
                outline: simplified,
                area,
            });
        }

        let mut polygon = sharpen_corners(
            &simplified,
            config.min_corner_turn,
            config.short_edge_ratio,
        );
        let silhouette = |kind: SymbolKind, polygon: Vec<Point>, rotation: f32| Silhouette {
            kind,
            position: center,
            size: polygon
                .iter()
                .map(|p| p.distance(center))
                .fold(0.0f32, f32::max),
            rotation,
            outline: polygon,
            area,
        };

        if let Some(kind) = self.star_kind(&polygon, center) {
            let points = polygon.len() / 2;
            let rotation = symmetric_rotation(&polygon, center, 360.0 / points as f32);
            return Some(silhouette(kind, polygon, rotation));
        }

        let vertices = polygon.len();
        if !(3..=6).contains(&vertices) {
            trace!(
                vertices,
                roundness,
                x = center.x,
                y = center.y,
                "contour matches no glyph"
            );
            return None;
        }

        for _ in 0..config.edge_fit_passes {
            polygon = fit_edges(&polygon, contour, config.edge_fit_band, config.edge_fit_trim);
        }
        let fill = if area > 0.0 {
            polygon_area(&polygon) / area
        } else {
            0.0
        };
        let kind = if (fill - 1.0).abs() <= config.polygon_fill_tolerance {
            match vertices {
                3 if self.is_regular(&polygon) => Some(SymbolKind::Triangle),
                4 => self.quadrilateral_kind(&polygon),
                5 if self.is_regular(&polygon) => Some(SymbolKind::Pentagon),
                6 if self.is_regular(&polygon) => Some(SymbolKind::Hexagon),
                _ => None,
            }
        } else {
            None
        };

        match kind {
            Some(kind) => {
                let rotation = match kind {
                    SymbolKind::TextLabel => label_rotation(&polygon),
                    _ => symmetric_rotation(&polygon, center, 360.0 / vertices as f32),
                };
                Some(silhouette(kind, polygon, rotation))
            }
            None => {
                trace!(
                    vertices,
                    fill,
                    roundness,
                    x = center.x,
                    y = center.y,
                    "contour matches no glyph"
                );
                None
            }
        }
    }

    /// Read the ink inside a glyph.
    ///
    /// `contour` is the full boundary the glyph was classified from; `ink` is
    /// the binarised image with ink as non-zero pixels.
    pub fn read_interior(&self, ink: &GrayImage, contour: &[Point], glyph: &Symbol) -> Interior {
        let config = &self.config;
        let interior = InteriorInk::sample(ink, contour, glyph.position, config);

        let simple = interior.simple_pattern(config);
        let marked = match simple {
            None => true,
            Some(Pattern::HorizontalLines(_) | Pattern::VerticalLines(_) | Pattern::Lines(_)) => {
                true
            }
            Some(_) => false,
        };

        if marked {
            let half_side = config.template_extent * glyph.size;
            let grid = OccupancyGrid::from_ink(
                (glyph.position.x, glyph.position.y),
                half_side,
                config.template_grid,
                config.template_cell_fill,
                |x, y| interior.is_ink(x, y),
            );

            if glyph.kind == SymbolKind::InnerCircle {
                if let Some((template, score)) =
                    templates::best_match(&grid, &config.templates, config.template_threshold)
                {
                    trace!(kind = %template.kind, score, "operator mark recognised");
                    return Interior {
                        pattern: simple.unwrap_or(Pattern::Complex),
                        operator: Some(template.kind),
                    };
                }
            }

            if simple.is_none() {
                let plus = OccupancyGrid::from_strokes(&templates::PLUS, config.template_grid);
                let pattern = if grid.score(&plus) >= config.template_threshold {
                    Pattern::Cross
                } else {
                    Pattern::Complex
                };
                return Interior {
                    pattern,
                    operator: None,
                };
            }
        }

        Interior {
            pattern: simple.unwrap_or(Pattern::Complex),
            operator: None,
        }
    }

    fn star_kind(&self, polygon: &[Point], center: Point) -> Option<SymbolKind> {
        let kind = match polygon.len() {
            10 => SymbolKind::Star,
            12 => SymbolKind::SixPointedStar,
            16 => SymbolKind::EightPointedStar,
            _ => return None,
        };

        let radii: Vec<f32> = polygon.iter().map(|p| p.distance(center)).collect();
        let (even, odd): (Vec<(usize, f32)>, Vec<(usize, f32)>) =
            radii.iter().copied().enumerate().partition(|(i, _)| i % 2 == 0);
        let min_of = |v: &[(usize, f32)]| v.iter().map(|(_, r)| *r).fold(f32::MAX, f32::min);
        let max_of = |v: &[(usize, f32)]| v.iter().map(|(_, r)| *r).fold(0.0f32, f32::max);

        let (outer_min, inner_max) = if min_of(&even) > max_of(&odd) {
            (min_of(&even), max_of(&odd))
        } else if min_of(&odd) > max_of(&even) {
            (min_of(&odd), max_of(&even))
        } else {
            return None;
        };

        (inner_max < self.config.star_inner_ratio * outer_min).then_some(kind)
    }

    /// Sides and interior angles close to those of the regular polygon.
    fn is_regular(&self, polygon: &[Point]) -> bool {
        let n = polygon.len();
        let regular_angle = 180.0 * (n as f32 - 2.0) / n as f32;
        self.sides_balanced(polygon)
            && (0..n).all(|i| {
                (vertex_angle(polygon, i) - regular_angle).abs() <= self.config.angle_tolerance
            })
    }

    fn sides_balanced(&self, polygon: &[Point]) -> bool {
        let sides = side_lengths(polygon);
        let mean = sides.iter().sum::<f32>() / sides.len() as f32;
        sides
            .iter()
            .all(|s| (s - mean).abs() <= self.config.side_tolerance * mean)
    }

    fn quadrilateral_kind(&self, polygon: &[Point]) -> Option<SymbolKind> {
        let right_angles = (0..4)
            .all(|i| (vertex_angle(polygon, i) - 90.0).abs() <= self.config.angle_tolerance);
        if !right_angles {
            return None;
        }

        if self.sides_balanced(polygon) {
            return Some(SymbolKind::Square);
        }

        let sides = side_lengths(polygon);
        let long = sides.iter().copied().fold(0.0f32, f32::max);
        let short = sides.iter().copied().fold(f32::MAX, f32::min);
        (short > 0.0 && long / short >= self.config.label_aspect).then_some(SymbolKind::TextLabel)
    }
}

fn side_lengths(polygon: &[Point]) -> Vec<f32> {
    polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(a, b)| a.distance(*b))
        .collect()
}

/// Rotation of a glyph whose outer vertices repeat every `period` degrees.
///
/// Zero means a vertex points straight up; the result lies in
/// `[-period / 2, period / 2)`.
fn symmetric_rotation(polygon: &[Point], center: Point, period: f32) -> f32 {
    let Some(top) = polygon
        .iter()
        .max_by(|a, b| a.distance(center).total_cmp(&b.distance(center)))
    else {
        return 0.0;
    };
    let angle = (top.y - center.y).atan2(top.x - center.x).to_degrees() + 90.0;
    wrap(angle, period)
}

/// Direction of a label frame's long side, in `[-90, 90)`.
fn label_rotation(polygon: &[Point]) -> f32 {
    let longest = polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .max_by(|(a, b), (c, d)| a.distance(**b).total_cmp(&c.distance(**d)));
    match longest {
        Some((a, b)) => wrap((b.y - a.y).atan2(b.x - a.x).to_degrees(), 180.0),
        None => 0.0,
    }
}

fn wrap(angle: f32, period: f32) -> f32 {
    let half = period / 2.0;
    (angle + half).rem_euclid(period) - half
}
