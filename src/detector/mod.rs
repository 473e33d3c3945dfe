//! Symbol detection over a decoded image.
//!
//! The detector binarises the image, traces every contour, hands the hole
//! borders to the [`ShapeClassifier`] and then resolves what single contours
//! cannot tell on their own:
//!
//! 1. The largest circle spanning most of the image is the outer circle;
//!    concentric decorative rings are absorbed into it.
//! 2. Concentric circle pairs collapse into one double circle, the main entry.
//! 3. Circles enclosing other glyphs are scope containers; every other glyph
//!    has its interior mark read.
//! 4. Glyphs outside the outer circle, and stars too far from its centre, are
//!    discarded.
//!
//! Candidates live in an arena indexed by contour number. Resolution builds
//! new [`Symbol`] values that list their source contours and never mutates the
//! candidates. Per-contour work runs on rayon when [`DetectorConfig::parallel`]
//! is set and is re-sorted into canonical order afterwards, so both modes
//! produce identical output.

use std::cmp::Ordering;

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::classifier::{ClassifierConfig, ShapeClassifier, Silhouette};
use crate::connections::{ConnectionConfig, ConnectionDetector};
use crate::error::{ErrorKind, GrimoireError, Result};
use crate::geometry::{Point, polygon_area};
use crate::symbols::{Connection, Symbol, SymbolKind};

/// Tolerances of the symbol detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Luma below this is ink. `None` picks the level with Otsu's method.
    pub binary_threshold: Option<u8>,
    /// Radius of the morphological closing applied to the ink, 0 disables it.
    pub close_radius: u8,
    /// Contours enclosing less area than this are noise.
    pub min_contour_area: f32,
    /// Minimum outer circle radius, as a fraction of half the smaller image side.
    pub outer_circle_min_ratio: f32,
    /// Concentric rings at least this large relative to the outer circle are
    /// decoration.
    pub outer_ring_ratio: f32,
    /// Maximum centre offset of concentric circles, relative to the larger radius.
    pub concentric_tolerance: f32,
    pub double_circle_min_ratio: f32,
    pub double_circle_max_ratio: f32,
    /// Stars farther than this fraction of the outer radius from its centre
    /// are discarded.
    pub star_proximity: f32,
    pub parallel: bool,
    pub classifier: ClassifierConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            binary_threshold: Some(128),
            close_radius: 1,
            min_contour_area: 50.0,
            outer_circle_min_ratio: 0.5,
            outer_ring_ratio: 0.8,
            concentric_tolerance: 0.15,
            double_circle_min_ratio: 0.4,
            double_circle_max_ratio: 0.9,
            star_proximity: 0.55,
            parallel: true,
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Glyphs found in an image, in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedSymbols {
    pub outer_circle: Symbol,
    pub symbols: Vec<Symbol>,
}

/// Full front-end result: glyphs and the strokes linking them.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub outer_circle: Symbol,
    /// Ordinary symbols; `SymbolId(i)` refers to `symbols[i]`.
    pub symbols: Vec<Symbol>,
    pub connections: Vec<Connection>,
}

/// Ink of a drawing, as thresholded and after closing small gaps.
///
/// Outlines and strokes are traced on `closed`. Interior marks are read from
/// `raw`, where dots drawn close together stay apart.
#[derive(Debug, Clone, PartialEq)]
pub struct InkMask {
    pub raw: GrayImage,
    pub closed: GrayImage,
}

/// A hole contour of the ink, indexed by its position in the tracer output.
struct Candidate {
    index: usize,
    points: Vec<Point>,
}

/// A classified candidate.
struct Classified {
    index: usize,
    silhouette: Silhouette,
}

pub struct SymbolDetector {
    config: DetectorConfig,
    classifier: ShapeClassifier,
    connections: ConnectionDetector,
}

impl SymbolDetector {
    pub fn new(config: DetectorConfig) -> Self {
        SymbolDetector {
            classifier: ShapeClassifier::new(config.classifier.clone()),
            connections: ConnectionDetector::new(ConnectionConfig::default()),
            config,
        }
    }

    pub fn with_connection_config(mut self, config: ConnectionConfig) -> Self {
        self.connections = ConnectionDetector::new(config);
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect glyphs and connections in a decoded image.
    pub fn detect(&self, image: &DynamicImage) -> Result<Detection> {
        let ink = binarize(image, &self.config);
        let DetectedSymbols {
            outer_circle,
            symbols,
        } = self.detect_symbols(&ink)?;
        let connections = self
            .connections
            .detect(&ink.closed, &outer_circle, &symbols)?;

        Ok(Detection {
            outer_circle,
            symbols,
            connections,
        })
    }

    /// Detect glyphs in a binarised image.
    ///
    /// # Errors
    ///
    /// - `NoSymbolsDetected` when the image holds no contour at all, or
    ///   nothing but the outer circle
    /// - `NoOuterCircle` when no circle spans the drawing
    /// - `MissingMainEntry` when there is no double circle
    /// - `InvalidSymbolShape` when there is more than one double circle
    pub fn detect_symbols(&self, ink: &InkMask) -> Result<DetectedSymbols> {
        let arena = self.trace_candidates(&ink.closed);
        if arena.is_empty() {
            return Err(GrimoireError::new(
                ErrorKind::NoSymbolsDetected,
                "no contours found in the image",
            ));
        }

        let classify = |c: &Candidate| {
            self.classifier
                .classify(&c.points)
                .map(|silhouette| Classified {
                    index: c.index,
                    silhouette,
                })
        };
        let mut classified: Vec<Classified> = if self.config.parallel {
            arena.par_iter().filter_map(classify).collect()
        } else {
            arena.iter().filter_map(classify).collect()
        };
        classified.sort_by_key(|c| c.index);
        debug!(
            contours = arena.len(),
            classified = classified.len(),
            "classified contours"
        );

        let (outer_circle, rest) = self.resolve_outer_circle(&ink.closed, classified)?;
        let resolved = self.resolve_double_circles(rest);
        let resolved = self.read_interiors(&ink.raw, &arena, resolved);
        let mut symbols = self.filter_implausible(&outer_circle, resolved);

        if symbols.is_empty() {
            return Err(GrimoireError::new(
                ErrorKind::NoSymbolsDetected,
                "no glyphs found inside the outer circle",
            )
            .with_position(outer_circle.position));
        }

        let entries: Vec<&Symbol> = symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::DoubleCircle)
            .collect();
        match entries.as_slice() {
            [] => {
                return Err(GrimoireError::new(
                    ErrorKind::MissingMainEntry,
                    "no double circle found inside the outer circle",
                ));
            }
            [_] => {}
            [_, second, ..] => {
                return Err(GrimoireError::new(
                    ErrorKind::InvalidSymbolShape,
                    format!("found {} double circles, expected one", entries.len()),
                )
                .with_position(second.position)
                .with_suggestion("Keep a single double circle as the main entry"));
            }
        }

        sort_canonical(&mut symbols, outer_circle.position);
        debug!(symbols = symbols.len(), "detected symbols");

        Ok(DetectedSymbols {
            outer_circle,
            symbols,
        })
    }

    fn trace_candidates(&self, ink: &GrayImage) -> Vec<Candidate> {
        find_contours::<u32>(ink)
            .into_iter()
            .enumerate()
            .filter(|(_, c)| c.border_type == BorderType::Hole)
            .map(|(index, c)| Candidate {
                index,
                points: c.points.into_iter().map(Point::from).collect(),
            })
            .filter(|c| polygon_area(&c.points) >= self.config.min_contour_area)
            .collect()
    }

    /// Pick the outer circle and absorb its decorative rings.
    fn resolve_outer_circle(
        &self,
        ink: &GrayImage,
        classified: Vec<Classified>,
    ) -> Result<(Symbol, Vec<Classified>)> {
        let min_radius =
            self.config.outer_circle_min_ratio * ink.width().min(ink.height()) as f32 / 2.0;

        let outer = classified
            .iter()
            .filter(|c| c.silhouette.kind == SymbolKind::InnerCircle)
            .filter(|c| c.silhouette.size >= min_radius)
            .max_by(|a, b| a.silhouette.size.total_cmp(&b.silhouette.size))
            .map(|c| (c.index, c.silhouette.position, c.silhouette.size));

        let Some((outer_index, center, radius)) = outer else {
            return Err(GrimoireError::new(
                ErrorKind::NoOuterCircle,
                "no circle encloses the drawing",
            )
            .with_details(format!(
                "{} glyph outlines found, none is a circle of radius {:.0} px or more",
                classified.len(),
                min_radius
            )));
        };

        let (ring, rest): (Vec<Classified>, Vec<Classified>) =
            classified.into_iter().partition(|c| {
                c.index == outer_index
                    || (c.silhouette.kind == SymbolKind::InnerCircle
                        && c.silhouette.position.distance(center)
                            <= self.config.concentric_tolerance * radius
                        && c.silhouette.size >= self.config.outer_ring_ratio * radius)
            });

        let mut outer_circle = Symbol::new(SymbolKind::OuterCircle, center, radius);
        outer_circle.sources = ring.iter().map(|c| c.index).collect();
        debug!(
            x = center.x,
            y = center.y,
            radius,
            rings = ring.len(),
            "outer circle"
        );

        Ok((outer_circle, rest))
    }

    /// Collapse concentric circle pairs into double circles.
    fn resolve_double_circles(&self, classified: Vec<Classified>) -> Vec<Resolved> {
        let config = &self.config;
        let mut circles: Vec<usize> = (0..classified.len())
            .filter(|&i| classified[i].silhouette.kind == SymbolKind::InnerCircle)
            .collect();
        circles.sort_by(|&a, &b| {
            classified[b]
                .silhouette
                .size
                .total_cmp(&classified[a].silhouette.size)
                .then(classified[a].index.cmp(&classified[b].index))
        });

        let mut paired = vec![false; classified.len()];
        let mut doubles = Vec::new();
        for (n, &big) in circles.iter().enumerate() {
            if paired[big] {
                continue;
            }
            let outer = &classified[big].silhouette;
            let partner = circles[n + 1..]
                .iter()
                .copied()
                .filter(|&small| !paired[small])
                .filter(|&small| {
                    let inner = &classified[small].silhouette;
                    let ratio = inner.size / outer.size;
                    inner.position.distance(outer.position)
                        <= config.concentric_tolerance * outer.size
                        && (config.double_circle_min_ratio..=config.double_circle_max_ratio)
                            .contains(&ratio)
                })
                .min_by_key(|&small| {
                    OrderedFloat(classified[small].silhouette.position.distance(outer.position))
                });

            if let Some(small) = partner {
                paired[big] = true;
                paired[small] = true;
                doubles.push((big, small));
            }
        }

        let mut resolved: Vec<Resolved> = doubles
            .into_iter()
            .map(|(big, small)| {
                let outer = &classified[big];
                trace!(
                    outer = outer.index,
                    inner = classified[small].index,
                    "double circle"
                );
                let mut symbol = Symbol::new(
                    SymbolKind::DoubleCircle,
                    outer.silhouette.position,
                    outer.silhouette.size,
                );
                symbol.outline = outer.silhouette.outline.clone();
                symbol.sources = vec![outer.index, classified[small].index];
                Resolved {
                    symbol,
                    contour: None,
                }
            })
            .collect();

        resolved.extend(
            classified
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !paired[*i])
                .map(|(_, c)| {
                    let Silhouette {
                        kind,
                        position,
                        size,
                        rotation,
                        outline,
                        ..
                    } = c.silhouette;
                    let mut symbol = Symbol::new(kind, position, size);
                    symbol.rotation = rotation;
                    symbol.outline = outline;
                    symbol.sources = vec![c.index];
                    Resolved {
                        symbol,
                        contour: Some(c.index),
                    }
                }),
        );
        resolved.sort_by_key(|r| r.symbol.sources.first().copied());
        resolved
    }

    /// Read interior marks of every glyph that is not a scope container.
    fn read_interiors(
        &self,
        ink: &GrayImage,
        arena: &[Candidate],
        resolved: Vec<Resolved>,
    ) -> Vec<Symbol> {
        let containers: Vec<bool> = resolved
            .iter()
            .map(|r| {
                r.symbol.kind == SymbolKind::InnerCircle
                    && resolved
                        .iter()
                        .any(|other| other.symbol.is_inside(&r.symbol))
            })
            .collect();

        let read = |(r, container): (Resolved, bool)| {
            let Resolved { mut symbol, contour } = r;
            let Some(index) = contour else {
                return symbol;
            };
            if container {
                trace!(contour = index, "scope container");
                return symbol;
            }
            let Ok(slot) = arena.binary_search_by_key(&index, |c| c.index) else {
                return symbol;
            };

            let interior = self
                .classifier
                .read_interior(ink, &arena[slot].points, &symbol);
            if let Some(operator) = interior.operator {
                symbol.kind = operator;
            }
            symbol.pattern = Some(interior.pattern);
            symbol
        };

        let jobs: Vec<(Resolved, bool)> = resolved.into_iter().zip(containers).collect();
        if self.config.parallel {
            jobs.into_par_iter().map(read).collect()
        } else {
            jobs.into_iter().map(read).collect()
        }
    }

    fn filter_implausible(&self, outer: &Symbol, symbols: Vec<Symbol>) -> Vec<Symbol> {
        let star_limit = self.config.star_proximity * outer.size;
        symbols
            .into_iter()
            .filter(|s| {
                let distance = s.position.distance(outer.position);
                let keep = if distance >= outer.size {
                    false
                } else if s.kind.is_star() {
                    distance <= star_limit
                } else {
                    true
                };
                if !keep {
                    trace!(
                        kind = %s.kind,
                        x = s.position.x,
                        y = s.position.y,
                        distance,
                        "discarded implausible glyph"
                    );
                }
                keep
            })
            .collect()
    }
}

/// A symbol during resolution, with the contour its interior is read from.
struct Resolved {
    symbol: Symbol,
    contour: Option<usize>,
}

/// Ascending distance from `center`, then image scan order.
pub fn canonical_order(a: &Symbol, b: &Symbol, center: Point) -> Ordering {
    let key = |s: &Symbol| {
        (
            OrderedFloat(s.position.distance(center)),
            OrderedFloat(s.position.y),
            OrderedFloat(s.position.x),
        )
    };
    key(a).cmp(&key(b))
}

fn sort_canonical(symbols: &mut [Symbol], center: Point) {
    symbols.sort_by(|a, b| canonical_order(a, b, center));
}

/// Turn an image into ink masks: 255 where the drawing is dark, 0 elsewhere.
///
/// Transparent pixels count as paper.
pub fn binarize(image: &DynamicImage, config: &DetectorConfig) -> InkMask {
    let rgba = image.to_rgba8();
    let mut luma = GrayImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let value = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        let alpha = a as f32 / 255.0;
        let blended = value * alpha + 255.0 * (1.0 - alpha);
        luma.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
    }

    let threshold = config
        .binary_threshold
        .unwrap_or_else(|| otsu_level(&luma));
    let mut ink = GrayImage::new(luma.width(), luma.height());
    for (x, y, pixel) in luma.enumerate_pixels() {
        if pixel[0] < threshold {
            ink.put_pixel(x, y, Luma([255]));
        }
    }

    let closed = if config.close_radius > 0 {
        close(&ink, Norm::LInf, config.close_radius)
    } else {
        ink.clone()
    };
    InkMask { raw: ink, closed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Pattern;
    use crate::test_helpers::*;

    fn detect(sketch: &Sketch, config: DetectorConfig) -> Result<DetectedSymbols> {
        let ink = binarize(&sketch.to_image(), &config);
        SymbolDetector::new(config).detect_symbols(&ink)
    }

    fn kinds(detected: &DetectedSymbols) -> Vec<SymbolKind> {
        let mut kinds: Vec<SymbolKind> = detected.symbols.iter().map(|s| s.kind).collect();
        kinds.sort_by_key(|k| k.name());
        kinds
    }

    /// Entry and star inside an outer circle are found, outer circle apart
    #[test]
    fn test_detect_entry_and_star() {
        let mut sketch = Sketch::new(400);
        sketch.glyph(SymbolKind::DoubleCircle, (200.0, 110.0), 28.0);
        sketch.glyph(SymbolKind::Star, (200.0, 230.0), 28.0);

        let detected = detect(&sketch, DetectorConfig::default()).unwrap();
        assert_eq!(detected.symbols.len(), 2);
        assert_eq!(
            kinds(&detected),
            vec![SymbolKind::DoubleCircle, SymbolKind::Star]
        );
        assert!((detected.outer_circle.position.x - 200.0).abs() < 2.0);
        assert!(detected.outer_circle.size > 170.0);

        let entry = detected
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::DoubleCircle)
            .unwrap();
        assert_eq!(entry.sources.len(), 2);

        let star = &detected.symbols[0];
        assert_eq!(star.kind, SymbolKind::Star);
        assert_eq!(star.pattern, Some(Pattern::Empty));
    }

    /// Every glyph family is recognised from a drawing
    #[test]
    fn test_detect_vocabulary() {
        let mut sketch = Sketch::new(500);
        sketch.glyph(SymbolKind::DoubleCircle, (250.0, 100.0), 28.0);
        sketch.glyph(SymbolKind::Triangle, (150.0, 200.0), 30.0);
        sketch.glyph(SymbolKind::Square, (250.0, 200.0), 28.0);
        sketch.glyph(SymbolKind::Pentagon, (350.0, 200.0), 30.0);
        sketch.glyph(SymbolKind::Hexagon, (150.0, 300.0), 30.0);
        sketch.glyph(SymbolKind::SixPointedStar, (250.0, 300.0), 30.0);
        sketch.glyph(SymbolKind::EightPointedStar, (350.0, 300.0), 30.0);
        sketch.glyph(SymbolKind::ConvergenceNode, (200.0, 390.0), 28.0);
        sketch.glyph(SymbolKind::TextLabel, (300.0, 390.0), 30.0);

        let detected = detect(&sketch, DetectorConfig::default()).unwrap();
        assert_eq!(
            kinds(&detected),
            vec![
                SymbolKind::ConvergenceNode,
                SymbolKind::DoubleCircle,
                SymbolKind::EightPointedStar,
                SymbolKind::Hexagon,
                SymbolKind::Pentagon,
                SymbolKind::SixPointedStar,
                SymbolKind::Square,
                SymbolKind::TextLabel,
                SymbolKind::Triangle,
            ]
        );
    }

    /// Interior marks become patterns
    #[test]
    fn test_detect_patterns() {
        let mut sketch = Sketch::new(400);
        sketch.glyph(SymbolKind::DoubleCircle, (200.0, 100.0), 28.0);
        sketch.glyph(SymbolKind::Square, (140.0, 200.0), 30.0);
        sketch.mark(Pattern::TripleDot, (140.0, 200.0), 30.0);
        sketch.glyph(SymbolKind::InnerCircle, (260.0, 200.0), 28.0);
        sketch.mark(Pattern::Sun, (260.0, 200.0), 28.0);

        let detected = detect(&sketch, DetectorConfig::default()).unwrap();
        let square = detected
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Square)
            .unwrap();
        assert_eq!(square.pattern, Some(Pattern::TripleDot));
        let sun = detected
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::InnerCircle)
            .unwrap();
        assert_eq!(sun.pattern, Some(Pattern::Sun));
    }

    /// Glyphs without an enclosing circle are a structural error
    #[test]
    fn test_no_outer_circle() {
        let mut sketch = Sketch::without_outer(400);
        sketch.glyph(SymbolKind::DoubleCircle, (200.0, 110.0), 28.0);
        sketch.glyph(SymbolKind::Star, (200.0, 230.0), 28.0);
        sketch.glyph(SymbolKind::Square, (120.0, 230.0), 28.0);

        let err = detect(&sketch, DetectorConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoOuterCircle);
    }

    /// A blank page has nothing to detect
    #[test]
    fn test_blank_image() {
        let sketch = Sketch::without_outer(200);
        let err = detect(&sketch, DetectorConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSymbolsDetected);
    }

    /// An outer circle and a star without a double circle has no entry
    #[test]
    fn test_missing_main_entry() {
        let mut sketch = Sketch::new(400);
        sketch.glyph(SymbolKind::Star, (200.0, 200.0), 28.0);

        let err = detect(&sketch, DetectorConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingMainEntry);
    }

    /// Two double circles make the entry ambiguous
    #[test]
    fn test_two_entries() {
        let mut sketch = Sketch::new(400);
        sketch.glyph(SymbolKind::DoubleCircle, (140.0, 200.0), 28.0);
        sketch.glyph(SymbolKind::DoubleCircle, (260.0, 200.0), 28.0);

        let err = detect(&sketch, DetectorConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSymbolShape);
        assert!(err.position().is_some());
    }

    /// A valid star far from the centre is filtered out
    #[test]
    fn test_distant_star_is_discarded() {
        // Outer radius 180, star at 140 px from the centre.
        let mut sketch = Sketch::new(400);
        sketch.glyph(SymbolKind::DoubleCircle, (200.0, 200.0), 28.0);
        sketch.glyph(SymbolKind::Star, (200.0, 340.0), 25.0);

        let detected = detect(&sketch, DetectorConfig::default()).unwrap();
        assert_eq!(kinds(&detected), vec![SymbolKind::DoubleCircle]);

        let relaxed = DetectorConfig {
            star_proximity: 0.9,
            ..DetectorConfig::default()
        };
        let detected = detect(&sketch, relaxed).unwrap();
        assert_eq!(
            kinds(&detected),
            vec![SymbolKind::DoubleCircle, SymbolKind::Star]
        );
        let star = detected
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Star)
            .unwrap();
        assert!(star.position.distance(Point::new(200.0, 340.0)) < 2.0);
    }

    /// Stars and polygons the size of the far star are all recognised
    #[test]
    fn test_small_glyphs_detected() {
        let mut sketch = Sketch::new(400);
        sketch.glyph(SymbolKind::DoubleCircle, (200.0, 200.0), 28.0);
        sketch.glyph(SymbolKind::Star, (200.0, 110.0), 25.0);
        sketch.glyph(SymbolKind::Triangle, (110.0, 200.0), 25.0);
        sketch.glyph(SymbolKind::TextLabel, (290.0, 200.0), 25.0);

        let detected = detect(&sketch, DetectorConfig::default()).unwrap();
        assert_eq!(
            kinds(&detected),
            vec![
                SymbolKind::DoubleCircle,
                SymbolKind::Star,
                SymbolKind::TextLabel,
                SymbolKind::Triangle,
            ]
        );
    }

    /// Glyphs outside the outer circle are ignored
    #[test]
    fn test_outside_glyph_is_discarded() {
        let mut sketch = Sketch::with_outer(500, 180.0);
        sketch.glyph(SymbolKind::DoubleCircle, (250.0, 250.0), 28.0);
        sketch.glyph(SymbolKind::Square, (470.0, 470.0), 20.0);

        let detected = detect(&sketch, DetectorConfig::default()).unwrap();
        assert_eq!(kinds(&detected), vec![SymbolKind::DoubleCircle]);
    }

    /// Parallel and sequential detection agree, order included
    #[test]
    fn test_parallel_matches_sequential() {
        let mut sketch = Sketch::new(500);
        sketch.glyph(SymbolKind::DoubleCircle, (250.0, 100.0), 28.0);
        sketch.glyph(SymbolKind::Triangle, (150.0, 220.0), 30.0);
        sketch.glyph(SymbolKind::Square, (350.0, 220.0), 28.0);
        sketch.mark(Pattern::DoubleDot, (350.0, 220.0), 28.0);
        sketch.glyph(SymbolKind::Star, (250.0, 300.0), 28.0);
        sketch.glyph(SymbolKind::Hexagon, (250.0, 220.0), 30.0);

        let parallel = detect(&sketch, DetectorConfig::default()).unwrap();
        let sequential = detect(
            &sketch,
            DetectorConfig {
                parallel: false,
                ..DetectorConfig::default()
            },
        )
        .unwrap();
        assert_eq!(parallel, sequential);
    }

    /// Symbols are ordered by distance from the centre
    #[test]
    fn test_canonical_order() {
        let mut sketch = Sketch::new(400);
        sketch.glyph(SymbolKind::DoubleCircle, (200.0, 90.0), 28.0);
        sketch.glyph(SymbolKind::Square, (200.0, 200.0), 28.0);
        sketch.glyph(SymbolKind::Triangle, (280.0, 200.0), 28.0);

        let detected = detect(&sketch, DetectorConfig::default()).unwrap();
        let kinds: Vec<SymbolKind> = detected.symbols.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SymbolKind::Square,
                SymbolKind::Triangle,
                SymbolKind::DoubleCircle
            ]
        );
    }

    /// Transparent pixels are paper, dark opaque pixels are ink
    #[test]
    fn test_binarize_alpha() {
        let mut rgba = image::RgbaImage::new(4, 1);
        rgba.put_pixel(0, 0, image::Rgba([0, 0, 0, 255]));
        rgba.put_pixel(1, 0, image::Rgba([0, 0, 0, 0]));
        rgba.put_pixel(2, 0, image::Rgba([255, 255, 255, 255]));
        rgba.put_pixel(3, 0, image::Rgba([40, 40, 40, 255]));
        let config = DetectorConfig {
            close_radius: 0,
            ..DetectorConfig::default()
        };
        let ink = binarize(&DynamicImage::ImageRgba8(rgba), &config);
        let values: Vec<u8> = ink.closed.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![255, 0, 0, 255]);
        assert_eq!(ink.raw, ink.closed);
    }

    /// Closing bridges dots drawn close together, the raw mask keeps them apart
    #[test]
    fn test_marks_read_before_closing() {
        let mut sketch = Sketch::new(400);
        sketch.glyph(SymbolKind::DoubleCircle, (200.0, 100.0), 28.0);
        sketch.glyph(SymbolKind::Square, (200.0, 220.0), 30.0);
        sketch.mark(Pattern::TripleDot, (200.0, 220.0), 30.0);

        let ink = binarize(&sketch.to_image(), &DetectorConfig::default());
        // The middle of the gap between the first two dots.
        let gap = (200 - 5, 220);
        assert_eq!(ink.raw.get_pixel(gap.0, gap.1)[0], 0);
        assert_eq!(ink.closed.get_pixel(gap.0, gap.1)[0], 255);

        let detected = SymbolDetector::new(DetectorConfig::default())
            .detect_symbols(&ink)
            .unwrap();
        let square = detected
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Square)
            .unwrap();
        assert_eq!(square.pattern, Some(Pattern::TripleDot));
    }
}
