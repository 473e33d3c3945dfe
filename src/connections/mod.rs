//! Connection detection.
//!
//! Once glyphs are known, whatever ink is left after erasing them is made of
//! connecting strokes. Strokes are split into connected pieces, dashed and
//! dotted runs are merged back into single strokes, and both ends of every
//! stroke are matched against glyph boundaries. A stroke whose end reaches no
//! glyph is an error, never a guess.

use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{ErrorKind, GrimoireError, Result};
use crate::geometry::{Point, Vector};
use crate::symbols::{Connection, Role, StrokeStyle, Symbol, SymbolId, SymbolKind};

/// Tolerances of the connection detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Ink this far around a glyph outline belongs to the glyph.
    pub symbol_margin: f32,
    /// Ink components smaller than this are specks.
    pub min_stroke_pixels: usize,
    /// Largest gap bridged between two dashes of one stroke.
    pub dash_gap: f32,
    /// Largest direction change, in degrees, between merged dashes.
    pub merge_angle: f32,
    /// Dashes shorter than this on average make a dotted stroke.
    pub dot_length: f32,
    pub min_line_length: f32,
    /// Endpoint matching tolerance, added to the stroke width.
    pub endpoint_tolerance: f32,
    /// Length of stroke end examined for an arrowhead.
    pub arrow_window: f32,
    /// Width ratio between a stroke end and its body that marks an arrowhead.
    pub arrow_width_ratio: f32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            symbol_margin: 8.0,
            min_stroke_pixels: 12,
            dash_gap: 14.0,
            merge_angle: 20.0,
            dot_length: 6.0,
            min_line_length: 20.0,
            endpoint_tolerance: 10.0,
            arrow_window: 12.0,
            arrow_width_ratio: 1.8,
        }
    }
}

/// One connected component of stroke ink.
#[derive(Debug, Clone)]
struct Piece {
    pixels: Vec<Point>,
    ends: [Point; 2],
}

impl Piece {
    fn new(pixels: Vec<Point>) -> Option<Piece> {
        let seed = *pixels.first()?;
        let a = farthest(&pixels, seed);
        let b = farthest(&pixels, a);
        Some(Piece {
            pixels,
            ends: [a, b],
        })
    }

    fn length(&self) -> f32 {
        self.ends[0].distance(self.ends[1])
    }
}

fn farthest(pixels: &[Point], from: Point) -> Point {
    pixels
        .iter()
        .copied()
        .max_by_key(|p| OrderedFloat(p.distance(from)))
        .unwrap_or(from)
}

/// Pieces merged into one stroke, with its two far ends.
#[derive(Debug, Clone)]
struct Stroke {
    pieces: Vec<usize>,
    /// Arrowhead wings split off by glyph erasure. Only counted for arrowheads.
    wings: Vec<usize>,
    ends: [Point; 2],
}

impl Stroke {
    fn length(&self) -> f32 {
        self.ends[0].distance(self.ends[1])
    }

    /// Unit direction leaving the stroke through end `i`.
    fn outward(&self, i: usize) -> Vector {
        (self.ends[i] - self.ends[1 - i]).normalize()
    }
}

pub struct ConnectionDetector {
    config: ConnectionConfig,
}

impl ConnectionDetector {
    pub fn new(config: ConnectionConfig) -> Self {
        ConnectionDetector { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Trace the strokes between `symbols`.
    ///
    /// # Arguments
    ///
    /// * `ink` - Binarised image, ink pixels are non-zero
    /// * `outer` - The outer circle; its ring and everything outside it is ignored
    /// * `symbols` - Detected glyphs in canonical order
    ///
    /// # Returns
    ///
    /// Connections sorted by target, then by source position.
    ///
    /// # Errors
    ///
    /// `InvalidConnection` when a stroke end reaches no glyph, or both ends
    /// reach the same glyph.
    pub fn detect(
        &self,
        ink: &GrayImage,
        outer: &Symbol,
        symbols: &[Symbol],
    ) -> Result<Vec<Connection>> {
        let strokes_ink = self.erase_symbols(ink, outer, symbols);
        let pieces = self.pieces(&strokes_ink);
        let strokes = self.attach_wings(&pieces, self.merge(&pieces));
        debug!(
            pieces = pieces.len(),
            strokes = strokes.len(),
            "traced strokes"
        );

        let containers = containers(symbols);
        let mut connections = Vec::new();
        for stroke in &strokes {
            let width = stroke_width(&pieces, stroke);
            let a = self.match_endpoint(stroke.ends[0], width, symbols, &containers)?;
            let b = self.match_endpoint(stroke.ends[1], width, symbols, &containers)?;
            if a == b {
                return Err(GrimoireError::new(
                    ErrorKind::InvalidConnection,
                    format!("both ends of a stroke reach {}", symbols[a].kind),
                )
                .with_position(stroke.ends[0])
                .with_suggestion("Connect the line to two different glyphs"));
            }

            let style = style(&pieces, stroke, self.config.dot_length);
            let arrow = self.arrowhead(&pieces, stroke);
            let (from, to, directed) = match arrow {
                Some(0) => (b, a, true),
                Some(_) => (a, b, true),
                None => {
                    let (from, to) = orient(symbols, a, b, style);
                    (from, to, false)
                }
            };

            let mut connection = Connection::new(SymbolId(from), SymbolId(to)).with_style(style);
            connection.directed = directed;
            trace!(
                from = from,
                to = to,
                style = ?style,
                directed,
                "connection"
            );
            connections.push(connection);
        }

        connections.sort_by_key(|c| {
            let source = symbols[c.from.0].position;
            (c.to, OrderedFloat(source.x), OrderedFloat(source.y), c.from)
        });
        debug!(connections = connections.len(), "detected connections");
        Ok(connections)
    }

    /// Copy of the ink with every glyph and the outer ring removed.
    fn erase_symbols(&self, ink: &GrayImage, outer: &Symbol, symbols: &[Symbol]) -> GrayImage {
        let margin = self.config.symbol_margin;
        let mut strokes = ink.clone();

        let outer_limit = outer.size - margin;
        for (x, y, pixel) in strokes.enumerate_pixels_mut() {
            if Point::new(x as f32, y as f32).distance(outer.position) >= outer_limit {
                *pixel = Luma([0]);
            }
        }

        for (symbol, container) in symbols.iter().zip(containers(symbols)) {
            let reach = symbol.size + margin;
            let x0 = (symbol.position.x - reach).floor().max(0.0) as u32;
            let y0 = (symbol.position.y - reach).floor().max(0.0) as u32;
            let x1 = ((symbol.position.x + reach).ceil() as u32).min(ink.width().saturating_sub(1));
            let y1 =
                ((symbol.position.y + reach).ceil() as u32).min(ink.height().saturating_sub(1));
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let d = Point::new(x as f32, y as f32).distance(symbol.position);
                    let covered = if container {
                        (d - symbol.size).abs() <= margin
                    } else {
                        d <= reach
                    };
                    if covered {
                        strokes.put_pixel(x, y, Luma([0]));
                    }
                }
            }
        }
        strokes
    }

    fn pieces(&self, strokes: &GrayImage) -> Vec<Piece> {
        let labels = connected_components(strokes, Connectivity::Eight, Luma([0u8]));
        let mut groups: BTreeMap<u32, Vec<Point>> = BTreeMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            if label[0] != 0 {
                groups
                    .entry(label[0])
                    .or_default()
                    .push(Point::new(x as f32, y as f32));
            }
        }

        groups
            .into_values()
            .filter(|pixels| pixels.len() >= self.config.min_stroke_pixels)
            .filter_map(Piece::new)
            .collect()
    }

    /// Greedily join the closest compatible stroke ends until none is left.
    fn merge(&self, pieces: &[Piece]) -> Vec<Stroke> {
        let mut strokes: Vec<Stroke> = pieces
            .iter()
            .enumerate()
            .map(|(i, p)| Stroke {
                pieces: vec![i],
                wings: Vec::new(),
                ends: p.ends,
            })
            .collect();

        loop {
            let mut best: Option<(f32, usize, usize, usize, usize)> = None;
            for i in 0..strokes.len() {
                for j in (i + 1)..strokes.len() {
                    for ei in 0..2 {
                        for ej in 0..2 {
                            let gap = strokes[i].ends[ei].distance(strokes[j].ends[ej]);
                            if gap > self.config.dash_gap
                                || !self.aligned(&strokes[i], ei, &strokes[j], ej)
                            {
                                continue;
                            }
                            if best.is_none_or(|(g, ..)| gap < g) {
                                best = Some((gap, i, ei, j, ej));
                            }
                        }
                    }
                }
            }

            let Some((_, i, ei, j, ej)) = best else {
                break;
            };
            let other = strokes.remove(j);
            let stroke = &mut strokes[i];
            stroke.ends = [stroke.ends[1 - ei], other.ends[1 - ej]];
            stroke.pieces.extend(other.pieces);
        }
        strokes
    }

    /// Keep the strokes long enough to be connections.
    ///
    /// A short stroke within `arrow_window` of a connection end is a wing of
    /// an open arrowhead and joins the nearest such stroke; any other short
    /// stroke is ignored.
    fn attach_wings(&self, pieces: &[Piece], strokes: Vec<Stroke>) -> Vec<Stroke> {
        let window = self.config.arrow_window;
        let (mut long, short): (Vec<Stroke>, Vec<Stroke>) = strokes
            .into_iter()
            .partition(|s| s.length() >= self.config.min_line_length);

        for stub in short {
            let pixels: Vec<Point> = stub
                .pieces
                .iter()
                .flat_map(|&p| pieces[p].pixels.iter().copied())
                .collect();
            let nearest = long
                .iter()
                .enumerate()
                .flat_map(|(i, s)| s.ends.iter().map(move |&end| (i, end)))
                .filter_map(|(i, end)| {
                    let d = pixels
                        .iter()
                        .map(|px| px.distance(end))
                        .fold(f32::INFINITY, f32::min);
                    (d <= window).then_some((i, d))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1));

            match nearest {
                Some((i, _)) => long[i].wings.extend(stub.pieces),
                None => trace!(length = stub.length(), "ignoring short stroke"),
            }
        }
        long
    }

    /// Whether end `ei` of `a` continues into end `ej` of `b` in a straight line.
    ///
    /// Strokes shorter than `dot_length` have no reliable direction and only
    /// have to sit on the axis of the other stroke.
    fn aligned(&self, a: &Stroke, ei: usize, b: &Stroke, ej: usize) -> bool {
        let limit = self.config.merge_angle;
        let short = self.config.dot_length;
        let (ea, eb) = (a.ends[ei], b.ends[ej]);
        let lateral = ea.distance(eb) * limit.to_radians().sin() + 3.0;

        let (long_a, long_b) = (a.length() >= short, b.length() >= short);
        if long_a && long_b && a.outward(ei).angle_to(b.outward(ej) * -1.0) > limit {
            return false;
        }

        let continues = |s: &Stroke, i: usize, p: Point| {
            let u = s.outward(i);
            let v = p - s.ends[i];
            v.cross(u).abs() <= lateral && v.dot(u) >= -1.0
        };
        (!long_a || continues(a, ei, eb)) && (!long_b || continues(b, ej, ea))
    }

    /// Index of the glyph whose boundary `end` touches.
    fn match_endpoint(
        &self,
        end: Point,
        width: f32,
        symbols: &[Symbol],
        containers: &[bool],
    ) -> Result<usize> {
        let margin = self.config.symbol_margin;
        let tolerance = self.config.endpoint_tolerance + width;

        symbols
            .iter()
            .zip(containers)
            .enumerate()
            .filter_map(|(i, (s, container))| {
                let d = end.distance(s.position);
                let mut off = (d - (s.size + margin)).abs();
                if *container {
                    off = off.min((d - (s.size - margin)).abs());
                }
                (off <= tolerance).then_some((i, off))
            })
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .ok_or_else(|| {
                GrimoireError::new(
                    ErrorKind::InvalidConnection,
                    "a line ends without reaching a glyph",
                )
                .with_position(end)
            })
    }

    /// End of `stroke` carrying an arrowhead, if any.
    fn arrowhead(&self, pieces: &[Piece], stroke: &Stroke) -> Option<usize> {
        let window = self.config.arrow_window;
        let body = stroke_width(pieces, stroke);
        if body <= 0.0 {
            return None;
        }

        let ratios: Vec<f32> = stroke
            .ends
            .iter()
            .map(|end| {
                let near = stroke
                    .pieces
                    .iter()
                    .chain(&stroke.wings)
                    .flat_map(|&p| pieces[p].pixels.iter())
                    .filter(|px| px.distance(*end) <= window)
                    .count();
                near as f32 / window / body
            })
            .collect();

        (0..2)
            .filter(|&i| ratios[i] >= self.config.arrow_width_ratio)
            .max_by(|&a, &b| ratios[a].total_cmp(&ratios[b]))
    }
}

/// Glyphs that enclose other glyphs. Strokes may leave them from the inside.
fn containers(symbols: &[Symbol]) -> Vec<bool> {
    symbols
        .iter()
        .map(|s| {
            s.kind == SymbolKind::InnerCircle && symbols.iter().any(|other| other.is_inside(s))
        })
        .collect()
}

/// Typical width of a stroke's body, its ends excluded when it is long enough.
fn stroke_width(pieces: &[Piece], stroke: &Stroke) -> f32 {
    let pixels: Vec<&Point> = stroke
        .pieces
        .iter()
        .flat_map(|&p| pieces[p].pixels.iter())
        .collect();
    let length: f32 = stroke.pieces.iter().map(|&p| pieces[p].length().max(1.0)).sum();

    let trim = stroke.length() / 4.0;
    if stroke.pieces.len() == 1 && trim >= 3.0 {
        let body = pixels
            .iter()
            .filter(|p| p.distance(stroke.ends[0]) > trim && p.distance(stroke.ends[1]) > trim)
            .count();
        return body as f32 / (stroke.length() - 2.0 * trim);
    }
    pixels.len() as f32 / length
}

fn style(pieces: &[Piece], stroke: &Stroke, dot_length: f32) -> StrokeStyle {
    if stroke.pieces.len() < 2 {
        return StrokeStyle::Solid;
    }
    let mean = stroke.pieces.iter().map(|&p| pieces[p].length()).sum::<f32>()
        / stroke.pieces.len() as f32;
    if mean < dot_length {
        StrokeStyle::Dotted
    } else {
        StrokeStyle::Dashed
    }
}

/// Direction of an undirected stroke between glyphs `a` and `b`.
fn orient(symbols: &[Symbol], a: usize, b: usize, style: StrokeStyle) -> (usize, usize) {
    let (sa, sb) = (&symbols[a], &symbols[b]);
    let is_operand = |s: &Symbol| matches!(s.kind, SymbolKind::Square | SymbolKind::TextLabel);

    if sa.kind == SymbolKind::DoubleCircle {
        return (a, b);
    }
    if sb.kind == SymbolKind::DoubleCircle {
        return (b, a);
    }
    if is_operand(sa) && sb.kind.is_operator() {
        return (a, b);
    }
    if is_operand(sb) && sa.kind.is_operator() {
        return (b, a);
    }
    match (sa.role(), sb.role()) {
        (Role::Expression, Role::Statement) => return (a, b),
        (Role::Statement, Role::Expression) => return (b, a),
        _ => {}
    }
    if style == StrokeStyle::Dashed {
        if sb.kind == SymbolKind::Pentagon && sa.kind != SymbolKind::Pentagon {
            return (a, b);
        }
        if sa.kind == SymbolKind::Pentagon && sb.kind != SymbolKind::Pentagon {
            return (b, a);
        }
    }

    let delta = sb.position - sa.position;
    let forward = if delta.y.abs() >= delta.x.abs() {
        delta.y > 0.0
    } else {
        delta.x > 0.0
    };
    if forward { (a, b) } else { (b, a) }
}
