//! Stroke templates for operator glyphs.
//!
//! Operator glyphs are circles with a small mark drawn inside (`+`, `÷`, `≤`,
//! `∧`, ...). Marks are not closed shapes, so they are recognised by comparing
//! a coarse occupancy grid of the ink against the same grid rendered from a
//! fixed set of strokes. Template coordinates are normalised to `[-1, 1]²`
//! over the interior square of the glyph, `y` growing downwards.

use serde::{Deserialize, Serialize};

use crate::symbols::{ComparisonOp, LogicOp, SymbolKind};

/// One stroke of a template in normalised coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stroke {
    Line { from: [f32; 2], to: [f32; 2] },
    Dot { at: [f32; 2] },
}

const fn line(x0: f32, y0: f32, x1: f32, y1: f32) -> Stroke {
    Stroke::Line {
        from: [x0, y0],
        to: [x1, y1],
    }
}

const fn dot(x: f32, y: f32) -> Stroke {
    Stroke::Dot { at: [x, y] }
}

/// The plus mark, shared by the convergence glyph and the cross pattern.
pub const PLUS: [Stroke; 2] = [line(-0.8, 0.0, 0.8, 0.0), line(0.0, -0.8, 0.0, 0.8)];

/// A named stroke set identifying one operator glyph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphTemplate {
    pub kind: SymbolKind,
    pub strokes: Vec<Stroke>,
}

impl GlyphTemplate {
    pub fn new(kind: SymbolKind, strokes: &[Stroke]) -> Self {
        GlyphTemplate {
            kind,
            strokes: strokes.to_vec(),
        }
    }
}

/// The built-in operator vocabulary.
pub fn default_templates() -> Vec<GlyphTemplate> {
    use ComparisonOp::*;
    use LogicOp::*;

    vec![
        GlyphTemplate::new(SymbolKind::ConvergenceNode, &PLUS),
        GlyphTemplate::new(SymbolKind::DivergenceNode, &[line(-0.8, 0.0, 0.8, 0.0)]),
        GlyphTemplate::new(
            SymbolKind::AmplificationNode,
            &[line(-0.6, -0.6, 0.6, 0.6), line(-0.6, 0.6, 0.6, -0.6)],
        ),
        GlyphTemplate::new(
            SymbolKind::DistributionNode,
            &[line(-0.8, 0.0, 0.8, 0.0), dot(0.0, -0.55), dot(0.0, 0.55)],
        ),
        GlyphTemplate::new(
            SymbolKind::ComparisonGlyph(Equal),
            &[line(-0.8, -0.45, 0.8, -0.45), line(-0.8, 0.45, 0.8, 0.45)],
        ),
        GlyphTemplate::new(
            SymbolKind::ComparisonGlyph(NotEqual),
            &[
                line(-0.8, -0.45, 0.8, -0.45),
                line(-0.8, 0.45, 0.8, 0.45),
                line(0.5, -0.8, -0.5, 0.8),
            ],
        ),
        GlyphTemplate::new(
            SymbolKind::ComparisonGlyph(Less),
            &[line(0.6, -0.7, -0.6, 0.0), line(-0.6, 0.0, 0.6, 0.7)],
        ),
        GlyphTemplate::new(
            SymbolKind::ComparisonGlyph(Greater),
            &[line(-0.6, -0.7, 0.6, 0.0), line(0.6, 0.0, -0.6, 0.7)],
        ),
        GlyphTemplate::new(
            SymbolKind::ComparisonGlyph(LessEqual),
            &[
                line(0.6, -0.8, -0.6, -0.25),
                line(-0.6, -0.25, 0.6, 0.3),
                line(-0.6, 0.75, 0.6, 0.75),
            ],
        ),
        GlyphTemplate::new(
            SymbolKind::ComparisonGlyph(GreaterEqual),
            &[
                line(-0.6, -0.8, 0.6, -0.25),
                line(0.6, -0.25, -0.6, 0.3),
                line(-0.6, 0.75, 0.6, 0.75),
            ],
        ),
        GlyphTemplate::new(
            SymbolKind::LogicGlyph(And),
            &[line(-0.7, 0.7, 0.0, -0.7), line(0.0, -0.7, 0.7, 0.7)],
        ),
        GlyphTemplate::new(
            SymbolKind::LogicGlyph(Or),
            &[line(-0.7, -0.7, 0.0, 0.7), line(0.0, 0.7, 0.7, -0.7)],
        ),
        GlyphTemplate::new(
            SymbolKind::LogicGlyph(Not),
            &[line(-0.7, -0.2, 0.7, -0.2), line(0.7, -0.2, 0.7, 0.4)],
        ),
        GlyphTemplate::new(
            SymbolKind::LogicGlyph(Xor),
            &[
                line(-0.7, -0.8, 0.0, 0.3),
                line(0.0, 0.3, 0.7, -0.8),
                line(-0.7, 0.75, 0.7, 0.75),
            ],
        ),
    ]
}

/// Coarse binary raster of a glyph interior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    size: usize,
    cells: Vec<bool>,
}

impl OccupancyGrid {
    pub fn empty(size: usize) -> Self {
        OccupancyGrid {
            size,
            cells: vec![false; size * size],
        }
    }

    /// Render template strokes onto a `size` × `size` grid.
    pub fn from_strokes(strokes: &[Stroke], size: usize) -> Self {
        let mut grid = OccupancyGrid::empty(size);
        for stroke in strokes {
            match *stroke {
                Stroke::Dot { at } => grid.mark(at[0], at[1]),
                Stroke::Line { from, to } => {
                    let samples = 4 * size;
                    for s in 0..=samples {
                        let t = s as f32 / samples as f32;
                        grid.mark(
                            from[0] + (to[0] - from[0]) * t,
                            from[1] + (to[1] - from[1]) * t,
                        );
                    }
                }
            }
        }
        grid
    }

    /// Sample ink over the square `center ± half_side`.
    ///
    /// `is_ink(x, y)` reports whether the pixel at integer coordinates holds ink
    /// that belongs to the glyph's interior. A cell is occupied once at least
    /// `min_fill` of its pixels are ink.
    pub fn from_ink<F>(
        center: (f32, f32),
        half_side: f32,
        size: usize,
        min_fill: f32,
        is_ink: F,
    ) -> Self
    where
        F: Fn(i64, i64) -> bool,
    {
        let mut grid = OccupancyGrid::empty(size);
        let cell = 2.0 * half_side / size as f32;
        let (x0, y0) = (center.0 - half_side, center.1 - half_side);

        for row in 0..size {
            for col in 0..size {
                let left = x0 + col as f32 * cell;
                let top = y0 + row as f32 * cell;
                let (mut total, mut ink) = (0usize, 0usize);
                let mut y = top.ceil() as i64;
                while (y as f32) < top + cell {
                    let mut x = left.ceil() as i64;
                    while (x as f32) < left + cell {
                        total += 1;
                        if is_ink(x, y) {
                            ink += 1;
                        }
                        x += 1;
                    }
                    y += 1;
                }
                if total > 0 && ink as f32 / total as f32 >= min_fill {
                    grid.cells[row * size + col] = true;
                }
            }
        }
        grid
    }

    fn mark(&mut self, x: f32, y: f32) {
        let to_cell = |v: f32| {
            let c = ((v + 1.0) / 2.0 * self.size as f32).floor() as i64;
            c.clamp(0, self.size as i64 - 1) as usize
        };
        let (col, row) = (to_cell(x), to_cell(y));
        self.cells[row * self.size + col] = true;
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    fn occupied(&self) -> Vec<(usize, usize)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c)
            .map(|(i, _)| (i / self.size, i % self.size))
            .collect()
    }

    /// Agreement between two grids in `[0, 1]`.
    ///
    /// Every occupied cell of one grid earns 1.0 when the other grid occupies
    /// the same cell, 0.5 when it only occupies a neighbouring one. The score
    /// is the harmonic mean of both directions.
    pub fn score(&self, other: &OccupancyGrid) -> f32 {
        let mine = self.occupied();
        let theirs = other.occupied();
        if mine.is_empty() || theirs.is_empty() {
            return 0.0;
        }

        let proximity = |from: &[(usize, usize)], to: &[(usize, usize)]| {
            from.iter()
                .map(|&(r, c)| {
                    let nearest = to
                        .iter()
                        .map(|&(tr, tc)| r.abs_diff(tr).max(c.abs_diff(tc)))
                        .min()
                        .unwrap_or(usize::MAX);
                    match nearest {
                        0 => 1.0,
                        1 => 0.5,
                        _ => 0.0,
                    }
                })
                .sum::<f32>()
                / from.len() as f32
        };

        let precision = proximity(&mine, &theirs);
        let recall = proximity(&theirs, &mine);
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }
}

/// Best scoring template for an ink grid, if any reaches `threshold`.
pub fn best_match<'a>(
    ink: &OccupancyGrid,
    templates: &'a [GlyphTemplate],
    threshold: f32,
) -> Option<(&'a GlyphTemplate, f32)> {
    let mut best: Option<(&GlyphTemplate, f32)> = None;
    for template in templates {
        let score = ink.score(&OccupancyGrid::from_strokes(&template.strokes, ink.size));
        if score >= threshold && best.is_none_or(|(_, s)| score > s) {
            best = Some((template, score));
        }
    }
    best
}
