//! Interior ink analysis.
//!
//! The ink strictly inside a glyph's silhouette is split into connected blobs
//! and summarised into a [`Pattern`]. The silhouette polygon is shrunk towards
//! its centroid first so the glyph's own stroke never counts as content.

use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

use super::ClassifierConfig;
use crate::geometry::{BoundingBox, Point, point_in_polygon, scale_polygon};
use crate::symbols::Pattern;

/// One connected piece of interior ink.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub pixels: usize,
    pub bbox: BoundingBox,
    pub centroid: Point,
}

impl Blob {
    pub fn extent(&self) -> f32 {
        self.bbox.width().max(self.bbox.height())
    }

    pub fn elongation(&self) -> f32 {
        let (w, h) = (self.bbox.width(), self.bbox.height());
        w.max(h) / w.min(h)
    }

    /// Share of the bounding box covered by ink.
    pub fn solidity(&self) -> f32 {
        self.pixels as f32 / (self.bbox.width() * self.bbox.height())
    }
}

/// Ink found inside one glyph.
#[derive(Debug, Clone)]
pub struct InteriorInk {
    origin: (i64, i64),
    local: GrayImage,
    /// Equivalent diameter of the sampled interior.
    pub diameter: f32,
    pub blobs: Vec<Blob>,
}

impl InteriorInk {
    /// Collect the ink inside `boundary`, shrunk towards `center`.
    ///
    /// # Arguments
    ///
    /// * `ink` - Binarised image, ink pixels are non-zero
    /// * `boundary` - Closed silhouette of the glyph
    /// * `center` - Centroid of the silhouette
    /// * `config` - Supplies `interior_shrink` and `min_mark_pixels`
    pub fn sample(
        ink: &GrayImage,
        boundary: &[Point],
        center: Point,
        config: &ClassifierConfig,
    ) -> InteriorInk {
        let mask = scale_polygon(boundary, center, config.interior_shrink);
        let Some(bbox) = BoundingBox::from_points(&mask) else {
            return InteriorInk {
                origin: (0, 0),
                local: GrayImage::new(1, 1),
                diameter: 0.0,
                blobs: Vec::new(),
            };
        };

        let x0 = (bbox.min_x.floor() as i64).max(0);
        let y0 = (bbox.min_y.floor() as i64).max(0);
        let x1 = (bbox.max_x.ceil() as i64).min(ink.width() as i64 - 1);
        let y1 = (bbox.max_y.ceil() as i64).min(ink.height() as i64 - 1);
        let width = (x1 - x0 + 1).max(1) as u32;
        let height = (y1 - y0 + 1).max(1) as u32;

        let mut local = GrayImage::new(width, height);
        let mut mask_area = 0usize;
        for ly in 0..height {
            for lx in 0..width {
                let (x, y) = (x0 + lx as i64, y0 + ly as i64);
                if x > x1 || y > y1 {
                    continue;
                }
                if !point_in_polygon(Point::new(x as f32, y as f32), &mask) {
                    continue;
                }
                mask_area += 1;
                if ink.get_pixel(x as u32, y as u32)[0] > 0 {
                    local.put_pixel(lx, ly, Luma([255]));
                }
            }
        }

        let blobs = blobs(&local, (x0, y0), config.min_mark_pixels);
        InteriorInk {
            origin: (x0, y0),
            local,
            diameter: 2.0 * (mask_area as f32 / std::f32::consts::PI).sqrt(),
            blobs,
        }
    }

    /// Whether the image pixel `(x, y)` is interior ink.
    pub fn is_ink(&self, x: i64, y: i64) -> bool {
        let (lx, ly) = (x - self.origin.0, y - self.origin.1);
        lx >= 0
            && ly >= 0
            && (lx as u32) < self.local.width()
            && (ly as u32) < self.local.height()
            && self.local.get_pixel(lx as u32, ly as u32)[0] > 0
    }

    /// Summarise the blobs into a pattern.
    ///
    /// Returns `None` when the ink is not one of the simple arrangements
    /// (nothing, a disc, a half disc, dots or parallel lines); the caller then
    /// falls back to template matching.
    pub fn simple_pattern(&self, config: &ClassifierConfig) -> Option<Pattern> {
        let blobs = &self.blobs;
        if blobs.is_empty() {
            return Some(Pattern::Empty);
        }

        let large = config.large_mark_ratio * self.diameter;
        if let [blob] = blobs.as_slice() {
            if blob.extent() >= large {
                let elongation = blob.elongation();
                if elongation <= config.disc_max_elongation
                    && blob.solidity() >= config.disc_min_solidity
                {
                    return Some(Pattern::Sun);
                }
                if (config.half_disc_min_elongation..=config.half_disc_max_elongation)
                    .contains(&elongation)
                    && blob.solidity() >= config.half_disc_min_solidity
                {
                    return Some(Pattern::Moon);
                }
            }
        }

        let is_dot = |b: &Blob| {
            b.extent() < large
                && b.elongation() <= config.dot_max_elongation
                && b.solidity() >= config.disc_min_solidity
        };
        if blobs.iter().all(is_dot) {
            return Some(match blobs.len() {
                1 => Pattern::Dot,
                2 => Pattern::DoubleDot,
                3 => Pattern::TripleDot,
                n => Pattern::MultiDot(n),
            });
        }

        if blobs.iter().all(|b| b.elongation() >= config.line_min_elongation) {
            let n = blobs.len();
            let horizontal = |b: &Blob| b.bbox.width() > b.bbox.height();
            return Some(if blobs.iter().all(horizontal) {
                Pattern::HorizontalLines(n)
            } else if blobs.iter().all(|b| !horizontal(b)) {
                Pattern::VerticalLines(n)
            } else {
                Pattern::Lines(n)
            });
        }

        None
    }
}

/// Label 8-connected ink and measure every blob, in label order.
fn blobs(local: &GrayImage, origin: (i64, i64), min_pixels: usize) -> Vec<Blob> {
    let labels = connected_components(local, Connectivity::Eight, Luma([0u8]));

    let mut acc: BTreeMap<u32, (usize, f32, f32, Vec<Point>)> = BTreeMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let p = Point::new((origin.0 + x as i64) as f32, (origin.1 + y as i64) as f32);
        let entry = acc.entry(label).or_insert((0, 0.0, 0.0, Vec::new()));
        entry.0 += 1;
        entry.1 += p.x;
        entry.2 += p.y;
        entry.3.push(p);
    }

    acc.into_values()
        .filter(|(count, ..)| *count >= min_pixels)
        .filter_map(|(count, sx, sy, points)| {
            let bbox = BoundingBox::from_points(&points)?;
            Some(Blob {
                pixels: count,
                bbox,
                centroid: Point::new(sx / count as f32, sy / count as f32),
            })
        })
        .collect()
}
