//! Hand-drawn style magic circles for tests and benchmarks that run outside
//! the library.

#![allow(dead_code)]

use std::path::Path;

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

const INK: Luma<u8> = Luma([0]);
const PAPER: Luma<u8> = Luma([255]);

pub type At = (f32, f32);

/// White square canvas with a 3 px outer circle.
pub struct Canvas {
    image: GrayImage,
}

impl Canvas {
    pub fn new(size: u32) -> Self {
        let mut canvas = Canvas {
            image: GrayImage::from_pixel(size, size, PAPER),
        };
        let c = size as f32 / 2.0;
        canvas.ring((c, c), 0.45 * size as f32);
        canvas
    }

    pub fn blank(size: u32) -> Self {
        Canvas {
            image: GrayImage::from_pixel(size, size, PAPER),
        }
    }

    pub fn ring(&mut self, at: At, radius: f32) {
        let center = (at.0.round() as i32, at.1.round() as i32);
        for dr in -1..=1 {
            draw_hollow_circle_mut(&mut self.image, center, radius.round() as i32 + dr, INK);
        }
    }

    pub fn double_circle(&mut self, at: At, radius: f32) {
        self.ring(at, radius);
        self.ring(at, 0.6 * radius);
    }

    pub fn star(&mut self, at: At, radius: f32) {
        let vertices: Vec<At> = (0..10)
            .map(|k| {
                let r = if k % 2 == 0 { radius } else { 0.4 * radius };
                let angle = (-90.0 + k as f32 * 36.0_f32).to_radians();
                (at.0 + r * angle.cos(), at.1 + r * angle.sin())
            })
            .collect();
        self.outline(&vertices);
    }

    /// Axis-aligned square with the given circumradius and a dot inside.
    pub fn dotted_square(&mut self, at: At, radius: f32) {
        let h = radius / 2.0_f32.sqrt();
        self.outline(&[
            (at.0 - h, at.1 - h),
            (at.0 + h, at.1 - h),
            (at.0 + h, at.1 + h),
            (at.0 - h, at.1 + h),
        ]);
        draw_filled_circle_mut(
            &mut self.image,
            (at.0.round() as i32, at.1.round() as i32),
            3,
            INK,
        );
    }

    /// Line between the boundaries of two glyphs.
    pub fn link(&mut self, from: At, from_radius: f32, to: At, to_radius: f32) {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let length = (dx * dx + dy * dy).sqrt();
        let (ux, uy) = (dx / length, dy / length);
        let a = (
            from.0 + ux * (from_radius + 2.0),
            from.1 + uy * (from_radius + 2.0),
        );
        let b = (to.0 - ux * (to_radius + 2.0), to.1 - uy * (to_radius + 2.0));
        self.segment(a, b);
    }

    fn outline(&mut self, vertices: &[At]) {
        for (i, &a) in vertices.iter().enumerate() {
            let b = vertices[(i + 1) % vertices.len()];
            self.segment(a, b);
        }
    }

    fn segment(&mut self, a: At, b: At) {
        for dx in [-1.0, 0.0, 1.0] {
            for dy in [-1.0, 0.0, 1.0] {
                draw_line_segment_mut(
                    &mut self.image,
                    (a.0 + dx, a.1 + dy),
                    (b.0 + dx, b.1 + dy),
                    INK,
                );
            }
        }
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn save(&self, path: &Path) {
        self.image.save(path).expect("Failed to write test image");
    }
}

/// Main entry linked to a star, scaled from a 400 px drawing.
pub fn hello_world(size: u32) -> Canvas {
    let scale = size as f32 / 400.0;
    let c = size as f32 / 2.0;
    let mut canvas = Canvas::new(size);
    let (entry, star) = ((c, c - 90.0 * scale), (c, c + 30.0 * scale));
    let r = 28.0 * scale;
    canvas.double_circle(entry, r);
    canvas.star(star, r);
    canvas.link(entry, r, star, r);
    canvas
}

/// Main entry, a square holding 1, and a star printing it.
pub fn assignment(size: u32) -> Canvas {
    let scale = size as f32 / 500.0;
    let c = size as f32 / 2.0;
    let mut canvas = Canvas::new(size);
    let entry = (c, c - 140.0 * scale);
    let square = (c, c - 40.0 * scale);
    let star = (c, c + 70.0 * scale);
    canvas.double_circle(entry, 28.0 * scale);
    canvas.dotted_square(square, 26.0 * scale);
    canvas.star(star, 28.0 * scale);
    canvas.link(entry, 28.0 * scale, square, 26.0 * scale);
    canvas.link(square, 26.0 * scale, star, 28.0 * scale);
    canvas
}
