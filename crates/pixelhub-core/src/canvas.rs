//! The shared raster grid and its lazily rebuilt PNG snapshot.

use std::io::Cursor;

use crate::error::{PixelhubError, Result};
use crate::protocol::Rgba;

/// Fixed-size RGBA grid. Mutated only by the broadcast hub; the in-bounds
/// check in [`Canvas::set`] is the sole validation gate on the mutation path.
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
    cache: Option<Vec<u8>>,
}

impl Canvas {
    /// Create a canvas with every pixel transparent black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width as usize) * (height as usize) * 4],
            cache: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(((y as u32 * self.width + x as u32) * 4) as usize)
    }

    /// Apply `color` at `(x, y)`. Out-of-bounds coordinates change nothing
    /// and return false. A successful write invalidates the snapshot cache.
    pub fn set(&mut self, x: i32, y: i32, color: Rgba) -> bool {
        let Some(i) = self.offset(x, y) else {
            return false;
        };
        self.data[i..i + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
        self.cache = None;
        true
    }

    /// Read the color at `(x, y)`, if in bounds.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgba> {
        let i = self.offset(x, y)?;
        Some(Rgba::new(
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ))
    }

    /// Current PNG-encoded snapshot. Re-encodes from the grid only when a
    /// mutation has landed since the last call; otherwise returns the cached
    /// bytes unchanged.
    pub fn snapshot(&mut self) -> Result<Vec<u8>> {
        if let Some(cache) = &self.cache {
            return Ok(cache.clone());
        }

        let mut cursor = Cursor::new(Vec::new());
        image::write_buffer_with_format(
            &mut cursor,
            &self.data,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| PixelhubError::Image(e.to_string()))?;

        let bytes = cursor.into_inner();
        self.cache = Some(bytes.clone());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_canvas_is_transparent() {
        let canvas = Canvas::new(4, 4);
        assert_eq!(canvas.pixel(0, 0), Some(Rgba::TRANSPARENT));
        assert_eq!(canvas.pixel(3, 3), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn test_set_in_bounds() {
        let mut canvas = Canvas::new(4, 4);
        let red = Rgba::new(255, 0, 0, 255);
        assert!(canvas.set(1, 1, red));
        assert_eq!(canvas.pixel(1, 1), Some(red));
        assert_eq!(canvas.pixel(1, 2), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn test_bounds_invariant() {
        let mut canvas = Canvas::new(4, 4);
        let green = Rgba::new(0, 255, 0, 255);
        for (x, y) in [(-1, 0), (0, -1), (4, 0), (0, 4), (9, 9), (i32::MIN, 0)] {
            assert!(!canvas.set(x, y, green), "({x}, {y}) must be rejected");
            assert_eq!(canvas.pixel(x, y), None);
        }
        // Grid unchanged by the rejected writes.
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(canvas.pixel(x, y), Some(Rgba::TRANSPARENT));
            }
        }
    }

    #[test]
    fn test_snapshot_idempotent_without_mutation() {
        let mut canvas = Canvas::new(4, 4);
        let first = canvas.snapshot().unwrap();
        let second = canvas.snapshot().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_snapshot_reflects_set() {
        let mut canvas = Canvas::new(4, 4);
        let before = canvas.snapshot().unwrap();

        assert!(canvas.set(1, 1, Rgba::new(255, 0, 0, 255)));
        let after = canvas.snapshot().unwrap();
        assert_ne!(before, after);

        let decoded = image::load_from_memory(&after).unwrap().into_rgba8();
        assert_eq!(decoded.get_pixel(1, 1).0, [255, 0, 0, 255]);
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_rejected_set_keeps_cache() {
        let mut canvas = Canvas::new(4, 4);
        let before = canvas.snapshot().unwrap();
        assert!(!canvas.set(9, 9, Rgba::new(0, 255, 0, 255)));
        assert_eq!(canvas.snapshot().unwrap(), before);
    }
}
