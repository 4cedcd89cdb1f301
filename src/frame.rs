use crate::error::{ArError, Result};
use crate::transform::Viewport;

/// One captured video frame, tightly packed RGBA8, top row first
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl VideoFrame {
    /// Wraps an RGBA8 buffer, checking its length against the dimensions
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if pixels.len() != expected || width == 0 || height == 0 {
            return Err(ArError::MalformedFrame {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Expands a packed RGB8 buffer to RGBA8
    pub fn from_rgb(width: u32, height: u32, rgb: &[u8]) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 3;
        if rgb.len() != expected {
            return Err(ArError::MalformedFrame {
                expected,
                actual: rgb.len(),
            });
        }
        let pixels = rgb
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect();
        Self::new(width, height, pixels)
    }

    /// Uniform colour frame
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let count = (width as usize) * (height as usize);
        Self::new(width, height, rgba.repeat(count))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA of the pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        Some([
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_wrong_length() {
        let err = VideoFrame::new(4, 4, vec![0; 63]).unwrap_err();
        assert!(matches!(err, ArError::MalformedFrame { expected: 64, actual: 63 }));
    }

    #[test]
    fn new_rejects_empty_frame() {
        assert!(VideoFrame::new(0, 0, Vec::new()).is_err());
    }

    #[test]
    fn from_rgb_adds_opaque_alpha() {
        let frame = VideoFrame::from_rgb(2, 1, &[10, 20, 30, 40, 50, 60]).unwrap();
        assert_eq!(frame.pixels(), &[10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn pixel_lookup_is_bounds_checked() {
        let frame = VideoFrame::solid(3, 2, [1, 2, 3, 4]).unwrap();
        assert_eq!(frame.pixel(2, 1), Some([1, 2, 3, 4]));
        assert_eq!(frame.pixel(3, 0), None);
        assert_eq!(frame.viewport(), Viewport::new(3, 2));
    }
}
