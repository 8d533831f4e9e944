use std::sync::Arc;

use crate::foundation::core::PixelSize;
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::math::premultiply_in_place;

/// An immutable premultiplied-alpha RGBA8 frame.
///
/// Pixels are stored row-major from the top-left corner. The buffer is shared, so
/// cloning a frame is cheap; sources hand out the same decoded buffer repeatedly.
#[derive(Clone, Debug)]
pub struct PixelFrame {
    size: PixelSize,
    data: Arc<Vec<u8>>,
}

impl PixelFrame {
    /// Wrap an already-premultiplied RGBA8 buffer. The buffer length must be
    /// `width * height * 4`.
    pub fn from_premul_rgba8(size: PixelSize, data: Vec<u8>) -> MontageResult<Self> {
        let expected = size.area() * 4;
        if data.len() != expected {
            return Err(MontageError::render(format!(
                "frame buffer has {} bytes, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            size,
            data: Arc::new(data),
        })
    }

    /// Wrap a straight-alpha RGBA8 buffer, premultiplying it.
    pub fn from_straight_rgba8(size: PixelSize, mut data: Vec<u8>) -> MontageResult<Self> {
        let expected = size.area() * 4;
        if data.len() != expected {
            return Err(MontageError::render(format!(
                "frame buffer has {} bytes, expected {expected}",
                data.len()
            )));
        }
        premultiply_in_place(&mut data);
        Ok(Self {
            size,
            data: Arc::new(data),
        })
    }

    /// A fully opaque single-color frame.
    pub fn solid(size: PixelSize, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(size.area() * 4);
        for _ in 0..size.area() {
            data.extend_from_slice(&rgba);
        }
        Self {
            size,
            data: Arc::new(data),
        }
    }

    /// Pixel dimensions.
    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// The premultiplied RGBA8 bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The pixel at `(x, y)`, top-left origin. Out-of-bounds reads return transparent black.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.size.width || y >= self.size.height {
            return [0, 0, 0, 0];
        }
        let idx = (y as usize * self.size.width as usize + x as usize) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }
}
