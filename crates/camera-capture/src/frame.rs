//! Video frame types

use image::{GrayImage, ImageBuffer, Rgb};

use crate::{CameraError, Resolution};

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a frame from packed RGB data
    pub fn from_rgb(
        data: Vec<u8>,
        width: u32,
        height: u32,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(CameraError::Unsupported(format!(
                "frame buffer of {} bytes does not match {}x{} RGB",
                data.len(),
                width,
                height
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        })
    }

    /// Frame filled with one colour
    pub fn solid(resolution: Resolution, rgb: [u8; 3], timestamp_ns: u64, sequence: u32) -> Self {
        let pixels = resolution.width as usize * resolution.height as usize;
        let data = rgb.iter().copied().cycle().take(pixels * 3).collect();
        Self {
            data,
            width: resolution.width,
            height: resolution.height,
            timestamp_ns,
            sequence,
        }
    }

    /// Frame dimensions
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Raw RGB bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Luminance image, the input format most feature detectors expect
    pub fn to_grayscale(&self) -> GrayImage {
        // Borrowed view; the length is checked at construction
        match ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(self.width, self.height, &self.data[..]) {
            Some(rgb) => image::imageops::grayscale(&rgb),
            None => GrayImage::new(self.width, self.height),
        }
    }
}
