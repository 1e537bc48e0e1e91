//! Frame source abstraction
//!
//! Any producer of width/height plus RGBA pixel data can feed the pipeline:
//! a video frame, a decoded still image, or a host-owned canvas buffer.
//! Callers branch on this capability, never on a concrete UI type.

use image::DynamicImage;

/// A producer of RGBA frames
pub trait FrameSource {
    /// Frame width in pixels
    fn width(&self) -> u32;
    /// Frame height in pixels
    fn height(&self) -> u32;
    /// Copy the frame into `target` as tightly-packed RGBA
    ///
    /// `target` is resized to `width * height * 4`.
    fn fill_rgba(&self, target: &mut Vec<u8>);
}

/// An owned RGBA frame
#[derive(Clone, Debug, Default)]
pub struct RgbaFrame {
    /// RGBA pixel data
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RgbaFrame {
    /// Wrap existing RGBA data
    ///
    /// Returns `None` when the buffer length does not match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }

    /// Create a downscaled copy for cheaper inference input
    pub fn downscale(&self, target_width: u32, target_height: u32) -> RgbaFrame {
        if self.width == target_width && self.height == target_height {
            return self.clone();
        }

        let mut output = vec![0u8; (target_width * target_height * 4) as usize];
        let x_ratio = self.width as f32 / target_width as f32;
        let y_ratio = self.height as f32 / target_height as f32;

        for y in 0..target_height {
            for x in 0..target_width {
                let src_x = (x as f32 * x_ratio) as u32;
                let src_y = (y as f32 * y_ratio) as u32;
                let src_idx = ((src_y * self.width + src_x) * 4) as usize;
                let dst_idx = ((y * target_width + x) * 4) as usize;

                if src_idx + 3 < self.data.len() {
                    output[dst_idx..dst_idx + 4].copy_from_slice(&self.data[src_idx..src_idx + 4]);
                }
            }
        }

        RgbaFrame {
            data: output,
            width: target_width,
            height: target_height,
        }
    }
}

impl FrameSource for RgbaFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fill_rgba(&self, target: &mut Vec<u8>) {
        target.clear();
        target.extend_from_slice(&self.data);
    }
}

/// A static image frame
pub struct ImageFrame {
    rgba: image::RgbaImage,
}

impl ImageFrame {
    /// Wrap a decoded image
    pub fn new(image: DynamicImage) -> Self {
        Self {
            rgba: image.to_rgba8(),
        }
    }
}

impl FrameSource for ImageFrame {
    fn width(&self) -> u32 {
        self.rgba.width()
    }

    fn height(&self) -> u32 {
        self.rgba.height()
    }

    fn fill_rgba(&self, target: &mut Vec<u8>) {
        target.clear();
        target.extend_from_slice(self.rgba.as_raw());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, value: u8) -> RgbaFrame {
        RgbaFrame::new(
            vec![value; (width * height * 4) as usize],
            width,
            height,
        )
        .unwrap()
    }

    #[test]
    fn test_rgba_frame_rejects_bad_length() {
        assert!(RgbaFrame::new(vec![0u8; 10], 4, 4).is_none());
        assert!(RgbaFrame::new(vec![0u8; 64], 4, 4).is_some());
    }

    #[test]
    fn test_fill_rgba_matches_source() {
        let frame = solid_frame(4, 2, 7);
        let mut out = Vec::new();
        frame.fill_rgba(&mut out);
        assert_eq!(out.len(), 32);
        assert!(out.iter().all(|&v| v == 7));
    }

    #[test]
    fn test_downscale_halves_dimensions() {
        let frame = solid_frame(8, 8, 200);
        let small = frame.downscale(4, 4);
        assert_eq!(small.width, 4);
        assert_eq!(small.height, 4);
        assert_eq!(small.data.len(), 64);
        assert!(small.data.iter().all(|&v| v == 200));
    }

    #[test]
    fn test_downscale_noop_at_same_size() {
        let frame = solid_frame(4, 4, 3);
        let same = frame.downscale(4, 4);
        assert_eq!(same.data, frame.data);
    }

    #[test]
    fn test_image_frame_source() {
        let img = DynamicImage::new_rgba8(6, 3);
        let frame = ImageFrame::new(img);
        assert_eq!(frame.width(), 6);
        assert_eq!(frame.height(), 3);
        let mut out = Vec::new();
        frame.fill_rgba(&mut out);
        assert_eq!(out.len(), 6 * 3 * 4);
    }
}
