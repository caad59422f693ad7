// src/snapshot.rs
//
// Visual snapshots of the frame at selection and firing time. Stored as
// base64 PNG so they can go straight into a classifier request body or an
// output record.

use crate::error::Result;
use crate::types::Frame;
use base64::Engine;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub frame: u64,
    pub width: u32,
    pub height: u32,
    pub png_base64: String,
}

impl Snapshot {
    /// Snapshot of `frame`, or `None` when the frame carries no pixels or
    /// encoding fails. Never fatal: a missing snapshot only means the
    /// collaborator receives nothing to classify.
    pub fn capture(frame: &Frame) -> Option<Self> {
        let image = frame.image.as_ref()?;
        match Self::encode(frame.index, image) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("⚠️  Snapshot of frame {} failed: {}", frame.index, e);
                None
            }
        }
    }

    pub fn encode(frame: u64, image: &RgbImage) -> Result<Self> {
        let mut buf = std::io::Cursor::new(Vec::new());
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image.write_with_encoder(encoder)?;

        Ok(Self {
            frame,
            width: image.width(),
            height: image.height(),
            png_base64: base64::engine::general_purpose::STANDARD.encode(buf.into_inner()),
        })
    }

    pub fn decode(&self) -> Result<RgbImage> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.png_base64)?;
        let image = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)?;
        Ok(image.to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_frame_without_pixels_has_no_snapshot() {
        assert!(Snapshot::capture(&Frame::new(3, 640, 480)).is_none());
    }

    #[test]
    fn test_capture_preserves_pixels() {
        let mut img = RgbImage::new(8, 4);
        img.put_pixel(2, 1, Rgb([200, 10, 30]));
        let frame = Frame::new(42, 8, 4).with_image(img.clone());

        let snap = Snapshot::capture(&frame).unwrap();
        assert_eq!(snap.frame, 42);
        assert_eq!((snap.width, snap.height), (8, 4));
        assert!(!snap.png_base64.is_empty());
        assert_eq!(snap.decode().unwrap(), img);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let snap = Snapshot {
            frame: 0,
            width: 1,
            height: 1,
            png_base64: "!!not base64!!".to_string(),
        };
        assert!(snap.decode().is_err());
    }
}
