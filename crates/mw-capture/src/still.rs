//! Still-image encoding.
//!
//! Frames arrive in preview orientation, and a user-facing preview is
//! mirrored for natural self-view. Encoding flips those frames back so the
//! stored photo shows the scene as it really is. Rear-facing frames are
//! encoded untouched.

use crate::hardware::{Facing, Frame};
use anyhow::anyhow;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, RgbaImage};

pub const STILL_MIME: &str = "image/jpeg";
pub const JPEG_QUALITY: u8 = 90;

/// Returns the frame in real-world orientation.
pub fn orient(frame: &Frame, facing: Facing) -> anyhow::Result<RgbaImage> {
    let mut image = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone())
        .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
    if facing == Facing::User {
        imageops::flip_horizontal_in_place(&mut image);
    }
    Ok(image)
}

pub fn encode_still(frame: &Frame, facing: Facing) -> anyhow::Result<Bytes> {
    let rgb = DynamicImage::ImageRgba8(orient(frame, facing)?).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(Bytes::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [220, 20, 20, 255];
    const BLUE: [u8; 4] = [20, 20, 220, 255];

    /// Left half red, right half blue, as seen in the preview.
    fn split_frame(width: u32, height: u32) -> Frame {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(if x < width / 2 { &RED } else { &BLUE });
            }
        }
        Frame { width, height, rgba }
    }

    #[test]
    fn user_facing_frames_are_flipped_back() {
        let image = orient(&split_frame(4, 1), Facing::User).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, BLUE);
        assert_eq!(image.get_pixel(3, 0).0, RED);
    }

    #[test]
    fn rear_frames_are_kept_as_is() {
        let image = orient(&split_frame(4, 1), Facing::Environment).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, RED);
        assert_eq!(image.get_pixel(3, 0).0, BLUE);
    }

    #[test]
    fn encoded_selfie_decodes_unmirrored() {
        let jpeg = encode_still(&split_frame(32, 16), Facing::User).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        let left = decoded.get_pixel(4, 8).0;
        let right = decoded.get_pixel(27, 8).0;
        assert!(left[2] > 150 && left[0] < 100, "left should be blue, got {left:?}");
        assert!(right[0] > 150 && right[2] < 100, "right should be red, got {right:?}");
    }

    #[test]
    fn short_buffers_are_rejected() {
        let frame = Frame {
            width: 4,
            height: 4,
            rgba: vec![0; 8],
        };
        assert!(encode_still(&frame, Facing::Environment).is_err());
    }
}
