// THEORY:
// The overlay is purely cosmetic: it paints the selected object's box onto the
// frame so whoever displays the video can see what is being tracked. Nothing
// in the control loop reads it back.

use crate::core_modules::blob::Blob;
use image::{ImageError, Rgb, RgbImage};
use std::path::Path;

pub const OVERLAY_COLOR: Rgb<u8> = Rgb([160, 255, 160]);
pub const OVERLAY_THICKNESS: u32 = 3;

/// Draws the outline of `blob` into `frame`, growing inward from the box edge.
/// Parts of the box outside the frame are clipped.
pub fn draw_box(frame: &mut RgbImage, blob: &Blob, color: Rgb<u8>, thickness: u32) {
    let (width, height) = frame.dimensions();
    let x_end = blob.x.saturating_add(blob.width).min(width);
    let y_end = blob.y.saturating_add(blob.height).min(height);
    let band_x = thickness.min(blob.width);
    let band_y = thickness.min(blob.height);

    for y in blob.y..y_end {
        for x in blob.x..x_end {
            let on_edge = x < blob.x + band_x
                || x >= blob.x + blob.width - band_x
                || y < blob.y + band_y
                || y >= blob.y + blob.height - band_y;
            if on_edge {
                frame.put_pixel(x, y, color);
            }
        }
    }
}

/// Writes an annotated frame to disk; the format follows the extension.
pub fn save_frame(frame: &RgbImage, path: impl AsRef<Path>) -> Result<(), ImageError> {
    frame.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_leaves_interior_untouched() {
        let mut frame = RgbImage::new(40, 40);
        draw_box(&mut frame, &Blob::new(10, 10, 20, 20), OVERLAY_COLOR, OVERLAY_THICKNESS);

        assert_eq!(frame.get_pixel(10, 10), &OVERLAY_COLOR);
        assert_eq!(frame.get_pixel(12, 20), &OVERLAY_COLOR);
        assert_eq!(frame.get_pixel(29, 29), &OVERLAY_COLOR);
        assert_eq!(frame.get_pixel(13, 13), &Rgb([0, 0, 0]));
        assert_eq!(frame.get_pixel(9, 9), &Rgb([0, 0, 0]));
        assert_eq!(frame.get_pixel(30, 30), &Rgb([0, 0, 0]));
    }

    #[test]
    fn box_past_the_edge_is_clipped() {
        let mut frame = RgbImage::new(16, 16);
        draw_box(&mut frame, &Blob::new(10, 10, 20, 20), OVERLAY_COLOR, OVERLAY_THICKNESS);
        assert_eq!(frame.get_pixel(15, 10), &OVERLAY_COLOR);
        assert_eq!(frame.get_pixel(15, 15), &Rgb([0, 0, 0]));
    }
}
