// THEORY:
// The `BlobDetector` is the engine of the spatial grouping stage. It takes the
// intensity image produced by the color filter and finds the objects in it.
//
// Algorithm:
// 1.  **Raster Seeding**: The image is scanned top-to-bottom, left-to-right.
//     Every non-zero pixel not yet claimed by a region seeds a new one. Because
//     seeds are taken in scan order, region identity is deterministic.
// 2.  **Region Growing**: From the seed, an iterative flood fill claims every
//     non-zero pixel reachable through the 8 neighbours (diagonals included),
//     so a thin diagonal stroke stays one object.
// 3.  **Bounding Box**: The extreme coordinates of the grown region become the
//     blob's box. Individual pixel lists are not kept.
// 4.  **Size Filtering**: Regions whose box is narrower or shorter than the
//     configured minimum are discarded. They are almost always sensor noise or
//     stray pixels that happened to match the color window.
// 5.  **Ranking**: Survivors are ordered by descending box area with a stable
//     sort, so equal areas keep their scan order.
//
// Like the rest of the spatial layer the detector is stateless between frames.

use crate::core_modules::blob::{Blob, Point};
use crate::error::ConfigError;

pub const DEFAULT_MIN_BLOB_WIDTH: u32 = 25;
pub const DEFAULT_MIN_BLOB_HEIGHT: u32 = 25;

/// The smallest bounding box an object may have to be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinBlobSize {
    width: u32,
    height: u32,
}

impl MinBlobSize {
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::BlobSizeTooSmall { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn admits(&self, blob: &Blob) -> bool {
        blob.width >= self.width && blob.height >= self.height
    }
}

impl Default for MinBlobSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_MIN_BLOB_WIDTH,
            height: DEFAULT_MIN_BLOB_HEIGHT,
        }
    }
}

pub mod blob_detector {
    use super::*;
    use image::GrayImage;

    /// Finds all 8-connected non-zero regions of `image` that pass the size
    /// filter, largest box first. An empty result means "nothing visible".
    pub fn find_blobs(image: &GrayImage, min_size: MinBlobSize) -> Vec<Blob> {
        let (width, height) = image.dimensions();
        let mut visited = vec![false; (width as usize) * (height as usize)];
        let mut blobs: Vec<Blob> = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let index = (y * width + x) as usize;
                if visited[index] || image.get_pixel(x, y).0[0] == 0 {
                    continue;
                }

                let blob = grow_region(image, Point { x, y }, &mut visited);
                if min_size.admits(&blob) {
                    blobs.push(blob);
                }
            }
        }

        // `sort_by` is stable: equal areas keep first-seen order.
        blobs.sort_by(|a, b| b.area().cmp(&a.area()));
        blobs
    }

    /// The top-ranked blob, if any survived filtering.
    pub fn find_largest(image: &GrayImage, min_size: MinBlobSize) -> Option<Blob> {
        find_blobs(image, min_size).into_iter().next()
    }

    /// Iterative flood fill from `seed`; returns the region's bounding box.
    fn grow_region(image: &GrayImage, seed: Point, visited: &mut [bool]) -> Blob {
        let (width, height) = image.dimensions();
        let mut stack: Vec<Point> = vec![seed];
        visited[(seed.y * width + seed.x) as usize] = true;

        let mut min = seed;
        let mut max = seed;

        while let Some(current) = stack.pop() {
            min.x = min.x.min(current.x);
            min.y = min.y.min(current.y);
            max.x = max.x.max(current.x);
            max.y = max.y.max(current.y);

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = current.x as i64 + dx;
                    let ny = current.y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }

                    let (nx, ny) = (nx as u32, ny as u32);
                    let index = (ny * width + nx) as usize;
                    if !visited[index] && image.get_pixel(nx, ny).0[0] != 0 {
                        visited[index] = true;
                        stack.push(Point { x: nx, y: ny });
                    }
                }
            }
        }

        Blob::from_corners(min, max)
    }
}
