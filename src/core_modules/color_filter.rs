// THEORY:
// The `ColorFilter` is the first stage of the detection chain. It answers a
// single-pixel question: "does this pixel look like the object?" It never
// looks at neighbours; grouping pixels into objects is the blob detector's job.
//
// A pixel is foreground iff every channel falls inside its closed interval.
// Background pixels are painted black, so the later grayscale reduction maps
// them to intensity 0, which is exactly what the blob detector treats as empty.
//
// Two modes exist because the caller sometimes wants to *see* the mask:
// - `SegmentMode::Copy` leaves the caller's frame intact and returns a new one.
// - `SegmentMode::InPlace` rewrites the caller's frame, so whatever renders it
//   shows only the detected objects.
//
// Range validation happens when a `ChannelRange` is built, never during a
// pass. Once a `ColorFilter` exists, segmentation cannot fail.

use crate::error::ConfigError;
use image::{GrayImage, Rgb, RgbImage};
use serde::Deserialize;

/// A validated, closed `min..=max` interval on one 8-bit channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRange {
    min: u8,
    max: u8,
}

impl ChannelRange {
    pub const FULL: ChannelRange = ChannelRange { min: 0, max: 255 };

    pub fn new(channel: &'static str, min: u8, max: u8) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvertedRange { channel, min, max });
        }
        Ok(Self { min, max })
    }

    /// Validates a pair of untyped bounds, as they arrive from a config file.
    pub fn from_bounds(channel: &'static str, bounds: [i64; 2]) -> Result<Self, ConfigError> {
        let to_u8 = |value: i64| {
            u8::try_from(value).map_err(|_| ConfigError::ChannelOutOfBounds { channel, value })
        };
        Self::new(channel, to_u8(bounds[0])?, to_u8(bounds[1])?)
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    #[inline]
    pub fn contains(&self, value: u8) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Per-channel acceptance window for the object's color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    pub red: ChannelRange,
    pub green: ChannelRange,
    pub blue: ChannelRange,
}

impl ColorRange {
    pub fn new(red: ChannelRange, green: ChannelRange, blue: ChannelRange) -> Self {
        Self { red, green, blue }
    }

    /// Accepts every pixel.
    pub fn full() -> Self {
        Self::new(ChannelRange::FULL, ChannelRange::FULL, ChannelRange::FULL)
    }

    #[inline]
    pub fn contains(&self, pixel: &Rgb<u8>) -> bool {
        let [r, g, b] = pixel.0;
        self.red.contains(r) && self.green.contains(g) && self.blue.contains(b)
    }
}

impl Default for ColorRange {
    fn default() -> Self {
        ColorPreset::Red.range()
    }
}

/// The stock color choices of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorPreset {
    #[default]
    Red,
    Blue,
    /// Starts from the full range; the caller supplies the intervals.
    Custom,
}

impl ColorPreset {
    pub fn range(self) -> ColorRange {
        // Literal bounds below are all ordered, so construct directly.
        let r = |min, max| ChannelRange { min, max };
        match self {
            ColorPreset::Red => ColorRange::new(r(140, 255), r(0, 100), r(0, 100)),
            ColorPreset::Blue => ColorRange::new(r(0, 100), r(0, 100), r(100, 255)),
            ColorPreset::Custom => ColorRange::full(),
        }
    }
}

/// Which buffer receives the segmentation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentMode {
    /// Return a new, segmented copy.
    Copy,
    /// Segment the caller's buffer directly.
    InPlace,
}

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Debug, Clone, Default)]
pub struct ColorFilter {
    range: ColorRange,
}

impl ColorFilter {
    pub fn new(range: ColorRange) -> Self {
        Self { range }
    }

    pub fn range(&self) -> &ColorRange {
        &self.range
    }

    /// Replaces the whole range at once. Called between passes only.
    pub fn set_range(&mut self, range: ColorRange) {
        self.range = range;
    }

    /// Returns a copy of `frame` with every out-of-range pixel set to black.
    pub fn apply(&self, frame: &RgbImage) -> RgbImage {
        let mut objects = frame.clone();
        self.apply_in_place(&mut objects);
        objects
    }

    /// Blacks out every out-of-range pixel of `frame`.
    pub fn apply_in_place(&self, frame: &mut RgbImage) {
        for pixel in frame.pixels_mut() {
            if !self.range.contains(pixel) {
                *pixel = BACKGROUND;
            }
        }
    }

    /// Segments `frame` and reduces the result to the single-channel
    /// intensity image consumed by the blob detector.
    pub fn segment(&self, frame: &mut RgbImage, mode: SegmentMode) -> GrayImage {
        match mode {
            SegmentMode::Copy => intensity(&self.apply(frame)),
            SegmentMode::InPlace => {
                self.apply_in_place(frame);
                intensity(frame)
            }
        }
    }
}

/// BT.709 luma reduction of a segmented frame.
pub fn intensity(objects: &RgbImage) -> GrayImage {
    image::imageops::grayscale(objects)
}
