// THEORY:
// `ServoConfig` is the on-disk configuration of the servo, one TOML table per
// concern. Every field has a default, so an empty file (or no file) yields the
// stock tracker: 320x240 at 15 fps, red preset, 25x25 minimum blob, 30 px
// deadband, pan 0.3 / tilt 0.5, turn ratio 80, serial link at 115200 baud.
//
// Parsing only checks shape. Values are checked by `pipeline_config` and
// `validate`, which the runner calls before anything is started.

use crate::core_modules::blob_detector::{DEFAULT_MIN_BLOB_HEIGHT, DEFAULT_MIN_BLOB_WIDTH, MinBlobSize};
use crate::core_modules::color_filter::{ChannelRange, ColorPreset, ColorRange, SegmentMode};
use crate::core_modules::controller::{ControlLaw, DEFAULT_DEADBAND, DEFAULT_PAN_POWER, DEFAULT_TILT_POWER};
use crate::core_modules::motor::DEFAULT_TURN_RATIO;
use crate::error::ConfigError;
use crate::pipeline::PipelineConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Highest frame rate the runner will pace at.
pub const MAX_FRAME_RATE: u32 = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServoConfig {
    pub video: VideoConfig,
    pub detection: DetectionConfig,
    pub control: ControlConfig,
    pub link: LinkConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self { width: 320, height: 240, frame_rate: 15 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionConfig {
    pub enabled: bool,
    pub preset: ColorPreset,
    /// Channel bounds, only consulted with the `custom` preset.
    pub red: [i64; 2],
    pub green: [i64; 2],
    pub blue: [i64; 2],
    pub min_blob_width: u32,
    pub min_blob_height: u32,
    /// Segment the caller's frame in place instead of a copy.
    pub only_objects: bool,
    pub draw_overlay: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preset: ColorPreset::default(),
            red: [0, 255],
            green: [0, 255],
            blue: [0, 255],
            min_blob_width: DEFAULT_MIN_BLOB_WIDTH,
            min_blob_height: DEFAULT_MIN_BLOB_HEIGHT,
            only_objects: false,
            draw_overlay: true,
        }
    }
}

impl DetectionConfig {
    pub fn color_range(&self) -> Result<ColorRange, ConfigError> {
        match self.preset {
            ColorPreset::Custom => Ok(ColorRange::new(
                ChannelRange::from_bounds("red", self.red)?,
                ChannelRange::from_bounds("green", self.green)?,
                ChannelRange::from_bounds("blue", self.blue)?,
            )),
            preset => Ok(preset.range()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    pub tracking: bool,
    pub deadband: u32,
    pub pan_power: f32,
    pub tilt_power: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tracking: true,
            deadband: DEFAULT_DEADBAND,
            pan_power: DEFAULT_PAN_POWER,
            tilt_power: DEFAULT_TILT_POWER,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    pub turn_ratio: i32,
    pub baud_rate: u32,
    /// Read and write timeout on the serial port.
    pub timeout_ms: u64,
    /// Wait for the brick's status reply after every command.
    pub request_reply: bool,
    pub tone_on_connect: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            turn_ratio: DEFAULT_TURN_RATIO as i32,
            baud_rate: 115_200,
            timeout_ms: 1000,
            request_reply: false,
            tone_on_connect: true,
        }
    }
}

impl LinkConfig {
    pub fn turn_ratio(&self) -> Result<i8, ConfigError> {
        if !(-100..=100).contains(&self.turn_ratio) {
            return Err(ConfigError::TurnRatioOutOfRange(self.turn_ratio));
        }
        Ok(self.turn_ratio as i8)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Checks the values used to open the serial port.
    pub fn check_serial(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::ZeroLinkParameter { field: "baud_rate" });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroLinkParameter { field: "timeout_ms" });
        }
        Ok(())
    }
}

impl ServoConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks every value and builds the runtime pipeline configuration.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        if self.video.width == 0 {
            return Err(ConfigError::ZeroVideoParameter { field: "width" });
        }
        if self.video.height == 0 {
            return Err(ConfigError::ZeroVideoParameter { field: "height" });
        }
        if !(1..=MAX_FRAME_RATE).contains(&self.video.frame_rate) {
            return Err(ConfigError::FrameRateOutOfRange {
                value: self.video.frame_rate,
                max: MAX_FRAME_RATE,
            });
        }

        let detection = &self.detection;
        Ok(PipelineConfig {
            image_width: self.video.width,
            image_height: self.video.height,
            detection_enabled: detection.enabled,
            color_range: detection.color_range()?,
            min_blob_size: MinBlobSize::new(detection.min_blob_width, detection.min_blob_height)?,
            segment_mode: if detection.only_objects { SegmentMode::InPlace } else { SegmentMode::Copy },
            draw_overlay: detection.draw_overlay,
            control_law: ControlLaw::new(self.control.deadband, self.control.pan_power, self.control.tilt_power)?,
            tracking: self.control.tracking,
        })
    }

    /// Validates the whole document, link section included.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline_config()?;
        self.link.turn_ratio()?;
        self.link.check_serial()?;
        Ok(())
    }
}
