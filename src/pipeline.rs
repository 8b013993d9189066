// THEORY:
// The `pipeline` module is the producer half of the servo. `TrackingPipeline`
// is what a video source calls once per decoded frame. Each call runs the
// whole detection chain synchronously and hands its verdict to the drive
// worker through the bridge, without ever waiting for it.
//
// Stages, per frame:
// 0.  Apply any configuration messages that arrived since the last frame. A
//     message carries a complete value (a whole `ColorRange`, both blob
//     minimums), so a pass never sees a half-updated setting.
// 1.  Color segmentation (copy or in place).
// 2.  Blob detection on the intensity image; the largest blob is the target.
// 3.  Optional overlay of the target box onto the caller's frame.
// 4.  The controller's decision is published to the bridge, and the bridge is
//     signalled exactly once, whether or not anything changed.
//
// Configuration arrives as `ControlMessage`s from any number of `ControlHandle`
// clones. Manual pan/tilt bypasses the frame path entirely and writes straight
// to the bridge, so joystick input is not held hostage by the frame rate.

use crate::core_modules::blob::Blob;
use crate::core_modules::blob_detector::{MinBlobSize, blob_detector};
use crate::core_modules::bridge::DriveBridge;
use crate::core_modules::color_filter::{ColorFilter, ColorPreset, ColorRange, SegmentMode};
use crate::core_modules::controller::{CenteringError, ControlLaw, MotorPowers, TrackingController};
use crate::core_modules::overlay::{self, OVERLAY_COLOR, OVERLAY_THICKNESS};
use crate::error::ConfigError;
use image::RgbImage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Validated runtime configuration for the tracking pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub image_width: u32,
    pub image_height: u32,
    pub detection_enabled: bool,
    pub color_range: ColorRange,
    pub min_blob_size: MinBlobSize,
    pub segment_mode: SegmentMode,
    pub draw_overlay: bool,
    pub control_law: ControlLaw,
    pub tracking: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_width: 320,
            image_height: 240,
            detection_enabled: true,
            color_range: ColorRange::default(),
            min_blob_size: MinBlobSize::default(),
            segment_mode: SegmentMode::Copy,
            draw_overlay: true,
            control_law: ControlLaw::default(),
            tracking: true,
        }
    }
}

/// Runtime configuration changes, applied before the next frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    SetColorRange(ColorRange),
    SetMinBlobSize(MinBlobSize),
    SetDetection(bool),
    SetTracking(bool),
    SetSegmentMode(SegmentMode),
    SetOverlay(bool),
}

/// Details of a frame in which an object was selected.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetData {
    pub target: Blob,
    /// How many blobs survived the size filter.
    pub candidates: usize,
    pub error: CenteringError,
    pub powers: MotorPowers,
}

/// The outcome of one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// Detection is switched off; nothing was published or signalled.
    DetectionDisabled,
    /// No blob survived filtering. `powers` is what was published, or `None`
    /// if the targets were left as they were.
    NotVisible { powers: Option<MotorPowers> },
    Target(TargetData),
}

impl Report {
    /// The box to render, if any.
    pub fn target(&self) -> Option<&Blob> {
        match self {
            Report::Target(data) => Some(&data.target),
            _ => None,
        }
    }
}

pub struct TrackingPipeline {
    config: PipelineConfig,
    color_filter: ColorFilter,
    controller: TrackingController,
    bridge: Arc<DriveBridge>,
    messages: mpsc::UnboundedReceiver<ControlMessage>,
    frame_count: u64,
}

impl TrackingPipeline {
    /// Builds a pipeline publishing into `bridge`, plus the handle used to
    /// reconfigure it.
    pub fn new(config: PipelineConfig, bridge: Arc<DriveBridge>) -> (Self, ControlHandle) {
        let (sender, messages) = mpsc::unbounded_channel();
        let control = ControlHandle { sender, bridge: bridge.clone() };
        let pipeline = Self {
            color_filter: ColorFilter::new(config.color_range),
            controller: TrackingController::new(config.control_law, config.tracking),
            config,
            bridge,
            messages,
            frame_count: 0,
        };
        (pipeline, control)
    }

    /// Runs detection on one frame and publishes the tracking decision.
    ///
    /// The frame is only borrowed for the duration of the call. It is
    /// modified when in-place segmentation or the overlay is enabled.
    pub fn process_frame(&mut self, frame: &mut RgbImage) -> Report {
        self.apply_pending_messages();
        self.frame_count += 1;

        if !self.config.detection_enabled {
            return Report::DetectionDisabled;
        }

        let intensity = self.color_filter.segment(frame, self.config.segment_mode);
        let blobs = blob_detector::find_blobs(&intensity, self.config.min_blob_size);
        let target = blobs.first().copied();

        if let (Some(blob), true) = (target, self.config.draw_overlay) {
            overlay::draw_box(frame, &blob, OVERLAY_COLOR, OVERLAY_THICKNESS);
        }

        let (width, height) = frame.dimensions();
        let decision = self.controller.decide(width, height, target.as_ref());
        match decision {
            Some(powers) => self.bridge.publish(powers),
            None => self.bridge.signal(),
        }

        trace!(frame = self.frame_count, candidates = blobs.len(), ?decision, "frame processed");

        match target {
            Some(target) => Report::Target(TargetData {
                target,
                candidates: blobs.len(),
                error: CenteringError::measure(width, height, &target),
                powers: decision.unwrap_or(MotorPowers::STOP),
            }),
            None => Report::NotVisible { powers: decision },
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn apply_pending_messages(&mut self) {
        while let Ok(message) = self.messages.try_recv() {
            debug!(?message, "applying control message");
            match message {
                ControlMessage::SetColorRange(range) => {
                    self.config.color_range = range;
                    self.color_filter.set_range(range);
                }
                ControlMessage::SetMinBlobSize(size) => self.config.min_blob_size = size,
                ControlMessage::SetDetection(enabled) => self.config.detection_enabled = enabled,
                ControlMessage::SetTracking(enabled) => {
                    self.config.tracking = enabled;
                    self.controller.set_tracking(enabled);
                }
                ControlMessage::SetSegmentMode(mode) => self.config.segment_mode = mode,
                ControlMessage::SetOverlay(enabled) => self.config.draw_overlay = enabled,
            }
        }
    }
}

/// Cloneable handle for reconfiguring a running pipeline and for manual
/// axis control.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    sender: mpsc::UnboundedSender<ControlMessage>,
    bridge: Arc<DriveBridge>,
}

impl ControlHandle {
    /// Queues `message` for the next frame. Returns `false` if the pipeline
    /// has been dropped.
    pub fn send(&self, message: ControlMessage) -> bool {
        self.sender.send(message).is_ok()
    }

    pub fn set_color_range(&self, range: ColorRange) -> bool {
        self.send(ControlMessage::SetColorRange(range))
    }

    pub fn set_color_preset(&self, preset: ColorPreset) -> bool {
        self.set_color_range(preset.range())
    }

    pub fn set_min_blob_size(&self, width: u32, height: u32) -> Result<bool, ConfigError> {
        Ok(self.send(ControlMessage::SetMinBlobSize(MinBlobSize::new(width, height)?)))
    }

    pub fn set_detection(&self, enabled: bool) -> bool {
        self.send(ControlMessage::SetDetection(enabled))
    }

    pub fn set_tracking(&self, enabled: bool) -> bool {
        self.send(ControlMessage::SetTracking(enabled))
    }

    /// `true` segments the caller's frame in place, so it shows only objects.
    pub fn set_only_objects(&self, enabled: bool) -> bool {
        let mode = if enabled { SegmentMode::InPlace } else { SegmentMode::Copy };
        self.send(ControlMessage::SetSegmentMode(mode))
    }

    pub fn set_overlay(&self, enabled: bool) -> bool {
        self.send(ControlMessage::SetOverlay(enabled))
    }

    /// Drives pan from a joystick position in [-1, 1]; the motor runs
    /// opposite to the stick.
    pub fn manual_pan(&self, position: f32) {
        let power = -clamp_position(position);
        self.bridge.update(|powers| powers.pan = power);
    }

    /// Drives tilt from a joystick position in [-1, 1].
    pub fn manual_tilt(&self, position: f32) {
        let power = -clamp_position(position);
        self.bridge.update(|powers| powers.tilt = power);
    }
}

fn clamp_position(position: f32) -> f32 {
    if position.is_finite() { position.clamp(-1.0, 1.0) } else { 0.0 }
}
