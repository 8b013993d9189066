// THEORY:
// This file is the entry point for the `chroma_servo` library crate. It keeps
// a camera pointed at a colored object: frames are segmented by color, the
// largest blob becomes the target, and a pan/tilt mount is driven to bring it
// back to the center of the image.
//
// The crate is split in two halves that meet at the `DriveBridge`:
// - `pipeline` is the producer. A video source calls it once per frame and it
//   never blocks on the motors.
// - `servo_loop` is the consumer. A single drive worker turns the latest
//   targets into motor commands over an `ActuatorLink`.
//
// `config` turns a TOML document into the validated runtime configuration,
// and `link` holds the actuator transports.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod link;
pub mod pipeline;
pub mod servo_loop;

pub use config::ServoConfig;
pub use core_modules::blob::Blob;
pub use core_modules::color_filter::{ColorPreset, ColorRange};
pub use core_modules::controller::MotorPowers;
pub use core_modules::motor::{Axis, MotorCommand};
pub use error::{ConfigError, DispatchError, LinkError, ServoError};
pub use link::ActuatorLink;
pub use pipeline::{ControlHandle, PipelineConfig, Report, TrackingPipeline};
pub use servo_loop::ServoLoop;
