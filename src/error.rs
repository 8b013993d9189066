// THEORY:
// Every failure the servo can report lives here. There are only three families
// of things that go wrong, and each one is stopped at a different boundary:
//
// 1.  **Configuration** problems are caught when a `ServoConfig` or a runtime
//     `ControlMessage` is validated. They never reach a segmentation pass.
// 2.  **Link** problems come from the actuator transport. The dispatcher wraps
//     them in a `DispatchError` naming the axis, reports them, and keeps going.
// 3.  **Loop** problems (`ServoError`) only show up while tearing the worker
//     down.
//
// "No object visible" is not an error anywhere in the crate.

use crate::core_modules::motor::Axis;
use thiserror::Error;

/// Rejected configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{channel} channel bound {value} is outside 0..=255")]
    ChannelOutOfBounds { channel: &'static str, value: i64 },

    #[error("{channel} channel range is inverted: min {min} > max {max}")]
    InvertedRange { channel: &'static str, min: u8, max: u8 },

    #[error("minimum blob size must be at least 1x1, got {width}x{height}")]
    BlobSizeTooSmall { width: u32, height: u32 },

    #[error("video {field} must be nonzero")]
    ZeroVideoParameter { field: &'static str },

    #[error("frame rate must be within 1..={max} fps, got {value}")]
    FrameRateOutOfRange { value: u32, max: u32 },

    #[error("link {field} must be nonzero")]
    ZeroLinkParameter { field: &'static str },

    #[error("{field} must be a finite value in (0, 1], got {value}")]
    PowerOutOfRange { field: &'static str, value: f32 },

    #[error("turn ratio must be within -100..=100, got {0}")]
    TurnRatioOutOfRange(i32),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("failed to read configuration: {0}")]
    Io(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

/// Transport-level failures raised by an `ActuatorLink`.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("actuator link is disconnected")]
    Disconnected,

    #[error("actuator rejected command 0x{command:02x} with status 0x{status:02x}")]
    Rejected { command: u8, status: u8 },

    #[error("malformed reply from actuator: {0}")]
    MalformedReply(String),

    #[error("failed to open serial port: {0}")]
    Serial(#[from] serialport::Error),

    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A motor command that could not be delivered.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to command motor {axis}: {source}")]
    Link {
        axis: Axis,
        #[source]
        source: LinkError,
    },
}

impl DispatchError {
    pub fn axis(&self) -> Axis {
        match self {
            DispatchError::Link { axis, .. } => *axis,
        }
    }
}

/// Failures of the servo loop as a whole.
#[derive(Error, Debug)]
pub enum ServoError {
    #[error("drive worker terminated abnormally: {0}")]
    WorkerFailed(#[from] tokio::task::JoinError),

    #[error("drive worker already shut down")]
    AlreadyStopped,
}
