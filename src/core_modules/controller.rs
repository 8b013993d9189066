// THEORY:
// The `TrackingController` closes the loop between "where is the object" and
// "which way should the motors turn". It is a pair of independent, two-level
// (bang-bang) controllers with a deadband: each axis is either stopped or
// driven at one fixed speed toward the object. There is no proportional term,
// no integral and no smoothing. The mount is slow and the frame rate is low, so
// a fixed crawl toward the target plus a generous deadband is enough to keep
// the object in view without oscillating.
//
// Sign conventions:
// - `offset_x` is positive when the object is right of center. Panning right
//   needs a negative motor power on this mount, hence the minus sign.
// - `offset_y` is positive when the object is *above* center. Image rows grow
//   downward, so the row difference is flipped before use.

use crate::core_modules::blob::Blob;
use crate::error::ConfigError;

pub const DEFAULT_DEADBAND: u32 = 30;
pub const DEFAULT_PAN_POWER: f32 = 0.3;
pub const DEFAULT_TILT_POWER: f32 = 0.5;

/// Requested motor powers, always read and written as one pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorPowers {
    pub pan: f32,
    pub tilt: f32,
}

impl MotorPowers {
    pub const STOP: MotorPowers = MotorPowers { pan: 0.0, tilt: 0.0 };

    pub fn new(pan: f32, tilt: f32) -> Self {
        Self { pan, tilt }
    }
}

/// Signed distance of the object's center from the frame center, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CenteringError {
    /// Positive = right of center.
    pub offset_x: i64,
    /// Positive = above center.
    pub offset_y: i64,
}

impl CenteringError {
    pub fn measure(frame_width: u32, frame_height: u32, blob: &Blob) -> Self {
        let (center_x, center_y) = blob.center();
        Self {
            offset_x: center_x - frame_width as i64 / 2,
            offset_y: frame_height as i64 / 2 - center_y,
        }
    }
}

/// Gains of the control law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlLaw {
    deadband: u32,
    pan_power: f32,
    tilt_power: f32,
}

impl ControlLaw {
    pub fn new(deadband: u32, pan_power: f32, tilt_power: f32) -> Result<Self, ConfigError> {
        check_magnitude("pan_power", pan_power)?;
        check_magnitude("tilt_power", tilt_power)?;
        Ok(Self { deadband, pan_power, tilt_power })
    }

    pub fn deadband(&self) -> u32 {
        self.deadband
    }

    /// Maps a centering error to motor powers.
    pub fn powers_for(&self, error: CenteringError) -> MotorPowers {
        MotorPowers {
            pan: -self.pan_power * self.engage(error.offset_x),
            tilt: self.tilt_power * self.engage(error.offset_y),
        }
    }

    /// -1, 0 or +1: the direction to drive, or 0 inside the deadband.
    fn engage(&self, offset: i64) -> f32 {
        if offset.unsigned_abs() <= self.deadband as u64 {
            0.0
        } else {
            offset.signum() as f32
        }
    }
}

impl Default for ControlLaw {
    fn default() -> Self {
        Self {
            deadband: DEFAULT_DEADBAND,
            pan_power: DEFAULT_PAN_POWER,
            tilt_power: DEFAULT_TILT_POWER,
        }
    }
}

fn check_magnitude(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::PowerOutOfRange { field, value })
    }
}

/// Turns the detection result of one frame into a tracking decision.
#[derive(Debug, Clone)]
pub struct TrackingController {
    law: ControlLaw,
    tracking: bool,
}

impl TrackingController {
    pub fn new(law: ControlLaw, tracking: bool) -> Self {
        Self { law, tracking }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn set_tracking(&mut self, tracking: bool) {
        self.tracking = tracking;
    }

    pub fn law(&self) -> &ControlLaw {
        &self.law
    }

    /// The powers to publish for this frame, or `None` to leave the shared
    /// state as it is.
    ///
    /// | blob | tracking | result        |
    /// |------|----------|---------------|
    /// | yes  | on       | control law   |
    /// | yes  | off      | stop          |
    /// | no   | on       | stop          |
    /// | no   | off      | unchanged     |
    ///
    /// The last row keeps manually commanded powers alive while nothing is in
    /// view and tracking is off.
    pub fn decide(&self, frame_width: u32, frame_height: u32, target: Option<&Blob>) -> Option<MotorPowers> {
        match (target, self.tracking) {
            (Some(blob), true) => {
                let error = CenteringError::measure(frame_width, frame_height, blob);
                Some(self.law.powers_for(error))
            }
            (Some(_), false) | (None, true) => Some(MotorPowers::STOP),
            (None, false) => None,
        }
    }
}

impl Default for TrackingController {
    fn default() -> Self {
        Self::new(ControlLaw::default(), true)
    }
}
