// THEORY:
// The `motor` module is the vocabulary shared between the dispatcher and the
// actuator link. It knows nothing about frames or blobs. Its job is to turn a
// normalized control signal in roughly [-1, 1] into the integer units the
// actuator understands, and to package that value as a `MotorCommand`.
//
// The actuator has a dead zone: below a drive of about 55 units the gearbox
// does not overcome static friction. The conversion therefore adds a fixed
// offset of 55 in the direction of travel, so any nonzero request lands at
// 55 or above and zero stays exactly zero.

use std::fmt;

/// Multiplier applied to the normalized power before the friction offset.
const POWER_GAIN: f32 = 5.0;
/// Minimum drive (in device units) that actually moves the mount.
const FRICTION_OFFSET: f32 = 55.0;
/// Device units are a signed percentage.
const MAX_DEVICE_POWER: i32 = 100;

pub const DEFAULT_TURN_RATIO: i8 = 80;

/// An actuated axis of the mount, named after the controller's output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Port A drives pan.
    A,
    /// Port B drives tilt.
    B,
}

impl Axis {
    pub const PAN: Axis = Axis::A;
    pub const TILT: Axis = Axis::B;

    /// Zero-based output port index.
    pub fn port(self) -> u8 {
        match self {
            Axis::A => 0,
            Axis::B => 1,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::A => f.write_str("A"),
            Axis::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorMode {
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// A single, self-contained instruction for one axis. Built per dispatch and
/// dropped once the link has accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorCommand {
    pub axis: Axis,
    pub mode: MotorMode,
    pub run_state: RunState,
    /// Signed device units, always 0 or with magnitude >= 55.
    pub power: i8,
    pub turn_ratio: i8,
    /// Rotation limit in degrees; 0 means run until told otherwise.
    pub tacho_limit: u32,
}

impl MotorCommand {
    /// The stop command for `axis`.
    pub fn idle(axis: Axis) -> Self {
        Self {
            axis,
            mode: MotorMode::Off,
            run_state: RunState::Idle,
            power: 0,
            turn_ratio: 0,
            tacho_limit: 0,
        }
    }

    /// Builds the command for a normalized power request. A request that
    /// converts to zero device units becomes `idle`.
    pub fn for_power(axis: Axis, power: f32, turn_ratio: i8) -> Self {
        match to_device_power(power) {
            0 => Self::idle(axis),
            device_power => Self {
                axis,
                mode: MotorMode::On,
                run_state: RunState::Running,
                power: device_power,
                turn_ratio,
                tacho_limit: 0,
            },
        }
    }

    pub fn is_idle(&self) -> bool {
        self.run_state == RunState::Idle
    }
}

/// `trunc(5p + 55 * sign(p))`, clamped to the device range.
///
/// The cast truncates toward zero, so `0.3` maps to `56` (from 56.5) and
/// `-0.3` to `-56`. Non-finite input is treated as a stop request.
pub fn to_device_power(power: f32) -> i8 {
    if !power.is_finite() || power == 0.0 {
        return 0;
    }
    let raw = POWER_GAIN * power + FRICTION_OFFSET * power.signum();
    (raw as i32).clamp(-MAX_DEVICE_POWER, MAX_DEVICE_POWER) as i8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_power_is_exactly_zero() {
        assert_eq!(to_device_power(0.0), 0);
        assert_eq!(to_device_power(-0.0), 0);
    }

    #[test]
    fn bang_bang_levels_truncate_toward_zero() {
        assert_eq!(to_device_power(0.3), 56);
        assert_eq!(to_device_power(0.5), 57);
        assert_eq!(to_device_power(1.0), 60);
        assert_eq!(to_device_power(-0.3), -56);
        assert_eq!(to_device_power(-0.5), -57);
    }

    #[test]
    fn negative_power_mirrors_positive() {
        for p in [0.01f32, 0.1, 0.3, 0.5, 0.77, 1.0] {
            assert_eq!(to_device_power(-p), -to_device_power(p), "p = {p}");
        }
    }

    #[test]
    fn tiny_requests_still_clear_the_dead_zone() {
        assert_eq!(to_device_power(1e-6), 55);
        assert_eq!(to_device_power(-1e-6), -55);
    }

    #[test]
    fn out_of_range_requests_are_clamped() {
        assert_eq!(to_device_power(20.0), 100);
        assert_eq!(to_device_power(-20.0), -100);
        assert_eq!(to_device_power(f32::NAN), 0);
    }

    #[test]
    fn running_command_carries_turn_ratio_and_no_tacho_limit() {
        let cmd = MotorCommand::for_power(Axis::PAN, -0.3, DEFAULT_TURN_RATIO);
        assert_eq!(cmd.mode, MotorMode::On);
        assert_eq!(cmd.run_state, RunState::Running);
        assert_eq!(cmd.power, -56);
        assert_eq!(cmd.turn_ratio, 80);
        assert_eq!(cmd.tacho_limit, 0);
    }

    #[test]
    fn zero_request_builds_idle_command() {
        let cmd = MotorCommand::for_power(Axis::TILT, 0.0, DEFAULT_TURN_RATIO);
        assert_eq!(cmd, MotorCommand::idle(Axis::B));
        assert!(cmd.is_idle());
    }
}
