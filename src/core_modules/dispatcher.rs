// THEORY:
// The `MotorDispatcher` is the debouncer in front of the actuator link. Frames
// arrive far faster than the target powers change, so most wakes would resend
// exactly what the motors are already doing. The dispatcher remembers the last
// power it successfully commanded per axis and only talks to the link when the
// request differs.
//
// Rules:
// 1.  One command per axis per dispatch, at most.
// 2.  The cache moves only after the link accepted the command. A failed write
//     leaves it stale, so the next request, even an identical one, retries.
// 3.  A failure on one axis does not stop the other axis from being serviced.
// 4.  `park` stops both axes unconditionally. It is the last thing the drive
//     worker does on any exit path.

use crate::core_modules::controller::MotorPowers;
use crate::core_modules::motor::{Axis, MotorCommand};
use crate::error::DispatchError;
use crate::link::ActuatorLink;
use tracing::{debug, warn};

pub struct MotorDispatcher<L> {
    link: L,
    /// Last successfully commanded powers. Never leaves this struct.
    commanded: MotorPowers,
    turn_ratio: i8,
}

impl<L: ActuatorLink> MotorDispatcher<L> {
    pub fn new(link: L, turn_ratio: i8) -> Self {
        Self {
            link,
            commanded: MotorPowers::STOP,
            turn_ratio,
        }
    }

    /// Commands every axis whose requested power changed.
    ///
    /// Returns the commands that reached the link. If an axis failed, the
    /// first failure is returned instead, after both axes were attempted.
    pub fn dispatch(&mut self, requested: MotorPowers) -> Result<Vec<MotorCommand>, DispatchError> {
        let mut issued = Vec::with_capacity(2);
        let mut failure = None;

        for (axis, power) in [(Axis::PAN, requested.pan), (Axis::TILT, requested.tilt)] {
            if power == self.commanded_for(axis) {
                continue;
            }
            match self.issue(axis, power) {
                Ok(command) => issued.push(command),
                Err(err) => {
                    warn!(%axis, error = %err, "motor command failed");
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(issued),
        }
    }

    /// Stops both axes regardless of what was last commanded.
    pub fn park(&mut self) -> Result<(), DispatchError> {
        let mut failure = None;
        for axis in [Axis::PAN, Axis::TILT] {
            if let Err(err) = self.issue(axis, 0.0) {
                warn!(%axis, error = %err, "failed to stop motor");
                if failure.is_none() {
                    failure = Some(err);
                }
            }
        }
        failure.map_or(Ok(()), Err)
    }

    pub fn commanded(&self) -> MotorPowers {
        self.commanded
    }

    pub fn into_link(self) -> L {
        self.link
    }

    fn commanded_for(&self, axis: Axis) -> f32 {
        match axis {
            Axis::A => self.commanded.pan,
            Axis::B => self.commanded.tilt,
        }
    }

    fn issue(&mut self, axis: Axis, power: f32) -> Result<MotorCommand, DispatchError> {
        let command = MotorCommand::for_power(axis, power, self.turn_ratio);
        self.link
            .set_motor_state(&command)
            .map_err(|source| DispatchError::Link { axis, source })?;
        debug!(%axis, power, device_power = command.power, "motor commanded");

        match axis {
            Axis::A => self.commanded.pan = power,
            Axis::B => self.commanded.tilt = power,
        }
        Ok(command)
    }
}
