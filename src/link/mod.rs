// THEORY:
// An `ActuatorLink` is the seam between the servo and whatever physically moves
// the mount. The servo only ever needs one operation: "put this axis into
// this state". Opening, closing and choosing the port all belong to whoever
// constructs the link, so the trait carries nothing else.
//
// Links are driven from the dedicated drive worker, so calls may block on I/O.

pub mod nxt;

use crate::core_modules::motor::MotorCommand;
use crate::error::LinkError;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

pub trait ActuatorLink: Send {
    fn set_motor_state(&mut self, command: &MotorCommand) -> Result<(), LinkError>;
}

impl<L: ActuatorLink + ?Sized> ActuatorLink for Box<L> {
    fn set_motor_state(&mut self, command: &MotorCommand) -> Result<(), LinkError> {
        (**self).set_motor_state(command)
    }
}

/// Logs every command instead of moving anything. Used for dry runs.
#[derive(Debug, Default)]
pub struct TracingLink;

impl ActuatorLink for TracingLink {
    fn set_motor_state(&mut self, command: &MotorCommand) -> Result<(), LinkError> {
        info!(
            axis = %command.axis,
            power = command.power,
            running = !command.is_idle(),
            "motor command"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Recording {
    commands: Vec<MotorCommand>,
    failures_pending: usize,
}

/// An in-memory link that remembers every command it accepted.
///
/// Clones share the same log, so a test can keep one handle while the servo
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingLink {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every accepted command, oldest first.
    pub fn commands(&self) -> Vec<MotorCommand> {
        self.inner.lock().commands.clone()
    }

    /// Drains the log.
    pub fn take(&self) -> Vec<MotorCommand> {
        std::mem::take(&mut self.inner.lock().commands)
    }

    /// Makes the next `count` submissions fail as if the link had dropped.
    pub fn fail_next(&self, count: usize) {
        self.inner.lock().failures_pending = count;
    }
}

impl ActuatorLink for RecordingLink {
    fn set_motor_state(&mut self, command: &MotorCommand) -> Result<(), LinkError> {
        let mut recording = self.inner.lock();
        if recording.failures_pending > 0 {
            recording.failures_pending -= 1;
            return Err(LinkError::Disconnected);
        }
        recording.commands.push(*command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::motor::Axis;

    #[test]
    fn recording_link_shares_log_between_clones() {
        let observer = RecordingLink::new();
        let mut link: Box<dyn ActuatorLink> = Box::new(observer.clone());
        link.set_motor_state(&MotorCommand::idle(Axis::A)).unwrap();
        assert_eq!(observer.commands(), vec![MotorCommand::idle(Axis::A)]);
        assert_eq!(observer.take().len(), 1);
        assert!(observer.commands().is_empty());
    }

    #[test]
    fn injected_failures_are_not_recorded() {
        let mut link = RecordingLink::new();
        link.fail_next(1);
        assert!(matches!(
            link.set_motor_state(&MotorCommand::idle(Axis::B)),
            Err(LinkError::Disconnected)
        ));
        assert!(link.set_motor_state(&MotorCommand::idle(Axis::B)).is_ok());
        assert_eq!(link.commands().len(), 1);
    }
}
