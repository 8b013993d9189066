// THEORY:
// `ServoLoop` owns the consumer half: a single drive worker that turns bridge
// signals into motor commands. The worker runs on tokio's blocking pool
// because actuator links do plain blocking I/O; it waits on the bridge by
// driving the async `wait` with a local executor.
//
// Lifecycle:
// - `spawn` builds the bridge, the producer pipeline and its control handle,
//   and starts the worker. It must be called from inside a tokio runtime.
// - Every wake dispatches the latest targets. Dispatch failures are logged,
//   forwarded on the error channel, and the worker keeps waiting.
// - `shutdown` raises the exit flag, signals, and waits for the worker to
//   finish. It can succeed once; the loop keeps no worker afterwards. The worker parks both axes on its way out and hands the link
//   back. A guard performs the same parking if the worker unwinds from a
//   panic, so the mount is never left running.
// - Dropping a `ServoLoop` without `shutdown` still raises the exit flag; the
//   worker then parks and exits on its own.

use crate::core_modules::bridge::DriveBridge;
use crate::core_modules::dispatcher::MotorDispatcher;
use crate::error::{DispatchError, ServoError};
use crate::link::ActuatorLink;
use crate::pipeline::{ControlHandle, PipelineConfig, TrackingPipeline};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct ServoLoop<L> {
    bridge: Arc<DriveBridge>,
    worker: Option<JoinHandle<L>>,
    errors: mpsc::UnboundedReceiver<DispatchError>,
}

impl<L: ActuatorLink + 'static> ServoLoop<L> {
    /// Starts the drive worker on `link` and returns the loop together with
    /// the frame pipeline that feeds it and a handle for reconfiguring it.
    pub fn spawn(config: PipelineConfig, link: L, turn_ratio: i8) -> (Self, TrackingPipeline, ControlHandle) {
        let bridge = Arc::new(DriveBridge::new());
        let (pipeline, control) = TrackingPipeline::new(config, bridge.clone());
        let (error_tx, errors) = mpsc::unbounded_channel();

        let dispatcher = MotorDispatcher::new(link, turn_ratio);
        let worker = tokio::task::spawn_blocking({
            let bridge = bridge.clone();
            move || drive(bridge, dispatcher, error_tx)
        });
        info!(turn_ratio, "drive worker started");

        let servo = Self {
            bridge,
            worker: Some(worker),
            errors,
        };
        (servo, pipeline, control)
    }

    /// Next reported dispatch failure, if one is waiting.
    pub fn try_next_error(&mut self) -> Option<DispatchError> {
        self.errors.try_recv().ok()
    }

    /// Waits for the next dispatch failure. Resolves to `None` once the
    /// worker has exited and every failure was consumed.
    pub async fn next_error(&mut self) -> Option<DispatchError> {
        self.errors.recv().await
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }

    /// Stops the worker, which parks both axes first, and returns the link.
    /// A second call finds no worker and fails with `AlreadyStopped`.
    pub async fn shutdown(&mut self) -> Result<L, ServoError> {
        self.bridge.request_exit();
        let worker = self.worker.take().ok_or(ServoError::AlreadyStopped)?;
        let link = worker.await?;
        info!("drive worker joined");
        Ok(link)
    }
}

impl<L> Drop for ServoLoop<L> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.bridge.request_exit();
        }
    }
}

/// Parks the dispatcher when dropped, including during unwinding.
struct ParkOnExit<'a, L: ActuatorLink> {
    dispatcher: &'a mut MotorDispatcher<L>,
    errors: &'a mpsc::UnboundedSender<DispatchError>,
}

impl<L: ActuatorLink> Drop for ParkOnExit<'_, L> {
    fn drop(&mut self) {
        if let Err(err) = self.dispatcher.park() {
            warn!(error = %err, "failed to park motors on exit");
            let _ = self.errors.send(err);
        }
    }
}

fn drive<L: ActuatorLink>(
    bridge: Arc<DriveBridge>,
    mut dispatcher: MotorDispatcher<L>,
    errors: mpsc::UnboundedSender<DispatchError>,
) -> L {
    {
        let guard = ParkOnExit { dispatcher: &mut dispatcher, errors: &errors };
        while let Some(powers) = futures::executor::block_on(bridge.wait()) {
            if let Err(err) = guard.dispatcher.dispatch(powers) {
                let _ = errors.send(err);
            }
        }
    }
    info!("drive worker parked motors and stopped");
    dispatcher.into_link()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::motor::{Axis, DEFAULT_TURN_RATIO, MotorCommand};
    use crate::error::LinkError;
    use crate::link::RecordingLink;
    use std::time::Duration;

    /// A link that panics on its first running command.
    struct Faulty {
        log: RecordingLink,
    }

    impl ActuatorLink for Faulty {
        fn set_motor_state(&mut self, command: &MotorCommand) -> Result<(), LinkError> {
            if !command.is_idle() {
                panic!("link fault");
            }
            self.log.set_motor_state(command)
        }
    }

    /// Polls `done` until it holds, failing the test after two seconds.
    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..400 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("worker did not reach the expected state in time");
    }

    #[tokio::test]
    async fn shutdown_parks_and_returns_link() {
        let link = RecordingLink::new();
        let (mut servo, _pipeline, control) =
            ServoLoop::spawn(PipelineConfig::default(), link.clone(), DEFAULT_TURN_RATIO);

        control.manual_pan(-0.3);
        wait_until(|| link.commands().len() == 1).await;
        let returned = servo.shutdown().await.unwrap();

        let sent = returned.commands();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].power, 56);
        assert_eq!(&sent[1..], &[MotorCommand::idle(Axis::A), MotorCommand::idle(Axis::B)]);
    }

    #[tokio::test]
    async fn second_shutdown_reports_already_stopped() {
        let (mut servo, _pipeline, _control) =
            ServoLoop::spawn(PipelineConfig::default(), RecordingLink::new(), DEFAULT_TURN_RATIO);

        servo.shutdown().await.unwrap();
        assert!(!servo.is_running());
        assert!(matches!(servo.shutdown().await, Err(ServoError::AlreadyStopped)));
    }

    #[tokio::test]
    async fn dispatch_errors_are_reported_and_worker_survives() {
        let link = RecordingLink::new();
        let (mut servo, _pipeline, control) =
            ServoLoop::spawn(PipelineConfig::default(), link.clone(), DEFAULT_TURN_RATIO);

        link.fail_next(1);
        control.manual_tilt(0.5);
        let err = servo.next_error().await.unwrap();
        assert_eq!(err.axis(), Axis::B);
        assert!(servo.is_running());

        // Same request again: the stale cache lets it through this time.
        control.manual_tilt(0.5);
        wait_until(|| !link.commands().is_empty()).await;
        assert_eq!(link.commands()[0].power, -57);

        servo.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn panic_in_dispatch_still_parks_motors() {
        let log = RecordingLink::new();
        let (mut servo, _pipeline, control) =
            ServoLoop::spawn(PipelineConfig::default(), Faulty { log: log.clone() }, DEFAULT_TURN_RATIO);

        control.manual_pan(0.5);
        wait_until(|| !servo.is_running()).await;

        assert!(matches!(servo.shutdown().await, Err(ServoError::WorkerFailed(_))));
        assert_eq!(log.commands(), vec![MotorCommand::idle(Axis::A), MotorCommand::idle(Axis::B)]);
    }

    #[tokio::test]
    async fn dropping_the_loop_stops_the_worker() {
        let link = RecordingLink::new();
        let (servo, _pipeline, control) =
            ServoLoop::spawn(PipelineConfig::default(), link.clone(), DEFAULT_TURN_RATIO);
        control.manual_pan(0.3);
        wait_until(|| link.commands().len() == 1).await;
        drop(servo);
        wait_until(|| link.commands().len() == 3).await;

        let sent = link.commands();
        assert_eq!(&sent[1..], &[MotorCommand::idle(Axis::A), MotorCommand::idle(Axis::B)]);
    }
}
