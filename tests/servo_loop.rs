use chroma_servo::config::ServoConfig;
use chroma_servo::core_modules::motor::{Axis, DEFAULT_TURN_RATIO, MotorCommand};
use chroma_servo::link::RecordingLink;
use chroma_servo::pipeline::{PipelineConfig, Report};
use chroma_servo::servo_loop::ServoLoop;
use chroma_servo::{Blob, MotorPowers};
use image::{Rgb, RgbImage};
use std::time::Duration;

const BACKGROUND: Rgb<u8> = Rgb([40, 120, 40]);
const RED: Rgb<u8> = Rgb([210, 20, 25]);
const BLUE: Rgb<u8> = Rgb([20, 30, 200]);

fn empty_frame() -> RgbImage {
    RgbImage::from_pixel(320, 240, BACKGROUND)
}

fn frame_with(x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
    let mut frame = empty_frame();
    for py in y..y + height {
        for px in x..x + width {
            frame.put_pixel(px, py, color);
        }
    }
    frame
}

/// Polls the link until it has recorded at least `count` commands.
async fn wait_for_commands(link: &RecordingLink, count: usize) {
    for _ in 0..400 {
        if link.commands().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {count} commands, got {:?}", link.commands());
}

#[tokio::test]
async fn tracks_target_then_stops_and_parks() {
    let link = RecordingLink::new();
    let (mut servo, mut pipeline, _control) =
        ServoLoop::spawn(PipelineConfig::default(), link.clone(), DEFAULT_TURN_RATIO);

    // Center (220, 120): 60 px right of center, vertically centered.
    let report = pipeline.process_frame(&mut frame_with(200, 100, 40, 40, RED));
    assert_eq!(report.target(), Some(&Blob::new(200, 100, 40, 40)));
    wait_for_commands(&link, 1).await;

    let sent = link.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].axis, Axis::A);
    assert_eq!(sent[0].power, -56);
    assert_eq!(sent[0].turn_ratio, 80);

    // Same frame again, then the object leaves. The repeat adds nothing, so
    // the only command is the pan stop; tilt was never running.
    pipeline.process_frame(&mut frame_with(200, 100, 40, 40, RED));
    let report = pipeline.process_frame(&mut empty_frame());
    assert_eq!(report, Report::NotVisible { powers: Some(MotorPowers::STOP) });
    wait_for_commands(&link, 1).await;
    assert_eq!(link.take(), vec![MotorCommand::idle(Axis::A)]);

    servo.shutdown().await.unwrap();
    assert_eq!(link.commands(), vec![MotorCommand::idle(Axis::A), MotorCommand::idle(Axis::B)]);
}

#[tokio::test]
async fn manual_control_survives_frames_while_tracking_is_off() {
    let link = RecordingLink::new();
    let (mut servo, mut pipeline, control) =
        ServoLoop::spawn(PipelineConfig::default(), link.clone(), DEFAULT_TURN_RATIO);

    control.set_tracking(false);
    control.manual_pan(-0.5);
    wait_for_commands(&link, 1).await;

    for _ in 0..3 {
        let report = pipeline.process_frame(&mut empty_frame());
        assert_eq!(report, Report::NotVisible { powers: None });
    }

    // A visible object with tracking off halts the mount.
    pipeline.process_frame(&mut frame_with(10, 10, 30, 30, RED));
    wait_for_commands(&link, 2).await;

    let sent = link.commands();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].axis, Axis::A);
    assert_eq!(sent[0].power, 57);
    assert_eq!(sent[1], MotorCommand::idle(Axis::A));

    servo.shutdown().await.unwrap();
}

#[tokio::test]
async fn configuration_from_toml_drives_the_loop() {
    let config = ServoConfig::from_toml_str(
        r#"
        [detection]
        preset = "blue"
        min_blob_width = 10
        min_blob_height = 10

        [control]
        deadband = 10
        tilt_power = 1.0

        [link]
        turn_ratio = 0
        "#,
    )
    .unwrap();
    let link = RecordingLink::new();
    let (mut servo, mut pipeline, _control) = ServoLoop::spawn(
        config.pipeline_config().unwrap(),
        link.clone(),
        config.link.turn_ratio().unwrap(),
    );

    // Center (160, 150): 30 px below center; tilt runs down at full power.
    let report = pipeline.process_frame(&mut frame_with(150, 140, 20, 20, BLUE));
    assert_eq!(report.target(), Some(&Blob::new(150, 140, 20, 20)));
    wait_for_commands(&link, 1).await;

    let sent = link.commands();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].axis, Axis::B);
    assert_eq!(sent[0].power, -60);
    assert_eq!(sent[0].turn_ratio, 0);

    // A red object is invisible under the blue preset.
    let report = pipeline.process_frame(&mut frame_with(150, 140, 20, 20, RED));
    assert!(report.target().is_none());

    servo.shutdown().await.unwrap();
}
