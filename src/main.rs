// THEORY:
// The demo runner feeds a directory of still frames through the tracker at
// the configured frame rate, as a camera would. It drives an NXT brick over a
// serial device when `--link` is given, and a logging dry-run link otherwise.
// Configuration is validated before anything is opened or spawned.

use anyhow::{Context, bail};
use chroma_servo::config::ServoConfig;
use chroma_servo::core_modules::overlay;
use chroma_servo::link::nxt::NxtLink;
use chroma_servo::link::{ActuatorLink, TracingLink};
use chroma_servo::pipeline::Report;
use chroma_servo::servo_loop::ServoLoop;
use clap::Parser;
use image::imageops::{self, FilterType};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "chroma_servo", version, about = "Color-tracking pan/tilt servo")]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of image files, processed in name order.
    #[arg(long)]
    frames: PathBuf,

    /// Device node of the NXT brick (e.g. /dev/rfcomm0). Dry run when omitted.
    #[arg(long)]
    link: Option<PathBuf>,

    /// Where to write annotated frames.
    #[arg(long)]
    overlay_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer().with_target(true)).with(env_filter).init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServoConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ServoConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    let pipeline_config = config.pipeline_config()?;
    let turn_ratio = config.link.turn_ratio()?;
    info!(?config, "configuration loaded");

    let link: Box<dyn ActuatorLink> = match &args.link {
        Some(path) => {
            let device = path.to_string_lossy();
            let mut nxt = NxtLink::open_serial(
                &device,
                config.link.baud_rate,
                config.link.timeout(),
                config.link.request_reply,
            )
            .with_context(|| format!("opening link {device}"))?;
            if config.link.tone_on_connect {
                nxt.play_tone(300, 300).context("greeting the brick")?;
            }
            info!(%device, baud_rate = config.link.baud_rate, "NXT link connected");
            Box::new(nxt)
        }
        None => {
            info!("no link given, running dry");
            Box::new(TracingLink)
        }
    };

    let frames = list_frames(&args.frames)?;
    if frames.is_empty() {
        bail!("no image files in {}", args.frames.display());
    }
    if let Some(dir) = &args.overlay_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let (mut servo, mut pipeline, _control) = ServoLoop::spawn(pipeline_config, link, turn_ratio);
    let width = pipeline.config().image_width;
    let height = pipeline.config().image_height;
    let mut ticker = tokio::time::interval(Duration::from_secs(1) / config.video.frame_rate);

    for path in &frames {
        ticker.tick().await;

        let decoded = match image::open(path) {
            Ok(image) => image.to_rgb8(),
            Err(err) => {
                warn!(frame = %path.display(), error = %err, "skipping unreadable frame");
                continue;
            }
        };
        let mut frame = if decoded.dimensions() == (width, height) {
            decoded
        } else {
            imageops::resize(&decoded, width, height, FilterType::Triangle)
        };

        let report = pipeline.process_frame(&mut frame);
        match &report {
            Report::Target(data) => info!(
                frame = %path.display(),
                target = ?data.target,
                offset_x = data.error.offset_x,
                offset_y = data.error.offset_y,
                pan = data.powers.pan,
                tilt = data.powers.tilt,
                "target"
            ),
            Report::NotVisible { powers } => debug!(frame = %path.display(), ?powers, "no target"),
            Report::DetectionDisabled => debug!(frame = %path.display(), "detection disabled"),
        }

        if let (Some(dir), Some(name)) = (&args.overlay_dir, path.file_stem()) {
            let out = dir.join(name).with_extension("png");
            overlay::save_frame(&frame, &out).with_context(|| format!("writing {}", out.display()))?;
        }

        while let Some(err) = servo.try_next_error() {
            warn!(error = %err, "dispatch failed");
        }
    }

    info!(frames = pipeline.frame_count(), "all frames processed, shutting down");
    servo.shutdown().await?;
    Ok(())
}

fn list_frames(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && ImageFormat::from_path(&path).is_ok() {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}
