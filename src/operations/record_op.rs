use crate::camera::test_pattern::TestPatternSource;
use crate::common::file_utils;
use crate::config_loader::MasterConfig;
use crate::core::capture_source::{FrameSource, VideoEncoder};
use crate::core::pipeline::{PipelineHandle, RecorderOptions, RecorderPipeline};
use crate::core::session::{PipelineStatus, SessionOutcome};
use crate::operations::op_helper;
use crate::tracking::client::TrackingClient;
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use log::{debug, info, warn};
use std::future::Future;
use std::io::BufRead;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub async fn handle_run_cli(master_config: &MasterConfig, args: &ArgMatches) -> Result<()> {
    let op_start_time = Instant::now();
    let use_test_pattern = args.get_flag("test-pattern");

    let mut app_settings = master_config.app_settings.clone();
    app_settings.output_directory = op_helper::resolve_output_directory(master_config, args, "output");
    let output_dir = file_utils::ensure_output_directory(&app_settings.output_directory)
        .context("Failed to prepare output directory")?;
    info!("📁 Recordings will be written to {}", output_dir.display());

    let stream = master_config.stream.clone();
    let settings = master_config.pipeline.clone();
    let tracking_config = master_config.tracking.clone();
    let frame_size = stream.resolution.dimensions();
    info!(
        "🚀 Starting recorder: source '{}', {} ({}x{}) @ {} fps",
        if use_test_pattern { "test-pattern" } else { stream.source.as_str() },
        stream.resolution.label(),
        frame_size.0,
        frame_size.1,
        stream.frame_rate
    );

    let (handle_tx, handle_rx) = oneshot::channel::<PipelineHandle>();
    let capture_task = tokio::task::spawn_blocking(move || -> Result<PipelineStatus> {
        let mut source = open_source(use_test_pattern, &stream.source, frame_size, stream.frame_rate)?;
        let tracking = TrackingClient::new(&tracking_config).context("Failed to build tracking client")?;
        let options = RecorderOptions::new(&app_settings, stream.frame_rate, source.frame_size());
        let mut pipeline = RecorderPipeline::start(settings, options, build_encoder()?, Box::new(tracking))
            .context("Failed to start recorder pipeline")?;
        let handle = pipeline.handle();
        if handle_tx.send(handle.clone()).is_err() {
            warn!("⚠️ Marker intake went away before the capture loop started.");
        }
        let run_result = pipeline.run(source.as_mut());
        drop(pipeline);
        run_result.context("Capture loop failed")?;
        Ok(handle.status())
    });

    let handle = match handle_rx.await {
        Ok(handle) => handle,
        Err(_) => {
            // The capture task ended before handing over its handle; surface its error.
            return match capture_task.await.context("Capture task panicked")? {
                Ok(_) => Err(anyhow!("Recorder stopped before it was ready")),
                Err(e) => Err(e),
            };
        }
    };

    let mut markers = spawn_marker_reader();
    info!("📥 Scan a start marker to begin recording (Ctrl-C to quit).");
    pump_markers(&handle, &mut markers, tokio::signal::ctrl_c()).await;

    let status = capture_task.await.context("Capture task panicked")??;
    log_summary(&status);
    info!("📹 Recorder finished in {:?}.", op_start_time.elapsed());
    Ok(())
}

/// Forwards scanned lines to the pipeline until `shutdown` resolves or the capture loop stops
/// on its own. A resolved `shutdown` stops the pipeline. Closed marker input is not a reason
/// to stop.
pub async fn pump_markers<S>(handle: &PipelineHandle, markers: &mut mpsc::UnboundedReceiver<String>, shutdown: S)
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(shutdown);
    let mut input_open = true;
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!("⚠️ Failed to listen for Ctrl-C: {}", e);
                }
                info!("🛑 Interrupt received, stopping recorder...");
                handle.shutdown();
                break;
            }
            line = markers.recv(), if input_open => match line {
                Some(line) => {
                    if handle.submit_marker(&line) {
                        info!("📥 Marker received: {}", line.trim());
                    }
                }
                None => {
                    info!("⌨️ Marker input closed; recorder keeps running until Ctrl-C.");
                    input_open = false;
                }
            },
            _ = tokio::time::sleep(SHUTDOWN_POLL_INTERVAL) => {
                if !handle.is_running() {
                    debug!("Capture loop stopped on its own.");
                    break;
                }
            }
        }
    }
}

fn open_source(
    use_test_pattern: bool,
    source: &str,
    frame_size: (u32, u32),
    frame_rate: u32,
) -> Result<Box<dyn FrameSource>> {
    if use_test_pattern {
        return Ok(Box::new(TestPatternSource::new(frame_size, frame_rate)));
    }
    #[cfg(feature = "opencv")]
    {
        let opened = crate::camera::opencv_backend::OpenCvSource::open(source, frame_size)
            .with_context(|| format!("Failed to open stream source '{}'", source))?;
        Ok(Box::new(opened))
    }
    #[cfg(not(feature = "opencv"))]
    {
        Err(anyhow!(
            "Built without the `opencv` feature; cannot open '{}'. Use --test-pattern.",
            source
        ))
    }
}

fn build_encoder() -> Result<Box<dyn VideoEncoder>> {
    #[cfg(feature = "opencv")]
    {
        Ok(Box::new(crate::camera::opencv_backend::OpenCvEncoder::new()))
    }
    #[cfg(not(feature = "opencv"))]
    {
        Err(anyhow!("Built without the `opencv` feature; no video encoder available."))
    }
}

/// Reads scanner lines on a plain thread so a pending stdin read never holds up runtime shutdown.
fn spawn_marker_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("marker-intake".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("⚠️ Failed to read marker input: {}", e);
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        warn!("⚠️ Could not start marker intake thread: {}", e);
    }
    rx
}

fn log_summary(status: &PipelineStatus) {
    info!(
        "📊 Sessions completed: {}, frames dropped: {}",
        status.sessions_completed, status.frames_dropped
    );
    for record in status.history.iter().filter(|r| r.outcome != SessionOutcome::Completed) {
        match &record.artifact {
            Some(path) => warn!(
                "  -> {} / {}: {:?}, artifact retained at {}",
                record.start_marker,
                record.stop_marker.as_deref().unwrap_or("-"),
                record.outcome,
                path.display()
            ),
            None => info!(
                "  -> {} / {}: {:?}",
                record.start_marker,
                record.stop_marker.as_deref().unwrap_or("-"),
                record.outcome
            ),
        }
    }
}
