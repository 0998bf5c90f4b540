use crate::app_config::{ApplicationConfig, PipelineSettings};
use crate::common::{file_utils, timestamp_utils};
use crate::core::capture_source::{EncoderSpec, Frame, FrameSource, VideoEncoder};
use crate::core::finalize;
use crate::core::marker::MarkerSlot;
use crate::core::ring_buffer::PreRollBuffer;
use crate::core::session::{PipelineStatus, Session, SessionOutcome, SessionRecord, SessionState};
use crate::core::write_queue::{write_queue, WriteQueue};
use crate::core::writer_task::{self, SharedEncoder, WriterHandle};
use crate::errors::AppError;
use crate::tracking::TrackingService;
use chrono::Local;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

const PROGRESS_EVERY_FRAMES: u64 = 30;

/// Output-side settings fixed for the lifetime of the pipeline.
#[derive(Debug, Clone)]
pub struct RecorderOptions {
    pub output_directory: String,
    pub video_format: String,
    pub video_codec: String,
    pub filename_timestamp_format: String,
    pub frame_rate: u32,
    pub frame_size: (u32, u32),
}

impl RecorderOptions {
    pub fn new(app: &ApplicationConfig, frame_rate: u32, frame_size: (u32, u32)) -> Self {
        RecorderOptions {
            output_directory: app.output_directory.clone(),
            video_format: app.video_format.clone(),
            video_codec: app.video_codec.clone(),
            filename_timestamp_format: app.filename_timestamp_format.clone(),
            frame_rate,
            frame_size,
        }
    }

    fn encoder_spec(&self) -> EncoderSpec {
        EncoderSpec {
            frame_rate: self.frame_rate as f64,
            width: self.frame_size.0,
            height: self.frame_size.1,
            codec: self.video_codec.clone(),
        }
    }
}

/// Message-passing entry points into a running pipeline. Cheap to clone and `Send`.
#[derive(Clone)]
pub struct PipelineHandle {
    markers: MarkerSlot,
    running: Arc<AtomicBool>,
    pending_settings: Arc<Mutex<Option<PipelineSettings>>>,
    status: Arc<Mutex<PipelineStatus>>,
}

impl PipelineHandle {
    /// Hands a scanned marker to the capture loop. Last write wins until the loop reads it.
    pub fn submit_marker(&self, raw: &str) -> bool {
        let accepted = self.markers.submit(raw);
        if !accepted {
            debug!("Ignoring empty marker input.");
        }
        accepted
    }

    /// Applied by the capture loop the next time it is IDLE.
    pub fn reconfigure(&self, settings: PipelineSettings) {
        *self.pending_settings.lock() = Some(settings);
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> PipelineStatus {
        self.status.lock().clone()
    }
}

/// The marker-driven session state machine. Owned by the capture thread, which is its only
/// driver: every frame goes through [`RecorderPipeline::tick`].
pub struct RecorderPipeline {
    settings: PipelineSettings,
    options: RecorderOptions,
    state: SessionState,
    session: Option<Session>,
    ring: PreRollBuffer,
    queue: WriteQueue,
    encoder: SharedEncoder,
    writer: Option<WriterHandle>,
    tracking: Box<dyn TrackingService>,
    handle: PipelineHandle,
    session_drops: u64,
    /// Bumped for every session that opens a file; queued frames carry it to the writer.
    session_epoch: u64,
}

impl RecorderPipeline {
    /// Builds the pipeline and starts its writer task.
    pub fn start(
        settings: PipelineSettings,
        options: RecorderOptions,
        encoder: Box<dyn VideoEncoder>,
        tracking: Box<dyn TrackingService>,
    ) -> Result<Self, AppError> {
        let running = Arc::new(AtomicBool::new(true));
        let (queue, rx) = write_queue(settings.queue_capacity);
        let encoder = writer_task::shared_encoder(encoder);
        let writer = writer_task::spawn_writer(
            rx,
            Arc::clone(&encoder),
            Arc::clone(&running),
            settings.dequeue_timeout(),
        )?;
        let ring = PreRollBuffer::new(settings.pre_roll_capacity(options.frame_rate));
        info!(
            "🎥 Recorder ready: {} fps, {}x{}, pre-roll {} frames, post-roll {:?}, queue capacity {}",
            options.frame_rate,
            options.frame_size.0,
            options.frame_size.1,
            ring.capacity(),
            settings.post_roll(),
            queue.capacity()
        );

        Ok(RecorderPipeline {
            settings,
            options,
            state: SessionState::Idle,
            session: None,
            ring,
            queue,
            encoder,
            writer: Some(writer),
            tracking,
            handle: PipelineHandle {
                markers: MarkerSlot::new(),
                running,
                pending_settings: Arc::new(Mutex::new(None)),
                status: Arc::new(Mutex::new(PipelineStatus::default())),
            },
            session_drops: 0,
            session_epoch: 0,
        })
    }

    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn pre_roll(&self) -> &PreRollBuffer {
        &self.ring
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn frames_written(&self) -> u64 {
        self.writer.as_ref().map(|w| w.frames_written()).unwrap_or(0)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// Capture loop: one frame per iteration until the running flag clears.
    /// Transient read failures are retried after a short backoff; any other source error is
    /// fatal and ends the loop.
    pub fn run(&mut self, source: &mut dyn FrameSource) -> Result<(), AppError> {
        info!("▶️ Capture loop started on {}", source.describe());
        let mut result = Ok(());
        let mut consecutive_failures: u64 = 0;
        while self.handle.is_running() {
            match source.next_frame() {
                Ok(frame) => {
                    if consecutive_failures > 0 {
                        debug!("Stream recovered after {} failed read(s).", consecutive_failures);
                        consecutive_failures = 0;
                    }
                    self.tick(frame, Instant::now());
                }
                Err(e) if e.is_transient() => {
                    consecutive_failures += 1;
                    if consecutive_failures == 1 {
                        debug!("Frame read hiccup: {}. Retrying.", e);
                    }
                    self.poll_deadline(Instant::now());
                    std::thread::sleep(self.settings.read_retry_backoff());
                }
                Err(e) => {
                    error!("❌ Stream source failed: {}. Pipeline halting.", e);
                    result = Err(e);
                    break;
                }
            }
        }
        self.stop();
        result
    }

    /// One capture-loop iteration: consume at most one marker, fire the post-roll deadline,
    /// then route the frame according to the (possibly new) state.
    pub fn tick(&mut self, frame: Frame, now: Instant) {
        if self.state == SessionState::Idle {
            self.apply_pending_settings();
        }

        match self.state {
            SessionState::Idle => {
                if let Some(marker) = self.handle.markers.take() {
                    self.begin_session(marker);
                }
            }
            SessionState::Recording => {
                if let Some(marker) = self.handle.markers.take() {
                    self.end_recording(marker, now);
                }
            }
            SessionState::PostRoll => {
                if let Some(marker) = self.handle.markers.take() {
                    warn!("⚠️ Marker '{}' arrived during post-roll and was dropped.", marker);
                }
            }
            SessionState::Finalizing => {}
        }

        self.poll_deadline_inner(now);
        self.route_frame(frame);
        self.publish_status();
    }

    /// Fires the post-roll deadline without a frame, e.g. while the stream is hiccuping.
    pub fn poll_deadline(&mut self, now: Instant) {
        self.poll_deadline_inner(now);
        self.publish_status();
    }

    fn poll_deadline_inner(&mut self, now: Instant) {
        if self.state != SessionState::PostRoll {
            return;
        }
        let due = self
            .session
            .as_ref()
            .and_then(|s| s.post_roll_deadline)
            .map(|deadline| now >= deadline)
            .unwrap_or(true);
        if due {
            self.finalize();
        }
    }

    fn route_frame(&mut self, frame: Frame) {
        match self.state {
            SessionState::Idle => self.ring.push(frame),
            SessionState::Recording | SessionState::PostRoll => {
                self.enqueue(frame);
            }
            SessionState::Finalizing => {}
        }
    }

    fn enqueue(&mut self, frame: Frame) -> bool {
        let seq = frame.seq;
        if self.queue.enqueue(frame, self.session_epoch, self.settings.enqueue_timeout()) {
            if let Some(session) = self.session.as_mut() {
                session.frame_count += 1;
                if session.frame_count % PROGRESS_EVERY_FRAMES == 0 {
                    info!("⏺️ [{}] {} frames queued", session.start_marker, session.frame_count);
                }
            }
            true
        } else {
            self.session_drops += 1;
            if self.session_drops == 1 || self.session_drops % PROGRESS_EVERY_FRAMES == 0 {
                warn!(
                    "⚠️ Write queue full: dropped frame #{} ({} dropped this session)",
                    seq, self.session_drops
                );
            }
            false
        }
    }

    fn begin_session(&mut self, marker: String) {
        info!("🟢 START marker: {}", marker);
        let mut session = Session::new(marker);

        let tracking_id = match self.tracking.create_tracking(&session.start_marker) {
            Ok(id) => id,
            Err(e) => {
                error!(
                    "❌ Tracking record creation failed for '{}': {}. Staying idle.",
                    session.start_marker, e
                );
                self.record_outcome(&session, None, SessionOutcome::Aborted);
                return;
            }
        };
        info!("🏷️ Tracking record created: {}", tracking_id);
        session.tracking_id = Some(tracking_id);

        let output_dir = match file_utils::ensure_output_directory(&self.options.output_directory) {
            Ok(dir) => dir,
            Err(e) => {
                error!("❌ Cannot prepare output directory: {}. Session aborted.", e);
                self.record_outcome(&session, None, SessionOutcome::Aborted);
                return;
            }
        };
        session.output_path = output_dir.join(file_utils::recording_filename(
            &session.start_marker,
            &self.options.filename_timestamp_format,
            &self.options.video_format,
        ));

        let spec = self.options.encoder_spec();
        self.session_epoch += 1;
        let opened = self.encoder.lock().open_for(self.session_epoch, &session.output_path, &spec);
        if let Err(e) = opened {
            error!("❌ Could not open video writer: {}. Session aborted.", e);
            self.record_outcome(&session, None, SessionOutcome::Aborted);
            return;
        }
        info!("✍️ Recording to {}", session.output_path.display());

        session.update_state(SessionState::Recording);
        self.state = SessionState::Recording;
        self.session_drops = 0;
        self.session = Some(session);

        let pre_roll = self.ring.drain_in_order();
        let pre_roll_len = pre_roll.len();
        let mut queued = 0usize;
        for frame in pre_roll {
            if self.enqueue(frame) {
                queued += 1;
            }
        }
        debug!("Pre-roll hand-off: {} of {} frame(s) queued", queued, pre_roll_len);
    }

    fn end_recording(&mut self, marker: String, now: Instant) {
        info!("🔴 STOP marker: {}", marker);
        let post_roll = self.settings.post_roll();
        let Some(session) = self.session.as_mut() else {
            warn!("⚠️ Recording state without a session; ignoring stop marker '{}'.", marker);
            self.state = SessionState::Idle;
            return;
        };
        session.stop_marker = Some(marker.clone());

        if let Some(id) = session.tracking_id.clone() {
            let end_time = timestamp_utils::current_local_iso8601();
            match self.tracking.update_tracking(&id, &marker, &end_time) {
                Ok(()) => info!("🏷️ Tracking record {} updated with '{}'", id, marker),
                Err(e) => warn!("⚠️ Tracking update for {} failed: {}. Continuing.", id, e),
            }
        }

        session.post_roll_deadline = Some(now + post_roll);
        session.update_state(SessionState::PostRoll);
        self.state = SessionState::PostRoll;
    }

    fn finalize(&mut self) {
        let finalize_start = Instant::now();
        self.state = SessionState::Finalizing;
        let Some(mut session) = self.session.take() else {
            self.return_to_idle();
            return;
        };
        session.update_state(SessionState::Finalizing);
        self.publish_status();

        if !self.queue.flush(self.settings.writer_drain_timeout()) {
            warn!(
                "⚠️ Writer did not drain within {:?}; closing the encoder, leftover frames will be discarded.",
                self.settings.writer_drain_timeout()
            );
        }
        if let Err(e) = self.encoder.lock().close() {
            error!("❌ Failed to close encoder for '{}': {}", session.output_path.display(), e);
        } else {
            info!("💾 Video saved: {}", session.output_path.display());
        }

        let stop_marker = session.stop_marker.clone().unwrap_or_default();
        let artifact = if session.output_path.exists() {
            finalize::rename_artifact(
                &session.output_path,
                &session.start_marker,
                &stop_marker,
                &self.options.video_format,
            )
        } else {
            session.output_path.clone()
        };

        let outcome = match session.tracking_id.as_deref() {
            Some(id) => finalize::upload_and_release(self.tracking.as_ref(), id, &artifact),
            None => SessionOutcome::UploadFailed,
        };
        let retained = match outcome {
            SessionOutcome::UploadFailed => Some(artifact),
            _ => None,
        };
        session.output_path = retained.clone().unwrap_or_default();

        info!(
            "🏁 Session {} -> {} finished with {:?} ({} frames) in {:?}",
            session.start_marker,
            stop_marker,
            outcome,
            session.frame_count,
            finalize_start.elapsed()
        );
        self.record_outcome(&session, retained, outcome);
        self.return_to_idle();
    }

    fn return_to_idle(&mut self) {
        self.session = None;
        self.ring.clear();
        if let Some(stale) = self.handle.markers.take() {
            warn!("⚠️ Marker '{}' arrived while finalizing and was dropped.", stale);
        }
        self.state = SessionState::Idle;
        info!("✅ Ready, waiting for the next start marker.");
    }

    fn apply_pending_settings(&mut self) {
        let Some(mut new_settings) = self.handle.pending_settings.lock().take() else {
            return;
        };
        if new_settings == self.settings {
            return;
        }
        if new_settings.queue_capacity != self.settings.queue_capacity {
            warn!(
                "⚠️ Queue capacity change ({} -> {}) needs a restart; keeping {}.",
                self.settings.queue_capacity, new_settings.queue_capacity, self.settings.queue_capacity
            );
            new_settings.queue_capacity = self.settings.queue_capacity;
        }
        let capacity = new_settings.pre_roll_capacity(self.options.frame_rate);
        if capacity != self.ring.capacity() {
            info!("🔧 Pre-roll buffer resized {} -> {} frames", self.ring.capacity(), capacity);
            self.ring = PreRollBuffer::new(capacity);
        }
        info!("🔧 Pipeline settings updated: {:?}", new_settings);
        self.settings = new_settings;
    }

    fn record_outcome(&self, session: &Session, artifact: Option<PathBuf>, outcome: SessionOutcome) {
        self.handle.status.lock().record(SessionRecord {
            tracking_id: session.tracking_id.clone(),
            start_marker: session.start_marker.clone(),
            stop_marker: session.stop_marker.clone(),
            frames: session.frame_count,
            artifact,
            outcome,
            finished_at: Local::now(),
        });
    }

    fn publish_status(&self) {
        let mut status = self.handle.status.lock();
        status.sync_session(self.state, self.session.as_ref());
        status.frames_dropped = self.queue.dropped();
    }

    /// Shutdown sequence: clear the running flag, close the encoder if open, give the writer a
    /// grace period, send the sentinel and join the writer with a bounded wait.
    /// Returns whether the writer joined in time. Safe to call more than once.
    pub fn stop(&mut self) -> bool {
        let Some(writer) = self.writer.take() else {
            return true;
        };
        info!("🛑 Shutting down recorder...");
        self.handle.shutdown();

        {
            let mut encoder = self.encoder.lock();
            if encoder.is_open() {
                if let Err(e) = encoder.close() {
                    error!("❌ Failed to close encoder during shutdown: {}", e);
                }
            }
        }
        if let Some(session) = self.session.take() {
            warn!(
                "⚠️ Session '{}' interrupted by shutdown; artifact retained at {}",
                session.start_marker,
                session.output_path.display()
            );
            let retained = Some(session.output_path.clone()).filter(|p| p.exists());
            self.record_outcome(&session, retained, SessionOutcome::Interrupted);
        }
        self.state = SessionState::Idle;
        self.publish_status();

        std::thread::sleep(self.settings.shutdown_grace());
        let join_timeout = self.settings.writer_join_timeout();
        if !self.queue.send_shutdown(join_timeout) {
            warn!("⚠️ Write queue still full after {:?}; shutdown sentinel not delivered.", join_timeout);
        }
        let joined = writer.join_with_timeout(join_timeout);
        info!("👋 Recorder stopped (writer joined: {}).", joined);
        joined
    }
}
