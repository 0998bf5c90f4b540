use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Recording,
    PostRoll,
    Finalizing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "IDLE",
            SessionState::Recording => "RECORDING",
            SessionState::PostRoll => "POST_ROLL",
            SessionState::Finalizing => "FINALIZING",
        };
        f.write_str(label)
    }
}

/// One bounded recording, from accepted start marker to finalize.
#[derive(Debug, Clone)]
pub struct Session {
    pub tracking_id: Option<String>,
    pub start_marker: String,
    pub stop_marker: Option<String>,
    pub started_at: DateTime<Local>,
    pub frame_count: u64,
    pub output_path: PathBuf,
    pub state: SessionState,
    pub post_roll_deadline: Option<Instant>,
}

impl Session {
    /// A session exists from the accepted start marker on; the tracking id and output path
    /// are filled in once the create call and encoder open succeed.
    pub fn new(start_marker: String) -> Self {
        Session {
            tracking_id: None,
            start_marker,
            stop_marker: None,
            started_at: Local::now(),
            frame_count: 0,
            output_path: PathBuf::new(),
            state: SessionState::Idle,
            post_roll_deadline: None,
        }
    }

    pub fn update_state(&mut self, new_state: SessionState) {
        info!(
            "Session '{}' state changed from {} to {}",
            self.start_marker, self.state, new_state
        );
        self.state = new_state;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionOutcome {
    /// Uploaded and removed locally.
    Completed,
    /// Artifact retained on disk for manual recovery.
    UploadFailed,
    /// Never reached RECORDING (tracking create or encoder open failed).
    Aborted,
    /// Finalize found no file on disk, so nothing was uploaded.
    NoArtifact,
    /// Pipeline shut down while the session was active.
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub tracking_id: Option<String>,
    pub start_marker: String,
    pub stop_marker: Option<String>,
    pub frames: u64,
    pub artifact: Option<PathBuf>,
    pub outcome: SessionOutcome,
    pub finished_at: DateTime<Local>,
}

/// Snapshot of the pipeline for whatever status surface sits on top of it.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub state: SessionState,
    pub start_marker: Option<String>,
    pub stop_marker: Option<String>,
    pub tracking_id: Option<String>,
    pub session_frames: u64,
    pub frames_dropped: u64,
    pub sessions_completed: u64,
    pub history: VecDeque<SessionRecord>,
}

impl Default for PipelineStatus {
    fn default() -> Self {
        PipelineStatus {
            state: SessionState::Idle,
            start_marker: None,
            stop_marker: None,
            tracking_id: None,
            session_frames: 0,
            frames_dropped: 0,
            sessions_completed: 0,
            history: VecDeque::new(),
        }
    }
}

impl PipelineStatus {
    pub fn record(&mut self, record: SessionRecord) {
        if record.outcome == SessionOutcome::Completed {
            self.sessions_completed += 1;
        }
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    pub fn sync_session(&mut self, state: SessionState, session: Option<&Session>) {
        self.state = state;
        self.start_marker = session.map(|s| s.start_marker.clone());
        self.stop_marker = session.and_then(|s| s.stop_marker.clone());
        self.tracking_id = session.and_then(|s| s.tracking_id.clone());
        self.session_frames = session.map(|s| s.frame_count).unwrap_or(0);
    }

    pub fn last_record(&self) -> Option<&SessionRecord> {
        self.history.back()
    }
}
