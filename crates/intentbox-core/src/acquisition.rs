//! Model acquisition state machine.
//!
//! Consumes `(status, bytes_downloaded, bytes_total)` updates from the
//! distribution service and produces one [`AcquisitionSnapshot`] per update.
//! Retry and backoff belong to the service; the tracker only interprets.

use std::fmt;

use tracing::{info, warn};

use crate::CoreError;

/// Distribution service status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Pending,
    Running,
    Paused,
    Succeeded,
    Failed,
}

impl StatusCode {
    /// Map the service's integer constants. Anything else is a contract
    /// violation and is never defaulted to a known state.
    pub fn from_raw(code: i32) -> Result<Self, CoreError> {
        match code {
            1 => Ok(Self::Pending),
            2 => Ok(Self::Running),
            4 => Ok(Self::Paused),
            8 => Ok(Self::Succeeded),
            16 => Ok(Self::Failed),
            other => Err(CoreError::UnknownStatus(other)),
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            Self::Pending => 1,
            Self::Running => 2,
            Self::Paused => 4,
            Self::Succeeded => 8,
            Self::Failed => 16,
        }
    }
}

/// Lifecycle stage of the model artifact download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionState {
    #[default]
    Pending,
    Running,
    Paused,
    Succeeded,
    Failed,
}

impl AcquisitionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StatusCode> for AcquisitionState {
    fn from(code: StatusCode) -> Self {
        match code {
            StatusCode::Pending => Self::Pending,
            StatusCode::Running => Self::Running,
            StatusCode::Paused => Self::Paused,
            StatusCode::Succeeded => Self::Succeeded,
            StatusCode::Failed => Self::Failed,
        }
    }
}

/// One raw update from the distribution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: StatusCode,
    pub bytes_downloaded: u64,
    pub bytes_total: u64,
}

impl StatusUpdate {
    pub fn new(status: StatusCode, bytes_downloaded: u64, bytes_total: u64) -> Self {
        Self {
            status,
            bytes_downloaded,
            bytes_total,
        }
    }

    /// Build from the service's raw integer status.
    pub fn from_raw(code: i32, bytes_downloaded: u64, bytes_total: u64) -> Result<Self, CoreError> {
        Ok(Self::new(StatusCode::from_raw(code)?, bytes_downloaded, bytes_total))
    }

    /// Fraction downloaded in `[0, 1]`; `0` when the total is unknown.
    pub fn progress(&self) -> f32 {
        if self.bytes_total == 0 {
            return 0.0;
        }
        (self.bytes_downloaded as f64 / self.bytes_total as f64).clamp(0.0, 1.0) as f32
    }
}

/// Observable state after an update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AcquisitionSnapshot {
    pub state: AcquisitionState,
    pub progress: f32,
    pub bytes_downloaded: u64,
    pub bytes_total: u64,
    /// `false` once a terminal state is reached.
    pub keep_polling: bool,
}

impl AcquisitionSnapshot {
    fn initial() -> Self {
        Self {
            keep_polling: true,
            ..Default::default()
        }
    }
}

/// Folds status updates into snapshots.
#[derive(Debug, Clone)]
pub struct AcquisitionTracker {
    model: String,
    current: AcquisitionSnapshot,
}

impl AcquisitionTracker {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            current: AcquisitionSnapshot::initial(),
        }
    }

    pub fn snapshot(&self) -> AcquisitionSnapshot {
        self.current
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Apply one update and return the resulting snapshot.
    ///
    /// Updates after a terminal state leave the snapshot unchanged.
    pub fn observe(&mut self, update: StatusUpdate) -> AcquisitionSnapshot {
        if self.current.state.is_terminal() {
            warn!(
                model = %self.model,
                state = %self.current.state,
                status = ?update.status,
                "ignoring status update after terminal state"
            );
            return self.current;
        }

        let state = AcquisitionState::from(update.status);
        let next = AcquisitionSnapshot {
            state,
            progress: update.progress(),
            bytes_downloaded: update.bytes_downloaded,
            bytes_total: update.bytes_total,
            keep_polling: !state.is_terminal(),
        };

        if next.state != self.current.state {
            info!(
                model = %self.model,
                from = %self.current.state,
                to = %next.state,
                progress = next.progress,
                "acquisition state changed"
            );
        }
        self.current = next;
        next
    }

    /// Apply an update carrying the service's raw status code.
    pub fn observe_raw(
        &mut self,
        code: i32,
        bytes_downloaded: u64,
        bytes_total: u64,
    ) -> Result<AcquisitionSnapshot, CoreError> {
        let update = StatusUpdate::from_raw(code, bytes_downloaded, bytes_total)?;
        Ok(self.observe(update))
    }

    /// Force the tracker into `Failed`, e.g. when polling times out.
    pub fn fail(&mut self) -> AcquisitionSnapshot {
        let s = self.current;
        self.observe(StatusUpdate::new(
            StatusCode::Failed,
            s.bytes_downloaded,
            s.bytes_total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_sequence_to_success() {
        let mut tracker = AcquisitionTracker::new("PandApp-T4");
        let updates = [
            StatusUpdate::new(StatusCode::Pending, 0, 0),
            StatusUpdate::new(StatusCode::Running, 50, 100),
            StatusUpdate::new(StatusCode::Running, 90, 100),
            StatusUpdate::new(StatusCode::Succeeded, 100, 100),
        ];
        let polls: Vec<bool> = updates
            .iter()
            .map(|u| tracker.observe(*u).keep_polling)
            .collect();
        assert_eq!(polls, vec![true, true, true, false]);

        let last = tracker.snapshot();
        assert_eq!(last.state, AcquisitionState::Succeeded);
        assert_eq!(last.progress, 1.0);
    }

    #[test]
    fn success_with_short_byte_count_is_not_full_progress() {
        let mut tracker = AcquisitionTracker::new("m");
        let snap = tracker.observe(StatusUpdate::new(StatusCode::Succeeded, 90, 100));
        assert_eq!(snap.state, AcquisitionState::Succeeded);
        assert!((snap.progress - 0.9).abs() < 1e-6);
    }

    #[test]
    fn running_progress_fraction() {
        let mut tracker = AcquisitionTracker::new("m");
        let snap = tracker.observe(StatusUpdate::new(StatusCode::Running, 50, 100));
        assert_eq!(snap.progress, 0.5);
        assert!(snap.keep_polling);
    }

    #[test]
    fn zero_total_means_zero_progress() {
        let update = StatusUpdate::new(StatusCode::Running, 1234, 0);
        assert_eq!(update.progress(), 0.0);
    }

    #[test]
    fn progress_is_clamped() {
        let update = StatusUpdate::new(StatusCode::Running, 150, 100);
        assert_eq!(update.progress(), 1.0);
    }

    #[test]
    fn paused_and_pending_keep_polling() {
        let mut tracker = AcquisitionTracker::new("m");
        assert!(tracker.observe(StatusUpdate::new(StatusCode::Paused, 10, 100)).keep_polling);
        assert_eq!(tracker.snapshot().state, AcquisitionState::Paused);
        assert!(tracker.observe(StatusUpdate::new(StatusCode::Pending, 10, 100)).keep_polling);
    }

    #[test]
    fn failure_stops_polling() {
        let mut tracker = AcquisitionTracker::new("m");
        tracker.observe(StatusUpdate::new(StatusCode::Running, 10, 100));
        let snap = tracker.observe(StatusUpdate::new(StatusCode::Failed, 10, 100));
        assert_eq!(snap.state, AcquisitionState::Failed);
        assert!(!snap.keep_polling);
    }

    #[test]
    fn updates_after_terminal_are_ignored() {
        let mut tracker = AcquisitionTracker::new("m");
        tracker.observe(StatusUpdate::new(StatusCode::Succeeded, 100, 100));
        let snap = tracker.observe(StatusUpdate::new(StatusCode::Running, 5, 100));
        assert_eq!(snap.state, AcquisitionState::Succeeded);
        assert_eq!(snap.progress, 1.0);
        assert!(!snap.keep_polling);
    }

    #[test]
    fn raw_codes_map_to_states() {
        let mut tracker = AcquisitionTracker::new("m");
        assert_eq!(tracker.observe_raw(1, 0, 0).unwrap().state, AcquisitionState::Pending);
        assert_eq!(tracker.observe_raw(2, 1, 2).unwrap().state, AcquisitionState::Running);
        assert_eq!(tracker.observe_raw(4, 1, 2).unwrap().state, AcquisitionState::Paused);
        assert_eq!(tracker.observe_raw(16, 1, 2).unwrap().state, AcquisitionState::Failed);
        for code in [StatusCode::Pending, StatusCode::Succeeded, StatusCode::Failed] {
            assert_eq!(StatusCode::from_raw(code.as_raw()).unwrap(), code);
        }
    }

    #[test]
    fn unknown_raw_code_is_fatal() {
        let mut tracker = AcquisitionTracker::new("m");
        let err = tracker.observe_raw(3, 0, 0).unwrap_err();
        assert!(matches!(err, CoreError::UnknownStatus(3)));
        assert!(err.is_fatal());
        // State untouched.
        assert_eq!(tracker.snapshot().state, AcquisitionState::Pending);
        assert!(tracker.snapshot().keep_polling);
    }

    #[test]
    fn forced_failure_keeps_byte_counts() {
        let mut tracker = AcquisitionTracker::new("m");
        tracker.observe(StatusUpdate::new(StatusCode::Running, 30, 60));
        let snap = tracker.fail();
        assert_eq!(snap.state, AcquisitionState::Failed);
        assert_eq!(snap.bytes_downloaded, 30);
        assert_eq!(snap.progress, 0.5);
    }
}
