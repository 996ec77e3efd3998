//! Drives a [`DistributionService`] and publishes acquisition snapshots.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use intentbox_core::{AcquisitionSnapshot, AcquisitionState, AcquisitionTracker, StatusUpdate};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::SyncError;

/// Status notification as emitted by the distribution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStatus {
    pub code: i32,
    pub bytes_downloaded: u64,
    pub bytes_total: u64,
}

impl From<StatusUpdate> for RawStatus {
    fn from(u: StatusUpdate) -> Self {
        Self {
            code: u.status.as_raw(),
            bytes_downloaded: u.bytes_downloaded,
            bytes_total: u.bytes_total,
        }
    }
}

/// Remote service that fetches or updates a named model artifact.
#[async_trait]
pub trait DistributionService: Send + Sync {
    /// Fetch `name`, reporting progress on `updates`, and return the local
    /// path of the artifact once it is complete.
    async fn fetch(
        &self,
        name: &str,
        updates: mpsc::Sender<RawStatus>,
    ) -> Result<PathBuf, SyncError>;
}

const UPDATE_BUFFER: usize = 64;

/// Acquire `name` through `service`.
///
/// Every status update is folded through an [`AcquisitionTracker`] and the
/// resulting snapshot replaces the value in `snapshots`. The whole acquisition
/// is bounded by `timeout`; on expiry the published state becomes `Failed`.
pub async fn acquire<S>(
    service: &S,
    name: &str,
    snapshots: &watch::Sender<AcquisitionSnapshot>,
    timeout: Duration,
) -> Result<PathBuf, SyncError>
where
    S: DistributionService + ?Sized,
{
    let mut tracker = AcquisitionTracker::new(name);
    snapshots.send_replace(tracker.snapshot());

    let run = async {
        let (tx, mut rx) = mpsc::channel::<RawStatus>(UPDATE_BUFFER);
        let fetch = service.fetch(name, tx);
        tokio::pin!(fetch);

        let mut fetched = None;
        loop {
            tokio::select! {
                result = &mut fetch, if fetched.is_none() => fetched = Some(result),
                raw = rx.recv() => match raw {
                    Some(raw) => {
                        let snap = tracker.observe_raw(
                            raw.code,
                            raw.bytes_downloaded,
                            raw.bytes_total,
                        )?;
                        snapshots.send_replace(snap);
                        if !snap.keep_polling {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        match fetched {
            Some(result) => result,
            None => fetch.await,
        }
    };

    let outcome = tokio::time::timeout(timeout, run).await;
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(model = name, ?timeout, "acquisition timed out");
            snapshots.send_replace(tracker.fail());
            return Err(SyncError::Timeout {
                model: name.to_string(),
                after: timeout,
            });
        }
    };

    let snapshot = tracker.snapshot();
    match outcome {
        Ok(path) if snapshot.state == AcquisitionState::Succeeded => {
            info!(model = name, path = %path.display(), "model acquired");
            Ok(path)
        }
        Ok(_) if snapshot.state == AcquisitionState::Failed => {
            Err(SyncError::Failed(name.to_string()))
        }
        Ok(_) => {
            snapshots.send_replace(tracker.fail());
            Err(SyncError::Incomplete(name.to_string()))
        }
        Err(e) => {
            if !snapshot.state.is_terminal() {
                snapshots.send_replace(tracker.fail());
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intentbox_core::{CoreError, StatusCode};

    /// Replays a scripted sequence of updates, then returns `result`.
    struct Scripted {
        updates: Vec<RawStatus>,
        result: fn() -> Result<PathBuf, SyncError>,
        hang: bool,
    }

    #[async_trait]
    impl DistributionService for Scripted {
        async fn fetch(
            &self,
            _name: &str,
            updates: mpsc::Sender<RawStatus>,
        ) -> Result<PathBuf, SyncError> {
            for u in &self.updates {
                let _ = updates.send(*u).await;
            }
            if self.hang {
                std::future::pending::<()>().await;
            }
            (self.result)()
        }
    }

    fn raw(status: StatusCode, done: u64, total: u64) -> RawStatus {
        StatusUpdate::new(status, done, total).into()
    }

    fn ok_path() -> Result<PathBuf, SyncError> {
        Ok(PathBuf::from("/models/PandApp-T4.onnx"))
    }

    fn channel() -> (
        watch::Sender<AcquisitionSnapshot>,
        watch::Receiver<AcquisitionSnapshot>,
    ) {
        watch::channel(AcquisitionSnapshot::default())
    }

    #[tokio::test]
    async fn successful_acquisition_publishes_final_snapshot() {
        let service = Scripted {
            updates: vec![
                raw(StatusCode::Pending, 0, 0),
                raw(StatusCode::Running, 50, 100),
                raw(StatusCode::Running, 90, 100),
                raw(StatusCode::Succeeded, 100, 100),
            ],
            result: ok_path,
            hang: false,
        };
        let (tx, rx) = channel();
        let path = acquire(&service, "PandApp-T4", &tx, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("/models/PandApp-T4.onnx"));

        let snap = *rx.borrow();
        assert_eq!(snap.state, AcquisitionState::Succeeded);
        assert_eq!(snap.progress, 1.0);
        assert!(!snap.keep_polling);
    }

    #[tokio::test]
    async fn service_failure_is_terminal() {
        let service = Scripted {
            updates: vec![
                raw(StatusCode::Running, 10, 100),
                raw(StatusCode::Failed, 10, 100),
            ],
            result: || Err(SyncError::Failed("PandApp-T4".into())),
            hang: false,
        };
        let (tx, rx) = channel();
        let err = acquire(&service, "PandApp-T4", &tx, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Failed(_)));
        assert_eq!(rx.borrow().state, AcquisitionState::Failed);
        assert_eq!(rx.borrow().progress, 0.1);
    }

    #[tokio::test]
    async fn unknown_status_code_fails_loudly() {
        let service = Scripted {
            updates: vec![RawStatus {
                code: 3,
                bytes_downloaded: 0,
                bytes_total: 0,
            }],
            result: ok_path,
            hang: false,
        };
        let (tx, _rx) = channel();
        let err = acquire(&service, "m", &tx, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Core(CoreError::UnknownStatus(3))));
    }

    #[tokio::test]
    async fn path_without_success_status_is_incomplete() {
        let service = Scripted {
            updates: vec![raw(StatusCode::Running, 5, 10)],
            result: ok_path,
            hang: false,
        };
        let (tx, rx) = channel();
        let err = acquire(&service, "m", &tx, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Incomplete(_)));
        assert_eq!(rx.borrow().state, AcquisitionState::Failed);
    }

    #[tokio::test]
    async fn stalled_service_times_out() {
        let service = Scripted {
            updates: vec![raw(StatusCode::Paused, 40, 100)],
            result: ok_path,
            hang: true,
        };
        let (tx, rx) = channel();
        let err = acquire(&service, "m", &tx, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout { .. }));
        let snap = *rx.borrow();
        assert_eq!(snap.state, AcquisitionState::Failed);
        assert_eq!(snap.bytes_downloaded, 40);
        assert!(!snap.keep_polling);
    }
}
