//! Progress reporting for sort runs

use crate::models::ProgressUpdate;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::broadcast;

/// Snapshot sent to subscribers
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub progress: ProgressUpdate,
    pub timestamp: SystemTime,
}

struct TrackerState {
    progress: ProgressUpdate,
    last_emit: Instant,
}

/// Counts finished files and broadcasts at most one snapshot per interval
pub struct ProgressTracker {
    started: Instant,
    state: Mutex<TrackerState>,
    sender: broadcast::Sender<ProgressEvent>,
    min_interval: Duration,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::with_update_interval(Duration::from_millis(250))
    }

    pub fn with_update_interval(min_interval: Duration) -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            started: Instant::now(),
            state: Mutex::new(TrackerState {
                progress: ProgressUpdate::new(),
                last_emit: Instant::now(),
            }),
            sender,
            min_interval,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn set_total_files(&self, total: u64) {
        self.update(|progress| progress.total_files = total);
    }

    /// Mark one file as finished
    pub fn file_done(&self, path: PathBuf, moved: bool) {
        self.update(|progress| {
            progress.files_processed += 1;
            progress.files_moved += u64::from(moved);
            progress.current_file = Some(path);
        });
    }

    pub fn get_current_progress(&self) -> ProgressUpdate {
        self.state
            .lock()
            .map(|state| state.progress.clone())
            .unwrap_or_default()
    }

    /// Broadcast the current snapshot regardless of the interval
    pub fn emit_progress(&self) {
        self.send(self.get_current_progress());
    }

    pub fn reset(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.progress = ProgressUpdate::new();
            state.last_emit = Instant::now();
        }
    }

    pub fn elapsed_time(&self) -> Duration {
        self.started.elapsed()
    }

    /// Files per second since the tracker was created
    pub fn processing_rate(&self) -> f64 {
        let secs = self.started.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.get_current_progress().files_processed as f64 / secs
        } else {
            0.0
        }
    }

    fn update<F: FnOnce(&mut ProgressUpdate)>(&self, apply: F) {
        let due = match self.state.lock() {
            Ok(mut state) => {
                apply(&mut state.progress);
                if state.last_emit.elapsed() >= self.min_interval {
                    state.last_emit = Instant::now();
                    Some(state.progress.clone())
                } else {
                    None
                }
            }
            Err(_) => None,
        };
        if let Some(progress) = due {
            self.send(progress);
        }
    }

    fn send(&self, progress: ProgressUpdate) {
        // Nobody listening is fine
        let _ = self.sender.send(ProgressEvent {
            progress,
            timestamp: SystemTime::now(),
        });
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
