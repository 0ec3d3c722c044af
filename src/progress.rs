use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use utoipa::ToSchema;

/// Sample counters shared between extraction workers and whoever is watching
#[derive(Debug, Default)]
pub struct Progress {
    total: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub fraction: f64,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total: AtomicUsize::new(total),
            ..Default::default()
        }
    }

    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// Record one finished sample
    pub fn record(&self, failed: bool) {
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_done(&self) -> bool {
        let snapshot = self.snapshot();
        snapshot.completed >= snapshot.total
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let fraction = if total == 0 {
            1.0
        } else {
            (completed as f64 / total as f64).min(1.0)
        };
        ProgressSnapshot {
            total,
            completed,
            failed,
            fraction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_progress_is_complete() {
        let progress = Progress::new(0);
        assert_eq!(progress.snapshot().fraction, 1.0);
        assert!(progress.is_done());
    }

    #[test]
    fn test_record_counts_failures() {
        let progress = Progress::new(4);
        progress.record(false);
        progress.record(true);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.fraction, 0.5);
        assert!(!progress.is_done());
    }

    #[tokio::test]
    async fn test_record_from_many_tasks() {
        let progress = Arc::new(Progress::new(100));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let progress = progress.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    progress.record(false);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(progress.is_done());
        assert_eq!(progress.snapshot().completed, 100);
    }
}
