//! Fixed-size worker pool in front of remote calls.

use std::fmt::Display;
use std::future::Future;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};

use crate::models::RunReport;

/// Results of running a task over every item.
#[derive(Debug)]
pub struct PoolReport<T> {
    pub total: usize,
    pub outputs: Vec<T>,
    /// (item label, error message)
    pub failures: Vec<(String, String)>,
}

impl<T> PoolReport<T> {
    pub fn succeeded(&self) -> usize {
        self.outputs.len()
    }

    /// Counts for display; outputs are dropped.
    pub fn to_run_report(&self, operation: &str) -> RunReport {
        let mut report = RunReport::new(operation);
        report.total = self.total;
        report.succeeded = self.outputs.len();
        for (item, error) in &self.failures {
            report.fail(item.clone(), error);
        }
        report
    }
}

/// Runs an async task per item with at most `workers` in flight.
///
/// A failing item is logged and recorded; it never stops the other items.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    progress: bool,
    message: Option<String>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            progress: true,
            message: None,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn progress_bar(&self, len: usize) -> Option<ProgressBar> {
        if !self.progress {
            return None;
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        if let Some(message) = &self.message {
            pb.set_message(message.clone());
        }
        Some(pb)
    }

    pub async fn run<I, T, E, F, Fut>(&self, items: impl IntoIterator<Item = I>, task: F) -> PoolReport<T>
    where
        I: Display,
        E: Display,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let items: Vec<I> = items.into_iter().collect();
        let total = items.len();
        let pb = self.progress_bar(total);

        let mut stream = futures::stream::iter(items.into_iter().map(|item| {
            let label = item.to_string();
            let fut = task(item);
            async move { (label, fut.await) }
        }))
        .buffer_unordered(self.workers);

        let mut report = PoolReport {
            total,
            outputs: Vec::with_capacity(total),
            failures: Vec::new(),
        };

        while let Some((label, result)) = stream.next().await {
            match result {
                Ok(output) => report.outputs.push(output),
                Err(e) => {
                    tracing::error!(item = %label, error = %e, "task failed");
                    report.failures.push((label, e.to_string()));
                }
            }
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_collects_outputs_and_failures() {
        let pool = WorkerPool::new(3).with_progress(false);
        let report = pool
            .run(1..=5u32, |n| async move {
                if n % 2 == 0 {
                    Err(format!("even {n}"))
                } else {
                    Ok(n * 10)
                }
            })
            .await;

        assert_eq!(report.total, 5);
        let mut outputs = report.outputs.clone();
        outputs.sort();
        assert_eq!(outputs, vec![10, 30, 50]);
        assert_eq!(report.failures.len(), 2);

        let run = report.to_run_report("fetch");
        assert_eq!(run.succeeded, 3);
        assert_eq!(run.failed(), 2);
    }

    #[tokio::test]
    async fn test_limits_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(2).with_progress(false);

        let report = pool
            .run(0..8u32, |_| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                }
            })
            .await;

        assert_eq!(report.succeeded(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_zero_workers_clamped() {
        assert_eq!(WorkerPool::new(0).workers(), 1);
    }
}
