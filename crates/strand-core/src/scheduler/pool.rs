//! Blocking worker pool
//!
//! Step functions must never block. Work that does (file reads, heavy
//! computation, `thread::sleep`) is handed to this pool instead; the closure
//! runs on a worker thread and reports back to the scheduler through its own
//! completion channel. The scheduler only sees the completion as an external
//! event for the owning task.

use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A unit of blocking work
pub type BlockingWork = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of threads for blocking closures
pub struct BlockingPool {
    work_tx: Option<Sender<BlockingWork>>,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl BlockingPool {
    /// Start `threads` workers (at least one).
    pub fn new(threads: usize) -> std::io::Result<Self> {
        let threads = threads.max(1);
        let (work_tx, work_rx) = channel::unbounded::<BlockingWork>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads {
            let rx = work_rx.clone();
            let shutdown = shutdown.clone();
            let handle = thread::Builder::new()
                .name(format!("strand-blocking-{}", i))
                .spawn(move || Self::worker_loop(rx, shutdown))?;
            handles.push(handle);
        }

        tracing::debug!(threads, "blocking pool started");

        Ok(Self {
            work_tx: Some(work_tx),
            shutdown,
            handles,
        })
    }

    /// Number of worker threads
    pub fn thread_count(&self) -> usize {
        self.handles.len()
    }

    /// Queue a closure. Returns false if the pool has been shut down.
    pub fn execute(&self, work: BlockingWork) -> bool {
        match &self.work_tx {
            Some(tx) => tx.send(work).is_ok(),
            None => false,
        }
    }

    fn worker_loop(work_rx: Receiver<BlockingWork>, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::Acquire) {
            let work = match work_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(w) => w,
                Err(channel::RecvTimeoutError::Timeout) => continue,
                Err(channel::RecvTimeoutError::Disconnected) => break,
            };

            // The closure reports its own completion
            work();
        }
    }

    /// Stop accepting work and join the workers.
    ///
    /// Queued closures that have not started are dropped. A worker stuck in a
    /// long closure is detached after a bounded wait.
    pub fn shutdown(&mut self) {
        if self.work_tx.is_none() {
            return;
        }

        self.shutdown.store(true, Ordering::Release);
        self.work_tx.take();

        let timeout = Duration::from_secs(2);
        for handle in self.handles.drain(..) {
            Self::join_with_timeout(handle, timeout);
        }

        tracing::debug!("blocking pool stopped");
    }

    /// Join a thread with timeout, detach if stuck.
    fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) {
        let start = Instant::now();
        loop {
            if handle.is_finished() {
                let _ = handle.join();
                return;
            }
            if start.elapsed() > timeout {
                tracing::warn!("blocking worker did not stop in time; detaching");
                drop(handle);
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Drop for BlockingPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_runs_work() {
        let mut pool = BlockingPool::new(2).unwrap();
        assert_eq!(pool.thread_count(), 2);

        let (tx, rx) = channel::unbounded();
        for i in 0..4 {
            let tx = tx.clone();
            assert!(pool.execute(Box::new(move || {
                let _ = tx.send(i * i);
            })));
        }

        let mut results: Vec<i32> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        results.sort();
        assert_eq!(results, vec![0, 1, 4, 9]);

        pool.shutdown();
    }

    #[test]
    fn test_pool_minimum_one_thread() {
        let pool = BlockingPool::new(0).unwrap();
        assert_eq!(pool.thread_count(), 1);
    }

    #[test]
    fn test_execute_after_shutdown() {
        let mut pool = BlockingPool::new(1).unwrap();
        pool.shutdown();
        assert!(!pool.execute(Box::new(|| {})));
        // Idempotent
        pool.shutdown();
    }
}
