//! `WorkerPool`: a fixed-size pool consuming an execution queue (spec 4.6).
//!
//! Workers never talk to each other — every coordination decision passes
//! through the executor's completion queue, which the runner closure
//! supplied at construction is responsible for feeding. The same pool type
//! serves both the run and clean phases; only the runner differs.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

/// `clamp(available_parallelism, 2, 8)`, overridable via `args._workers`
/// (spec 4.6).
pub fn default_worker_count() -> usize {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
    cores.clamp(2, 8)
}

/// A fixed-size pool of long-lived workers draining one unbounded FIFO
/// queue. `Job` is whatever unit of work the executor wants to hand off —
/// it carries its own "what to do when finished" via the runner closure's
/// captured state, so `WorkerPool` itself stays oblivious to task
/// semantics.
pub struct WorkerPool<Job: Send + 'static> {
    sender: mpsc::UnboundedSender<Job>,
    handles: Vec<JoinHandle<()>>,
}

impl<Job: Send + 'static> WorkerPool<Job> {
    /// Spawns `workers` long-lived tasks, each popping one `Job` at a time
    /// and invoking `runner` on it, until the channel is closed (the
    /// sentinel in spec 4.6's "loop until a sentinel closes the channel").
    pub fn start<R>(workers: usize, runner: R) -> Self
    where
        R: Fn(Job) + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel::<Job>();
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let runner = Arc::new(runner);

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let receiver = receiver.clone();
            let runner = runner.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    match job {
                        Some(job) => runner(job),
                        None => break,
                    }
                }
            }));
        }

        Self { sender, handles }
    }

    pub fn enqueue(&self, job: Job) {
        // The queue is unbounded and workers only ever leave via the
        // sentinel this type itself controls, so a send failure here
        // means we're enqueueing after `shutdown` — a caller bug.
        let _ = self.sender.send(job);
    }

    /// Closes the queue (the sentinel) and waits for every worker to
    /// drain and exit.
    pub async fn shutdown(self) {
        drop(self.sender);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
