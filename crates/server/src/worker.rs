//! Bounded job worker pool.
//!
//! Workers pull decoded jobs off a shared channel and drive each one
//! through the orchestrator. Capacity is fixed by
//! `orchestrator.workers`; submissions beyond the channel bound are
//! rejected at the API.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

use harvester_core::job::Job;
use harvester_core::JobOrchestrator;

pub fn spawn_workers(
    count: usize,
    jobs_rx: mpsc::Receiver<Job>,
    orchestrator: Arc<JobOrchestrator>,
    shutdown_tx: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    let jobs_rx = Arc::new(Mutex::new(jobs_rx));

    (0..count)
        .map(|worker_id| {
            let jobs_rx = Arc::clone(&jobs_rx);
            let orchestrator = Arc::clone(&orchestrator);
            let mut shutdown_rx = shutdown_tx.subscribe();

            tokio::spawn(async move {
                info!("Job worker {} started", worker_id);
                loop {
                    let job = tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        job = recv_next(&jobs_rx) => match job {
                            Some(job) => job,
                            None => break,
                        },
                    };

                    let job_id = job.id.clone();
                    info!("Worker {} picked up job {}", worker_id, job_id);
                    orchestrator.process(job).await;
                }
                info!("Job worker {} stopped", worker_id);
            })
        })
        .collect()
}

/// Hold the receiver lock only while this worker is the one polling.
async fn recv_next(jobs_rx: &Arc<Mutex<mpsc::Receiver<Job>>>) -> Option<Job> {
    jobs_rx.lock().await.recv().await
}
