//! Async service wrapper around the engine context.
//!
//! Scan requests arrive over a channel and run on the blocking pool; a
//! per-scan watchdog trips the cancellation token when the configured
//! timeout expires. Shutdown drains nothing: in-flight work observes its
//! token and returns a cancelled envelope.

use crate::api;
use crate::context::EngineContext;
use crate::pipeline::{ScanReport, ScanRequest};
use common::errors::EngineError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// One queued scan.
struct ScanJob {
    request: ScanRequest,
    reply: oneshot::Sender<api::ApiResponse<ScanReport>>,
}

/// Sends work to a running [`EngineService`].
#[derive(Clone)]
pub struct EngineServiceHandle {
    jobs: mpsc::Sender<ScanJob>,
    shutdown: mpsc::Sender<()>,
}

impl EngineServiceHandle {
    /// Submits a scan and waits for its envelope.
    pub async fn scan(&self, request: ScanRequest) -> api::ApiResponse<ScanReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = ScanJob {
            request,
            reply: reply_tx,
        };
        if self.jobs.send(job).await.is_err() {
            return api::ApiResponse {
                success: false,
                data: None,
                error: Some(api::ApiError {
                    kind: "internal".to_string(),
                    message: "engine service is down".to_string(),
                }),
                elapsed_ms: 0.0,
            };
        }
        match reply_rx.await {
            Ok(response) => response,
            Err(_) => api::ApiResponse {
                success: false,
                data: None,
                error: Some(api::ApiError {
                    kind: "cancelled".to_string(),
                    message: "engine service dropped the scan".to_string(),
                }),
                elapsed_ms: 0.0,
            },
        }
    }

    /// Requests a graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(()).await;
    }
}

/// Owns the context and processes scan jobs sequentially.
pub struct EngineService {
    ctx: Arc<EngineContext>,
    jobs: mpsc::Receiver<ScanJob>,
    shutdown: mpsc::Receiver<()>,
}

impl EngineService {
    /// Builds the service and its handle.
    pub fn channel(ctx: Arc<EngineContext>, buffer: usize) -> (EngineServiceHandle, EngineService) {
        let (jobs_tx, jobs_rx) = mpsc::channel(buffer.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            EngineServiceHandle {
                jobs: jobs_tx,
                shutdown: shutdown_tx,
            },
            EngineService {
                ctx,
                jobs: jobs_rx,
                shutdown: shutdown_rx,
            },
        )
    }

    /// Main service loop; returns once shut down or all handles dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    log::info!("engine service shutting down");
                    break;
                }
                maybe_job = self.jobs.recv() => {
                    match maybe_job {
                        Some(job) => self.process(job).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn process(&self, job: ScanJob) {
        let timeout = Duration::from_millis(self.ctx.config().scan.timeout_ms);
        let cancel = CancellationToken::new();

        let ctx = Arc::clone(&self.ctx);
        let request = job.request;
        let worker_cancel = cancel.clone();
        let mut worker = tokio::task::spawn_blocking(move || {
            api::scan(&ctx, &request, &worker_cancel)
        });

        let response = tokio::select! {
            joined = &mut worker => Self::unwrap_join(joined),
            _ = tokio::time::sleep(timeout) => {
                log::warn!("scan exceeded {}ms budget, cancelling", timeout.as_millis());
                cancel.cancel();
                Self::unwrap_join(worker.await)
            }
        };

        if job.reply.send(response).is_err() {
            log::debug!("scan requester went away before the reply");
        }
    }

    fn unwrap_join(
        joined: Result<api::ApiResponse<ScanReport>, tokio::task::JoinError>,
    ) -> api::ApiResponse<ScanReport> {
        match joined {
            Ok(response) => response,
            Err(e) => {
                let err = EngineError::Internal(format!("scan worker panicked: {e}"));
                api::ApiResponse {
                    success: false,
                    data: None,
                    error: Some(api::ApiError {
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                    }),
                    elapsed_ms: 0.0,
                }
            }
        }
    }
}
