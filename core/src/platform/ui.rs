//! UI-affinity executor
//!
//! A dedicated thread with its own current-thread runtime. Jobs run one at a
//! time in submission order; the caller awaits the result.

use crate::error::{KioskError, Result};
use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Clone)]
pub struct UiExecutor {
    tx: mpsc::UnboundedSender<Job>,
}

impl UiExecutor {
    /// Start the executor thread. It exits once every handle is dropped.
    pub fn spawn(name: &str) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some(job) = rx.recv().await {
                        job().await;
                    }
                });
                tracing::debug!("ui executor stopped");
            })?;

        Ok(Self { tx })
    }

    /// Run `f` on the executor thread and wait for its output
    pub async fn run<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                let _ = done_tx.send(f().await);
            })
        });
        self.tx.send(job).map_err(|_| KioskError::UiExecutorClosed)?;
        done_rx.await.map_err(|_| KioskError::UiExecutorClosed)
    }
}
