//! Fire-and-forget background work.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::{Error, Result};

/// Run `work` on the runtime with a time budget. Failures and timeouts are
/// logged and dropped; the caller only gets a handle to abort the task.
pub fn spawn_background<F>(name: &'static str, timeout: Duration, work: F) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(timeout)),
        };

        match outcome {
            Ok(()) => tracing::debug!("{name} finished"),
            Err(error) => tracing::warn!("{name} failed: {error}"),
        }
    })
}

/// Aborts the wrapped task when dropped.
#[derive(Debug)]
pub struct AbortOnDrop(JoinHandle<()>);

impl AbortOnDrop {
    pub const fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }

    /// Wait for the task to end, however it ends.
    pub async fn finished(mut self) {
        let _ = (&mut self.0).await;
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
