//! Pull over HTTP into the local store

use async_trait::async_trait;

use crate::remote::RpcClient;
use crate::services::LocalStore;
use crate::util::now_ms;
use crate::Result;

use super::{MergeReport, RemoteSync};

/// Fetches changed rows from the `sync-pull` function and merges them.
#[derive(Clone)]
pub struct HttpPullSync {
    client: RpcClient,
    store: LocalStore,
}

impl HttpPullSync {
    pub fn new(client: RpcClient, store: LocalStore) -> Self {
        Self { client, store }
    }
}

#[async_trait]
impl RemoteSync for HttpPullSync {
    async fn pull_updates(&self) -> Result<MergeReport> {
        let cursor = self.store.pull_cursor().await?;
        let snapshot = self.client.pull(cursor.as_deref()).await?;
        tracing::debug!(
            "Pulled {} rows (cursor {:?} -> {:?})",
            snapshot.row_count(),
            cursor,
            snapshot.cursor
        );

        let report = self.store.apply_snapshot(&snapshot, now_ms()).await?;
        tracing::info!(
            "Pull merged: {} applied, {} settled, {} conflicts, {} rejected",
            report.applied,
            report.settled,
            report.conflicts,
            report.rejected
        );
        Ok(report)
    }
}
