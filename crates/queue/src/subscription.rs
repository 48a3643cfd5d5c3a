// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A live `subscribe` call's consumer tasks. Dropping it signals every
/// worker task to stop pulling new deliveries; in-flight handler calls are
/// allowed to finish. Call [`SubscriptionHandle::shutdown`] to wait for
/// that drain instead of firing-and-forgetting.
pub struct SubscriptionHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub(crate) fn new(token: CancellationToken, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { token, tasks }
    }

    /// Requests cancellation without waiting for in-flight tasks to drain.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Requests cancellation and waits for every consumer task to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
