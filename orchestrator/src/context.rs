//! Per-process run context: every external collaborator a stage may need,
//! passed explicitly instead of living in globals.

use std::sync::Arc;

use tokio::sync::watch;

use config_store::Store;
use drift_engine::Policies;
use forge_client::ForgeClient;
use git_ops::GitCredentials;
use llm_service::LlmServiceProfiles;

/// Shared context owned by the orchestrator and borrowed by each stage.
#[derive(Clone)]
pub struct RunContext {
    pub store: Store,
    pub forge: ForgeClient,
    pub git: GitCredentials,
    pub llm: Arc<LlmServiceProfiles>,
    pub policies: Policies,
    cancel: watch::Receiver<bool>,
}

/// Handle used to cancel in-flight runs sharing a context.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl RunContext {
    /// Builds a context and its cancellation handle.
    pub fn new(
        store: Store,
        forge: ForgeClient,
        git: GitCredentials,
        llm: Arc<LlmServiceProfiles>,
        policies: Policies,
    ) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                store,
                forge,
                git,
                llm,
                policies,
                cancel: rx,
            },
            CancelHandle { tx },
        )
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves when cancellation is requested; pends forever if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_handle_flips_the_context() {
        let (tx, rx) = watch::channel(false);
        let handle = CancelHandle { tx };
        let ctx_cancel = rx;
        assert!(!*ctx_cancel.borrow());
        handle.cancel();
        assert!(*ctx_cancel.borrow());
    }
}
