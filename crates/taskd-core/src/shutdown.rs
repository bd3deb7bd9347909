//! Cooperative shutdown signal shared between a dispatcher and its callers.

use tokio_util::sync::CancellationToken;

/// Cloneable stop flag.
///
/// Triggering is idempotent and may happen from any thread, before or while the
/// dispatcher runs. All clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has been triggered.
    pub async fn triggered(&self) {
        self.token.cancelled().await
    }
}
