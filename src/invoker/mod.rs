mod lambda;

pub use lambda::LambdaInvoker;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Invoke failed: {0}")]
    Failed(String),
}

/// Fire-and-forget trigger for the external annotation function.
///
/// The trigger call itself is awaited for success or failure; the invoked
/// computation runs independently and reports back through the completion
/// callback endpoint.
#[async_trait]
pub trait ProcessingInvoker: Send + Sync {
    async fn trigger(&self, asset_id: &str, storage_key: &str) -> Result<(), InvokeError>;
}

/// Invoker that only logs the trigger. Used for local development when no
/// function runtime is available; records stay in `processing` until the
/// completion callback is driven by hand.
pub struct NoopInvoker;

#[async_trait]
impl ProcessingInvoker for NoopInvoker {
    async fn trigger(&self, asset_id: &str, storage_key: &str) -> Result<(), InvokeError> {
        tracing::info!(asset_id = %asset_id, key = %storage_key, "Processing trigger (noop)");
        Ok(())
    }
}
