use async_trait::async_trait;

use crate::errors::ApplicationError;

/// Component with an open/close lifecycle.
///
/// Both calls are idempotent. `correlation_id` is only used for logging
/// and error reporting.
#[async_trait]
pub trait Openable: Send + Sync {
    fn is_open(&self) -> bool;

    async fn open(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError>;

    async fn close(&self, correlation_id: Option<&str>) -> Result<(), ApplicationError>;
}
