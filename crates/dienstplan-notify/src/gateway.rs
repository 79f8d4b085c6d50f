use async_trait::async_trait;
use tracing::info;

use crate::error::DeliveryError;
use crate::types::NotificationRequest;

/// Outbound transport for emails and text messages.
///
/// Implementations must be `Send + Sync`: the engine and the reminder loop
/// share one gateway. The core never retries a failed send.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Stable lowercase identifier used in logs (e.g. `"log"`, `"smtp"`).
    fn name(&self) -> &str;

    /// Deliver a single request.
    async fn send(&self, request: &NotificationRequest) -> Result<(), DeliveryError>;
}

/// Gateway for deployments without a transport: records each request through
/// `tracing` and always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogGateway;

#[async_trait]
impl NotificationGateway for LogGateway {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, request: &NotificationRequest) -> Result<(), DeliveryError> {
        info!(
            channel = %request.channel,
            recipient = %request.recipient,
            kind = %request.kind,
            params = ?request.params,
            "notification"
        );
        Ok(())
    }
}
