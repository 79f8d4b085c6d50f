use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::DeliveryError;
use crate::gateway::NotificationGateway;
use crate::types::{DeliveryReport, NotificationRequest};

/// Fire-and-report sender wrapped around a gateway.
///
/// Every request is sent on its own with a bounded wait. A failure is logged
/// and reported but never stops the requests after it.
#[derive(Clone)]
pub struct Dispatcher {
    gateway: Arc<dyn NotificationGateway>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(gateway: Arc<dyn NotificationGateway>, send_timeout: Duration) -> Self {
        Self {
            gateway,
            send_timeout,
        }
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    /// Send one request, converting a timeout into [`DeliveryError::Timeout`].
    pub async fn send(&self, request: &NotificationRequest) -> Result<(), DeliveryError> {
        match tokio::time::timeout(self.send_timeout, self.gateway.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout {
                ms: self.send_timeout.as_millis() as u64,
            }),
        }
    }

    /// Send one request and describe the outcome.
    pub async fn deliver(&self, request: &NotificationRequest) -> DeliveryReport {
        let error = match self.send(request).await {
            Ok(()) => {
                debug!(
                    channel = %request.channel,
                    recipient = %request.recipient,
                    kind = %request.kind,
                    "notification delivered"
                );
                None
            }
            Err(e) => {
                warn!(
                    channel = %request.channel,
                    recipient = %request.recipient,
                    kind = %request.kind,
                    gateway = self.gateway.name(),
                    error = %e,
                    "notification failed"
                );
                Some(e.to_string())
            }
        };
        DeliveryReport {
            channel: request.channel,
            recipient: request.recipient.clone(),
            kind: request.kind,
            error,
        }
    }

    /// Send every request in order. One report per request, same order.
    pub async fn deliver_all(&self, requests: &[NotificationRequest]) -> Vec<DeliveryReport> {
        let mut reports = Vec::with_capacity(requests.len());
        for request in requests {
            reports.push(self.deliver(request).await);
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, TemplateKind};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records requests; fails for recipients listed in `reject`, hangs for `hang`.
    #[derive(Default)]
    struct ScriptedGateway {
        sent: Mutex<Vec<NotificationRequest>>,
        reject: Vec<String>,
        hang: Vec<String>,
    }

    #[async_trait]
    impl NotificationGateway for ScriptedGateway {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, request: &NotificationRequest) -> Result<(), DeliveryError> {
            if self.hang.contains(&request.recipient) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.reject.contains(&request.recipient) {
                return Err(DeliveryError::Rejected("mailbox full".to_string()));
            }
            self.sent.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn req(to: &str) -> NotificationRequest {
        NotificationRequest::new(Channel::Email, to, TemplateKind::Reminder24h)
            .with("name", "Anna")
            .with("slot_date", "2025-12-18")
    }

    #[tokio::test]
    async fn failure_does_not_block_later_requests() {
        let gw = Arc::new(ScriptedGateway {
            reject: vec!["b@example.org".to_string()],
            ..Default::default()
        });
        let d = Dispatcher::new(gw.clone(), Duration::from_secs(5));
        let reports = d
            .deliver_all(&[req("a@example.org"), req("b@example.org"), req("c@example.org")])
            .await;

        let delivered: Vec<bool> = reports.iter().map(|r| r.is_delivered()).collect();
        assert_eq!(delivered, vec![true, false, true]);
        assert_eq!(gw.sent.lock().unwrap().len(), 2);
        assert!(reports[1].error.as_deref().unwrap().contains("mailbox full"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_gateway_times_out() {
        let gw = Arc::new(ScriptedGateway {
            hang: vec!["slow@example.org".to_string()],
            ..Default::default()
        });
        let d = Dispatcher::new(gw, Duration::from_secs(30));
        let err = d.send(&req("slow@example.org")).await.unwrap_err();
        assert_eq!(err, DeliveryError::Timeout { ms: 30_000 });
    }

    #[tokio::test]
    async fn log_gateway_always_succeeds() {
        let d = Dispatcher::new(Arc::new(crate::LogGateway), Duration::from_secs(1));
        assert!(d.deliver(&req("a@example.org")).await.is_delivered());
        assert_eq!(d.gateway_name(), "log");
    }

    #[test]
    fn request_params_are_addressable() {
        let r = req("a@example.org");
        assert_eq!(r.param("name"), Some("Anna"));
        assert_eq!(r.param("missing"), None);
        assert_eq!(r.kind.to_string(), "reminder_24h");
    }
}
