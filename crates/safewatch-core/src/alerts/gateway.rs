//! SMS gateways

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use safewatch_common::config::HttpGatewayConfig;
use safewatch_storage::models::AlertRecipient;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of submitting one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        DeliveryOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Something that can hand a text message to a carrier.
///
/// A rejected message is an `Ok(DeliveryOutcome::Failed)`; `Err` means the
/// gateway itself is unusable and the batch must stop.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn submit(&self, recipient: &AlertRecipient, message: &str) -> Result<DeliveryOutcome>;

    /// Gateway name for logs
    fn name(&self) -> &str;
}

/// Gateway that rolls a die per message instead of sending anything
pub struct SimulatedGateway {
    success_rate: f64,
}

impl SimulatedGateway {
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(0.95)
    }
}

#[async_trait]
impl SmsGateway for SimulatedGateway {
    async fn submit(&self, recipient: &AlertRecipient, _message: &str) -> Result<DeliveryOutcome> {
        let delivered = rand::thread_rng().gen_bool(self.success_rate);
        debug!(phone = %recipient.phone, delivered, "Simulated SMS submission");

        if delivered {
            Ok(DeliveryOutcome::Delivered)
        } else {
            Ok(DeliveryOutcome::failed("Simulated carrier rejection"))
        }
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// Gateway posting `{"to", "message"}` JSON to an HTTP SMS provider
pub struct HttpSmsGateway {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpSmsGateway {
    pub fn new(config: &HttpGatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn submit(&self, recipient: &AlertRecipient, message: &str) -> Result<DeliveryOutcome> {
        let payload = serde_json::json!({
            "to": recipient.phone,
            "message": message,
        });

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => Ok(DeliveryOutcome::Delivered),
            Ok(resp) => {
                let status = resp.status();
                warn!(phone = %recipient.phone, status = %status, "SMS gateway rejected message");
                Ok(DeliveryOutcome::failed(format!("HTTP {}", status)))
            }
            Err(e) => {
                warn!(phone = %recipient.phone, error = %e, "SMS gateway request failed");
                Ok(DeliveryOutcome::failed(e.to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn recipient() -> AlertRecipient {
        AlertRecipient {
            contact_id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            phone: "+15550100".to_string(),
        }
    }

    fn gateway_for(server: &MockServer) -> HttpSmsGateway {
        HttpSmsGateway::new(&HttpGatewayConfig {
            url: format!("{}/send", server.uri()),
            api_key: Some("test-key".to_string()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_simulated_gateway_extremes() {
        let always = SimulatedGateway::new(1.0);
        let never = SimulatedGateway::new(0.0);

        for _ in 0..20 {
            assert!(always.submit(&recipient(), "hi").await.unwrap().is_delivered());
            assert!(!never.submit(&recipient(), "hi").await.unwrap().is_delivered());
        }
    }

    #[test]
    fn test_simulated_gateway_clamps_rate() {
        assert_eq!(SimulatedGateway::new(7.0).success_rate, 1.0);
        assert_eq!(SimulatedGateway::new(-1.0).success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_http_gateway_posts_message_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_json(serde_json::json!({
                "to": "+15550100",
                "message": "Evacuate zone B",
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = gateway_for(&server)
            .submit(&recipient(), "Evacuate zone B")
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered);
    }

    #[tokio::test]
    async fn test_http_gateway_non_success_is_failed_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let outcome = gateway_for(&server)
            .submit(&recipient(), "Evacuate zone B")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DeliveryOutcome::failed("HTTP 503 Service Unavailable")
        );
    }
}
