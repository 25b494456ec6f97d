use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// A line of an order as rendered into a notification message.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_name: String,
    pub quantity: i32,
}

/// WhatsApp Business API client (360Dialog/Twilio/official API compatible).
///
/// All sends are best-effort: callers fire them after commit and log
/// failures. A notifier without configured credentials is a no-op.
#[derive(Debug, Clone)]
pub struct WhatsAppNotifier {
    client: reqwest::Client,
    api_url: Option<String>,
    api_token: Option<String>,
}

impl WhatsAppNotifier {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        if cfg.whatsapp_api_url.is_none() {
            info!("WhatsApp gateway not configured; order notifications disabled");
        }

        Self {
            client,
            api_url: cfg.whatsapp_api_url.clone(),
            api_token: cfg.whatsapp_api_token.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_url.is_some()
    }

    /// Sends a plain text message to a phone number.
    async fn send_message(&self, to: &str, body: &str) -> Result<(), ServiceError> {
        let (Some(api_url), Some(api_token)) = (&self.api_url, &self.api_token) else {
            debug!("notifier disabled; dropping message");
            return Ok(());
        };

        // Gateways expect a bare digit string.
        let to_clean: String = to.chars().filter(|c| c.is_ascii_digit()).collect();

        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to_clean,
            "type": "text",
            "text": { "body": body },
        });

        let response = self
            .client
            .post(api_url)
            .bearer_auth(api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        response
            .error_for_status()
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        Ok(())
    }

    /// Message sent right after an order is created.
    #[instrument(skip(self, items), fields(order_id = %order_id))]
    pub async fn send_order_confirmation(
        &self,
        customer_name: &str,
        customer_phone: &str,
        order_id: Uuid,
        items: &[OrderLine],
        total: Decimal,
    ) -> Result<(), ServiceError> {
        let items_text = items
            .iter()
            .map(|line| format!("- {}x {}", line.quantity, line.product_name))
            .collect::<Vec<_>>()
            .join("\n");

        let message = format!(
            "*Order confirmed!*\n\nHello {customer_name}!\n\nYour order {order_id} has been registered.\n\n*Items:*\n{items_text}\n\n*Total:* {total:.2}\n\nWe will contact you shortly to schedule the delivery."
        );

        self.send_message(customer_phone, &message).await
    }

    /// Message sent when an order transitions to completed.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn send_delivery_confirmation(
        &self,
        customer_name: &str,
        customer_phone: &str,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let message = format!(
            "*Delivery completed!*\n\nHello {customer_name}!\n\nYour order {order_id} has been delivered. Thank you for your preference!"
        );

        self.send_message(customer_phone, &message).await
    }
}
