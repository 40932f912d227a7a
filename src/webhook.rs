use crate::errors::{AppError, ProviderErrorKind};
use crate::models::{EnrichedLead, RoutingRule};
use chrono::Utc;
use serde_json::json;
use std::time::Duration;

/// Client that notifies external systems when a routing rule with a
/// webhook fires.
///
/// Delivery is best effort: a failed POST is logged and reported to the
/// caller, never retried here.
#[derive(Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl WebhookClient {
    pub fn new(timeout_secs: u64) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create webhook client: {}", e))
            })?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }

    /// Builds the notification payload for a matched rule.
    ///
    /// The envelope is stable: consumers key off `event` and `rule`.
    pub fn payload(rule: &RoutingRule, lead: &EnrichedLead) -> serde_json::Value {
        json!({
            "event": "lead.routed",
            "timestamp": Utc::now().to_rfc3339(),
            "rule": {
                "id": rule.id,
                "name": rule.name,
                "priority": rule.priority,
            },
            "lead": {
                "id": lead.id,
                "domain": lead.domain,
                "confidence_score": lead.confidence_score,
                "lead_type": lead.lead_type,
                "qc_flag": lead.qc_flag,
                "contact": lead.contact,
                "company": lead.company,
            },
        })
    }

    /// Delivers the notification for a matched rule.
    ///
    /// Returns an error on a non-2xx answer or a transport failure so the
    /// caller can record the delivery outcome; routing itself has already
    /// happened and is not rolled back.
    pub async fn notify(&self, rule: &RoutingRule, lead: &EnrichedLead) -> Result<(), AppError> {
        let url = rule.webhook_url.as_deref().ok_or_else(|| {
            AppError::InvalidConfig(format!("rule '{}' has no webhook URL", rule.name))
        })?;

        let payload = Self::payload(rule, lead);
        tracing::info!(
            "Webhook: notifying {} for lead {} (rule '{}')",
            url,
            lead.id,
            rule.name
        );

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("webhook_failed: {} unreachable: {}", url, e);
                AppError::provider(
                    "webhook",
                    ProviderErrorKind::Transport,
                    format!("webhook request failed after {}s budget: {}", self.timeout_secs, e),
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("webhook_failed: {} returned {}: {}", url, status, body);
            return Err(AppError::provider(
                "webhook",
                ProviderErrorKind::InvalidResponse,
                format!("webhook returned {}: {}", status, body),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Target;
    use uuid::Uuid;

    #[test]
    fn payload_carries_rule_and_lead_identity() {
        let rule = RoutingRule {
            id: Uuid::new_v4(),
            name: "hot-saas".to_string(),
            priority: 10,
            criteria_industry: None,
            criteria_state: None,
            criteria_min_score: None,
            criteria_max_score: None,
            criteria_lead_type: None,
            assign_to_org: None,
            auto_enrich: false,
            webhook_enabled: true,
            webhook_url: Some("https://hooks.example.com/leads".to_string()),
        };
        let mut lead = EnrichedLead::new(&Target::from_domain("acme.com").unwrap());
        lead.confidence_score = 85;

        let payload = WebhookClient::payload(&rule, &lead);
        assert_eq!(payload["event"], "lead.routed");
        assert_eq!(payload["rule"]["name"], "hot-saas");
        assert_eq!(payload["lead"]["domain"], "acme.com");
        assert_eq!(payload["lead"]["confidence_score"], 85);
    }
}
