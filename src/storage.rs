use crate::errors::{AppError, ResultExt};
use crate::models::{EnrichedLead, ProviderCallRecord, RoutingRule};
use crate::waterfall::WaterfallOutcome;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

/// Database storage for enriched leads, provider call logs and routing
/// rules.
pub struct LeadStore {
    pool: PgPool,
}

impl LeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads a previously stored lead by id.
    pub async fn get_lead(&self, lead_id: Uuid) -> Result<Option<EnrichedLead>, AppError> {
        let row = sqlx::query_as::<_, (serde_json::Value,)>(
            "SELECT data FROM enriched_leads WHERE id = $1",
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch enriched lead")?;

        match row {
            Some((data,)) => {
                let lead = serde_json::from_value(data).map_err(|e| {
                    AppError::InternalError(format!("Stored lead {} is unreadable: {}", lead_id, e))
                })?;
                Ok(Some(lead))
            }
            None => Ok(None),
        }
    }

    /// Loads the most recent lead stored for a domain, if any.
    pub async fn find_lead_by_domain(&self, domain: &str) -> Result<Option<EnrichedLead>, AppError> {
        let row = sqlx::query_as::<_, (serde_json::Value,)>(
            r#"
            SELECT data FROM enriched_leads
            WHERE domain = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up lead by domain")?;

        match row {
            Some((data,)) => {
                let lead = serde_json::from_value(data).map_err(|e| {
                    AppError::InternalError(format!(
                        "Stored lead for {} is unreadable: {}",
                        domain, e
                    ))
                })?;
                Ok(Some(lead))
            }
            None => Ok(None),
        }
    }

    /// Upserts the merged lead. The full record lands in a jsonb column;
    /// the columns queried by routing and reporting are denormalized next
    /// to it.
    pub async fn save_lead(&self, lead: &EnrichedLead) -> Result<(), AppError> {
        let data = json!(lead);
        sqlx::query(
            r#"
            INSERT INTO enriched_leads
                (id, domain, confidence_score, qc_flag, lead_type, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET confidence_score = EXCLUDED.confidence_score,
                qc_flag = EXCLUDED.qc_flag,
                lead_type = EXCLUDED.lead_type,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(lead.id)
        .bind(&lead.domain)
        .bind(i32::from(lead.confidence_score))
        .bind(json!(lead.qc_flag))
        .bind(&lead.lead_type)
        .bind(data)
        .bind(lead.created_at)
        .bind(lead.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to save enriched lead")?;

        Ok(())
    }

    /// Updates an existing lead's merged fields and derived columns
    /// without touching its creation metadata.
    pub async fn update_lead_fields(&self, lead: &EnrichedLead) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE enriched_leads
            SET confidence_score = $2,
                qc_flag = $3,
                data = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(lead.id)
        .bind(i32::from(lead.confidence_score))
        .bind(json!(lead.qc_flag))
        .bind(json!(lead))
        .bind(lead.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update enriched lead")?;

        if result.rows_affected() == 0 {
            return Err(AppError::InternalError(format!(
                "lead {} does not exist",
                lead.id
            )));
        }
        Ok(())
    }

    /// Persists a finished waterfall run: the lead plus every provider
    /// call it made.
    pub async fn save_outcome(&self, outcome: &WaterfallOutcome) -> Result<(), AppError> {
        self.save_lead(&outcome.lead).await?;
        for call in &outcome.calls {
            self.record_provider_call(call).await?;
        }
        Ok(())
    }

    /// Appends one provider call to the audit log.
    pub async fn record_provider_call(&self, call: &ProviderCallRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO provider_calls
                (lead_id, provider, capability, success, fields_obtained,
                 error_kind, duration_ms, called_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(call.lead_id)
        .bind(call.provider.as_str())
        .bind(json!(call.capability))
        .bind(call.success)
        .bind(json!(call.fields_obtained))
        .bind(&call.error_kind)
        .bind(call.duration_ms as i64)
        .bind(call.called_at)
        .execute(&self.pool)
        .await
        .context("Failed to record provider call")?;

        Ok(())
    }

    /// Routing rules, highest priority first. The matcher re-sorts on its
    /// own, so the ordering here is a convenience.
    pub async fn list_rules_by_priority(&self) -> Result<Vec<RoutingRule>, AppError> {
        let rules = sqlx::query_as::<_, RoutingRule>(
            r#"
            SELECT id, name, priority,
                   criteria_industry, criteria_state,
                   criteria_min_score, criteria_max_score, criteria_lead_type,
                   assign_to_org, auto_enrich, webhook_enabled, webhook_url
            FROM routing_rules
            WHERE enabled = true
            ORDER BY priority DESC, name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list routing rules")?;

        Ok(rules)
    }

    /// Records which rule a lead was routed to (or that none matched).
    pub async fn record_routing(
        &self,
        lead_id: Uuid,
        rule: Option<&RoutingRule>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO lead_routing (lead_id, rule_id, rule_name, assigned_org, routed_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (lead_id) DO UPDATE
            SET rule_id = EXCLUDED.rule_id,
                rule_name = EXCLUDED.rule_name,
                assigned_org = EXCLUDED.assigned_org,
                routed_at = EXCLUDED.routed_at
            "#,
        )
        .bind(lead_id)
        .bind(rule.map(|r| r.id))
        .bind(rule.map(|r| r.name.clone()))
        .bind(rule.and_then(|r| r.assign_to_org))
        .execute(&self.pool)
        .await
        .context("Failed to record routing decision")?;

        Ok(())
    }
}
