//! Hunter adapter: domain email search with verification status.

use crate::errors::{classify_reqwest, classify_status, AppError};
use crate::models::{
    Capability, EmailStatus, ProviderContact, ProviderId, ProviderResponse, Target,
};
use crate::normalize;
use crate::providers::{build_http_client, select_best_candidate, DEFAULT_TITLE_PRIORITY};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const PROVIDER: &str = "hunter";

#[derive(Debug, Deserialize)]
struct HunterEmail {
    value: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    position: Option<String>,
    phone_number: Option<String>,
    linkedin: Option<String>,
    verification: Option<HunterVerification>,
}

#[derive(Debug, Deserialize)]
struct HunterVerification {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HunterData {
    #[serde(default)]
    emails: Vec<HunterEmail>,
}

#[derive(Debug, Deserialize)]
struct HunterResponse {
    data: Option<HunterData>,
}

/// Hunter.io client. An email finder: person and phone requests are
/// answered from the same domain-search results.
pub struct HunterService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HunterService {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_http_client(PROVIDER, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub async fn enrich(
        &self,
        target: &Target,
        capability: Capability,
    ) -> Result<ProviderResponse, AppError> {
        match capability {
            Capability::Email | Capability::Person | Capability::Phone => {
                self.domain_search(target).await
            }
            // Hunter has no company index; a successful empty answer.
            Capability::Company => {
                tracing::debug!("Hunter: company capability not supported, returning empty");
                Ok(ProviderResponse::Contact(ProviderContact {
                    provider: Some(ProviderId::Hunter),
                    ..Default::default()
                }))
            }
        }
    }

    async fn domain_search(&self, target: &Target) -> Result<ProviderResponse, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/domain-search", self.base_url),
            &[
                ("domain", target.domain.as_str()),
                ("api_key", self.api_key.as_str()),
            ],
        )
        .map_err(|e| AppError::InvalidConfig(format!("failed to build Hunter URL: {}", e)))?;

        tracing::info!("Hunter: domain search for {}", target.domain);
        // Key is a query parameter; never log the full URL.

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &text));
        }

        let parsed: HunterResponse = response
            .json()
            .await
            .map_err(|e| classify_reqwest(PROVIDER, e))?;

        let candidates: Vec<ProviderContact> = parsed
            .data
            .map(|d| d.emails)
            .unwrap_or_default()
            .into_iter()
            .map(to_contact)
            .collect();

        tracing::info!(
            "Hunter: {} email(s) found for {}",
            candidates.len(),
            target.domain
        );

        let best = select_best_candidate(&candidates, DEFAULT_TITLE_PRIORITY)
            .cloned()
            .unwrap_or_else(|| ProviderContact {
                provider: Some(ProviderId::Hunter),
                ..Default::default()
            });
        Ok(ProviderResponse::Contact(best))
    }
}

fn to_contact(e: HunterEmail) -> ProviderContact {
    let full_name = match (
        normalize::clean_text(e.first_name.as_deref()),
        normalize::clean_text(e.last_name.as_deref()),
    ) {
        (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
        (Some(f), None) => Some(f),
        (None, Some(l)) => Some(l),
        (None, None) => None,
    };
    let email_status = e
        .verification
        .and_then(|v| v.status)
        .map(|s| match s.as_str() {
            "valid" | "deliverable" => EmailStatus::Verified,
            "accept_all" | "webmail" => EmailStatus::LikelyValid,
            "invalid" | "undeliverable" => EmailStatus::Invalid,
            _ => EmailStatus::Unverified,
        });
    let job_title = normalize::clean_text(e.position.as_deref());
    let seniority = job_title.as_deref().map(crate::models::Seniority::from_title);
    ProviderContact {
        full_name,
        email: normalize::clean_email(e.value.as_deref()),
        email_status,
        phone: e.phone_number.as_deref().and_then(normalize::normalize_phone),
        job_title,
        seniority,
        linkedin_url: normalize::clean_text(e.linkedin.as_deref()),
        provider: Some(ProviderId::Hunter),
        ..Default::default()
    }
}
