//! Clearbit adapter: domain-to-company enrichment.

use crate::errors::{classify_reqwest, classify_status, AppError};
use crate::models::{Capability, ProviderCompany, ProviderId, ProviderResponse, Target};
use crate::normalize;
use crate::providers::build_http_client;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const PROVIDER: &str = "clearbit";

#[derive(Debug, Deserialize)]
struct ClearbitCompany {
    name: Option<String>,
    domain: Option<String>,
    category: Option<ClearbitCategory>,
    metrics: Option<ClearbitMetrics>,
    #[serde(rename = "foundedYear")]
    founded_year: Option<i32>,
    description: Option<String>,
    #[serde(default)]
    tech: Vec<String>,
    geo: Option<ClearbitGeo>,
    linkedin: Option<ClearbitHandle>,
    site: Option<ClearbitSite>,
}

#[derive(Debug, Deserialize)]
struct ClearbitCategory {
    industry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClearbitMetrics {
    employees: Option<i64>,
    #[serde(rename = "employeesRange")]
    employees_range: Option<String>,
    #[serde(rename = "annualRevenue")]
    annual_revenue: Option<i64>,
    #[serde(rename = "estimatedAnnualRevenue")]
    estimated_annual_revenue: Option<String>,
    raised: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ClearbitGeo {
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClearbitHandle {
    handle: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClearbitSite {
    url: Option<String>,
}

/// Clearbit company-enrichment client. Person-shaped requests get a
/// successful empty answer: this vendor only knows companies.
pub struct ClearbitService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ClearbitService {
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
            Capability::Company => self.find_company(target).await,
            Capability::Person | Capability::Email | Capability::Phone => {
                tracing::debug!("Clearbit: {} capability not supported, returning empty", capability);
                Ok(ProviderResponse::Company(ProviderCompany {
                    provider: Some(ProviderId::Clearbit),
                    ..Default::default()
                }))
            }
        }
    }

    async fn find_company(&self, target: &Target) -> Result<ProviderResponse, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/companies/find", self.base_url),
            &[("domain", target.domain.as_str())],
        )
        .map_err(|e| AppError::InvalidConfig(format!("failed to build Clearbit URL: {}", e)))?;

        tracing::info!("Clearbit: finding company {}", target.domain);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| classify_reqwest(PROVIDER, e))?;

        // Clearbit answers 404 for unknown domains: a successful empty
        // result, distinguished from transport/auth failure.
        if response.status().as_u16() == 404 {
            tracing::info!("Clearbit: no company known for {}", target.domain);
            return Ok(ProviderResponse::Company(ProviderCompany {
                provider: Some(ProviderId::Clearbit),
                ..Default::default()
            }));
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &text));
        }

        let parsed: ClearbitCompany = response
            .json()
            .await
            .map_err(|e| classify_reqwest(PROVIDER, e))?;

        let metrics = parsed.metrics;
        let geo = parsed.geo;
        let company = ProviderCompany {
            name: normalize::clean_text(parsed.name.as_deref()),
            domain: parsed
                .domain
                .as_deref()
                .and_then(normalize::normalize_domain)
                .or_else(|| Some(target.domain.clone())),
            website: parsed
                .site
                .and_then(|s| normalize::clean_text(s.url.as_deref())),
            industry: parsed
                .category
                .and_then(|c| normalize::clean_text(c.industry.as_deref())),
            employee_count: metrics.as_ref().and_then(|m| m.employees),
            employee_range: metrics
                .as_ref()
                .and_then(|m| normalize::clean_text(m.employees_range.as_deref())),
            annual_revenue: metrics.as_ref().and_then(|m| m.annual_revenue),
            revenue_range: metrics
                .as_ref()
                .and_then(|m| normalize::clean_text(m.estimated_annual_revenue.as_deref())),
            funding_total: metrics.as_ref().and_then(|m| m.raised),
            founded_year: parsed.founded_year,
            technologies: parsed
                .tech
                .iter()
                .filter(|t| !t.trim().is_empty())
                .map(|t| t.trim().to_string())
                .collect(),
            hq_city: geo
                .as_ref()
                .and_then(|g| normalize::clean_text(g.city.as_deref())),
            hq_state: geo
                .as_ref()
                .and_then(|g| normalize::clean_text(g.state.as_deref())),
            hq_country: geo
                .as_ref()
                .and_then(|g| normalize::clean_text(g.country.as_deref())),
            description: normalize::clean_text(parsed.description.as_deref()),
            linkedin_url: parsed
                .linkedin
                .and_then(|l| l.handle)
                .map(|h| format!("https://linkedin.com/{}", h)),
            provider: Some(ProviderId::Clearbit),
            ..Default::default()
        };

        Ok(ProviderResponse::Company(company))
    }
}
