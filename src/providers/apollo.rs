//! Apollo adapter: people search and company enrichment.

use crate::errors::{classify_reqwest, classify_status, AppError};
use crate::models::{
    Capability, ProviderCompany, ProviderContact, ProviderId, ProviderResponse, Seniority, Target,
};
use crate::normalize;
use crate::providers::{build_http_client, select_best_candidate, DEFAULT_TITLE_PRIORITY};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const PROVIDER: &str = "apollo";

/// Vendor person row as Apollo returns it.
#[derive(Debug, Deserialize)]
struct ApolloPerson {
    name: Option<String>,
    title: Option<String>,
    email: Option<String>,
    email_status: Option<String>,
    phone_number: Option<String>,
    mobile_phone: Option<String>,
    linkedin_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApolloPeopleResponse {
    #[serde(default)]
    people: Vec<ApolloPerson>,
}

#[derive(Debug, Deserialize)]
struct ApolloOrganization {
    name: Option<String>,
    website_url: Option<String>,
    industry: Option<String>,
    estimated_num_employees: Option<i64>,
    annual_revenue: Option<i64>,
    founded_year: Option<i32>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    short_description: Option<String>,
    linkedin_url: Option<String>,
    #[serde(default)]
    technology_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApolloOrgResponse {
    organization: Option<ApolloOrganization>,
}

/// Apollo.io client. Handles both person search and domain enrichment.
pub struct ApolloService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ApolloService {
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
            Capability::Company => self.enrich_company(target).await,
            // Apollo answers person, email and phone requests from the
            // same people index.
            Capability::Person | Capability::Email | Capability::Phone => {
                self.search_person(target).await
            }
        }
    }

    /// Searches people at the target domain and returns the best candidate.
    async fn search_person(&self, target: &Target) -> Result<ProviderResponse, AppError> {
        let url = format!("{}/mixed_people/search", self.base_url);
        let mut body = json!({
            "q_organization_domains": [target.domain],
            "page": 1,
            "per_page": 10,
        });
        if let Some(ref name) = target.known_name {
            body["q_keywords"] = json!(name);
        }
        if let Some(ref title) = target.known_title {
            body["person_titles"] = json!([title]);
        }

        tracing::info!("Apollo: searching people at {}", target.domain);

        let response = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_reqwest(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &text));
        }

        let parsed: ApolloPeopleResponse = response
            .json()
            .await
            .map_err(|e| classify_reqwest(PROVIDER, e))?;

        let candidates: Vec<ProviderContact> = parsed
            .people
            .into_iter()
            .map(|p| self.to_contact(p))
            .collect();

        tracing::info!(
            "Apollo: {} candidate(s) for {}",
            candidates.len(),
            target.domain
        );

        let best = select_best_candidate(&candidates, DEFAULT_TITLE_PRIORITY)
            .cloned()
            .unwrap_or_else(|| ProviderContact {
                provider: Some(ProviderId::Apollo),
                ..Default::default()
            });
        Ok(ProviderResponse::Contact(best))
    }

    async fn enrich_company(&self, target: &Target) -> Result<ProviderResponse, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/organizations/enrich", self.base_url),
            &[("domain", target.domain.as_str())],
        )
        .map_err(|e| AppError::InvalidConfig(format!("failed to build Apollo URL: {}", e)))?;

        tracing::info!("Apollo: enriching company {}", target.domain);

        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| classify_reqwest(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &text));
        }

        let parsed: ApolloOrgResponse = response
            .json()
            .await
            .map_err(|e| classify_reqwest(PROVIDER, e))?;

        let company = match parsed.organization {
            Some(org) => ProviderCompany {
                name: normalize::clean_text(org.name.as_deref()),
                domain: Some(target.domain.clone()),
                website: normalize::clean_text(org.website_url.as_deref()),
                industry: normalize::clean_text(org.industry.as_deref()),
                employee_count: org.estimated_num_employees,
                annual_revenue: org.annual_revenue,
                founded_year: org.founded_year,
                hq_city: normalize::clean_text(org.city.as_deref()),
                hq_state: normalize::clean_text(org.state.as_deref()),
                hq_country: normalize::clean_text(org.country.as_deref()),
                description: normalize::clean_text(org.short_description.as_deref()),
                linkedin_url: normalize::clean_text(org.linkedin_url.as_deref()),
                technologies: org
                    .technology_names
                    .iter()
                    .filter(|t| !t.trim().is_empty())
                    .map(|t| t.trim().to_string())
                    .collect(),
                provider: Some(ProviderId::Apollo),
                ..Default::default()
            },
            // Empty result, not an error.
            None => ProviderCompany {
                provider: Some(ProviderId::Apollo),
                ..Default::default()
            },
        };
        Ok(ProviderResponse::Company(company))
    }

    fn to_contact(&self, p: ApolloPerson) -> ProviderContact {
        let job_title = normalize::clean_text(p.title.as_deref());
        let seniority = job_title.as_deref().map(Seniority::from_title);
        ProviderContact {
            full_name: normalize::clean_text(p.name.as_deref()),
            email: normalize::clean_email(p.email.as_deref()),
            email_status: p.email_status.as_deref().map(|s| match s {
                "verified" => crate::models::EmailStatus::Verified,
                "likely" | "likely_valid" | "guessed" => crate::models::EmailStatus::LikelyValid,
                "invalid" => crate::models::EmailStatus::Invalid,
                _ => crate::models::EmailStatus::Unverified,
            }),
            phone: p.phone_number.as_deref().and_then(normalize::normalize_phone),
            mobile_phone: p.mobile_phone.as_deref().and_then(normalize::normalize_phone),
            direct_phone: None,
            job_title,
            seniority,
            department: None,
            linkedin_url: normalize::clean_text(p.linkedin_url.as_deref()),
            provider: Some(ProviderId::Apollo),
            confidence: 0,
        }
    }
}
