//! People Data Labs adapter: person enrichment by company domain.

use crate::errors::{classify_reqwest, classify_status, AppError};
use crate::models::{
    Capability, Department, ProviderContact, ProviderId, ProviderResponse, Seniority, Target,
};
use crate::normalize;
use crate::providers::build_http_client;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const PROVIDER: &str = "pdl";

#[derive(Debug, Deserialize)]
struct PdlResponse {
    status: Option<u16>,
    data: Option<PdlPerson>,
}

#[derive(Debug, Deserialize)]
struct PdlPerson {
    full_name: Option<String>,
    work_email: Option<String>,
    #[serde(default)]
    phone_numbers: Vec<String>,
    mobile_phone: Option<String>,
    job_title: Option<String>,
    job_title_levels: Option<Vec<String>>,
    job_title_role: Option<String>,
    linkedin_url: Option<String>,
}

/// People Data Labs client.
pub struct PdlService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PdlService {
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
            Capability::Person | Capability::Email | Capability::Phone => {
                self.enrich_person(target).await
            }
            Capability::Company => {
                tracing::debug!("PDL: company capability not used, returning empty");
                Ok(ProviderResponse::Contact(ProviderContact {
                    provider: Some(ProviderId::PeopleDataLabs),
                    ..Default::default()
                }))
            }
        }
    }

    async fn enrich_person(&self, target: &Target) -> Result<ProviderResponse, AppError> {
        let mut params: Vec<(&str, String)> = vec![("company", target.domain.clone())];
        if let Some(ref name) = target.known_name {
            params.push(("name", name.clone()));
        }
        if let Some(ref email) = target.email {
            params.push(("email", email.clone()));
        }

        let url = reqwest::Url::parse_with_params(
            &format!("{}/person/enrich", self.base_url),
            params.iter().map(|(k, v)| (*k, v.as_str())),
        )
        .map_err(|e| AppError::InvalidConfig(format!("failed to build PDL URL: {}", e)))?;

        tracing::info!("PDL: enriching person at {}", target.domain);

        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| classify_reqwest(PROVIDER, e))?;

        // PDL reports "no match" as a 404 body with status inside; both
        // shapes are a successful empty result.
        if response.status().as_u16() == 404 {
            tracing::info!("PDL: no person match for {}", target.domain);
            return Ok(ProviderResponse::Contact(ProviderContact {
                provider: Some(ProviderId::PeopleDataLabs),
                ..Default::default()
            }));
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &text));
        }

        let parsed: PdlResponse = response
            .json()
            .await
            .map_err(|e| classify_reqwest(PROVIDER, e))?;

        let contact = match parsed.data {
            Some(person) if parsed.status.unwrap_or(200) == 200 => to_contact(person),
            _ => ProviderContact {
                provider: Some(ProviderId::PeopleDataLabs),
                ..Default::default()
            },
        };
        Ok(ProviderResponse::Contact(contact))
    }
}

fn to_contact(p: PdlPerson) -> ProviderContact {
    let job_title = normalize::clean_text(p.job_title.as_deref());
    let seniority = p
        .job_title_levels
        .as_deref()
        .and_then(|levels| levels.first())
        .map(|l| match l.to_lowercase().as_str() {
            "owner" => Seniority::Owner,
            "cxo" => Seniority::CSuite,
            "vp" => Seniority::Vp,
            "director" => Seniority::Director,
            "manager" => Seniority::Manager,
            _ => Seniority::IndividualContributor,
        })
        .or_else(|| job_title.as_deref().map(Seniority::from_title));
    let department = p.job_title_role.as_deref().map(|r| match r.to_lowercase().as_str() {
        "engineering" => Department::Engineering,
        "sales" => Department::Sales,
        "marketing" => Department::Marketing,
        "finance" => Department::Finance,
        "operations" => Department::Operations,
        "human_resources" => Department::Hr,
        "legal" => Department::Legal,
        _ => Department::Unknown,
    });

    ProviderContact {
        full_name: normalize::clean_text(p.full_name.as_deref()),
        email: normalize::clean_email(p.work_email.as_deref()),
        email_status: None,
        phone: p
            .phone_numbers
            .iter()
            .find_map(|n| normalize::normalize_phone(n)),
        mobile_phone: p.mobile_phone.as_deref().and_then(normalize::normalize_phone),
        direct_phone: None,
        job_title,
        seniority,
        department,
        linkedin_url: normalize::clean_text(p.linkedin_url.as_deref()),
        provider: Some(ProviderId::PeopleDataLabs),
        confidence: 0,
    }
}
