use crate::errors::AppError;
use crate::normalize;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

// ============ Enrichment Targets ============

/// Identifies what is being enriched: a company domain plus whatever is
/// already known about the contact. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Normalized company domain (lowercase, no scheme/path, no `www.`).
    pub domain: String,
    /// Name of the person, if already known.
    pub known_name: Option<String>,
    /// Job title of the person, if already known.
    pub known_title: Option<String>,
    /// Email of the person, if already known (normalized).
    pub email: Option<String>,
}

impl Target {
    /// Builds a target from a raw domain or URL, normalizing it.
    ///
    /// An empty or unparseable domain is a configuration error and is
    /// rejected before any provider is called.
    pub fn new(
        raw_domain: &str,
        known_name: Option<String>,
        known_title: Option<String>,
        email: Option<String>,
    ) -> Result<Self, AppError> {
        let domain = normalize::normalize_domain(raw_domain)
            .ok_or_else(|| AppError::InvalidConfig(format!("invalid domain: {:?}", raw_domain)))?;
        Ok(Self {
            domain,
            known_name: known_name.filter(|s| !s.trim().is_empty()),
            known_title: known_title.filter(|s| !s.trim().is_empty()),
            email: email.as_deref().map(normalize::normalize_email),
        })
    }

    /// Convenience constructor for a bare-domain target.
    pub fn from_domain(raw_domain: &str) -> Result<Self, AppError> {
        Self::new(raw_domain, None, None, None)
    }
}

// ============ Provider Records ============

/// Identifies an external data source participating in the waterfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Apollo.io people/company search.
    Apollo,
    /// Hunter.io email finder.
    Hunter,
    /// Clearbit company enrichment.
    Clearbit,
    /// People Data Labs person enrichment.
    PeopleDataLabs,
    /// Zero-cost scraped page text, lowest trust tier.
    Scrape,
}

impl ProviderId {
    /// Stable lowercase id used in logs, audit rows and billing actions.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Apollo => "apollo",
            ProviderId::Hunter => "hunter",
            ProviderId::Clearbit => "clearbit",
            ProviderId::PeopleDataLabs => "pdl",
            ProviderId::Scrape => "scrape",
        }
    }

    /// Whether a call to this provider costs credits.
    pub fn is_paid(&self) -> bool {
        !matches!(self, ProviderId::Scrape)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a provider is being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Find a person at the target domain.
    Person,
    /// Company-level facts for the domain.
    Company,
    /// Find or verify an email address.
    Email,
    /// Find or verify a phone number.
    Phone,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Capability::Person => "person",
            Capability::Company => "company",
            Capability::Email => "email",
            Capability::Phone => "phone",
        };
        f.write_str(s)
    }
}

/// Verification status attached to an email value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Verified,
    LikelyValid,
    Unverified,
    Invalid,
}

/// Seniority bucket for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    Owner,
    Founder,
    CSuite,
    Vp,
    Director,
    Manager,
    IndividualContributor,
    Unknown,
}

impl Seniority {
    /// Maps a free-text job title onto a seniority bucket.
    pub fn from_title(title: &str) -> Self {
        let t = title.to_lowercase();
        if t.contains("owner") {
            Seniority::Owner
        } else if t.contains("founder") || t.contains("co-founder") {
            Seniority::Founder
        } else if t.contains("ceo")
            || t.contains("cto")
            || t.contains("cfo")
            || t.contains("coo")
            || t.contains("cmo")
            || t.contains("chief")
            || t.contains("president")
        {
            Seniority::CSuite
        } else if t.contains("vp") || t.contains("vice president") {
            Seniority::Vp
        } else if t.contains("director") || t.contains("head of") {
            Seniority::Director
        } else if t.contains("manager") || t.contains("lead") {
            Seniority::Manager
        } else if t.trim().is_empty() {
            Seniority::Unknown
        } else {
            Seniority::IndividualContributor
        }
    }
}

/// Department bucket for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Engineering,
    Sales,
    Marketing,
    Finance,
    Operations,
    Hr,
    Legal,
    Executive,
    Unknown,
}

/// One provider's answer for a person. Every field is nullable: `None`
/// means the provider had no answer, which adapters keep distinct from a
/// vendor-returned empty string (empty strings are dropped to `None`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderContact {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub email_status: Option<EmailStatus>,
    pub phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub direct_phone: Option<String>,
    pub job_title: Option<String>,
    pub seniority: Option<Seniority>,
    pub department: Option<Department>,
    pub linkedin_url: Option<String>,
    /// Which provider produced this record.
    pub provider: Option<ProviderId>,
    /// Per-call confidence reported for this record, 0-100.
    pub confidence: u8,
}

impl ProviderContact {
    /// Number of populated fields; used for best-candidate tie-breaks.
    pub fn populated_fields(&self) -> usize {
        [
            self.full_name.is_some(),
            self.email.is_some(),
            self.phone.is_some(),
            self.mobile_phone.is_some(),
            self.direct_phone.is_some(),
            self.job_title.is_some(),
            self.linkedin_url.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }

    /// True when the record carries nothing usable.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.mobile_phone.is_none()
            && self.direct_phone.is_none()
            && self.job_title.is_none()
            && self.linkedin_url.is_none()
    }
}

/// One provider's answer for a company. Same nullability rule as
/// [`ProviderContact`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCompany {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<i64>,
    pub employee_range: Option<String>,
    pub annual_revenue: Option<i64>,
    pub revenue_range: Option<String>,
    pub funding_total: Option<i64>,
    pub funding_stage: Option<String>,
    pub founded_year: Option<i32>,
    pub technologies: BTreeSet<String>,
    pub hq_city: Option<String>,
    pub hq_state: Option<String>,
    pub hq_country: Option<String>,
    pub description: Option<String>,
    pub linkedin_url: Option<String>,
    /// Which provider produced this record.
    pub provider: Option<ProviderId>,
    /// Per-call confidence reported for this record, 0-100.
    pub confidence: u8,
}

impl ProviderCompany {
    /// True when the record carries nothing usable.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.industry.is_none()
            && self.employee_count.is_none()
            && self.annual_revenue.is_none()
            && self.linkedin_url.is_none()
            && self.description.is_none()
            && self.technologies.is_empty()
    }
}

/// A single adapter answer: person-shaped or company-shaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderResponse {
    Contact(ProviderContact),
    Company(ProviderCompany),
}

impl ProviderResponse {
    /// True when neither shape carries usable fields.
    pub fn is_empty(&self) -> bool {
        match self {
            ProviderResponse::Contact(c) => c.is_empty(),
            ProviderResponse::Company(c) => c.is_empty(),
        }
    }
}

// ============ Merged Lead ============

/// Addressable fields of a lead; keys the per-field confidence map and the
/// audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    FullName,
    Email,
    Phone,
    MobilePhone,
    DirectPhone,
    JobTitle,
    Seniority,
    Department,
    ContactLinkedin,
    CompanyName,
    Website,
    Industry,
    EmployeeCount,
    EmployeeRange,
    AnnualRevenue,
    RevenueRange,
    FundingTotal,
    FundingStage,
    FoundedYear,
    Technologies,
    HqCity,
    HqState,
    HqCountry,
    Description,
    CompanyLinkedin,
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // snake_case, matching the serde rename
        let s = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(s.trim_matches('"'))
    }
}

/// Audit entry: which field came from which provider call, at what
/// recorded confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub field: FieldKey,
    pub provider: ProviderId,
    pub confidence: u8,
}

/// Data-quality annotation describing a known gap on a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcFlag {
    /// No known gap.
    None,
    /// Neither email nor any phone was found.
    NoContactInfo,
    /// Contact info found but no person name.
    MissingName,
    /// Only an unverified email and nothing else to corroborate it.
    UnverifiedEmailOnly,
}

/// Merged contact-side fields of a lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactFields {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub email_status: Option<EmailStatus>,
    pub phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub direct_phone: Option<String>,
    pub job_title: Option<String>,
    pub seniority: Option<Seniority>,
    pub department: Option<Department>,
    pub linkedin_url: Option<String>,
}

impl ContactFields {
    /// Any phone-like field present.
    pub fn any_phone(&self) -> bool {
        self.phone.is_some() || self.mobile_phone.is_some() || self.direct_phone.is_some()
    }
}

/// Merged company-side fields of a lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyFields {
    pub name: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<i64>,
    pub employee_range: Option<String>,
    pub annual_revenue: Option<i64>,
    pub revenue_range: Option<String>,
    pub funding_total: Option<i64>,
    pub funding_stage: Option<String>,
    pub founded_year: Option<i32>,
    pub technologies: BTreeSet<String>,
    pub hq_city: Option<String>,
    pub hq_state: Option<String>,
    pub hq_country: Option<String>,
    pub description: Option<String>,
    pub linkedin_url: Option<String>,
}

/// The persisted aggregate: merged contact + company plus bookkeeping.
///
/// Fields only ever move null -> value or lower-confidence value ->
/// higher-confidence value; `confidence_score` is always recomputed from
/// the current field set, never edited independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedLead {
    pub id: Uuid,
    /// Normalized domain this lead was enriched against.
    pub domain: String,
    pub contact: ContactFields,
    pub company: CompanyFields,
    /// Final 0-100 score, recomputed on every merge.
    pub confidence_score: u8,
    /// Base score for the call context (30 at scrape time).
    pub base_score: u8,
    /// Ordered list reflecting actual call sequence, not dedup order.
    pub providers_used: Vec<ProviderId>,
    /// Audit trail of which field came from which provider call.
    pub fields_enriched: Vec<FieldProvenance>,
    /// Confidence recorded per field, drives overwrite decisions.
    pub field_confidence: BTreeMap<FieldKey, u8>,
    pub qc_flag: QcFlag,
    /// Lead type as authored upstream (e.g. "inbound", "scraped").
    pub lead_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Base score applied to every lead created at scrape time.
pub const SCRAPE_BASE_SCORE: u8 = 30;

impl EnrichedLead {
    /// Fresh lead for a target, base score 30, no fields yet.
    pub fn new(target: &Target) -> Self {
        let now = Utc::now();
        let mut lead = Self {
            id: Uuid::new_v4(),
            domain: target.domain.clone(),
            contact: ContactFields {
                full_name: target.known_name.clone(),
                job_title: target.known_title.clone(),
                email: target.email.clone(),
                ..Default::default()
            },
            company: CompanyFields::default(),
            confidence_score: SCRAPE_BASE_SCORE,
            base_score: SCRAPE_BASE_SCORE,
            providers_used: Vec::new(),
            fields_enriched: Vec::new(),
            field_confidence: BTreeMap::new(),
            qc_flag: QcFlag::NoContactInfo,
            lead_type: None,
            created_at: now,
            updated_at: now,
        };
        lead.refresh_derived();
        lead
    }

    /// Recomputes `confidence_score` and `qc_flag` from the current field
    /// set. Called after every mutation so the score can never drift.
    pub fn refresh_derived(&mut self) {
        self.confidence_score =
            crate::scoring::confidence_score(&self.contact, &self.company, self.base_score);
        self.qc_flag = self.derive_qc_flag();
        self.updated_at = Utc::now();
    }

    fn derive_qc_flag(&self) -> QcFlag {
        let has_email = self.contact.email.is_some();
        let has_phone = self.contact.any_phone();
        if !has_email && !has_phone {
            QcFlag::NoContactInfo
        } else if self.contact.full_name.is_none() {
            QcFlag::MissingName
        } else if has_email
            && !has_phone
            && !matches!(
                self.contact.email_status,
                Some(EmailStatus::Verified) | Some(EmailStatus::LikelyValid)
            )
        {
            QcFlag::UnverifiedEmailOnly
        } else {
            QcFlag::None
        }
    }

    /// Records a provider call in the ordered usage list. Repeated calls to
    /// the same provider are kept: the list reflects call sequence.
    pub fn note_provider_used(&mut self, provider: ProviderId) {
        self.providers_used.push(provider);
    }
}

// ============ Provider Call Audit ============

/// One provider call, success or failure, for cost auditing and debugging.
/// Never consulted for control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCallRecord {
    pub lead_id: Uuid,
    pub provider: ProviderId,
    pub capability: Capability,
    pub success: bool,
    /// Fields the call contributed to the merged lead.
    pub fields_obtained: Vec<FieldKey>,
    /// Failure class when `success` is false.
    pub error_kind: Option<String>,
    pub duration_ms: u64,
    pub called_at: DateTime<Utc>,
}

// ============ Routing Rules ============

/// Priority-ordered predicate + action pair for lead assignment.
///
/// All criteria are optional and AND-combined; a missing criterion is a
/// wildcard. Rules are externally authored and read-only to the matcher.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: Uuid,
    pub name: String,
    /// Evaluation order: higher priority first.
    pub priority: i32,
    /// Case-insensitive "any of" match against the lead's industry.
    pub criteria_industry: Option<Vec<String>>,
    /// Case-insensitive "any of" match against the lead's HQ state.
    pub criteria_state: Option<Vec<String>>,
    /// Inclusive lower bound on the lead score.
    pub criteria_min_score: Option<i32>,
    /// Inclusive upper bound on the lead score.
    pub criteria_max_score: Option<i32>,
    /// Case-insensitive "any of" match against the lead type.
    pub criteria_lead_type: Option<Vec<String>>,
    /// Organization the lead is assigned to when the rule matches.
    pub assign_to_org: Option<Uuid>,
    /// Whether a match should trigger a further enrichment pass.
    pub auto_enrich: bool,
    /// Whether a match should fire a webhook.
    pub webhook_enabled: bool,
    pub webhook_url: Option<String>,
}
