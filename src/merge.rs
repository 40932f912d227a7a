//! Merge/dedup engine.
//!
//! Field-level rule: a null field adopts any non-null candidate value; a
//! populated field is only overwritten when the incoming call's confidence
//! exceeds the confidence recorded for that specific field. Fields never
//! move back to null and are never silently downgraded.

use crate::models::{
    EnrichedLead, FieldKey, FieldProvenance, ProviderCompany, ProviderContact, ProviderId,
    ProviderResponse,
};
use crate::normalize;
use std::collections::BTreeMap;

/// Tracks adoption decisions for one merge pass.
struct MergeCtx<'a> {
    provider: ProviderId,
    source_confidence: u8,
    field_confidence: &'a mut BTreeMap<FieldKey, u8>,
    audit: &'a mut Vec<FieldProvenance>,
    adopted: Vec<FieldKey>,
}

impl<'a> MergeCtx<'a> {
    /// Applies the field-level rule to one slot. Returns true on adoption.
    fn adopt<T: Clone + PartialEq>(
        &mut self,
        slot: &mut Option<T>,
        candidate: Option<T>,
        key: FieldKey,
    ) -> bool {
        let Some(value) = candidate else {
            return false;
        };

        match slot {
            None => {}
            Some(existing) => {
                let recorded = self.field_confidence.get(&key).copied().unwrap_or(0);
                if self.source_confidence <= recorded {
                    return false;
                }
                if *existing == value {
                    // Same value at higher confidence: upgrade the record
                    // without a new adoption.
                    self.field_confidence.insert(key, self.source_confidence);
                    self.record_audit(key);
                    return false;
                }
            }
        }

        *slot = Some(value);
        self.field_confidence.insert(key, self.source_confidence);
        self.record_audit(key);
        self.adopted.push(key);
        true
    }

    /// One audit entry per (field, provider); a repeat of the same merge
    /// never duplicates entries.
    fn record_audit(&mut self, key: FieldKey) {
        self.audit
            .retain(|p| !(p.field == key && p.provider == self.provider));
        self.audit.push(FieldProvenance {
            field: key,
            provider: self.provider,
            confidence: self.source_confidence,
        });
    }
}

/// Merges a provider response into a lead and recomputes the score.
/// Returns the fields this call contributed.
pub fn merge(
    lead: &mut EnrichedLead,
    candidate: &ProviderResponse,
    source_confidence: u8,
) -> Vec<FieldKey> {
    let adopted = match candidate {
        ProviderResponse::Contact(c) => merge_contact(lead, c, source_confidence),
        ProviderResponse::Company(c) => merge_company(lead, c, source_confidence),
    };
    lead.refresh_derived();
    adopted
}

/// Merges one provider's person answer into the lead.
pub fn merge_contact(
    lead: &mut EnrichedLead,
    candidate: &ProviderContact,
    source_confidence: u8,
) -> Vec<FieldKey> {
    let provider = candidate.provider.unwrap_or(ProviderId::Scrape);
    let contact = &mut lead.contact;
    let mut ctx = MergeCtx {
        provider,
        source_confidence,
        field_confidence: &mut lead.field_confidence,
        audit: &mut lead.fields_enriched,
        adopted: Vec::new(),
    };

    ctx.adopt(
        &mut contact.full_name,
        normalize::clean_text(candidate.full_name.as_deref()),
        FieldKey::FullName,
    );
    let email = normalize::clean_email(candidate.email.as_deref());
    if ctx.adopt(&mut contact.email, email, FieldKey::Email) {
        // Status travels with the email value it describes.
        contact.email_status = candidate.email_status;
    } else if contact.email.is_some()
        && candidate.email.as_deref().map(normalize::normalize_email) == contact.email
    {
        // Same address seen again: keep the stronger verification signal.
        if verification_rank(candidate.email_status) > verification_rank(contact.email_status) {
            contact.email_status = candidate.email_status;
        }
    }
    ctx.adopt(
        &mut contact.phone,
        candidate.phone.as_deref().and_then(normalize::normalize_phone),
        FieldKey::Phone,
    );
    ctx.adopt(
        &mut contact.mobile_phone,
        candidate
            .mobile_phone
            .as_deref()
            .and_then(normalize::normalize_phone),
        FieldKey::MobilePhone,
    );
    ctx.adopt(
        &mut contact.direct_phone,
        candidate
            .direct_phone
            .as_deref()
            .and_then(normalize::normalize_phone),
        FieldKey::DirectPhone,
    );
    ctx.adopt(
        &mut contact.job_title,
        normalize::clean_text(candidate.job_title.as_deref()),
        FieldKey::JobTitle,
    );
    ctx.adopt(&mut contact.seniority, candidate.seniority, FieldKey::Seniority);
    ctx.adopt(
        &mut contact.department,
        candidate.department,
        FieldKey::Department,
    );
    ctx.adopt(
        &mut contact.linkedin_url,
        normalize::clean_text(candidate.linkedin_url.as_deref()),
        FieldKey::ContactLinkedin,
    );

    ctx.adopted
}

/// Merges one provider's company answer into the lead.
pub fn merge_company(
    lead: &mut EnrichedLead,
    candidate: &ProviderCompany,
    source_confidence: u8,
) -> Vec<FieldKey> {
    let provider = candidate.provider.unwrap_or(ProviderId::Scrape);
    let company = &mut lead.company;
    let mut ctx = MergeCtx {
        provider,
        source_confidence,
        field_confidence: &mut lead.field_confidence,
        audit: &mut lead.fields_enriched,
        adopted: Vec::new(),
    };

    ctx.adopt(
        &mut company.name,
        normalize::clean_text(candidate.name.as_deref()),
        FieldKey::CompanyName,
    );
    ctx.adopt(
        &mut company.website,
        normalize::clean_text(candidate.website.as_deref()),
        FieldKey::Website,
    );
    ctx.adopt(
        &mut company.industry,
        normalize::clean_text(candidate.industry.as_deref()),
        FieldKey::Industry,
    );
    ctx.adopt(
        &mut company.employee_count,
        candidate.employee_count,
        FieldKey::EmployeeCount,
    );
    ctx.adopt(
        &mut company.employee_range,
        normalize::clean_text(candidate.employee_range.as_deref()),
        FieldKey::EmployeeRange,
    );
    ctx.adopt(
        &mut company.annual_revenue,
        candidate.annual_revenue,
        FieldKey::AnnualRevenue,
    );
    ctx.adopt(
        &mut company.revenue_range,
        normalize::clean_text(candidate.revenue_range.as_deref()),
        FieldKey::RevenueRange,
    );
    ctx.adopt(
        &mut company.funding_total,
        candidate.funding_total,
        FieldKey::FundingTotal,
    );
    ctx.adopt(
        &mut company.funding_stage,
        normalize::clean_text(candidate.funding_stage.as_deref()),
        FieldKey::FundingStage,
    );
    ctx.adopt(
        &mut company.founded_year,
        candidate.founded_year,
        FieldKey::FoundedYear,
    );
    ctx.adopt(
        &mut company.hq_city,
        normalize::clean_text(candidate.hq_city.as_deref()),
        FieldKey::HqCity,
    );
    ctx.adopt(
        &mut company.hq_state,
        normalize::clean_text(candidate.hq_state.as_deref()),
        FieldKey::HqState,
    );
    ctx.adopt(
        &mut company.hq_country,
        normalize::clean_text(candidate.hq_country.as_deref()),
        FieldKey::HqCountry,
    );
    ctx.adopt(
        &mut company.description,
        normalize::clean_text(candidate.description.as_deref()),
        FieldKey::Description,
    );
    ctx.adopt(
        &mut company.linkedin_url,
        normalize::clean_text(candidate.linkedin_url.as_deref()),
        FieldKey::CompanyLinkedin,
    );

    // Technology sets grow monotonically: union, never replace.
    let mut added_tech = false;
    for tech in &candidate.technologies {
        let t = tech.trim();
        if !t.is_empty() && company.technologies.insert(t.to_string()) {
            added_tech = true;
        }
    }
    if added_tech {
        ctx.record_audit(FieldKey::Technologies);
        let entry = ctx
            .field_confidence
            .entry(FieldKey::Technologies)
            .or_insert(0);
        *entry = (*entry).max(source_confidence);
        ctx.adopted.push(FieldKey::Technologies);
    }

    ctx.adopted
}

fn verification_rank(status: Option<crate::models::EmailStatus>) -> u8 {
    use crate::models::EmailStatus::*;
    match status {
        Some(Verified) => 4,
        Some(LikelyValid) => 3,
        Some(Unverified) => 2,
        Some(Invalid) => 1,
        None => 0,
    }
}

// ============ Cross-record dedup ============

/// Collapses candidate contacts that resolve to the same real-world person.
///
/// Candidates are keyed by normalized email first, then by normalized full
/// name. When two share a key the higher-confidence one survives, and the
/// survivor pulls any uniquely-present fields from the discarded candidate;
/// data is never thrown away outright. Input order is preserved for
/// survivors, so the result is deterministic.
pub fn dedup_contacts(candidates: Vec<ProviderContact>) -> Vec<ProviderContact> {
    let mut survivors: Vec<ProviderContact> = Vec::new();

    'outer: for candidate in candidates {
        for existing in survivors.iter_mut() {
            if same_person(existing, &candidate) {
                if candidate.confidence > existing.confidence {
                    let loser = std::mem::replace(existing, candidate);
                    fill_missing(existing, &loser);
                } else {
                    fill_missing(existing, &candidate);
                }
                continue 'outer;
            }
        }
        survivors.push(candidate);
    }

    survivors
}

fn same_person(a: &ProviderContact, b: &ProviderContact) -> bool {
    if let (Some(ea), Some(eb)) = (a.email.as_deref(), b.email.as_deref()) {
        if normalize::normalize_email(ea) == normalize::normalize_email(eb) {
            return true;
        }
        // Distinct emails are distinct people even if names collide.
        return false;
    }
    if let (Some(na), Some(nb)) = (a.full_name.as_deref(), b.full_name.as_deref()) {
        return na.trim().to_lowercase() == nb.trim().to_lowercase();
    }
    false
}

/// Copies loser fields the survivor lacks. The field-level confidence rule
/// resolves to "fill nulls only" here because the survivor's aggregate
/// confidence is the higher of the two.
fn fill_missing(survivor: &mut ProviderContact, loser: &ProviderContact) {
    macro_rules! fill {
        ($field:ident) => {
            if survivor.$field.is_none() {
                survivor.$field = loser.$field.clone();
            }
        };
    }
    fill!(full_name);
    if survivor.email.is_none() {
        survivor.email = loser.email.clone();
        survivor.email_status = loser.email_status;
    }
    fill!(phone);
    fill!(mobile_phone);
    fill!(direct_phone);
    fill!(job_title);
    fill!(seniority);
    fill!(department);
    fill!(linkedin_url);
}
