//! Confidence scoring: a pure function over the current field set.
//!
//! The score is always recomputed from scratch, never incremented in
//! place, so repeated partial updates cannot inflate it.

use crate::models::{CompanyFields, ContactFields, EmailStatus};

/// Points awarded per signal. Additive and order-independent; the sum is
/// clamped to [0, 100].
const EMAIL_PRESENT: u32 = 25;
const EMAIL_VERIFIED_BONUS: u32 = 10;
const PHONE_PRESENT: u32 = 15;
const FULL_NAME_PRESENT: u32 = 10;
const JOB_TITLE_PRESENT: u32 = 10;
const EMPLOYEE_COUNT_PRESENT: u32 = 5;
const INDUSTRY_PRESENT: u32 = 5;
const REVENUE_PRESENT: u32 = 5;
const LINKEDIN_PRESENT: u32 = 5;

/// Computes the 0-100 confidence score for a lead's current field set.
///
/// `base` depends on call context (20-30; 30 for leads created at scrape
/// time). Idempotent for a fixed field set.
pub fn confidence_score(contact: &ContactFields, company: &CompanyFields, base: u8) -> u8 {
    let mut score: u32 = base as u32;

    if contact.email.is_some() {
        score += EMAIL_PRESENT;
        if matches!(contact.email_status, Some(EmailStatus::Verified)) {
            score += EMAIL_VERIFIED_BONUS;
        }
    }
    if contact.any_phone() {
        score += PHONE_PRESENT;
    }
    if contact.full_name.is_some() {
        score += FULL_NAME_PRESENT;
    }
    if contact.job_title.is_some() {
        score += JOB_TITLE_PRESENT;
    }
    if company.employee_count.is_some() {
        score += EMPLOYEE_COUNT_PRESENT;
    }
    if company.industry.is_some() {
        score += INDUSTRY_PRESENT;
    }
    if company.annual_revenue.is_some() {
        score += REVENUE_PRESENT;
    }
    if contact.linkedin_url.is_some() || company.linkedin_url.is_some() {
        score += LINKEDIN_PRESENT;
    }

    score.min(100) as u8
}
