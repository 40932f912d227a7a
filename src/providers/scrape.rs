//! Scraped page text as a provider.
//!
//! The scrape subsystem hands the waterfall raw page text; whatever
//! contact/company facts the regexes find participate in the merge as a
//! zero-cost source at the lowest trust tier.

use crate::models::{
    Capability, ProviderCompany, ProviderContact, ProviderId, ProviderResponse, Target,
};
use crate::normalize;
use regex::Regex;
use std::sync::OnceLock;

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("static email pattern")
    })
}

fn phone_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("static phone pattern")
    })
}

fn linkedin_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:https?://)?(?:www\.)?linkedin\.com/(in|company)/[A-Za-z0-9_-]+")
            .expect("static linkedin pattern")
    })
}

/// Raw page text for one target, queried like any other provider.
pub struct ScrapeSource {
    page_text: String,
}

impl ScrapeSource {
    pub fn new(page_text: String) -> Self {
        Self { page_text }
    }

    /// Regex extraction from the page text. Infallible: a page with no
    /// recognizable facts yields an empty record.
    pub fn extract(&self, target: &Target, capability: Capability) -> ProviderResponse {
        match capability {
            Capability::Company => ProviderResponse::Company(self.extract_company(target)),
            _ => ProviderResponse::Contact(self.extract_contact(target)),
        }
    }

    fn extract_contact(&self, target: &Target) -> ProviderContact {
        // Prefer addresses at the target's own domain over third-party
        // addresses embedded in the page.
        let suffix = format!("@{}", target.domain);
        let mut on_domain = None;
        let mut any = None;
        for m in email_pattern().find_iter(&self.page_text) {
            let found = m.as_str().to_lowercase();
            if !normalize::is_valid_email(&found) {
                continue;
            }
            if found.ends_with(&suffix) && on_domain.is_none() {
                on_domain = Some(found.clone());
            }
            if any.is_none() {
                any = Some(found);
            }
        }
        let email = on_domain.or(any);

        let phone = phone_pattern()
            .find_iter(&self.page_text)
            .find_map(|m| normalize::normalize_phone(m.as_str()));

        let linkedin_url = linkedin_pattern()
            .find_iter(&self.page_text)
            .find(|m| m.as_str().contains("/in/"))
            .map(|m| m.as_str().to_string());

        let contact = ProviderContact {
            email,
            phone,
            linkedin_url,
            provider: Some(ProviderId::Scrape),
            ..Default::default()
        };
        tracing::debug!(
            "Scrape: extracted {} field(s) for {}",
            contact.populated_fields(),
            target.domain
        );
        contact
    }

    fn extract_company(&self, target: &Target) -> ProviderCompany {
        let linkedin_url = linkedin_pattern()
            .find_iter(&self.page_text)
            .find(|m| m.as_str().contains("/company/"))
            .map(|m| m.as_str().to_string());

        ProviderCompany {
            domain: Some(target.domain.clone()),
            linkedin_url,
            provider: Some(ProviderId::Scrape),
            ..Default::default()
        }
    }
}
