/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use leadgen_waterfall::merge;
use leadgen_waterfall::models::{
    CompanyFields, ContactFields, EmailStatus, EnrichedLead, ProviderContact, ProviderId,
    ProviderResponse, Target,
};
use leadgen_waterfall::normalize::{is_valid_email, normalize_domain, normalize_email, normalize_phone};
use leadgen_waterfall::scoring::confidence_score;
use proptest::prelude::*;

// Property: normalization should never panic on arbitrary input
proptest! {
    #[test]
    fn domain_normalization_never_panics(raw in "\\PC*") {
        let _ = normalize_domain(&raw);
    }

    #[test]
    fn normalized_domains_are_lowercase_without_scheme(
        host in "[a-zA-Z][a-zA-Z0-9-]{0,20}",
        tld in "[a-zA-Z]{2,6}"
    ) {
        prop_assume!(!host.eq_ignore_ascii_case("www"));
        let raw = format!("https://WWW.{}.{}/about", host, tld);
        let normalized = normalize_domain(&raw).unwrap();
        prop_assert_eq!(normalized.clone(), normalized.to_lowercase());
        prop_assert!(!normalized.contains("://"));
        prop_assert!(!normalized.starts_with("www."));
        prop_assert!(!normalized.contains('/'));
    }

    #[test]
    fn normalization_is_idempotent(host in "[a-z][a-z0-9-]{0,20}", tld in "[a-z]{2,6}") {
        let raw = format!("{}.{}", host, tld);
        if let Some(once) = normalize_domain(&raw) {
            prop_assert_eq!(normalize_domain(&once), Some(once.clone()));
        }
    }

    #[test]
    fn email_normalization_never_panics(email in "\\PC*") {
        let _ = normalize_email(&email);
        let _ = is_valid_email(&email);
    }

    #[test]
    fn phone_normalization_keeps_only_digits(phone in "\\PC*") {
        if let Some(normalized) = normalize_phone(&phone) {
            prop_assert!(normalized.chars().all(|c| c.is_ascii_digit()));
            prop_assert!(normalized.len() == 10 || normalized.len() == 11);
        }
    }
}

// Property: the confidence score is always within [0, 100]
proptest! {
    #[test]
    fn score_stays_in_bounds(
        base in 0u8..=100,
        has_email in any::<bool>(),
        verified in any::<bool>(),
        has_phone in any::<bool>(),
        has_name in any::<bool>(),
        has_title in any::<bool>(),
        has_employees in any::<bool>(),
        has_industry in any::<bool>(),
        has_revenue in any::<bool>(),
        has_linkedin in any::<bool>()
    ) {
        let contact = ContactFields {
            email: has_email.then(|| "a@b.com".to_string()),
            email_status: (has_email && verified).then_some(EmailStatus::Verified),
            phone: has_phone.then(|| "5551234567".to_string()),
            full_name: has_name.then(|| "Jane Doe".to_string()),
            job_title: has_title.then(|| "CEO".to_string()),
            linkedin_url: has_linkedin.then(|| "https://linkedin.com/in/x".to_string()),
            ..Default::default()
        };
        let company = CompanyFields {
            employee_count: has_employees.then_some(100),
            industry: has_industry.then(|| "Software".to_string()),
            annual_revenue: has_revenue.then_some(1_000_000),
            ..Default::default()
        };
        let score = confidence_score(&contact, &company, base);
        prop_assert!(score <= 100);
    }
}

fn arb_contact() -> impl Strategy<Value = ProviderContact> {
    (
        proptest::option::of("[A-Z][a-z]{1,8} [A-Z][a-z]{1,8}"),
        proptest::option::of("[a-z]{1,8}@[a-z]{1,8}\\.com"),
        proptest::option::of("[1-9][0-9]{9}"),
        proptest::option::of("(CEO|VP of Sales|Engineer|Director)"),
    )
        .prop_map(|(full_name, email, phone, job_title)| ProviderContact {
            full_name,
            email,
            phone,
            job_title: job_title.map(String::from),
            provider: Some(ProviderId::Apollo),
            ..Default::default()
        })
}

// Property: re-merging the same response changes nothing
proptest! {
    #[test]
    fn merge_is_idempotent(contact in arb_contact(), trust in 1u8..=100) {
        let target = Target::from_domain("acme.com").unwrap();
        let mut lead = EnrichedLead::new(&target);

        let response = ProviderResponse::Contact(contact);
        merge::merge(&mut lead, &response, trust);
        let score_once = lead.confidence_score;
        let fields_once = lead.field_confidence.clone();
        let audit_once = lead.fields_enriched.len();

        merge::merge(&mut lead, &response, trust);
        prop_assert_eq!(lead.confidence_score, score_once);
        prop_assert_eq!(lead.field_confidence, fields_once);
        prop_assert_eq!(lead.fields_enriched.len(), audit_once);
    }

    // Property: merging can never erase a populated field
    #[test]
    fn merge_never_removes_fields(
        first in arb_contact(),
        second in arb_contact(),
        trust_a in 1u8..=100,
        trust_b in 1u8..=100
    ) {
        let target = Target::from_domain("acme.com").unwrap();
        let mut lead = EnrichedLead::new(&target);

        merge::merge(&mut lead, &ProviderResponse::Contact(first), trust_a);
        let had_email = lead.contact.email.is_some();
        let had_name = lead.contact.full_name.is_some();
        let had_phone = lead.contact.phone.is_some();

        merge::merge(&mut lead, &ProviderResponse::Contact(second), trust_b);
        prop_assert!(!had_email || lead.contact.email.is_some());
        prop_assert!(!had_name || lead.contact.full_name.is_some());
        prop_assert!(!had_phone || lead.contact.phone.is_some());
    }

    // Property: a lower-trust source never overwrites a higher-trust value
    #[test]
    fn lower_trust_never_overwrites(email_a in "[a-z]{1,8}@acme\\.com", email_b in "[a-z]{1,8}@globex\\.com") {
        prop_assume!(email_a != email_b);
        let target = Target::from_domain("acme.com").unwrap();
        let mut lead = EnrichedLead::new(&target);

        let high = ProviderContact { email: Some(email_a.clone()), ..Default::default() };
        let low = ProviderContact { email: Some(email_b), ..Default::default() };
        merge::merge(&mut lead, &ProviderResponse::Contact(high), 70);
        merge::merge(&mut lead, &ProviderResponse::Contact(low), 20);

        prop_assert_eq!(lead.contact.email, Some(email_a));
    }
}
