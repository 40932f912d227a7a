/// Adapter tests with mocked vendor APIs.
/// Each provider's raw payload is decoded into the shared contact/company
/// shapes without hitting real external services.
use leadgen_waterfall::errors::{AppError, ProviderErrorKind};
use leadgen_waterfall::models::{Capability, EmailStatus, ProviderResponse, Seniority, Target};
use leadgen_waterfall::providers::{ApolloService, ClearbitService, HunterService, PdlService};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn target() -> Target {
    Target::from_domain("acme.com").unwrap()
}

#[tokio::test]
async fn apollo_decodes_people_and_picks_decision_maker() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "people": [
            {
                "name": "Sam Junior",
                "title": "Sales Associate",
                "email": "sam@acme.com",
                "email_status": "guessed"
            },
            {
                "name": "Jane Doe",
                "title": "Founder & CEO",
                "email": "Jane@Acme.com",
                "email_status": "verified",
                "phone_number": "+1 (555) 123-4567",
                "linkedin_url": "https://linkedin.com/in/janedoe"
            }
        ]
    });

    Mock::given(method("POST"))
        .and(path("/mixed_people/search"))
        .and(header("X-Api-Key", "test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let service = ApolloService::new(&mock_server.uri(), "test_key", TIMEOUT).unwrap();
    let response = service.enrich(&target(), Capability::Person).await.unwrap();

    let contact = match response {
        ProviderResponse::Contact(c) => c,
        other => panic!("expected contact, got {:?}", other),
    };
    assert_eq!(contact.full_name.as_deref(), Some("Jane Doe"));
    assert_eq!(contact.email.as_deref(), Some("jane@acme.com"));
    assert_eq!(contact.email_status, Some(EmailStatus::Verified));
    assert_eq!(contact.phone.as_deref(), Some("15551234567"));
    assert_eq!(contact.seniority, Some(Seniority::Founder));
}

#[tokio::test]
async fn apollo_company_enrichment_maps_org_fields() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "organization": {
            "name": "Acme Corp",
            "website_url": "https://acme.com",
            "industry": "Software",
            "estimated_num_employees": 250,
            "annual_revenue": 12000000,
            "founded_year": 2012,
            "city": "Austin",
            "state": "TX",
            "country": "US",
            "technology_names": ["Salesforce", "AWS"]
        }
    });

    Mock::given(method("GET"))
        .and(path("/organizations/enrich"))
        .and(query_param("domain", "acme.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let service = ApolloService::new(&mock_server.uri(), "test_key", TIMEOUT).unwrap();
    let response = service.enrich(&target(), Capability::Company).await.unwrap();

    let company = match response {
        ProviderResponse::Company(c) => c,
        other => panic!("expected company, got {:?}", other),
    };
    assert_eq!(company.name.as_deref(), Some("Acme Corp"));
    assert_eq!(company.employee_count, Some(250));
    assert_eq!(company.hq_state.as_deref(), Some("TX"));
    assert!(company.technologies.contains("AWS"));
}

#[tokio::test]
async fn apollo_401_maps_to_auth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mixed_people/search"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&mock_server)
        .await;

    let service = ApolloService::new(&mock_server.uri(), "bad_key", TIMEOUT).unwrap();
    let err = service.enrich(&target(), Capability::Person).await.unwrap_err();

    assert_eq!(err.provider_kind(), Some(ProviderErrorKind::Auth));
}

#[tokio::test]
async fn apollo_429_maps_to_rate_limited() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mixed_people/search"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&mock_server)
        .await;

    let service = ApolloService::new(&mock_server.uri(), "test_key", TIMEOUT).unwrap();
    let err = service.enrich(&target(), Capability::Person).await.unwrap_err();

    assert_eq!(err.provider_kind(), Some(ProviderErrorKind::RateLimited));
    assert!(err.provider_kind().unwrap().is_retryable());
}

#[tokio::test]
async fn apollo_garbage_body_maps_to_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mixed_people/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>maintenance</html>")
                .insert_header("content-type", "application/json"),
        )
        .mount(&mock_server)
        .await;

    let service = ApolloService::new(&mock_server.uri(), "test_key", TIMEOUT).unwrap();
    let err = service.enrich(&target(), Capability::Person).await.unwrap_err();

    assert_eq!(err.provider_kind(), Some(ProviderErrorKind::InvalidResponse));
}

#[tokio::test]
async fn hunter_maps_verification_status() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "data": {
            "emails": [
                {
                    "value": "jane@acme.com",
                    "first_name": "Jane",
                    "last_name": "Doe",
                    "position": "VP of Sales",
                    "verification": { "status": "valid" }
                }
            ]
        }
    });

    Mock::given(method("GET"))
        .and(path("/domain-search"))
        .and(query_param("domain", "acme.com"))
        .and(query_param("api_key", "test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let service = HunterService::new(&mock_server.uri(), "test_key", TIMEOUT).unwrap();
    let response = service.enrich(&target(), Capability::Email).await.unwrap();

    let contact = match response {
        ProviderResponse::Contact(c) => c,
        other => panic!("expected contact, got {:?}", other),
    };
    assert_eq!(contact.full_name.as_deref(), Some("Jane Doe"));
    assert_eq!(contact.email_status, Some(EmailStatus::Verified));
    assert_eq!(contact.seniority, Some(Seniority::Vp));
}

#[tokio::test]
async fn hunter_no_results_is_a_successful_empty_answer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/domain-search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {"emails": []}})),
        )
        .mount(&mock_server)
        .await;

    let service = HunterService::new(&mock_server.uri(), "test_key", TIMEOUT).unwrap();
    let response = service.enrich(&target(), Capability::Email).await.unwrap();

    assert!(response.is_empty());
}

#[tokio::test]
async fn clearbit_maps_camel_case_company_payload() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "name": "Acme Corp",
        "domain": "acme.com",
        "category": { "industry": "Software" },
        "metrics": {
            "employees": 250,
            "employeesRange": "201-500",
            "estimatedAnnualRevenue": "$10M-$50M"
        },
        "foundedYear": 2012,
        "geo": { "city": "Austin", "state": "TX", "country": "US" },
        "linkedin": { "handle": "company/acme-corp" }
    });

    Mock::given(method("GET"))
        .and(path("/companies/find"))
        .and(query_param("domain", "acme.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let service = ClearbitService::new(&mock_server.uri(), "test_key", TIMEOUT).unwrap();
    let response = service.enrich(&target(), Capability::Company).await.unwrap();

    let company = match response {
        ProviderResponse::Company(c) => c,
        other => panic!("expected company, got {:?}", other),
    };
    assert_eq!(company.name.as_deref(), Some("Acme Corp"));
    assert_eq!(company.industry.as_deref(), Some("Software"));
    assert_eq!(company.employee_range.as_deref(), Some("201-500"));
    assert_eq!(company.founded_year, Some(2012));
}

#[tokio::test]
async fn clearbit_404_is_a_successful_empty_answer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/companies/find"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let service = ClearbitService::new(&mock_server.uri(), "test_key", TIMEOUT).unwrap();
    let response = service.enrich(&target(), Capability::Company).await.unwrap();

    assert!(response.is_empty());
}

#[tokio::test]
async fn pdl_maps_person_payload() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "status": 200,
        "data": {
            "full_name": "Jane Doe",
            "work_email": "jane@acme.com",
            "mobile_phone": "+15551234567",
            "job_title": "VP of Marketing",
            "job_title_levels": ["vp"],
            "job_title_role": "marketing",
            "linkedin_url": "https://linkedin.com/in/janedoe"
        }
    });

    Mock::given(method("GET"))
        .and(path("/person/enrich"))
        .and(header("X-Api-Key", "test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .mount(&mock_server)
        .await;

    let service = PdlService::new(&mock_server.uri(), "test_key", TIMEOUT).unwrap();
    let response = service.enrich(&target(), Capability::Person).await.unwrap();

    let contact = match response {
        ProviderResponse::Contact(c) => c,
        other => panic!("expected contact, got {:?}", other),
    };
    assert_eq!(contact.full_name.as_deref(), Some("Jane Doe"));
    assert_eq!(contact.email.as_deref(), Some("jane@acme.com"));
    assert_eq!(contact.mobile_phone.as_deref(), Some("15551234567"));
    assert_eq!(contact.seniority, Some(Seniority::Vp));
}

#[tokio::test]
async fn pdl_no_match_is_a_successful_empty_answer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/person/enrich"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"status": 404, "error": {"type": "not_found"}})),
        )
        .mount(&mock_server)
        .await;

    let service = PdlService::new(&mock_server.uri(), "test_key", TIMEOUT).unwrap();
    let response = service.enrich(&target(), Capability::Person).await.unwrap();

    assert!(response.is_empty());
}

#[tokio::test]
async fn unreachable_provider_maps_to_transport() {
    // Port 1 refuses connections.
    let service = ApolloService::new("http://127.0.0.1:1", "test_key", TIMEOUT).unwrap();
    let err = service.enrich(&target(), Capability::Person).await.unwrap_err();

    match err {
        AppError::Provider { kind, .. } => assert_eq!(kind, ProviderErrorKind::Transport),
        other => panic!("expected provider error, got {}", other),
    }
}
