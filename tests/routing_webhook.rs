/// Routing and webhook delivery tests.
/// Rule matching plus the outbound notification, with the receiver mocked.
use leadgen_waterfall::models::{EnrichedLead, RoutingRule, Target};
use leadgen_waterfall::routing::match_rule;
use leadgen_waterfall::webhook::WebhookClient;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rule(name: &str, priority: i32) -> RoutingRule {
    RoutingRule {
        id: Uuid::new_v4(),
        name: name.to_string(),
        priority,
        criteria_industry: None,
        criteria_state: None,
        criteria_min_score: None,
        criteria_max_score: None,
        criteria_lead_type: None,
        assign_to_org: None,
        auto_enrich: false,
        webhook_enabled: false,
        webhook_url: None,
    }
}

fn lead(industry: &str, state: &str, score: u8) -> EnrichedLead {
    let mut lead = EnrichedLead::new(&Target::from_domain("acme.com").unwrap());
    lead.company.industry = Some(industry.to_string());
    lead.company.hq_state = Some(state.to_string());
    lead.confidence_score = score;
    lead
}

#[test]
fn hot_saas_lead_routes_past_the_catch_all() {
    let mut hot = rule("hot-saas", 100);
    hot.criteria_industry = Some(vec!["Software".to_string(), "SaaS".to_string()]);
    hot.criteria_min_score = Some(75);
    hot.assign_to_org = Some(Uuid::new_v4());

    let mut regional = rule("southwest", 50);
    regional.criteria_state = Some(vec!["TX".to_string(), "AZ".to_string(), "NM".to_string()]);
    regional.criteria_min_score = Some(50);

    let catch_all = rule("default-queue", 0);

    let rules = vec![catch_all.clone(), regional.clone(), hot.clone()];

    // High-scoring software lead in Texas matches the hot rule, not the
    // regional one, despite satisfying both.
    let matched = match_rule(&rules, &lead("software", "TX", 88)).unwrap();
    assert_eq!(matched.name, "hot-saas");

    // Same lead below the score floor falls to the regional rule.
    let matched = match_rule(&rules, &lead("software", "TX", 60)).unwrap();
    assert_eq!(matched.name, "southwest");

    // Nothing specific applies: the catch-all takes it.
    let matched = match_rule(&rules, &lead("Retail", "NY", 60)).unwrap();
    assert_eq!(matched.name, "default-queue");
}

#[test]
fn matching_is_deterministic_across_repeats() {
    let mut a = rule("band-a", 10);
    a.criteria_min_score = Some(50);
    let mut b = rule("band-b", 10);
    b.criteria_min_score = Some(50);
    let rules = vec![b, a];

    let l = lead("Software", "TX", 70);
    let first = match_rule(&rules, &l).unwrap().name.clone();
    for _ in 0..10 {
        assert_eq!(match_rule(&rules, &l).unwrap().name, first);
    }
}

#[tokio::test]
async fn webhook_delivers_the_routing_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/leads"))
        .and(body_partial_json(serde_json::json!({
            "event": "lead.routed",
            "rule": { "name": "hot-saas" },
            "lead": { "domain": "acme.com", "confidence_score": 88 }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut r = rule("hot-saas", 100);
    r.webhook_enabled = true;
    r.webhook_url = Some(format!("{}/hooks/leads", mock_server.uri()));

    let client = WebhookClient::new(5).unwrap();
    client.notify(&r, &lead("Software", "TX", 88)).await.unwrap();
}

#[tokio::test]
async fn webhook_failure_is_reported_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/leads"))
        .respond_with(ResponseTemplate::new(500).set_body_string("downstream broken"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut r = rule("hot-saas", 100);
    r.webhook_enabled = true;
    r.webhook_url = Some(format!("{}/hooks/leads", mock_server.uri()));

    let client = WebhookClient::new(5).unwrap();
    let err = client.notify(&r, &lead("Software", "TX", 88)).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn webhook_without_url_is_a_config_error() {
    let mut r = rule("hot-saas", 100);
    r.webhook_enabled = true;

    let client = WebhookClient::new(5).unwrap();
    let err = client.notify(&r, &lead("Software", "TX", 88)).await;
    assert!(err.is_err());
}
