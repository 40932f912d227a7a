use leadgen_waterfall::billing::UnmeteredGate;
use leadgen_waterfall::config::Config;
use leadgen_waterfall::models::Target;
use leadgen_waterfall::waterfall::{CancelFlag, EnrichmentRequest, Waterfall};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Runs the enrichment waterfall for the domains given on the command
/// line and prints each outcome as JSON, one per line.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leadgen_waterfall=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let domains: Vec<String> = std::env::args().skip(1).collect();
    if domains.is_empty() {
        anyhow::bail!("usage: leadgen-waterfall <domain> [<domain> ...]");
    }

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let waterfall = Arc::new(Waterfall::new(config, UnmeteredGate)?);
    tracing::info!(
        "Waterfall initialized with providers {:?}",
        waterfall.provider_order()
    );

    let mut requests = Vec::with_capacity(domains.len());
    for domain in &domains {
        requests.push(EnrichmentRequest::new(Target::from_domain(domain)?));
    }

    let cancel = CancelFlag::new();
    for result in waterfall.enrich_batch(requests, &cancel).await {
        match result {
            Ok(outcome) => {
                println!("{}", serde_json::to_string_pretty(&outcome.lead)?);
                tracing::info!(
                    "{}: state {:?}, score {}, {} call(s)",
                    outcome.lead.domain,
                    outcome.state,
                    outcome.lead.confidence_score,
                    outcome.calls.len()
                );
            }
            Err(e) => tracing::error!("enrichment failed: {}", e),
        }
    }

    Ok(())
}
