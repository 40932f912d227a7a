use crate::models::ProviderId;
use serde::Deserialize;
use std::time::Duration;

/// Plan tier of the customer running the enrichment. Sizes the provider
/// budget, the stop threshold and cross-target concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Starter,
    Growth,
    Scale,
}

impl PlanTier {
    /// Maximum paid provider calls per lead.
    pub fn max_provider_calls(&self) -> u32 {
        match self {
            PlanTier::Starter => 2,
            PlanTier::Growth => 4,
            PlanTier::Scale => 6,
        }
    }

    /// Confidence at which the waterfall stops early.
    pub fn stop_threshold(&self) -> u8 {
        match self {
            PlanTier::Starter => 60,
            PlanTier::Growth => 70,
            PlanTier::Scale => 80,
        }
    }

    /// Concurrent targets enriched at once.
    pub fn worker_concurrency(&self) -> usize {
        match self {
            PlanTier::Starter => 2,
            PlanTier::Growth => 8,
            PlanTier::Scale => 16,
        }
    }
}

/// Credentials and endpoint for one provider, in waterfall order.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub id: ProviderId,
    /// Base URL; overridable so tests can point at a mock server.
    pub base_url: String,
    pub api_key: String,
    /// Source confidence attached to this provider's answers, 0-100.
    /// Encodes the trust tier: order in the list encodes cost, this
    /// encodes accuracy.
    pub trust: u8,
}

impl ProviderConfig {
    /// Default endpoint and trust tier for a provider.
    pub fn with_defaults(id: ProviderId, api_key: String) -> Self {
        let (base_url, trust) = match id {
            ProviderId::Apollo => ("https://api.apollo.io/v1", 70),
            ProviderId::Hunter => ("https://api.hunter.io/v2", 65),
            ProviderId::Clearbit => ("https://company.clearbit.com/v2", 60),
            ProviderId::PeopleDataLabs => ("https://api.peopledatalabs.com/v5", 60),
            ProviderId::Scrape => ("", 20),
        };
        Self {
            id,
            base_url: base_url.to_string(),
            api_key,
            trust,
        }
    }
}

/// Explicit configuration for the waterfall. No ambient global state: the
/// ordered provider list and credentials are passed in here.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Providers in call order (cost-ascending, accuracy-descending).
    pub providers: Vec<ProviderConfig>,
    pub plan_tier: PlanTier,
    /// Confidence at which the waterfall stops; defaults from the tier.
    pub stop_threshold: u8,
    /// Per-lead cap on paid provider calls; defaults from the tier.
    pub max_provider_calls: u32,
    /// Per-provider-call timeout in seconds. A timeout is a transport
    /// failure, never an indefinite block.
    pub call_timeout_secs: u64,
    /// Backoff before the single retry of a transport/rate-limit failure,
    /// in milliseconds.
    pub retry_backoff_ms: u64,
    /// Expiry on per-domain in-flight locks so a crashed worker cannot
    /// wedge a domain, in seconds.
    pub domain_lock_ttl_secs: u64,
    /// TTL of the enrichment outcome cache, in seconds.
    pub cache_ttl_secs: u64,
}

impl Config {
    /// Builds a config for a tier with the given ordered providers.
    pub fn for_tier(plan_tier: PlanTier, providers: Vec<ProviderConfig>) -> Self {
        Self {
            providers,
            plan_tier,
            stop_threshold: plan_tier.stop_threshold(),
            max_provider_calls: plan_tier.max_provider_calls(),
            call_timeout_secs: 10,
            retry_backoff_ms: 250,
            domain_lock_ttl_secs: 120,
            cache_ttl_secs: 3600,
        }
    }

    /// Loads configuration from the environment.
    ///
    /// `PROVIDER_ORDER` is a comma-separated list (e.g.
    /// `apollo,hunter,clearbit`); each named provider needs its
    /// `<NAME>_API_KEY`. Validation failures surface before any provider
    /// call is made.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let tier = match std::env::var("PLAN_TIER")
            .unwrap_or_else(|_| "starter".to_string())
            .to_lowercase()
            .as_str()
        {
            "starter" => PlanTier::Starter,
            "growth" => PlanTier::Growth,
            "scale" => PlanTier::Scale,
            other => anyhow::bail!("PLAN_TIER must be starter/growth/scale, got {:?}", other),
        };

        let order = std::env::var("PROVIDER_ORDER")
            .map_err(|_| anyhow::anyhow!("PROVIDER_ORDER environment variable required"))?;

        let mut providers = Vec::new();
        for name in order.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let id = match name.to_lowercase().as_str() {
                "apollo" => ProviderId::Apollo,
                "hunter" => ProviderId::Hunter,
                "clearbit" => ProviderId::Clearbit,
                "pdl" | "peopledatalabs" => ProviderId::PeopleDataLabs,
                "scrape" => ProviderId::Scrape,
                other => anyhow::bail!("unknown provider in PROVIDER_ORDER: {:?}", other),
            };

            let key = if id == ProviderId::Scrape {
                String::new()
            } else {
                let var = format!("{}_API_KEY", name.to_uppercase());
                std::env::var(&var)
                    .map_err(|_| anyhow::anyhow!("{} environment variable required", var))
                    .and_then(|k| {
                        if k.trim().is_empty() {
                            anyhow::bail!("{} cannot be empty", var);
                        }
                        Ok(k)
                    })?
            };

            let mut provider = ProviderConfig::with_defaults(id, key);
            // Optional endpoint override, mostly for staging.
            if let Ok(url) = std::env::var(format!("{}_BASE_URL", name.to_uppercase())) {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("{}_BASE_URL must start with http:// or https://", name);
                }
                provider.base_url = url;
            }
            providers.push(provider);
        }

        let mut config = Self::for_tier(tier, providers);

        if let Ok(t) = std::env::var("CALL_TIMEOUT_SECS") {
            config.call_timeout_secs = t
                .parse()
                .map_err(|_| anyhow::anyhow!("CALL_TIMEOUT_SECS must be a number"))?;
        }
        if let Ok(t) = std::env::var("STOP_THRESHOLD") {
            let v: u32 = t
                .parse()
                .map_err(|_| anyhow::anyhow!("STOP_THRESHOLD must be a number"))?;
            if v > 100 {
                anyhow::bail!("STOP_THRESHOLD must be between 0 and 100");
            }
            config.stop_threshold = v as u8;
        }

        config.validate()?;
        tracing::info!(
            "Configuration loaded: {} providers, tier {:?}, threshold {}",
            config.providers.len(),
            config.plan_tier,
            config.stop_threshold
        );
        Ok(config)
    }

    /// Rejects configurations the waterfall cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be enabled");
        }
        if self.stop_threshold > 100 {
            anyhow::bail!("stop_threshold must be between 0 and 100");
        }
        if self.call_timeout_secs == 0 {
            anyhow::bail!("call_timeout_secs must be positive");
        }
        Ok(())
    }

    /// Per-call timeout as a `Duration`.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Retry backoff as a `Duration`.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_defaults() {
        let c = Config::for_tier(
            PlanTier::Starter,
            vec![ProviderConfig::with_defaults(
                ProviderId::Apollo,
                "k".into(),
            )],
        );
        assert_eq!(c.stop_threshold, 60);
        assert_eq!(c.max_provider_calls, 2);
        assert_eq!(c.call_timeout_secs, 10);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn empty_provider_list_is_rejected() {
        let c = Config::for_tier(PlanTier::Growth, vec![]);
        assert!(c.validate().is_err());
    }
}
