//! Waterfall orchestrator.
//!
//! Calls providers strictly in order for one target, merging each answer
//! and recomputing confidence, and stops as soon as the data is good
//! enough or the budget is gone. Provider failures are absorbed here and
//! never reach the caller; the only errors that propagate are
//! configuration problems found before any call.

use crate::billing::{spend_key, CreditGate};
use crate::circuit_breaker::{create_provider_circuit_breaker, ProviderBreaker};
use crate::config::Config;
use crate::errors::{AppError, ProviderErrorKind};
use crate::locks::DomainLocks;
use crate::merge;
use crate::models::{
    Capability, EnrichedLead, FieldKey, ProviderCallRecord, ProviderId, ProviderResponse, Target,
};
use crate::providers::{ProviderClient, ScrapeSource};
use chrono::Utc;
use failsafe::CircuitBreaker;
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Trust tier attached to scraped page facts when the provider list does
/// not configure one.
const DEFAULT_SCRAPE_TRUST: u8 = 20;

/// States of one enrichment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterfallState {
    /// Not started.
    Pending,
    /// Calling the provider at this index.
    Calling(usize),
    /// Stop threshold reached or all requested fields filled.
    Satisfied,
    /// Provider list or budget exhausted; the lead is returned as-is.
    Exhausted,
    /// Cancelled cooperatively between provider calls.
    Cancelled,
    /// Terminal bookkeeping state.
    Done,
}

impl WaterfallState {
    /// Whether the waterfall has finished in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Satisfied | Self::Exhausted | Self::Cancelled | Self::Done
        )
    }
}

/// Cooperative cancellation flag, checked between provider calls and
/// never mid-call.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; the waterfall stops before its next call.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-lead cap on paid provider calls. Atomic so concurrent attempts on
/// the same lead cannot overshoot the cap.
#[derive(Debug)]
pub struct CallBudget {
    remaining: AtomicU32,
}

impl CallBudget {
    pub fn new(max_calls: u32) -> Self {
        Self {
            remaining: AtomicU32::new(max_calls),
        }
    }

    /// Takes one call from the budget; false when it is spent.
    pub fn try_consume(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// One enrichment request: the target plus whatever the scrape subsystem
/// already produced for it.
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    pub target: Target,
    /// Fields the caller needs. When non-empty, the waterfall also stops
    /// once every one of them is populated.
    pub requested_fields: Vec<FieldKey>,
    /// Raw page text from the scrape subsystem; participates in the merge
    /// as a zero-cost lowest-trust source.
    pub page_text: Option<String>,
    pub lead_type: Option<String>,
}

impl EnrichmentRequest {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            requested_fields: Vec::new(),
            page_text: None,
            lead_type: None,
        }
    }
}

/// Result of one waterfall run: the merged lead, the terminal state, and
/// the full call log.
#[derive(Debug, Clone)]
pub struct WaterfallOutcome {
    pub lead: EnrichedLead,
    pub state: WaterfallState,
    /// Every provider call made, success or failure, in order.
    pub calls: Vec<ProviderCallRecord>,
}

/// The orchestrator. Holds the ordered provider clients, the credit gate,
/// per-domain locks and the outcome cache; shared across workers.
pub struct Waterfall<G: CreditGate> {
    config: Config,
    providers: Vec<(ProviderClient, u8)>,
    gate: G,
    locks: DomainLocks,
    breakers: HashMap<ProviderId, ProviderBreaker>,
    cache: Cache<String, Arc<WaterfallOutcome>>,
    scrape_trust: u8,
}

impl<G: CreditGate> Waterfall<G> {
    /// Builds the orchestrator from configuration, constructing one vendor
    /// client per configured provider. Fails fast on an empty provider
    /// list or unusable credentials.
    pub fn new(config: Config, gate: G) -> Result<Self, AppError> {
        config
            .validate()
            .map_err(|e| AppError::InvalidConfig(e.to_string()))?;

        let mut providers = Vec::new();
        let mut scrape_trust = DEFAULT_SCRAPE_TRUST;
        for p in &config.providers {
            if p.id == ProviderId::Scrape {
                // Scrape is built per request from page text; only its
                // trust tier comes from config.
                scrape_trust = p.trust;
                continue;
            }
            providers.push((
                ProviderClient::from_config(p, config.call_timeout())?,
                p.trust,
            ));
        }

        Self::assemble(config, gate, providers, scrape_trust)
    }

    /// Builds the orchestrator around pre-built provider clients (each
    /// paired with its trust tier). Used by glue that wires static or
    /// already-configured sources.
    pub fn with_providers(
        config: Config,
        gate: G,
        providers: Vec<(ProviderClient, u8)>,
    ) -> Result<Self, AppError> {
        Self::assemble(config, gate, providers, DEFAULT_SCRAPE_TRUST)
    }

    fn assemble(
        config: Config,
        gate: G,
        providers: Vec<(ProviderClient, u8)>,
        scrape_trust: u8,
    ) -> Result<Self, AppError> {
        if providers.is_empty() {
            return Err(AppError::InvalidConfig(
                "no providers enabled for the waterfall".to_string(),
            ));
        }

        let breakers = providers
            .iter()
            .map(|(c, _)| (c.id(), create_provider_circuit_breaker()))
            .collect();

        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        let locks = DomainLocks::new(Duration::from_secs(config.domain_lock_ttl_secs));

        Ok(Self {
            config,
            providers,
            gate,
            locks,
            breakers,
            cache,
            scrape_trust,
        })
    }

    /// Providers in call order; exposed for glue that wants to log the
    /// active chain.
    pub fn provider_order(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|(c, _)| c.id()).collect()
    }

    /// Runs the waterfall for one target.
    ///
    /// Never fails on provider errors: the returned outcome carries the
    /// best lead the chain could assemble plus the full call log. A cached
    /// outcome for the same domain is returned without spending credits.
    pub async fn enrich(
        &self,
        request: EnrichmentRequest,
        cancel: &CancelFlag,
    ) -> Result<WaterfallOutcome, AppError> {
        let domain = request.target.domain.clone();

        if let Some(cached) = self.cache.get(&domain).await {
            tracing::info!("Waterfall: cache hit for {}", domain);
            return Ok((*cached).clone());
        }

        // One in-flight enrichment per domain. The lock expires, so a
        // crashed worker cannot wedge the domain.
        let _guard = loop {
            if cancel.is_cancelled() {
                let mut lead = EnrichedLead::new(&request.target);
                lead.lead_type = request.lead_type.clone();
                return Ok(WaterfallOutcome {
                    lead,
                    state: WaterfallState::Cancelled,
                    calls: Vec::new(),
                });
            }
            match self.locks.try_acquire(&domain) {
                Some(guard) => break guard,
                None => tokio::time::sleep(Duration::from_millis(25)).await,
            }
        };

        // The previous lock holder may have enriched this domain and
        // cached the outcome while we waited.
        if let Some(cached) = self.cache.get(&domain).await {
            tracing::info!("Waterfall: cache hit for {} after lock wait", domain);
            return Ok((*cached).clone());
        }

        let outcome = self.run_waterfall(&request, cancel).await;

        if outcome.state != WaterfallState::Cancelled {
            self.cache
                .insert(domain, Arc::new(outcome.clone()))
                .await;
        }
        Ok(outcome)
    }

    async fn run_waterfall(
        &self,
        request: &EnrichmentRequest,
        cancel: &CancelFlag,
    ) -> WaterfallOutcome {
        let target = &request.target;
        let mut lead = EnrichedLead::new(target);
        lead.lead_type = request.lead_type.clone();
        let mut calls: Vec<ProviderCallRecord> = Vec::new();

        tracing::info!(
            "Waterfall: starting for {} ({} providers, threshold {})",
            target.domain,
            self.providers.len(),
            self.config.stop_threshold
        );

        // Scraped page facts are merged first, at the lowest trust tier,
        // before any paid call.
        if let Some(ref text) = request.page_text {
            self.merge_scraped(&mut lead, target, text, &mut calls);
        }

        let budget = CallBudget::new(self.config.max_provider_calls);
        let mut state = WaterfallState::Pending;

        for (index, (client, trust)) in self.providers.iter().enumerate() {
            let provider = client.id();

            if cancel.is_cancelled() {
                tracing::info!("Waterfall: cancelled for {} before {}", target.domain, provider);
                state = WaterfallState::Cancelled;
                break;
            }
            if self.is_satisfied(&lead, &request.requested_fields) {
                state = WaterfallState::Satisfied;
                break;
            }

            // An open circuit means no call, so no budget or credit may
            // be taken for this provider.
            if let Some(breaker) = self.breakers.get(&provider) {
                if !breaker.is_call_permitted() {
                    tracing::warn!("Waterfall: circuit open for {}, skipping", provider);
                    continue;
                }
            }

            state = WaterfallState::Calling(index);

            if provider.is_paid() {
                if !budget.try_consume() {
                    tracing::info!(
                        "Waterfall: call budget reached for {} before {}",
                        target.domain,
                        provider
                    );
                    state = WaterfallState::Exhausted;
                    break;
                }
                let action = format!("enrich:{}", provider);
                let key = spend_key(lead.id, provider.as_str(), index as u32);
                if !self.gate.can_afford(&action, 1) || !self.gate.spend(&action, 1, &key) {
                    tracing::warn!(
                        "Waterfall: credit gate stopped the chain for {} at {}",
                        target.domain,
                        provider
                    );
                    state = WaterfallState::Exhausted;
                    break;
                }
            }

            let capability = client.default_capability();
            let started = Instant::now();
            let result = self
                .call_with_retry(client, target, capability, lead.id, &mut calls)
                .await;
            let duration_ms = started.elapsed().as_millis() as u64;

            if let Some(breaker) = self.breakers.get(&provider) {
                let ok = result.is_ok();
                let _ = breaker.call(|| if ok { Ok(()) } else { Err(()) });
            }

            match result {
                Ok(response) => {
                    lead.note_provider_used(provider);
                    let adopted = merge::merge(&mut lead, &response, *trust);
                    tracing::info!(
                        "Waterfall: {} contributed {} field(s) to {} (score {})",
                        provider,
                        adopted.len(),
                        target.domain,
                        lead.confidence_score
                    );
                    calls.push(ProviderCallRecord {
                        lead_id: lead.id,
                        provider,
                        capability,
                        success: true,
                        fields_obtained: adopted,
                        error_kind: None,
                        duration_ms,
                        called_at: Utc::now(),
                    });
                }
                Err(err) => {
                    let kind = err.provider_kind();
                    tracing::warn!(
                        "Waterfall: {} failed for {}: {}",
                        provider,
                        target.domain,
                        err
                    );
                    calls.push(ProviderCallRecord {
                        lead_id: lead.id,
                        provider,
                        capability,
                        success: false,
                        fields_obtained: Vec::new(),
                        error_kind: kind.map(|k| k.to_string()),
                        duration_ms,
                        called_at: Utc::now(),
                    });
                    // Absorbed: the next provider gets its turn.
                }
            }
        }

        let terminal = if state.is_terminal() {
            state
        } else if self.is_satisfied(&lead, &request.requested_fields) {
            WaterfallState::Satisfied
        } else {
            WaterfallState::Exhausted
        };

        tracing::info!(
            "Waterfall: finished {} with state {:?}, score {}, qc {:?}",
            target.domain,
            terminal,
            lead.confidence_score,
            lead.qc_flag
        );

        WaterfallOutcome {
            lead,
            state: terminal,
            calls,
        }
    }

    fn merge_scraped(
        &self,
        lead: &mut EnrichedLead,
        target: &Target,
        text: &str,
        calls: &mut Vec<ProviderCallRecord>,
    ) {
        let scrape = ScrapeSource::new(text.to_string());
        lead.note_provider_used(ProviderId::Scrape);
        for capability in [Capability::Person, Capability::Company] {
            let started = Instant::now();
            let response = scrape.extract(target, capability);
            let adopted = merge::merge(lead, &response, self.scrape_trust);
            calls.push(ProviderCallRecord {
                lead_id: lead.id,
                provider: ProviderId::Scrape,
                capability,
                success: true,
                fields_obtained: adopted,
                error_kind: None,
                duration_ms: started.elapsed().as_millis() as u64,
                called_at: Utc::now(),
            });
        }
    }

    /// Calls one provider with the per-call timeout; a transport or
    /// rate-limit failure gets exactly one retry after a short backoff.
    /// The failed first attempt gets its own audit row, since the vendor
    /// may have billed it.
    async fn call_with_retry(
        &self,
        client: &ProviderClient,
        target: &Target,
        capability: Capability,
        lead_id: uuid::Uuid,
        calls: &mut Vec<ProviderCallRecord>,
    ) -> Result<ProviderResponse, AppError> {
        let started = Instant::now();
        match self.call_once(client, target, capability).await {
            Err(err) if err.provider_kind().is_some_and(|k| k.is_retryable()) => {
                tracing::warn!(
                    "Waterfall: retrying {} after transient failure: {}",
                    client.id(),
                    err
                );
                calls.push(ProviderCallRecord {
                    lead_id,
                    provider: client.id(),
                    capability,
                    success: false,
                    fields_obtained: Vec::new(),
                    error_kind: err.provider_kind().map(|k| k.to_string()),
                    duration_ms: started.elapsed().as_millis() as u64,
                    called_at: Utc::now(),
                });
                tokio::time::sleep(self.config.retry_backoff()).await;
                self.call_once(client, target, capability).await
            }
            other => other,
        }
    }

    async fn call_once(
        &self,
        client: &ProviderClient,
        target: &Target,
        capability: Capability,
    ) -> Result<ProviderResponse, AppError> {
        match tokio::time::timeout(self.config.call_timeout(), client.enrich(target, capability))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::provider(
                client.id().as_str(),
                ProviderErrorKind::Transport,
                format!("call timed out after {}s", self.config.call_timeout_secs),
            )),
        }
    }

    fn is_satisfied(&self, lead: &EnrichedLead, requested: &[FieldKey]) -> bool {
        if lead.confidence_score >= self.config.stop_threshold {
            return true;
        }
        !requested.is_empty() && requested.iter().all(|k| field_present(lead, *k))
    }
}

impl<G: CreditGate + 'static> Waterfall<G> {
    /// Enriches many targets concurrently, bounded by the plan tier's
    /// worker pool. Per-target waterfalls stay strictly sequential; the
    /// domain locks keep two workers off the same domain.
    pub async fn enrich_batch(
        self: Arc<Self>,
        requests: Vec<EnrichmentRequest>,
        cancel: &CancelFlag,
    ) -> Vec<Result<WaterfallOutcome, AppError>> {
        let semaphore = Arc::new(Semaphore::new(self.config.plan_tier.worker_concurrency()));
        let mut handles = Vec::with_capacity(requests.len());

        for request in requests {
            let this = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| AppError::InternalError("worker pool closed".to_string()))?;
                this.enrich(request, &cancel).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap_or_else(|e| {
                Err(AppError::InternalError(format!("worker panicked: {}", e)))
            }));
        }
        results
    }
}

/// Whether a requested field is populated on the lead.
fn field_present(lead: &EnrichedLead, key: FieldKey) -> bool {
    let c = &lead.contact;
    let co = &lead.company;
    match key {
        FieldKey::FullName => c.full_name.is_some(),
        FieldKey::Email => c.email.is_some(),
        FieldKey::Phone => c.phone.is_some(),
        FieldKey::MobilePhone => c.mobile_phone.is_some(),
        FieldKey::DirectPhone => c.direct_phone.is_some(),
        FieldKey::JobTitle => c.job_title.is_some(),
        FieldKey::Seniority => c.seniority.is_some(),
        FieldKey::Department => c.department.is_some(),
        FieldKey::ContactLinkedin => c.linkedin_url.is_some(),
        FieldKey::CompanyName => co.name.is_some(),
        FieldKey::Website => co.website.is_some(),
        FieldKey::Industry => co.industry.is_some(),
        FieldKey::EmployeeCount => co.employee_count.is_some(),
        FieldKey::EmployeeRange => co.employee_range.is_some(),
        FieldKey::AnnualRevenue => co.annual_revenue.is_some(),
        FieldKey::RevenueRange => co.revenue_range.is_some(),
        FieldKey::FundingTotal => co.funding_total.is_some(),
        FieldKey::FundingStage => co.funding_stage.is_some(),
        FieldKey::FoundedYear => co.founded_year.is_some(),
        FieldKey::Technologies => !co.technologies.is_empty(),
        FieldKey::HqCity => co.hq_city.is_some(),
        FieldKey::HqState => co.hq_state.is_some(),
        FieldKey::HqCountry => co.hq_country.is_some(),
        FieldKey::Description => co.description.is_some(),
        FieldKey::CompanyLinkedin => co.linkedin_url.is_some(),
    }
}
