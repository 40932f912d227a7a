//! Provider adapters.
//!
//! One adapter per external data source, each normalizing its vendor's raw
//! response into the fixed [`ProviderContact`]/[`ProviderCompany`] shapes so
//! the merge/scoring core never sees vendor-specific payloads. Adapters are
//! a tagged union of concrete services rather than trait objects; the
//! waterfall dispatches on the variant.

pub mod apollo;
pub mod clearbit;
pub mod hunter;
pub mod pdl;
pub mod scrape;

pub use apollo::ApolloService;
pub use clearbit::ClearbitService;
pub use hunter::HunterService;
pub use pdl::PdlService;
pub use scrape::ScrapeSource;

use crate::config::ProviderConfig;
use crate::errors::AppError;
use crate::models::{Capability, ProviderContact, ProviderId, ProviderResponse, Target};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default title-priority list used for best-candidate selection when the
/// caller does not supply one: decision-makers first.
pub const DEFAULT_TITLE_PRIORITY: &[&str] = &[
    "owner",
    "founder",
    "chief",
    "ceo",
    "president",
    "vp",
    "vice president",
    "director",
    "head",
    "manager",
];

/// Picks the best person out of a multi-result provider response.
///
/// Ranking: earliest match in the title priority list wins; on a tie the
/// candidate with more populated contact fields wins (email+phone beats
/// email-only beats neither). Deterministic for a fixed input order.
pub fn select_best_candidate<'a>(
    candidates: &'a [ProviderContact],
    title_priority: &[&str],
) -> Option<&'a ProviderContact> {
    candidates.iter().min_by_key(|c| {
        let title_rank = c
            .job_title
            .as_deref()
            .map(|t| {
                let lower = t.to_lowercase();
                title_priority
                    .iter()
                    .position(|p| lower.contains(p))
                    .unwrap_or(title_priority.len())
            })
            .unwrap_or(title_priority.len() + 1);
        let reachability = match (c.email.is_some(), c.phone.is_some() || c.mobile_phone.is_some())
        {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };
        (title_rank, reachability, usize::MAX - c.populated_fields())
    })
}

/// A fixed-response source, used by dry runs and test harnesses in place
/// of a live vendor. Counts its calls.
#[derive(Debug)]
pub struct StaticSource {
    id: ProviderId,
    responses: Vec<Result<ProviderResponse, (crate::errors::ProviderErrorKind, String)>>,
    calls: AtomicUsize,
}

impl StaticSource {
    /// A source that answers every call with the same response.
    pub fn always(id: ProviderId, response: ProviderResponse) -> Self {
        Self {
            id,
            responses: vec![Ok(response)],
            calls: AtomicUsize::new(0),
        }
    }

    /// A source that walks a scripted sequence of answers, repeating the
    /// last one once the script is exhausted.
    pub fn scripted(
        id: ProviderId,
        responses: Vec<Result<ProviderResponse, (crate::errors::ProviderErrorKind, String)>>,
    ) -> Self {
        Self {
            id,
            responses,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times this source has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self) -> Result<ProviderResponse, AppError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.responses.is_empty() {
            return Ok(ProviderResponse::Contact(ProviderContact::default()));
        }
        let idx = n.min(self.responses.len() - 1);
        match &self.responses[idx] {
            Ok(r) => Ok(r.clone()),
            Err((kind, detail)) => Err(AppError::provider(self.id.as_str(), *kind, detail.clone())),
        }
    }
}

/// One enabled provider: a concrete vendor client plus its trust tier.
pub enum ProviderClient {
    Apollo(ApolloService),
    Hunter(HunterService),
    Clearbit(ClearbitService),
    PeopleDataLabs(PdlService),
    /// Scraped page text participating as a zero-cost source.
    Scrape(ScrapeSource),
    /// Canned responses for dry runs and tests.
    Static(Arc<StaticSource>),
}

impl ProviderClient {
    /// Builds the vendor client for a configured provider.
    ///
    /// `Scrape` cannot be built from config alone (it needs page text) and
    /// is rejected here; the waterfall constructs it per request.
    pub fn from_config(cfg: &ProviderConfig, timeout: Duration) -> Result<Self, AppError> {
        let client = match cfg.id {
            ProviderId::Apollo => {
                ProviderClient::Apollo(ApolloService::new(&cfg.base_url, &cfg.api_key, timeout)?)
            }
            ProviderId::Hunter => {
                ProviderClient::Hunter(HunterService::new(&cfg.base_url, &cfg.api_key, timeout)?)
            }
            ProviderId::Clearbit => ProviderClient::Clearbit(ClearbitService::new(
                &cfg.base_url,
                &cfg.api_key,
                timeout,
            )?),
            ProviderId::PeopleDataLabs => ProviderClient::PeopleDataLabs(PdlService::new(
                &cfg.base_url,
                &cfg.api_key,
                timeout,
            )?),
            ProviderId::Scrape => {
                return Err(AppError::InvalidConfig(
                    "scrape is not a configurable provider; pass page text on the request"
                        .to_string(),
                ))
            }
        };
        Ok(client)
    }

    /// Provider id for logs, billing and audit rows.
    pub fn id(&self) -> ProviderId {
        match self {
            ProviderClient::Apollo(_) => ProviderId::Apollo,
            ProviderClient::Hunter(_) => ProviderId::Hunter,
            ProviderClient::Clearbit(_) => ProviderId::Clearbit,
            ProviderClient::PeopleDataLabs(_) => ProviderId::PeopleDataLabs,
            ProviderClient::Scrape(_) => ProviderId::Scrape,
            ProviderClient::Static(s) => s.id,
        }
    }

    /// The capability this provider is asked for in the waterfall.
    pub fn default_capability(&self) -> Capability {
        match self.id() {
            ProviderId::Apollo => Capability::Person,
            ProviderId::Hunter => Capability::Email,
            ProviderId::Clearbit => Capability::Company,
            ProviderId::PeopleDataLabs => Capability::Person,
            ProviderId::Scrape => Capability::Person,
        }
    }

    /// Runs the vendor call. "No data found" is a successful empty
    /// response, never an error; failures carry a
    /// [`crate::errors::ProviderErrorKind`].
    pub async fn enrich(
        &self,
        target: &Target,
        capability: Capability,
    ) -> Result<ProviderResponse, AppError> {
        match self {
            ProviderClient::Apollo(s) => s.enrich(target, capability).await,
            ProviderClient::Hunter(s) => s.enrich(target, capability).await,
            ProviderClient::Clearbit(s) => s.enrich(target, capability).await,
            ProviderClient::PeopleDataLabs(s) => s.enrich(target, capability).await,
            ProviderClient::Scrape(s) => Ok(s.extract(target, capability)),
            ProviderClient::Static(s) => s.answer(),
        }
    }
}

/// Shared reqwest client construction for vendor services.
pub(crate) fn build_http_client(
    provider: &str,
    timeout: Duration,
) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            AppError::InvalidConfig(format!("failed to create {} client: {}", provider, e))
        })
}
