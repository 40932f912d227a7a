//! Contact Enrichment Waterfall Library
//!
//! This library implements a contact enrichment waterfall for lead
//! generation: external data providers are called in a fixed order, each
//! partial answer is merged into one lead record with per-field
//! provenance, confidence is rescored after every merge, and the chain
//! stops as soon as the data is good enough or the budget runs out.
//! Finished leads are routed through priority rules.
//!
//! # Modules
//!
//! - `billing`: Credit gate and idempotent spend keys.
//! - `circuit_breaker`: Circuit breaker for flaky providers.
//! - `config`: Configuration and plan tiers.
//! - `errors`: Error handling types.
//! - `locks`: Per-domain enrichment locks.
//! - `merge`: Confidence-aware field merging and deduplication.
//! - `models`: Core data models.
//! - `normalize`: Domain, email and phone normalization.
//! - `providers`: External provider clients (Apollo, Hunter, Clearbit, PDL).
//! - `routing`: Priority rule matching for finished leads.
//! - `scoring`: Lead confidence scoring.
//! - `storage`: Database storage operations.
//! - `waterfall`: The waterfall orchestrator.
//! - `webhook`: Outbound routing notifications.

pub mod billing;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod locks;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod routing;
pub mod scoring;
pub mod storage;
pub mod waterfall;
pub mod webhook;
