use std::fmt;

/// Failure classes for a single provider call.
///
/// Only `Transport` and `RateLimited` are retried (once); every other kind
/// advances the waterfall to the next provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Missing or rejected credentials for the provider.
    Auth,
    /// Provider throttled the call.
    RateLimited,
    /// Provider states the entity does not exist (vendor 404-style answer).
    NotFound,
    /// Network failure, connect error, or per-call timeout.
    Transport,
    /// Response arrived but could not be decoded into the expected shape.
    InvalidResponse,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorKind::Auth => "auth",
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::NotFound => "not_found",
            ProviderErrorKind::Transport => "transport",
            ProviderErrorKind::InvalidResponse => "invalid_response",
        };
        f.write_str(s)
    }
}

impl ProviderErrorKind {
    /// Whether the waterfall retries the same provider once before moving on.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::Transport | ProviderErrorKind::RateLimited
        )
    }
}

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// A provider call failed; carries the provider id and failure class.
    Provider {
        /// Id of the provider that failed.
        provider: String,
        /// Failure class, drives retry/skip policy.
        kind: ProviderErrorKind,
        /// Human-readable detail.
        detail: String,
    },
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Invalid input discovered before any provider call (bad target, empty
    /// provider list). The only class that propagates out of the waterfall.
    InvalidConfig(String),
    /// Internal error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Shorthand for a provider failure.
    pub fn provider(
        provider: impl Into<String>,
        kind: ProviderErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        AppError::Provider {
            provider: provider.into(),
            kind,
            detail: detail.into(),
        }
    }

    /// The provider failure class, if this is (or wraps) a provider error.
    pub fn provider_kind(&self) -> Option<ProviderErrorKind> {
        match self {
            AppError::Provider { kind, .. } => Some(*kind),
            AppError::WithContext { source, .. } => source.provider_kind(),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Provider {
                provider,
                kind,
                detail,
            } => write!(f, "Provider {} failed ({}): {}", provider, kind, detail),
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    /// Converts a `sqlx::Error` into an `AppError`.
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

/// Maps a reqwest failure for a given provider into a classified error.
///
/// Timeouts and connect failures become `Transport`; body-decode failures
/// become `InvalidResponse`.
pub fn classify_reqwest(provider: &str, err: reqwest::Error) -> AppError {
    let kind = if err.is_decode() {
        ProviderErrorKind::InvalidResponse
    } else {
        ProviderErrorKind::Transport
    };
    AppError::provider(provider, kind, err.to_string())
}

/// Maps a non-success HTTP status from a provider into a classified error.
pub fn classify_status(provider: &str, status: reqwest::StatusCode, body: &str) -> AppError {
    let kind = match status.as_u16() {
        401 | 403 => ProviderErrorKind::Auth,
        404 | 422 => ProviderErrorKind::NotFound,
        429 => ProviderErrorKind::RateLimited,
        _ => ProviderErrorKind::Transport,
    };
    AppError::provider(provider, kind, format!("status {}: {}", status, body))
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_survives_context_wrapping() {
        let err: Result<(), AppError> = Err(AppError::provider(
            "apollo",
            ProviderErrorKind::RateLimited,
            "429",
        ));
        let wrapped = err.context("during person lookup").unwrap_err();
        assert_eq!(
            wrapped.provider_kind(),
            Some(ProviderErrorKind::RateLimited)
        );
    }

    #[test]
    fn only_transport_and_rate_limit_are_retryable() {
        assert!(ProviderErrorKind::Transport.is_retryable());
        assert!(ProviderErrorKind::RateLimited.is_retryable());
        assert!(!ProviderErrorKind::Auth.is_retryable());
        assert!(!ProviderErrorKind::NotFound.is_retryable());
        assert!(!ProviderErrorKind::InvalidResponse.is_retryable());
    }

    #[test]
    fn status_classification() {
        let s = |code: u16| reqwest::StatusCode::from_u16(code).unwrap();
        assert_eq!(
            classify_status("x", s(401), "").provider_kind(),
            Some(ProviderErrorKind::Auth)
        );
        assert_eq!(
            classify_status("x", s(429), "").provider_kind(),
            Some(ProviderErrorKind::RateLimited)
        );
        assert_eq!(
            classify_status("x", s(404), "").provider_kind(),
            Some(ProviderErrorKind::NotFound)
        );
        assert_eq!(
            classify_status("x", s(502), "").provider_kind(),
            Some(ProviderErrorKind::Transport)
        );
    }
}
