use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::Config;
use std::time::Duration;

/// Concrete breaker type so one can be stored per provider.
pub type ProviderBreaker = failsafe::StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates a circuit breaker for one provider's calls.
///
/// A vendor that fails 5 times in a row is skipped (fail fast) until the
/// exponential backoff window (10s to 60s) lets a probe call through, so a
/// misconfigured or degraded provider does not burn a retry on every lead.
pub fn create_provider_circuit_breaker() -> ProviderBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::{CircuitBreaker, Error};

    #[test]
    fn breaker_opens_after_consecutive_failures() {
        let cb = create_provider_circuit_breaker();

        for _ in 0..5 {
            let result: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("provider down"));
            assert!(result.is_err());
        }

        let result: Result<(), Error<&str>> = cb.call(|| Ok::<(), &str>(()));
        match result {
            Err(Error::Rejected) => {}
            _ => panic!("expected open circuit to reject the call"),
        }
        assert!(!cb.is_call_permitted());
    }

    #[test]
    fn breaker_allows_success() {
        let cb = create_provider_circuit_breaker();
        let result: Result<i32, Error<&str>> = cb.call(|| Ok::<i32, &str>(42));
        assert_eq!(result.unwrap(), 42);
    }
}
