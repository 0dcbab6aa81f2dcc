//! Multi-endpoint failover with per-provider health tracking.
//!
//! Providers move along a four-state ladder as attempts fail:
//!
//! ```text
//! healthy → degraded → unhealthy → blacklisted (cooldown) → unhealthy
//! ```
//!
//! Selection is biased `healthy > degraded > unhealthy`, rotating among
//! equally-ranked providers; blacklisted providers are skipped until their
//! cooldown elapses. Health updates may race under concurrent use — the only
//! guarantee is that a blacklisted provider is not handed out before its
//! cooldown is over.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::client::NetworkClient;
use crate::error::ClientError;
use crate::policy::{RetryConfig, RetryPolicy};

/// Boxed future returned by a failover operation.
pub type OpFuture<T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send>>;

/// Provider health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Responding normally.
    Healthy,
    /// Responding but with recent failures.
    Degraded,
    /// Repeated failures; used only when nothing better is available.
    Unhealthy,
    /// Temporarily excluded from selection.
    Blacklisted,
}

impl ProviderState {
    fn rank(self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Degraded => 1,
            Self::Unhealthy => 2,
            Self::Blacklisted => 3,
        }
    }

    fn penalized(self) -> Self {
        match self {
            Self::Healthy => Self::Degraded,
            Self::Degraded => Self::Unhealthy,
            Self::Unhealthy | Self::Blacklisted => Self::Blacklisted,
        }
    }
}

impl std::fmt::Display for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Blacklisted => write!(f, "blacklisted"),
        }
    }
}

/// Configuration for the failover coordinator.
#[derive(Debug, Clone)]
pub struct FailoverConfig {
    /// Maximum number of retry attempts (not counting the first try).
    pub max_retries: u32,
    /// Base delay between attempts (doubles per attempt).
    pub retry_delay: Duration,
    /// Cap on the inter-attempt delay.
    pub max_retry_delay: Duration,
    /// How long a blacklisted provider sits out before being reinstated
    /// as unhealthy.
    pub blacklist_cooldown: Duration,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(200),
            max_retry_delay: Duration::from_secs(5),
            blacklist_cooldown: Duration::from_secs(30),
        }
    }
}

/// Errors surfaced by [`Failover::execute_with_retry`].
#[derive(Debug, Error)]
pub enum FailoverError {
    #[error("no providers configured")]
    NoProviders,

    #[error("all providers are blacklisted")]
    AllProvidersUnavailable,

    /// Non-retryable client error passed through unchanged (capability or
    /// decode failure).
    #[error(transparent)]
    Client(ClientError),

    #[error("all {attempts} attempts failed, last provider {provider}: {source}")]
    Exhausted {
        provider: String,
        attempts: u32,
        #[source]
        source: ClientError,
    },
}

struct SlotHealth {
    state: ProviderState,
    blacklisted_until: Option<Instant>,
}

struct ProviderSlot<C> {
    client: Arc<C>,
    health: Mutex<SlotHealth>,
}

/// Multi-endpoint coordinator, generic over the typed chain client.
pub struct Failover<C> {
    slots: Vec<ProviderSlot<C>>,
    cursor: AtomicUsize,
    retry: RetryPolicy,
    config: FailoverConfig,
}

impl<C: NetworkClient> Failover<C> {
    pub fn new(clients: Vec<C>, config: FailoverConfig) -> Self {
        let slots = clients
            .into_iter()
            .map(|c| ProviderSlot {
                client: Arc::new(c),
                health: Mutex::new(SlotHealth {
                    state: ProviderState::Healthy,
                    blacklisted_until: None,
                }),
            })
            .collect();
        let retry = RetryPolicy::new(RetryConfig {
            max_retries: config.max_retries,
            initial_backoff: config.retry_delay,
            max_backoff: config.max_retry_delay,
            multiplier: 2.0,
        });
        Self {
            slots,
            cursor: AtomicUsize::new(0),
            retry,
            config,
        }
    }

    /// Number of providers in the pool.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the pool has no providers.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Per-provider (url, state) snapshot.
    pub fn health_summary(&self) -> Vec<(String, ProviderState)> {
        self.slots
            .iter()
            .map(|s| {
                let health = s.health.lock().unwrap();
                (s.client.url().to_string(), health.state)
            })
            .collect()
    }

    /// Pick the best-ranked selectable provider, rotating among ties.
    /// Blacklisted slots whose cooldown elapsed are reinstated as unhealthy.
    fn select(&self) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        let now = Instant::now();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        let n = self.slots.len();
        let mut best: Option<(u8, usize)> = None;

        for i in 0..n {
            let idx = (start + i) % n;
            let mut health = self.slots[idx].health.lock().unwrap();
            if health.state == ProviderState::Blacklisted {
                match health.blacklisted_until {
                    Some(until) if now >= until => {
                        health.state = ProviderState::Unhealthy;
                        health.blacklisted_until = None;
                        tracing::info!(
                            provider = self.slots[idx].client.url(),
                            "blacklist cooldown elapsed, provider reinstated"
                        );
                    }
                    _ => continue,
                }
            }
            let rank = health.state.rank();
            drop(health);
            if rank == 0 {
                return Some(idx);
            }
            match best {
                Some((r, _)) if r <= rank => {}
                _ => best = Some((rank, idx)),
            }
        }
        best.map(|(_, idx)| idx)
    }

    fn mark_healthy(&self, idx: usize) {
        let mut health = self.slots[idx].health.lock().unwrap();
        health.state = ProviderState::Healthy;
        health.blacklisted_until = None;
    }

    fn penalize(&self, idx: usize) {
        let mut health = self.slots[idx].health.lock().unwrap();
        let next = health.state.penalized();
        if next != health.state {
            tracing::warn!(
                provider = self.slots[idx].client.url(),
                from = %health.state,
                to = %next,
                "provider penalized"
            );
        }
        health.state = next;
        if next == ProviderState::Blacklisted && health.blacklisted_until.is_none() {
            health.blacklisted_until = Some(Instant::now() + self.config.blacklist_cooldown);
        }
    }

    /// Run `op` against the pool with bounded retries.
    ///
    /// `op` is invoked at most `max_retries + 1` times. Success marks the
    /// provider healthy and returns the value. Capability and decode errors
    /// are returned to the caller immediately without penalty; everything
    /// else penalizes the provider and retries after the backoff delay.
    /// Exhaustion wraps the last error with the final provider identity.
    pub async fn execute_with_retry<T, F>(&self, op: F) -> Result<T, FailoverError>
    where
        T: Send,
        F: Fn(Arc<C>) -> OpFuture<T> + Send + Sync,
    {
        if self.slots.is_empty() {
            return Err(FailoverError::NoProviders);
        }

        let attempts = self.config.max_retries + 1;
        let mut last: Option<(String, ClientError)> = None;

        for attempt in 1..=attempts {
            let Some(idx) = self.select() else {
                return Err(FailoverError::AllProvidersUnavailable);
            };
            let client = self.slots[idx].client.clone();
            let url = client.url().to_string();

            match op(client).await {
                Ok(value) => {
                    self.mark_healthy(idx);
                    return Ok(value);
                }
                Err(e) if e.is_capability_error() => {
                    return Err(FailoverError::Client(e));
                }
                Err(e @ (ClientError::Decode(_) | ClientError::Unsupported(_))) => {
                    return Err(FailoverError::Client(e));
                }
                Err(e) => {
                    self.penalize(idx);
                    tracing::warn!(provider = %url, attempt, error = %e, "rpc attempt failed");
                    last = Some((url, e));
                    if attempt < attempts {
                        if let Some(delay) = self.retry.next_delay(attempt) {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        match last {
            Some((provider, source)) => Err(FailoverError::Exhausted {
                provider,
                attempts,
                source,
            }),
            None => Err(FailoverError::AllProvidersUnavailable),
        }
    }
}
