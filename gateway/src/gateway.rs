//! The retry loop
//!
//! One invocation is a sequence of attempts on a single task. It suspends only
//! while awaiting the transport and while sleeping between attempts; both
//! points race the caller's cancellation token. The time budget is checked
//! between attempts and never interrupts an attempt in progress.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::backoff::{DelaySource, next_delay};
use crate::category::ModelCategory;
use crate::classifier::{AttemptOutcome, classify};
use crate::clock::{Clock, TokioClock};
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::policy::{PolicyTable, RetryPolicy};
use crate::result::{FailureReason, InvocationResult};
use crate::transport::{HttpTransport, Transport};
use crate::wait::ExpectedWaitWindow;

/// Progress report emitted before each backoff sleep
#[derive(Debug, Clone, PartialEq)]
pub struct RetryStatus {
    /// Attempt that just failed (1-indexed)
    pub attempt: u32,
    /// Total elapsed time since the first attempt started
    pub elapsed: Duration,
    /// Sleep before the next attempt
    pub sleep: Duration,
    /// Human-readable reason for the retry
    pub reason: String,
    /// True if the sleep came from a server estimate (vs computed backoff)
    pub is_server_hint: bool,
    /// Advisory cold-start window for the model
    pub expected_wait: ExpectedWaitWindow,
}

/// Resilient front door to a slow inference provider.
///
/// Cheap to clone; clones share the transport, clock and policy table. No
/// state is shared between invocations, so any number may run concurrently.
#[derive(Clone)]
pub struct InferenceGateway {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    policies: Arc<PolicyTable>,
}

impl InferenceGateway {
    /// Gateway with the builtin policy table and tokio timers
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            clock: Arc::new(TokioClock),
            policies: Arc::new(PolicyTable::builtin()),
        }
    }

    /// HTTP transport and policy overrides from configuration
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let policies = config.policy_table()?;
        let transport = HttpTransport::from_config(config)?;
        Ok(Self::new(Arc::new(transport)).with_policies(policies))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = Arc::new(policies);
        self
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn policy_for(&self, category: ModelCategory) -> RetryPolicy {
        self.policies.get(category)
    }

    pub fn expected_wait(&self, model_key: &str) -> ExpectedWaitWindow {
        ExpectedWaitWindow::for_model(model_key)
    }

    /// Invoke a model, retrying transient failures within the category budget
    pub async fn invoke(
        &self,
        model_key: &str,
        category: ModelCategory,
        payload: &Value,
    ) -> InvocationResult {
        let never = CancellationToken::new();
        self.invoke_with_status(model_key, category, payload, &never, |_| {})
            .await
    }

    /// [`Self::invoke`] that stops as soon as `cancel` fires
    pub async fn invoke_cancellable(
        &self,
        model_key: &str,
        category: ModelCategory,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> InvocationResult {
        self.invoke_with_status(model_key, category, payload, cancel, |_| {})
            .await
    }

    /// Full-featured invocation with cancellation and progress callbacks.
    ///
    /// `status_cb` runs before every backoff sleep, which lets a UI show
    /// "model is warming up, usually ready in 20-60 seconds".
    pub async fn invoke_with_status<StatusCb>(
        &self,
        model_key: &str,
        category: ModelCategory,
        payload: &Value,
        cancel: &CancellationToken,
        mut status_cb: StatusCb,
    ) -> InvocationResult
    where
        StatusCb: FnMut(RetryStatus) + Send,
    {
        let policy = self.policy_for(category);
        let expected_wait = ExpectedWaitWindow::for_model(model_key);
        let start = self.clock.now();
        let elapsed = || self.clock.now().saturating_duration_since(start);

        if model_key.trim().is_empty() {
            let reason = FailureReason::Fatal("model key must not be empty".to_string());
            return self.give_up(model_key, category, &reason, 0, elapsed());
        }

        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return self.give_up(
                    model_key,
                    category,
                    &FailureReason::Cancelled,
                    attempt,
                    elapsed(),
                );
            }
            if attempt > 0 && elapsed() >= policy.total_timeout() {
                return self.give_up(
                    model_key,
                    category,
                    &FailureReason::Timeout,
                    attempt,
                    elapsed(),
                );
            }

            tracing::debug!(
                model = %model_key,
                category = %category,
                attempt = attempt + 1,
                "Sending inference request"
            );

            // A response that lands after cancellation is discarded.
            let response = tokio::select! {
                _ = cancel.cancelled() => None,
                response = self.transport.send(model_key, payload) => Some(response),
            };
            let Some(response) = response else {
                return self.give_up(
                    model_key,
                    category,
                    &FailureReason::Cancelled,
                    attempt + 1,
                    elapsed(),
                );
            };

            match classify(response) {
                AttemptOutcome::Success(data) => {
                    let elapsed = elapsed();
                    tracing::info!(
                        model = %model_key,
                        category = %category,
                        attempts = attempt + 1,
                        elapsed_ms = millis(elapsed),
                        "Inference succeeded"
                    );
                    return InvocationResult::succeeded(data, attempt + 1, millis(elapsed));
                }
                AttemptOutcome::FatalFailure { reason } => {
                    return self.give_up(
                        model_key,
                        category,
                        &FailureReason::Fatal(reason),
                        attempt + 1,
                        elapsed(),
                    );
                }
                AttemptOutcome::TransientFailure {
                    reason,
                    suggested_delay,
                } => {
                    if attempt + 1 > policy.max_retries {
                        tracing::debug!(
                            model = %model_key,
                            last_error = %reason,
                            "Retry budget spent"
                        );
                        return self.give_up(
                            model_key,
                            category,
                            &FailureReason::MaxRetriesExceeded,
                            attempt + 1,
                            elapsed(),
                        );
                    }

                    let (delay, source) = next_delay(&policy, attempt, suggested_delay);
                    let elapsed_now = elapsed();

                    // Sleeping past the budget would only end in a timeout.
                    if elapsed_now.saturating_add(delay) >= policy.total_timeout() {
                        tracing::debug!(
                            model = %model_key,
                            delay_ms = millis(delay),
                            "Next retry would exceed time budget"
                        );
                        return self.give_up(
                            model_key,
                            category,
                            &FailureReason::Timeout,
                            attempt + 1,
                            elapsed_now,
                        );
                    }

                    let is_server_hint = source == DelaySource::ServerHint;
                    tracing::info!(
                        model = %model_key,
                        category = %category,
                        attempt = attempt + 1,
                        delay_ms = millis(delay),
                        elapsed_ms = millis(elapsed_now),
                        server_hint = is_server_hint,
                        expected_wait = %expected_wait,
                        "Transient inference failure, retrying: {reason}"
                    );

                    status_cb(RetryStatus {
                        attempt: attempt + 1,
                        elapsed: elapsed_now,
                        sleep: delay,
                        reason,
                        is_server_hint,
                        expected_wait,
                    });

                    tokio::select! {
                        _ = self.clock.sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            return self.give_up(
                                model_key,
                                category,
                                &FailureReason::Cancelled,
                                attempt + 1,
                                elapsed(),
                            );
                        }
                    }

                    attempt += 1;
                }
            }
        }
    }

    fn give_up(
        &self,
        model_key: &str,
        category: ModelCategory,
        reason: &FailureReason,
        attempts: u32,
        elapsed: Duration,
    ) -> InvocationResult {
        tracing::warn!(
            model = %model_key,
            category = %category,
            attempts,
            elapsed_ms = millis(elapsed),
            error = %reason,
            "Inference failed"
        );
        InvocationResult::failed(reason, attempts, millis(elapsed))
    }
}

impl std::fmt::Debug for InferenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceGateway")
            .field("policies", &self.policies)
            .finish_non_exhaustive()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
