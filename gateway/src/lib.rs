//! Inference gateway for slow, queue-based model endpoints
//!
//! Invokes a remote inference endpoint that may be cold (model still loading),
//! rate limited, or flaky, and turns the whole exchange into a bounded-time,
//! typed [`InvocationResult`]. Retry budgets are selected per
//! [`ModelCategory`]; advisory wait windows are selected per model key.
//!
//! This module provides:
//! - Category retry policies and the policy table
//! - Response classification (transient vs fatal) with server delay hints
//! - Capped exponential backoff
//! - Total time budget and cancellation support
//! - Progress callbacks for UI updates
//! - A reqwest-backed HTTP transport and a layered configuration loader

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod backoff;
pub mod category;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod policy;
pub mod result;
pub mod transport;
pub mod wait;

pub use category::ModelCategory;
pub use classifier::{AttemptOutcome, classify};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{ConfigLoader, GatewayConfig};
pub use error::{GatewayError, Result};
pub use gateway::{InferenceGateway, RetryStatus};
pub use policy::{PolicyOverride, PolicyTable, RetryPolicy};
pub use result::{FailureReason, InvocationResult, ResponseData};
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};
pub use wait::ExpectedWaitWindow;

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
