//! # Observability & Tracing
//!
//! [`setup_tracing`] initializes structured logging once for the process.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from `logging.filter` in the
//! configuration. Output uses the compact format without module paths
//! (`with_target(false)`); the span hierarchy carries the context instead.
//!
//! ## What Gets Traced
//!
//! - **Transitions** at `info`, with `delivery_id`, `agent_id` and `status` fields
//! - **Rejected or unauthorized commands** at `warn`
//! - **Command payloads** at `debug`, once, when a client method is entered
//! - **Fan-out** at `trace`: topic, event type, and how many connections it reached
//!
//! ## Usage Examples
//!
//! ```bash
//! # Lifecycle only
//! RUST_LOG=info cargo run
//!
//! # Payloads and store retries
//! RUST_LOG=debug cargo run
//!
//! # Actor plumbing only
//! RUST_LOG=info,actor_framework=debug cargo run
//! ```
//!
//! With `RUST_LOG=info` the first pickup of a three-product delivery reads as below.
//! Commands run on the delivery's worker task, outside the caller's span.
//!
//! ```text
//! INFO Product collected delivery_id=… product_id=rice collected=1 total=3
//! INFO Delivery transitioned delivery_id=… status=collecting
//! ```

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

pub fn setup_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
