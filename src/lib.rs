//! Income validation for metered calls paid through off-chain payment
//! channels.
//!
//! Every inbound call carries a claim about how much more its sender has
//! authorized on a payment channel. [`validator::IncomeValidator`] checks that
//! claim against a [`pricing::PricingPolicy`] and the authoritative channel
//! state in a [`state::ChannelStore`], and advances the channel when the call
//! is paid. [`middleware::payment_middleware`] puts the validator in front of
//! the service's handlers.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod pricing;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod utils;
pub mod validator;

use axum::{routing::post, Router};
use crate::config::DaemonType;
use tower_http::trace::TraceLayer;

pub use validator::{IncomeValidator, ValidationOutcome};

/// Routes every `POST /<service>/<method>` through the payment middleware.
pub fn create_router(validator: IncomeValidator, daemon_type: DaemonType) -> Router {
    Router::new()
        .route("/*method", post(handlers::metered_call))
        .layer(axum::middleware::from_fn(move |req, next| {
            let validator = validator.clone();
            middleware::payment_middleware(validator, daemon_type, req, next)
        }))
        .layer(TraceLayer::new_for_http())
}
