use crate::types::PaymentChannel;
use axum::{http::Uri, Extension, Json};
use serde_json::{json, Value};

/// Metered call endpoint. Only reached once the payment middleware accepted
/// the call, which leaves the advanced channel in the request extensions.
pub async fn metered_call(uri: Uri, Extension(channel): Extension<PaymentChannel>) -> Json<Value> {
    Json(json!({
        "method": uri.path(),
        "channel_id": channel.channel_id,
        "authorized_amount": channel.authorized_amount,
        "nonce": channel.nonce,
    }))
}
