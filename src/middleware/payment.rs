use crate::{
    config::DaemonType,
    types::{IncomeRecord, Invoice, ValidationError},
    validator::IncomeValidator,
};
use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use ethers::types::{H256, I256, U256};
use std::str::FromStr;

pub const CHANNEL_ID_HEADER: &str = "x-payment-channel-id";
pub const CHANNEL_NONCE_HEADER: &str = "x-payment-channel-nonce";
/// Total amount authorized by the sender after this call.
pub const CHANNEL_AMOUNT_HEADER: &str = "x-payment-channel-amount";
/// Total amount the sender believes was authorized before this call.
pub const CHANNEL_PREVIOUS_AMOUNT_HEADER: &str = "x-payment-channel-previous-amount";
pub const INVOICE_ID_HEADER: &str = "x-invoice-id";
pub const INVOICE_PRICE_HEADER: &str = "x-invoice-price";

fn header<'a>(request: &'a Request<Body>, name: &str) -> Result<Option<&'a str>, ValidationError> {
    request
        .headers()
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ValidationError::InvalidArgument(format!("{name} is not valid text")))
        })
        .transpose()
}

fn required_amount(request: &Request<Body>, name: &str) -> Result<U256, ValidationError> {
    let value = header(request, name)?
        .ok_or_else(|| ValidationError::InvalidArgument(format!("{name} is missing")))?;
    parse_amount(name, value)
}

fn parse_amount(name: &str, value: &str) -> Result<U256, ValidationError> {
    U256::from_dec_str(value.trim())
        .map_err(|_| ValidationError::InvalidArgument(format!("{name} is not a decimal amount")))
}

/// Income is the signed difference between the newly authorized amount and
/// the previous one.
fn claimed_income(previous: U256, amount: U256) -> Result<I256, ValidationError> {
    let signed = |value: U256| {
        let value = I256::from_raw(value);
        if value.is_negative() {
            Err(ValidationError::InvalidArgument(
                "payment amount is out of range".to_string(),
            ))
        } else {
            Ok(value)
        }
    };
    Ok(signed(amount)? - signed(previous)?)
}

fn invoice(request: &Request<Body>) -> Result<Option<Invoice>, ValidationError> {
    let Some(id) = header(request, INVOICE_ID_HEADER)? else {
        return Ok(None);
    };
    let price = header(request, INVOICE_PRICE_HEADER)?.ok_or_else(|| {
        ValidationError::InvalidArgument(format!(
            "{INVOICE_PRICE_HEADER} is required with {INVOICE_ID_HEADER}"
        ))
    })?;
    Ok(Some(Invoice {
        id: id.to_string(),
        price: parse_amount(INVOICE_PRICE_HEADER, price)?,
    }))
}

/// Builds the income record for a call from its envelope.
pub fn income_record(request: &Request<Body>) -> Result<IncomeRecord, ValidationError> {
    // A missing channel id is the validator's call to reject.
    let channel_id = header(request, CHANNEL_ID_HEADER)?
        .map(|value| {
            H256::from_str(value.trim()).map_err(|_| {
                ValidationError::InvalidArgument(format!("{CHANNEL_ID_HEADER} is not a channel id"))
            })
        })
        .transpose()?;
    let nonce = required_amount(request, CHANNEL_NONCE_HEADER)?;
    let amount = required_amount(request, CHANNEL_AMOUNT_HEADER)?;
    let previous_authorized_amount = required_amount(request, CHANNEL_PREVIOUS_AMOUNT_HEADER)?;

    Ok(IncomeRecord {
        income: claimed_income(previous_authorized_amount, amount)?,
        method: request.uri().path().to_string(),
        channel_id,
        nonce,
        previous_authorized_amount,
        invoice: invoice(request)?,
    })
}

/// Admits a call only after the income validator accepted its payment.
///
/// Rejections are returned to the caller exactly as the validator produced
/// them, framed for the daemon's protocol.
pub async fn payment_middleware(
    validator: IncomeValidator,
    daemon_type: DaemonType,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let outcome = match income_record(&request) {
        Ok(income) => validator.validate(&income).await,
        Err(error) => Err(error),
    };
    match outcome {
        Ok(channel) => {
            request.extensions_mut().insert(channel);
            next.run(request).await
        }
        Err(error) => match daemon_type {
            DaemonType::Http => error.into_response(),
            DaemonType::Grpc => error.into_grpc_response(),
        },
    }
}
