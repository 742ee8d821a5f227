//! Per-call income validation.
//!
//! [`IncomeValidator::validate`] decides whether the income a caller
//! authorized with a call pays for that call, and if so advances the channel
//! in the store. The validator keeps no mutable state of its own: the store's
//! compare-and-advance is the only thing that orders payments on a channel.

use crate::{
    config::Config,
    pricing::{self, PricingPolicy},
    state::{Advance, ChainOracle, ChannelStore},
    types::{IncomeRecord, PaymentChannel, ValidationError},
    utils::unix_now,
};
use ethers::types::H256;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::instrument;

/// Accepted calls yield the channel as stored after the advance.
pub type ValidationOutcome = Result<PaymentChannel, ValidationError>;

/// First attempt plus one retry after a lost compare-and-advance race.
const MAX_ATTEMPTS: usize = 2;

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct IncomeValidator {
    pricing: Arc<dyn PricingPolicy>,
    store: Arc<dyn ChannelStore>,
    oracle: Option<Arc<dyn ChainOracle>>,
    store_timeout: Duration,
    oracle_timeout: Duration,
}

impl IncomeValidator {
    pub fn new(pricing: Arc<dyn PricingPolicy>, store: Arc<dyn ChannelStore>) -> Self {
        Self {
            pricing,
            store,
            oracle: None,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn ChannelStore>,
        oracle: Option<Arc<dyn ChainOracle>>,
    ) -> Self {
        Self {
            pricing: pricing::from_config(&config.pricing),
            store,
            oracle,
            store_timeout: config.payment_channel_storage_client.request_timeout,
            oracle_timeout: config.oracle_timeout,
        }
    }

    /// Channels missing from the store are looked up here once per call.
    pub fn with_oracle(mut self, oracle: Arc<dyn ChainOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_timeouts(mut self, store_timeout: Duration, oracle_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self.oracle_timeout = oracle_timeout;
        self
    }

    #[instrument(
        name = "income.validate",
        skip_all,
        fields(method = %income.method, channel_id = ?income.channel_id, nonce = %income.nonce)
    )]
    pub async fn validate(&self, income: &IncomeRecord) -> ValidationOutcome {
        let outcome = self.evaluate(income).await;
        match &outcome {
            Ok(channel) => tracing::debug!(
                authorized_amount = %channel.authorized_amount,
                nonce = %channel.nonce,
                "income accepted"
            ),
            Err(error) if error.is_retryable() => {
                tracing::warn!(code = ?error.code(), %error, "income validation failed")
            }
            Err(error) => tracing::debug!(code = ?error.code(), %error, "income rejected"),
        }
        outcome
    }

    async fn evaluate(&self, income: &IncomeRecord) -> ValidationOutcome {
        if income.income.is_negative() {
            return Err(ValidationError::InvalidArgument(format!(
                "income {} is negative",
                income.income
            )));
        }
        let channel_id = income.channel_id.ok_or_else(|| {
            ValidationError::InvalidArgument("payment channel id is missing".to_string())
        })?;
        if income.method.is_empty() {
            return Err(ValidationError::InvalidArgument(
                "method name is missing".to_string(),
            ));
        }
        let amount = income.income.into_raw();

        let price = self.pricing.price(&income.method, income.invoice.as_ref())?;
        if amount < price {
            return Err(ValidationError::PermissionDenied(format!(
                "income {amount} does not cover price {price} of {}",
                income.method
            )));
        }

        let mut reconciled = false;
        for attempt in 0..MAX_ATTEMPTS {
            let channel = self.load_channel(channel_id, &mut reconciled).await?;

            if channel.authorized_amount != income.previous_authorized_amount
                || channel.nonce != income.nonce
            {
                let reason = format!(
                    "channel is at authorized amount {} nonce {}, call claims {} nonce {}",
                    channel.authorized_amount,
                    channel.nonce,
                    income.previous_authorized_amount,
                    income.nonce
                );
                // On a retry the mismatch was written by the call that beat us.
                return Err(if attempt == 0 {
                    ValidationError::FailedPrecondition(reason)
                } else {
                    ValidationError::Aborted(reason)
                });
            }

            match channel.authorized_amount.checked_add(amount) {
                Some(authorized) if authorized <= channel.full_amount => {}
                _ => {
                    return Err(ValidationError::ResourceExhausted(format!(
                        "income {amount} exceeds remaining channel deposit {}",
                        channel.remaining()
                    )))
                }
            }
            if channel.is_expired(unix_now()) {
                return Err(ValidationError::ResourceExhausted(format!(
                    "payment channel expired at {}",
                    channel.expiration
                )));
            }

            let advance = self
                .with_store_timeout(self.store.compare_and_advance(
                    channel_id,
                    channel.authorized_amount,
                    channel.nonce,
                    amount,
                ))
                .await??;
            match advance {
                Advance::Advanced(channel) => return Ok(channel),
                Advance::Conflict => tracing::debug!(attempt, "lost compare-and-advance race"),
            }
        }

        Err(ValidationError::Aborted(
            "lost the payment channel update race twice".to_string(),
        ))
    }

    /// Reads the channel, falling back to the chain oracle at most once.
    async fn load_channel(
        &self,
        channel_id: H256,
        reconciled: &mut bool,
    ) -> Result<PaymentChannel, ValidationError> {
        if let Some(channel) = self.with_store_timeout(self.store.get(channel_id)).await?? {
            return Ok(channel);
        }
        if !*reconciled {
            *reconciled = true;
            if let Some(channel) = self.reconcile(channel_id).await? {
                return Ok(channel);
            }
        }
        Err(ValidationError::FailedPrecondition(format!(
            "unknown payment channel {channel_id:?}"
        )))
    }

    async fn reconcile(&self, channel_id: H256) -> Result<Option<PaymentChannel>, ValidationError> {
        let Some(oracle) = &self.oracle else {
            return Ok(None);
        };
        let committed = tokio::time::timeout(
            self.oracle_timeout,
            oracle.read_committed_channel(channel_id),
        )
        .await
        .map_err(|_| ValidationError::Unavailable("chain oracle timed out".to_string()))??;

        let Some(committed) = committed else {
            return Ok(None);
        };
        tracing::info!(
            full_amount = %committed.full_amount,
            expiration = %committed.expiration,
            "payment channel reconciled from chain"
        );
        let channel = self
            .with_store_timeout(self.store.insert_if_absent(committed.into_channel()))
            .await??;
        Ok(Some(channel))
    }

    async fn with_store_timeout<T>(
        &self,
        call: impl Future<Output = T>,
    ) -> Result<T, ValidationError> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| ValidationError::Unavailable("channel store timed out".to_string()))
    }
}

impl std::fmt::Debug for IncomeValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomeValidator")
            .field("oracle", &self.oracle.is_some())
            .field("store_timeout", &self.store_timeout)
            .field("oracle_timeout", &self.oracle_timeout)
            .finish()
    }
}
