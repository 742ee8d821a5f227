use crate::types::{PaymentChannel, StoreError};
use async_trait::async_trait;
use ethers::types::{H256, U256};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};

/// Result of a conditional channel update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Advance {
    /// The update was applied; holds the channel as stored afterwards.
    Advanced(PaymentChannel),
    /// The channel no longer matched the expected state. Nothing was written.
    Conflict,
}

/// Authoritative payment channel state, possibly shared between replicas.
///
/// All serialization of payments on one channel happens in
/// [`ChannelStore::compare_and_advance`]; implementations must apply it
/// atomically.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn get(&self, channel_id: H256) -> Result<Option<PaymentChannel>, StoreError>;

    /// Adds `delta` to the authorized amount and bumps the nonce by one, only
    /// if the channel still has `expected_authorized_amount` and
    /// `expected_nonce` and the new amount stays within the deposit.
    async fn compare_and_advance(
        &self,
        channel_id: H256,
        expected_authorized_amount: U256,
        expected_nonce: U256,
        delta: U256,
    ) -> Result<Advance, StoreError>;

    /// Stores `channel` unless a record already exists, and returns the record
    /// that is stored afterwards.
    async fn insert_if_absent(&self, channel: PaymentChannel) -> Result<PaymentChannel, StoreError>;
}

/// Process-local channel store.
///
/// Every channel sits behind its own mutex, so advances on different channels
/// only share the brief map lookup.
#[derive(Clone, Default)]
pub struct InMemoryChannelStore {
    channels: Arc<RwLock<HashMap<H256, Arc<Mutex<PaymentChannel>>>>>,
}

impl InMemoryChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels(channels: impl IntoIterator<Item = PaymentChannel>) -> Self {
        let channels = channels
            .into_iter()
            .map(|channel| (channel.channel_id, Arc::new(Mutex::new(channel))))
            .collect();
        Self {
            channels: Arc::new(RwLock::new(channels)),
        }
    }

    /// Replaces whatever is stored for the channel.
    pub async fn insert(&self, channel: PaymentChannel) {
        self.channels
            .write()
            .await
            .insert(channel.channel_id, Arc::new(Mutex::new(channel)));
    }

    async fn entry(&self, channel_id: H256) -> Option<Arc<Mutex<PaymentChannel>>> {
        self.channels.read().await.get(&channel_id).cloned()
    }
}

#[async_trait]
impl ChannelStore for InMemoryChannelStore {
    async fn get(&self, channel_id: H256) -> Result<Option<PaymentChannel>, StoreError> {
        match self.entry(channel_id).await {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn compare_and_advance(
        &self,
        channel_id: H256,
        expected_authorized_amount: U256,
        expected_nonce: U256,
        delta: U256,
    ) -> Result<Advance, StoreError> {
        let Some(entry) = self.entry(channel_id).await else {
            return Ok(Advance::Conflict);
        };
        let mut channel = entry.lock().await;

        if channel.authorized_amount != expected_authorized_amount
            || channel.nonce != expected_nonce
        {
            tracing::trace!(
                channel_id = ?channel_id,
                authorized_amount = %channel.authorized_amount,
                nonce = %channel.nonce,
                "compare-and-advance conflict"
            );
            return Ok(Advance::Conflict);
        }

        let authorized_amount = match channel.authorized_amount.checked_add(delta) {
            Some(amount) if amount <= channel.full_amount => amount,
            _ => return Ok(Advance::Conflict),
        };
        let Some(nonce) = channel.nonce.checked_add(U256::one()) else {
            return Ok(Advance::Conflict);
        };

        channel.authorized_amount = authorized_amount;
        channel.nonce = nonce;
        Ok(Advance::Advanced(channel.clone()))
    }

    async fn insert_if_absent(&self, channel: PaymentChannel) -> Result<PaymentChannel, StoreError> {
        let entry = self
            .channels
            .write()
            .await
            .entry(channel.channel_id)
            .or_insert_with(|| Arc::new(Mutex::new(channel)))
            .clone();
        let stored = entry.lock().await.clone();
        Ok(stored)
    }
}
