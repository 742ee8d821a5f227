use crate::{
    types::{CommittedChannel, OracleError},
    utils::unix_now,
};
use async_trait::async_trait;
use ethers::{
    contract::abigen,
    providers::{Http, Middleware, Provider},
    types::{Address, H256, U256},
};
use std::{collections::HashMap, sync::Arc, time::Duration};

/// Read-only view of channels committed on chain.
#[async_trait]
pub trait ChainOracle: Send + Sync {
    /// Returns `None` when the chain knows no such channel.
    async fn read_committed_channel(
        &self,
        channel_id: H256,
    ) -> Result<Option<CommittedChannel>, OracleError>;
}

/// Oracle over a fixed set of channels, for local deployments and tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryChainOracle {
    channels: HashMap<H256, CommittedChannel>,
}

impl InMemoryChainOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: CommittedChannel) -> Self {
        self.channels.insert(channel.channel_id, channel);
        self
    }
}

#[async_trait]
impl ChainOracle for InMemoryChainOracle {
    async fn read_committed_channel(
        &self,
        channel_id: H256,
    ) -> Result<Option<CommittedChannel>, OracleError> {
        Ok(self.channels.get(&channel_id).cloned())
    }
}

abigen!(
    PaymentChannelEscrow,
    r#"[
        function channels(uint256) external view returns (address, address, address, bytes32, uint256, uint256, uint256)
    ]"#
);

/// Row of the escrow contract's `channels(id)` view:
/// `(sender, signer, recipient, groupId, value, nonce, expiration)`.
type EscrowChannelRow = (Address, Address, Address, [u8; 32], U256, U256, U256);

/// Reads channels from a deployed escrow contract over JSON-RPC.
///
/// The contract expires channels at a block number. Expirations are reported
/// as unix seconds, projected from the current head with the configured
/// average block time.
pub struct EscrowContractOracle {
    provider: Arc<Provider<Http>>,
    contract: PaymentChannelEscrow<Provider<Http>>,
    block_time: Duration,
}

impl EscrowContractOracle {
    pub fn new(
        rpc_endpoint: &str,
        escrow_address: Address,
        block_time: Duration,
    ) -> Result<Self, OracleError> {
        let provider = Provider::<Http>::try_from(rpc_endpoint)
            .map_err(|e| OracleError::Unavailable(format!("invalid endpoint {rpc_endpoint}: {e}")))?;
        let provider = Arc::new(provider);
        Ok(Self {
            contract: PaymentChannelEscrow::new(escrow_address, provider.clone()),
            provider,
            block_time,
        })
    }
}

/// Converts an expiration block into unix seconds. Blocks at or below the
/// current head expire `now`.
pub fn block_expiration_to_unix(
    expiration_block: U256,
    current_block: U256,
    now: U256,
    block_time: Duration,
) -> U256 {
    let blocks_left = expiration_block.saturating_sub(current_block);
    let block_secs = U256::from(block_time.as_secs().max(1));
    now.saturating_add(blocks_left.saturating_mul(block_secs))
}

fn committed_from_row(
    channel_id: H256,
    row: EscrowChannelRow,
    current_block: U256,
    now: U256,
    block_time: Duration,
) -> Result<Option<CommittedChannel>, OracleError> {
    let (sender, _signer, recipient, _group_id, value, _nonce, expiration) = row;
    if sender.is_zero() {
        return Ok(None);
    }
    if recipient.is_zero() {
        return Err(OracleError::Malformed(format!(
            "channel {channel_id:?} has no recipient"
        )));
    }
    Ok(Some(CommittedChannel {
        channel_id,
        sender,
        recipient,
        full_amount: value,
        expiration: block_expiration_to_unix(expiration, current_block, now, block_time),
    }))
}

#[async_trait]
impl ChainOracle for EscrowContractOracle {
    async fn read_committed_channel(
        &self,
        channel_id: H256,
    ) -> Result<Option<CommittedChannel>, OracleError> {
        let row = self
            .contract
            .channels(U256::from_big_endian(channel_id.as_bytes()))
            .call()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        let current_block = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        committed_from_row(
            channel_id,
            row,
            U256::from(current_block.as_u64()),
            unix_now(),
            self.block_time,
        )
    }
}
