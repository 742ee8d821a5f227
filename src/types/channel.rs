use ethers::types::{Address, H256, I256, U256};
use serde::{Deserialize, Serialize};

/// Mirror of an on-chain payment channel as held by the channel store.
///
/// `authorized_amount` never exceeds `full_amount` and only grows; `nonce`
/// advances by one with every accepted call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChannel {
    pub channel_id: H256,
    pub sender: Address,
    pub recipient: Address,
    pub full_amount: U256,
    pub authorized_amount: U256,
    pub nonce: U256,
    /// Unix timestamp in seconds.
    pub expiration: U256,
}

impl PaymentChannel {
    /// Deposit left for future calls.
    pub fn remaining(&self) -> U256 {
        self.full_amount.saturating_sub(self.authorized_amount)
    }

    pub fn is_expired(&self, now: U256) -> bool {
        self.expiration <= now
    }
}

/// Channel facts committed on chain, as reported by a chain oracle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedChannel {
    pub channel_id: H256,
    pub sender: Address,
    pub recipient: Address,
    pub full_amount: U256,
    pub expiration: U256,
}

impl CommittedChannel {
    /// Store record for a channel nobody has been paid from yet.
    pub fn into_channel(self) -> PaymentChannel {
        PaymentChannel {
            channel_id: self.channel_id,
            sender: self.sender,
            recipient: self.recipient,
            full_amount: self.full_amount,
            authorized_amount: U256::zero(),
            nonce: U256::zero(),
            expiration: self.expiration,
        }
    }
}

/// Caller-presented invoice. Its authenticity is checked upstream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub price: U256,
}

/// Everything the income validator needs to know about one call.
#[derive(Clone, Debug)]
pub struct IncomeRecord {
    /// Difference between the newly authorized amount and
    /// `previous_authorized_amount`. Negative when the caller lowered it.
    pub income: I256,
    /// Full method name of the call, e.g. `/example_service.Calculator/add`.
    pub method: String,
    pub channel_id: Option<H256>,
    pub nonce: U256,
    pub previous_authorized_amount: U256,
    pub invoice: Option<Invoice>,
}
