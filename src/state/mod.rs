pub mod channel;
pub mod oracle;

pub use channel::{Advance, ChannelStore, InMemoryChannelStore};
pub use oracle::{ChainOracle, EscrowContractOracle, InMemoryChainOracle};
