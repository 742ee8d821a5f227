use ethers::types::U256;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds, comparable with channel expirations.
pub fn unix_now() -> U256 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    U256::from(secs)
}
